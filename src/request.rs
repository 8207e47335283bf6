// nxapictl - CLI for the Cisco NX-API device management interface
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Request envelopes for the two NX-API wire protocols.
//!
//! Field names and casing are part of the device contract. Struct field
//! order is the order serde writes them in.

use crate::catalog::{LogicalCommand, OutputKind};
use crate::envelope::detect_protocol;
use crate::error::{NxError, excerpt};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";
pub const JSONRPC_ID: u64 = 1;
pub const INS_API_VERSION: &str = "1.0";
pub const INS_API_CHUNK: &str = "0";
pub const INS_API_SID: &str = "1";
pub const OUTPUT_FORMAT_JSON: &str = "json";

/// Which envelope a client speaks. Fixed per client, never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolMode {
    #[default]
    #[serde(rename = "jsonrpc", alias = "json-rpc")]
    JsonRpc,
    #[serde(rename = "ins_api", alias = "legacy", alias = "ins-api")]
    LegacyInsApi,
}

impl ProtocolMode {
    pub fn content_type(self) -> &'static str {
        match self {
            ProtocolMode::JsonRpc => "application/json-rpc",
            ProtocolMode::LegacyInsApi => "application/json",
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolMode::JsonRpc => "jsonrpc",
            ProtocolMode::LegacyInsApi => "ins_api",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: JsonRpcParams,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcParams {
    pub cmd: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_params_version")]
    pub version: u32,
}

fn default_params_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsApiRequest {
    pub ins_api: InsApiParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsApiParams {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub chunk: String,
    pub sid: String,
    pub input: String,
    pub output_format: String,
}

/// One request as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestEnvelope {
    /// A JSON-RPC batch. The client only ever sends a batch of one.
    JsonRpc(Vec<JsonRpcRequest>),
    Legacy(InsApiRequest),
}

impl RequestEnvelope {
    pub fn new(cmd: LogicalCommand, mode: ProtocolMode) -> Self {
        let command = cmd.command_string().to_string();
        match mode {
            ProtocolMode::JsonRpc => RequestEnvelope::JsonRpc(vec![JsonRpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method: jsonrpc_method(cmd.output_kind()).to_string(),
                params: JsonRpcParams {
                    cmd: command,
                    kind: Some(show_type(cmd.output_kind()).to_string()),
                    version: 1,
                },
                id: JSONRPC_ID,
            }]),
            ProtocolMode::LegacyInsApi => RequestEnvelope::Legacy(InsApiRequest {
                ins_api: InsApiParams {
                    version: INS_API_VERSION.to_string(),
                    kind: show_type(cmd.output_kind()).to_string(),
                    chunk: INS_API_CHUNK.to_string(),
                    sid: INS_API_SID.to_string(),
                    input: command,
                    output_format: OUTPUT_FORMAT_JSON.to_string(),
                },
            }),
        }
    }

    pub fn mode(&self) -> ProtocolMode {
        match self {
            RequestEnvelope::JsonRpc(_) => ProtocolMode::JsonRpc,
            RequestEnvelope::Legacy(_) => ProtocolMode::LegacyInsApi,
        }
    }

    /// The CLI string carried by the request.
    pub fn command(&self) -> Option<&str> {
        match self {
            RequestEnvelope::JsonRpc(batch) => batch.first().map(|r| r.params.cmd.as_str()),
            RequestEnvelope::Legacy(req) => Some(req.ins_api.input.as_str()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, NxError> {
        serde_json::to_vec(self).map_err(NxError::Encode)
    }

    /// Reads a request body back, picking the envelope by its marker.
    /// A JSON-RPC batch must hold exactly one request.
    pub fn parse(raw: &[u8]) -> Result<Self, NxError> {
        match detect_protocol(raw) {
            Some(ProtocolMode::JsonRpc) => {
                let batch: Vec<JsonRpcRequest> = serde_json::from_slice(raw)
                    .map_err(|e| NxError::format(format!("JSON-RPC request: {e}")))?;
                if batch.len() != 1 {
                    return Err(NxError::format(format!(
                        "expecting a single query, got {}",
                        batch.len()
                    )));
                }
                Ok(RequestEnvelope::JsonRpc(batch))
            }
            Some(ProtocolMode::LegacyInsApi) => serde_json::from_slice(raw)
                .map(RequestEnvelope::Legacy)
                .map_err(|e| NxError::format(format!("ins_api request: {e}"))),
            None => Err(NxError::UnsupportedPayload {
                body: String::from_utf8_lossy(raw).into_owned(),
            }),
        }
    }
}

impl fmt::Display for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&excerpt(&text)),
            Err(_) => f.write_str("<unencodable request>"),
        }
    }
}

/// Encodes `cmd` into the wire payload for `mode`.
pub fn encode(cmd: LogicalCommand, mode: ProtocolMode) -> Result<Vec<u8>, NxError> {
    RequestEnvelope::new(cmd, mode).to_bytes()
}

fn jsonrpc_method(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Structured => "cli",
        OutputKind::Text => "cli_ascii",
    }
}

fn show_type(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Structured => "cli_show",
        OutputKind::Text => "cli_show_ascii",
    }
}
