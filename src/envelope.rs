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

//! Protocol detection and unwrapping of NX-API response envelopes.
//!
//! Whatever the envelope, the outcome is a plain [`serde_json::Value`]
//! so the domain decoder never has to know which protocol was spoken.

use crate::error::NxError;
use crate::request::ProtocolMode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const JSONRPC_MARKER: &[u8] = b"\"jsonrpc\"";
const INS_API_MARKER: &[u8] = b"\"ins_api\"";

/// Legacy replies report success with this status code.
pub const INS_API_SUCCESS: &str = "200";

/// Picks the envelope by looking for its marker key. JSON-RPC wins when
/// both appear. A top-level array is a JSON-RPC batch even when it is
/// empty and so carries no marker.
pub fn detect_protocol(raw: &[u8]) -> Option<ProtocolMode> {
    if contains(raw, JSONRPC_MARKER) || is_batch(raw) {
        Some(ProtocolMode::JsonRpc)
    } else if contains(raw, INS_API_MARKER) {
        Some(ProtocolMode::LegacyInsApi)
    } else {
        None
    }
}

fn is_batch(raw: &[u8]) -> bool {
    raw.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[')
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcReply {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// The single command output of a legacy reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsApiOutput {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub clierror: Option<String>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsApiReply {
    pub version: Option<String>,
    pub kind: Option<String>,
    pub sid: Option<String>,
    pub output: InsApiOutput,
}

#[derive(Deserialize)]
struct InsApiDocument {
    ins_api: InsApiBody,
}

#[derive(Deserialize)]
struct InsApiBody {
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    sid: Option<String>,
    outputs: InsApiOutputs,
}

#[derive(Deserialize)]
struct InsApiOutputs {
    output: OneOrMany<InsApiOutput>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// An error the device reported inside an otherwise well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    pub code: String,
    pub message: String,
}

/// A decoded reply, tagged by the protocol that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    JsonRpc(JsonRpcReply),
    Legacy(InsApiReply),
}

impl ResponseEnvelope {
    pub fn protocol(&self) -> ProtocolMode {
        match self {
            ResponseEnvelope::JsonRpc(_) => ProtocolMode::JsonRpc,
            ResponseEnvelope::Legacy(_) => ProtocolMode::LegacyInsApi,
        }
    }

    /// The error indicator, if the device flagged one.
    pub fn fault(&self) -> Option<DeviceFault> {
        match self {
            ResponseEnvelope::JsonRpc(reply) => reply.error.as_ref().map(|err| {
                let detail = err
                    .data
                    .as_ref()
                    .and_then(|d| d.get("msg"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                DeviceFault {
                    code: err.code.to_string(),
                    message: match detail {
                        Some(detail) => format!("{}: {}", err.message, detail),
                        None => err.message.clone(),
                    },
                }
            }),
            ResponseEnvelope::Legacy(reply) => {
                let code = reply
                    .output
                    .code
                    .as_ref()
                    .map(scalar_to_string)
                    .unwrap_or_else(|| INS_API_SUCCESS.to_string());
                if code == INS_API_SUCCESS {
                    return None;
                }
                let message = reply
                    .output
                    .clierror
                    .as_deref()
                    .or(reply.output.msg.as_deref())
                    .unwrap_or("unknown error")
                    .trim()
                    .to_string();
                Some(DeviceFault { code, message })
            }
        }
    }

    /// The command output as a protocol-agnostic value.
    pub fn payload(&self) -> Value {
        match self {
            ResponseEnvelope::JsonRpc(reply) => match &reply.result {
                None | Some(Value::Null) => Value::Null,
                Some(Value::Object(result)) => {
                    if let Some(body) = result.get("body") {
                        unwrap_nested(body.clone())
                    } else if let Some(Value::String(msg)) = result.get("msg") {
                        Value::String(msg.clone())
                    } else {
                        Value::Object(result.clone())
                    }
                }
                Some(other) => unwrap_nested(other.clone()),
            },
            ResponseEnvelope::Legacy(reply) => unwrap_nested(reply.output.body.clone()),
        }
    }

    /// Turns the error indicator into an error, or hands back the payload.
    pub fn into_payload(self, command: &str) -> Result<Value, NxError> {
        if let Some(fault) = self.fault() {
            return Err(NxError::Command {
                command: command.to_string(),
                code: fault.code,
                message: fault.message,
            });
        }
        Ok(self.payload())
    }
}

/// Legacy firmware ships the body as a string of JSON. Strings that do not
/// look like JSON are command text and stay as they are.
fn unwrap_nested(body: Value) -> Value {
    match body {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(inner) => inner,
                    Err(err) => {
                        debug!(error = %err, "body looks like JSON but does not parse; keeping text");
                        Value::String(text)
                    }
                }
            } else {
                Value::String(text)
            }
        }
        other => other,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Decodes a raw reply body into its envelope.
pub fn decode_envelope(raw: &[u8]) -> Result<ResponseEnvelope, NxError> {
    let envelope = match detect_protocol(raw) {
        Some(ProtocolMode::JsonRpc) => decode_jsonrpc(raw)?,
        Some(ProtocolMode::LegacyInsApi) => decode_ins_api(raw)?,
        None => {
            return Err(NxError::UnsupportedPayload {
                body: String::from_utf8_lossy(raw).into_owned(),
            });
        }
    };
    debug!(
        protocol = %envelope.protocol(),
        bytes = raw.len(),
        "decoded response envelope"
    );
    Ok(envelope)
}

fn decode_jsonrpc(raw: &[u8]) -> Result<ResponseEnvelope, NxError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| NxError::format(format!("JSON-RPC reply is not valid JSON: {e}")))?;
    let reply = match value {
        Value::Array(mut replies) => {
            if replies.len() != 1 {
                return Err(NxError::format(format!(
                    "expected exactly one JSON-RPC reply, got {}",
                    replies.len()
                )));
            }
            replies.remove(0)
        }
        // Some firmware answers a batch of one with the bare reply.
        single @ Value::Object(_) => single,
        other => {
            return Err(NxError::format(format!(
                "JSON-RPC reply must be an array or object, got {}",
                type_name(&other)
            )));
        }
    };
    let reply: JsonRpcReply = serde_json::from_value(reply)
        .map_err(|e| NxError::format(format!("JSON-RPC reply: {e}")))?;
    Ok(ResponseEnvelope::JsonRpc(reply))
}

fn decode_ins_api(raw: &[u8]) -> Result<ResponseEnvelope, NxError> {
    let doc: InsApiDocument = serde_json::from_slice(raw)
        .map_err(|e| NxError::format(format!("ins_api reply: {e}")))?;
    let mut outputs = doc.ins_api.outputs.output.into_vec();
    if outputs.len() != 1 {
        return Err(NxError::format(format!(
            "expected exactly one ins_api output, got {}",
            outputs.len()
        )));
    }
    Ok(ResponseEnvelope::Legacy(InsApiReply {
        version: doc.ins_api.version,
        kind: doc.ins_api.kind,
        sid: doc.ins_api.sid,
        output: outputs.remove(0),
    }))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn jsonrpc_body_is_extracted() {
        let raw = bytes(json!([{
            "jsonrpc": "2.0",
            "result": {"body": {"host_name": "leaf-1"}},
            "id": 1
        }]));
        let env = decode_envelope(&raw).unwrap();
        assert_eq!(env.protocol(), ProtocolMode::JsonRpc);
        assert_eq!(
            env.into_payload("show version").unwrap(),
            json!({"host_name": "leaf-1"})
        );
    }

    #[test]
    fn jsonrpc_ascii_msg_is_text() {
        let raw = bytes(json!({
            "jsonrpc": "2.0",
            "result": {"msg": "!Command: show running-config\nhostname leaf-1\n"},
            "id": 1
        }));
        let env = decode_envelope(&raw).unwrap();
        assert_eq!(
            env.payload(),
            Value::String("!Command: show running-config\nhostname leaf-1\n".into())
        );
    }

    #[test]
    fn jsonrpc_batch_must_hold_one_reply() {
        let reply = json!({"jsonrpc": "2.0", "result": null, "id": 1});
        for batch in [json!([]), json!([reply.clone(), reply])] {
            let err = decode_envelope(&bytes(batch)).unwrap_err();
            assert!(matches!(err, NxError::Format { .. }), "{err}");
        }
    }

    #[test]
    fn empty_batch_is_a_format_error() {
        let err = decode_envelope(b" \n[]").unwrap_err();
        match err {
            NxError::Format { reason } => {
                assert_eq!(reason, "expected exactly one JSON-RPC reply, got 0")
            }
            other => panic!("expected format error, got {other:?}"),
        }
        assert_eq!(detect_protocol(b"[]"), Some(ProtocolMode::JsonRpc));
    }

    #[test]
    fn jsonrpc_error_becomes_command_error() {
        let raw = bytes(json!([{
            "jsonrpc": "2.0",
            "error": {
                "code": -32602,
                "message": "Invalid params",
                "data": {"msg": "% Invalid command at '^' marker.\n"}
            },
            "id": 1
        }]));
        let err = decode_envelope(&raw)
            .unwrap()
            .into_payload("show bogus")
            .unwrap_err();
        match err {
            NxError::Command {
                command,
                code,
                message,
            } => {
                assert_eq!(command, "show bogus");
                assert_eq!(code, "-32602");
                assert_eq!(message, "Invalid params: % Invalid command at '^' marker.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn legacy_string_body_is_parsed_again() {
        let inner = json!({"TABLE_vlanbrief": {"ROW_vlanbrief": {"vlanshowbr-vlanid": 1}}});
        let raw = bytes(json!({"ins_api": {
            "type": "cli_show",
            "version": "1.0",
            "sid": "eoc",
            "outputs": {"output": {
                "input": "show vlan",
                "msg": "Success",
                "code": "200",
                "body": inner.to_string()
            }}
        }}));
        let env = decode_envelope(&raw).unwrap();
        assert_eq!(env.protocol(), ProtocolMode::LegacyInsApi);
        assert_eq!(env.into_payload("show vlan").unwrap(), inner);
    }

    #[test]
    fn legacy_error_code_is_a_fault() {
        let raw = bytes(json!({"ins_api": {
            "outputs": {"output": [{
                "input": "show bogus",
                "msg": "Input CLI command error",
                "code": 400,
                "clierror": "% Invalid command\n",
                "body": {}
            }]}
        }}));
        let fault = decode_envelope(&raw).unwrap().fault().unwrap();
        assert_eq!(
            fault,
            DeviceFault {
                code: "400".into(),
                message: "% Invalid command".into()
            }
        );
    }

    #[test]
    fn legacy_output_list_must_hold_one_entry() {
        let raw = bytes(json!({"ins_api": {"outputs": {"output": []}}}));
        assert!(matches!(
            decode_envelope(&raw).unwrap_err(),
            NxError::Format { .. }
        ));
    }

    #[test]
    fn unknown_payload_keeps_original_bytes() {
        let raw = br#"{"status": "ok", "data": []}"#;
        match decode_envelope(raw).unwrap_err() {
            NxError::UnsupportedPayload { body } => {
                assert_eq!(body.as_bytes(), raw.as_slice())
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn detection_needs_the_quoted_key() {
        assert_eq!(detect_protocol(b"jsonrpc ins_api"), None);
        assert_eq!(
            detect_protocol(br#"{"ins_api": {}}"#),
            Some(ProtocolMode::LegacyInsApi)
        );
    }
}
