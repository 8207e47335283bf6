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

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How many characters of a raw body or payload are kept in error messages.
pub const EXCERPT_LEN: usize = 240;

#[derive(Debug, Error)]
pub enum NxError {
    /// Network failure or a non-2xx HTTP status.
    #[error("`{command}` failed{}: {reason}{}", status_suffix(.status), body_suffix(.body))]
    Transport {
        command: String,
        status: Option<u16>,
        body: String,
        reason: String,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    /// The reply carried neither a JSON-RPC nor an `ins_api` marker.
    #[error("unsupported payload: {}", excerpt(.body))]
    UnsupportedPayload { body: String },

    /// The envelope was recognised but is malformed.
    #[error("malformed response envelope: {reason}")]
    Format { reason: String },

    /// The device accepted the request but reported an error for the command.
    #[error("device rejected `{command}` (code {code}): {message}")]
    Command {
        command: String,
        code: String,
        message: String,
    },

    /// The payload matched none of the known shapes for the entity.
    #[error("no known {entity} schema matches payload: {snippet}")]
    SchemaMismatch { entity: &'static str, snippet: String },

    #[error("encoding request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),

    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl NxError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        NxError::Format {
            reason: reason.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {s}")).unwrap_or_default()
}

fn body_suffix(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" ({})", excerpt(trimmed))
    }
}

/// Truncates `text` to [`EXCERPT_LEN`] characters on a char boundary.
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// A single field that was present in the payload but could not be coerced
/// to its declared type. The field is left at its zero value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CoercionWarning {
    pub entity: &'static str,
    pub field: String,
    pub raw: String,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: could not coerce `{}` from {}, using zero value",
            self.entity, self.field, self.raw
        )
    }
}
