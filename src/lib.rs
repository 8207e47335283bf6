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

//! Client for the Cisco NX-API `/ins` endpoint.
//!
//! A fixed catalog of show commands is encoded as either a JSON-RPC batch
//! of one or a legacy `ins_api` document, posted to the device, unwrapped
//! from its response envelope and decoded into typed results. Firmware
//! releases disagree on payload layout, so each command is decoded against
//! a table of known shapes.

pub mod catalog;
pub mod client;
pub mod config;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod model;
pub mod request;
pub mod schema;

pub use catalog::{LogicalCommand, OutputKind};
pub use client::{NxClient, Transport};
pub use config::{ClientConfig, Scheme};
pub use decode::{Decoded, decode_domain};
pub use envelope::{ResponseEnvelope, decode_envelope};
pub use error::{CoercionWarning, NxError};
pub use model::DomainEntity;
pub use request::{ProtocolMode, RequestEnvelope, encode};
