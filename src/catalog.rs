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

//! The fixed catalog of `show` queries the client knows how to issue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported device query, decoupled from the literal CLI string sent
/// over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalCommand {
    SystemInfo,
    Interfaces,
    Vlans,
    SystemResources,
    Environment,
    RunningConfig,
    BgpSummary,
    Transceivers,
}

/// How the device is asked to render the command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Output comes back as a JSON document.
    Structured,
    /// Output comes back as the plain CLI text.
    Text,
}

impl LogicalCommand {
    pub const ALL: [LogicalCommand; 8] = [
        LogicalCommand::SystemInfo,
        LogicalCommand::Interfaces,
        LogicalCommand::Vlans,
        LogicalCommand::SystemResources,
        LogicalCommand::Environment,
        LogicalCommand::RunningConfig,
        LogicalCommand::BgpSummary,
        LogicalCommand::Transceivers,
    ];

    /// Canonical CLI string sent to the device.
    pub fn command_string(self) -> &'static str {
        match self {
            LogicalCommand::SystemInfo => "show version",
            LogicalCommand::Interfaces => "show interface",
            LogicalCommand::Vlans => "show vlan",
            LogicalCommand::SystemResources => "show system resources",
            LogicalCommand::Environment => "show environment",
            LogicalCommand::RunningConfig => "show running-config",
            LogicalCommand::BgpSummary => "show ip bgp summary vrf all",
            LogicalCommand::Transceivers => "show interface transceiver details",
        }
    }

    pub fn output_kind(self) -> OutputKind {
        match self {
            LogicalCommand::RunningConfig | LogicalCommand::BgpSummary => OutputKind::Text,
            _ => OutputKind::Structured,
        }
    }

    /// Short name used on the command line and in log fields.
    pub fn name(self) -> &'static str {
        match self {
            LogicalCommand::SystemInfo => "system-info",
            LogicalCommand::Interfaces => "interfaces",
            LogicalCommand::Vlans => "vlans",
            LogicalCommand::SystemResources => "system-resources",
            LogicalCommand::Environment => "environment",
            LogicalCommand::RunningConfig => "running-config",
            LogicalCommand::BgpSummary => "bgp-summary",
            LogicalCommand::Transceivers => "transceivers",
        }
    }

    /// Reverse lookup from a CLI string, used when reading requests back.
    pub fn from_command_string(command: &str) -> Option<Self> {
        let normalized = command.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.command_string() == normalized)
    }
}

impl fmt::Display for LogicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command `{0}`")]
pub struct UnknownCommand(pub String);

impl FromStr for LogicalCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == needle)
            .or_else(|| Self::from_command_string(needle))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn command_strings_are_unique() {
        let strings: HashSet<_> = LogicalCommand::ALL
            .iter()
            .map(|c| c.command_string())
            .collect();
        assert_eq!(strings.len(), LogicalCommand::ALL.len());
    }

    #[test]
    fn only_config_and_bgp_are_text() {
        let text: Vec<_> = LogicalCommand::ALL
            .into_iter()
            .filter(|c| c.output_kind() == OutputKind::Text)
            .collect();
        assert_eq!(
            text,
            vec![LogicalCommand::RunningConfig, LogicalCommand::BgpSummary]
        );
    }

    #[test]
    fn parses_names_and_command_strings() {
        assert_eq!(
            "vlans".parse::<LogicalCommand>().unwrap(),
            LogicalCommand::Vlans
        );
        assert_eq!(
            "show  ip bgp summary vrf all".parse::<LogicalCommand>().unwrap(),
            LogicalCommand::BgpSummary
        );
        let err = "show clock".parse::<LogicalCommand>().unwrap_err();
        assert_eq!(err.to_string(), "unknown command `show clock`");
    }
}
