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

//! Typed results handed back to callers.
//!
//! Every field has a zero value; a field the device firmware does not
//! report stays at it.

use serde::Serialize;

/// `show version`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub processor_board_id: String,
    pub chassis: String,
    pub cpu: String,
    /// Installed memory, in `memory_unit`.
    pub memory: u64,
    pub memory_unit: String,
    pub manufacturer: String,
    pub bios: ImageInfo,
    pub kickstart_image: ImageInfo,
    pub system_image: ImageInfo,
    /// Kernel uptime in seconds.
    pub uptime: u64,
    pub last_reset_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub version: String,
    pub file: String,
    pub compile_time: String,
}

/// One row of `show interface`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interface {
    pub name: String,
    pub description: String,
    pub state: String,
    pub state_reason: String,
    pub admin_state: String,
    pub hardware: String,
    pub mac_address: String,
    pub ip_address: String,
    pub ip_mask: u64,
    pub mtu: u64,
    /// Kbit/s.
    pub bandwidth: u64,
    /// Microseconds.
    pub delay: u64,
    pub duplex: String,
    pub speed: String,
    pub mode: String,
    pub media: String,
    pub link_flapped: String,
    pub counters: InterfaceCounters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub in_packets: u64,
    pub in_bytes: u64,
    pub in_errors: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
    pub out_errors: u64,
}

/// One row of `show vlan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vlan {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub shutdown: bool,
    pub ports: Vec<String>,
    pub mtu: u64,
    pub media_type: String,
    pub mode: String,
}

/// `show system resources`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemResources {
    pub load_avg_1min: f64,
    pub load_avg_5min: f64,
    pub load_avg_15min: f64,
    pub processes: Processes,
    /// Aggregate over all CPUs.
    pub cpu_state: CpuUsage,
    pub cpus: Vec<CpuUsage>,
    pub memory: MemoryUsage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Processes {
    pub total: u64,
    pub running: u64,
}

/// Percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    pub id: u64,
    pub user: f64,
    pub kernel: f64,
    pub idle: f64,
}

/// Kilobytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub status: String,
}

/// `show environment`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Environment {
    pub fans: Vec<Fan>,
    pub power_supplies: Vec<PowerSupply>,
    pub sensors: Vec<Sensor>,
    pub power_summary: PowerSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Fan {
    pub name: String,
    pub model: String,
    pub hardware_version: String,
    pub direction: String,
    /// Percent of full speed.
    pub speed: u64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerSupply {
    pub number: u64,
    pub model: String,
    /// Watts.
    pub output: f64,
    /// Watts.
    pub input: f64,
    /// Watts.
    pub capacity: f64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerSummary {
    pub redundancy_mode: String,
    pub voltage: u64,
    /// Watts.
    pub total_capacity: f64,
    /// Watts.
    pub total_output: f64,
    /// Watts.
    pub available: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sensor {
    pub module: u64,
    pub name: String,
    /// Celsius, as are the thresholds.
    pub temperature: f64,
    pub major_threshold: f64,
    pub minor_threshold: f64,
    pub status: String,
}

/// `show running-config`, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunningConfig {
    pub text: String,
}

/// `show ip bgp summary vrf all`, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BgpSummary {
    pub text: String,
}

/// One row of `show interface transceiver details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transceiver {
    pub interface: String,
    pub present: bool,
    pub kind: String,
    pub vendor: String,
    pub part_number: String,
    pub revision: String,
    pub serial_number: String,
    /// MBit/s.
    pub nominal_bitrate: u64,
    pub cisco_id: String,
    pub lanes: Vec<TransceiverLane>,
}

/// Digital optical monitoring readings for one lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransceiverLane {
    pub lane: u64,
    /// Celsius.
    pub temperature: f64,
    /// Volts.
    pub voltage: f64,
    /// Milliamps.
    pub current: f64,
    /// dBm.
    pub tx_power: f64,
    /// dBm.
    pub rx_power: f64,
}

/// Any decoded result, tagged by the command that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEntity {
    SystemInfo(SystemInfo),
    Interfaces(Vec<Interface>),
    Vlans(Vec<Vlan>),
    SystemResources(SystemResources),
    Environment(Environment),
    RunningConfig(RunningConfig),
    BgpSummary(BgpSummary),
    Transceivers(Vec<Transceiver>),
}

impl DomainEntity {
    /// Free text for the text-only commands.
    pub fn text(&self) -> Option<&str> {
        match self {
            DomainEntity::RunningConfig(cfg) => Some(&cfg.text),
            DomainEntity::BgpSummary(bgp) => Some(&bgp.text),
            _ => None,
        }
    }
}
