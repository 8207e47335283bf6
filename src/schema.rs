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

//! Known response shapes for each structured `show` command.
//!
//! Firmware releases rename keys, drop the `TABLE_`/`ROW_` wrappers, or
//! switch numbers to strings. Each shape observed in the field is one
//! [`Candidate`] in the table for its command. Supporting a new firmware
//! variant means adding a candidate here.
//!
//! Paths are dot-separated object keys. A field lists alternative paths;
//! the first one present in the payload is used.

use crate::catalog::LogicalCommand;

/// How a raw JSON value is normalized into its slot.
#[derive(Debug, Clone, Copy)]
pub enum Coerce {
    Text,
    /// JSON number or numeric string, optionally followed by a unit.
    Unsigned,
    /// As `Unsigned`, fractional and negative values allowed.
    Float,
    /// Booleans, numbers and words such as `present` / `not present`.
    Flag,
    /// An array of scalars or a comma-separated string.
    List,
    /// A single object or an array of objects, each read with these fields.
    Rows(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Name the decoder reads the value back under.
    pub slot: &'static str,
    pub paths: &'static [&'static str],
    pub coerce: Coerce,
}

impl Field {
    pub fn describe(&self) -> &'static str {
        match self.coerce {
            Coerce::Text => "text",
            Coerce::Unsigned => "unsigned",
            Coerce::Float => "float",
            Coerce::Flag => "flag",
            Coerce::List => "list",
            Coerce::Rows(_) => "rows",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Variant label, `<entity>.<n>`.
    pub variant: &'static str,
    /// Slots that must be present for the candidate to apply.
    pub required: &'static [&'static str],
    pub fields: &'static [Field],
}

impl Candidate {
    pub fn field(&self, slot: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.slot == slot)
    }
}

const fn text(slot: &'static str, paths: &'static [&'static str]) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::Text,
    }
}

const fn unsigned(slot: &'static str, paths: &'static [&'static str]) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::Unsigned,
    }
}

const fn float(slot: &'static str, paths: &'static [&'static str]) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::Float,
    }
}

const fn flag(slot: &'static str, paths: &'static [&'static str]) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::Flag,
    }
}

const fn list(slot: &'static str, paths: &'static [&'static str]) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::List,
    }
}

const fn rows(
    slot: &'static str,
    paths: &'static [&'static str],
    fields: &'static [Field],
) -> Field {
    Field {
        slot,
        paths,
        coerce: Coerce::Rows(fields),
    }
}

/// Candidate table for `cmd`. Text commands have none.
pub fn candidates(cmd: LogicalCommand) -> &'static [Candidate] {
    match cmd {
        LogicalCommand::SystemInfo => VERSION,
        LogicalCommand::Interfaces => INTERFACES,
        LogicalCommand::Vlans => VLANS,
        LogicalCommand::SystemResources => RESOURCES,
        LogicalCommand::Environment => ENVIRONMENT,
        LogicalCommand::Transceivers => TRANSCEIVERS,
        LogicalCommand::RunningConfig | LogicalCommand::BgpSummary => &[],
    }
}

// show version

const VERSION: &[Candidate] = &[
    // Separate kickstart and system images.
    Candidate {
        variant: "version.1",
        required: &["hostname", "kickstart_version"],
        fields: &[
            text("hostname", &["host_name"]),
            text("processor_board_id", &["proc_board_id"]),
            text("chassis", &["chassis_id"]),
            text("cpu", &["cpu_name"]),
            unsigned("memory", &["memory"]),
            text("memory_unit", &["mem_type"]),
            text("manufacturer", &["manufacturer"]),
            text("bios_version", &["bios_ver_str"]),
            text("bios_compile_time", &["bios_cmpl_time"]),
            text("kickstart_version", &["kickstart_ver_str"]),
            text("kickstart_file", &["kick_file_name"]),
            text("kickstart_compile_time", &["kick_cmpl_time"]),
            text("system_version", &["sys_ver_str"]),
            text("system_file", &["isan_file_name"]),
            text("system_compile_time", &["isan_cmpl_time"]),
            unsigned("uptime_days", &["kern_uptm_days"]),
            unsigned("uptime_hours", &["kern_uptm_hrs"]),
            unsigned("uptime_minutes", &["kern_uptm_mins"]),
            unsigned("uptime_seconds", &["kern_uptm_secs"]),
            text("reset_reason", &["rr_reason"]),
        ],
    },
    // Unified `nxos` image; one version string covers both slots.
    Candidate {
        variant: "version.2",
        required: &["hostname", "kickstart_version"],
        fields: &[
            text("hostname", &["host_name"]),
            text("processor_board_id", &["proc_board_id"]),
            text("chassis", &["chassis_id"]),
            text("cpu", &["cpu_name"]),
            unsigned("memory", &["memory"]),
            text("memory_unit", &["mem_type"]),
            text("manufacturer", &["manufacturer"]),
            text("bios_version", &["bios_ver_str"]),
            text("bios_compile_time", &["bios_cmpl_time"]),
            text("kickstart_version", &["nxos_ver_str"]),
            text("kickstart_file", &["nxos_file_name"]),
            text("kickstart_compile_time", &["nxos_cmpl_time"]),
            text("system_version", &["nxos_ver_str"]),
            text("system_file", &["nxos_file_name"]),
            text("system_compile_time", &["nxos_cmpl_time"]),
            unsigned("uptime_days", &["kern_uptm_days"]),
            unsigned("uptime_hours", &["kern_uptm_hrs"]),
            unsigned("uptime_minutes", &["kern_uptm_mins"]),
            unsigned("uptime_seconds", &["kern_uptm_secs"]),
            text("reset_reason", &["rr_reason"]),
        ],
    },
    // Single system image reported under `sys_ver_str` only.
    Candidate {
        variant: "version.3",
        required: &["hostname", "system_version"],
        fields: &[
            text("hostname", &["host_name", "hostname"]),
            text("processor_board_id", &["proc_board_id"]),
            text("chassis", &["chassis_id"]),
            text("cpu", &["cpu_name"]),
            unsigned("memory", &["memory"]),
            text("memory_unit", &["mem_type"]),
            text("manufacturer", &["manufacturer"]),
            text("bios_version", &["bios_ver_str"]),
            text("kickstart_version", &["sys_ver_str"]),
            text("system_version", &["sys_ver_str"]),
            text("system_file", &["isan_file_name", "sys_file_name"]),
            unsigned("uptime_days", &["kern_uptm_days"]),
            unsigned("uptime_hours", &["kern_uptm_hrs"]),
            unsigned("uptime_minutes", &["kern_uptm_mins"]),
            unsigned("uptime_seconds", &["kern_uptm_secs"]),
            text("reset_reason", &["rr_reason"]),
        ],
    },
];

// show interface

/// Ethernet, management, SVI and loopback rows share the table but not
/// their key prefixes.
const INTERFACE_ROW: &[Field] = &[
    text("name", &["interface"]),
    text("description", &["desc", "svi_desc"]),
    text("state", &["state", "svi_line_proto"]),
    text("state_reason", &["state_rsn_desc", "state_rsn", "svi_rsn_desc"]),
    text("admin_state", &["admin_state", "svi_admin_state"]),
    text("hardware", &["eth_hw_desc", "svi_hw_desc"]),
    text("mac_address", &["eth_hw_addr", "svi_mac", "svi_hw_addr"]),
    text("ip_address", &["eth_ip_addr", "svi_ip_addr"]),
    unsigned("ip_mask", &["eth_ip_mask", "svi_ip_mask"]),
    unsigned("mtu", &["eth_mtu", "svi_mtu"]),
    unsigned("bandwidth", &["eth_bw", "svi_bw"]),
    unsigned("delay", &["eth_dly", "svi_delay"]),
    text("duplex", &["eth_duplex"]),
    text("speed", &["eth_speed"]),
    text("mode", &["eth_mode"]),
    text("media", &["eth_media", "medium"]),
    text("link_flapped", &["eth_link_flapped"]),
    unsigned(
        "in_packets",
        &["eth_inpkts", "vdc_lvl_in_pkts", "loop_in_pkts", "svi_ucast_pkts_in"],
    ),
    unsigned(
        "in_bytes",
        &["eth_inbytes", "vdc_lvl_in_bytes", "loop_in_bytes", "svi_ucast_bytes_in"],
    ),
    unsigned("in_errors", &["eth_inerr", "loop_in_errors"]),
    unsigned(
        "out_packets",
        &["eth_outpkts", "vdc_lvl_out_pkts", "loop_out_pkts", "svi_ucast_pkts_out"],
    ),
    unsigned(
        "out_bytes",
        &["eth_outbytes", "vdc_lvl_out_bytes", "loop_out_bytes", "svi_ucast_bytes_out"],
    ),
    unsigned("out_errors", &["eth_outerr", "loop_out_errors"]),
];

const INTERFACES: &[Candidate] = &[
    Candidate {
        variant: "interfaces.1",
        required: &["interfaces"],
        fields: &[rows(
            "interfaces",
            &["TABLE_interface.ROW_interface"],
            INTERFACE_ROW,
        )],
    },
    // Rows without the TABLE_ wrapper.
    Candidate {
        variant: "interfaces.2",
        required: &["interfaces"],
        fields: &[rows("interfaces", &["ROW_interface"], INTERFACE_ROW)],
    },
];

// show vlan

const VLAN_BRIEF_ROW: &[Field] = &[
    unsigned("id", &["vlanshowbr-vlanid", "vlanshowbr-vlanid-utf"]),
    text("name", &["vlanshowbr-vlanname"]),
    text("state", &["vlanshowbr-vlanstate"]),
    flag("shutdown", &["vlanshowbr-shutstate"]),
    list("ports", &["vlanshowplist-ifidx"]),
];

const VLAN_INFO_ROW: &[Field] = &[
    unsigned("id", &["vlanshowinfo-vlanid"]),
    text("media_type", &["vlanshowinfo-media-type"]),
    text("mode", &["vlanshowinfo-vlanmode"]),
    unsigned("mtu", &["vlanshowinfo-mtu", "vlanshowinfo-vlanmtu"]),
];

const VLANS: &[Candidate] = &[
    // `show vlan brief` style: membership only.
    Candidate {
        variant: "vlans.1",
        required: &["brief"],
        fields: &[rows(
            "brief",
            &["TABLE_vlanbrief.ROW_vlanbrief"],
            VLAN_BRIEF_ROW,
        )],
    },
    // Membership plus the per-VLAN media/mode table.
    Candidate {
        variant: "vlans.2",
        required: &["brief", "info"],
        fields: &[
            rows(
                "brief",
                &["TABLE_vlanbrief.ROW_vlanbrief"],
                VLAN_BRIEF_ROW,
            ),
            rows("info", &["TABLE_mtuinfo.ROW_mtuinfo"], VLAN_INFO_ROW),
        ],
    },
];

// show system resources

const CPU_ROW: &[Field] = &[
    unsigned("id", &["cpuid"]),
    float("user", &["user"]),
    float("kernel", &["kernel"]),
    float("idle", &["idle"]),
];

const RESOURCES: &[Candidate] = &[
    // Totals plus the per-CPU table.
    Candidate {
        variant: "resources.1",
        required: &["processes_total", "cpus"],
        fields: &[
            float("load_1min", &["load_avg_1min"]),
            float("load_5min", &["load_avg_5min"]),
            float("load_15min", &["load_avg_15min"]),
            unsigned("processes_total", &["processes_total"]),
            unsigned("processes_running", &["processes_running"]),
            float("cpu_user", &["cpu_state_user"]),
            float("cpu_kernel", &["cpu_state_kernel"]),
            float("cpu_idle", &["cpu_state_idle"]),
            unsigned("memory_total", &["memory_usage_total"]),
            unsigned("memory_used", &["memory_usage_used"]),
            unsigned("memory_free", &["memory_usage_free"]),
            text("memory_status", &["current_memory_status"]),
            rows("cpus", &["TABLE_cpu_usage.ROW_cpu_usage"], CPU_ROW),
        ],
    },
    // Aggregate-only firmware without the per-CPU table.
    Candidate {
        variant: "resources.2",
        required: &["load_1min"],
        fields: &[
            float("load_1min", &["load_avg_1min"]),
            float("load_5min", &["load_avg_5min"]),
            float("load_15min", &["load_avg_15min"]),
            unsigned("processes_total", &["processes_total"]),
            unsigned("processes_running", &["processes_running"]),
            float("cpu_user", &["cpu_state_user"]),
            float("cpu_kernel", &["cpu_state_kernel"]),
            float("cpu_idle", &["cpu_state_idle"]),
            unsigned("memory_total", &["memory_usage_total"]),
            unsigned("memory_used", &["memory_usage_used"]),
            unsigned("memory_free", &["memory_usage_free"]),
            text("memory_status", &["current_memory_status"]),
        ],
    },
];

// show environment

const FAN_ROW: &[Field] = &[
    text("name", &["fanname"]),
    text("model", &["fanmodel"]),
    text("hardware_version", &["fanhwver"]),
    text("direction", &["fandir"]),
    unsigned("speed", &["fanperc", "fan_speed"]),
    text("status", &["fanstatus"]),
];

const PSU_ROW: &[Field] = &[
    unsigned("number", &["psnum"]),
    text("model", &["psmodel"]),
    float("output", &["actual_out", "watts"]),
    float("input", &["actual_input", "input_watts"]),
    float("capacity", &["tot_capa"]),
    text("status", &["ps_status", "status"]),
];

const SENSOR_ROW: &[Field] = &[
    unsigned("module", &["tempmod"]),
    text("name", &["sensor"]),
    float("temperature", &["curtemp"]),
    float("major_threshold", &["majthres"]),
    float("minor_threshold", &["minthres"]),
    text("status", &["alarmstatus"]),
];

const ENVIRONMENT: &[Candidate] = &[
    // Fans and power supplies nested under their own sections.
    Candidate {
        variant: "environment.1",
        required: &["fans", "power_supplies"],
        fields: &[
            rows("fans", &["fandetails.TABLE_faninfo.ROW_faninfo"], FAN_ROW),
            rows(
                "power_supplies",
                &["powersup.TABLE_psinfo.ROW_psinfo"],
                PSU_ROW,
            ),
            rows("sensors", &["TABLE_tempinfo.ROW_tempinfo"], SENSOR_ROW),
            unsigned("voltage", &["powersup.voltage_level"]),
            text(
                "redundancy_mode",
                &[
                    "powersup.power_summary.ps_redun_mode",
                    "powersup.power_summary.ps_redun_op_mode",
                ],
            ),
            float(
                "total_capacity",
                &["powersup.power_summary.tot_pow_capacity"],
            ),
            float(
                "total_output",
                &["powersup.power_summary.tot_pow_out_actual_draw"],
            ),
            float("available", &["powersup.power_summary.available_pow"]),
        ],
    },
    // Everything flattened to the top level.
    Candidate {
        variant: "environment.2",
        required: &["fans", "power_supplies"],
        fields: &[
            rows("fans", &["TABLE_faninfo.ROW_faninfo"], FAN_ROW),
            rows("power_supplies", &["TABLE_psinfo.ROW_psinfo"], PSU_ROW),
            rows("sensors", &["TABLE_tempinfo.ROW_tempinfo"], SENSOR_ROW),
            unsigned("voltage", &["voltage_level"]),
            text(
                "redundancy_mode",
                &["power_summary.ps_redun_mode", "ps_redun_mode"],
            ),
            float(
                "total_capacity",
                &["power_summary.tot_pow_capacity", "tot_pow_capacity"],
            ),
            float(
                "total_output",
                &[
                    "power_summary.tot_pow_out_actual_draw",
                    "tot_pow_out_actual_draw",
                ],
            ),
            float(
                "available",
                &["power_summary.available_pow", "available_pow"],
            ),
        ],
    },
];

// show interface transceiver details

const LANE_ROW: &[Field] = &[
    unsigned("lane", &["lane_number"]),
    float("temperature", &["temperature"]),
    float("voltage", &["voltage"]),
    float("current", &["current"]),
    float("tx_power", &["tx_pwr"]),
    float("rx_power", &["rx_pwr"]),
];

/// Single-lane optics may report their readings on the row itself instead
/// of in a lane table; the same slots are read there.
const TRANSCEIVER_ROW: &[Field] = &[
    text("interface", &["interface"]),
    flag("present", &["sfp"]),
    text("kind", &["type"]),
    text("vendor", &["name"]),
    text("part_number", &["partnum"]),
    text("revision", &["rev"]),
    text("serial_number", &["serialnum"]),
    unsigned("nominal_bitrate", &["nom_bitrate"]),
    text("cisco_id", &["ciscoid"]),
    rows("lanes", &["TABLE_lane.ROW_lane"], LANE_ROW),
    float("temperature", &["temperature"]),
    float("voltage", &["voltage"]),
    float("current", &["current"]),
    float("tx_power", &["tx_pwr"]),
    float("rx_power", &["rx_pwr"]),
];

const TRANSCEIVERS: &[Candidate] = &[
    Candidate {
        variant: "transceivers.1",
        required: &["transceivers"],
        fields: &[rows(
            "transceivers",
            &["TABLE_interface.ROW_interface"],
            TRANSCEIVER_ROW,
        )],
    },
    Candidate {
        variant: "transceivers.2",
        required: &["transceivers"],
        fields: &[rows("transceivers", &["ROW_interface"], TRANSCEIVER_ROW)],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn required_slots_exist_in_their_candidate() {
        for cmd in LogicalCommand::ALL {
            for candidate in candidates(cmd) {
                for slot in candidate.required {
                    assert!(
                        candidate.field(slot).is_some(),
                        "{} requires unknown slot {}",
                        candidate.variant,
                        slot
                    );
                }
            }
        }
    }

    #[test]
    fn variant_labels_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for cmd in LogicalCommand::ALL {
            for candidate in candidates(cmd) {
                assert!(seen.insert(candidate.variant), "{}", candidate.variant);
                assert!(candidate.variant.contains('.'));
            }
        }
    }

    #[test]
    fn text_commands_have_no_candidates() {
        assert!(candidates(LogicalCommand::RunningConfig).is_empty());
        assert!(candidates(LogicalCommand::BgpSummary).is_empty());
        assert!(!candidates(LogicalCommand::Vlans).is_empty());
    }
}
