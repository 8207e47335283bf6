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

//! Decoding of command payloads into domain entities.
//!
//! A payload is matched against the candidate table of its command (see
//! [`crate::schema`]). Of the candidates whose required slots are present,
//! the one with the most fields present wins; ties go to table order. The
//! winner's fields are then read best effort into a [`Record`], coercing
//! each value on the way. A value that is present but cannot be coerced
//! leaves its slot empty and is reported as a [`CoercionWarning`].

use crate::catalog::LogicalCommand;
use crate::error::{CoercionWarning, NxError, excerpt};
use crate::model::*;
use crate::schema::{Candidate, Coerce, Field, candidates};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, warn};

const FLAG_TRUE: &[&str] = &[
    "true", "yes", "on", "enabled", "present", "shutdown", "1",
];
const FLAG_FALSE: &[&str] = &[
    "false",
    "no",
    "off",
    "disabled",
    "not present",
    "absent",
    "noshutdown",
    "0",
];

/// A decoded value plus what the decoder learned on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    /// Label of the schema variant that matched.
    pub variant: &'static str,
    pub warnings: Vec<CoercionWarning>,
}

impl<T> Decoded<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            variant: self.variant,
            warnings: self.warnings,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Text(String),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
    List(Vec<String>),
    Rows(Vec<Record>),
}

/// Normalized values of one object, keyed by slot name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    slots: HashMap<&'static str, Slot>,
}

impl Record {
    pub fn has(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    pub fn text(&self, slot: &str) -> String {
        match self.slots.get(slot) {
            Some(Slot::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn unsigned(&self, slot: &str) -> u64 {
        match self.slots.get(slot) {
            Some(Slot::Unsigned(n)) => *n,
            _ => 0,
        }
    }

    pub fn float(&self, slot: &str) -> f64 {
        match self.slots.get(slot) {
            Some(Slot::Float(n)) => *n,
            _ => 0.0,
        }
    }

    pub fn flag(&self, slot: &str) -> bool {
        matches!(self.slots.get(slot), Some(Slot::Flag(true)))
    }

    pub fn list(&self, slot: &str) -> Vec<String> {
        match self.slots.get(slot) {
            Some(Slot::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn rows(&self, slot: &str) -> &[Record] {
        match self.slots.get(slot) {
            Some(Slot::Rows(rows)) => rows,
            _ => &[],
        }
    }
}

/// Resolves a dot path. `null` counts as absent.
fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
        .filter(|found| !found.is_null())
}

fn locate<'v>(field: &Field, value: &'v Value) -> Option<(&'static str, &'v Value)> {
    field
        .paths
        .iter()
        .find_map(|path| lookup(value, path).map(|found| (*path, found)))
}

fn is_present(field: &Field, value: &Value) -> bool {
    locate(field, value).is_some()
}

/// Whether a required value has the shape its rule can decode.
fn fits(coerce: Coerce, raw: &Value) -> bool {
    match coerce {
        Coerce::Text => !raw.is_object() && !raw.is_array(),
        Coerce::Unsigned => coerce_unsigned(raw).is_some(),
        Coerce::Float => coerce_float(raw).is_some(),
        Coerce::Flag => coerce_flag(raw).is_some(),
        Coerce::List => coerce_list(raw).is_some(),
        Coerce::Rows(_) => raw.is_object() || raw.is_array(),
    }
}

fn qualifies(candidate: &Candidate, payload: &Value) -> bool {
    candidate.required.iter().all(|slot| {
        candidate.field(slot).is_some_and(|field| {
            locate(field, payload).is_some_and(|(_, raw)| fits(field.coerce, raw))
        })
    })
}

fn score(candidate: &Candidate, payload: &Value) -> usize {
    candidate
        .fields
        .iter()
        .filter(|field| is_present(field, payload))
        .count()
}

/// Picks the most specific qualifying candidate.
pub fn select<'c>(table: &'c [Candidate], payload: &Value) -> Option<&'c Candidate> {
    let mut best: Option<(&Candidate, usize)> = None;
    for candidate in table.iter().filter(|c| qualifies(c, payload)) {
        let score = score(candidate, payload);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

struct Extractor<'w> {
    entity: &'static str,
    warnings: &'w mut Vec<CoercionWarning>,
}

impl Extractor<'_> {
    fn record(&mut self, value: &Value, fields: &[Field]) -> Record {
        let mut record = Record::default();
        for field in fields {
            let Some((path, raw)) = locate(field, value) else {
                continue;
            };
            // Firmware leaves unknown readings as "", which is not malformed.
            if !matches!(field.coerce, Coerce::Text)
                && raw.as_str().is_some_and(|s| s.trim().is_empty())
            {
                continue;
            }
            match self.coerce(field.coerce, raw) {
                Some(slot) => {
                    record.slots.insert(field.slot, slot);
                }
                None => self.degrade(path, raw),
            }
        }
        record
    }

    fn coerce(&mut self, coerce: Coerce, raw: &Value) -> Option<Slot> {
        match coerce {
            Coerce::Text => Some(Slot::Text(coerce_text(raw))),
            Coerce::Unsigned => coerce_unsigned(raw).map(Slot::Unsigned),
            Coerce::Float => coerce_float(raw).map(Slot::Float),
            Coerce::Flag => coerce_flag(raw).map(Slot::Flag),
            Coerce::List => coerce_list(raw).map(Slot::List),
            Coerce::Rows(fields) => {
                let items: Vec<&Value> = match raw {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(_) => vec![raw],
                    _ => return None,
                };
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_object() {
                        rows.push(self.record(item, fields));
                    } else {
                        self.degrade("<row>", item);
                    }
                }
                Some(Slot::Rows(rows))
            }
        }
    }

    fn degrade(&mut self, path: &str, raw: &Value) {
        let warning = CoercionWarning {
            entity: self.entity,
            field: path.to_string(),
            raw: excerpt(&raw.to_string()),
        };
        warn!(
            entity = warning.entity,
            field = %warning.field,
            raw = %warning.raw,
            "field degraded to zero value"
        );
        self.warnings.push(warning);
    }
}

fn coerce_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Leading number of a string such as `"109 W"`, `"40C"` or `"12.5%"`.
fn numeric_prefix(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|&(idx, c)| !(c.is_ascii_digit() || c == '.' || (idx == 0 && (c == '-' || c == '+'))))
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    let (number, rest) = trimmed.split_at(end);
    let unit_follows = rest
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || c == '%' || c.is_alphabetic());
    if number.is_empty() || !unit_follows {
        None
    } else {
        Some(number)
    }
}

fn coerce_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => numeric_prefix(s)?.parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_unsigned(raw: &Value) -> Option<u64> {
    if let Value::Number(n) = raw
        && let Some(exact) = n.as_u64()
    {
        return Some(exact);
    }
    if let Value::String(s) = raw
        && let Some(exact) = numeric_prefix(s).and_then(|p| p.parse::<u64>().ok())
    {
        return Some(exact);
    }
    coerce_float(raw)
        .filter(|n| *n >= 0.0 && *n <= u64::MAX as f64)
        .map(|n| n.trunc() as u64)
}

fn coerce_flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => {
            let word = s.trim().to_ascii_lowercase();
            if FLAG_TRUE.contains(&word.as_str()) {
                Some(true)
            } else if FLAG_FALSE.contains(&word.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn coerce_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::Array(items) => Some(
            items
                .iter()
                .filter(|item| !item.is_null() && !item.is_object() && !item.is_array())
                .map(coerce_text)
                .flat_map(|item| split_list(&item))
                .collect(),
        ),
        Value::String(s) => Some(split_list(s)),
        Value::Number(_) | Value::Bool(_) => Some(vec![raw.to_string()]),
        _ => None,
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A structured payload that arrived as a string of JSON is parsed again.
fn reparse(payload: &Value) -> Cow<'_, Value> {
    if let Value::String(text) = payload
        && let Ok(inner @ (Value::Object(_) | Value::Array(_))) =
            serde_json::from_str::<Value>(text)
    {
        return Cow::Owned(inner);
    }
    Cow::Borrowed(payload)
}

fn decode_with<T>(
    cmd: LogicalCommand,
    payload: &Value,
    build: fn(&Record) -> T,
) -> Result<Decoded<T>, NxError> {
    let payload = reparse(payload);
    let candidate =
        select(candidates(cmd), &payload).ok_or_else(|| NxError::SchemaMismatch {
            entity: cmd.name(),
            snippet: excerpt(&payload.to_string()),
        })?;

    let mut warnings = Vec::new();
    let record = Extractor {
        entity: cmd.name(),
        warnings: &mut warnings,
    }
    .record(&payload, candidate.fields);

    debug!(
        entity = cmd.name(),
        variant = candidate.variant,
        warnings = warnings.len(),
        "decoded payload"
    );
    Ok(Decoded {
        value: build(&record),
        variant: candidate.variant,
        warnings,
    })
}

/// Text output is kept verbatim; anything structured is kept as its JSON.
fn decode_text(payload: &Value) -> Decoded<String> {
    let text = match payload {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Decoded {
        value: text,
        variant: "text",
        warnings: Vec::new(),
    }
}

pub fn decode_system_info(payload: &Value) -> Result<Decoded<SystemInfo>, NxError> {
    decode_with(LogicalCommand::SystemInfo, payload, build_system_info)
}

pub fn decode_interfaces(payload: &Value) -> Result<Decoded<Vec<Interface>>, NxError> {
    decode_with(LogicalCommand::Interfaces, payload, |rec| {
        rec.rows("interfaces").iter().map(build_interface).collect()
    })
}

pub fn decode_vlans(payload: &Value) -> Result<Decoded<Vec<Vlan>>, NxError> {
    decode_with(LogicalCommand::Vlans, payload, build_vlans)
}

pub fn decode_system_resources(payload: &Value) -> Result<Decoded<SystemResources>, NxError> {
    decode_with(
        LogicalCommand::SystemResources,
        payload,
        build_system_resources,
    )
}

pub fn decode_environment(payload: &Value) -> Result<Decoded<Environment>, NxError> {
    decode_with(LogicalCommand::Environment, payload, build_environment)
}

pub fn decode_transceivers(payload: &Value) -> Result<Decoded<Vec<Transceiver>>, NxError> {
    decode_with(LogicalCommand::Transceivers, payload, |rec| {
        rec.rows("transceivers").iter().map(build_transceiver).collect()
    })
}

pub fn decode_running_config(payload: &Value) -> Decoded<RunningConfig> {
    decode_text(payload).map(|text| RunningConfig { text })
}

pub fn decode_bgp_summary(payload: &Value) -> Decoded<BgpSummary> {
    decode_text(payload).map(|text| BgpSummary { text })
}

/// Decodes `payload` as the output of `cmd`.
pub fn decode_domain(cmd: LogicalCommand, payload: &Value) -> Result<Decoded<DomainEntity>, NxError> {
    Ok(match cmd {
        LogicalCommand::SystemInfo => decode_system_info(payload)?.map(DomainEntity::SystemInfo),
        LogicalCommand::Interfaces => decode_interfaces(payload)?.map(DomainEntity::Interfaces),
        LogicalCommand::Vlans => decode_vlans(payload)?.map(DomainEntity::Vlans),
        LogicalCommand::SystemResources => {
            decode_system_resources(payload)?.map(DomainEntity::SystemResources)
        }
        LogicalCommand::Environment => decode_environment(payload)?.map(DomainEntity::Environment),
        LogicalCommand::RunningConfig => {
            decode_running_config(payload).map(DomainEntity::RunningConfig)
        }
        LogicalCommand::BgpSummary => decode_bgp_summary(payload).map(DomainEntity::BgpSummary),
        LogicalCommand::Transceivers => {
            decode_transceivers(payload)?.map(DomainEntity::Transceivers)
        }
    })
}

fn image(rec: &Record, prefix: &str) -> ImageInfo {
    ImageInfo {
        version: rec.text(&format!("{prefix}_version")),
        file: rec.text(&format!("{prefix}_file")),
        compile_time: rec.text(&format!("{prefix}_compile_time")),
    }
}

fn build_system_info(rec: &Record) -> SystemInfo {
    let uptime = rec
        .unsigned("uptime_days")
        .saturating_mul(86_400)
        .saturating_add(rec.unsigned("uptime_hours").saturating_mul(3_600))
        .saturating_add(rec.unsigned("uptime_minutes").saturating_mul(60))
        .saturating_add(rec.unsigned("uptime_seconds"));
    SystemInfo {
        hostname: rec.text("hostname"),
        processor_board_id: rec.text("processor_board_id"),
        chassis: rec.text("chassis"),
        cpu: rec.text("cpu"),
        memory: rec.unsigned("memory"),
        memory_unit: rec.text("memory_unit"),
        manufacturer: rec.text("manufacturer"),
        bios: image(rec, "bios"),
        kickstart_image: image(rec, "kickstart"),
        system_image: image(rec, "system"),
        uptime,
        last_reset_reason: rec.text("reset_reason"),
    }
}

fn build_interface(row: &Record) -> Interface {
    Interface {
        name: row.text("name"),
        description: row.text("description"),
        state: row.text("state"),
        state_reason: row.text("state_reason"),
        admin_state: row.text("admin_state"),
        hardware: row.text("hardware"),
        mac_address: row.text("mac_address"),
        ip_address: row.text("ip_address"),
        ip_mask: row.unsigned("ip_mask"),
        mtu: row.unsigned("mtu"),
        bandwidth: row.unsigned("bandwidth"),
        delay: row.unsigned("delay"),
        duplex: row.text("duplex"),
        speed: row.text("speed"),
        mode: row.text("mode"),
        media: row.text("media"),
        link_flapped: row.text("link_flapped"),
        counters: InterfaceCounters {
            in_packets: row.unsigned("in_packets"),
            in_bytes: row.unsigned("in_bytes"),
            in_errors: row.unsigned("in_errors"),
            out_packets: row.unsigned("out_packets"),
            out_bytes: row.unsigned("out_bytes"),
            out_errors: row.unsigned("out_errors"),
        },
    }
}

/// Joins the membership rows with the media/mode rows on the VLAN id.
fn build_vlans(rec: &Record) -> Vec<Vlan> {
    let info: HashMap<u64, &Record> = rec
        .rows("info")
        .iter()
        .map(|row| (row.unsigned("id"), row))
        .collect();
    rec.rows("brief")
        .iter()
        .map(|row| {
            let id = row.unsigned("id");
            let extra = info.get(&id);
            Vlan {
                id,
                name: row.text("name"),
                state: row.text("state"),
                shutdown: row.flag("shutdown"),
                ports: row.list("ports"),
                mtu: extra.map(|r| r.unsigned("mtu")).unwrap_or_default(),
                media_type: extra.map(|r| r.text("media_type")).unwrap_or_default(),
                mode: extra.map(|r| r.text("mode")).unwrap_or_default(),
            }
        })
        .collect()
}

fn build_system_resources(rec: &Record) -> SystemResources {
    SystemResources {
        load_avg_1min: rec.float("load_1min"),
        load_avg_5min: rec.float("load_5min"),
        load_avg_15min: rec.float("load_15min"),
        processes: Processes {
            total: rec.unsigned("processes_total"),
            running: rec.unsigned("processes_running"),
        },
        cpu_state: CpuUsage {
            id: 0,
            user: rec.float("cpu_user"),
            kernel: rec.float("cpu_kernel"),
            idle: rec.float("cpu_idle"),
        },
        cpus: rec
            .rows("cpus")
            .iter()
            .map(|row| CpuUsage {
                id: row.unsigned("id"),
                user: row.float("user"),
                kernel: row.float("kernel"),
                idle: row.float("idle"),
            })
            .collect(),
        memory: MemoryUsage {
            total: rec.unsigned("memory_total"),
            used: rec.unsigned("memory_used"),
            free: rec.unsigned("memory_free"),
            status: rec.text("memory_status"),
        },
    }
}

fn build_environment(rec: &Record) -> Environment {
    Environment {
        fans: rec
            .rows("fans")
            .iter()
            .map(|row| Fan {
                name: row.text("name"),
                model: row.text("model"),
                hardware_version: row.text("hardware_version"),
                direction: row.text("direction"),
                speed: row.unsigned("speed"),
                status: row.text("status"),
            })
            .collect(),
        power_supplies: rec
            .rows("power_supplies")
            .iter()
            .map(|row| PowerSupply {
                number: row.unsigned("number"),
                model: row.text("model"),
                output: row.float("output"),
                input: row.float("input"),
                capacity: row.float("capacity"),
                status: row.text("status"),
            })
            .collect(),
        sensors: rec
            .rows("sensors")
            .iter()
            .map(|row| Sensor {
                module: row.unsigned("module"),
                name: row.text("name"),
                temperature: row.float("temperature"),
                major_threshold: row.float("major_threshold"),
                minor_threshold: row.float("minor_threshold"),
                status: row.text("status"),
            })
            .collect(),
        power_summary: PowerSummary {
            redundancy_mode: rec.text("redundancy_mode"),
            voltage: rec.unsigned("voltage"),
            total_capacity: rec.float("total_capacity"),
            total_output: rec.float("total_output"),
            available: rec.float("available"),
        },
    }
}

const LANE_READINGS: [&str; 5] = ["temperature", "voltage", "current", "tx_power", "rx_power"];

fn build_lane(row: &Record, lane: u64) -> TransceiverLane {
    TransceiverLane {
        lane,
        temperature: row.float("temperature"),
        voltage: row.float("voltage"),
        current: row.float("current"),
        tx_power: row.float("tx_power"),
        rx_power: row.float("rx_power"),
    }
}

fn build_transceiver(row: &Record) -> Transceiver {
    let mut lanes: Vec<TransceiverLane> = row
        .rows("lanes")
        .iter()
        .map(|lane| build_lane(lane, lane.unsigned("lane")))
        .collect();
    if lanes.is_empty() && LANE_READINGS.iter().any(|slot| row.has(slot)) {
        lanes.push(build_lane(row, 1));
    }
    Transceiver {
        interface: row.text("interface"),
        present: row.flag("present"),
        kind: row.text("kind"),
        vendor: row.text("vendor"),
        part_number: row.text("part_number"),
        revision: row.text("revision"),
        serial_number: row.text("serial_number"),
        nominal_bitrate: row.unsigned("nominal_bitrate"),
        cisco_id: row.text("cisco_id"),
        lanes,
    }
}
