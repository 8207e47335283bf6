// Decoding of recorded device replies, without a network round trip

use nxapictl::model::DomainEntity;
use nxapictl::{LogicalCommand, ProtocolMode, decode_domain, decode_envelope};

fn decode(cmd: LogicalCommand, raw: &str) -> nxapictl::Decoded<DomainEntity> {
    let payload = decode_envelope(raw.as_bytes())
        .unwrap()
        .into_payload(cmd.command_string())
        .unwrap();
    decode_domain(cmd, &payload).unwrap()
}

#[test]
fn system_resources_with_per_cpu_table() {
    let decoded = decode(
        LogicalCommand::SystemResources,
        include_str!("fixtures/resp.show.system.resources.1.json"),
    );
    assert_eq!(decoded.variant, "resources.1");
    let DomainEntity::SystemResources(res) = decoded.value else {
        panic!("expected system resources");
    };
    assert_eq!(res.load_avg_1min, 0.44);
    assert_eq!(res.processes.total, 603);
    assert_eq!(res.cpus.len(), 4);
    assert_eq!(res.cpus[3].id, 3);
    assert_eq!(res.cpu_state.idle, 95.25);
    assert_eq!(res.memory.total, 24_632_272);
    assert_eq!(res.memory.status, "OK");
}

#[test]
fn environment_strips_units() {
    let decoded = decode(
        LogicalCommand::Environment,
        include_str!("fixtures/resp.show.environment.1.json"),
    );
    assert_eq!(decoded.variant, "environment.1");
    assert!(decoded.warnings.is_empty());
    let DomainEntity::Environment(env) = decoded.value else {
        panic!("expected environment");
    };
    assert_eq!(env.fans.len(), 3);
    assert_eq!(env.fans[0].speed, 40);
    assert_eq!(env.fans[2].speed, 0);
    assert_eq!(env.power_supplies[0].output, 109.0);
    assert_eq!(env.power_supplies[1].status, "Shutdown");
    assert_eq!(env.sensors[2].name, "CPU");
    assert_eq!(env.sensors[2].temperature, 39.0);
    assert_eq!(env.power_summary.voltage, 12);
    assert_eq!(env.power_summary.available, 541.0);
}

#[test]
fn transceivers_keep_lanes_and_flag_bad_readings() {
    let decoded = decode(
        LogicalCommand::Transceivers,
        include_str!("fixtures/resp.show.interface.transceiver.details.1.json"),
    );
    assert_eq!(decoded.variant, "transceivers.1");
    assert_eq!(decoded.warnings.len(), 1);
    assert_eq!(decoded.warnings[0].field, "rx_pwr");
    assert_eq!(decoded.warnings[0].raw, "\"N/A\"");

    let DomainEntity::Transceivers(optics) = decoded.value else {
        panic!("expected transceivers");
    };
    assert_eq!(optics.len(), 3);

    assert!(optics[0].present);
    assert_eq!(optics[0].lanes.len(), 1);
    assert_eq!(optics[0].lanes[0].tx_power, -2.41);

    assert!(!optics[1].present);
    assert!(optics[1].lanes.is_empty());

    assert_eq!(optics[2].nominal_bitrate, 10_300);
    assert_eq!(optics[2].lanes.len(), 4);
    assert_eq!(optics[2].lanes[2].rx_power, 0.0);
    assert_eq!(optics[2].lanes[3].rx_power, -1.4);
}

#[test]
fn bgp_summary_from_jsonrpc_message() {
    let raw = include_str!("fixtures/resp.show.ip.bgp.summary.vrf.all.1.json");
    let envelope = decode_envelope(raw.as_bytes()).unwrap();
    assert_eq!(envelope.protocol(), ProtocolMode::JsonRpc);

    let decoded = decode(LogicalCommand::BgpSummary, raw);
    assert_eq!(decoded.variant, "text");
    let text = decoded.value.text().unwrap();
    assert!(text.starts_with("BGP summary information for VRF default"));
    assert!(text.contains("local AS number 65011"));
}
