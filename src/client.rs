use crate::catalog::LogicalCommand;
use crate::config::ClientConfig;
use crate::decode::{
    Decoded, decode_bgp_summary, decode_domain, decode_environment, decode_interfaces,
    decode_running_config, decode_system_info, decode_system_resources, decode_transceivers,
    decode_vlans,
};
use crate::envelope::decode_envelope;
use crate::error::NxError;
use crate::model::*;
use crate::request::{ProtocolMode, encode};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

const USER_AGENT: &str = "nxapictl/0.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Posts encoded requests to the device's `/ins` endpoint.
///
/// Any non-2xx status is an error carrying the status and the body; a 2xx
/// body is handed back untouched.
#[derive(Debug, Clone)]
pub struct Transport {
    endpoint: Url,
    http: Client,
    username: String,
    password: String,
    timeout: Duration,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, NxError> {
        let endpoint = config.endpoint();
        let parsed = Url::parse(&endpoint).map_err(|_| NxError::InvalidEndpoint(endpoint))?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(USER_AGENT))
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .map_err(NxError::Client)?;

        Ok(Self {
            endpoint: parsed,
            http,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `command` only labels errors; the request is `body`.
    pub fn post(
        &self,
        command: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<ResponseData, NxError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .map_err(|e| self.failure(command, None, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .map_err(|e| self.failure(command, Some(status.as_u16()), e))?;

        if !status.is_success() {
            return Err(NxError::Transport {
                command: command.to_string(),
                status: Some(status.as_u16()),
                body: String::from_utf8_lossy(&bytes).into_owned(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        Ok(ResponseData {
            status: status.as_u16(),
            body: bytes.to_vec(),
        })
    }

    /// `status` is the response status when the failure came after the headers.
    fn failure(&self, command: &str, status: Option<u16>, err: reqwest::Error) -> NxError {
        if err.is_timeout() {
            NxError::Timeout {
                command: command.to_string(),
                after: self.timeout,
            }
        } else {
            NxError::Transport {
                command: command.to_string(),
                status: status.or_else(|| err.status().map(|s| s.as_u16())),
                body: String::new(),
                reason: err.to_string(),
            }
        }
    }
}

/// Client for one NX-API device.
///
/// Configuration is fixed at construction and every call is a single
/// request/response exchange, so a client can be shared between threads.
#[derive(Debug, Clone)]
pub struct NxClient {
    config: ClientConfig,
    transport: Transport,
}

impl NxClient {
    pub fn new(config: ClientConfig) -> Result<Self, NxError> {
        let transport = Transport::new(&config)?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn protocol(&self) -> ProtocolMode {
        self.config.protocol
    }

    /// Runs `cmd` and returns the unwrapped payload, before domain decoding.
    pub fn payload(&self, cmd: LogicalCommand) -> Result<Value, NxError> {
        let mode = self.config.protocol;
        let command = cmd.command_string();
        let request = encode(cmd, mode)?;

        debug!(
            command,
            protocol = %mode,
            endpoint = %self.transport.endpoint(),
            "sending request"
        );
        let started = Instant::now();
        let response = self.transport.post(command, mode.content_type(), request)?;
        debug!(
            command,
            status = response.status,
            bytes = response.body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received response"
        );

        decode_envelope(&response.body)?.into_payload(command)
    }

    /// Runs `cmd` and decodes the result, keeping the matched variant and
    /// any coercion warnings.
    pub fn fetch(&self, cmd: LogicalCommand) -> Result<Decoded<DomainEntity>, NxError> {
        let payload = self.payload(cmd)?;
        decode_domain(cmd, &payload)
    }

    fn fetch_as<T>(
        &self,
        cmd: LogicalCommand,
        decode: fn(&Value) -> Result<Decoded<T>, NxError>,
    ) -> Result<T, NxError> {
        let payload = self.payload(cmd)?;
        Ok(decode(&payload)?.value)
    }

    pub fn get_system_info(&self) -> Result<SystemInfo, NxError> {
        self.fetch_as(LogicalCommand::SystemInfo, decode_system_info)
    }

    pub fn get_interfaces(&self) -> Result<Vec<Interface>, NxError> {
        self.fetch_as(LogicalCommand::Interfaces, decode_interfaces)
    }

    pub fn get_vlans(&self) -> Result<Vec<Vlan>, NxError> {
        self.fetch_as(LogicalCommand::Vlans, decode_vlans)
    }

    pub fn get_system_resources(&self) -> Result<SystemResources, NxError> {
        self.fetch_as(LogicalCommand::SystemResources, decode_system_resources)
    }

    pub fn get_system_environment(&self) -> Result<Environment, NxError> {
        self.fetch_as(LogicalCommand::Environment, decode_environment)
    }

    pub fn get_running_configuration(&self) -> Result<RunningConfig, NxError> {
        self.fetch_as(LogicalCommand::RunningConfig, |p| {
            Ok(decode_running_config(p))
        })
    }

    pub fn get_bgp_summary(&self) -> Result<BgpSummary, NxError> {
        self.fetch_as(LogicalCommand::BgpSummary, |p| Ok(decode_bgp_summary(p)))
    }

    pub fn get_transceivers(&self) -> Result<Vec<Transceiver>, NxError> {
        self.fetch_as(LogicalCommand::Transceivers, decode_transceivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scheme;
    use httpmock::prelude::*;
    use serde_json::json;

    const VERSION_LEGACY: &str = include_str!("../tests/fixtures/resp.show.version.1.json");
    const VERSION_JSONRPC: &str = include_str!("../tests/fixtures/resp.show.version.2.json");
    const INTERFACES: &str = include_str!("../tests/fixtures/resp.show.interfaces.4.json");
    const VLANS: &str = include_str!("../tests/fixtures/resp.show.vlans.2.json");
    const RUNNING_CONFIG: &str =
        include_str!("../tests/fixtures/resp.show.running.config.1.json");
    const RESOURCES: &str = include_str!("../tests/fixtures/resp.show.system.resources.1.json");
    const ENVIRONMENT: &str = include_str!("../tests/fixtures/resp.show.environment.1.json");
    const BGP_SUMMARY: &str =
        include_str!("../tests/fixtures/resp.show.ip.bgp.summary.vrf.all.1.json");
    const TRANSCEIVERS: &str =
        include_str!("../tests/fixtures/resp.show.interface.transceiver.details.1.json");

    fn client_for(server: &MockServer, protocol: ProtocolMode) -> NxClient {
        let config = ClientConfig::new(&server.host(), "admin", "cisco")
            .with_scheme(Scheme::Http)
            .with_port(server.port())
            .with_protocol(protocol);
        NxClient::new(config).unwrap()
    }

    #[test]
    fn sends_jsonrpc_batch_with_basic_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ins")
                .header("content-type", "application/json-rpc")
                .header("authorization", "Basic YWRtaW46Y2lzY28=")
                .json_body(json!([{
                    "jsonrpc": "2.0",
                    "method": "cli",
                    "params": {"cmd": "show version", "type": "cli_show", "version": 1},
                    "id": 1
                }]));
            then.status(200).body(VERSION_JSONRPC);
        });

        let info = client_for(&server, ProtocolMode::JsonRpc)
            .get_system_info()
            .unwrap();

        mock.assert();
        assert_eq!(info.hostname, "dc1-leaf-101");
        assert_eq!(info.kickstart_image.version, "9.3(8)");
        assert_eq!(info.system_image.version, "9.3(8)");
        assert_eq!(info.uptime, 41 * 86_400 + 7 * 3_600 + 2 * 60 + 56);
    }

    #[test]
    fn sends_ins_api_envelope_in_legacy_mode() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ins")
                .header("content-type", "application/json")
                .json_body(json!({"ins_api": {
                    "version": "1.0",
                    "type": "cli_show",
                    "chunk": "0",
                    "sid": "1",
                    "input": "show version",
                    "output_format": "json"
                }}));
            then.status(200).body(VERSION_LEGACY);
        });

        let decoded = client_for(&server, ProtocolMode::LegacyInsApi)
            .fetch(LogicalCommand::SystemInfo)
            .unwrap();

        mock.assert();
        assert_eq!(decoded.variant, "version.1");
        let DomainEntity::SystemInfo(info) = decoded.value else {
            panic!("expected system info");
        };
        assert_eq!(info.hostname, "ny-n5k-1");
        assert_eq!(info.kickstart_image.version, "7.1(4)N1(1)");
        assert_eq!(info.memory, 8_253_792);
    }

    #[test]
    fn decodes_every_interface_row() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins").body_contains("\"show interface\"");
            then.status(200).body(INTERFACES);
        });

        let interfaces = client_for(&server, ProtocolMode::JsonRpc)
            .get_interfaces()
            .unwrap();

        assert_eq!(interfaces.len(), 4);
        assert_eq!(interfaces[1].name, "Ethernet1/1");
        assert_eq!(interfaces[1].mtu, 9216);
        assert_eq!(interfaces[1].counters.out_errors, 2);
        assert_eq!(interfaces[3].state, "up");
        assert_eq!(interfaces[3].mtu, 1500);
    }

    #[test]
    fn every_getter_decodes_its_recorded_reply() {
        let server = MockServer::start();
        let replies = [
            (LogicalCommand::SystemInfo, VERSION_JSONRPC),
            (LogicalCommand::Interfaces, INTERFACES),
            (LogicalCommand::Vlans, VLANS),
            (LogicalCommand::SystemResources, RESOURCES),
            (LogicalCommand::Environment, ENVIRONMENT),
            (LogicalCommand::RunningConfig, RUNNING_CONFIG),
            (LogicalCommand::BgpSummary, BGP_SUMMARY),
            (LogicalCommand::Transceivers, TRANSCEIVERS),
        ];
        for (cmd, reply) in replies {
            server.mock(|when, then| {
                when.method(POST)
                    .path("/ins")
                    .body_contains(format!("\"{}\"", cmd.command_string()));
                then.status(200).body(reply);
            });
        }

        let client = client_for(&server, ProtocolMode::JsonRpc);
        assert_eq!(client.get_system_info().unwrap().hostname, "dc1-leaf-101");
        assert_eq!(client.get_interfaces().unwrap().len(), 4);
        assert_eq!(client.get_vlans().unwrap().len(), 3);
        assert_eq!(client.get_system_resources().unwrap().cpus.len(), 4);
        assert_eq!(client.get_system_environment().unwrap().fans.len(), 3);
        assert!(
            client
                .get_running_configuration()
                .unwrap()
                .text
                .contains("hostname ny-n5k-1")
        );
        assert!(
            client
                .get_bgp_summary()
                .unwrap()
                .text
                .contains("local AS number 65011")
        );
        assert_eq!(client.get_transceivers().unwrap().len(), 3);
    }

    #[test]
    fn wrongly_shaped_rows_are_schema_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "result": {"body": {"TABLE_interface": {"ROW_interface": "garbage"}}},
                "id": 1
            }));
        });

        let err = client_for(&server, ProtocolMode::JsonRpc)
            .get_interfaces()
            .unwrap_err();

        assert!(matches!(
            err,
            NxError::SchemaMismatch {
                entity: "interfaces",
                ..
            }
        ));
    }

    #[test]
    fn body_read_failure_keeps_the_status() {
        let server = MockServer::start();
        let config = ClientConfig::new(&server.host(), "admin", "cisco")
            .with_scheme(Scheme::Http)
            .with_port(server.port());
        let transport = Transport::new(&config).unwrap();
        let err = Client::new().get("not a url").build().unwrap_err();

        match transport.failure("show version", Some(502), err) {
            NxError::Transport {
                command, status, ..
            } => {
                assert_eq!(command, "show version");
                assert_eq!(status, Some(502));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn legacy_body_delivered_as_string_is_decoded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(200).body(VLANS);
        });

        let vlans = client_for(&server, ProtocolMode::LegacyInsApi)
            .get_vlans()
            .unwrap();

        assert_eq!(vlans.len(), 3);
        assert_eq!(vlans[0].ports.len(), 3);
        assert!(vlans[2].shutdown);
        assert_eq!(vlans[1].media_type, "enet");
    }

    #[test]
    fn running_config_text_is_verbatim() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins").body_contains("cli_show_ascii");
            then.status(200).body(RUNNING_CONFIG);
        });

        let config = client_for(&server, ProtocolMode::LegacyInsApi)
            .get_running_configuration()
            .unwrap();

        let fixture: Value = serde_json::from_str(RUNNING_CONFIG).unwrap();
        let expected = fixture["ins_api"]["outputs"]["output"]["body"]
            .as_str()
            .unwrap();
        assert_eq!(config.text.len(), expected.len());
        assert_eq!(config.text, expected);
    }

    #[test]
    fn non_success_status_is_transport_error_with_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(400)
                .body("Bad Request, unsupported command: show vlan");
        });

        let err = client_for(&server, ProtocolMode::JsonRpc)
            .get_vlans()
            .unwrap_err();

        match &err {
            NxError::Transport {
                command,
                status,
                body,
                ..
            } => {
                assert_eq!(command, "show vlan");
                assert_eq!(*status, Some(400));
                assert!(body.contains("unsupported command"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn unmarked_reply_is_unsupported_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(200).body(r#"{"hello": "world"}"#);
        });

        let err = client_for(&server, ProtocolMode::JsonRpc)
            .get_system_info()
            .unwrap_err();

        match err {
            NxError::UnsupportedPayload { body } => assert!(body.contains("hello")),
            other => panic!("expected unsupported payload, got {other:?}"),
        }
    }

    #[test]
    fn unknown_shape_is_schema_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "result": {"body": {"foo": 1}}, "id": 1}));
        });

        let err = client_for(&server, ProtocolMode::JsonRpc)
            .get_system_environment()
            .unwrap_err();

        assert!(matches!(
            err,
            NxError::SchemaMismatch {
                entity: "environment",
                ..
            }
        ));
    }

    #[test]
    fn slow_device_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ins");
            then.status(200)
                .delay(Duration::from_secs(2))
                .body(VERSION_JSONRPC);
        });

        let config = ClientConfig::new(&server.host(), "admin", "cisco")
            .with_scheme(Scheme::Http)
            .with_port(server.port())
            .with_timeout(Duration::from_millis(200));
        let err = NxClient::new(config)
            .unwrap()
            .get_system_info()
            .unwrap_err();

        match err {
            NxError::Timeout { command, after } => {
                assert_eq!(command, "show version");
                assert_eq!(after, Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn client_is_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NxClient>();
    }
}
