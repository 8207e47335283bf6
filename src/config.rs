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

use crate::request::ProtocolMode;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const API_PATH: &str = "/ins";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// On-disk configuration; every key is optional so scopes can be layered.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("device host is required; set it with `nxapictl configure --host <host>`")]
    MissingHost,
    #[error(
        "device username/password are required; set them with `nxapictl configure --username ... --password ...`"
    )]
    MissingCredentials,
}

/// Everything a client needs to reach one device.
///
/// Fixed once the client is built: to talk to another device or switch
/// protocol, build another client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub username: String,
    pub password: String,
    pub protocol: ProtocolMode,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl ClientConfig {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port: Scheme::Https.default_port(),
            scheme: Scheme::Https,
            username: username.to_string(),
            password: password.to_string(),
            protocol: ProtocolMode::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
        }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolMode) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    /// `scheme://host:port/ins`
    pub fn endpoint(&self) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            host,
            self.port,
            API_PATH
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("password", &"*****")
            .field("protocol", &self.protocol)
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".nxapictl.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("NXAPICTL_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("nxapictl").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Layers user config, local config and `overrides` (highest wins) into a
/// client configuration.
pub fn resolve(cwd: &Path, overrides: Config) -> Result<ClientConfig> {
    let merged = merge(load(cwd)?, overrides);

    let host = merged
        .host
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or(ConfigError::MissingHost)?;
    let username = merged.username.ok_or(ConfigError::MissingCredentials)?;
    let password = merged.password.ok_or(ConfigError::MissingCredentials)?;
    let scheme = merged.scheme.unwrap_or_default();

    Ok(ClientConfig::new(&host, &username, &password)
        .with_scheme(scheme)
        .with_port(merged.port.unwrap_or_else(|| scheme.default_port()))
        .with_protocol(merged.protocol.unwrap_or_default())
        .with_timeout(Duration::from_secs(
            merged.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ))
        .with_verify_tls(merged.verify_tls.unwrap_or(true)))
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

/// Keys set in `upper` replace those in `lower`.
pub fn merge(lower: Config, upper: Config) -> Config {
    Config {
        host: upper.host.or(lower.host),
        port: upper.port.or(lower.port),
        scheme: upper.scheme.or(lower.scheme),
        username: upper.username.or(lower.username),
        password: upper.password.or(lower.password),
        protocol: upper.protocol.or(lower.protocol),
        timeout_secs: upper.timeout_secs.or(lower.timeout_secs),
        verify_tls: upper.verify_tls.or(lower.verify_tls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::{env, fs};
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<std::sync::Mutex<()>> = OnceLock::new();

    #[test]
    fn merges_user_and_local_and_overrides() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var("NXAPICTL_CONFIG_DIR", cwd.path().join("config"));
        }
        fs::create_dir_all(cwd.path().join("config")).unwrap();

        let user_cfg = Config {
            host: Some("10.0.0.1".into()),
            username: Some("admin".into()),
            password: Some("user-pass".into()),
            protocol: Some(ProtocolMode::LegacyInsApi),
            timeout_secs: Some(5),
            ..Config::default()
        };
        save(Scope::User, &user_cfg, cwd.path()).unwrap();

        let local_cfg = Config {
            host: Some("leaf-1.lab".into()),
            scheme: Some(Scheme::Http),
            verify_tls: Some(false),
            ..Config::default()
        };
        save(Scope::Local, &local_cfg, cwd.path()).unwrap();

        let effective = resolve(cwd.path(), Config::default()).unwrap();
        assert_eq!(effective.host, "leaf-1.lab");
        assert_eq!(effective.port, 80);
        assert_eq!(effective.username, "admin");
        assert_eq!(effective.password, "user-pass");
        assert_eq!(effective.protocol, ProtocolMode::LegacyInsApi);
        assert_eq!(effective.timeout, Duration::from_secs(5));
        assert!(!effective.verify_tls);
        assert_eq!(effective.endpoint(), "http://leaf-1.lab:80/ins");

        let overridden = resolve(
            cwd.path(),
            Config {
                port: Some(8080),
                protocol: Some(ProtocolMode::JsonRpc),
                ..Config::default()
            },
        )
        .unwrap();
        assert_eq!(overridden.port, 8080);
        assert_eq!(overridden.protocol, ProtocolMode::JsonRpc);
    }

    #[test]
    fn errors_when_missing_host() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var("NXAPICTL_CONFIG_DIR", cwd.path().join("config"));
        }
        fs::create_dir_all(cwd.path().join("config")).unwrap();
        let err = resolve(cwd.path(), Config::default()).unwrap_err();
        assert!(err.to_string().contains("device host is required"));
    }

    #[test]
    fn reads_yaml_spellings() {
        let config: Config = serde_yaml::from_str(
            "host: 192.0.2.10\nscheme: http\nprotocol: ins_api\nverify_tls: false\n",
        )
        .unwrap();
        assert_eq!(config.scheme, Some(Scheme::Http));
        assert_eq!(config.protocol, Some(ProtocolMode::LegacyInsApi));
    }

    #[test]
    fn endpoint_brackets_ipv6_and_debug_masks_password() {
        let config = ClientConfig::new("2001:db8::1", "admin", "secret").with_port(8443);
        assert_eq!(config.endpoint(), "https://[2001:db8::1]:8443/ins");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
