// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a TOML file with `[daemon]`, `[server]`,
//! `[logging]`, `[supervisor]`, and `[runtime.<id>]` sections.
//!
//! Every field has a default; unknown keys are rejected. Loading a config,
//! serialising it, and loading it again yields an equal value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("dataDir must be an absolute path: {0}")]
    RelativeDataDir(PathBuf),

    #[error("{name} must be in 1024-65535 (got {value})")]
    PortOutOfRange { name: &'static str, value: u16 },

    #[error("at least one of enableUnixSocket, enableHttp, enableWebSocket must be true")]
    NoTransport,

    #[error("runtime.{id}: ssh runtime requires a host")]
    SshMissingHost { id: String },

    #[error("could not determine a data directory")]
    NoDataDir,
}

/// Severity threshold for the structured log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// `[daemon]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DaemonSection {
    /// Parent of all daemon-owned files. Must be absolute.
    pub data_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// Seconds between runtime health probes.
    pub health_check_interval: u64,
    pub reconcile_on_start: bool,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pid_file: None,
            log_file: None,
            db_file: None,
            socket_path: None,
            health_check_interval: 30,
            reconcile_on_start: true,
        }
    }
}

/// `[server]` section: transport endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerSection {
    pub http_host: String,
    pub http_port: u16,
    pub ws_port: u16,
    pub enable_unix_socket: bool,
    pub enable_http: bool,
    pub enable_web_socket: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_host: "127.0.0.1".to_string(),
            http_port: 7070,
            ws_port: 7071,
            enable_unix_socket: true,
            enable_http: true,
            enable_web_socket: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoggingSection {
    pub log_level: LogLevel,
    pub log_to_stdout: bool,
    /// Rotation threshold in bytes.
    pub max_log_file_size: u64,
    /// Rotated files kept (`hqd.log.1` … `hqd.log.N`).
    pub max_log_files: u32,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_stdout: false,
            max_log_file_size: 10 * 1024 * 1024,
            max_log_files: 3,
        }
    }
}

/// `[supervisor]` section: restart circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SupervisorSection {
    /// Worker exits tolerated within `restart_window` before the breaker opens.
    pub max_restarts: u32,
    /// Sliding window in seconds.
    pub restart_window: u64,
    /// Seconds restarts stay suppressed once the breaker is open.
    pub restart_backoff: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self { max_restarts: 5, restart_window: 30, restart_backoff: 60 }
    }
}

impl SupervisorSection {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.restart_window)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff)
    }
}

/// Connection details for a remote-shell runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSpec {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
}

impl RemoteSpec {
    /// The `user@host` target passed to ssh.
    pub fn target(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// Backend type and type-specific keys of one `[runtime.<id>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeKind {
    #[serde(rename = "local-tmux", rename_all = "camelCase")]
    LocalTmux {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_prefix: Option<String>,
    },
    #[serde(rename = "docker", rename_all = "camelCase")]
    Docker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    #[serde(rename = "k8s", rename_all = "camelCase")]
    K8s {
        #[serde(default = "default_k8s_namespace")]
        namespace: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    #[serde(rename = "ssh", rename_all = "camelCase")]
    Ssh {
        #[serde(flatten)]
        remote: RemoteSpec,
    },
}

fn default_k8s_namespace() -> String {
    "default".to_string()
}

/// One configured runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Marks the runtime used when a spawn names none.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
    #[serde(flatten)]
    pub kind: RuntimeKind,
}

/// Identity of the server a runtime executes on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIdentity {
    /// `"local"` or `"remote:<label>"`.
    pub id: String,
    pub label: String,
    pub is_local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSpec>,
}

impl ServerIdentity {
    fn local(label: &str) -> Self {
        Self { id: "local".to_string(), label: label.to_string(), is_local: true, remote: None }
    }

    fn remote(label: &str, spec: RemoteSpec) -> Self {
        Self {
            id: format!("remote:{label}"),
            label: label.to_string(),
            is_local: false,
            remote: Some(spec),
        }
    }
}

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub daemon: DaemonSection,
    pub server: ServerSection,
    pub logging: LoggingSection,
    pub supervisor: SupervisorSection,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime: BTreeMap<String, RuntimeConfig>,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::parse(&text)
    }

    /// Parse and validate config text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        if config.runtime.is_empty() {
            config.runtime.insert(
                "local".to_string(),
                RuntimeConfig {
                    default: true,
                    kind: RuntimeKind::LocalTmux { session_prefix: None },
                },
            );
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.daemon.data_dir.is_absolute() {
            return Err(ConfigError::RelativeDataDir(self.daemon.data_dir.clone()));
        }
        for (name, value) in
            [("httpPort", self.server.http_port), ("wsPort", self.server.ws_port)]
        {
            if value < 1024 {
                return Err(ConfigError::PortOutOfRange { name, value });
            }
        }
        if !self.server.enable_unix_socket
            && !self.server.enable_http
            && !self.server.enable_web_socket
        {
            return Err(ConfigError::NoTransport);
        }
        for (id, runtime) in &self.runtime {
            if let RuntimeKind::Ssh { remote } = &runtime.kind {
                if remote.host.is_empty() {
                    return Err(ConfigError::SshMissingHost { id: id.clone() });
                }
            }
        }
        Ok(())
    }

    /// Serialise back to TOML (round-trips through [`Config::parse`]).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    // -- derived paths (explicit override or dataDir-relative default) --

    pub fn pid_file(&self) -> PathBuf {
        self.daemon.pid_file.clone().unwrap_or_else(|| self.daemon.data_dir.join("hqd.pid"))
    }

    pub fn log_file(&self) -> PathBuf {
        self.daemon.log_file.clone().unwrap_or_else(|| self.daemon.data_dir.join("hqd.log"))
    }

    pub fn db_file(&self) -> PathBuf {
        self.daemon.db_file.clone().unwrap_or_else(|| self.daemon.data_dir.join("state.snapshot"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon.socket_path.clone().unwrap_or_else(|| self.daemon.data_dir.join("hqd.sock"))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.health_check_interval)
    }

    /// The runtime used when a spawn request names none: the entry marked
    /// `default = true`, else the first configured.
    pub fn default_runtime(&self) -> Option<&str> {
        self.runtime
            .iter()
            .find(|(_, r)| r.default)
            .or_else(|| self.runtime.iter().next())
            .map(|(id, _)| id.as_str())
    }

    /// Server identity for a configured runtime.
    pub fn server_identity(&self, runtime_id: &str) -> Option<ServerIdentity> {
        let runtime = self.runtime.get(runtime_id)?;
        Some(match &runtime.kind {
            RuntimeKind::Ssh { remote } => ServerIdentity::remote(runtime_id, remote.clone()),
            _ => ServerIdentity::local(runtime_id),
        })
    }
}

/// Default data directory: `$XDG_STATE_HOME/hq` or `~/.local/state/hq`.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HQ_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join("hq"))
        .unwrap_or_else(|| PathBuf::from("/tmp/hq"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
