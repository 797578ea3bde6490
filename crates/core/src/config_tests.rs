// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const FULL: &str = r#"
[daemon]
dataDir = "/var/lib/hq"
healthCheckInterval = 10
reconcileOnStart = true

[server]
httpHost = "0.0.0.0"
httpPort = 8080
wsPort = 8081
enableUnixSocket = true
enableHttp = true
enableWebSocket = false

[logging]
logLevel = "debug"
logToStdout = true
maxLogFileSize = 1048576
maxLogFiles = 2

[supervisor]
maxRestarts = 3
restartWindow = 20
restartBackoff = 45

[runtime.local]
type = "local-tmux"
default = true

[runtime.build-box]
type = "ssh"
host = "build.example.com"
user = "ci"
port = 2222

[runtime.cluster]
type = "k8s"
namespace = "agents"
image = "hq-agent:latest"
"#;

#[test]
fn full_config_parses() {
    let config = Config::parse(FULL).unwrap();
    assert_eq!(config.daemon.data_dir, PathBuf::from("/var/lib/hq"));
    assert_eq!(config.server.http_port, 8080);
    assert_eq!(config.logging.log_level, LogLevel::Debug);
    assert_eq!(config.supervisor.max_restarts, 3);
    assert_eq!(config.runtime.len(), 3);
    assert_eq!(config.default_runtime(), Some("local"));

    match &config.runtime["build-box"].kind {
        RuntimeKind::Ssh { remote } => {
            assert_eq!(remote.target(), "ci@build.example.com");
            assert_eq!(remote.port, Some(2222));
        }
        other => panic!("expected ssh runtime, got {other:?}"),
    }
}

#[test]
fn empty_config_gets_defaults_and_local_runtime() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.supervisor.max_restarts, 5);
    assert_eq!(config.supervisor.restart_window, 30);
    assert_eq!(config.supervisor.restart_backoff, 60);
    assert_eq!(config.daemon.health_check_interval, 30);
    assert!(config.daemon.reconcile_on_start);
    assert_eq!(config.runtime.len(), 1);
    assert!(matches!(config.runtime["local"].kind, RuntimeKind::LocalTmux { .. }));
}

#[test]
fn round_trip_is_equal() {
    let config = Config::parse(FULL).unwrap();
    let reparsed = Config::parse(&config.to_toml()).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
fn relative_data_dir_rejected() {
    let err = Config::parse("[daemon]\ndataDir = \"relative/path\"").unwrap_err();
    assert!(matches!(err, ConfigError::RelativeDataDir(_)));
}

#[test]
fn privileged_port_rejected() {
    let err = Config::parse("[server]\nhttpPort = 80").unwrap_err();
    assert!(matches!(err, ConfigError::PortOutOfRange { name: "httpPort", value: 80 }));
}

#[test]
fn all_transports_disabled_rejected() {
    let toml = r#"
[server]
enableUnixSocket = false
enableHttp = false
enableWebSocket = false
"#;
    assert!(matches!(Config::parse(toml).unwrap_err(), ConfigError::NoTransport));
}

#[test]
fn unknown_key_rejected() {
    assert!(Config::parse("[daemon]\nbogusKey = 1").is_err());
}

#[test]
fn ssh_without_host_rejected() {
    let toml = r#"
[runtime.r]
type = "ssh"
host = ""
"#;
    assert!(matches!(Config::parse(toml).unwrap_err(), ConfigError::SshMissingHost { .. }));
}

#[test]
fn derived_paths_respect_overrides() {
    let config = Config::parse("[daemon]\ndataDir = \"/d\"\npidFile = \"/run/hqd.pid\"").unwrap();
    assert_eq!(config.pid_file(), PathBuf::from("/run/hqd.pid"));
    assert_eq!(config.log_file(), PathBuf::from("/d/hqd.log"));
    assert_eq!(config.socket_path(), PathBuf::from("/d/hqd.sock"));
    assert_eq!(config.db_file(), PathBuf::from("/d/state.snapshot"));
}

#[test]
fn server_identity_local_and_remote() {
    let config = Config::parse(FULL).unwrap();
    let local = config.server_identity("local").unwrap();
    assert!(local.is_local);
    assert_eq!(local.id, "local");

    let remote = config.server_identity("build-box").unwrap();
    assert!(!remote.is_local);
    assert_eq!(remote.id, "remote:build-box");
    assert_eq!(remote.remote.unwrap().host, "build.example.com");

    assert!(config.server_identity("missing").is_none());
}
