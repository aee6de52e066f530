// Integration tests for meshlink-common
// These tests verify the status model, configuration layering and error taxonomy

use meshlink_common::{
    BinaryPaths, CommandSpec, ConnectError, DaemonError, DisconnectError, ErrorCode, InstallFlavor,
    MeshConfig, PlatformKind, ResolveError, RunError, SessionConfig, StatusReport,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Test status parsing against a document with several peers
#[test]
fn test_status_report_with_multiple_peers() {
    let json = r#"{
        "BackendState": "Running",
        "Self": {"HostName": "ground", "TailscaleIPs": ["100.64.0.10"]},
        "Peer": {
            "nodekey:1": {"HostName": "drone-1", "TailscaleIPs": ["100.64.0.11"]},
            "nodekey:2": {"HostName": "drone-2", "DNSName": "drone-2.example.ts.net.", "TailscaleIPs": ["fd7a::2", "100.64.0.12"]},
            "nodekey:3": {"HostName": "localhost", "DNSName": "camera.example.ts.net.", "TailscaleIPs": ["100.64.0.13"]}
        }
    }"#;

    let report = StatusReport::parse(json).expect("Failed to parse status");
    assert_eq!(
        report.find_peer("drone-2").and_then(|p| p.first_ipv4()),
        Some(Ipv4Addr::new(100, 64, 0, 12))
    );
    // DNSName is consulted when HostName is generic
    assert_eq!(
        report.find_peer("camera").and_then(|p| p.first_ipv4()),
        Some(Ipv4Addr::new(100, 64, 0, 13))
    );
    assert!(report.find_peer("drone").is_none());
    assert!(report.find_peer("").is_none());
}

/// Test that a logged-out daemon still yields a parseable report
#[test]
fn test_status_report_logged_out() {
    let report = StatusReport::parse(r#"{"BackendState":"NeedsLogin","Self":null,"Peer":null}"#)
        .expect("Failed to parse status");
    assert_eq!(report.backend_state, "NeedsLogin");
    assert!(report.self_node.is_none());
    assert!(report.peers.is_empty());
}

/// Test configuration file selected through MESHLINK_CONFIG plus env overrides
#[test]
fn test_config_layering() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = temp_dir.path().join("meshlink.json");
    std::fs::write(&file, r#"{"resolve_attempts": 9, "poll_interval_ms": 20}"#)
        .expect("Failed to write config");
    let file_str = file.to_string_lossy().to_string();

    let config = MeshConfig::load_with(None, |key| match key {
        "MESHLINK_CONFIG" => Some(file_str.clone()),
        "MESHLINK_POLL_INTERVAL_MS" => Some("35".to_string()),
        _ => None,
    })
    .expect("Failed to load config");

    assert_eq!(config.resolve_attempts, 9);
    assert_eq!(config.poll_interval(), Duration::from_millis(35));
    assert_eq!(config.daemon_binary, "tailscaled");
}

/// Test a malformed config file is reported with its path
#[test]
fn test_config_file_parse_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = temp_dir.path().join("broken.json");
    std::fs::write(&file, "{ not json").expect("Failed to write config");

    let err = MeshConfig::from_file(&file).unwrap_err();
    assert!(err.to_string().contains("broken.json"));
}

/// Test every failure kind maps onto its documented code
#[test]
fn test_error_taxonomy_codes() {
    let binary = ConnectError::BinaryNotFound { binary: "tailscale".to_string() };
    assert_eq!(binary.code(), ErrorCode::M001);

    let timeout = DaemonError::StartupTimeout { waited: Duration::from_secs(15) };
    assert_eq!(timeout.code(), ErrorCode::M003);

    let auth = ConnectError::AuthenticationFailed { exit_code: 1, stderr: "invalid key".to_string() };
    assert_eq!(auth.code(), ErrorCode::M004);

    let down = DisconnectError::DisconnectFailed { exit_code: 2, stderr: "boom".to_string() };
    assert_eq!(down.code(), ErrorCode::M005);

    let peer = ResolveError::PeerNotFound { hostname: "x".to_string(), attempts: 3 };
    assert_eq!(peer.code(), ErrorCode::M006);

    let unreachable = ResolveError::DaemonUnreachable { attempts: 3, detail: "refused".to_string() };
    assert_eq!(unreachable.code(), ErrorCode::M007);

    let denied: DisconnectError = RunError::ElevationDenied {
        program: "tailscale".to_string(),
        reason: "cancelled".to_string(),
    }
    .into();
    assert_eq!(denied.code(), ErrorCode::M002);

    let managed = DaemonError::NotRunning { flavor: InstallFlavor::GuiBundle };
    assert_eq!(managed.code(), ErrorCode::M010);
}

/// Test the auth key does not leak through error or command rendering
#[test]
fn test_secret_handling() {
    let config = SessionConfig::new("drone", "tskey-auth-kXYZ").expect("valid config");
    let spec = CommandSpec::new("tailscale")
        .arg("up")
        .arg(format!("--authkey={}", config.auth_key.expose()))
        .arg(format!("--hostname={}", config.hostname));

    assert!(!spec.to_string().contains("kXYZ"));
    assert!(!format!("{:?}", config).contains("kXYZ"));
    assert!(spec.args.iter().any(|a| a.contains("kXYZ")));
}

/// Test binary path serialization used by `meshlink locate --json`
#[test]
fn test_binary_paths_serialization() {
    let paths = BinaryPaths {
        client: Some(PathBuf::from("/usr/bin/tailscale")),
        daemon: Some(PathBuf::from("/usr/sbin/tailscaled")),
        flavor: InstallFlavor::Standalone,
    };
    let json = serde_json::to_string(&paths).expect("Failed to serialize");
    assert!(json.contains(r#""flavor":"standalone""#));
    assert!(paths.is_complete());

    let back: BinaryPaths = serde_json::from_str(&json).expect("Failed to deserialize");
    assert_eq!(back, paths);
    assert_ne!(PlatformKind::current().to_string(), "");
}
