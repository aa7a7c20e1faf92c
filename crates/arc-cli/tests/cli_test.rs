//! Integration tests for the `arc` CLI binary.
//!
//! Argument parsing, help output, completions and exit codes, plus full
//! plan/apply runs against a mocked switch.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `arc` binary with env isolation.
///
/// Clears all `ARC_*` env vars and points config and data directories at
/// `home` so tests never touch the user's real configuration.
fn arc_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("arc");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("ARC_PROFILE")
        .env_remove("ARC_CONFIG")
        .env_remove("ARC_OUTPUT")
        .env_remove("ARC_INSECURE")
        .env_remove("ARC_USERNAME")
        .env_remove("ARC_PASSWORD");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write `config.toml` with one profile per `(name, host)` and a desired
/// configuration declaring VLAN 10 on each of them.
fn workspace(dir: &Path, switches: &[(&str, &str)]) -> (PathBuf, PathBuf) {
    let mut config = String::from("[defaults]\nconnect_timeout = 2\nrequest_timeout = 5\n");
    let mut desired = String::from("devices:\n");
    for (name, host) in switches {
        config.push_str(&format!(
            "\n[profiles.{name}]\nhost = \"{host}\"\nusername = \"manager\"\npassword = \"s3cret\"\n"
        ));
        desired.push_str(&format!("  {name}:\n    vlans:\n      - id: 10\n        name: users\n"));
    }

    let config_path = dir.join("config.toml");
    let desired_path = dir.join("desired.yaml");
    std::fs::write(&config_path, config).unwrap();
    std::fs::write(&desired_path, desired).unwrap();
    (config_path, desired_path)
}

async fn get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A switch with only the default VLAN configured.
async fn factory_switch() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/login-sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "cookie": "sessionId=t" })))
        .mount(&server)
        .await;
    get(&server, "/rest/v1/system", json!({ "name": "core-1" })).await;
    get(
        &server,
        "/rest/v1/vlans",
        json!({ "vlan_element": [{ "vlan_id": 1, "name": "DEFAULT_VLAN" }] }),
    )
    .await;
    get(&server, "/rest/v1/vlans-ports", json!({ "vlan_port_element": [] })).await;
    get(&server, "/rest/v1/ports", json!({ "port_element": [] })).await;
    get(&server, "/rest/v1/poe/ports", json!({ "port_poe": [] })).await;
    get(&server, "/rest/v1/acls", json!({ "acl_element": [] })).await;
    get(&server, "/rest/v1/ip-route", json!({ "ip_route_element": [] })).await;
    server
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = arc_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("Aruba")
            .and(predicate::str::contains("plan"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("port")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("arc"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = arc_cmd(home.path())
        .args(["--output", "invalid", "plan"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_plan_without_desired_config_is_total_failure() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .arg("plan")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("desired"));
}

#[test]
fn test_unparseable_desired_config_is_total_failure() {
    let home = tempfile::tempdir().unwrap();
    let desired = home.path().join("desired.yaml");
    std::fs::write(&desired, "devices: [oops]\n").unwrap();

    arc_cmd(home.path())
        .args(["apply", "--yes", "--file"])
        .arg(&desired)
        .assert()
        .code(10);
}

#[test]
fn test_apply_requires_yes_when_not_interactive() {
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(home.path(), &[("core-1", "http://127.0.0.1:9")]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["apply", "--file"])
        .arg(&desired)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_show_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .args(["show", "lab"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("lab"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path()).args(["config", "show"]).assert().success();
}

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("elsewhere.toml");
    arc_cmd(home.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere.toml"));
}

#[test]
fn test_config_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    arc_cmd(home.path())
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("set-password")),
        );
}

// ── Against a mocked switch ─────────────────────────────────────────

#[test]
fn test_plan_lists_pending_changes() {
    let rt = runtime();
    let server = rt.block_on(factory_switch());
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(home.path(), &[("core-1", &server.uri())]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-o", "plain", "plan", "--file"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(predicate::str::contains("core-1\tcreate vlan:10"));

    let sessions = home.path().join("data").join("arc").join("sessions").join("core-1.json");
    assert!(sessions.exists(), "session cookie should be cached");
}

#[test]
fn test_apply_creates_the_vlan() {
    let rt = runtime();
    let server = rt.block_on(async {
        let server = factory_switch().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/vlans"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "vlan_id": 10, "name": "users" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        server
    });
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(home.path(), &[("core-1", &server.uri())]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-o", "json", "apply", "--yes", "--file"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"success\""));

    rt.block_on(server.verify());
}

#[test]
fn test_simulated_apply_writes_nothing() {
    let rt = runtime();
    let server = rt.block_on(async {
        let server = factory_switch().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/vlans"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        server
    });
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(home.path(), &[("core-1", &server.uri())]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-o", "plain", "apply", "--simulate", "--file"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(predicate::str::contains("create vlan:10\tapplied"))
        .stderr(predicate::str::contains("Simulation only"));

    rt.block_on(server.verify());
}

#[test]
fn test_unreachable_switch_is_total_failure() {
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(home.path(), &[("core-1", "http://127.0.0.1:9")]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["apply", "--yes", "--file"])
        .arg(&desired)
        .assert()
        .code(10);
}

#[test]
fn test_one_unreachable_switch_is_partial_failure() {
    let rt = runtime();
    let server = rt.block_on(async {
        let server = factory_switch().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/vlans"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "vlan_id": 10, "name": "users" })),
            )
            .mount(&server)
            .await;
        server
    });
    let home = tempfile::tempdir().unwrap();
    let (config, desired) = workspace(
        home.path(),
        &[("core-1", &server.uri()), ("edge-1", "http://127.0.0.1:9")],
    );

    let output = arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-o", "json", "apply", "--yes", "--file"])
        .arg(&desired)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["devices"][0]["device"], "core-1");
    assert_eq!(report["devices"][0]["status"], "success");
    assert_eq!(report["devices"][1]["status"], "aborted");
    assert_eq!(report["devices"][1]["stage"], "connect");
}

#[test]
fn test_port_get_all() {
    let rt = runtime();
    let server = rt.block_on(async {
        let server = factory_switch().await;
        // Overrides the empty list mounted above.
        Mock::given(method("GET"))
            .and(path("/rest/v1/poe/ports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "port_poe": [
                    { "port_id": "1", "is_poe_enabled": true },
                    { "port_id": "2", "is_poe_enabled": false }
                ]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        server
    });
    let home = tempfile::tempdir().unwrap();
    let (config, _) = workspace(home.path(), &[("core-1", &server.uri())]);

    arc_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-p", "core-1", "-o", "plain", "port", "get", "all"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n2\n"));
}
