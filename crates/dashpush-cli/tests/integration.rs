#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "APP_DIR",
    "GIT_PUSH_URL",
    "REPO_NAME",
    "LIVINGAPPS_API_KEY",
    "RESUME_SESSION_ID",
    "USER_PROMPT",
    "DASHPUSH_MODEL",
    "DASHPUSH_API_BASE",
    "DASHPUSH_DASHBOARD_BASE",
];

/// A `dashpush` command isolated from whatever the test runner's
/// environment happens to carry.
fn dashpush(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dashpush").unwrap();
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(dir.path()).env("APP_DIR", dir.path());
    cmd
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(out.status.success(), "git {args:?} failed");
    String::from_utf8(out.stdout).unwrap()
}

/// Working tree plus an empty bare remote whose HEAD points at `main`.
fn app_with_remote() -> (TempDir, TempDir) {
    let app = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    git(remote.path(), &["init", "--bare", "."]);
    git(remote.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(app.path().join("index.html"), "<h1>dashboard</h1>").unwrap();
    (app, remote)
}

// ---------------------------------------------------------------------------
// dashpush --help
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    dashpush(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("mcp"))
        .stdout(predicate::str::contains("deploy"));
}

// ---------------------------------------------------------------------------
// dashpush deploy
// ---------------------------------------------------------------------------

#[test]
fn deploy_without_push_url_fails() {
    let dir = TempDir::new().unwrap();
    dashpush(&dir)
        .arg("deploy")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Deployment failed"))
        .stdout(predicate::str::contains("\"isError\": true"));
}

#[test]
fn deploy_pushes_to_bare_remote() {
    let (app, remote) = app_with_remote();

    dashpush(&app)
        .args(["deploy", "--push-url"])
        .arg(remote.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment successful"))
        .stdout(predicate::str::contains("\"isError\": false"));

    let count = git(remote.path(), &["rev-list", "--count", "main"]);
    assert_eq!(count.trim(), "1");
}

#[test]
fn deploy_twice_adopts_history() {
    let (app, remote) = app_with_remote();

    for _ in 0..2 {
        dashpush(&app)
            .env("GIT_PUSH_URL", remote.path())
            .arg("deploy")
            .assert()
            .success();
    }

    let count = git(remote.path(), &["rev-list", "--count", "main"]);
    assert_eq!(count.trim(), "2");
}

#[test]
fn deploy_to_missing_remote_reports_git_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.git");

    dashpush(&dir)
        .args(["deploy", "--push-url"])
        .arg(&missing)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Deployment failed: Git Error (git push"));
}

// ---------------------------------------------------------------------------
// dashpush mcp
// ---------------------------------------------------------------------------

#[test]
fn mcp_answers_initialize_and_list() {
    let dir = TempDir::new().unwrap();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
    );

    let output = dashpush(&dir)
        .arg("mcp")
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2, "notifications get no response");
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[0]["result"]["serverInfo"]["name"], "deploy_tools");
    assert_eq!(lines[1]["result"]["tools"][0]["name"], "deploy_to_github");
}

#[test]
fn mcp_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    dashpush(&dir)
        .arg("mcp")
        .write_stdin("not json\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("-32700"));
}

#[test]
fn mcp_deploy_call_pushes_with_forwarded_env() {
    let (app, remote) = app_with_remote();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"deploy_to_github","arguments":{}}}"#,
        "\n"
    );

    let output = dashpush(&app)
        .env("GIT_PUSH_URL", remote.path())
        .arg("mcp")
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let resp: serde_json::Value =
        serde_json::from_str(String::from_utf8(output).unwrap().trim()).unwrap();
    assert_eq!(resp["id"], 7);
    assert_eq!(resp["result"]["isError"], false);
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Deployment successful!"), "{text}");
}
