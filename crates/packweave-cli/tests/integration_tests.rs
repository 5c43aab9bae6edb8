//! Integration tests for the packweave binary.

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A scratch directory holding `packs/` and an isolated config file.
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        write(
            root,
            "packs/base/pack.toml",
            r#"
[pack]
group       = "test"
name        = "base"
version     = "1.0.0"
description = "Shared project files"
tags        = ["core"]

[properties.port]
type    = "integer"
default = 8080
"#,
        );
        write(root, "packs/base/files/README.md", "# {{project.name}}\nport={{port}}\n");
        write(root, "packs/base/files/gradlew", "#!/bin/sh\n");

        write(
            root,
            "packs/http/pack.toml",
            r#"
[pack]
group    = "test"
name     = "http"
version  = "2.0.0"
requires = ["test:base"]
tags     = ["http", "server"]
"#,
        );
        write(
            root,
            "packs/http/files/src/Server.kt",
            "package {{project.package}}\n",
        );

        write(root, "config.toml", "[defaults]\ngroup = \"org.acme\"\n");
        Self { temp }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn packs_dir(&self) -> String {
        self.path().join("packs").display().to_string()
    }

    /// The binary, run inside the workspace with its own config file.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("packweave").unwrap();
        cmd.current_dir(self.path())
            .env_remove("PACKWEAVE_PACKS_DIR")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path().join("config.toml"));
        cmd
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// ── help / version ────────────────────────────────────────────────────────────

#[test]
fn help_flag() {
    Command::cargo_bin("packweave")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("packs"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag() {
    Command::cargo_bin("packweave")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn new_command_help() {
    Command::cargo_bin("packweave")
        .unwrap()
        .args(["new", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--pack"))
        .stdout(predicate::str::contains("--define"))
        .stdout(predicate::str::contains("--dry-run"));
}

// ── new ───────────────────────────────────────────────────────────────────────

#[test]
fn new_project_success() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["--packs-dir", &ws.packs_dir()])
        .args(["new", "demo", "--pack", "test:base", "-D", "port=9000", "--yes"])
        .assert()
        .success();

    let readme = fs::read_to_string(ws.path().join("demo/README.md")).unwrap();
    assert_eq!(readme, "# demo\nport=9000\n");
    assert!(ws.path().join("demo/gradlew").exists());
}

#[test]
fn new_pulls_in_required_packs() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["new", "demo", "-p", "test:http", "--yes", "--packs-dir"])
        .arg(ws.packs_dir())
        .assert()
        .success();

    let project = ws.path().join("demo");
    let readme = fs::read_to_string(project.join("README.md")).unwrap();
    assert!(readme.contains("port=8080"));
    let server = fs::read_to_string(project.join("src/Server.kt")).unwrap();
    assert!(server.starts_with("package org.acme"));
}

#[test]
fn new_respects_output_dir() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["new", "demo", "-p", "test:base", "-o", "out", "--yes"])
        .args(["--packs-dir", &ws.packs_dir()])
        .assert()
        .success();

    assert!(ws.path().join("out/demo/README.md").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["new", "demo", "-p", "test:http", "--dry-run"])
        .args(["--packs-dir", &ws.packs_dir()])
        .assert()
        .success()
        .stdout(predicate::str::contains("README.md"))
        .stdout(predicate::str::contains("src/Server.kt"));

    assert!(!ws.path().join("demo").exists());
}

#[test]
fn dry_run_json_lists_owners() {
    let ws = Workspace::new();
    let out = ws
        .cmd()
        .args(["--output-format", "json"])
        .args(["new", "demo", "-p", "test:http", "--dry-run"])
        .args(["--packs-dir", &ws.packs_dir()])
        .output()
        .unwrap();
    assert!(out.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let files = plan["files"].as_array().unwrap();
    assert!(
        files
            .iter()
            .any(|f| f["path"] == "src/Server.kt" && f["owner"] == "test:http")
    );
}

#[test]
fn existing_project_needs_force() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.path().join("demo")).unwrap();

    ws.cmd()
        .args(["new", "demo", "-p", "test:base", "--yes"])
        .args(["--packs-dir", &ws.packs_dir()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));

    ws.cmd()
        .args(["new", "demo", "-p", "test:base", "--yes", "--force"])
        .args(["--packs-dir", &ws.packs_dir()])
        .assert()
        .success();
    assert!(ws.path().join("demo/README.md").exists());
}

#[test]
fn packs_dir_from_environment() {
    let ws = Workspace::new();
    ws.cmd()
        .env("PACKWEAVE_PACKS_DIR", ws.packs_dir())
        .args(["list", "--format", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("test:base"))
        .stdout(predicate::str::contains("test:http"));
}

// ── list ──────────────────────────────────────────────────────────────────────

#[test]
fn list_json() {
    let ws = Workspace::new();
    let out = ws
        .cmd()
        .args(["list", "--format", "json", "--packs-dir", &ws.packs_dir()])
        .output()
        .unwrap();
    assert!(out.status.success());

    let packs: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let ids: Vec<&str> = packs
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["test:base", "test:http"]);
}

#[test]
fn list_csv_and_tag_filter() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["list", "--format", "csv", "--tag", "http"])
        .args(["--packs-dir", &ws.packs_dir()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id,version,name,requires,tags"))
        .stdout(predicate::str::contains("test:http,2.0.0,http,test:base,http;server"))
        .stdout(predicate::str::contains("test:base,1.0.0").not());
}

// ── archive ───────────────────────────────────────────────────────────────────

#[test]
fn archive_round_trip() {
    for format in ["json", "framed"] {
        let ws = Workspace::new();
        let archive = ws.path().join(format!("packs.{format}"));

        ws.cmd()
            .args(["archive", "--format", format, "--packs-dir", &ws.packs_dir()])
            .arg(&archive)
            .assert()
            .success();
        assert!(archive.exists());

        // The archive alone is enough to generate.
        fs::remove_dir_all(ws.path().join("packs")).unwrap();
        ws.cmd()
            .args(["new", "demo", "-p", "test:http", "--yes", "--archive"])
            .arg(&archive)
            .assert()
            .success();
        assert!(ws.path().join("demo/src/Server.kt").exists());
    }
}

#[test]
fn archive_refuses_to_overwrite() {
    let ws = Workspace::new();
    write(ws.path(), "packs.json", "{}");

    ws.cmd()
        .args(["archive", "packs.json", "--packs-dir", &ws.packs_dir()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    ws.cmd()
        .args(["archive", "packs.json", "-f", "--packs-dir", &ws.packs_dir()])
        .assert()
        .success();
}

// ── config / completions ──────────────────────────────────────────────────────

#[test]
fn config_get_reads_file() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "get", "defaults.group"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.acme"));
}

#[test]
fn config_get_reads_environment() {
    let ws = Workspace::new();
    ws.cmd()
        .env("PACKWEAVE__OUTPUT__FORMAT", "plain")
        .args(["config", "get", "output.format"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plain"));
}

#[test]
fn init_local_writes_dotfile() {
    let ws = Workspace::new();
    ws.cmd().args(["init", "--local"]).assert().success();

    let text = fs::read_to_string(ws.path().join(".packweave.toml")).unwrap();
    assert!(text.contains("[defaults]"));
    assert!(text.contains("com.example"));
}

#[test]
fn completions_bash() {
    Command::cargo_bin("packweave")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("packweave"));
}
