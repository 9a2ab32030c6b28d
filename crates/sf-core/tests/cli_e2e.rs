//! CLI end-to-end tests for `sf`.
//!
//! Every test points `--config` at a temp file so the host's own
//! configuration never leaks in. Facts that would read the real host are
//! served from a pre-seeded cache instead, keeping output deterministic.

use assert_cmd::Command;
use filetime::{set_file_mtime, FileTime};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Get a Command for the sf binary.
fn sf() -> Command {
    let mut cmd = Command::cargo_bin("sf").expect("sf binary should exist");
    cmd.env_remove("RUST_LOG")
        .env_remove("SF_LOG")
        .env_remove("SF_LOG_FORMAT")
        .env_remove("SYSFACTS_CONFIG")
        .env_remove("SYSFACTS_CACHE_DIR");
    cmd
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("sysfacts.json"), config).expect("write config");
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("sysfacts.json")
    }

    fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    fn seed(&self, group: &str, content: &str) -> PathBuf {
        fs::create_dir_all(self.cache_dir()).expect("create cache dir");
        let path = self.cache_dir().join(group);
        fs::write(&path, content).expect("seed group");
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = sf();
        cmd.arg("--config")
            .arg(self.config())
            .arg("--cache-dir")
            .arg(self.cache_dir());
        cmd
    }
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

fn backdate(path: &Path, by: Duration) {
    let when = SystemTime::now() - by;
    set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}

const OS_TTL_CONFIG: &str = r#"{"ttls": {"operating system": "1d"}}"#;
const OS_GROUP: &str = r#"{"os.release.full": "99.1", "os.name": "Testix"}"#;

// ============================================================================
// Queries
// ============================================================================

mod queries {
    use super::*;

    #[test]
    fn single_query_text_prints_bare_value() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.seed("operating system", OS_GROUP);

        ws.cmd()
            .args(["--format", "text", "os.release.full"])
            .assert()
            .success()
            .stdout("99.1\n");
    }

    #[test]
    fn multiple_queries_json_map_each_query() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.seed("operating system", OS_GROUP);

        let output = ws
            .cmd()
            .args(["os.release.full", "os.name", "site.rack"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json = stdout_json(&output.stdout);
        assert_eq!(json["os.release.full"], "99.1");
        assert_eq!(json["os.name"], "Testix");
        assert!(json["site.rack"].is_null());
    }

    #[test]
    fn query_subcommand_matches_bare_form() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.seed("operating system", OS_GROUP);

        ws.cmd()
            .args(["query", "os.name", "--format", "yaml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("os.name: Testix"));
    }

    #[test]
    fn unknown_fact_is_null_not_an_error() {
        let ws = Workspace::new("{}");

        let output = ws.cmd().arg("no.such.fact").output().unwrap();
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(stdout_json(&output.stdout), serde_json::json!({"no.such.fact": null}));
    }

    #[test]
    fn expired_group_is_not_served() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        let group = ws.seed("operating system", OS_GROUP);
        backdate(&group, Duration::from_secs(3 * 86_400));

        let output = ws.cmd().arg("os.name").output().unwrap();
        assert!(output.status.success());
        assert_ne!(stdout_json(&output.stdout)["os.name"], "Testix");
    }

    #[test]
    fn no_cache_ignores_seeded_group() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        let group = ws.seed("operating system", OS_GROUP);

        let output = ws.cmd().args(["--no-cache", "os.name"]).output().unwrap();
        assert!(output.status.success());
        assert_ne!(stdout_json(&output.stdout)["os.name"], "Testix");
        assert_eq!(fs::read_to_string(group).unwrap(), OS_GROUP, "cache untouched");
    }

    #[test]
    fn cache_dir_from_environment() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.seed("operating system", OS_GROUP);

        sf().arg("--config")
            .arg(ws.config())
            .env("SYSFACTS_CACHE_DIR", ws.cache_dir())
            .args(["--format", "text", "os.name"])
            .assert()
            .success()
            .stdout("Testix\n");
    }
}

// ============================================================================
// Cache subcommands
// ============================================================================

mod cache {
    use super::*;

    #[test]
    fn status_lists_groups_with_ttls() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.seed("operating system", OS_GROUP);

        let output = ws.cmd().args(["cache", "status"]).output().unwrap();
        assert!(output.status.success());

        let json = stdout_json(&output.stdout);
        let groups = json["groups"].as_array().unwrap();
        let os = groups
            .iter()
            .find(|g| g["group"] == "operating system")
            .unwrap();
        assert_eq!(os["exists"], true);
        assert_eq!(os["ttl_secs"], 86_400);
        assert_eq!(os["fact_count"], 2);
        assert_eq!(os["expired"], false);

        let dmi = groups.iter().find(|g| g["group"] == "dmi").unwrap();
        assert_eq!(dmi["exists"], false);
        assert!(dmi.get("ttl_secs").is_none());
    }

    #[test]
    fn status_text_is_readable() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        ws.cmd()
            .args(["--format", "text", "cache", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache dir:"))
            .stdout(predicate::str::contains("ttl 1day"))
            .stdout(predicate::str::contains("not cached"));
    }

    #[test]
    fn status_text_formats_mixed_units() {
        let ws = Workspace::new(r#"{"ttls": {"operating system": "1day 2h 30m"}}"#);
        let group = ws.seed("operating system", OS_GROUP);
        backdate(&group, Duration::from_secs(90));

        ws.cmd()
            .args(["--format", "text", "cache", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ttl 1day 2h 30m"))
            .stdout(predicate::str::contains("2 fact(s), age 1m 3"));
    }

    #[test]
    fn status_survives_huge_ttl() {
        let ws = Workspace::new(r#"{"ttls": {"partitions": "1000000years"}}"#);
        ws.seed("partitions", r#"{"partitions": {}}"#);

        let output = ws.cmd().args(["cache", "status"]).output().unwrap();
        assert!(output.status.success());
        let json = stdout_json(&output.stdout);
        let partitions = json["groups"]
            .as_array()
            .unwrap()
            .iter()
            .find(|g| g["group"] == "partitions")
            .unwrap();
        assert_eq!(partitions["expired"], false);
        assert!(partitions.get("expires_at").is_none());
    }

    #[test]
    fn clear_removes_group_files() {
        let ws = Workspace::new(OS_TTL_CONFIG);
        let group = ws.seed("operating system", OS_GROUP);

        let output = ws.cmd().args(["cache", "clear"]).output().unwrap();
        assert!(output.status.success());
        assert_eq!(stdout_json(&output.stdout)["removed"], 1);
        assert!(!group.exists());
    }
}

// ============================================================================
// Errors and exit codes
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn unknown_ttl_group_is_config_error() {
        let ws = Workspace::new(r#"{"ttls": {"disks": "1d"}}"#);

        ws.cmd()
            .arg("os.name")
            .assert()
            .code(11)
            .stderr(predicate::str::contains("\"category\": \"config\""))
            .stderr(predicate::str::contains("disks"));
    }

    #[test]
    fn bad_ttl_is_config_error() {
        let ws = Workspace::new(r#"{"ttls": {"partitions": "soon"}}"#);
        ws.cmd().args(["cache", "status"]).assert().code(11);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        sf().arg("--config")
            .arg(dir.path().join("absent.json"))
            .args(["--format", "text", "os.name"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("Configuration Error"));
    }

    #[test]
    fn unknown_flag_is_args_error() {
        sf().arg("--nonexistent-flag")
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn unknown_cache_action_is_args_error() {
        sf().args(["cache", "purge"]).assert().code(10);
    }
}

// ============================================================================
// Version and help
// ============================================================================

#[test]
fn version_json() {
    let output = sf().arg("version").output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output.stdout)["sf_version"],
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn version_text() {
    sf().args(["--format", "text", "version"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sf "));
}

#[test]
fn help_exits_cleanly() {
    sf().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cache"));
}
