//! Shared test helpers for svn-bisect integration tests.
//!
//! Every test gets its own temp directory acting as the working copy. A
//! shell one-liner stands in for the VCS client: "updating" to a revision
//! writes the number to `.rev` and appends it to `updates.log`. The user
//! command reads `.rev` back.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// A working copy whose fake VCS accepts every revision.
pub fn setup_repo() -> TempDir {
    setup_repo_with_floor(None)
}

/// A working copy whose fake VCS refuses revisions below `floor`.
pub fn setup_repo_with_floor(floor: Option<i64>) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let guard = floor.map_or_else(String::new, |f| {
        format!("[ {{rev}} -ge {f} ] || {{ echo 'svn: E160006: No such revision {{rev}}' >&2; exit 1; }}; ")
    });
    let config = format!(
        "[vcs]\ntool = \"sh\"\nupdate_args = [\"-c\", \"{guard}echo {{rev}} > .rev; echo {{rev}} >> updates.log\"]\n"
    );
    std::fs::write(dir.path().join(".svn-bisect.toml"), config).expect("failed to write config");
    dir
}

/// A command printing `text` once the working copy is at `from` or later.
pub fn prints_from(from: i64, text: &str) -> Vec<String> {
    sh(&format!(
        "r=$(cat .rev); if [ \"$r\" -ge {from} ]; then echo '{text} in r'$r; else echo 'nothing here'; fi"
    ))
}

/// Like [`prints_from`], but the command exits 1 at revision `fails_at`.
pub fn prints_from_failing_at(from: i64, text: &str, fails_at: i64) -> Vec<String> {
    sh(&format!(
        "r=$(cat .rev); if [ \"$r\" -eq {fails_at} ]; then echo 'test harness crashed' >&2; exit 1; fi; \
         if [ \"$r\" -ge {from} ]; then echo '{text}'; fi"
    ))
}

/// `sh -c <script>` as an argument vector.
pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()]
}

/// Run svn-bisect with the given args in the given directory.
pub fn bisect_in(dir: &Path, args: &[&str], command: &[String]) -> Output {
    bisect_with_env(dir, args, command, &[])
}

/// Like [`bisect_in`], with extra environment variables set.
pub fn bisect_with_env(
    dir: &Path,
    args: &[&str],
    command: &[String],
    vars: &[(&str, &str)],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_svn-bisect"))
        .args(args)
        .args(command)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .env_remove("SVN_BISECT_VCS_TOOL")
        .envs(vars.iter().copied())
        .output()
        .expect("failed to execute svn-bisect")
}

/// Run svn-bisect and assert it succeeds. Returns stdout as string.
pub fn bisect_ok(dir: &Path, args: &[&str], command: &[String]) -> String {
    let out = bisect_in(dir, args, command);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "svn-bisect {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run svn-bisect and assert it exits with status 1. Returns stderr.
pub fn bisect_fails(dir: &Path, args: &[&str], command: &[String]) -> String {
    let out = bisect_in(dir, args, command);
    assert_eq!(
        out.status.code(),
        Some(1),
        "Expected svn-bisect {} to exit 1.\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// Revisions the fake VCS was asked to update to, in order.
pub fn updates(dir: &Path) -> Vec<i64> {
    std::fs::read_to_string(dir.join("updates.log"))
        .unwrap_or_default()
        .lines()
        .map(|l| l.trim().parse().expect("bad line in updates.log"))
        .collect()
}

/// The last non-empty line of `s`.
pub fn last_line(s: &str) -> &str {
    s.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}
