//! Integration tests for srcindex CLI

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run_srcindex(args: &[&str]) -> (String, String, bool) {
    let mut cmd_args = vec!["run", "-q", "-p", "srcindex", "--"];
    cmd_args.extend(args);

    let output = Command::new("cargo")
        .args(&cmd_args)
        .current_dir(env!("CARGO_MANIFEST_DIR").to_string() + "/..")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    (stdout, stderr, success)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small tree: two scripts, a minified vendor file, a TypeScript project
/// and a hidden directory.
fn fixture(root: &Path) {
    write(root, "src/app.js", "main();\n");
    write(root, "src/util.js", "function util() {}\n");
    write(root, "vendor/vendor.min.js", "v()");
    write(root, "vendor/other.min.js", "o()");
    write(root, "ts/tsconfig.json", r#"{"files": ["a.ts", "b.ts"]}"#);
    write(root, "ts/a.ts", "let a = 1;\n");
    write(root, "ts/b.ts", "let b = 2;\n");
    write(root, "ts/c.ts", "let c = 3;\n");
    write(root, ".git/hooks/pre-commit.js", "hook();\n");
}

#[test]
fn test_cli_help() {
    let (stdout, _, success) = run_srcindex(&["--help"]);

    assert!(success);
    assert!(stdout.contains("srcindex"));
    assert!(stdout.contains("plan"));
    assert!(stdout.contains("run"));
}

#[test]
fn test_cli_version() {
    let (stdout, _, success) = run_srcindex(&["--version"]);

    assert!(success);
    assert!(stdout.contains("srcindex"));
}

#[test]
fn test_plan_text_output() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let root = dir.path().to_str().unwrap();

    let (stdout, _, success) = run_srcindex(&["plan", root]);

    assert!(success);
    assert!(stdout.contains("src/app.js"));
    assert!(!stdout.contains("vendor.min.js"));
    assert!(!stdout.contains("pre-commit.js"));
    // Basic mode: no project grouping
    assert!(!stdout.contains("Projects"));
    assert!(stdout.contains("Total (5 files)"));
}

#[test]
fn test_plan_json_with_projects() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let root = dir.path().to_str().unwrap();

    let (stdout, _, success) =
        run_srcindex(&["plan", root, "--typescript", "full", "--output", "json"]);

    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    let projects = parsed["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["members"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["standalone"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["files"].as_array().unwrap().len(), 2);
}

#[test]
fn test_filter_override_lets_one_minified_file_back() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let root = dir.path().to_str().unwrap();

    let (stdout, _, success) = run_srcindex(&[
        "plan",
        root,
        "--filter",
        "include: **/vendor.min.js",
    ]);

    assert!(success);
    assert!(stdout.contains("vendor/vendor.min.js"));
    assert!(!stdout.contains("other.min.js"));
}

#[test]
fn test_include_inside_exclude() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    write(dir.path(), "vendor/keep.js", "keep();\n");
    let root = dir.path().to_str().unwrap();

    let (stdout, _, success) = run_srcindex(&[
        "plan",
        root,
        "--include",
        ".",
        "--include",
        "vendor/keep.js",
        "--exclude",
        "vendor",
    ]);

    assert!(success);
    assert!(stdout.contains("vendor/keep.js"));
    assert!(stdout.contains("src/app.js"));
}

#[test]
fn test_run_then_rerun_hits_cache() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fixture(&src);
    let root = src.to_str().unwrap();
    let out = dir.path().join("out");
    let cache = dir.path().join("cache");
    let args = [
        "run",
        root,
        "--out",
        out.to_str().unwrap(),
        "--cache",
        cache.to_str().unwrap(),
        "--output",
        "json",
    ];

    let (stdout, _, success) = run_srcindex(&args);
    assert!(success);
    let first: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    assert_eq!(first["files"].as_array().unwrap().len(), 5);

    let (stdout, _, success) = run_srcindex(&args);
    assert!(success);
    let second: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    let cached = second["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["status"]["status"] == "cache_hit")
        .count();
    assert_eq!(cached, 5);
}

#[test]
fn test_run_text_output() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fixture(&src);
    let out = dir.path().join("out");

    let (stdout, _, success) = run_srcindex(&[
        "run",
        src.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--typescript",
        "full",
    ]);

    assert!(success);
    assert!(stdout.contains("Status"));
    assert!(stdout.contains("Project ts/tsconfig.json: 2 of 2 members, closed"));
    assert!(stdout.contains("Total (5 files)"));
}

#[test]
fn test_invalid_filter_fails() {
    let dir = tempdir().unwrap();
    fixture(dir.path());
    let root = dir.path().to_str().unwrap();

    let (_, stderr, success) = run_srcindex(&["plan", root, "--filter", "keep: **/*.js"]);

    assert!(!success);
    assert!(stderr.contains("Error:"));
}

#[test]
fn test_missing_root_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");

    let (_, stderr, success) = run_srcindex(&["plan", missing.to_str().unwrap()]);

    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_strict_run_with_violation_fails() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "ok.js", "ok();\n");
    fs::write(src.join("bad.js"), [0x66, 0xff, 0xfe, 0x0a]).unwrap();
    let out = dir.path().join("out");

    let (_, stderr, success) = run_srcindex(&[
        "run",
        src.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--strict",
    ]);

    assert!(!success);
    assert!(stderr.contains("1 of 2 files failed to extract in strict mode"));
}
