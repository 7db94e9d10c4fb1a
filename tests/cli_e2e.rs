//! End-to-end CLI tests for the `i2l` binary. None of these reach the network.

#![allow(deprecated)]

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn i2l(workspace: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("i2l").unwrap();
    cmd.current_dir(workspace.path())
        .env_remove("RUST_LOG")
        .arg("--no-format")
        .arg("--no-progress");
    cmd
}

#[test]
fn test_binary_help_describes_pages_and_review() {
    let mut cmd = Command::cargo_bin("i2l").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("src/pages"))
        .stdout(predicate::str::contains("regex-based"))
        .stdout(predicate::str::contains("page"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("i2l").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("i2l"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let mut cmd = Command::cargo_bin("i2l").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_binary_rejects_out_of_range_concurrency() {
    let workspace = TempDir::new().unwrap();
    i2l(&workspace)
        .args(["page", ".", "-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_page_fails_but_prints_banner() {
    let workspace = TempDir::new().unwrap();
    let assert = i2l(&workspace)
        .args(["page", "src/pages/nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"))
        .stdout(predicate::str::contains("git checkout -f && git clean -d -f"));
    assert_eq!(assert.get_output().status.code(), Some(1));
}

#[test]
fn test_invalid_config_file_fails() {
    let workspace = TempDir::new().unwrap();
    fs::write(workspace.path().join("i2l.toml"), "unknown_key = 1\n").unwrap();
    i2l(&workspace)
        .args(["all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("i2l.toml"));
}

#[test]
fn test_page_without_remote_images_is_left_alone() {
    let workspace = TempDir::new().unwrap();
    let page = workspace.path().join("src/pages/home");
    fs::create_dir_all(&page).unwrap();
    let source = "export default () => <img src=\"https://www.example.com/a.png\" />;\n";
    fs::write(page.join("index.js"), source).unwrap();

    i2l(&workspace)
        .args(["page", "src/pages/home"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rewrote 0 file(s)"))
        .stdout(predicate::str::contains("git diff"));

    assert_eq!(fs::read_to_string(page.join("index.js")).unwrap(), source);
    assert!(!page.join("assets").exists());
}

#[test]
fn test_all_skips_excluded_folders_and_reports_missing_entry() {
    let workspace = TempDir::new().unwrap();
    let pages = workspace.path().join("src/pages");
    fs::create_dir_all(pages.join("home")).unwrap();
    fs::write(pages.join("home/index.js"), "export default 1;\n").unwrap();
    fs::create_dir_all(pages.join("broken")).unwrap();
    fs::create_dir_all(pages.join("assets")).unwrap();

    i2l(&workspace)
        .args(["all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scanned 2 page(s)"))
        .stdout(predicate::str::contains("1 page(s) had no entry file"));
}
