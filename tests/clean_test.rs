//! Integration tests for `sage-build clean`
//!
//! Clean removes freshness markers only; installed files stay in place.

mod common;

use assert_fs::prelude::*;
use predicates::prelude::*;

const MARKERS: &str = "local/var/lib/sage-build/installed";

fn tree_with_markers() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("packages.toml")
        .write_str(
            "[[package]]\nname = \"gmp\"\nversion = \"6.3.0\"\n\n\
             [[package]]\nname = \"mpfr\"\nversion = \"4.2.1\"\ndepends = [\"gmp\"]\n",
        )
        .unwrap();
    temp.child(format!("{MARKERS}/gmp")).write_str("6.3.0\n").unwrap();
    temp.child(format!("{MARKERS}/mpfr")).write_str("4.2.1\n").unwrap();
    temp.child("local/lib/libgmp.so").write_str("").unwrap();
    temp
}

fn clean(temp: &assert_fs::TempDir, args: &[&str]) -> std::process::Output {
    let mut all = vec!["clean"];
    all.extend_from_slice(args);
    common::run_in(temp.path(), &temp.path().join("no-global-config"), &all)
}

#[test]
fn test_clean_named_package() {
    let temp = tree_with_markers();

    let output = clean(&temp, &["mpfr"]);

    assert!(output.status.success());
    temp.child(format!("{MARKERS}/mpfr"))
        .assert(predicate::path::missing());
    temp.child(format!("{MARKERS}/gmp"))
        .assert(predicate::str::contains("6.3.0"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 1 freshness markers"));
}

#[test]
fn test_clean_all_keeps_installed_files() {
    let temp = tree_with_markers();

    let output = clean(&temp, &[]);

    assert!(output.status.success());
    temp.child(format!("{MARKERS}/gmp"))
        .assert(predicate::path::missing());
    temp.child(format!("{MARKERS}/mpfr"))
        .assert(predicate::path::missing());
    temp.child("local/lib/libgmp.so")
        .assert(predicate::path::exists());
}

#[test]
fn test_clean_nothing_to_do() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("packages.toml")
        .write_str("[[package]]\nname = \"gmp\"\nversion = \"6.3.0\"\n")
        .unwrap();

    let output = clean(&temp, &[]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing to clean"));
}

#[test]
fn test_clean_undeclared_package_fails() {
    let temp = tree_with_markers();

    let output = clean(&temp, &["flint"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("flint"));
    temp.child(format!("{MARKERS}/gmp"))
        .assert(predicate::path::exists());
}

#[test]
fn test_clean_json_lists_removed() {
    let temp = tree_with_markers();

    let output = clean(&temp, &["--json", "gmp", "mpfr"]);

    assert!(output.status.success());
    let removed: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(removed, vec!["gmp", "mpfr"]);
}
