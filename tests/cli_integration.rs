//! CLI integration tests for slipway.
//!
//! These tests drive the binary against the shipped QEMU recipe (planning
//! only) and against a tiny shell-script recipe that really builds and
//! verifies.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the slipway binary command.
fn slipway() -> Command {
    let mut cmd = Command::cargo_bin("slipway").unwrap();
    // Keep user config out of the tests.
    cmd.env("HOME", env!("CARGO_TARGET_TMPDIR"));
    cmd
}

fn qemu_recipe() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("recipes/qemu.toml")
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// ============================================================================
// slipway plan
// ============================================================================

#[test]
fn test_plan_linux_enables_gtk() {
    slipway()
        .arg("plan")
        .arg(qemu_recipe())
        .args(["--os", "linux", "--compiler", "gcc@13", "--prefix", "/opt/qemu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  + --enable-gtk"))
        .stdout(predicate::str::contains("--prefix=/opt/qemu"))
        .stdout(predicate::str::contains("LIBTOOL=glibtool"))
        .stdout(predicate::str::contains("--enable-cocoa").not());
}

#[test]
fn test_plan_macos_uses_cocoa() {
    slipway()
        .arg("plan")
        .arg(qemu_recipe())
        .args(["--os", "macos", "--compiler", "apple-clang@15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  + --disable-gtk"))
        .stdout(predicate::str::contains("  + --enable-cocoa"));
}

#[test]
fn test_plan_json() {
    let output = slipway()
        .arg("plan")
        .arg(qemu_recipe())
        .args(["--os", "linux", "--compiler", "clang@17", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["package"], "qemu");
    assert_eq!(plan["args"][0], "--prefix=/usr/local");
    assert_eq!(plan["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_plan_gcc5_rejected() {
    slipway()
        .arg("plan")
        .arg(qemu_recipe())
        .args(["--os", "macos", "--compiler", "gcc@5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration rejected"))
        .stderr(predicate::str::contains("gcc 5"));
}

#[test]
fn test_run_gcc5_rejected_before_building() {
    let tmp = temp_dir();
    slipway()
        .arg("run")
        .arg(qemu_recipe())
        .args(["--os", "macos", "--compiler", "gcc@5", "--prefix"])
        .arg(tmp.path().join("prefix"))
        .arg("--source")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration rejected"));

    assert!(!tmp.path().join("prefix").exists());
}

#[test]
fn test_plan_invalid_recipe() {
    let tmp = temp_dir();
    let recipe = tmp.path().join("bad.toml");
    fs::write(
        &recipe,
        r#"
[package]
name = "Bad"
version = "1.0.0"

[source]
url = "https://example.com/bad.tar.gz"
sha256 = "0000000000000000000000000000000000000000000000000000000000000000"

[configure]
args = []
"#,
    )
    .unwrap();

    slipway()
        .arg("plan")
        .arg(&recipe)
        .args(["--compiler", "gcc@13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lowercase"));
}

// ============================================================================
// slipway deps
// ============================================================================

#[test]
fn test_deps_for_linux_and_macos() {
    slipway()
        .arg("deps")
        .arg(qemu_recipe())
        .args(["--os", "linux", "--compiler", "gcc@13"])
        .assert()
        .success()
        .stdout(predicate::str::contains("build dependencies:"))
        .stdout(predicate::str::contains("  systemd"))
        .stdout(predicate::str::contains("  zlib"));

    slipway()
        .arg("deps")
        .arg(qemu_recipe())
        .args(["--os", "macos", "--compiler", "apple-clang@15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  systemd").not())
        .stdout(predicate::str::contains("  pixman"));
}

#[test]
fn test_deps_all_shows_conditions() {
    slipway()
        .arg("deps")
        .arg(qemu_recipe())
        .args(["--os", "macos", "--compiler", "apple-clang@15", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("systemd (when os=linux)"));
}

// ============================================================================
// slipway run / verify against a real (tiny) build
// ============================================================================

const FAKE_RECIPE: &str = r#"
[package]
name = "fake"
version = "1.0.0"

[source]
url = "https://example.com/fake-1.0.0.tar.gz"
sha256 = "0000000000000000000000000000000000000000000000000000000000000000"

[configure]
args = ["--prefix={prefix}"]

[[steps]]
name = "install"
command = "sh"
args = ["install.sh", "{prefix}"]

[test.variants]
command = "{bin}/fake-{variant}"
args = ["--version"]
ids = ["a", "b", "c"]
"#;

/// Lay out a source tree whose install step writes one script per variant;
/// `stale` variants report an old version.
fn fake_source(dir: &Path, stale: &[&str]) {
    fs::write(dir.join("fake.toml"), FAKE_RECIPE).unwrap();

    let mut script = String::from("#!/bin/sh\nset -e\nmkdir -p \"$1/bin\"\n");
    for id in ["a", "b", "c"] {
        let version = if stale.contains(&id) { "0.9.0" } else { "1.0.0" };
        script.push_str(&format!(
            "printf '#!/bin/sh\\necho \"fake version {}\"\\n' > \"$1/bin/fake-{}\"\nchmod +x \"$1/bin/fake-{}\"\n",
            version, id, id
        ));
    }
    fs::write(dir.join("install.sh"), script).unwrap();
}

#[cfg(unix)]
#[test]
fn test_run_builds_and_verifies() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &[]);
    let prefix = tmp.path().join("prefix");

    slipway()
        .args(["run", "fake.toml", "--os", "linux", "--compiler", "gcc@13", "--prefix"])
        .arg(&prefix)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Variants: 3/3 passed"))
        .stdout(predicate::str::contains("Result: PASSED"));

    assert!(prefix.join("bin/fake-a").exists());
}

#[cfg(unix)]
#[test]
fn test_run_reports_failing_variant() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &["b"]);

    slipway()
        .args(["run", "fake.toml", "--os", "linux", "--compiler", "gcc@13", "--prefix"])
        .arg(tmp.path().join("prefix"))
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Variants: 2/3 passed"))
        .stdout(predicate::str::contains("[FAIL] b"))
        .stdout(predicate::str::contains("Result: FAILED"));
}

#[cfg(unix)]
#[test]
fn test_verbose_run_explains_failures() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &["c"]);

    slipway()
        .args(["run", "fake.toml", "--verbose", "--compiler", "gcc@13", "--prefix"])
        .arg(tmp.path().join("prefix"))
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: variant `c` failed"))
        .stderr(predicate::str::contains("fake version 0.9.0"))
        .stderr(predicate::str::contains("variant `a` failed").not());
}

#[cfg(unix)]
#[test]
fn test_verify_json_after_install() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &["c"]);
    let prefix = tmp.path().join("prefix");

    slipway()
        .args(["run", "fake.toml", "--skip-verify", "--compiler", "gcc@13", "--prefix"])
        .arg(&prefix)
        .current_dir(tmp.path())
        .assert()
        .success();

    let output = slipway()
        .args(["verify", "fake.toml", "--compiler", "gcc@13", "--output-format", "json", "--prefix"])
        .arg(&prefix)
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], false);
    assert_eq!(report["verification"]["variants"]["a"]["passed"], true);
    assert_eq!(report["verification"]["variants"]["c"]["passed"], false);
}

#[test]
fn test_verify_warns_about_missing_install() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &[]);

    slipway()
        .args(["verify", "fake.toml", "--compiler", "gcc@13", "--prefix"])
        .arg(tmp.path().join("nowhere"))
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("warning: "))
        .stderr(predicate::str::contains("does not exist, every variant will fail"))
        .stdout(predicate::str::contains("Variants: 0/3 passed"));
}

#[cfg(unix)]
#[test]
fn test_run_build_failure() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &[]);
    fs::write(tmp.path().join("install.sh"), "echo 'disk full' >&2\nexit 3\n").unwrap();

    slipway()
        .args(["run", "fake.toml", "--compiler", "gcc@13", "--prefix"])
        .arg(tmp.path().join("prefix"))
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("build step `install` failed with exit code 3"))
        .stderr(predicate::str::contains("disk full"));
}

#[test]
fn test_dry_run_prints_commands() {
    let tmp = temp_dir();
    fake_source(tmp.path(), &[]);

    slipway()
        .args(["run", "fake.toml", "--dry-run", "--compiler", "gcc@13", "--prefix", "/opt/fake"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("sh install.sh /opt/fake"));

    assert!(!Path::new("/opt/fake/bin/fake-a").exists());
}

// ============================================================================
// slipway completions
// ============================================================================

#[test]
fn test_completions_bash() {
    slipway()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slipway"));
}

#[test]
fn test_invalid_output_format() {
    slipway()
        .arg("verify")
        .arg(qemu_recipe())
        .args(["--compiler", "gcc@13", "--prefix", "/opt/qemu", "--output-format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid output format"));
}
