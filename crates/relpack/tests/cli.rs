use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::path::Path;
use tempfile::tempdir;

fn relpack() -> Command {
    Command::cargo_bin("relpack").unwrap()
}

fn project() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    fs::create_dir_all(dir.path().join("classes")).unwrap();
    fs::write(dir.path().join("tests/CartTest.php"), "<?php").unwrap();
    fs::write(dir.path().join("classes/Cart.php"), "<?php").unwrap();
    fs::write(dir.path().join(".DS_Store"), "x").unwrap();
    dir
}

#[test]
fn test_help_lists_commands() {
    relpack()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("manifest"));
}

#[test]
fn test_snapshot_is_a_dry_run() {
    let dir = project();

    relpack()
        .arg("snapshot")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("remove tests/"))
        .stdout(predicate::str::contains("remove .DS_Store"))
        .stdout(predicate::str::contains("Cart.php").not());

    assert!(dir.path().join("tests/CartTest.php").is_file());
    assert!(dir.path().join(".DS_Store").is_file());
}

#[test]
fn test_snapshot_json() {
    let dir = project();

    let output = relpack()
        .args(["--format", "json", "snapshot"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["files"], 3);
    assert_eq!(value["removals"].as_array().unwrap().len(), 2);
}

#[test]
fn test_manifest_to_stdout() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello world").unwrap();

    relpack()
        .args(["manifest", "--version", "1.2.3"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("<ps_root_dir version=\"1.2.3\">"))
        .stdout(predicate::str::contains(
            "<md5file name=\"a.txt\">5eb63bbbe01eeed093cb22bb8f5acdc3</md5file>",
        ));
}

#[test]
fn test_manifest_missing_dir_fails() {
    let dir = tempdir().unwrap();

    relpack()
        .args(["manifest", "--version", "1.0"])
        .arg(dir.path().join("missing"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid snapshot root"));
}

#[test]
fn test_snapshot_ignores_where_the_project_lives() {
    let tmp = tempdir().unwrap();
    for name in ["web/shop", "myweb", "idea-shop"] {
        let dir = tmp.path().join(name);
        fs::create_dir_all(dir.join("classes")).unwrap();
        fs::create_dir_all(dir.join("tests")).unwrap();
        fs::write(dir.join("classes/Cart.php"), "<?php").unwrap();
        fs::write(dir.join("index.php"), "<?php").unwrap();

        relpack()
            .arg("snapshot")
            .arg(&dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("remove tests/"))
            .stdout(predicate::str::contains("Cart.php").not())
            .stdout(predicate::str::contains("index.php").not())
            .stdout(predicate::str::contains("1 of 2 files"));
    }
}

#[test]
fn test_manifest_rejects_invalid_root_label() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    relpack()
        .args(["manifest", "--version", "1.0", "--root-label", "a b"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not a valid element name"));
}

#[test]
fn test_rules_prints_reference_set() {
    relpack()
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains(".DS_Store"))
        .stdout(predicate::str::contains("_dev/package\\.json$"));
}

#[test]
fn test_invalid_rules_file() {
    let dir = tempdir().unwrap();
    let rules = dir.path().join("rules.yaml");
    fs::write(&rules, "patterns: ['(unclosed']\n").unwrap();

    relpack()
        .arg("rules")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid removal pattern"));
}

#[cfg(unix)]
#[test]
fn test_build_writes_release() {
    let dir = project();
    let out = tempdir().unwrap();

    relpack()
        .args(["build", "--version", "1.0.0", "--project"])
        .arg(dir.path())
        .arg("--destination")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Release 1.0.0"));

    let package = dir.path().file_name().unwrap().to_string_lossy().to_string();
    assert!(out.path().join(format!("{package}_1.0.0.tar.gz")).is_file());
    assert!(out.path().join(format!("{package}_1.0.0.xml")).is_file());
    assert!(out.path().join("release-report.json").is_file());
}

#[cfg(unix)]
#[test]
fn test_build_with_failing_step_exits_1() {
    let dir = project();
    let out = tempdir().unwrap();
    fs::write(
        dir.path().join("relpack.yaml"),
        "install:\n  program: sh\n  args: ['-c', 'exit 4']\n",
    )
    .unwrap();

    relpack()
        .args(["build", "--version", "1.0.0", "--project"])
        .arg(dir.path())
        .arg("--destination")
        .arg(out.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("External step 'install' failed"));
}

/// Make every directory under `dir` writable again so it can be dropped.
#[cfg(unix)]
fn unlock(dir: &Path) {
    let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o755));
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                unlock(&entry.path());
            }
        }
    }
}

#[cfg(unix)]
#[test]
fn test_build_with_deletion_failure_exits_2() {
    let check = tempdir().unwrap();
    fs::set_permissions(check.path(), fs::Permissions::from_mode(0o555)).unwrap();
    let enforced = fs::write(check.path().join("f"), "x").is_err();
    unlock(check.path());
    if !enforced {
        eprintln!("skipping: directory permissions are not enforced for this user");
        return;
    }

    let dir = project();
    let out = tempdir().unwrap();
    let tmp = tempdir().unwrap();
    fs::write(
        dir.path().join("relpack.yaml"),
        "install:\n  program: sh\n  args: ['-c', 'mkdir -p locked/tests && touch locked/tests/a.php && chmod 555 locked']\n",
    )
    .unwrap();

    let assert = relpack()
        .env("TMPDIR", tmp.path())
        .args(["build", "--version", "1.0.0", "--project"])
        .arg(dir.path())
        .arg("--destination")
        .arg(out.path())
        .assert();
    unlock(tmp.path());
    assert
        .code(2)
        .stdout(predicate::str::contains("Deletion failures (1)"))
        .stdout(predicate::str::contains("locked/tests"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join("release-report.json")).unwrap())
            .unwrap();
    assert_eq!(report["failures"].as_array().unwrap().len(), 1);
}
