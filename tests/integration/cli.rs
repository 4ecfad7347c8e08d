//! End-to-end tests of the `boxcache` binary.

use crate::common::TestProject;
use boxcache_cli::test_utils::ManifestFixture;
use predicates::prelude::*;

#[test]
fn test_box_list_empty() {
    let project = TestProject::new().unwrap();
    project
        .boxcache()
        .args(["box", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No boxes installed"));
}

#[test]
fn test_box_add_list_remove() {
    let project = TestProject::new().unwrap();
    let source = project.create_box_file("base.box", b"box-content").unwrap();

    project
        .boxcache()
        .args(["box", "add", "base"])
        .arg(&source)
        .assert()
        .success();
    assert!(project.boxes_path().join("base").join("virtualbox").join("box.box").exists());

    project
        .boxcache()
        .args(["box", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base (virtualbox)"));

    project.boxcache().args(["box", "remove", "base"]).assert().success();
    project
        .boxcache()
        .args(["box", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No boxes installed"));
}

#[test]
fn test_box_add_twice_fails_with_already_exists() {
    let project = TestProject::new().unwrap();
    let source = project.create_box_file("base.box", b"box-content").unwrap();

    project.boxcache().args(["box", "add", "base"]).arg(&source).assert().success();
    project
        .boxcache()
        .args(["box", "add", "base"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_box_add_unsupported_scheme() {
    let project = TestProject::new().unwrap();
    project
        .boxcache()
        .args(["box", "add", "base", "ftp://example.com/base.box"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ftp://example.com/base.box"));
}

#[test]
fn test_box_remove_missing() {
    let project = TestProject::new().unwrap();
    project.boxcache().args(["box", "remove", "ghost"]).assert().failure();
}

#[test]
fn test_up_fetches_shared_box_for_all_machines() {
    let project = TestProject::new().unwrap();
    let source = project.create_box_file("base.box", b"shared").unwrap();
    project
        .write_manifest(&ManifestFixture::machines(&["web", "db"], "base", &source.to_string_lossy()))
        .unwrap();

    project
        .boxcache()
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("web: base (virtualbox)"))
        .stdout(predicate::str::contains("db: base (virtualbox)"))
        .stderr(predicate::str::contains("Box 'base' could not be found").count(1));

    // Second run finds everything installed and downloads nothing.
    project
        .boxcache()
        .arg("up")
        .assert()
        .success()
        .stderr(predicate::str::contains("could not be found").not());
}

#[test]
fn test_up_uses_provider_box_format() {
    let project = TestProject::new().unwrap();
    let source = project.create_box_file("base.box", b"shared").unwrap();
    project
        .write_manifest(
            &ManifestFixture::single("base", &source.to_string_lossy())
                .with("[providers.libvirt]\nbox_format = ['kvm', 'libvirt']\n"),
        )
        .unwrap();

    project
        .boxcache()
        .args(["up", "--provider", "libvirt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default: base (kvm)"));
}

#[test]
fn test_up_unknown_machine() {
    let project = TestProject::new().unwrap();
    project.write_manifest(&ManifestFixture::without_url("base")).unwrap();

    project
        .boxcache()
        .args(["up", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_up_without_url_warns_and_downloads_nothing() {
    let project = TestProject::new().unwrap();
    project.write_manifest(&ManifestFixture::without_url("base")).unwrap();

    project
        .boxcache()
        .arg("up")
        .assert()
        .success()
        .stderr(predicate::str::contains("no box_url is set"));
    project
        .boxcache()
        .args(["box", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No boxes installed"));
}

#[test]
fn test_up_without_manifest() {
    let project = TestProject::new().unwrap();
    project
        .boxcache()
        .arg("up")
        .arg("--manifest-path")
        .arg(project.project_path().join("missing.toml"))
        .assert()
        .failure();
}

#[test]
fn test_invalid_manifest_reports_parse_error() {
    let project = TestProject::new().unwrap();
    project.write_manifest(&ManifestFixture::invalid_syntax()).unwrap();
    project
        .boxcache()
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("boxcache.toml"));
}

#[test]
fn test_config_providers_apply_to_box_add() {
    let project = TestProject::new().unwrap();
    project
        .write_config("[providers.libvirt]\nbox_format = ['kvm']\n")
        .unwrap();
    let source = project.create_box_file("base.box", b"x").unwrap();

    project
        .boxcache()
        .args(["box", "add", "base", "--provider", "libvirt"])
        .arg(&source)
        .assert()
        .success();
    assert!(project.boxes_path().join("base").join("kvm").exists());
}
