//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn ewb_cli() -> Command {
    let mut cmd = cargo_bin_cmd!("ewb-cli");
    cmd.env_remove("EWB_SOLVER").env_remove("EWB_NGSPICE");
    cmd
}

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join(name)
}

#[test]
fn help_lists_subcommands() {
    ewb_cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("serve")));
}

#[test]
fn version_matches_package() {
    ewb_cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn operating_point_of_divider() {
    ewb_cli()
        .arg("run")
        .arg(demo("divider.json"))
        .args(["--precision", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v(n2) = 2.5000e0"))
        .stdout(predicate::str::contains("i(r2) = 2.5000e-3"));
}

#[test]
fn precision_counts_digits_after_the_point() {
    ewb_cli()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Digits after the decimal point"));

    ewb_cli()
        .arg("run")
        .arg(demo("divider.json"))
        .args(["--precision", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("i(r2) = 2.5e-3"));
}

#[test]
fn transient_writes_psf() {
    let dir = tempfile::tempdir().unwrap();
    let psf = dir.path().join("rc.psf");
    ewb_cli()
        .arg("run")
        .arg(demo("rc_step.json"))
        .args(["-a", "tran", "--step", "10u", "--end", "5m", "--psf"])
        .arg(&psf)
        .assert()
        .success()
        .stdout(predicate::str::contains("psf written"));
    let text = std::fs::read_to_string(&psf).unwrap();
    assert!(text.starts_with("PSF_TEXT\n"));
    assert!(text.contains("points=501"));
}

#[test]
fn dc_sweep_requires_all_bounds() {
    ewb_cli()
        .arg("run")
        .arg(demo("divider.json"))
        .args(["-a", "dc", "--source", "V1", "--start", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--increment"));
}

#[test]
fn dc_sweep_prints_final_point() {
    ewb_cli()
        .arg("run")
        .arg(demo("divider.json"))
        .args(["-a", "dc", "--source", "V1", "--start", "0", "--stop", "10", "--increment", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("11 samples"))
        .stdout(predicate::str::contains("v(n2) = 5.000000e0"));
}

#[test]
fn zero_step_is_rejected() {
    ewb_cli()
        .arg("run")
        .arg(demo("rc_step.json"))
        .args(["-a", "tran", "--step", "0", "--end", "1m"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("transient step"));
}

#[test]
fn netlist_prints_the_deck() {
    ewb_cli()
        .arg("netlist")
        .arg(demo("divider.json"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("* voltage divider\n"))
        .stdout(predicate::str::contains("V1 n1 0 DC 5"))
        .stdout(predicate::str::contains(".op\n.end"));
}

#[test]
fn validate_reports_explicit_ground() {
    ewb_cli()
        .arg("validate")
        .arg(demo("divider.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ground component"))
        .stdout(predicate::str::contains("no warnings"));
}

#[test]
fn missing_circuit_file_fails() {
    ewb_cli()
        .arg("run")
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
