use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Build a valid TOML config tuned so the simulated rig finishes a run in
// about a second: a low current target, big steps, and permissive slew.
fn write_fast_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[limits]
current_a = 0.3
voltage_v = 3.0
magnet_voltage_v = 2.99
mag_up_step_v = 0.2
didt_mag_up_a_per_s = 100.0
didt_regulate_a_per_s = 100.0
dvdt_v_per_s = 100.0

[regulate]
kp = 1.0
kd = 0.07

[cycle]
period_ms = 10
min_sample_interval_ms = 10

[timeouts]
io_ms = 50
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check: ok", "stdout")]
#[case(&["mag-up"], 0, "target current reached", "stdout")]
#[case(&["regulate", "--target-k", "0.1"], 0, "voltage floored", "stdout")]
#[case(&["regulate"], 2, "required", "stderr")]
#[case(&["regulate", "--target-k", "50.0"], 6, "Invalid control parameter", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("adrctl").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn missing_config_file_is_a_readable_error() {
    let mut cmd = Command::cargo_bin("adrctl").unwrap();
    cmd.arg("--config")
        .arg("/nonexistent/adr_config.toml")
        .arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("reading config"));
}

#[test]
fn invalid_cycle_period_is_rejected_before_running() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        "[cycle]\nperiod_ms = 100\nmin_sample_interval_ms = 1000\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("adrctl").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("cycle.period_ms"));
}

#[test]
fn json_self_check_has_the_expected_shape() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("adrctl").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--json").arg("self-check");
    let out = cmd.assert().code(0).get_output().stdout.clone();

    let line = String::from_utf8(out).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("valid JSON");
    assert_eq!(v["status"], "ok");
    for key in [
        "supply_mode",
        "current_a",
        "voltage_v",
        "back_emf_v",
        "stage_60k",
        "stage_3k",
        "ggg_k",
        "faa_k",
    ] {
        assert!(!v[key].is_null(), "missing key {key}: {v}");
    }
}

#[test]
fn json_run_report_names_the_outcome() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("adrctl").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("regulate")
        .arg("--target-k")
        .arg("0.1");
    let out = cmd.assert().code(0).get_output().stdout.clone();

    let line = String::from_utf8(out).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("valid JSON");
    assert_eq!(v["op"], "regulate");
    assert_eq!(v["outcome"], "voltage floored");
    assert!(v["final_current_a"].is_number());
    assert!(v["elapsed_ms"].is_number());
}

#[test]
fn recording_dir_receives_a_tsv_file() {
    let dir = tempdir().unwrap();
    let records = dir.path().join("records");
    let toml = format!(
        r#"
[limits]
current_a = 0.3
voltage_v = 3.0
magnet_voltage_v = 2.99
mag_up_step_v = 0.2
didt_mag_up_a_per_s = 100.0
didt_regulate_a_per_s = 100.0
dvdt_v_per_s = 100.0

[cycle]
period_ms = 10
min_sample_interval_ms = 10

[timeouts]
io_ms = 50

[recording]
dir = "{}"
"#,
        records.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();

    let mut cmd = Command::cargo_bin("adrctl").unwrap();
    cmd.arg("--config").arg(&path).arg("mag-up");
    cmd.assert().code(0);

    let entries: Vec<_> = fs::read_dir(&records)
        .expect("record dir created")
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("temperatures_")
        })
        .collect();
    assert_eq!(entries.len(), 1, "expected one record file");

    let text = fs::read_to_string(entries[0].path()).unwrap();
    let first = text.lines().next().expect("at least one record line");
    assert!(
        first.split('\t').count() >= 3,
        "short record line: {first:?}"
    );
}
