use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_daq_cli"))
}

/// Scratch directory with a settings file and a sample list.
///
/// Each test gets its own temp directory so parallel runs never wipe each
/// other's files.
fn workspace(editable_filename: bool) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "daq_recorder_cli_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    fs::create_dir_all(&dir).expect("scratch dir");
    let settings = serde_json::json!({
        "settings": {
            "default_filename": "run",
            "default_directory": dir.join("saved"),
            "editable_filename": editable_filename
        },
        "host": { "temp_directory": dir.join("temp") },
        "simulator": { "dc_offset": 0.5, "noise_amplitude": 0.0 }
    });
    fs::write(dir.join("settings.json"), settings.to_string()).expect("settings file");
    fs::write(dir.join("Samples.txt"), "Quartz\nSilicon\n").expect("samples file");
    dir
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    let settings = dir.join("settings.json");
    let samples = dir.join("Samples.txt");
    cli()
        .arg("--settings")
        .arg(&settings)
        .arg("--samples-file")
        .arg(&samples)
        .args(args)
        .output()
        .expect("failed to run daq_cli")
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8(output.stdout.clone())
        .expect("stdout UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect()
}

#[test]
fn devices_lists_simulated_device() {
    let output = cli().arg("devices").output().expect("failed to run devices");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.lines().any(|line| line == "Dev1"), "got {stdout}");
}

#[test]
fn samples_lists_configured_names() {
    let dir = workspace(true);
    let output = run_in(&dir, &["samples"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["Quartz", "Silicon"]);
}

#[test]
fn run_streams_json_events_and_summary() {
    let dir = workspace(true);
    let output = run_in(
        &dir,
        &["run", "--data-points", "3", "--wait-time", "0", "--format", "json"],
    );
    assert!(
        output.status.success(),
        "exit {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let lines = json_lines(&output);
    let samples: Vec<&Value> = lines.iter().filter(|v| v["event"] == "sample").collect();
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0]["point"]["index"], 1);
    assert_eq!(samples[2]["point"]["value"], 0.5);
    assert!(lines.iter().any(|v| v["event"] == "completed"));

    let summary = lines.last().expect("summary line");
    assert_eq!(summary["reports"][0]["outcome"]["status"], "completed");
    assert_eq!(summary["reports"][0]["emitted"], 3);
}

#[test]
fn saved_run_can_be_reviewed() {
    let dir = workspace(true);
    let target = dir.join("saved").join("manual.dat");
    let output = run_in(
        &dir,
        &[
            "run",
            "--data-points",
            "4",
            "--wait-time",
            "0",
            "--bias",
            "--manual-bias",
            "-0.25",
            "--sample",
            "Quartz",
            "--save",
            target.to_str().expect("UTF-8 path"),
        ],
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(target.exists(), "expected saved copy at {}", target.display());

    let review = cli()
        .args(["review", "--format", "json"])
        .arg(&target)
        .output()
        .expect("failed to run review");
    assert!(review.status.success());
    let summary: Value =
        serde_json::from_slice(&review.stdout).expect("review summary JSON payload");
    assert_eq!(summary["count"], 4);
    assert_eq!(summary["mean"], 0.25);
    assert_eq!(summary["bias"], -0.25);
}

#[test]
fn no_bias_overrides_settings() {
    let dir = workspace(true);
    let path = dir.join("settings.json");
    let mut settings: Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("settings file")).unwrap();
    settings["acquisition"] = serde_json::json!({
        "data_bias_toggle": true,
        "manual_data_bias": 1.0
    });
    fs::write(&path, settings.to_string()).expect("settings file");

    let biased = run_in(
        &dir,
        &["run", "--data-points", "1", "--wait-time", "0", "--format", "json"],
    );
    let unbiased = run_in(
        &dir,
        &[
            "run",
            "--data-points",
            "1",
            "--wait-time",
            "0",
            "--no-bias",
            "--format",
            "json",
        ],
    );
    assert!(biased.status.success() && unbiased.status.success());

    let value_of = |output: &Output| {
        json_lines(output)
            .into_iter()
            .find(|v| v["event"] == "sample")
            .expect("sample event")["point"]["value"]
            .clone()
    };
    assert_eq!(value_of(&biased), 1.5);
    assert_eq!(value_of(&unbiased), 0.5);
}

#[test]
fn multiline_user_is_rejected() {
    let dir = workspace(true);
    let output = run_in(&dir, &["run", "--data-points", "1", "--user", "alice\n7,99.0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(fs::read_dir(dir.join("temp"))
        .map(|entries| entries.count() == 0)
        .unwrap_or(true));
}

#[test]
fn save_default_uses_configured_path() {
    let dir = workspace(false);
    let output = run_in(
        &dir,
        &["run", "--data-points", "2", "--wait-time", "0", "--save-default"],
    );
    assert!(output.status.success());
    assert!(dir.join("saved").join("run.dat").exists());
}

#[test]
fn fixed_filename_rejects_other_names() {
    let dir = workspace(false);
    let target = dir.join("saved").join("other.dat");
    let output = run_in(
        &dir,
        &[
            "run",
            "--data-points",
            "2",
            "--save",
            target.to_str().expect("UTF-8 path"),
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(!target.exists());
}

#[test]
fn invalid_parameters_are_rejected_before_running() {
    let dir = workspace(true);
    let output = run_in(&dir, &["run", "--data-points", "0"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("Error"), "got {stderr}");
}

#[test]
fn unknown_sample_is_rejected() {
    let dir = workspace(true);
    let output = run_in(&dir, &["run", "--data-points", "1", "--sample", "Glass"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_device_reports_failed_run() {
    let dir = workspace(true);
    let output = run_in(
        &dir,
        &[
            "run",
            "--data-points",
            "2",
            "--device",
            "Dev9",
            "--format",
            "json",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    let lines = json_lines(&output);
    let failed = lines
        .iter()
        .find(|v| v["event"] == "failed")
        .expect("failed event");
    assert_eq!(failed["code"], 1001);
}

#[test]
fn missing_settings_file_is_an_error() {
    let dir = workspace(true);
    let output = cli()
        .arg("--settings")
        .arg(dir.join("absent.json"))
        .arg("--samples-file")
        .arg(dir.join("Samples.txt"))
        .arg("samples")
        .output()
        .expect("failed to run daq_cli");
    assert_eq!(output.status.code(), Some(1));
}
