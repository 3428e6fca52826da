//! End-to-end tests of the `xcshard` binary.
//!
//! Each test runs the compiled binary against the `json-stream` fixtures
//! and inspects its JSON output or its error message.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use xcshard_schemas::ShardingReport;

/// Path to the xcshard binary.
fn xcshard_bin() -> &'static str {
    env!("CARGO_BIN_EXE_xcshard")
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(xcshard_bin())
        .args(args)
        .output()
        .expect("failed to run xcshard")
}

fn run_ok(args: &[&str]) -> String {
    let output = run(args);
    if !output.status.success() {
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        panic!("xcshard failed with status: {}", output.status);
    }
    String::from_utf8(output.stdout).expect("stdout is UTF-8")
}

fn historical() -> String {
    fixture("historical.json-stream").display().to_string()
}

fn current() -> String {
    fixture("current.json-stream").display().to_string()
}

#[test]
fn full_report_on_stdout() {
    let (historical, current) = (historical(), current());
    let stdout = run_ok(&[
        "-p",
        "CommonTestTarget",
        "-p",
        "CommonTestTarget,iPadTestTarget",
        "4",
        &historical,
        &current,
    ]);
    let report: ShardingReport =
        serde_json::from_str(&stdout).expect("stdout is a report");

    assert_eq!(report.metadata.worker_count, 4);
    assert_eq!(report.metadata.partition_set_count, 2);
    assert_eq!(report.metadata.total_time_in_ms, 12_000);
    assert_eq!(report.metadata.stats.historical_total_tests, 6);
    assert_eq!(report.metadata.stats.class_extrapolations, 1);

    assert_eq!(
        report.partition_set_data[1].partition_set,
        "CommonTestTarget,iPadTestTarget"
    );
    let numbers: Vec<usize> = report
        .partition_set_data
        .iter()
        .flat_map(|set| set.partitions.iter().map(|s| s.shard_number))
        .collect();
    assert_eq!(numbers, [1, 2, 3, 4]);
    assert_eq!(
        report.partition_set_data[0].partitions[0].cli_arguments,
        ["-only", "CommonTestTarget:BarTests,BazTests,FooTests"]
    );
}

#[test]
fn abbreviated_xcodebuild_output_to_file() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let out = dir.path().join("shards.json");
    let out_arg = out.display().to_string();
    let (historical, current) = (historical(), current());

    let stdout = run_ok(&[
        "-a",
        "-x",
        "-o",
        &out_arg,
        "-p",
        "CommonTestTarget",
        "2",
        &historical,
        &current,
    ]);
    assert_eq!(stdout.trim(), format!("Wrote file to: {out_arg}"));

    let json = std::fs::read_to_string(&out).expect("output file exists");
    let shards: Vec<Vec<Vec<String>>> =
        serde_json::from_str(&json).expect("output is nested lists");
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].len(), 2);
    assert!(
        shards[0]
            .iter()
            .flatten()
            .all(|arg| arg.starts_with("-only-testing:CommonTestTarget/"))
    );
    assert_eq!(shards[0].iter().map(Vec::len).sum::<usize>(), 3);
}

#[test]
fn skip_testing_lists_other_targets() {
    let (historical, current) = (historical(), current());
    let stdout = run_ok(&[
        "-a",
        "--skip-testing",
        "-p",
        "CommonTestTarget",
        "-p",
        "iPadTestTarget",
        "2",
        &historical,
        &current,
    ]);
    let shards: Vec<Vec<Vec<String>>> =
        serde_json::from_str(&stdout).expect("stdout is nested lists");

    assert_eq!(shards[0][0], ["-skip-testing:iPadTestTarget"]);
    assert_eq!(shards[1][0], ["-skip-testing:CommonTestTarget"]);
}

#[test]
fn partition_options_and_fewer_shards() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let options = dir.path().join("options.json");
    std::fs::write(&options, r#"[{"max_shard_count": 1}, {}]"#)
        .expect("failed to write options");
    let options_arg = options.display().to_string();
    let historical = historical();
    let args: [&str; 8] = [
        "--partition-options",
        &options_arg,
        "-p",
        "CommonTestTarget",
        "-p",
        "iPadTestTarget",
        "4",
        &historical,
    ];

    let output = run(&args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("There are 1 extra machines"), "{stderr}");

    let with_fewer: Vec<&str> =
        args.iter().copied().chain(["--allow-fewer-shards"]).collect();
    let report: ShardingReport = serde_json::from_str(&run_ok(&with_fewer))
        .expect("stdout is a report");
    let sizes: Vec<usize> =
        report.partition_set_data.iter().map(|set| set.size).collect();
    assert_eq!(sizes, [1, 2]);
}

#[test]
fn unknown_option_keys_are_rejected() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let options = dir.path().join("options.json");
    std::fs::write(&options, r#"[{"max_shards": 1}]"#)
        .expect("failed to write options");
    let options_arg = options.display().to_string();
    let historical = historical();

    let output = run(&[
        "--partition-options",
        &options_arg,
        "-p",
        "CommonTestTarget",
        "1",
        &historical,
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid partition options"), "{stderr}");
}

#[test]
fn empty_partition_fails() {
    let historical = historical();
    let output = run(&["-p", "MissingTarget", "1", &historical]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(r#"The following partition has no tests: ["MissingTarget"]"#),
        "{stderr}"
    );
}
