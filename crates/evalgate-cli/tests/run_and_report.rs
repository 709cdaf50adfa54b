//! Black-box CLI tests for `evalgate run` and `evalgate report`.

use assert_cmd::Command;
use evalgate_core::store::RecordStore;
use predicates::prelude::*;
use std::io::Write;

fn write_cases(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn evalgate() -> Command {
    Command::cargo_bin("evalgate").unwrap()
}

/// An agent command that echoes the case's expected literal back, read off
/// its own stdin JSON payload via a tiny inline shell/jq-free filter.
const ECHO_AGENT: &str = r#"python3 -c "
import json, sys
req = json.load(sys.stdin)
print(json.dumps({'text': req['input_prompt'], 'json': None, 'tokens_total': 3, 'cost': 0.0}))
""#;

#[test]
fn run_writes_one_record_per_case_and_exits_zero_on_all_pass() {
    let log_dir = tempfile::tempdir().unwrap();
    let cases = write_cases(
        "case_id,name,input_prompt,expected_output,severity\n\
         TC001,echo,hello,hello,S1\n\
         TC002,echo2,world,world,S1\n",
    );

    evalgate()
        .args(["run"])
        .arg(cases.path())
        .args(["--log-dir"])
        .arg(log_dir.path())
        .args(["--run-id", "run-a", "--agent-command", ECHO_AGENT])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("2/2 passed"));

    let store = RecordStore::open(log_dir.path()).unwrap();
    let records = store.read_run("run-a").unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.passed));
}

#[test]
fn run_exits_nonzero_when_a_case_fails() {
    let log_dir = tempfile::tempdir().unwrap();
    let cases = write_cases(
        "case_id,name,input_prompt,expected_output,severity\n\
         TC001,echo,hello,goodbye,S1\n",
    );

    evalgate()
        .args(["run"])
        .arg(cases.path())
        .args(["--log-dir"])
        .arg(log_dir.path())
        .args(["--run-id", "run-b", "--agent-command", ECHO_AGENT])
        .assert()
        .code(1);
}

#[test]
fn report_renders_a_trailing_window_without_a_single_run_id() {
    let log_dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(log_dir.path()).unwrap();
    store
        .append(&evalgate_core::model::Record {
            schema_version: 1,
            run_id: "run-c".into(),
            case_id: "TC001".into(),
            severity: evalgate_core::model::Severity::S1,
            timestamp: chrono::Utc::now(),
            passed: true,
            failure_type: None,
            latency_ms: 5.0,
            cost: 0.0,
            tokens_total: 1,
            output_text: String::new(),
            output_json: None,
            attempt_index: 0,
        })
        .unwrap();

    evalgate()
        .args(["report", "--log-dir"])
        .arg(log_dir.path())
        .args(["--days", "1", "--baseline-days", "7"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Gate verdict: **PASS**"))
        .stdout(predicate::str::contains("No baseline was available"));
}
