//! C4: executes cases (optionally N×) via an injected `AgentInvoker`,
//! emitting one `Record` per execution.

use crate::invoker::AgentInvoker;
use crate::model::{Case, ExpectedOutput, FailureType, Record, Severity};
use crate::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Inputs to one `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Opaque batch identifier shared by every record this invocation writes.
    pub run_id: String,
    /// Repetitions per case (>= 1).
    pub repeat_n: u32,
    /// Maximum number of concurrently in-flight invocations.
    pub concurrency: usize,
    /// Hard per-item deadline.
    pub timeout: Duration,
}

/// Outcome of a full `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Every record written (or attempted — see `write_failures`).
    pub records: Vec<Record>,
    /// Number of items whose record failed to persist (logged, not aborted).
    pub write_failures: u32,
}

impl RunReport {
    /// `run`'s own exit policy: any non-passing item is a nonzero exit,
    /// independent of the gate's threshold model (spec.md §4.4, §9 Open
    /// Questions — preserved as-is).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.write_failures == 0 && self.records.iter().all(|r| r.passed)
    }
}

/// Executes `cases` × `repeat_n` work items against `invoker`, bounded by
/// `options.concurrency`, writing each resulting record to `store`.
pub async fn run(
    cases: &[Case],
    invoker: Arc<dyn AgentInvoker>,
    store: &RecordStore,
    options: RunOptions,
) -> RunReport {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for case in cases {
        for attempt_index in 0..options.repeat_n {
            let semaphore = Arc::clone(&semaphore);
            let invoker = Arc::clone(&invoker);
            let run_id = options.run_id.clone();
            let timeout = options.timeout;
            let case = case.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                execute_one(&case, invoker.as_ref(), &run_id, attempt_index, timeout).await
            });
        }
    }

    let mut records = Vec::new();
    let mut write_failures = 0u32;

    while let Some(joined) = tasks.join_next().await {
        let record = match joined {
            Ok(record) => record,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "run worker task panicked");
                write_failures += 1;
                continue;
            }
        };

        match store.append(&record) {
            Ok(()) => records.push(record),
            Err(err) => {
                tracing::warn!(case_id = %record.case_id, error = %err, "failed to persist record");
                write_failures += 1;

                let mut substitute = record;
                substitute.passed = false;
                substitute.failure_type = Some(FailureType::ProviderError);
                if let Err(retry_err) = store.append(&substitute) {
                    tracing::warn!(
                        case_id = %substitute.case_id,
                        error = %retry_err,
                        "failed to persist provider_error substitute for a dropped write"
                    );
                }
                records.push(substitute);
            }
        }
    }

    tracing::info!(
        run_id = %options.run_id,
        total = records.len(),
        write_failures,
        "run complete"
    );

    RunReport {
        records,
        write_failures,
    }
}

async fn execute_one(
    case: &Case,
    invoker: &dyn AgentInvoker,
    run_id: &str,
    attempt_index: u32,
    timeout: Duration,
) -> Record {
    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(timeout, invoker.invoke(case)).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let (passed, failure_type, text, json, tokens_total, cost) = match outcome {
        Err(_elapsed) => (false, Some(FailureType::Timeout), String::new(), None, 0, 0.0),
        Ok(Err(invoker_err)) => {
            tracing::debug!(case_id = %case.case_id, error = %invoker_err, "invoker error");
            (false, Some(FailureType::ProviderError), String::new(), None, 0, 0.0)
        }
        Ok(Ok(result)) => classify(case, &result),
    };

    Record {
        schema_version: 1,
        run_id: run_id.to_string(),
        case_id: case.case_id.clone(),
        severity: case.severity,
        timestamp: chrono::Utc::now(),
        passed,
        failure_type,
        latency_ms,
        cost,
        tokens_total,
        output_text: text,
        output_json: json,
        attempt_index,
    }
}

type ClassifiedOutcome = (bool, Option<FailureType>, String, Option<serde_json::Value>, u64, f64);

fn classify(case: &Case, result: &crate::invoker::InvokerOutcome) -> ClassifiedOutcome {
    let base = (
        result.text.clone(),
        result.json.clone(),
        result.tokens_total,
        result.cost,
    );

    match &case.expected_output {
        ExpectedOutput::Schema { schema } => {
            let parsed = result
                .json
                .clone()
                .or_else(|| serde_json::from_str(&result.text).ok());
            let Some(value) = parsed else {
                return (false, Some(FailureType::BadJson), base.0, base.1, base.2, base.3);
            };
            if schema_matches(schema, &value) {
                (true, None, base.0, Some(value), base.2, base.3)
            } else {
                (
                    false,
                    Some(FailureType::SchemaMismatch),
                    base.0,
                    Some(value),
                    base.2,
                    base.3,
                )
            }
        }
        ExpectedOutput::Literal { value } => {
            if &result.text == value {
                (true, None, base.0, base.1, base.2, base.3)
            } else {
                (false, Some(FailureType::QualityFail), base.0, base.1, base.2, base.3)
            }
        }
    }
}

/// Minimal structural schema check: `required` keys present, `properties`
/// types match (`"string" | "number" | "boolean" | "object" | "array"`), and
/// no keys outside `properties` are present when `properties` is declared.
fn schema_matches(schema: &serde_json::Value, value: &serde_json::Value) -> bool {
    let serde_json::Value::Object(obj) = value else {
        return false;
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required {
            let Some(key) = key.as_str() else { return false };
            if !obj.contains_key(key) {
                return false;
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, spec) in properties {
            let Some(expected_type) = spec.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            if let Some(actual) = obj.get(key) {
                if !value_matches_type(actual, expected_type) {
                    return false;
                }
            }
        }

        if obj.keys().any(|key| !properties.contains_key(key)) {
            return false;
        }
    }

    true
}

fn value_matches_type(value: &serde_json::Value, expected_type: &str) -> bool {
    match expected_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// Severity-aware per-case min_pass_rate lookup, used by the gate (C8).
#[must_use]
pub fn severity_of(cases: &[Case], case_id: &str) -> Option<Severity> {
    cases.iter().find(|c| c.case_id == case_id).map(|c| c.severity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{FakeInvoker, FakeOutcome, InvokerOutcome};

    fn case(case_id: &str, expected: ExpectedOutput) -> Case {
        Case {
            case_id: case_id.into(),
            name: case_id.into(),
            input_prompt: "hi".into(),
            expected_output: expected,
            severity: Severity::S1,
            owner: None,
            tags: Default::default(),
            min_pass_rate: 1.0,
            category: None,
        }
    }

    #[tokio::test]
    async fn literal_match_passes() {
        let cases = vec![case(
            "TC001",
            ExpectedOutput::Literal { value: "TC001".into() },
        )];
        let invoker = Arc::new(FakeInvoker::new());
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 2,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert!(report.all_passed());
        assert_eq!(report.records.len(), 1);
    }

    #[tokio::test]
    async fn literal_mismatch_is_quality_fail() {
        let cases = vec![case(
            "TC002",
            ExpectedOutput::Literal { value: "expected".into() },
        )];
        let invoker = Arc::new(FakeInvoker::new());
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert!(!report.all_passed());
        assert_eq!(report.records[0].failure_type, Some(FailureType::QualityFail));
    }

    #[tokio::test]
    async fn timeout_produces_timeout_record() {
        let cases = vec![case(
            "TC003",
            ExpectedOutput::Literal { value: "x".into() },
        )];
        let invoker = Arc::new(
            FakeInvoker::new().with_outcome("TC003", FakeOutcome::HangForever),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_millis(20),
            },
        )
        .await;
        assert_eq!(report.records[0].failure_type, Some(FailureType::Timeout));
    }

    #[tokio::test]
    async fn provider_error_is_classified() {
        let cases = vec![case(
            "TC004",
            ExpectedOutput::Literal { value: "x".into() },
        )];
        let invoker = Arc::new(
            FakeInvoker::new().with_outcome("TC004", FakeOutcome::Err("boom".into())),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert_eq!(report.records[0].failure_type, Some(FailureType::ProviderError));
    }

    #[tokio::test]
    async fn repeat_n_expands_work_items_with_attempt_index() {
        let cases = vec![case(
            "TC007",
            ExpectedOutput::Literal { value: "TC007".into() },
        )];
        let invoker = Arc::new(FakeInvoker::new());
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 3,
                concurrency: 4,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert_eq!(report.records.len(), 3);
        let mut indices: Vec<u32> = report.records.iter().map(|r| r.attempt_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn schema_expectation_requires_required_keys() {
        let schema = serde_json::json!({"required": ["name"]});
        let cases = vec![case("TC008", ExpectedOutput::Schema { schema })];
        let invoker = Arc::new(FakeInvoker::new().with_outcome(
            "TC008",
            FakeOutcome::Ok(InvokerOutcome {
                text: r#"{"other": 1}"#.into(),
                json: None,
                tokens_total: 5,
                cost: 0.0,
            }),
        ));
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert_eq!(
            report.records[0].failure_type,
            Some(FailureType::SchemaMismatch)
        );
    }

    #[tokio::test]
    async fn write_failure_yields_a_retained_provider_error_record() {
        let cases = vec![case(
            "TC005",
            ExpectedOutput::Literal { value: "TC005".into() },
        )];
        let invoker = Arc::new(FakeInvoker::new());
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();

        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_secs(5),
            },
        )
        .await;

        assert_eq!(report.write_failures, 1);
        assert_eq!(report.records.len(), 1);
        assert!(!report.records[0].passed);
        assert_eq!(report.records[0].failure_type, Some(FailureType::ProviderError));
        assert!(!report.all_passed());
    }

    #[tokio::test]
    async fn schema_expectation_rejects_extra_keys() {
        let schema = serde_json::json!({"properties": {"name": {"type": "string"}}});
        let cases = vec![case("TC009", ExpectedOutput::Schema { schema })];
        let invoker = Arc::new(FakeInvoker::new().with_outcome(
            "TC009",
            FakeOutcome::Ok(InvokerOutcome {
                text: r#"{"name": "a", "extra": 1}"#.into(),
                json: None,
                tokens_total: 5,
                cost: 0.0,
            }),
        ));
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let report = run(
            &cases,
            invoker,
            &store,
            RunOptions {
                run_id: "r1".into(),
                repeat_n: 1,
                concurrency: 1,
                timeout: Duration::from_secs(5),
            },
        )
        .await;
        assert_eq!(
            report.records[0].failure_type,
            Some(FailureType::SchemaMismatch)
        );
    }
}
