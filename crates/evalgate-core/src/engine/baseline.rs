//! C6: produces a `BaselineSummary` from a directory of prior records or a
//! trailing window of the current log directory.

use crate::engine::aggregator::summarize;
use crate::errors::StoreError;
use crate::model::{BaselineSummary, BaselineWindow};
use crate::store::{read_directory, RecordStore};
use std::path::Path;

/// Directory mode: read every `*.jsonl` file under `dir` non-recursively,
/// fold into one summary. Intended for "last green run on main" artifacts.
pub fn resolve_from_directory(dir: &Path) -> Result<BaselineSummary, StoreError> {
    let records = read_directory(dir)?;
    if records.is_empty() {
        return Ok(BaselineSummary::Absent);
    }
    let baseline_run_ids: std::collections::BTreeSet<String> =
        records.iter().map(|r| r.run_id.clone()).collect();
    Ok(BaselineSummary::Present {
        summary: summarize(&records),
        window: BaselineWindow::BaselineRunIds {
            baseline_run_ids: baseline_run_ids.into_iter().collect(),
        },
    })
}

/// Trailing-window mode: records whose UTC date is in `[end_date - days,
/// end_date)`, excluding the current run's own records.
pub fn resolve_from_window(
    store: &RecordStore,
    days: u32,
    end_date: chrono::NaiveDate,
    current_run_id: &str,
) -> Result<BaselineSummary, StoreError> {
    let start = end_date - chrono::Duration::days(i64::from(days));
    let records: Vec<_> = store
        .read_window(start, end_date)?
        .into_iter()
        .filter(|r| r.run_id != current_run_id)
        .collect();

    if records.is_empty() {
        return Ok(BaselineSummary::Absent);
    }
    Ok(BaselineSummary::Present {
        summary: summarize(&records),
        window: BaselineWindow::Days { days, end_date },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailureType, Record, Severity};

    fn rec(run_id: &str, case_id: &str, ts: chrono::DateTime<chrono::Utc>) -> Record {
        Record {
            schema_version: 1,
            run_id: run_id.into(),
            case_id: case_id.into(),
            severity: Severity::S1,
            timestamp: ts,
            passed: true,
            failure_type: None::<FailureType>,
            latency_ms: 1.0,
            cost: 0.0,
            tokens_total: 0,
            output_text: String::new(),
            output_json: None,
            attempt_index: 0,
        }
    }

    #[test]
    fn empty_directory_yields_absent() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = resolve_from_directory(dir.path()).unwrap();
        assert!(baseline.is_absent());
    }

    #[test]
    fn directory_mode_folds_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        store.append(&rec("run-a", "TC001", chrono::Utc::now())).unwrap();
        let baseline = resolve_from_directory(dir.path()).unwrap();
        assert!(!baseline.is_absent());
        assert_eq!(baseline.summary().unwrap().overall.n_attempts, 1);
    }

    #[test]
    fn trailing_window_excludes_current_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let now = chrono::Utc::now();
        store.append(&rec("baseline-run", "TC001", now)).unwrap();
        store.append(&rec("current-run", "TC001", now)).unwrap();

        let baseline =
            resolve_from_window(&store, 7, (now + chrono::Duration::days(1)).date_naive(), "current-run")
                .unwrap();
        assert_eq!(baseline.summary().unwrap().overall.n_attempts, 1);
    }

    #[test]
    fn no_prior_records_yields_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let now = chrono::Utc::now();
        store.append(&rec("current-run", "TC001", now)).unwrap();

        let baseline =
            resolve_from_window(&store, 7, (now + chrono::Duration::days(1)).date_naive(), "current-run")
                .unwrap();
        assert!(baseline.is_absent());
    }
}
