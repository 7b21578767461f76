//! Immutable in-memory snapshot of runs and results.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::model::{TestResult, TestRun};
use super::source::{fetch_all_records, DataSource, Pager, Query, Table};
use super::Result;

/// Everything the engines consume, fetched once up front.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub runs: Vec<TestRun>,
    pub results: Vec<TestResult>,
}

impl Snapshot {
    pub fn new(runs: Vec<TestRun>, results: Vec<TestResult>) -> Self {
        Self { runs, results }
    }

    /// Page both tables out of `source`, newest first.
    ///
    /// Any paging failure aborts the whole load. Rows that cannot be decoded
    /// are skipped with a warning.
    pub fn load(
        source: &dyn DataSource,
        since: Option<DateTime<Utc>>,
        pager: &Pager,
    ) -> Result<Self> {
        let runs = fetch_table::<TestRun>(source, Table::TestRun, since, pager)?;
        let results = fetch_table::<TestResult>(source, Table::TestResult, since, pager)?;
        Ok(Self { runs, results })
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.results.is_empty()
    }
}

fn fetch_table<T: DeserializeOwned>(
    source: &dyn DataSource,
    table: Table,
    since: Option<DateTime<Utc>>,
    pager: &Pager,
) -> Result<Vec<T>> {
    let mut query = Query::newest_first(table);
    if let Some(since) = since {
        query = query.since(
            table.timestamp_column(),
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }
    let rows = fetch_all_records(source, table, &query, pager)?;
    Ok(decode_rows(table, rows))
}

fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Vec<T> {
    let mut skipped = 0usize;
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                skipped += 1;
                tracing::debug!(table = table.as_str(), "skipping undecodable row: {e}");
                None
            }
        })
        .collect();
    if skipped > 0 {
        tracing::warn!("Skipped {} undecodable {} rows", skipped, table.as_str());
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::JsonDirSource;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_load_applies_since_window() {
        let source = JsonDirSource::from_rows(
            vec![
                json!({"id": 1, "status": "PASSED", "started_at": "2025-06-01T00:00:00Z",
                       "test_suite": {"name": "user-unit"}}),
                json!({"id": 2, "status": "FAILED", "started_at": "2025-09-15T00:00:00Z",
                       "test_suite": {"name": "user-unit"}}),
            ],
            vec![json!({"id": 9, "status": "PASSED", "created_at": "2025-09-15T00:00:00Z",
                        "duration_ms": 12})],
        );
        let since = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot::load(&source, Some(since), &Pager::default()).unwrap();
        assert_eq!(snapshot.runs.len(), 1);
        assert_eq!(snapshot.runs[0].id, "2");
        assert_eq!(snapshot.results.len(), 1);
    }

    #[test]
    fn test_load_skips_bad_rows() {
        let source = JsonDirSource::from_rows(
            vec![json!({"id": 1, "status": 7}), json!({"id": 2, "status": "PASSED"})],
            Vec::new(),
        );
        let snapshot = Snapshot::load(&source, None, &Pager::default()).unwrap();
        assert_eq!(snapshot.runs.len(), 1);
        assert!(snapshot.results.is_empty());
    }

    #[test]
    fn test_default_snapshot_is_empty() {
        assert!(Snapshot::default().is_empty());
    }
}
