//! Test-run records and the shared enums derived from them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized outcome of a run or a single result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Status {
    Passed,
    Failed,
    /// Anything that is neither a pass nor a failure (skipped, pending, missing).
    Other(String),
}

impl Status {
    /// Normalize a raw status label. `PASSED|PASS|SUCCESS` pass,
    /// `FAILED|FAIL|ERROR` fail, the rest count toward totals only.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Status::Other("UNKNOWN".to_string());
        };
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "PASSED" | "PASS" | "SUCCESS" => Status::Passed,
            "FAILED" | "FAIL" | "ERROR" => Status::Failed,
            _ => Status::Other(upper),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Status::Passed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed)
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Passed => "PASSED".to_string(),
            Status::Failed => "FAILED".to_string(),
            Status::Other(s) => s,
        }
    }
}

/// Test classification inferred from suite naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Unit,
    Api,
    Integration,
    Ui,
    System,
}

impl Category {
    /// Every category a well-tested service is expected to exercise.
    pub const ALL: [Category; 5] = [
        Category::Unit,
        Category::Api,
        Category::Integration,
        Category::Ui,
        Category::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Unit => "unit",
            Category::Api => "api",
            Category::Integration => "integration",
            Category::Ui => "ui",
            Category::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unit" => Ok(Self::Unit),
            "api" => Ok(Self::Api),
            "integration" => Ok(Self::Integration),
            "ui" => Ok(Self::Ui),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown test category: {s}")),
        }
    }
}

/// Three-tier risk classification shared by scorecards and impact reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        })
    }
}

/// A CI test run. Deserializes from the nested `test_run` row shape or from
/// its own flat serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RunRow")]
pub struct TestRun {
    pub id: String,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub suite: Option<String>,
    pub project: Option<String>,
}

impl TestRun {
    pub fn new(id: impl Into<String>, suite: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            started_at: None,
            suite: Some(suite.into()),
            project: None,
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// A single test-case result. Deserializes from the nested `test_result` row
/// shape or from its own flat serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ResultRow")]
pub struct TestResult {
    pub id: String,
    pub status: Status,
    /// Known, positive duration. Missing or zero durations are `None`.
    pub duration_ms: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub test_case: Option<String>,
    pub tags: BTreeSet<String>,
    pub suite: Option<String>,
    pub project: Option<String>,
}

impl TestResult {
    pub fn new(id: impl Into<String>, test_case: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            duration_ms: None,
            created_at: None,
            test_case: Some(test_case.into()),
            tags: BTreeSet::new(),
            suite: None,
            project: None,
        }
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration_ms = known_duration(Some(ms));
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn is_security(&self) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case("security"))
    }
}

fn known_duration(ms: Option<f64>) -> Option<f64> {
    ms.filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse a database timestamp. Offsets (including hour-only `+05`) are honored,
/// naive timestamps are taken as UTC, garbage is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let with_offset = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok());
    if let Some(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Raw row shapes as returned by the hosted database. The flat `suite` and
// `project` keys written by `Serialize` are accepted as well.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedRow {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuiteRow {
    name: Option<String>,
    project: Option<NamedRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunRow {
    id: Value,
    status: Option<String>,
    started_at: Option<String>,
    test_suite: Option<SuiteRow>,
    suite: Option<String>,
    project: Option<String>,
}

impl From<RunRow> for TestRun {
    fn from(row: RunRow) -> Self {
        let (suite, project) = split_suite(row.test_suite);
        let suite = suite.or(row.suite);
        let project = project.or(row.project);
        Self {
            id: id_to_string(&row.id),
            status: Status::parse(row.status.as_deref()),
            started_at: row.started_at.as_deref().and_then(parse_timestamp),
            suite,
            project,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CaseRow {
    name: Option<String>,
    tags: Option<Vec<String>>,
}

/// Nested `test_case { name, tags }` or a bare test case name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaseField {
    Name(String),
    Row(CaseRow),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParentRunRow {
    test_suite: Option<SuiteRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultRow {
    id: Value,
    status: Option<String>,
    duration_ms: Option<f64>,
    created_at: Option<String>,
    test_case: Option<CaseField>,
    test_run: Option<ParentRunRow>,
    tags: Option<Vec<String>>,
    suite: Option<String>,
    project: Option<String>,
}

impl From<ResultRow> for TestResult {
    fn from(row: ResultRow) -> Self {
        let (suite, project) = split_suite(row.test_run.and_then(|r| r.test_suite));
        let suite = suite.or(row.suite);
        let project = project.or(row.project);
        let (test_case, nested_tags) = match row.test_case {
            Some(CaseField::Row(case)) => (case.name, case.tags),
            Some(CaseField::Name(name)) => (Some(name), None),
            None => (None, None),
        };
        let tags = nested_tags.or(row.tags).unwrap_or_default();
        Self {
            id: id_to_string(&row.id),
            status: Status::parse(row.status.as_deref()),
            duration_ms: known_duration(row.duration_ms),
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
            test_case,
            tags: tags.into_iter().collect(),
            suite,
            project,
        }
    }
}

fn split_suite(suite: Option<SuiteRow>) -> (Option<String>, Option<String>) {
    match suite {
        Some(s) => (s.name, s.project.and_then(|p| p.name)),
        None => (None, None),
    }
}
