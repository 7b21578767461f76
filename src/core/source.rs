//! Data source abstraction for paging test records.
//!
//! The hosted database sits behind [`DataSource`]; the engines only ever see
//! the fully materialized collections produced by [`fetch_all_records`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::model::parse_timestamp;
use super::{Error, Result};

/// Tables the engines read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    TestRun,
    TestResult,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::TestRun => "test_run",
            Table::TestResult => "test_result",
        }
    }

    /// Column used for time-window filtering and ordering.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Table::TestRun => "started_at",
            Table::TestResult => "created_at",
        }
    }

    /// Nested shape the engines expect back.
    pub fn default_select(&self) -> &'static str {
        match self {
            Table::TestRun => "id, status, started_at, test_suite(name, project(name))",
            Table::TestResult => {
                "id, status, duration_ms, created_at, test_case(name, tags), \
                 test_run(test_suite(name, project(name)))"
            }
        }
    }
}

/// Lower-bound filter on a column (`column >= value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Select shape, filter and ordering for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: String,
    pub filter: Option<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Newest-first query over a table's timestamp column.
    pub fn newest_first(table: Table) -> Self {
        Self {
            select: table.default_select().to_string(),
            filter: None,
            order_by: Some(OrderBy {
                column: table.timestamp_column().to_string(),
                ascending: false,
            }),
        }
    }

    /// Only rows whose timestamp column is at or after `since` (RFC 3339).
    pub fn since(mut self, column: impl Into<String>, since: impl Into<String>) -> Self {
        self.filter = Some(Filter {
            column: column.into(),
            value: since.into(),
        });
        self
    }
}

/// Bounds for a paged fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page_size: usize,
    pub max_pages: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 100,
        }
    }
}

/// A paging collaborator over the hosted database (or a stand-in).
pub trait DataSource: Send + Sync {
    /// Return up to `limit` rows starting at `offset`.
    fn fetch_page(
        &self,
        table: Table,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>>;
}

/// Page through `table` until a short page arrives.
///
/// Errors if a page fails or if `pager.max_pages` full pages come back.
pub fn fetch_all_records(
    source: &dyn DataSource,
    table: Table,
    query: &Query,
    pager: &Pager,
) -> Result<Vec<Value>> {
    if pager.page_size == 0 {
        return Err(Error::InvalidArgument("page_size must be positive".to_string()));
    }

    let mut records = Vec::new();
    let mut offset = 0;
    for page in 1..=pager.max_pages {
        let rows = source.fetch_page(table, query, offset, pager.page_size)?;
        let count = rows.len();
        records.extend(rows);
        tracing::debug!(table = table.as_str(), page, count, "fetched page");

        if count < pager.page_size {
            tracing::info!(
                "Fetched {} {} records in {} pages",
                records.len(),
                table.as_str(),
                page
            );
            return Ok(records);
        }
        offset += pager.page_size;
    }

    tracing::warn!(
        table = table.as_str(),
        max_pages = pager.max_pages,
        "page budget exhausted"
    );
    Err(Error::PageBudget {
        table: table.as_str().to_string(),
        pages: pager.max_pages,
    })
}

/// Serves rows from `<dir>/test_run.json` and `<dir>/test_result.json`.
///
/// Each file holds a JSON array of rows in the nested database shape.
pub struct JsonDirSource {
    root: PathBuf,
    tables: HashMap<Table, Vec<Value>>,
}

impl JsonDirSource {
    /// Load whichever table files exist under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let mut tables = HashMap::new();
        for table in [Table::TestRun, Table::TestResult] {
            let path = root.join(format!("{}.json", table.as_str()));
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let rows: Vec<Value> = serde_json::from_str(&content)?;
            tables.insert(table, rows);
        }
        Ok(Self { root, tables })
    }

    /// Build a source from in-memory rows.
    pub fn from_rows(runs: Vec<Value>, results: Vec<Value>) -> Self {
        Self {
            root: PathBuf::new(),
            tables: HashMap::from([(Table::TestRun, runs), (Table::TestResult, results)]),
        }
    }
}

impl DataSource for JsonDirSource {
    fn fetch_page(
        &self,
        table: Table,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let rows = self.tables.get(&table).ok_or_else(|| Error::FileNotFound {
            path: self.root.join(format!("{}.json", table.as_str())),
        })?;

        let mut selected: Vec<&Value> = rows
            .iter()
            .filter(|row| match &query.filter {
                Some(filter) => passes_filter(row, filter),
                None => true,
            })
            .collect();

        if let Some(order) = &query.order_by {
            selected.sort_by(|a, b| {
                let ord = compare_column(a, b, &order.column);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

fn column_str<'v>(row: &'v Value, column: &str) -> Option<&'v str> {
    row.get(column).and_then(Value::as_str)
}

fn passes_filter(row: &Value, filter: &Filter) -> bool {
    let Some(raw) = column_str(row, &filter.column) else {
        return false;
    };
    match (parse_timestamp(raw), parse_timestamp(&filter.value)) {
        (Some(value), Some(bound)) => value >= bound,
        _ => raw >= filter.value.as_str(),
    }
}

fn compare_column(a: &Value, b: &Value, column: &str) -> Ordering {
    let a = column_str(a, column);
    let b = column_str(b, column);
    match (a.and_then(parse_timestamp), b.and_then(parse_timestamp)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(&b),
    }
}
