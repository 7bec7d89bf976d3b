//! Wide, typed view of an ltlcross results CSV.
//!
//! ltlcross writes one row per (formula, tool). [`ResultTable`] pivots those
//! rows so that every formula becomes one row keyed by `(id, text)` and every
//! statistic becomes one column per tool. Columns are stored column-major as
//! `Vec<Option<T>>` indexed by formula id; `None` means the CSV had no value.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::formula::normalize;
use crate::io::open_reader;
use crate::status::ExitStatus;

pub const FORMULA_COLUMN: &str = "formula";
pub const TOOL_COLUMN: &str = "tool";
pub const EXIT_STATUS_COLUMN: &str = "exit_status";
pub const INCORRECT_COLUMN: &str = "incorrect";
pub const AUTOMATON_COLUMN: &str = "automaton";

/// One column of the table, indexed by formula id.
pub type Column<T> = Vec<Option<T>>;

/// Column key, ordered first by statistic then by tool.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnKey {
    pub stat: String,
    pub tool: String,
}

impl ColumnKey {
    pub fn new(stat: impl Into<String>, tool: impl Into<String>) -> Self {
        Self { stat: stat.into(), tool: tool.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    formulas: Vec<String>,
    stats: Vec<String>,
    tools: Vec<String>,
    values: BTreeMap<ColumnKey, Column<f64>>,
    exit_status: BTreeMap<String, Column<ExitStatus>>,
    incorrect: BTreeMap<String, Column<bool>>,
    automata: BTreeMap<String, Column<String>>,
}

/// `True`/`False` as pandas writes them, plus the usual lowercase and 0/1.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" => Some(true),
        "False" | "false" | "FALSE" | "0" | "" => Some(false),
        _ => None,
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

struct LongRow {
    id: usize,
    tool: String,
    status: ExitStatus,
    incorrect: bool,
    automaton: Option<String>,
    values: Vec<Option<f64>>,
}

pub(crate) fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

impl ResultTable {
    /// Parses the results file at `path`, tracking the statistic columns in
    /// `stats`.
    pub fn from_path(path: &Path, stats: &[String]) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ResultsNotFound(path.to_path_buf()));
        }
        let reader = open_reader(path)?;
        Self::from_reader(reader, stats, path)
    }

    /// Parses CSV text from `reader`; `origin` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, stats: &[String], origin: &Path) -> Result<Self> {
        let format_err = |row: usize, message: String| Error::ResultsFormat {
            path: origin.to_path_buf(),
            row,
            message,
        };

        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let required = |name: &str| {
            find_column(&headers, name)
                .ok_or_else(|| format_err(0, format!("missing column `{name}`")))
        };
        let formula_idx = required(FORMULA_COLUMN)?;
        let tool_idx = required(TOOL_COLUMN)?;
        let status_idx = required(EXIT_STATUS_COLUMN)?;
        let stat_idx = stats.iter().map(|s| required(s)).collect::<Result<Vec<_>>>()?;
        let incorrect_idx = find_column(&headers, INCORRECT_COLUMN);
        let automaton_idx = find_column(&headers, AUTOMATON_COLUMN);

        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut formulas: Vec<String> = Vec::new();
        let mut tools: BTreeSet<String> = BTreeSet::new();
        let mut rows: Vec<LongRow> = Vec::new();

        for (idx, record) in rdr.records().enumerate() {
            let row_no = idx + 1;
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default();

            let text = normalize(field(formula_idx));
            let id = *ids.entry(text.clone()).or_insert_with(|| {
                formulas.push(text);
                formulas.len() - 1
            });
            let tool = field(tool_idx).to_owned();
            let status: ExitStatus =
                field(status_idx).parse().map_err(|e| format_err(row_no, format!("{e}")))?;
            let incorrect = match incorrect_idx {
                Some(i) => parse_bool(field(i)).ok_or_else(|| {
                    format_err(row_no, format!("bad incorrect flag `{}`", field(i)))
                })?,
                None => false,
            };
            let automaton = automaton_idx.map(field).filter(|a| !a.is_empty()).map(str::to_owned);
            let mut values = Vec::with_capacity(stats.len());
            for (stat, &i) in stats.iter().zip(&stat_idx) {
                let raw = field(i).trim();
                if raw.is_empty() {
                    values.push(None);
                    continue;
                }
                let v: f64 = raw
                    .parse()
                    .map_err(|_| format_err(row_no, format!("`{stat}` is not numeric: {raw}")))?;
                values.push((!v.is_nan()).then_some(v));
            }
            tools.insert(tool.clone());
            rows.push(LongRow { id, tool, status, incorrect, automaton, values });
        }

        let n = formulas.len();
        let mut table = ResultTable {
            formulas,
            stats: stats.to_vec(),
            tools: tools.into_iter().collect(),
            values: BTreeMap::new(),
            exit_status: BTreeMap::new(),
            incorrect: BTreeMap::new(),
            automata: BTreeMap::new(),
        };
        for (idx, row) in rows.into_iter().enumerate() {
            let statuses =
                table.exit_status.entry(row.tool.clone()).or_insert_with(|| vec![None; n]);
            if statuses[row.id].is_some() {
                return Err(format_err(
                    idx + 1,
                    format!("duplicate result for tool `{}` on formula {}", row.tool, row.id),
                ));
            }
            statuses[row.id] = Some(row.status);
            table.incorrect.entry(row.tool.clone()).or_insert_with(|| vec![None; n])[row.id] =
                Some(row.incorrect);
            table.automata.entry(row.tool.clone()).or_insert_with(|| vec![None; n])[row.id] =
                row.automaton;
            for (stat, v) in stats.iter().zip(row.values) {
                let key = ColumnKey::new(stat.as_str(), row.tool.as_str());
                table.values.entry(key).or_insert_with(|| vec![None; n])[row.id] = v;
            }
        }
        log::debug!(
            "parsed {} formulas x {} tools from {}",
            table.formulas.len(),
            table.tools.len(),
            origin.display()
        );
        Ok(table)
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    pub fn formulas(&self) -> &[String] {
        &self.formulas
    }

    pub fn formula(&self, id: usize) -> Option<&str> {
        self.formulas.get(id).map(String::as_str)
    }

    /// Id of an already canonical formula text.
    pub fn id_of(&self, text: &str) -> Option<usize> {
        self.formulas.iter().position(|f| f == text)
    }

    /// Statistic columns tracked by this table.
    pub fn stats(&self) -> &[String] {
        &self.stats
    }

    pub fn has_stat(&self, stat: &str) -> bool {
        self.stats.iter().any(|s| s == stat)
    }

    /// Tools that appear in the results file (sorted).
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnKey> {
        self.values.keys()
    }

    pub fn column(&self, stat: &str, tool: &str) -> Option<&Column<f64>> {
        self.values.get(&ColumnKey::new(stat, tool))
    }

    pub fn has_column(&self, tool: &str) -> bool {
        self.values.keys().any(|k| k.tool == tool)
    }

    pub fn value(&self, stat: &str, tool: &str, id: usize) -> Option<f64> {
        self.column(stat, tool).and_then(|c| c.get(id).copied().flatten())
    }

    pub fn status(&self, tool: &str, id: usize) -> Option<ExitStatus> {
        self.exit_status.get(tool).and_then(|c| c.get(id).copied().flatten())
    }

    pub fn status_column(&self, tool: &str) -> Option<&Column<ExitStatus>> {
        self.exit_status.get(tool)
    }

    pub fn is_incorrect(&self, tool: &str, id: usize) -> bool {
        self.incorrect.get(tool).and_then(|c| c.get(id).copied().flatten()).unwrap_or(false)
    }

    pub fn automaton(&self, id: usize, tool: &str) -> Option<&str> {
        self.automata.get(tool).and_then(|c| c.get(id)).and_then(|a| a.as_deref())
    }

    /// Inserts or replaces a statistic column.
    pub(crate) fn set_column(&mut self, key: ColumnKey, column: Column<f64>) {
        debug_assert_eq!(column.len(), self.formulas.len());
        self.values.insert(key, column);
    }

    pub(crate) fn set_status_column(&mut self, tool: &str, column: Column<ExitStatus>) {
        self.exit_status.insert(tool.to_owned(), column);
    }

    /// Whether the results file has a row for `tool` on formula `id`.
    pub fn has_result(&self, id: usize, tool: &str) -> bool {
        self.status(tool, id).is_some()
    }

    /// Only cells backed by a results row can be flagged.
    pub(crate) fn set_incorrect(&mut self, id: usize, tool: &str) -> Result<()> {
        let cell = self
            .incorrect
            .get_mut(tool)
            .and_then(|c| c.get_mut(id))
            .filter(|cell| cell.is_some())
            .ok_or_else(|| Error::invalid(format!("no result for tool `{tool}` on formula {id}")))?;
        *cell = Some(true);
        Ok(())
    }

    /// Drops every statistic of cells flagged incorrect and relabels their
    /// exit status as `incorrect`.
    pub(crate) fn na_incorrect(&mut self) {
        for (tool, flags) in &self.incorrect {
            for (id, _) in flags.iter().enumerate().filter(|(_, f)| **f == Some(true)) {
                for stat in &self.stats {
                    let key = ColumnKey::new(stat.as_str(), tool.as_str());
                    if let Some(col) = self.values.get_mut(&key) {
                        col[id] = None;
                    }
                }
                if let Some(col) = self.exit_status.get_mut(tool) {
                    col[id] = Some(ExitStatus::Incorrect);
                }
            }
        }
    }
}
