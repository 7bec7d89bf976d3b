//! The analysis session: tool registry, file locations and parsed results.
//!
//! Every query goes through [`Session`]; there is no ambient "current run".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::check_log::{self, CheckLog};
use crate::compare::{self, CompareOptions, CrossMatrix, Restrict, Selection};
use crate::config::{self, SessionConfig, Tool};
use crate::error::{Error, Result};
use crate::formula::normalize;
use crate::io::{open_reader, write_file};
use crate::status::{ErrorKind, ExitStatus};
use crate::table::{
    self, ColumnKey, FORMULA_COLUMN, INCORRECT_COLUMN, ResultTable, TOOL_COLUMN, find_column,
};

#[derive(Debug)]
pub struct Session {
    tools: Vec<Tool>,
    /// Synthetic minimum columns, in creation order (may repeat).
    mins: Vec<String>,
    formula_files: Vec<PathBuf>,
    cols: Vec<String>,
    res_file: PathBuf,
    log_file: PathBuf,
    results: Option<ResultTable>,
    returncode: Option<i32>,
}

fn default_res_file(tools: &[Tool]) -> PathBuf {
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    PathBuf::from(format!("{}.csv", names.join("_")))
}

impl Session {
    /// Session with the default formula file, statistic columns and file
    /// names derived from the tool names.
    pub fn new(tools: Vec<Tool>) -> Self {
        let res_file = default_res_file(&tools);
        Self {
            log_file: res_file.with_extension("log"),
            res_file,
            tools,
            mins: Vec::new(),
            formula_files: vec![PathBuf::from(config::DEFAULT_FORMULA_FILE)],
            cols: config::DEFAULT_COLS.iter().map(|s| s.to_string()).collect(),
            results: None,
            returncode: None,
        }
    }

    pub fn from_config(cfg: SessionConfig) -> Self {
        let mut session = Session::new(cfg.tools)
            .with_formula_files(cfg.formula_files)
            .with_cols(cfg.cols);
        if let Some(res) = cfg.res_file {
            session = session.with_res_file(res);
        }
        if let Some(log) = cfg.log_file {
            session.log_file = log;
        }
        session
    }

    /// Also moves the log file next to the new results file.
    pub fn with_res_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.res_file = path.into();
        self.log_file = self.res_file.with_extension("log");
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    pub fn with_formula_files(mut self, files: Vec<PathBuf>) -> Self {
        self.formula_files = files;
        self
    }

    pub fn with_cols(mut self, cols: Vec<String>) -> Self {
        self.cols = cols;
        self
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn mins(&self) -> &[String] {
        &self.mins
    }

    pub fn formula_files(&self) -> &[PathBuf] {
        &self.formula_files
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn res_file(&self) -> &Path {
        &self.res_file
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Exit code of the last ltlcross run, if any.
    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    pub(crate) fn set_returncode(&mut self, code: i32) {
        self.returncode = Some(code);
    }

    pub fn results(&self) -> Option<&ResultTable> {
        self.results.as_ref()
    }

    fn table(&self) -> Result<&ResultTable> {
        self.results.as_ref().ok_or(Error::NoResults)
    }

    fn is_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    fn check_tool(&self, name: &str) -> Result<()> {
        if self.is_tool(name) {
            Ok(())
        } else {
            Err(Error::invalid(format!("unknown tool `{name}`")))
        }
    }

    fn check_tool_or_min(&self, name: &str) -> Result<()> {
        if self.is_tool(name) || self.mins.iter().any(|m| m == name) {
            Ok(())
        } else {
            Err(Error::invalid(format!("unknown tool `{name}`")))
        }
    }

    /// Parses the session's results file.
    pub fn parse_results(&mut self) -> Result<()> {
        let path = self.res_file.clone();
        self.parse_results_from(&path)
    }

    /// Parses `path` instead of the session's results file. Previously
    /// computed minimum columns are discarded with the old table.
    pub fn parse_results_from(&mut self, path: &Path) -> Result<()> {
        let table = ResultTable::from_path(path, &self.cols)?;
        log::info!(
            "loaded {} formulas for {} tools from {}",
            table.formula_count(),
            table.tools().len(),
            path.display()
        );
        self.results = Some(table);
        self.mins.clear();
        Ok(())
    }

    /// Parses the session's ltlcross log.
    pub fn parse_check_log(&self) -> Result<CheckLog> {
        check_log::parse_check_log(&self.log_file)
    }

    /// Adds, for every statistic, a column `colname` holding the minimum over
    /// `tools` (all registered tools when `None`). `colname` must not name a
    /// real tool.
    pub fn compute_best(&mut self, tools: Option<&[String]>, colname: &str) -> Result<()> {
        let tools: Vec<String> = match tools {
            Some(t) => t.to_vec(),
            None => self.tool_names(),
        };
        for t in &tools {
            self.check_tool_or_min(t)?;
        }
        let is_min = self.mins.iter().any(|m| m == colname);
        let table = self.results.as_mut().ok_or(Error::NoResults)?;
        let is_tool = self.tools.iter().any(|t| t.name == colname);
        if is_tool || (!is_min && table.has_column(colname)) {
            return Err(Error::invalid(format!("`{colname}` is a tool name")));
        }
        let n = table.formula_count();
        let stats = table.stats().to_vec();
        for stat in &stats {
            let column = (0..n)
                .map(|id| tools.iter().filter_map(|t| table.value(stat, t, id)).reduce(f64::min))
                .collect();
            table.set_column(ColumnKey::new(stat.as_str(), colname), column);
        }
        let status = match stats.first() {
            Some(first) => (0..n)
                .map(|id| table.value(first, colname, id).map(|_| ExitStatus::Ok))
                .collect(),
            None => vec![None; n],
        };
        table.set_status_column(colname, status);
        self.mins.push(colname.to_owned());
        Ok(())
    }

    /// Raw automaton text that `tool` produced for formula `form_id`.
    pub fn aut_for_id(&self, form_id: usize, tool: &str) -> Result<Option<&str>> {
        let table = self.table()?;
        self.check_tool(tool)?;
        if form_id >= table.formula_count() {
            return Err(Error::invalid(format!("unknown formula id {form_id}")));
        }
        Ok(table.automaton(form_id, tool))
    }

    /// Per-column sums of statistic `col` over the formulas on which every
    /// column of that statistic has a value.
    pub fn cummulative(&self, col: &str) -> Result<BTreeMap<String, f64>> {
        let table = self.table()?;
        if !table.has_stat(col) {
            return Err(Error::invalid(format!("unknown statistic column `{col}`")));
        }
        let keys: Vec<&ColumnKey> = table.columns().filter(|k| k.stat == col).collect();
        let mut sums: BTreeMap<String, f64> = keys.iter().map(|k| (k.tool.clone(), 0.0)).collect();
        for id in 0..table.formula_count() {
            let row: Option<Vec<f64>> =
                keys.iter().map(|k| table.value(col, &k.tool, id)).collect();
            let Some(row) = row else { continue };
            for (k, v) in keys.iter().zip(row) {
                *sums.entry(k.tool.clone()).or_default() += v;
            }
        }
        Ok(sums)
    }

    /// Formulas where `t1` has a strictly smaller `col` than `t2`; failures
    /// of `t2` do not count.
    pub fn smaller_than(
        &self,
        t1: &str,
        t2: &str,
        col: &str,
        reverse: bool,
        restrict: Restrict,
    ) -> Result<Selection> {
        let opts = CompareOptions { include_fails: false, reverse, restrict };
        self.better_than(t1, t2, &[col], &opts)
    }

    /// Formulas on which `t1` beats `t2` lexicographically on `props`.
    pub fn better_than<S: AsRef<str>>(
        &self,
        t1: &str,
        t2: &str,
        props: &[S],
        opts: &CompareOptions,
    ) -> Result<Selection> {
        self.check_tool_or_min(t1)?;
        self.check_tool_or_min(t2)?;
        compare::better_than(self.table()?, t1, t2, props, opts)
    }

    /// Win counts for every ordered pair of `tools` (all registered tools
    /// when `None`).
    pub fn cross_compare<S: AsRef<str>>(
        &self,
        tools: Option<&[String]>,
        props: &[S],
        include_fails: bool,
    ) -> Result<CrossMatrix> {
        let tools: Vec<String> = match tools {
            Some(t) => t.to_vec(),
            None => self.tool_names(),
        };
        for t in &tools {
            self.check_tool_or_min(t)?;
        }
        compare::cross_compare(self.table()?, &tools, props, include_fails)
    }

    pub fn formula_count(&self) -> Result<usize> {
        Ok(self.table()?.formula_count())
    }

    pub fn form_of_id(&self, form_id: usize) -> Result<&str> {
        self.table()?
            .formula(form_id)
            .ok_or_else(|| Error::invalid(format!("unknown formula id {form_id}")))
    }

    /// Id of `formula`, matched after canonicalization.
    pub fn id_of_form(&self, formula: &str) -> Result<usize> {
        let canonical = normalize(formula);
        self.table()?
            .id_of(&canonical)
            .ok_or_else(|| Error::invalid(format!("unknown formula `{canonical}`")))
    }

    /// Row key `(id, formula)`.
    pub fn index(&self, form_id: usize) -> Result<(usize, &str)> {
        Ok((form_id, self.form_of_id(form_id)?))
    }

    /// Marks the automaton of `tool` for `form_id` as incorrect, in memory
    /// and in the session's results file.
    pub fn mark_incorrect(&mut self, form_id: usize, tool: &str) -> Result<()> {
        let path = self.res_file.clone();
        self.mark_incorrect_in(form_id, tool, &path, &path)
    }

    /// Like [`Session::mark_incorrect`], reading the CSV from `input` and
    /// writing the updated CSV to `output`.
    pub fn mark_incorrect_in(
        &mut self,
        form_id: usize,
        tool: &str,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        self.check_tool(tool)?;
        let target = self.form_of_id(form_id)?.to_owned();
        if !self.table()?.has_result(form_id, tool) {
            let message = format!("no result for tool `{tool}` on formula {form_id}");
            return Err(Error::invalid(message));
        }

        let (headers, records) = {
            let reader = open_reader(input).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ResultsNotFound(input.to_path_buf()),
                _ => Error::Io(e),
            })?;
            let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
            let mut headers = rdr.headers()?.clone();
            let missing = |name: &str| Error::ResultsFormat {
                path: input.to_path_buf(),
                row: 0,
                message: format!("missing column `{name}`"),
            };
            let formula_idx =
                find_column(&headers, FORMULA_COLUMN).ok_or_else(|| missing(FORMULA_COLUMN))?;
            let tool_idx =
                find_column(&headers, TOOL_COLUMN).ok_or_else(|| missing(TOOL_COLUMN))?;
            let (incorrect_idx, added) = match find_column(&headers, INCORRECT_COLUMN) {
                Some(i) => (i, false),
                None => {
                    headers.push_field(INCORRECT_COLUMN);
                    (headers.len() - 1, true)
                }
            };

            let mut records: Vec<Vec<String>> = Vec::new();
            let mut matched = 0usize;
            for record in rdr.records() {
                let mut fields: Vec<String> = record?.iter().map(str::to_owned).collect();
                fields.resize(headers.len(), String::new());
                if added {
                    fields[incorrect_idx] = table::format_bool(false).to_owned();
                }
                if fields[tool_idx] == tool && normalize(&fields[formula_idx]) == target {
                    fields[incorrect_idx] = table::format_bool(true).to_owned();
                    matched += 1;
                }
                records.push(fields);
            }
            if matched == 0 {
                log::warn!("no row of {} matches `{target}` / {tool}", input.display());
            }
            (headers, records)
        };

        let mut w = csv::Writer::from_writer(Vec::new());
        w.write_record(&headers)?;
        for r in &records {
            w.write_record(r)?;
        }
        let bytes = w.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        write_file(output, &bytes)?;

        self.results.as_mut().ok_or(Error::NoResults)?.set_incorrect(form_id, tool)
    }

    /// Forgets the statistics of every cell marked incorrect and sets its
    /// exit status to `incorrect`. Re-parse the results to undo.
    pub fn na_incorrect(&mut self) -> Result<()> {
        self.results.as_mut().ok_or(Error::NoResults)?.na_incorrect();
        Ok(())
    }

    /// Per tool, the number of formulas whose exit status falls under `kind`.
    pub fn error_count(&self, kind: ErrorKind) -> Result<BTreeMap<String, usize>> {
        let table = self.table()?;
        Ok(table
            .tools()
            .iter()
            .map(|tool| {
                let count = table
                    .status_column(tool)
                    .map_or(0, |c| c.iter().flatten().filter(|st| kind.matches(**st)).count());
                (tool.clone(), count)
            })
            .collect())
    }

    /// [`Session::error_count`] taking the kind by name (`timeout`,
    /// `parse error`, `incorrect`, `crash`, `no output`).
    pub fn get_error_count(&self, kind: &str) -> Result<BTreeMap<String, usize>> {
        self.error_count(kind.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(csv: &str) -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let res = dir.path().join("res.csv");
        std::fs::write(&res, csv).unwrap();
        let mut s = Session::new(vec![Tool::new("A", "a %f"), Tool::new("B", "b %f")])
            .with_res_file(&res)
            .with_cols(vec!["states".to_owned(), "edges".to_owned()]);
        s.parse_results().unwrap();
        (dir, s)
    }

    const CSV: &str = "\
formula,tool,exit_status,states,edges
Fa,A,ok,3,5
Fa,B,ok,4,4
Gb,A,ok,5,9
Gb,B,timeout,,
Xc,A,signal,,
Xc,B,exit code,,
";

    #[test]
    fn default_file_names_follow_tool_names() {
        let s = Session::new(vec![Tool::new("Spot", "x"), Tool::new("LTL3BA", "y")]);
        assert_eq!(s.res_file(), Path::new("Spot_LTL3BA.csv"));
        assert_eq!(s.log_file(), Path::new("Spot_LTL3BA.log"));
        let s = s.with_res_file("out/na.csv");
        assert_eq!(s.log_file(), Path::new("out/na.log"));
    }

    #[test]
    fn queries_need_parsed_results() {
        let s = Session::new(vec![Tool::new("A", "a")]);
        assert!(matches!(s.cummulative("states"), Err(Error::NoResults)));
        assert!(matches!(s.form_of_id(0), Err(Error::NoResults)));
    }

    #[test]
    fn missing_results_file() {
        let mut s = Session::new(vec![Tool::new("A", "a")]).with_res_file("/nonexistent/r.csv");
        assert!(matches!(s.parse_results(), Err(Error::ResultsNotFound(_))));
    }

    #[test]
    fn better_than_validates_names() {
        let (_dir, s) = session_with(CSV);
        let err = s.better_than("A", "Z", &["states"], &CompareOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("Z")));
        let sel = s.better_than("A", "B", &["states"], &CompareOptions::default()).unwrap();
        assert_eq!(sel.rows, vec![1, 0]);
    }

    #[test]
    fn crash_counts_signal_and_exit_code() {
        let (_dir, s) = session_with(CSV);
        let crash = s.get_error_count("crash").unwrap();
        assert_eq!(crash["A"], 1);
        assert_eq!(crash["B"], 1);
        assert_eq!(s.get_error_count("timeout").unwrap()["B"], 1);
        assert!(matches!(s.get_error_count("oom"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn crash_sums_both_kinds_for_one_tool() {
        let (_dir, s) = session_with(
            "formula,tool,exit_status,states,edges\nFa,A,signal,,\nGb,A,exit code,,\nXc,A,ok,1,1\n",
        );
        assert_eq!(s.get_error_count("crash").unwrap()["A"], 2);
    }

    #[test]
    fn cummulative_skips_incomplete_rows() {
        let (_dir, s) = session_with(CSV);
        let sums = s.cummulative("states").unwrap();
        assert_eq!(sums["A"], 3.0);
        assert_eq!(sums["B"], 4.0);
        assert!(s.cummulative("acc").is_err());
    }

    #[test]
    fn compute_best_adds_min_columns() {
        let (_dir, mut s) = session_with(CSV);
        s.compute_best(None, "Minimum").unwrap();
        let t = s.results().unwrap();
        assert_eq!(t.value("states", "Minimum", 0), Some(3.0));
        assert_eq!(t.value("edges", "Minimum", 0), Some(4.0));
        assert_eq!(t.value("states", "Minimum", 1), Some(5.0));
        assert_eq!(t.value("states", "Minimum", 2), None);
        assert_eq!(s.mins(), ["Minimum".to_owned()]);

        // the synthetic column takes part in comparisons
        let sel = s.better_than("Minimum", "B", &["edges"], &CompareOptions::default()).unwrap();
        assert_eq!(sel.rows, vec![1]);
        assert!(s.compute_best(Some(&["Q".to_owned()][..]), "Bad").is_err());

        s.compute_best(Some(&["B".to_owned()][..]), "Minimum").unwrap();
        assert_eq!(s.mins().len(), 2);
        assert_eq!(s.results().unwrap().value("states", "Minimum", 0), Some(4.0));
        // error counts stay per real tool
        assert!(!s.get_error_count("timeout").unwrap().contains_key("Minimum"));
    }

    #[test]
    fn compute_best_refuses_to_overwrite_a_tool() {
        let (_dir, mut s) = session_with(CSV);
        let err = s.compute_best(Some(&["A".to_owned()][..]), "B").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("`B`")));
        let t = s.results().unwrap();
        assert_eq!(t.value("states", "B", 0), Some(4.0));
        assert_eq!(t.status("B", 1), Some(ExitStatus::Timeout));
        assert!(s.mins().is_empty());
    }

    #[test]
    fn ids_round_trip_through_canonical_text() {
        let (_dir, s) = session_with(CSV);
        assert_eq!(s.form_of_id(1).unwrap(), "Gb");
        assert_eq!(s.id_of_form("G (b)").unwrap(), 1);
        assert_eq!(s.index(2).unwrap(), (2, "Xc"));
        assert!(s.id_of_form("Fz").is_err());
        assert!(s.form_of_id(7).is_err());
    }

    #[test]
    fn mark_incorrect_persists_and_na_incorrect_applies() {
        let (_dir, mut s) = session_with(CSV);
        s.mark_incorrect(0, "A").unwrap();

        let written = std::fs::read_to_string(s.res_file()).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("formula,tool,exit_status,states,edges,incorrect"));
        assert_eq!(lines.next(), Some("Fa,A,ok,3,5,True"));
        assert_eq!(lines.next(), Some("Fa,B,ok,4,4,False"));

        s.na_incorrect().unwrap();
        let t = s.results().unwrap();
        assert_eq!(t.status("A", 0), Some(ExitStatus::Incorrect));
        assert_eq!(t.value("states", "A", 0), None);
        // formula 0 no longer complete, and Gb/Xc never were
        assert_eq!(s.cummulative("states").unwrap()["A"], 0.0);
        assert_eq!(s.get_error_count("incorrect").unwrap()["A"], 1);

        // a fresh parse reads the persisted flag back
        s.parse_results().unwrap();
        assert!(s.results().unwrap().is_incorrect("A", 0));
        assert_eq!(s.results().unwrap().value("states", "A", 0), Some(3.0));
    }

    #[test]
    fn mark_incorrect_needs_an_existing_row() {
        let csv = "formula,tool,exit_status,states,edges\n\
                   Fa,A,ok,3,5\nFa,B,ok,4,4\nGb,A,ok,5,9\n";
        let (_dir, mut s) = session_with(csv);
        let err = s.mark_incorrect(1, "B").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("formula 1")));
        assert_eq!(std::fs::read_to_string(s.res_file()).unwrap(), csv);

        s.na_incorrect().unwrap();
        assert_eq!(s.results().unwrap().status("B", 1), None);
        assert_eq!(s.get_error_count("incorrect").unwrap()["B"], 0);
    }

    #[test]
    fn mark_incorrect_rejects_unknown_tool() {
        let (_dir, mut s) = session_with(CSV);
        assert!(matches!(s.mark_incorrect(0, "Minimum"), Err(Error::InvalidArgument(_))));
        assert!(matches!(s.mark_incorrect(9, "A"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn aut_for_id_requires_known_tool() {
        let (_dir, s) = session_with(CSV);
        assert_eq!(s.aut_for_id(0, "A").unwrap(), None);
        assert!(s.aut_for_id(0, "C").is_err());
    }
}
