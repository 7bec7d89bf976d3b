//! Lexicographic "better-than" comparison of two tools.
//!
//! Lower values win. A formula is compared only when both tools finished
//! with `ok`; the properties are tried in order and a formula stays in play
//! for the next property only while the two values are exactly equal.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::status::ExitStatus;
use crate::table::{ColumnKey, ResultTable};

/// Which columns a comparison result carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Restrict {
    /// every column of the table
    Full,
    /// the compared properties for every tool
    Properties,
    /// every statistic for the two compared tools
    Tools,
    /// the compared properties for the two compared tools
    #[default]
    PropertiesAndTools,
}

impl Restrict {
    /// `restrict_cols` keeps only the compared properties,
    /// `restrict_tools` only the two compared tools.
    pub fn from_flags(restrict_cols: bool, restrict_tools: bool) -> Self {
        match (restrict_cols, restrict_tools) {
            (true, true) => Restrict::PropertiesAndTools,
            (true, false) => Restrict::Properties,
            (false, true) => Restrict::Tools,
            (false, false) => Restrict::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompareOptions {
    /// Formulas where the first tool succeeds and the second does not count
    /// as wins regardless of the properties.
    pub include_fails: bool,
    /// Swap the two tools.
    pub reverse: bool,
    pub restrict: Restrict,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { include_fails: true, reverse: false, restrict: Restrict::default() }
    }
}

/// Rows of the table together with the columns to show for them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// formula ids, in the order they qualified
    pub rows: Vec<usize>,
    pub columns: Vec<ColumnKey>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.rows.contains(&id)
    }

    /// Cell values, one inner vector per selected row.
    pub fn values(&self, table: &ResultTable) -> Vec<Vec<Option<f64>>> {
        self.rows
            .iter()
            .map(|&id| self.columns.iter().map(|k| table.value(&k.stat, &k.tool, id)).collect())
            .collect()
    }
}

fn is_ok(table: &ResultTable, tool: &str, id: usize) -> bool {
    table.status(tool, id).is_some_and(ExitStatus::is_ok)
}

fn check_properties<S: AsRef<str>>(table: &ResultTable, props: &[S]) -> Result<()> {
    if props.is_empty() {
        return Err(Error::invalid("no properties to compare"));
    }
    for p in props {
        if !table.has_stat(p.as_ref()) {
            return Err(Error::invalid(format!("unknown statistic column `{}`", p.as_ref())));
        }
    }
    Ok(())
}

/// Ids of the formulas on which `t1` beats `t2`.
pub fn better_rows<S: AsRef<str>>(
    table: &ResultTable,
    t1: &str,
    t2: &str,
    props: &[S],
    include_fails: bool,
) -> Result<Vec<usize>> {
    check_properties(table, props)?;
    let n = table.formula_count();
    let mut rows = Vec::new();

    if include_fails {
        rows.extend((0..n).filter(|&id| is_ok(table, t1, id) && !is_ok(table, t2, id)));
    }

    let mut tied: Vec<bool> =
        (0..n).map(|id| is_ok(table, t1, id) && is_ok(table, t2, id)).collect();
    for prop in props {
        let prop = prop.as_ref();
        for (id, still) in tied.iter_mut().enumerate().filter(|(_, t)| **t) {
            match (table.value(prop, t1, id), table.value(prop, t2, id)) {
                (Some(a), Some(b)) if a < b => {
                    rows.push(id);
                    *still = false;
                }
                (Some(a), Some(b)) if a == b => {}
                _ => *still = false,
            }
        }
    }
    Ok(rows)
}

/// Columns shown for a comparison of `t1` and `t2` under `restrict`.
pub fn selected_columns<S: AsRef<str>>(
    table: &ResultTable,
    t1: &str,
    t2: &str,
    props: &[S],
    restrict: Restrict,
) -> Vec<ColumnKey> {
    let keep_stat = |k: &ColumnKey| props.iter().any(|p| p.as_ref() == k.stat);
    let keep_tool = |k: &ColumnKey| k.tool == t1 || k.tool == t2;
    let mut cols: Vec<ColumnKey> = table
        .columns()
        .filter(|k| match restrict {
            Restrict::Full => true,
            Restrict::Properties => keep_stat(k),
            Restrict::Tools => keep_tool(k),
            Restrict::PropertiesAndTools => keep_stat(k) && keep_tool(k),
        })
        .cloned()
        .collect();
    if restrict != Restrict::Full {
        // 比較した性質の順、同じ性質の中では t1, t2 の順に並べる
        let tool_rank = |k: &ColumnKey| {
            if k.tool == t1 {
                0
            } else if k.tool == t2 {
                1
            } else {
                2
            }
        };
        cols.sort_by_key(|k| {
            let stat_rank =
                props.iter().position(|p| p.as_ref() == k.stat).unwrap_or(props.len());
            (stat_rank, k.stat.clone(), tool_rank(k))
        });
    }
    cols
}

pub fn better_than<S: AsRef<str>>(
    table: &ResultTable,
    t1: &str,
    t2: &str,
    props: &[S],
    opts: &CompareOptions,
) -> Result<Selection> {
    let (t1, t2) = if opts.reverse { (t2, t1) } else { (t1, t2) };
    let rows = better_rows(table, t1, t2, props, opts.include_fails)?;
    let columns = selected_columns(table, t1, t2, props, opts.restrict);
    Ok(Selection { rows, columns })
}

/// Square win-count matrix over a tool set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CrossMatrix {
    pub tools: Vec<String>,
    /// `counts[r][c]`: formulas on which `tools[r]` beats `tools[c]`
    pub counts: Vec<Vec<usize>>,
}

impl CrossMatrix {
    pub fn get(&self, better: &str, worse: &str) -> Option<usize> {
        let r = self.tools.iter().position(|t| t == better)?;
        let c = self.tools.iter().position(|t| t == worse)?;
        Some(self.counts[r][c])
    }
}

pub fn cross_compare<S: AsRef<str>>(
    table: &ResultTable,
    tools: &[String],
    props: &[S],
    include_fails: bool,
) -> Result<CrossMatrix> {
    let mut counts = vec![vec![0; tools.len()]; tools.len()];
    for (r, row_tool) in tools.iter().enumerate() {
        for (c, col_tool) in tools.iter().enumerate() {
            if r == c {
                continue;
            }
            counts[r][c] = better_rows(table, row_tool, col_tool, props, include_fails)?.len();
        }
    }
    Ok(CrossMatrix { tools: tools.to_vec(), counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn table(csv: &str) -> ResultTable {
        let stats = vec!["states".to_owned(), "edges".to_owned()];
        ResultTable::from_reader(csv.as_bytes(), &stats, Path::new("mem.csv")).unwrap()
    }

    const FA_GB: &str = "\
formula,tool,exit_status,states,edges
Fa,A,ok,3,5
Fa,B,ok,4,4
Gb,A,ok,5,9
Gb,B,timeout,,
";

    #[test]
    fn non_failure_beats_failure() {
        let t = table(FA_GB);
        let rows = better_rows(&t, "A", "B", &["states"], true).unwrap();
        assert_eq!(rows, vec![1, 0]);

        let rows = better_rows(&t, "A", "B", &["states"], false).unwrap();
        assert_eq!(rows, vec![0]);
        assert!(better_rows(&t, "B", "A", &["states"], true).unwrap().is_empty());
    }

    #[test]
    fn ties_fall_through_to_next_property() {
        let t = table(
            "formula,tool,exit_status,states,edges\n\
             Fa,A,ok,3,5\nFa,B,ok,3,6\n\
             Gb,A,ok,3,9\nGb,B,ok,3,9\n\
             Xc,A,ok,4,1\nXc,B,ok,3,8\n",
        );
        assert_eq!(better_rows(&t, "A", "B", &["states", "edges"], true).unwrap(), vec![0]);
        // B wins Xc on states; the better edge count of A does not matter
        assert_eq!(better_rows(&t, "B", "A", &["states", "edges"], true).unwrap(), vec![2]);
        assert_eq!(better_rows(&t, "A", "B", &["edges"], true).unwrap(), vec![0, 2]);
    }

    #[test]
    fn single_property_is_antisymmetric() {
        let t = table(
            "formula,tool,exit_status,states,edges\n\
             Fa,A,ok,3,1\nFa,B,ok,4,1\n\
             Gb,A,ok,2,1\nGb,B,ok,2,1\n\
             Xc,A,ok,7,1\nXc,B,ok,1,1\n",
        );
        let ab = better_rows(&t, "A", "B", &["states"], false).unwrap();
        let ba = better_rows(&t, "B", "A", &["states"], false).unwrap();
        assert_eq!(ab, vec![0]);
        assert_eq!(ba, vec![2]);
        assert!(!ab.contains(&1) && !ba.contains(&1));
    }

    #[test]
    fn absent_values_are_not_comparable() {
        let t = table("formula,tool,exit_status,states,edges\nFa,A,ok,,1\nFa,B,ok,2,1\n");
        assert!(better_rows(&t, "A", "B", &["states"], true).unwrap().is_empty());
        assert!(better_rows(&t, "B", "A", &["states"], true).unwrap().is_empty());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let t = table(FA_GB);
        let err = better_rows(&t, "A", "B", &["acc"], true).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("acc")));
    }

    #[test]
    fn restrict_controls_columns() {
        let t = table(FA_GB);
        let sel = better_than(&t, "A", "B", &["states"], &CompareOptions::default()).unwrap();
        assert_eq!(sel.columns, vec![ColumnKey::new("states", "A"), ColumnKey::new("states", "B")]);
        assert_eq!(sel.values(&t), vec![vec![Some(5.0), None], vec![Some(3.0), Some(4.0)]]);

        let full =
            CompareOptions { restrict: Restrict::from_flags(false, false), ..Default::default() };
        assert_eq!(full.restrict, Restrict::Full);
        assert_eq!(better_than(&t, "A", "B", &["states"], &full).unwrap().columns.len(), 4);
        assert_eq!(Restrict::from_flags(true, true), Restrict::PropertiesAndTools);
        assert_eq!(Restrict::from_flags(true, false), Restrict::Properties);
        assert_eq!(Restrict::from_flags(false, true), Restrict::Tools);

        let rev = CompareOptions { reverse: true, ..Default::default() };
        let sel = better_than(&t, "B", "A", &["states"], &rev).unwrap();
        assert_eq!(sel.rows, vec![1, 0]);
        assert_eq!(sel.columns[0], ColumnKey::new("states", "A"));
    }

    #[test]
    fn cross_matrix_has_zero_diagonal_and_bounded_pairs() {
        let t = table(
            "formula,tool,exit_status,states,edges\n\
             Fa,A,ok,3,1\nFa,B,ok,4,1\nFa,C,ok,3,1\n\
             Gb,A,ok,2,1\nGb,B,ok,2,1\nGb,C,signal,,\n\
             Xc,A,ok,7,1\nXc,B,ok,1,1\nXc,C,ok,1,1\n",
        );
        let tools: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let m = cross_compare(&t, &tools, &["states"], false).unwrap();
        for i in 0..3 {
            assert_eq!(m.counts[i][i], 0);
        }
        for a in &tools {
            for b in &tools {
                if a == b {
                    continue;
                }
                let both_ok = (0..t.formula_count())
                    .filter(|&id| is_ok(&t, a, id) && is_ok(&t, b, id))
                    .count();
                assert!(m.get(a, b).unwrap() + m.get(b, a).unwrap() <= both_ok);
            }
        }
        assert_eq!(m.get("A", "B"), Some(1));
        assert_eq!(m.get("B", "A"), Some(1));

        let with_fails = cross_compare(&t, &tools, &["states"], true).unwrap();
        assert_eq!(with_fails.get("A", "C"), Some(1));
        assert_eq!(with_fails.get("B", "C"), Some(1));
        assert_eq!(with_fails.get("C", "B"), Some(1));
    }
}
