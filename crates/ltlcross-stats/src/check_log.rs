//! ltlcross の診断ログ解析
//!
//! The log starts with a header block in which every translator is echoed as
//! `[P<N>]: <command>`; the header ends at the first blank line. After that
//! each formula gets a block introduced by `<prefix>ltl:<N>: <formula>` and
//! closed by a blank line. Failed cross-checks show up inside a block as
//! `error: ... nonempty`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::io::open_reader;

static FORMULA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ltl:(\d+): (.*)$").expect("invalid FORMULA_RE pattern"));
static PROBLEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^error: .* nonempty").expect("invalid PROBLEM_RE pattern"));
static TOOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\[(P\d+)\]: (.*)$").expect("invalid TOOL_RE pattern"));

/// Everything extracted from one ltlcross log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckLog {
    /// formula id (0-based) -> captured `error: ... nonempty` messages
    pub bugs: BTreeMap<usize, Vec<String>>,
    /// formula id -> formula text as printed in the log, for every id in `bugs`
    pub bogus_formulas: BTreeMap<usize, String>,
    /// `P<N>` -> command line
    pub tools: BTreeMap<String, String>,
}

#[derive(Debug)]
struct FormulaBlock {
    id: Option<usize>,
    formula: String,
    messages: Vec<String>,
}

#[derive(Debug)]
enum State {
    SeekingToolHeader,
    SeekingFormulaHeader,
    InFormulaBlock(FormulaBlock),
}

/// Line-driven parser. Feed lines with [`LogParser::feed`], then call
/// [`LogParser::finish`].
#[derive(Debug)]
pub struct LogParser {
    state: State,
    /// The tool registry is read until the first blank line only, even when
    /// a formula block opens before it.
    header_open: bool,
    out: CheckLog,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser {
    pub fn new() -> Self {
        Self { state: State::SeekingToolHeader, header_open: true, out: CheckLog::default() }
    }

    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            self.header_open = false;
            if let State::InFormulaBlock(block) =
                std::mem::replace(&mut self.state, State::SeekingFormulaHeader)
            {
                self.close_block(block);
            }
            return;
        }

        if self.header_open {
            if let Some(caps) = TOOL_RE.captures(line) {
                self.out.tools.insert(caps[1].to_owned(), caps[2].to_owned());
            }
        }

        if let Some(caps) = FORMULA_RE.captures(line) {
            let n: Option<usize> = caps[1].parse().ok();
            let id = n.and_then(|n| n.checked_sub(1));
            if id.is_none() {
                log::warn!("ignoring formula header without a 1-based index: {line}");
            }
            self.state = State::InFormulaBlock(FormulaBlock {
                id,
                formula: caps[2].to_owned(),
                messages: Vec::new(),
            });
            return;
        }

        if let State::InFormulaBlock(block) = &mut self.state {
            if let Some(m) = PROBLEM_RE.find(line) {
                block.messages.push(m.as_str().to_owned());
            }
        }
    }

    fn close_block(&mut self, block: FormulaBlock) {
        let Some(id) = block.id else { return };
        if block.messages.is_empty() {
            return;
        }
        log::debug!("formula {id}: {} cross-check errors", block.messages.len());
        self.out.bugs.insert(id, block.messages);
        self.out.bogus_formulas.insert(id, block.formula);
    }

    /// Ends the log. A block still open at end of input has no closing blank
    /// line and therefore yields no entry.
    pub fn finish(self) -> CheckLog {
        self.out
    }
}

/// Parses log text already in memory.
pub fn parse_check_log_str(text: &str) -> CheckLog {
    let mut parser = LogParser::new();
    for line in text.lines() {
        parser.feed(line);
    }
    parser.finish()
}

/// Reads and parses the log at `path`.
pub fn parse_check_log(path: &Path) -> Result<CheckLog> {
    let reader = open_reader(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::LogNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut parser = LogParser::new();
    for line in reader.lines() {
        parser.feed(&line?);
    }
    Ok(parser.finish())
}
