//! Session configuration file (TOML).
//!
//! ```toml
//! res_file = "na_comp.csv"
//! formula_files = ["formulae/classic.ltl"]
//! cols = ["states", "edges", "transitions"]
//!
//! [[tool]]
//! name = "Spot"
//! command = "ltl2tgba -f %f > %O"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_FORMULA_FILE: &str = "formulae/classic.ltl";
pub const DEFAULT_COLS: [&str; 3] = ["states", "edges", "transitions"];

/// A translator as ltlcross sees it: a display name and a command template
/// using ltlcross's `%f`/`%s`/`%O` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tool {
    pub name: String,
    pub command: String,
}

impl Tool {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self { name: name.into(), command: command.into() }
    }
}

fn default_formula_files() -> Vec<PathBuf> {
    vec![PathBuf::from(DEFAULT_FORMULA_FILE)]
}

fn default_cols() -> Vec<String> {
    DEFAULT_COLS.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// 省略時: ツール名を `_` で連結した `<names>.csv`
    #[serde(default)]
    pub res_file: Option<PathBuf>,
    /// 省略時: res_file の拡張子を `log` にしたもの
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_formula_files")]
    pub formula_files: Vec<PathBuf>,
    #[serde(default = "default_cols")]
    pub cols: Vec<String>,
    #[serde(rename = "tool", default)]
    pub tools: Vec<Tool>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, path)
    }

    /// `origin` is only used in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let config_err =
            |message: String| Error::Config { path: origin.to_path_buf(), message };
        let cfg: SessionConfig = toml::from_str(text).map_err(|e| config_err(e.to_string()))?;
        if cfg.tools.is_empty() {
            return Err(config_err("no [[tool]] entries".to_owned()));
        }
        let mut seen = HashSet::new();
        for tool in &cfg.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(config_err(format!("duplicate tool name `{}`", tool.name)));
            }
        }
        if cfg.cols.is_empty() {
            return Err(config_err("`cols` must name at least one statistic".to_owned()));
        }
        Ok(cfg)
    }
}
