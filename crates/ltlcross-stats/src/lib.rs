//! ltlcross の結果 (CSV) と診断ログを解析し、翻訳器同士を比較するライブラリ
//!
//! ```no_run
//! use ltlcross_stats::{CompareOptions, Session, Tool};
//!
//! let mut session = Session::new(vec![
//!     Tool::new("Spot", "ltl2tgba -f %f > %O"),
//!     Tool::new("LTL3BA", "ltl3ba -f %s > %O"),
//! ])
//! .with_res_file("na_comp.csv");
//! session.parse_results()?;
//! let wins = session.better_than("Spot", "LTL3BA", &["states"], &CompareOptions::default())?;
//! println!("{} formulas", wins.len());
//! # Ok::<(), ltlcross_stats::Error>(())
//! ```

pub mod check_log;
pub mod compare;
pub mod config;
pub mod error;
pub mod formula;
pub mod io;
pub mod runner;
pub mod session;
pub mod status;
pub mod table;

pub use check_log::{CheckLog, LogParser, parse_check_log};
pub use compare::{CompareOptions, CrossMatrix, Restrict, Selection};
pub use config::{SessionConfig, Tool};
pub use error::{Error, Result};
pub use formula::{Formula, normalize};
pub use runner::RunOptions;
pub use session::Session;
pub use status::{ErrorKind, ExitStatus};
pub use table::{ColumnKey, ResultTable};
