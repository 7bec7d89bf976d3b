//! ltlcross 実行
//!
//! Builds the ltlcross command line for a session and runs it with stdout
//! and stderr redirected into the session log.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;

use crate::error::{Error, Result};
use crate::session::Session;

pub const LOG_RULE: &str = "=====================";
const TIMESTAMP_FORMAT: &str = "[%d.%m.%Y %T]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// `--automata`: keep the produced automata in the CSV
    pub automata: bool,
    /// run ltlcross's cross-checks (otherwise `--no-checks`)
    pub check: bool,
    /// per-translation timeout in seconds
    pub timeout: Option<u64>,
    /// `--save-bogus=<res-stem>_bogus.ltl`
    pub save_bogus: bool,
    /// pass the session's formula files with `-F`
    pub forms: bool,
    /// wrap every `{name}command` argument in single quotes
    pub escape_tools: bool,
    /// ltlcross executable
    pub ltlcross: String,
    /// restrict the run to these tool names
    pub tool_subset: Option<Vec<String>>,
    pub res_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            automata: true,
            check: false,
            timeout: Some(300),
            save_bogus: true,
            forms: true,
            escape_tools: false,
            ltlcross: "ltlcross".to_owned(),
            tool_subset: None,
            res_file: None,
            log_file: None,
        }
    }
}

fn bogus_file(res_file: &Path) -> String {
    format!("{}_bogus.ltl", res_file.with_extension("").display())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return -sig;
        }
    }
    status.code().unwrap_or(-1)
}

impl Session {
    fn run_paths(&self, opts: &RunOptions) -> (PathBuf, PathBuf) {
        let res = opts.res_file.clone().unwrap_or_else(|| self.res_file().to_path_buf());
        let log = opts.log_file.clone().unwrap_or_else(|| self.log_file().to_path_buf());
        (res, log)
    }

    /// Arguments passed to ltlcross (without the executable itself).
    pub fn create_args(&self, opts: &RunOptions) -> Result<Vec<String>> {
        if let Some(subset) = &opts.tool_subset {
            for name in subset {
                if !self.tools().iter().any(|t| &t.name == name) {
                    return Err(Error::invalid(format!("unknown tool `{name}`")));
                }
            }
        }
        let (res_file, _) = self.run_paths(opts);

        let mut args: Vec<String> = self
            .tools()
            .iter()
            .filter(|t| opts.tool_subset.as_ref().is_none_or(|s| s.contains(&t.name)))
            .map(|t| {
                let arg = format!("{{{}}}{}", t.name, t.command);
                if opts.escape_tools { format!("'{arg}'") } else { arg }
            })
            .collect();
        if args.is_empty() {
            return Err(Error::invalid("no tools selected"));
        }
        if opts.forms {
            for f in self.formula_files() {
                args.push("-F".to_owned());
                args.push(f.display().to_string());
            }
        }
        if let Some(secs) = opts.timeout {
            args.push(format!("--timeout={secs}"));
        }
        if opts.automata {
            args.push("--automata".to_owned());
        }
        if opts.save_bogus {
            args.push(format!("--save-bogus={}", bogus_file(&res_file)));
        }
        if !opts.check {
            args.push("--no-checks".to_owned());
        }
        args.push("--products=0".to_owned());
        args.push(format!("--csv={}", res_file.display()));
        Ok(args)
    }

    /// Shell-printable command line; tool arguments are always quoted.
    pub fn ltlcross_cmd(&self, opts: &RunOptions) -> Result<String> {
        let quoted = RunOptions { escape_tools: true, ..opts.clone() };
        let args = self.create_args(&quoted)?;
        Ok(std::iter::once(opts.ltlcross.clone()).chain(args).collect::<Vec<_>>().join(" "))
    }

    /// Runs ltlcross with arguments built from `opts`.
    pub fn run_ltlcross(&mut self, opts: &RunOptions) -> Result<i32> {
        let args = self.create_args(opts)?;
        self.run_ltlcross_args(&args, opts)
    }

    /// Runs ltlcross with explicit `args`; only the executable and the
    /// result/log paths of `opts` are used.
    ///
    /// Old result and log files are removed first. A non-zero exit of
    /// ltlcross is returned and recorded, not treated as an error.
    pub fn run_ltlcross_args(&mut self, args: &[String], opts: &RunOptions) -> Result<i32> {
        let (res_file, log_file) = self.run_paths(opts);
        remove_if_exists(&res_file)?;
        remove_if_exists(&log_file)?;

        let mut log = File::create(&log_file)?;
        let cmd = std::iter::once(opts.ltlcross.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(log, "{cmd}")?;
        writeln!(log, "{}", Local::now().format(TIMESTAMP_FORMAT))?;
        writeln!(log, "{LOG_RULE}")?;
        log.flush()?;

        log::info!("running {cmd}");
        let status = Command::new(&opts.ltlcross)
            .args(args)
            .stdout(log.try_clone()?)
            .stderr(log.try_clone()?)
            .status()?;
        let code = exit_code(status);
        writeln!(log, "{code}")?;

        if code == 0 {
            log::info!("ltlcross finished, results in {}", res_file.display());
        } else {
            log::warn!("ltlcross exited with {code}, see {}", log_file.display());
        }
        self.set_returncode(code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tool;

    fn session() -> Session {
        Session::new(vec![
            Tool::new("Spot", "ltl2tgba -f %f > %O"),
            Tool::new("LTL3BA", "ltl3ba -f %s > %O"),
        ])
        .with_res_file("na.csv")
    }

    #[test]
    fn default_args() {
        let args = session().create_args(&RunOptions::default()).unwrap();
        assert_eq!(
            args,
            vec![
                "{Spot}ltl2tgba -f %f > %O",
                "{LTL3BA}ltl3ba -f %s > %O",
                "-F",
                "formulae/classic.ltl",
                "--timeout=300",
                "--automata",
                "--save-bogus=na_bogus.ltl",
                "--no-checks",
                "--products=0",
                "--csv=na.csv",
            ]
        );
    }

    #[test]
    fn options_toggle_flags() {
        let opts = RunOptions {
            automata: false,
            check: true,
            timeout: None,
            save_bogus: false,
            forms: false,
            tool_subset: Some(vec!["LTL3BA".to_owned()]),
            res_file: Some(PathBuf::from("out/sub.csv")),
            ..Default::default()
        };
        let args = session().create_args(&opts).unwrap();
        assert_eq!(args, vec!["{LTL3BA}ltl3ba -f %s > %O", "--products=0", "--csv=out/sub.csv"]);

        let bad = RunOptions { tool_subset: Some(vec!["Owl".to_owned()]), ..Default::default() };
        assert!(matches!(session().create_args(&bad), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn command_line_quotes_tools() {
        let cmd = session().ltlcross_cmd(&RunOptions::default()).unwrap();
        assert!(cmd.starts_with("ltlcross '{Spot}ltl2tgba -f %f > %O' '{LTL3BA}ltl3ba"));
        assert!(cmd.ends_with("--csv=na.csv"));
    }

    #[cfg(unix)]
    #[test]
    fn run_writes_log_and_records_code() {
        let dir = tempfile::tempdir().unwrap();
        let res = dir.path().join("r.csv");
        let log = dir.path().join("r.log");
        std::fs::write(&log, "stale\n").unwrap();
        let mut s = session().with_res_file(&res);

        let opts = RunOptions { ltlcross: "echo".to_owned(), ..Default::default() };
        assert_eq!(s.run_ltlcross(&opts).unwrap(), 0);
        assert_eq!(s.returncode(), Some(0));

        let text = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("echo {Spot}"));
        assert!(lines[1].starts_with('[') && lines[1].ends_with(']'));
        assert_eq!(lines[2], LOG_RULE);
        assert!(lines[3].starts_with("{Spot}"));
        assert_eq!(lines.last(), Some(&"0"));
        assert!(!text.contains("stale"));

        let failing = RunOptions { ltlcross: "false".to_owned(), ..Default::default() };
        assert_eq!(s.run_ltlcross(&failing).unwrap(), 1);
        assert_eq!(s.returncode(), Some(1));
    }

    #[test]
    fn missing_executable_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session().with_res_file(dir.path().join("r.csv"));
        let opts = RunOptions {
            ltlcross: "/nonexistent/ltlcross".to_owned(),
            ..Default::default()
        };
        assert!(matches!(s.run_ltlcross(&opts), Err(Error::Io(_))));
    }
}
