use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// Outcome of one tool translating one formula, as reported in the
/// `exit_status` column of ltlcross.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ExitStatus {
    Ok,
    Timeout,
    ParseError,
    ExitCode,
    Signal,
    NoOutput,
    /// Set after the fact by [`crate::Session::na_incorrect`].
    Incorrect,
}

impl ExitStatus {
    pub const ALL: [ExitStatus; 7] = [
        ExitStatus::Ok,
        ExitStatus::Timeout,
        ExitStatus::ParseError,
        ExitStatus::ExitCode,
        ExitStatus::Signal,
        ExitStatus::NoOutput,
        ExitStatus::Incorrect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExitStatus::Ok => "ok",
            ExitStatus::Timeout => "timeout",
            ExitStatus::ParseError => "parse error",
            ExitStatus::ExitCode => "exit code",
            ExitStatus::Signal => "signal",
            ExitStatus::NoOutput => "no output",
            ExitStatus::Incorrect => "incorrect",
        }
    }

    pub fn is_ok(self) -> bool {
        self == ExitStatus::Ok
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ExitStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| Error::invalid(format!("unknown exit status `{s}`")))
    }
}

/// Error categories accepted by `get_error_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ParseError,
    Incorrect,
    /// `exit code` or `signal`
    Crash,
    NoOutput,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Timeout,
        ErrorKind::ParseError,
        ErrorKind::Incorrect,
        ErrorKind::Crash,
        ErrorKind::NoOutput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ParseError => "parse error",
            ErrorKind::Incorrect => "incorrect",
            ErrorKind::Crash => "crash",
            ErrorKind::NoOutput => "no output",
        }
    }

    pub fn matches(self, status: ExitStatus) -> bool {
        match self {
            ErrorKind::Timeout => status == ExitStatus::Timeout,
            ErrorKind::ParseError => status == ExitStatus::ParseError,
            ErrorKind::Incorrect => status == ExitStatus::Incorrect,
            ErrorKind::Crash => matches!(status, ExitStatus::ExitCode | ExitStatus::Signal),
            ErrorKind::NoOutput => status == ExitStatus::NoOutput,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| Error::invalid(format!("unsupported error kind `{s}`")))
    }
}
