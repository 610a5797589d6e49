//! This crate implements the core logic of the judge: resolving a
//! submission's language, compiling it if needed, running it against a
//! sequence of test cases in the sandbox, and aggregating the result into a
//! single verdict.
//!

#[macro_use]
extern crate error_chain;
extern crate log;
extern crate sandbox;

pub mod compare;
pub mod driver;
pub mod language;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(sandbox::Error, sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
    }
}

/// A submission to be judged: a complete, immutable description of one
/// attempt, built by the worker from a job message.
#[derive(Clone, Debug)]
pub struct Submission {
    /// Opaque identifier used to namespace all files created for this
    /// submission and correlate the published result with the job.
    pub id: String,

    /// Language tag as it appeared in the job payload (e.g. `"cpp"`).
    pub language: String,

    /// Raw submitted source code.
    pub source: Vec<u8>,

    /// Identifies which directory under the test-data root holds this
    /// submission's test cases.
    pub problem_id: String,

    /// Number of test cases to run, numbered `1..=test_case_count`.
    pub test_case_count: u32,

    /// CPU time limit per test case, in seconds.
    pub time_limit_s: f64,

    /// Memory limit per test case, in megabytes.
    pub memory_limit_mb: u64,
}

/// Closed set of verdicts a test case or a whole submission can receive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    InternalError,
    CompilationError,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Upper-snake-case wire representation used in the result payload.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "ACCEPTED",
            Verdict::WrongAnswer => "WRONG_ANSWER",
            Verdict::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Verdict::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Verdict::RuntimeError => "RUNTIME_ERROR",
            Verdict::InternalError => "INTERNAL_ERROR",
            Verdict::CompilationError => "COMPILATION_ERROR",
        }
    }
}

/// Outcome of running a submission against a single test case.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub verdict: Verdict,
    pub time_ms: u64,
    pub memory_kb: u64,
    pub exit_code: i32,
    /// Bounded excerpt of the child's stderr, populated for
    /// `RuntimeError`/`InternalError` verdicts.
    pub stderr_excerpt: Option<String>,
}

/// Aggregated result of judging a submission across all the test cases that
/// were executed before the run short-circuited (or all of them, if every
/// case was accepted).
#[derive(Clone, Debug)]
pub struct SubmissionOutcome {
    pub id: String,
    pub verdict: Verdict,
    pub max_time_ms: u64,
    pub max_memory_kb: u64,
    pub error: Option<String>,
}

impl SubmissionOutcome {
    fn internal_error(id: &str, message: impl Into<String>) -> SubmissionOutcome {
        SubmissionOutcome {
            id: id.to_owned(),
            verdict: Verdict::InternalError,
            max_time_ms: 0,
            max_memory_kb: 0,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_wire_strings_are_upper_snake_case() {
        assert_eq!(Verdict::Accepted.as_wire_str(), "ACCEPTED");
        assert_eq!(Verdict::TimeLimitExceeded.as_wire_str(), "TIME_LIMIT_EXCEEDED");
        assert_eq!(Verdict::CompilationError.as_wire_str(), "COMPILATION_ERROR");
    }

    #[test]
    fn only_accepted_is_accepted() {
        assert!(Verdict::Accepted.is_accepted());
        assert!(!Verdict::WrongAnswer.is_accepted());
    }
}
