//! Wire formats exchanged with the broker: the job message consumed from
//! `submission_queue` and the result message published to `result_queue`.
//!

use serde::{Deserialize, Serialize};

use judge::{Submission, SubmissionOutcome, Verdict};

fn default_time_limit() -> f64 {
    1.0
}

fn default_memory_limit() -> u64 {
    256
}

/// Raw job payload as received from the broker.
#[derive(Debug, Deserialize)]
pub struct JobMessage {
    pub id: String,
    pub code: String,
    pub language: String,
    pub problem_id: i64,
    pub test_case_count: u32,

    #[serde(default = "default_time_limit")]
    pub time_limit: f64,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,
}

impl From<JobMessage> for Submission {
    fn from(job: JobMessage) -> Submission {
        Submission {
            id: job.id,
            language: job.language,
            source: job.code.into_bytes(),
            problem_id: job.problem_id.to_string(),
            test_case_count: job.test_case_count,
            time_limit_s: job.time_limit,
            memory_limit_mb: job.memory_limit,
        }
    }
}

/// Result payload published back to the broker.
#[derive(Debug, Serialize)]
pub struct ResultMessage {
    pub id: String,
    pub verdict: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SubmissionOutcome> for ResultMessage {
    fn from(outcome: SubmissionOutcome) -> ResultMessage {
        let ran = outcome.verdict != Verdict::InternalError || outcome.max_time_ms > 0;
        ResultMessage {
            id: outcome.id,
            verdict: outcome.verdict.as_wire_str(),
            time_ms: if ran { Some(outcome.max_time_ms) } else { None },
            memory_kb: if ran { Some(outcome.max_memory_kb) } else { None },
            error: outcome.error,
        }
    }
}

/// Outcome built directly by the worker when a job never reached the judge
/// driver at all (e.g. the payload itself failed to parse fields beyond
/// what `serde` already rejected, or an unexpected I/O error occurred).
pub fn internal_error_result(id: &str, message: impl Into<String>) -> ResultMessage {
    ResultMessage {
        id: id.to_owned(),
        verdict: Verdict::InternalError.as_wire_str(),
        time_ms: None,
        memory_kb: None,
        error: Some(message.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_message_applies_defaults() {
        let json = r#"{"id":"1","code":"","language":"cpp","problem_id":7,"test_case_count":3}"#;
        let job: JobMessage = serde_json::from_str(json).unwrap();
        assert_eq!(job.time_limit, 1.0);
        assert_eq!(job.memory_limit, 256);
    }

    #[test]
    fn result_message_omits_timing_on_internal_error_before_any_run() {
        let outcome = SubmissionOutcome {
            id: "1".to_owned(),
            verdict: Verdict::InternalError,
            max_time_ms: 0,
            max_memory_kb: 0,
            error: Some("unsupported language: brainfuck".to_owned()),
        };
        let msg: ResultMessage = outcome.into();
        assert_eq!(msg.verdict, "INTERNAL_ERROR");
        assert!(msg.time_ms.is_none());

        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("time_ms"));
    }

    #[test]
    fn result_message_reports_timing_when_the_job_ran() {
        let outcome = SubmissionOutcome {
            id: "2".to_owned(),
            verdict: Verdict::WrongAnswer,
            max_time_ms: 120,
            max_memory_kb: 4096,
            error: None,
        };
        let msg: ResultMessage = outcome.into();
        assert_eq!(msg.verdict, "WRONG_ANSWER");
        assert_eq!(msg.time_ms, Some(120));
    }
}
