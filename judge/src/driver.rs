//! Orchestrates one submission end-to-end: write source, compile if
//! needed, run every test case in order, and aggregate a single verdict.
//!

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sandbox::cgroup::ResourceController;
use sandbox::runner::{self, RunSpec, Termination};

use crate::language::LanguageProfile;
use crate::{ExecutionResult, Result, Submission, SubmissionOutcome, Verdict};

/// Bound on how much of a compiler's or a judgee's stderr gets carried into
/// a published result, keeping result payloads small and log lines bounded.
const ERROR_EXCERPT_LIMIT: usize = 4096;

fn read_excerpt(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let truncated = &bytes[..bytes.len().min(ERROR_EXCERPT_LIMIT)];
    Some(String::from_utf8_lossy(truncated).into_owned())
}

/// Removes every per-job file it was told about, plus any compile artifact
/// the language profile owns, no matter which path out of `judge` is taken.
struct JobCleanup<'a> {
    profile: &'a LanguageProfile,
    id: String,
    paths: Vec<PathBuf>,
}

impl<'a> JobCleanup<'a> {
    fn new(profile: &'a LanguageProfile, id: &str) -> JobCleanup<'a> {
        JobCleanup { profile, id: id.to_owned(), paths: Vec::new() }
    }

    fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }
}

impl<'a> Drop for JobCleanup<'a> {
    fn drop(&mut self) {
        self.profile.cleanup(&self.id);
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

/// Orchestrates judging of submissions against on-disk test data.
pub struct JudgeDriver<'a> {
    data_dir: PathBuf,
    controller: &'a ResourceController,
}

impl<'a> JudgeDriver<'a> {
    pub fn new(data_dir: PathBuf, controller: &'a ResourceController) -> JudgeDriver<'a> {
        JudgeDriver { data_dir, controller }
    }

    fn test_case_paths(&self, submission: &Submission, index: u32) -> (PathBuf, PathBuf) {
        let dir = self.data_dir.join(&submission.problem_id);
        (dir.join(format!("{}_in.txt", index)), dir.join(format!("{}_out.txt", index)))
    }

    /// Judge `submission`, returning the aggregated outcome. This only
    /// returns `Err` for failures severe enough that no outcome could be
    /// computed at all (e.g. the source file could not be written); every
    /// job-scoped failure (unsupported language, missing test data, compile
    /// error, runtime error) is represented as `Ok(SubmissionOutcome { .. })`.
    pub fn judge(&self, submission: &Submission) -> Result<SubmissionOutcome> {
        let profile = match LanguageProfile::resolve(&submission.language) {
            Some(p) => p,
            None => return Ok(SubmissionOutcome::internal_error(
                &submission.id,
                format!("unsupported language: {}", submission.language),
            )),
        };

        let mut cleanup = JobCleanup::new(&profile, &submission.id);

        let source_path = PathBuf::from(profile.source_filename(&submission.id));
        fs::write(&source_path, &submission.source)?;
        cleanup.track(&source_path);

        if profile.needs_compilation() {
            if let Some(outcome) = self.compile(submission, &profile, &mut cleanup)? {
                return Ok(outcome);
            }
        }

        if submission.test_case_count == 0 {
            return Ok(SubmissionOutcome::internal_error(
                &submission.id, "submission has no test cases"));
        }

        self.run_test_cases(submission, &profile, &mut cleanup)
    }

    /// Returns `Ok(Some(outcome))` when compilation failed and the judge
    /// must stop here; `Ok(None)` to continue to the test-case loop.
    fn compile(
        &self,
        submission: &Submission,
        profile: &LanguageProfile,
        cleanup: &mut JobCleanup,
    ) -> Result<Option<SubmissionOutcome>> {
        let argv = profile.compile_argv(&submission.id)
            .expect("needs_compilation() implies compile_argv() is Some");
        let compile_err_path = PathBuf::from(format!("compile_err_{}.txt", submission.id));
        cleanup.track(&compile_err_path);

        let stderr_file = fs::File::create(&compile_err_path)?;
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stderr(stderr_file)
            .status()?;

        if status.success() {
            Ok(None)
        } else {
            log::info!("submission {} failed to compile", submission.id);
            Ok(Some(SubmissionOutcome {
                id: submission.id.clone(),
                verdict: Verdict::CompilationError,
                max_time_ms: 0,
                max_memory_kb: 0,
                error: read_excerpt(&compile_err_path),
            }))
        }
    }

    fn run_test_cases(
        &self,
        submission: &Submission,
        profile: &LanguageProfile,
        cleanup: &mut JobCleanup,
    ) -> Result<SubmissionOutcome> {
        let mut max_time_ms = 0u64;
        let mut max_memory_kb = 0u64;

        for index in 1..=submission.test_case_count {
            let (input_path, expected_path) = self.test_case_paths(submission, index);
            if !input_path.is_file() || !expected_path.is_file() {
                return Ok(SubmissionOutcome {
                    id: submission.id.clone(),
                    verdict: Verdict::InternalError,
                    max_time_ms,
                    max_memory_kb,
                    error: Some(format!("missing test data for case {}", index)),
                });
            }

            let result = self.run_one_case(submission, profile, index, &input_path, &expected_path, cleanup)?;
            max_time_ms = max_time_ms.max(result.time_ms);
            max_memory_kb = max_memory_kb.max(result.memory_kb);

            if !result.verdict.is_accepted() {
                return Ok(SubmissionOutcome {
                    id: submission.id.clone(),
                    verdict: result.verdict,
                    max_time_ms,
                    max_memory_kb,
                    error: result.stderr_excerpt,
                });
            }
        }

        Ok(SubmissionOutcome {
            id: submission.id.clone(),
            verdict: Verdict::Accepted,
            max_time_ms,
            max_memory_kb,
            error: None,
        })
    }

    fn run_one_case(
        &self,
        submission: &Submission,
        profile: &LanguageProfile,
        index: u32,
        input_path: &Path,
        expected_path: &Path,
        cleanup: &mut JobCleanup,
    ) -> Result<ExecutionResult> {
        let output_path = PathBuf::from(format!("out_{}_{}.txt", submission.id, index));
        let stderr_path = PathBuf::from(format!("err_{}.txt", submission.id));
        cleanup.track(&output_path);
        cleanup.track(&stderr_path);

        let cpu_time_limit_secs = submission.time_limit_s.ceil().max(1.0) as u64;
        let spec = RunSpec {
            argv: profile.run_argv(&submission.id, submission.memory_limit_mb),
            stdin_path: input_path.to_owned(),
            stdout_path: output_path.clone(),
            stderr_path: stderr_path.clone(),
            cpu_time_limit_secs,
            address_space_limit: profile.address_space_limit(submission.memory_limit_mb),
            memory_limit_mb: submission.memory_limit_mb,
        };

        let raw = runner::run(self.controller, &spec)?;

        let mut signal_annotation = None;
        let (verdict, exit_code) = match raw.termination {
            Termination::Exited(0) => {
                if crate::compare::files_equivalent(&output_path, expected_path)? {
                    (Verdict::Accepted, 0)
                } else {
                    (Verdict::WrongAnswer, 0)
                }
            }
            Termination::Exited(code) => (Verdict::RuntimeError, code),
            Termination::Signaled(sig) => {
                use nix::sys::signal::Signal;
                let verdict = match sig {
                    Signal::SIGXCPU => Verdict::TimeLimitExceeded,
                    Signal::SIGKILL => Verdict::MemoryLimitExceeded,
                    Signal::SIGSEGV => {
                        signal_annotation = Some("segmentation fault".to_owned());
                        Verdict::RuntimeError
                    }
                    Signal::SIGFPE => {
                        signal_annotation = Some("arithmetic error".to_owned());
                        Verdict::RuntimeError
                    }
                    other => {
                        signal_annotation = Some(format!("terminated by signal {}", other as i32));
                        Verdict::RuntimeError
                    }
                };
                (verdict, 128 + sig as i32)
            }
        };

        let stderr_excerpt = if verdict == Verdict::RuntimeError || verdict == Verdict::InternalError {
            match (signal_annotation, read_excerpt(&stderr_path)) {
                (Some(note), Some(excerpt)) if !excerpt.is_empty() => Some(format!("{}\n{}", note, excerpt)),
                (Some(note), _) => Some(note),
                (None, excerpt) => excerpt,
            }
        } else {
            None
        };

        Ok(ExecutionResult {
            verdict,
            time_ms: raw.time_ms,
            memory_kb: raw.memory_kb,
            exit_code,
            stderr_excerpt,
        })
    }
}
