//! The sandboxed runner: forks a child, confines it with rlimits, a private
//! network namespace and a memory cgroup, executes it with its standard
//! streams redirected to files, and reports how it terminated.
//!

use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::ForkResult;

use crate::cgroup::ResourceController;
use crate::pipe::Pipe;
use crate::rlimits::{self, Resource};
use crate::{Pid, Result};

/// Ceiling placed on a process's virtual address space.
#[derive(Clone, Copy, Debug)]
pub enum AddressSpaceLimit {
    /// Limit the address space to the given number of bytes.
    Bytes(u64),

    /// Do not limit the address space at all. Needed by managed runtimes
    /// (e.g. a JVM) that reserve large virtual ranges up front and would
    /// otherwise fail to start under any finite `RLIMIT_AS`.
    Unlimited,
}

/// Everything the runner needs to execute one attempt of a submission
/// against one test case. Built by the judge driver from a resolved
/// language profile; the runner itself has no language-specific knowledge.
pub struct RunSpec {
    /// `argv` of the program to run; `argv[0]` is resolved with the shell's
    /// `PATH` search semantics (`execvp`).
    pub argv: Vec<String>,

    /// File to redirect onto the child's stdin.
    pub stdin_path: PathBuf,

    /// File to redirect onto the child's stdout, created/truncated.
    pub stdout_path: PathBuf,

    /// File to redirect onto the child's stderr, created/truncated.
    pub stderr_path: PathBuf,

    /// `RLIMIT_CPU` soft limit, in whole seconds. The hard limit is set one
    /// second higher so `SIGXCPU` precedes `SIGKILL`.
    pub cpu_time_limit_secs: u64,

    /// `RLIMIT_AS` to install in the child, or `Unlimited` to skip it.
    pub address_space_limit: AddressSpaceLimit,

    /// Memory ceiling, in megabytes, enforced via the job's cgroup.
    pub memory_limit_mb: u64,
}

/// Maximum size, in bytes, a child process may write to any single file
/// before `RLIMIT_FSIZE` delivers `SIGXFSZ`. Bounds runaway output without
/// relying on the judge to stream-compare.
const FILE_SIZE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// How a child terminated.
#[derive(Clone, Copy, Debug)]
pub enum Termination {
    /// The child called `exit` (or returned from `main`) with this code.
    Exited(i32),

    /// The child was killed by the delivery of this signal.
    Signaled(Signal),
}

/// Raw outcome of one sandboxed run: how the child terminated plus the
/// resource usage observed via `wait4`. Carries no verdict: mapping this to
/// `Accepted`/`WrongAnswer`/... is the judge driver's job, since it alone
/// knows the expected-output comparison rule.
#[derive(Clone, Copy, Debug)]
pub struct RawOutcome {
    pub termination: Termination,
    pub time_ms: u64,
    pub memory_kb: u64,
}

fn open_redirect(path: &Path, write: bool) -> std::io::Result<std::fs::File> {
    if write {
        OpenOptions::new().write(true).create(true).truncate(true).open(path)
    } else {
        OpenOptions::new().read(true).open(path)
    }
}

/// Run `spec` under the resource controller `controller`, returning once the
/// child has exited or been killed. Never panics on a child-side failure:
/// if the child cannot even be started (missing executable, failed
/// redirection, ...) the mismatch surfaces as `Termination::Exited` with a
/// reserved nonzero code that the judge driver maps to `InternalError`.
pub fn run(controller: &ResourceController, spec: &RunSpec) -> Result<RawOutcome> {
    let mut gate = Pipe::new()?;

    match unsafe { nix::unistd::fork() }? {
        ForkResult::Child => {
            gate.close_write_end();
            // If the parent dies before releasing us, the read fails with
            // UnexpectedEof rather than blocking forever; either way we
            // proceed, since there is no parent left to wait for.
            let _ = gate.wait_for_release();
            drop(gate);

            run_child(spec);
            // `run_child` only returns on failure to exec; by convention we
            // exit with a reserved code the parent recognizes.
            std::process::exit(125);
        }
        ForkResult::Parent { child } => {
            gate.close_read_end();

            controller.setup(child.as_raw(), spec.memory_limit_mb);
            gate.release()?;
            drop(gate);

            wait_and_classify(child.as_raw(), controller)
        }
    }
}

fn run_child(spec: &RunSpec) -> () {
    // Give the submission its own network namespace so it cannot reach out
    // over the network; failure here is not fatal to isolation in the sense
    // that the judge still applies rlimits and a memory cgroup, but it is
    // logged loudly because it weakens the sandbox.
    if unsafe { libc::unshare(libc::CLONE_NEWNET) } != 0 {
        eprintln!("sandbox: failed to unshare network namespace: {}",
            std::io::Error::last_os_error());
    }

    let redirect = |path: &Path, write: bool, fd: i32| -> bool {
        match open_redirect(path, write) {
            Ok(file) => {
                let raw = file.as_raw_fd();
                // Sets `O_CLOEXEC` on `raw` so the temporary file descriptor
                // doesn't leak past the upcoming `execvp`; `fd` itself is
                // left without `O_CLOEXEC` since it must survive into the
                // child's standard streams.
                crate::misc::dup_and_cloexec(raw, fd).is_ok()
            }
            Err(e) => {
                eprintln!("sandbox: failed to open {}: {}", path.display(), e);
                false
            }
        }
    };

    if !redirect(&spec.stdin_path, false, libc::STDIN_FILENO)
        || !redirect(&spec.stdout_path, true, libc::STDOUT_FILENO)
        || !redirect(&spec.stderr_path, true, libc::STDERR_FILENO)
    {
        std::process::exit(125);
    }

    if rlimits::setrlimit(Resource::CPUTime, &rlimits::ResourceLimit {
        soft_limit: spec.cpu_time_limit_secs,
        hard_limit: spec.cpu_time_limit_secs + 1,
    }).is_err() {
        eprintln!("sandbox: failed to set RLIMIT_CPU");
    }

    if rlimits::setrlimit_hard(Resource::FileSize, FILE_SIZE_LIMIT_BYTES).is_err() {
        eprintln!("sandbox: failed to set RLIMIT_FSIZE");
    }

    match spec.address_space_limit {
        AddressSpaceLimit::Bytes(bytes) => {
            if rlimits::setrlimit_hard(Resource::AddressSpace, bytes).is_err() {
                eprintln!("sandbox: failed to set RLIMIT_AS");
            }
        }
        AddressSpaceLimit::Unlimited => {}
    }

    let argv: Vec<CString> = spec.argv.iter()
        .map(|a| CString::new(a.as_bytes()).expect("argv entry contains NUL"))
        .collect();
    let program = argv.first().cloned()
        .unwrap_or_else(|| CString::new("").unwrap());

    // `execvp` only returns on failure.
    let err = nix::unistd::execvp(&program, &argv).unwrap_err();
    eprintln!("sandbox: execvp({:?}) failed: {}", spec.argv.get(0), err);
}

fn wait_and_classify(child: Pid, controller: &ResourceController) -> Result<RawOutcome> {
    let mut status: i32 = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

    let ret = unsafe { libc::wait4(child, &mut status, 0, &mut usage) };
    controller.teardown(child);

    if ret < 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let time_ms = (usage.ru_utime.tv_sec as u64) * 1000
        + (usage.ru_utime.tv_usec as u64) / 1000;
    let memory_kb = usage.ru_maxrss.max(0) as u64;

    let termination = match WaitStatus::from_raw(nix::unistd::Pid::from_raw(child), status)? {
        WaitStatus::Exited(_, code) => Termination::Exited(code),
        WaitStatus::Signaled(_, signal, _) => Termination::Signaled(signal),
        other => {
            log::warn!("unexpected wait status for pid {}: {:?}", child, other);
            Termination::Exited(125)
        }
    };

    Ok(RawOutcome { termination, time_ms, memory_kb })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn exits_zero_is_classified_exited() {
        let controller = ResourceController::new();
        let stdin = empty_file();
        let stdout = empty_file();
        let stderr = empty_file();

        let spec = RunSpec {
            argv: vec!["/bin/true".to_owned()],
            stdin_path: stdin.path().to_owned(),
            stdout_path: stdout.path().to_owned(),
            stderr_path: stderr.path().to_owned(),
            cpu_time_limit_secs: 2,
            address_space_limit: AddressSpaceLimit::Bytes(256 * 1024 * 1024),
            memory_limit_mb: 64,
        };

        let outcome = run(&controller, &spec).expect("run failed");
        match outcome.termination {
            Termination::Exited(0) => {}
            other => panic!("expected Exited(0), got {:?}", other),
        }
    }

    #[test]
    fn cpu_limit_exceeded_is_signaled_sigxcpu() {
        let controller = ResourceController::new();
        let stdin = empty_file();
        let stdout = empty_file();
        let stderr = empty_file();

        let spec = RunSpec {
            argv: vec!["/bin/sh".to_owned(), "-c".to_owned(),
                "while :; do :; done".to_owned()],
            stdin_path: stdin.path().to_owned(),
            stdout_path: stdout.path().to_owned(),
            stderr_path: stderr.path().to_owned(),
            cpu_time_limit_secs: 1,
            address_space_limit: AddressSpaceLimit::Bytes(256 * 1024 * 1024),
            memory_limit_mb: 64,
        };

        let outcome = run(&controller, &spec).expect("run failed");
        match outcome.termination {
            Termination::Signaled(Signal::SIGXCPU) => {}
            other => panic!("expected SIGXCPU, got {:?}", other),
        }
    }

    #[test]
    fn unreadable_stdin_path_fails_gracefully() {
        let controller = ResourceController::new();
        let stdout = empty_file();
        let stderr = empty_file();

        let spec = RunSpec {
            argv: vec!["/bin/true".to_owned()],
            stdin_path: PathBuf::from("/nonexistent/path/for/test"),
            stdout_path: stdout.path().to_owned(),
            stderr_path: stderr.path().to_owned(),
            cpu_time_limit_secs: 2,
            address_space_limit: AddressSpaceLimit::Unlimited,
            memory_limit_mb: 64,
        };

        let outcome = run(&controller, &spec).expect("run failed");
        match outcome.termination {
            Termination::Exited(125) => {}
            other => panic!("expected Exited(125), got {:?}", other),
        }
    }
}
