//! This crate implements a sandbox for the judge. The sandbox is responsible
//! for executing a single submission against a single test case in a safe
//! and monitored environment.
//!
//! The sandbox implements:
//!
//! * Process lifecycle: fork, exec and wait on a child process, reporting
//! its exit code or terminating signal together with its resource usage;
//!
//! * Resource limits: CPU time limits, address space limits and a per-job
//! memory cgroup (supporting both cgroup v1 and cgroup v2 hierarchies);
//!
//! * Redirections: redirects stdin, stdout and stderr of the child process
//! to specific files;
//!
//! * A start-gate handshake ensuring the child never runs user code before
//! its cgroup has been installed.
//!

#[macro_use]
extern crate error_chain;
extern crate libc;
extern crate nix;

pub mod cgroup;
mod misc;
mod pipe;
pub mod rlimits;
pub mod runner;

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

pub use pipe::Pipe;
pub use runner::{AddressSpaceLimit, RawOutcome, RunSpec, Termination};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
    }
}

/// Type for process identifiers.
pub type Pid = i32;

/// Measurement of the size of a block of memory.
#[derive(Clone, Copy, Debug, Eq)]
pub enum MemorySize {
    /// Measurement in bytes.
    Bytes(usize),

    /// Measurement in kilobytes.
    KiloBytes(usize),

    /// Measurement in megabytes.
    MegaBytes(usize),

    /// Measurement in gigabytes.
    GigaBytes(usize),
}

impl MemorySize {
    /// Convert the current measurement to memory size in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            MemorySize::Bytes(s) => *s,
            MemorySize::KiloBytes(s) => s * 1024,
            MemorySize::MegaBytes(s) => s * 1024 * 1024,
            MemorySize::GigaBytes(s) => s * 1024 * 1024 * 1024,
        }
    }
}

impl PartialEq for MemorySize {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for MemorySize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemorySize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(&other.bytes())
    }
}

impl From<usize> for MemorySize {
    fn from(value: usize) -> MemorySize {
        MemorySize::Bytes(value)
    }
}

impl Display for MemorySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySize::Bytes(s) => f.write_fmt(format_args!("{} B", s)),
            MemorySize::KiloBytes(s) => f.write_fmt(format_args!("{} KB", s)),
            MemorySize::MegaBytes(s) => f.write_fmt(format_args!("{} MB", s)),
            MemorySize::GigaBytes(s) => f.write_fmt(format_args!("{} GB", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySize;

    #[test]
    fn test_memory_size_to_bytes() {
        assert_eq!(2, MemorySize::Bytes(2).bytes());
        assert_eq!(2 * 1024, MemorySize::KiloBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024, MemorySize::MegaBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024 * 1024, MemorySize::GigaBytes(2).bytes());
    }

    #[test]
    fn test_memory_size_ord() {
        assert!(MemorySize::MegaBytes(1) > MemorySize::KiloBytes(1));
        assert!(MemorySize::KiloBytes(1024) == MemorySize::MegaBytes(1));
    }
}
