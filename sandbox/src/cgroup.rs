//! Per-job memory cgroup setup and teardown, supporting both cgroup v1
//! (per-controller hierarchies) and cgroup v2 (unified hierarchy).
//!

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Pid;

const CGROUPFS_ROOT: &str = "/sys/fs/cgroup";
const V1_MEMORY_ROOT: &str = "/sys/fs/cgroup/memory";

/// Which cgroup layout the running kernel exposes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Version {
    V1,
    V2,
}

impl Version {
    fn detect() -> Option<Version> {
        if Path::new(CGROUPFS_ROOT).join("cgroup.controllers").exists() {
            Some(Version::V2)
        } else if Path::new(V1_MEMORY_ROOT).is_dir() {
            Some(Version::V1)
        } else {
            None
        }
    }
}

/// Creates and tears down a per-job memory cgroup around a child process.
///
/// If the host exposes neither cgroup hierarchy, `setup`/`teardown` degrade
/// to no-ops: the job still runs, constrained only by its rlimits, and the
/// failure is logged rather than propagated (see the resource controller's
/// best-effort contract).
pub struct ResourceController {
    version: Option<Version>,
    v2_evacuated: AtomicBool,
}

impl ResourceController {
    /// Probe the host for cgroup support.
    pub fn new() -> ResourceController {
        let version = Version::detect();
        if version.is_none() {
            log::warn!("no supported cgroup hierarchy found under {}; \
                memory limits will rely on rlimits alone", CGROUPFS_ROOT);
        }
        ResourceController {
            version,
            v2_evacuated: AtomicBool::new(false),
        }
    }

    /// Create a job cgroup for `pid` with the given memory ceiling and move
    /// `pid` into it. Errors are logged and swallowed: a failure here must
    /// not prevent the job from running.
    pub fn setup(&self, pid: Pid, memory_limit_mb: u64) {
        match self.version {
            Some(Version::V1) => {
                if let Err(e) = self.setup_v1(pid, memory_limit_mb) {
                    log::warn!("cgroup v1 setup failed for pid {}: {}", pid, e);
                }
            }
            Some(Version::V2) => {
                if let Err(e) = self.setup_v2(pid, memory_limit_mb) {
                    log::warn!("cgroup v2 setup failed for pid {}: {}", pid, e);
                }
            }
            None => {}
        }
    }

    /// Remove the job cgroup created for `pid` by `setup`, if any.
    pub fn teardown(&self, pid: Pid) {
        let path = match self.version {
            Some(Version::V1) => self.v1_job_dir(pid),
            Some(Version::V2) => self.v2_job_dir(pid),
            None => return,
        };
        // The kernel refuses rmdir until the cgroup is empty of tasks; by the
        // time teardown runs the job's process has already been reaped.
        if let Err(e) = fs::remove_dir(&path) {
            log::warn!("failed to remove cgroup {}: {}", path.display(), e);
        }
    }

    fn v1_job_dir(&self, pid: Pid) -> PathBuf {
        Path::new(V1_MEMORY_ROOT).join(format!("judge_{}", pid))
    }

    fn setup_v1(&self, pid: Pid, memory_limit_mb: u64) -> std::io::Result<()> {
        let dir = self.v1_job_dir(pid);
        fs::create_dir_all(&dir)?;

        let bytes = memory_limit_mb * 1024 * 1024;
        fs::write(dir.join("memory.limit_in_bytes"), bytes.to_string())?;
        // memsw may be absent if the kernel was built without swap accounting.
        let _ = fs::write(dir.join("memory.memsw.limit_in_bytes"), bytes.to_string());
        fs::write(dir.join("tasks"), pid.to_string())?;

        Ok(())
    }

    fn v2_judges_parent(&self) -> PathBuf {
        Path::new(CGROUPFS_ROOT).join("judges")
    }

    fn v2_job_dir(&self, pid: Pid) -> PathBuf {
        self.v2_judges_parent().join(format!("job_{}", pid))
    }

    /// Move every process in the root cgroup into a dedicated service
    /// cgroup, then enable the `memory` and `cpu` controllers on the root's
    /// subtree. A cgroup v2 hierarchy rejects subtree-controller writes while
    /// it still directly contains processes, so this must run exactly once,
    /// before the first job cgroup is created.
    fn ensure_v2_evacuated(&self) -> std::io::Result<()> {
        if self.v2_evacuated.load(Ordering::SeqCst) {
            return Ok(());
        }

        let root = Path::new(CGROUPFS_ROOT);
        let service_dir = root.join("worker_service");
        fs::create_dir_all(&service_dir)?;

        let root_procs = fs::read_to_string(root.join("cgroup.procs"))?;
        for pid in root_procs.lines() {
            // A process that exited between the read and the write is not an
            // error; best effort is all that's required here.
            let _ = fs::write(service_dir.join("cgroup.procs"), pid);
        }
        let _ = fs::write(service_dir.join("cgroup.procs"), std::process::id().to_string());

        fs::write(root.join("cgroup.subtree_control"), "+memory +cpu")?;

        let judges_dir = self.v2_judges_parent();
        fs::create_dir_all(&judges_dir)?;
        fs::write(judges_dir.join("cgroup.subtree_control"), "+memory +cpu")?;

        self.v2_evacuated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn setup_v2(&self, pid: Pid, memory_limit_mb: u64) -> std::io::Result<()> {
        self.ensure_v2_evacuated()?;

        let dir = self.v2_job_dir(pid);
        fs::create_dir_all(&dir)?;

        let bytes = memory_limit_mb * 1024 * 1024;
        fs::write(dir.join("memory.max"), bytes.to_string())?;
        fs::write(dir.join("memory.swap.max"), "0")?;
        fs::write(dir.join("cgroup.procs"), pid.to_string())?;

        Ok(())
    }
}

impl Default for ResourceController {
    fn default() -> ResourceController {
        ResourceController::new()
    }
}
