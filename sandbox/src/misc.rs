use std::os::unix::io::RawFd;

use nix::fcntl::{FcntlArg, FdFlag};

/// This function calls `dup2(old_fd, new_fd)` and set the `O_CLOEXEC` flag on the old file
/// descriptor. This function is useful when duplicating file descriptors for standard streams
/// that can effectively prevent the original file descriptors from leaking.
pub fn dup_and_cloexec(old_fd: RawFd, new_fd: RawFd) -> nix::Result<()> {
    nix::unistd::dup2(old_fd, new_fd)?;
    nix::fcntl::fcntl(old_fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;

    Ok(())
}
