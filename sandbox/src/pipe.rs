//! A pipe with independently owned ends, used as the start-gate between the
//! parent and the child around `fork`.
//!

use std::fs::File;
use std::io::{Read, Write};

use std::os::unix::io::{FromRawFd, RawFd};

use crate::Result;

/// Represent a pipe with a read end and a write end. The read end and the
/// write end of the pipe can be manipulated independently.
///
/// The first field of the tuple struct is the read end, the second field of
/// the tuple struct is the write end.
pub struct Pipe(pub Option<File>, pub Option<File>);

impl Pipe {
    /// Create a new `Pipe` instance.
    pub fn new() -> Result<Pipe> {
        let (read_fd, write_fd) = nix::unistd::pipe()?;
        Ok(Pipe::from_raw_fd(read_fd, write_fd))
    }

    /// Create a new `Pipe` instance whose 2 ends are constructed from raw
    /// file descriptors.
    pub fn from_raw_fd(read_fd: RawFd, write_fd: RawFd) -> Pipe {
        Pipe(
            Some(unsafe { File::from_raw_fd(read_fd) }),
            Some(unsafe { File::from_raw_fd(write_fd) })
        )
    }

    /// Take ownership of the read end of the pipe, leaving `None` in the
    /// corresponding slot in this `Pipe` instance.
    pub fn take_read_end(&mut self) -> Option<File> {
        self.0.take()
    }

    /// Take ownership of the write end of the pipe, leaving `None` in the
    /// corresponding slot in this `Pipe` instance.
    pub fn take_write_end(&mut self) -> Option<File> {
        self.1.take()
    }

    /// Close the read end, keeping only the write end open. Intended for use
    /// in the parent after `fork`.
    pub fn close_read_end(&mut self) {
        self.0.take();
    }

    /// Close the write end, keeping only the read end open. Intended for use
    /// in the child after `fork`.
    pub fn close_write_end(&mut self) {
        self.1.take();
    }

    /// Block until a single byte is available on the read end, then discard
    /// it. This is the child-side half of the start-gate handshake: it
    /// returns only after the parent has called `release`.
    pub fn wait_for_release(&mut self) -> std::io::Result<()> {
        let mut buf = [0u8; 1];
        self.0.as_mut()
            .expect("pipe read end already closed")
            .read_exact(&mut buf)
    }

    /// Write a single byte to the write end, releasing a child blocked in
    /// `wait_for_release`. This is the parent-side half of the start-gate
    /// handshake.
    pub fn release(&mut self) -> std::io::Result<()> {
        self.1.as_mut()
            .expect("pipe write end already closed")
            .write_all(&[0u8])
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        self.0.take();
        self.1.take();
    }
}
