// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pseudo-terminal child process used by interactive runs.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, Pid};
use tokio::io::unix::AsyncFd;

use crate::driver::ExitStatus;

/// Newtype wrapper around the PTY master fd for use with `AsyncFd`.
#[derive(Debug)]
struct MasterFd(OwnedFd);

impl AsRawFd for MasterFd {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.as_raw_fd()
    }
}

/// A child process attached to a fresh PTY so that it believes it is
/// talking to an interactive user.
pub struct PtyChild {
    master: AsyncFd<MasterFd>,
    child_pid: Pid,
    reaped: AtomicBool,
}

impl PtyChild {
    /// Spawn `command` (program + args) on a new PTY of the given size.
    ///
    /// The child gets `TERM=dumb` and `NO_COLOR=1` and, when `cwd` is set,
    /// chdirs there before exec.
    // forkpty requires unsafe: post-fork child is partially initialized
    #[allow(unsafe_code)]
    pub fn spawn(command: &[String], cols: u16, rows: u16, cwd: Option<&Path>) -> anyhow::Result<Self> {
        anyhow::ensure!(!command.is_empty(), "empty command");
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately exec.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;

        match result {
            ForkptyResult::Child => {
                // The child inherits tokio's SIG_IGN for SIGPIPE; put the
                // default disposition back before exec.
                // SAFETY: changing process-wide signal disposition in the
                // post-fork child, before exec.
                unsafe {
                    let _ = nix::sys::signal::signal(Signal::SIGPIPE, SigHandler::SigDfl);
                }
                // A dumb colorless terminal keeps the output normalizer's
                // job small.
                std::env::set_var("TERM", "dumb");
                std::env::set_var("NO_COLOR", "1");
                if let Some(dir) = cwd {
                    let _ = nix::unistd::chdir(dir);
                }

                let c_args: Vec<CString> = command
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                    .context("invalid command argument")?;

                execvp(&c_args[0], &c_args).context("execvp failed")?;
                unreachable!();
            }
            ForkptyResult::Parent { child, master } => {
                set_nonblocking(&master)?;
                let master = AsyncFd::new(MasterFd(master)).context("AsyncFd::new failed")?;
                Ok(Self { master, child_pid: child, reaped: AtomicBool::new(false) })
            }
        }
    }

    /// Read one chunk of child output. Returns `Ok(0)` at end of stream;
    /// EIO from a closed PTY counts as end of stream.
    pub async fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.master.readable().await?;
            match guard.try_io(|inner| nix::unistd::read(&inner.get_ref().0, buf).map_err(io_err)) {
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => return Ok(0),
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }

    /// Write all of `data` into the child's terminal input.
    pub async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let mut guard = self.master.writable().await?;
            match guard.try_io(|inner| {
                nix::unistd::write(&inner.get_ref().0, &data[offset..]).map_err(io_err)
            }) {
                Ok(Ok(n)) => offset += n,
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
        Ok(())
    }

    /// Best-effort SIGTERM to the child's process group.
    ///
    /// forkpty places the child in a new session, so the child PID equals
    /// the process group ID; signaling the group cleans up grandchildren.
    pub fn terminate(&self) {
        let _ = kill(Pid::from_raw(-self.child_pid.as_raw()), Signal::SIGTERM);
    }

    /// Block until the child exits and return its status.
    pub async fn wait_exit(&self) -> anyhow::Result<ExitStatus> {
        let pid = self.child_pid;
        let status = tokio::task::spawn_blocking(move || reap_blocking(pid))
            .await
            .context("join wait thread")??;
        self.reaped.store(true, Ordering::Release);
        Ok(status)
    }

    /// Terminate-then-kill escalation: SIGTERM immediately, SIGKILL after
    /// `grace` if the child has not exited, then reap.
    pub async fn shutdown(&self, grace: Duration) -> ExitStatus {
        self.terminate();
        let pid = self.child_pid;

        let polled = tokio::task::spawn_blocking(move || poll_exit(pid, grace))
            .await
            .unwrap_or_default();
        if let Some(status) = polled {
            self.reaped.store(true, Ordering::Release);
            return status;
        }

        let _ = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
        let status = tokio::task::spawn_blocking(move || reap_blocking(pid))
            .await
            .map(|r| r.unwrap_or(ExitStatus { code: None, signal: None }))
            .unwrap_or(ExitStatus { code: None, signal: None });
        self.reaped.store(true, Ordering::Release);
        status
    }
}

impl Drop for PtyChild {
    fn drop(&mut self) {
        if self.reaped.load(Ordering::Acquire) {
            return;
        }
        let pgid = Pid::from_raw(-self.child_pid.as_raw());
        let _ = kill(pgid, Signal::SIGHUP);

        // Short window for a graceful exit before SIGKILL.
        for _ in 0..10 {
            match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) | Err(_) => return,
                _ => std::thread::sleep(Duration::from_millis(50)),
            }
        }
        let _ = kill(pgid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

impl std::fmt::Debug for PtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyChild").field("child_pid", &self.child_pid.as_raw()).finish()
    }
}

/// Poll WNOHANG at a short interval until `window` elapses.
fn poll_exit(pid: Pid, window: Duration) -> Option<ExitStatus> {
    let interval = Duration::from_millis(50);
    let deadline = std::time::Instant::now() + window;
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Some(ExitStatus { code: Some(code), signal: None });
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Some(ExitStatus { code: None, signal: Some(sig as i32) });
            }
            Err(_) => return Some(ExitStatus { code: None, signal: None }),
            Ok(_) if std::time::Instant::now() >= deadline => return None,
            Ok(_) => std::thread::sleep(interval),
        }
    }
}

/// Block until the child exits and convert to our `ExitStatus`.
fn reap_blocking(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Ok(ExitStatus { code: Some(code), signal: None });
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) });
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => anyhow::bail!("waitpid failed: {e}"),
        }
    }
}

fn set_nonblocking(fd: &impl AsFd) -> io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}
