// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native PTY backend that spawns a child process via `forkpty`.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use harness_core::ExitStatus;
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, Pid};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

use crate::backend::{Backend, BackendInput, Signaller};
use crate::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};

/// Child process spawned on a new pseudo-terminal.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
}

/// How to spawn the child.
#[derive(Debug, Clone)]
pub struct SpawnCommand {
    /// Program and arguments; must have at least one element.
    pub argv: Vec<String>,
    /// Extra environment variables set in the child.
    pub env: Vec<(String, String)>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
}

impl NativePty {
    /// Spawn a child process on a new PTY.
    // forkpty requires unsafe: post-fork child is partially initialized
    #[allow(unsafe_code)]
    pub fn spawn(command: &SpawnCommand) -> Result<Self, String> {
        if command.argv.is_empty() {
            return Err("empty command".to_string());
        }

        let winsize = Winsize {
            ws_col: command.cols,
            ws_row: command.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately exec.
        let result = unsafe { forkpty(&winsize, None) }.map_err(|e| format!("forkpty: {e}"))?;

        match result {
            ForkptyResult::Child => {
                // Child process: set env, chdir, and exec
                std::env::set_var("TERM", "xterm-256color");
                std::env::set_var("HARNESS_SESSION", "1");
                for (key, value) in &command.env {
                    std::env::set_var(key, value);
                }
                if let Some(cwd) = &command.cwd {
                    if std::env::set_current_dir(cwd).is_err() {
                        // Exec fails loudly below rather than running in
                        // the wrong directory
                        std::process::exit(127);
                    }
                }

                let c_args: Vec<CString> = match command
                    .argv
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                {
                    Ok(args) => args,
                    Err(_) => std::process::exit(127),
                };

                let _ = execvp(&c_args[0], &c_args);
                std::process::exit(127);
            }
            ForkptyResult::Parent { child, master } => {
                set_nonblocking(&master).map_err(|e| format!("set_nonblocking: {e}"))?;
                let afd =
                    AsyncFd::new(PtyFd(master)).map_err(|e| format!("AsyncFd::new: {e}"))?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                })
            }
        }
    }

    /// Apply a window-size change to the PTY master.
    // TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call
    #[allow(unsafe_code)]
    fn apply_resize(&self, cols: u16, rows: u16) -> Result<(), String> {
        let ws = Winsize {
            ws_col: cols,
            ws_row: rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: TIOCSWINSZ is a well-defined ioctl that sets the window
        // size on the PTY master fd. The Winsize struct is properly
        // initialized.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            return Err(format!(
                "TIOCSWINSZ ioctl failed: {}",
                std::io::Error::last_os_error()
            ));
        }

        Ok(())
    }
}

/// Signal delivery by pid.
struct PidSignaller(Pid);

impl Signaller for PidSignaller {
    fn signal(&self, signal: i32) -> Result<(), String> {
        let sig = Signal::try_from(signal).map_err(|e| format!("bad signal {signal}: {e}"))?;
        kill(self.0, sig).map_err(|e| format!("kill: {e}"))
    }
}

impl Backend for NativePty {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        mut input_rx: mpsc::Receiver<BackendInput>,
        mut resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ExitStatus, String>> + Send + '_>>
    {
        let pid = self.child_pid;
        Box::pin(async move {
            let mut buf = vec![0u8; 8192];
            let mut input_closed = false;

            loop {
                tokio::select! {
                    result = read_chunk(&self.master, &mut buf) => {
                        match result {
                            Ok(0) => break,
                            Ok(n) => {
                                let data = Bytes::copy_from_slice(&buf[..n]);
                                if output_tx.send(data).await.is_err() {
                                    break;
                                }
                            }
                            // EIO from the master means the slave side closed
                            Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                            Err(e) => return Err(format!("pty read: {e}")),
                        }
                    }
                    input = input_rx.recv(), if !input_closed => {
                        match input {
                            Some(BackendInput::Write(data)) => {
                                write_all(&self.master, &data)
                                    .await
                                    .map_err(|e| format!("pty write: {e}"))?;
                            }
                            Some(BackendInput::Drain(done)) => {
                                let _ = done.send(());
                            }
                            None => input_closed = true,
                        }
                    }
                    resize = resize_rx.recv() => {
                        if let Some((cols, rows)) = resize {
                            if let Err(e) = self.apply_resize(cols, rows) {
                                tracing::warn!(error = %e, "pty resize failed");
                            }
                        }
                    }
                }
            }

            // Reap child on a blocking thread to avoid blocking the runtime
            let status = tokio::task::spawn_blocking(move || wait_for_exit(pid))
                .await
                .map_err(|e| format!("join wait thread: {e}"))??;
            Ok(status)
        })
    }

    fn signaller(&self) -> Arc<dyn Signaller> {
        Arc::new(PidSignaller(self.child_pid))
    }

    fn child_pid(&self) -> Option<u32> {
        Some(self.child_pid.as_raw() as u32)
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        // Best-effort shutdown: SIGHUP then SIGKILL.
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

/// Block until the child exits and convert to our `ExitStatus`.
fn wait_for_exit(pid: Pid) -> Result<ExitStatus, String> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Ok(ExitStatus {
                    code: Some(code),
                    signal: None,
                });
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus {
                    code: None,
                    signal: Some(sig as i32),
                });
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(format!("waitpid failed: {e}")),
        }
    }
}
