// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal backend abstraction over PTY or fake layers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use harness_core::ExitStatus;
use tokio::sync::mpsc;

/// Input sent to the PTY backend.
#[derive(Debug)]
pub enum BackendInput {
    /// Raw bytes to write to the PTY.
    Write(Bytes),
    /// Drain marker: since the backend processes messages sequentially,
    /// all prior writes are complete when this is received. The sender
    /// is notified via the oneshot channel.
    Drain(tokio::sync::oneshot::Sender<()>),
}

/// Signal delivery to a running child, usable while the backend's run
/// future owns the backend itself.
pub trait Signaller: Send + Sync {
    fn signal(&self, signal: i32) -> Result<(), String>;
}

/// Backend owning the child process side of a session.
///
/// Object-safe for use as `Box<dyn Backend>`.
pub trait Backend: Send + 'static {
    /// Run the I/O pump until the child exits.
    ///
    /// Output chunks go to `output_tx`; stdin writes arrive on
    /// `input_rx`; window-size changes on `resize_rx`.
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<BackendInput>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = Result<ExitStatus, String>> + Send + '_>>;

    /// Handle for delivering signals to the child. Captured by the
    /// supervisor before the run future takes ownership.
    fn signaller(&self) -> Arc<dyn Signaller>;

    /// Child process id, when one exists.
    fn child_pid(&self) -> Option<u32>;
}

/// Conversion trait so both concrete backends and `Box<dyn Backend>`
/// can be passed to the supervisor without explicit boxing.
pub trait Boxed {
    fn boxed(self) -> Box<dyn Backend>;
}

impl<T: Backend> Boxed for T {
    fn boxed(self) -> Box<dyn Backend> {
        Box::new(self)
    }
}

impl Boxed for Box<dyn Backend> {
    fn boxed(self) -> Box<dyn Backend> {
        self
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, FakeBackendHandle};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Scripted backend for supervisor tests.
    ///
    /// Echoes every write back as output, emits scripted chunks on
    /// demand, and exits when asked (or on SIGTERM/SIGKILL).
    pub struct FakeBackend {
        scripted_rx: Option<mpsc::Receiver<Bytes>>,
        shared: Arc<FakeShared>,
    }

    struct FakeShared {
        exit: Notify,
        exit_code: parking_lot::Mutex<i32>,
        signalled: AtomicBool,
    }

    /// Remote control for a [`FakeBackend`].
    #[derive(Clone)]
    pub struct FakeBackendHandle {
        output: mpsc::Sender<Bytes>,
        shared: Arc<FakeShared>,
    }

    impl FakeBackend {
        pub fn new() -> (Self, FakeBackendHandle) {
            let (output, scripted_rx) = mpsc::channel(64);
            let shared = Arc::new(FakeShared {
                exit: Notify::new(),
                exit_code: parking_lot::Mutex::new(0),
                signalled: AtomicBool::new(false),
            });
            let handle = FakeBackendHandle {
                output,
                shared: Arc::clone(&shared),
            };
            (
                Self {
                    scripted_rx: Some(scripted_rx),
                    shared,
                },
                handle,
            )
        }
    }

    impl FakeBackendHandle {
        /// Emit a scripted output chunk.
        pub async fn emit(&self, bytes: &[u8]) {
            let _ = self.output.send(Bytes::copy_from_slice(bytes)).await;
        }

        /// Make the backend exit with the given code.
        pub fn exit_with(&self, code: i32) {
            *self.shared.exit_code.lock() = code;
            self.shared.exit.notify_one();
        }

        /// Whether any signal was delivered.
        pub fn was_signalled(&self) -> bool {
            self.shared.signalled.load(Ordering::SeqCst)
        }
    }

    impl Signaller for FakeShared {
        fn signal(&self, signal: i32) -> Result<(), String> {
            self.signalled.store(true, Ordering::SeqCst);
            // SIGTERM and SIGKILL terminate the fake child
            if signal == 15 || signal == 9 {
                *self.exit_code.lock() = 128 + signal;
                self.exit.notify_one();
            }
            Ok(())
        }
    }

    impl Backend for FakeBackend {
        fn run(
            &mut self,
            output_tx: mpsc::Sender<Bytes>,
            mut input_rx: mpsc::Receiver<BackendInput>,
            mut resize_rx: mpsc::Receiver<(u16, u16)>,
        ) -> Pin<Box<dyn Future<Output = Result<ExitStatus, String>> + Send + '_>> {
            let mut scripted_rx = match self.scripted_rx.take() {
                Some(rx) => rx,
                None => return Box::pin(async { Err("backend already running".to_string()) }),
            };
            let shared = Arc::clone(&self.shared);
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = shared.exit.notified() => {
                            let code = *shared.exit_code.lock();
                            return Ok(ExitStatus { code: Some(code), signal: None });
                        }
                        chunk = scripted_rx.recv() => {
                            match chunk {
                                Some(bytes) => {
                                    if output_tx.send(bytes).await.is_err() {
                                        return Ok(ExitStatus { code: Some(0), signal: None });
                                    }
                                }
                                None => return Ok(ExitStatus { code: Some(0), signal: None }),
                            }
                        }
                        input = input_rx.recv() => {
                            match input {
                                Some(BackendInput::Write(bytes)) => {
                                    // Echo writes back as output
                                    if output_tx.send(bytes).await.is_err() {
                                        return Ok(ExitStatus { code: Some(0), signal: None });
                                    }
                                }
                                Some(BackendInput::Drain(done)) => {
                                    let _ = done.send(());
                                }
                                None => {}
                            }
                        }
                        _ = resize_rx.recv() => {}
                    }
                }
            })
        }

        fn signaller(&self) -> Arc<dyn Signaller> {
            Arc::clone(&self.shared) as Arc<dyn Signaller>
        }

        fn child_pid(&self) -> Option<u32> {
            None
        }
    }
}
