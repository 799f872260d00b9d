//! Runner lifecycle state and process signal handling.
//!
//! Each runner publishes its [`RunnerState`] through a [`RunnerHandle`] so
//! callers and tests can observe transitions. OS signals are turned into a
//! single [`CancellationToken`] at process start; runners only ever watch
//! the token.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// State of a transport runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Constructed but not yet serving.
    Created,
    /// Accepting input.
    Listening,
    /// Shutdown requested (stdio).
    ShuttingDown,
    /// Waiting for in-flight connections to finish (SSE).
    Draining,
    /// The I/O loop failed (stdio).
    Crashed,
    /// Terminal state.
    Stopped,
}

impl RunnerState {
    /// Returns `true` for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::ShuttingDown => "shutting down",
            Self::Draining => "draining",
            Self::Crashed => "crashed",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Cloneable handle for observing and updating a runner's state.
#[derive(Clone)]
pub struct RunnerHandle {
    name: &'static str,
    tx: Arc<watch::Sender<RunnerState>>,
}

impl RunnerHandle {
    /// Creates a handle in the [`RunnerState::Created`] state.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(RunnerState::Created);
        Self {
            name,
            tx: Arc::new(tx),
        }
    }

    /// The runner's name, used in log output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        *self.tx.borrow()
    }

    /// Publishes a new state to all subscribers.
    pub fn set_state(&self, state: RunnerState) {
        tracing::debug!(runner = self.name, %state, "Runner state changed");
        self.tx.send_replace(state);
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.tx.subscribe()
    }

    /// Waits until the runner reaches `target`.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(&self, target: RunnerState, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|state| *state == target))
            .await
            .is_ok_and(|result| result.is_ok())
    }
}

impl fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Waits for SIGINT or SIGTERM and returns the signal's name.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

/// Waits for Ctrl+C and returns the signal's name.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
#[cfg(windows)]
pub async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Returns a token cancelled when the process receives a shutdown signal.
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn signal_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => {
                tracing::info!(signal, "Received shutdown signal");
                trigger.cancel();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        }
    });
    token
}
