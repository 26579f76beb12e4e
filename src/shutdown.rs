//! Graceful shutdown
//!
//! `Running -> ShuttingDown -> Stopped`. The transition to `ShuttingDown`
//! happens on an OS signal (or [`ShutdownCoordinator::trigger`]); in-flight
//! requests then get a bounded grace period to finish.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Stopped,
}

/// How the server came to a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All connections drained within the grace period
    Graceful,
    /// The grace period elapsed with requests still in flight
    Forced,
}

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self { state, grace }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Start shutting down. Has no effect once shutdown has begun.
    pub fn trigger(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::ShuttingDown;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Server is shutting down...");
        }
    }

    /// Resolves once shutdown has begun, by signal or by [`trigger`](Self::trigger).
    ///
    /// Also listens for the OS signals, so the accept loop should own one of these.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let coordinator = self.clone();
        async move {
            let mut rx = coordinator.state.subscribe();
            tokio::select! {
                _ = os_signal() => coordinator.trigger(),
                _ = shutdown_started(&mut rx) => {}
            }
        }
    }

    /// Resolves once shutdown has begun, without listening for signals itself.
    pub fn shutting_down(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state.subscribe();
        async move {
            shutdown_started(&mut rx).await;
        }
    }

    /// Resolves once the grace period after the start of shutdown has elapsed.
    pub fn grace_elapsed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state.subscribe();
        let grace = self.grace;
        async move {
            if shutdown_started(&mut rx).await {
                tokio::time::sleep(grace).await;
            }
        }
    }

    /// Drive a server future until it finishes or the grace period runs out.
    ///
    /// Running past the grace period is logged and reported as
    /// [`ShutdownOutcome::Forced`]; it is not treated as an error.
    pub async fn run<S, E>(&self, server: S) -> Result<ShutdownOutcome, E>
    where
        S: IntoFuture<Output = Result<(), E>>,
    {
        let outcome = tokio::select! {
            result = server.into_future() => {
                result?;
                ShutdownOutcome::Graceful
            }
            _ = self.grace_elapsed() => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    "Grace period elapsed with requests still in flight, forcing shutdown"
                );
                ShutdownOutcome::Forced
            }
        };

        self.state.send_replace(ShutdownState::Stopped);
        Ok(outcome)
    }
}

/// Wait for the state to leave `Running`. `false` if the coordinator is gone.
async fn shutdown_started(rx: &mut watch::Receiver<ShutdownState>) -> bool {
    let started = rx
        .wait_for(|state| *state != ShutdownState::Running)
        .await
        .is_ok();
    started
}

async fn os_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
