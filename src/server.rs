//! HTTP/1 connection serving
//!
//! A plain accept loop over hyper's `http1` connection builder. Every
//! connection gets a header read timeout from hyper's timer and an idle
//! timer of its own that closes keep-alive connections which have had no
//! request in flight for `idle_timeout_secs`. On shutdown the listener is
//! dropped and each open connection finishes its current response first.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::{pin, Pin};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{body::Body, extract::ConnectInfo, http::Request, Router};
use bytes::Bytes;
use hyper::{
    body::{Body as HttpBody, Frame, Incoming, SizeHint},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tower::ServiceExt;

use crate::config::ServerSection;
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome};

#[derive(Debug, Clone, Copy)]
struct ConnectionTimeouts {
    header_read: Duration,
    idle: Duration,
}

/// Serve the router until shutdown completes or its grace period runs out.
///
/// New connections stop being accepted as soon as shutdown starts, and open
/// keep-alive connections are closed after their current response. Past the
/// grace period the remaining connections are dropped.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    server: &ServerSection,
    shutdown: &ShutdownCoordinator,
) -> std::io::Result<ShutdownOutcome> {
    let timeouts = ConnectionTimeouts {
        header_read: server.read_timeout(),
        idle: server.idle_timeout(),
    };
    shutdown
        .run(accept_loop(listener, router, timeouts, shutdown.clone()))
        .await
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    timeouts: ConnectionTimeouts,
    shutdown: ShutdownCoordinator,
) -> std::io::Result<()> {
    let mut connections = JoinSet::new();
    let mut signalled = pin!(shutdown.signalled());

    loop {
        tokio::select! {
            _ = &mut signalled => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote,
                        router.clone(),
                        timeouts,
                        shutdown.clone(),
                    ));
                }
                Err(err) => {
                    // Usually descriptor exhaustion; back off instead of spinning.
                    tracing::warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    tracing::debug!(open = connections.len(), "Stopped accepting connections");
    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    router: Router,
    timeouts: ConnectionTimeouts,
    shutdown: ShutdownCoordinator,
) {
    let activity = Arc::new(ConnectionActivity::default());

    let tracker = activity.clone();
    let service = service_fn(move |request: Request<Incoming>| {
        let guard = tracker.begin();
        let router = router.clone();
        let mut request = request.map(Body::new);
        request.extensions_mut().insert(ConnectInfo(remote));

        async move {
            let response = router.oneshot(request).await?;
            Ok::<_, Infallible>(response.map(|inner| {
                Body::new(TrackedBody {
                    inner,
                    _guard: guard,
                })
            }))
        }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.header_read);
    let mut connection = pin!(builder.serve_connection(TokioIo::new(stream), service));

    let mut idle = pin!(activity.idle_for(timeouts.idle));
    let mut stopping = pin!(shutdown.shutting_down());
    let mut closing = false;

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(%remote, error = %err, "Connection closed with error");
                }
                break;
            }
            _ = &mut idle, if !closing => {
                tracing::debug!(%remote, "Closing idle connection");
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
            _ = &mut stopping, if !closing => {
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
        }
    }
}

/// Requests in flight on one connection
#[derive(Default)]
struct ConnectionActivity {
    in_flight: AtomicUsize,
    changed: Notify,
}

impl ConnectionActivity {
    fn begin(self: &Arc<Self>) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.changed.notify_waiters();
        RequestGuard(self.clone())
    }

    /// Resolves once no request has been in flight for `idle`.
    async fn idle_for(&self, idle: Duration) {
        loop {
            let mut changed = pin!(self.changed.notified());
            changed.as_mut().enable();

            if self.in_flight.load(Ordering::Acquire) > 0 {
                changed.await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(idle) => return,
                _ = changed => {}
            }
        }
    }
}

/// Held until the response body has been fully written or dropped
struct RequestGuard(Arc<ConnectionActivity>);

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.0.changed.notify_waiters();
    }
}

struct TrackedBody {
    inner: Body,
    _guard: RequestGuard,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_waits_for_in_flight_requests() {
        let activity = Arc::new(ConnectionActivity::default());
        let guard = activity.begin();

        let idle = tokio::time::timeout(
            Duration::from_secs(60),
            activity.idle_for(Duration::from_secs(1)),
        )
        .await;
        assert!(idle.is_err());

        drop(guard);
        let started = tokio::time::Instant::now();
        activity.idle_for(Duration::from_secs(1)).await;
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_restarts_idle_timer() {
        let activity = Arc::new(ConnectionActivity::default());
        let started = tokio::time::Instant::now();

        let tracker = activity.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(800)).await;
            drop(tracker.begin());
        });

        activity.idle_for(Duration::from_secs(1)).await;
        assert!(started.elapsed() >= Duration::from_millis(1800));
    }
}
