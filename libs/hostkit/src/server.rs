//! Ephemeral static-file server.
//!
//! Serves one directory tree over HTTP for the duration of a test run.
//! The accept loop runs on a background tokio task; the caller blocks on a
//! one-shot readiness signal with a bounded wait, so a slow or failed
//! startup never wedges the caller. Shutdown is immediate (no drain) and
//! idempotent.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{ReadySignal, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyStarted,
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server did not become ready within {timeout:?}")]
    StartupTimeout { timeout: Duration },
    #[error("server task exited before signaling readiness")]
    Exited,
}

/// One static-file server session.
///
/// A session is single-use: `NotStarted → Starting → Running → Stopped`,
/// at most one `Running` phase. The orchestrator owns it exclusively and
/// tears it down with [`close`](Self::close) once the test run finishes.
pub struct StaticServer {
    addr: SocketAddr,
    doc_root: PathBuf,
    running: Arc<AtomicBool>,
    state: Mutex<SessionState>,
    cancel: Mutex<Option<CancellationToken>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl StaticServer {
    /// A session serving `doc_root` on loopback at `port`. Port 0 asks the
    /// OS for a free port; the bound address is available from
    /// [`local_addr`](Self::local_addr) once the server is running.
    pub fn new(port: u16, doc_root: impl Into<PathBuf>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            doc_root: doc_root.into(),
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(SessionState::NotStarted),
            cancel: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Launch the accept loop and wait for it to become ready.
    ///
    /// Returns once the listener is bound and accepting connections. A
    /// startup failure (e.g. the port is already in use) is re-raised here
    /// with the original I/O cause preserved. When `timeout` elapses
    /// without a readiness signal the wait is abandoned; the background
    /// task may still be starting, so the caller should [`close`](Self::close)
    /// the session rather than reuse it.
    pub async fn start(&self, timeout: Duration) -> Result<(), ServerError> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::NotStarted {
                return Err(ServerError::AlreadyStarted);
            }
            *state = SessionState::Starting;
        }

        let (ready, ready_rx) = ReadySignal::channel();
        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        tokio::spawn(accept_loop(
            self.addr,
            self.doc_root.clone(),
            Arc::clone(&self.running),
            cancel,
            ready,
        ));

        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(bound))) => {
                *self.local_addr.lock() = Some(bound);
                *self.state.lock() = SessionState::Running;
                Ok(())
            }
            Ok(Ok(Err(err))) => {
                *self.state.lock() = SessionState::Stopped;
                Err(err)
            }
            Ok(Err(_recv)) => {
                *self.state.lock() = SessionState::Stopped;
                Err(ServerError::Exited)
            }
            // State stays Starting so close() still finds the handle.
            Err(_elapsed) => Err(ServerError::StartupTimeout { timeout }),
        }
    }

    /// Whether the session is currently serving. Never blocks; valid in
    /// every lifecycle state, including before `start`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The address actually bound, once the session reached `Running`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// The directory served under the root path.
    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    /// Request immediate shutdown: the accept loop is dropped without
    /// waiting for in-flight connections. No-op when the session was never
    /// started or is already stopped; safe to call repeatedly.
    pub fn close(&self) {
        let taken = self.cancel.lock().take();
        let Some(cancel) = taken else {
            return;
        };
        cancel.cancel();
        self.running.store(false, Ordering::SeqCst);
        *self.state.lock() = SessionState::Stopped;
        tracing::info!(addr = %self.addr, "static file server closed");
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.close();
    }
}

type ReadyOutcome = Result<SocketAddr, ServerError>;

/// Background half of the session: bind, signal readiness, serve until
/// cancelled. Cancellation drops the serve future (and with it the
/// listener), so the port is released without draining connections.
async fn accept_loop(
    addr: SocketAddr,
    doc_root: PathBuf,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    ready: ReadySignal<ReadyOutcome>,
) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            ready.notify(Err(ServerError::Bind { addr, source }));
            return;
        }
    };
    let bound = match listener.local_addr() {
        Ok(bound) => bound,
        Err(source) => {
            ready.notify(Err(ServerError::Bind { addr, source }));
            return;
        }
    };

    let app = Router::new()
        .fallback_service(ServeDir::new(&doc_root))
        .layer(TraceLayer::new_for_http());

    // Bound and accepting: only now is the session "ready".
    running.store(true, Ordering::SeqCst);
    if !ready.notify(Ok(bound)) {
        tracing::debug!(addr = %bound, "readiness observer gone before startup completed");
    }
    tracing::info!(addr = %bound, root = %doc_root.display(), "static file server ready");

    tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!(addr = %bound, "static file server cancelled");
        }
        result = axum::serve(listener, app).into_future() => {
            if let Err(error) = result {
                tracing::error!(%error, "static file server failed");
            }
        }
    }
    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const STARTUP: Duration = Duration::from_secs(5);

    fn doc_root_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn serves_exact_file_contents_once_ready() {
        let root = doc_root_with(&[("index.html", "Hello from the harness!")]);
        let server = StaticServer::new(0, root.path());

        server.start(STARTUP).await.expect("server should start");
        assert!(server.is_running());
        assert_eq!(server.state(), SessionState::Running);

        let addr = server.local_addr().expect("bound address should be recorded");
        let body = reqwest::get(format!("http://{addr}/index.html"))
            .await
            .expect("request should succeed")
            .text()
            .await
            .expect("body should be readable");
        assert_eq!(body, "Hello from the harness!");

        server.close();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn not_running_before_start() {
        let root = doc_root_with(&[]);
        let server = StaticServer::new(0, root.path());
        assert!(!server.is_running());
        assert_eq!(server.state(), SessionState::NotStarted);
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn bind_conflict_preserves_the_cause() {
        let root = doc_root_with(&[]);

        // Occupy a port first, then ask the session for the same one.
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let server = StaticServer::new(port, root.path());
        let err = server.start(STARTUP).await.unwrap_err();
        match err {
            ServerError::Bind { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            other => panic!("expected Bind, got {other:?}"),
        }
        assert!(!server.is_running());
        assert_eq!(server.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let root = doc_root_with(&[]);
        let server = StaticServer::new(0, root.path());

        server.start(STARTUP).await.expect("first start should succeed");
        let err = server.start(STARTUP).await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyStarted));

        server.close();
    }

    #[tokio::test]
    async fn close_without_start_is_a_no_op() {
        let root = doc_root_with(&[]);
        let server = StaticServer::new(0, root.path());

        server.close();
        server.close();
        assert!(!server.is_running());
        assert_eq!(server.state(), SessionState::NotStarted);
    }

    #[tokio::test]
    async fn repeated_close_is_safe_and_releases_the_port() {
        let root = doc_root_with(&[("index.html", "x")]);
        let server = StaticServer::new(0, root.path());

        server.start(STARTUP).await.expect("server should start");
        let addr = server.local_addr().unwrap();

        server.close();
        server.close();
        server.close();
        assert!(!server.is_running());
        assert_eq!(server.state(), SessionState::Stopped);

        // The accept loop drops the listener asynchronously; poll until the
        // port can be bound again.
        let mut rebound = None;
        for _ in 0..40 {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    rebound = Some(listener);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
        assert!(rebound.is_some(), "port should be released after close");
    }
}
