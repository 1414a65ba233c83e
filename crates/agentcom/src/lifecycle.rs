//! Lifecycle coordinator for the gRPC and HTTP listeners
//!
//! Both listeners are bound up front, then served as independent tasks
//! sharing one [`CancellationToken`]. A supervisor waits for whichever comes
//! first: either listener exiting, an external termination signal, or
//! [`Completion::shutdown`]. It then cancels the token, gives each remaining
//! listener up to the grace period to drain, and reports exactly once.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthGate;
use crate::config::AgentComConfig;
use crate::director::DirectorService;
use crate::readback::ReadBack;
use crate::store::SnapshotStore;
use crate::{AgentComError, Result};

type ListenerTask = JoinHandle<Result<()>>;

/// Why the service stopped cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT, SIGTERM or the caller-supplied termination future
    Signal,
    /// [`Completion::shutdown`] was called
    Requested,
}

/// Owns the store and starts both listeners
pub struct AgentCom {
    config: AgentComConfig,
    store: Arc<SnapshotStore>,
}

impl AgentCom {
    /// Create the service with an empty store
    pub fn new(config: AgentComConfig) -> Self {
        let store = Arc::new(SnapshotStore::new(config.snapshot_path.clone()));
        Self { config, store }
    }

    pub fn config(&self) -> &AgentComConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    /// Start both listeners, stopping on SIGINT or SIGTERM
    pub async fn start(self) -> Result<Completion> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Start both listeners, stopping when `signal` resolves
    pub async fn start_with_shutdown<F>(self, signal: F) -> Result<Completion>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let rpc_listener = bind("grpc", self.config.rpc_addr()?).await?;
        let http_listener = bind("http", self.config.http_addr()?).await?;
        let rpc_addr = rpc_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        let token = CancellationToken::new();
        let requested = CancellationToken::new();

        let service = DirectorService::new(
            self.store.clone(),
            AuthGate::new(&self.config.api_key_header),
        )
        .with_max_snapshot_bytes(self.config.max_snapshot_bytes);
        let router = ReadBack::new(self.store.clone()).build_router();

        tracing::info!(%rpc_addr, "Starting gRPC agentcom");
        let rpc = tokio::spawn(serve_rpc(service, rpc_listener, token.clone()));

        tracing::info!(%http_addr, "Starting http server");
        let http = tokio::spawn(serve_http(router, http_listener, token.clone()));

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(supervise(
            rpc,
            http,
            signal,
            requested.clone(),
            token,
            self.config.shutdown_grace(),
            done_tx,
        ));

        Ok(Completion {
            rpc_addr,
            http_addr,
            requested,
            done: done_rx,
        })
    }
}

/// Handle on a running service; resolves once both listeners have stopped
pub struct Completion {
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
    requested: CancellationToken,
    done: oneshot::Receiver<Result<ShutdownReason>>,
}

impl Completion {
    /// Bound gRPC address
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// Bound HTTP address
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Trigger the same coordinated shutdown a signal would
    pub fn shutdown(&self) {
        self.requested.cancel();
    }

    /// Wait for both listeners to stop.
    ///
    /// Returns the [`ShutdownReason`] for a clean stop, or the first
    /// listener failure after the other listener has been drained.
    pub async fn wait(self) -> Result<ShutdownReason> {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentComError::Internal(
                "supervisor exited without reporting".to_string(),
            )),
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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

async fn bind(listener: &'static str, addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| AgentComError::Bind {
            listener,
            addr,
            source,
        })
}

async fn serve_rpc(
    service: DirectorService,
    listener: TcpListener,
    token: CancellationToken,
) -> Result<()> {
    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            token.cancelled().await
        })
        .await
        .map_err(|e| AgentComError::Listener {
            listener: "grpc",
            message: e.to_string(),
        })
}

async fn serve_http(
    router: axum::Router,
    listener: TcpListener,
    token: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| AgentComError::Listener {
            listener: "http",
            message: e.to_string(),
        })
}

/// Turn an early listener exit into the error that ends the service
fn listener_exit(
    listener: &'static str,
    joined: std::result::Result<Result<()>, JoinError>,
) -> AgentComError {
    match joined {
        Ok(Err(e)) => e,
        Ok(Ok(())) => AgentComError::Listener {
            listener,
            message: "stopped unexpectedly".to_string(),
        },
        Err(e) => AgentComError::Listener {
            listener,
            message: e.to_string(),
        },
    }
}

async fn supervise<F>(
    mut rpc: ListenerTask,
    mut http: ListenerTask,
    signal: F,
    requested: CancellationToken,
    token: CancellationToken,
    grace: Duration,
    done: oneshot::Sender<Result<ShutdownReason>>,
) where
    F: Future<Output = ()> + Send,
{
    let mut rpc_running = true;
    let mut http_running = true;

    let outcome = tokio::select! {
        joined = &mut rpc => {
            rpc_running = false;
            Err(listener_exit("grpc", joined))
        }
        joined = &mut http => {
            http_running = false;
            Err(listener_exit("http", joined))
        }
        _ = signal => {
            tracing::info!("Received shutdown");
            Ok(ShutdownReason::Signal)
        }
        _ = requested.cancelled() => {
            tracing::info!("Shutdown requested");
            Ok(ShutdownReason::Requested)
        }
    };

    if let Err(e) = &outcome {
        tracing::error!("{}, shutting down", e);
    }

    token.cancel();
    tokio::join!(
        drain("grpc", rpc_running.then_some(rpc), grace),
        drain("http", http_running.then_some(http), grace)
    );

    tracing::info!("All listeners stopped");
    let _ = done.send(outcome);
}

/// Wait up to `grace` for a cancelled listener, aborting it on overrun
async fn drain(listener: &'static str, task: Option<ListenerTask>, grace: Duration) {
    let Some(mut task) = task else {
        return;
    };

    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(Ok(()))) => tracing::info!(listener, "Listener stopped"),
        Ok(Ok(Err(e))) => tracing::warn!(listener, "Listener failed while stopping: {}", e),
        Ok(Err(e)) => tracing::warn!(listener, "Listener task failed: {}", e),
        Err(_) => {
            tracing::warn!(listener, ?grace, "Listener did not stop in time, aborting");
            task.abort();
        }
    }
}
