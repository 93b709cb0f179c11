//! Stdio mode: HTTP listener on a background thread, JSON-RPC loop on the
//! calling thread, tool calls looped back over HTTP.
//!
//! The two halves only talk through a readiness signal (listener to bridge,
//! carrying the bound address or the bind error) and a shutdown signal
//! (bridge to listener).

use std::{
    io::{self, BufRead, BufReader, Write},
    net::SocketAddr,
    sync::mpsc::{self, RecvTimeoutError, TryRecvError},
    thread,
    time::Duration,
};

use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot};

use weather_core::ServiceConfig;

use crate::{
    backend::LoopbackBackend,
    http::{self, AppState},
    rpc::RpcServer,
};

/// How long to wait for in-flight HTTP requests after the RPC loop ends.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start HTTP listener on {addr}: {source}")]
    Startup {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP listener thread exited before reporting readiness")]
    ListenerGone,

    #[error("failed to spawn HTTP listener thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Rpc(#[from] anyhow::Error),
}

/// Handle on the background HTTP listener.
#[derive(Debug)]
pub struct HttpListener {
    bind_addr: String,
    ready: mpsc::Receiver<io::Result<SocketAddr>>,
    shutdown: Option<oneshot::Sender<()>>,
    stopped: mpsc::Receiver<()>,
}

impl HttpListener {
    /// Start the listener thread. The thread is detached; it never keeps
    /// the process alive on its own.
    pub fn spawn(bind_addr: String, state: AppState) -> Result<Self, BridgeError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (stopped_tx, stopped_rx) = mpsc::channel();

        let addr = bind_addr.clone();
        thread::Builder::new()
            .name("http-listener".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to build HTTP listener runtime");
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let listener = match TcpListener::bind(&addr).await {
                        Ok(listener) => listener,
                        Err(e) => {
                            tracing::error!(%addr, error = %e, "failed to bind HTTP listener");
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let local = match listener.local_addr() {
                        Ok(local) => local,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to read HTTP listener address");
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    tracing::info!(%local, "HTTP listener ready");
                    let _ = ready_tx.send(Ok(local));

                    let shutdown = async {
                        let _ = shutdown_rx.await;
                    };
                    if let Err(e) = http::serve(listener, state, shutdown).await {
                        tracing::error!(error = %e, "HTTP listener failed");
                    }
                });

                tracing::info!("HTTP listener stopped");
                let _ = stopped_tx.send(());
            })
            .map_err(BridgeError::Spawn)?;

        Ok(Self {
            bind_addr,
            ready: ready_rx,
            shutdown: Some(shutdown_tx),
            stopped: stopped_rx,
        })
    }

    /// Wait up to `timeout` for the listener to bind. `Ok(None)` means it
    /// did not report in time.
    pub fn wait_ready(&self, timeout: Duration) -> Result<Option<SocketAddr>, BridgeError> {
        match self.ready.recv_timeout(timeout) {
            Ok(Ok(addr)) => Ok(Some(addr)),
            Ok(Err(source)) => Err(BridgeError::Startup {
                addr: self.bind_addr.clone(),
                source,
            }),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::ListenerGone),
        }
    }

    /// Non-blocking readiness check for a listener that missed the startup
    /// wait. `Ok(true)` once it has reported a bound address.
    pub fn poll_ready(&self) -> Result<bool, BridgeError> {
        match self.ready.try_recv() {
            Ok(Ok(addr)) => {
                tracing::info!(%addr, "HTTP listener ready after startup wait");
                Ok(true)
            }
            Ok(Err(source)) => Err(BridgeError::Startup {
                addr: self.bind_addr.clone(),
                source,
            }),
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(BridgeError::ListenerGone),
        }
    }

    /// Ask the listener to stop and wait at most `grace` for it to finish.
    pub fn shutdown(mut self, grace: Duration) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if self.stopped.recv_timeout(grace).is_err() {
            tracing::warn!(?grace, "HTTP listener did not stop in time");
        }
    }
}

/// Runs the listener and the JSON-RPC loop together.
#[derive(Debug, Clone)]
pub struct Bridge {
    config: ServiceConfig,
}

impl Bridge {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Serve JSON-RPC on stdin/stdout until stdin closes.
    pub fn run_stdio(&self, state: AppState) -> Result<(), BridgeError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(state, BufReader::new(stdin.lock()), stdout.lock())
    }

    /// A listener that fails to start is fatal. Within the startup wait
    /// nothing is written to `writer`; a later failure stops the loop
    /// before the next request.
    pub fn run<R: BufRead, W: Write>(
        &self,
        state: AppState,
        reader: R,
        writer: W,
    ) -> Result<(), BridgeError> {
        let bind_addr = self.config.bind_addr();
        let listener = HttpListener::spawn(bind_addr.clone(), state)?;

        let ready = listener.wait_ready(self.config.startup_wait)?;
        let mut pending = ready.is_none();

        let backend = match ready {
            Some(addr) => LoopbackBackend::for_addr(addr),
            None => {
                tracing::warn!(
                    wait = ?self.config.startup_wait,
                    %bind_addr,
                    "HTTP listener not ready in time, continuing"
                );
                match bind_addr.parse::<SocketAddr>() {
                    Ok(addr) => LoopbackBackend::for_addr(addr),
                    Err(_) => LoopbackBackend::new(format!("http://{bind_addr}")),
                }
            }
        }
        .map_err(|e| BridgeError::Rpc(e.into()))?;

        tracing::info!(backend = backend.base_url(), "starting JSON-RPC loop");
        let outcome = RpcServer::new(backend)
            .run_until(reader, writer, || {
                if pending {
                    pending = !listener.poll_ready()?;
                }
                Ok(())
            })
            .map_err(|e| match e.downcast::<BridgeError>() {
                Ok(bridge) => bridge,
                Err(other) => BridgeError::Rpc(other),
            });

        // a listener still starting at EOF gets one grace period to fail
        let outcome = match outcome {
            Ok(()) if pending => listener.wait_ready(SHUTDOWN_GRACE).map(|_| ()),
            other => other,
        };

        if let Err(e) = &outcome {
            tracing::error!(error = %e, "stdio bridge failed");
        }

        listener.shutdown(SHUTDOWN_GRACE);
        outcome
    }
}
