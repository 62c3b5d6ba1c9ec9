//! Server lifecycle: startup, request dispatch, and idempotent shutdown.
//!
//! A [`Server`] moves through four states: starting (load the persisted
//! counter, spawn the log writer, bind the listener, spawn the workers and
//! the accept loop), running (accepted connections are dispatched to the
//! pool), draining, and stopped. Shutdown may be triggered from more than
//! one path (an explicit call and a termination-signal handler both land in
//! [`Server::shutdown`]) and converges on one guarded teardown routine.

mod pool;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::counter::RequestCounter;
use crate::error::{Error, Result};
use crate::log::AccessLogPipeline;

use pool::WorkerPool;
use worker::worker_loop;

/// A running request-counting server.
///
/// Owns the counter, the ordered log pipeline, and the accept and worker
/// tasks. Nothing here is global: multiple instances with their own ports
/// and files can coexist in one process, which the functional tests use.
pub struct Server {
    config: ServerConfig,
    counter: Arc<RequestCounter>,
    pipeline: Arc<AccessLogPipeline>,
    pool: Arc<WorkerPool>,
    local_addr: SocketAddr,
    shutdown_token: CancellationToken,
    stopped: AtomicBool,
}

impl Server {
    /// Starts a server: loads the persisted counter, spawns the log writer,
    /// binds the listening socket, and begins accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero-sized worker pool and
    /// [`Error::Bind`] when the listening socket cannot be bound; these are
    /// the only startup-fatal conditions. No partially-started server is
    /// left running on failure: the writer task exits once its queue handle
    /// drops.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        if config.max_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "max_workers must be at least 1".into(),
            });
        }

        let counter = Arc::new(RequestCounter::load(&config.counter_path));
        let pipeline = Arc::new(AccessLogPipeline::spawn(
            Arc::clone(&counter),
            config.access_log_path.clone(),
        ));

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(bind_addr).await.map_err(|source| Error::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        let shutdown_token = CancellationToken::new();

        let mut workers = Vec::with_capacity(config.max_workers);
        for worker_id in 0..config.max_workers {
            // At most one queued connection per worker: a saturated pool
            // makes the accept loop wait instead of growing a backlog.
            let (tx, rx) = mpsc::channel(1);
            workers.push(tx);
            tokio::spawn(worker_loop(worker_id, rx, Arc::clone(&pipeline)));
        }
        let pool = Arc::new(WorkerPool::new(workers, shutdown_token.clone()));

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&pool),
            shutdown_token.clone(),
        ));

        tracing::info!(
            addr = %local_addr,
            workers = config.max_workers,
            "server accepting connections"
        );

        Ok(Self {
            config,
            counter,
            pipeline,
            pool,
            local_addr,
            shutdown_token,
            stopped: AtomicBool::new(false),
        })
    }

    /// The address the listener is bound to. Useful when the configured port
    /// was 0 and the OS picked one.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of requests recorded so far by this instance.
    pub fn request_count(&self) -> u64 {
        self.counter.current()
    }

    /// Stops the server: stop accepting, persist the counter, flush and
    /// close the access log, stop the workers.
    ///
    /// Idempotent: an explicit stop call and a termination-signal handler
    /// may both invoke this; only the first caller performs the teardown and
    /// persistence happens exactly once. Each sub-step is best-effort: a
    /// failing step is logged and the remaining steps still run.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("server shutting down");

        // Stop accepting: the accept loop observes the cancellation and
        // drops the listener, releasing the socket.
        self.shutdown_token.cancel();

        if let Err(e) = self.counter.persist(&self.config.counter_path) {
            tracing::warn!(
                path = %self.config.counter_path.display(),
                error = %e,
                "could not persist request count, count will start from 0 upon re-initialization"
            );
        }

        if let Err(e) = self.pipeline.shutdown().await {
            tracing::warn!(error = %e, "could not flush access logs during shutdown");
        }

        // In-flight connections are not waited on beyond the pool's ack
        // window.
        self.pool.shutdown().await;

        tracing::info!("server shut down");
    }
}

/// Dedicated accept task.
///
/// Runs until the shutdown token fires or the listener is exhausted.
/// Accepted connections are handed to the worker pool, which may block this
/// loop, and only this loop, when every worker is busy. Individual accept
/// failures are logged and accepting continues.
async fn accept_loop(
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
) {
    let mut incoming = TcpListenerStream::new(listener);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::debug!("accept loop stopping");
                break;
            }
            conn = incoming.next() => match conn {
                Some(Ok(stream)) => match pool.dispatch(stream).await {
                    Ok(()) => {}
                    Err(Error::ServiceShutdown) => break,
                    Err(e) => tracing::warn!(error = %e, "could not dispatch connection"),
                },
                Some(Err(e)) => tracing::warn!(error = %e, "error accepting connection"),
                None => break,
            },
        }
    }
    // The listener inside `incoming` drops here, releasing the socket.
}
