//! Bounded pool of connection workers.
//!
//! Each worker listens on its own bounded mpsc channel and handles one
//! connection at a time. Work is distributed round-robin, and the pool
//! supports coordinated shutdown via a shared [`CancellationToken`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// How long shutdown waits per worker for an acknowledgement.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Unit of work handed to a connection worker.
#[derive(Debug)]
pub(crate) enum WorkRequest {
    /// Handle one accepted connection end-to-end.
    Connection(TcpStream),
    /// Stop the worker. Acked just before the worker exits.
    Shutdown { ack: oneshot::Sender<()> },
}

/// A cooperative pool of connection workers.
///
/// Channels are bounded at one pending connection per worker, so a saturated
/// pool blocks the dispatcher (the accept loop) rather than growing a
/// backlog or stalling the recording path.
pub(crate) struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    /// Constructs a pool from initialized worker channels and the shared
    /// cancellation token.
    pub(crate) const fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
        }
    }

    /// Index of the next worker to receive work (round-robin).
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Sends an accepted connection to the next worker in the pool, waiting
    /// if that worker is busy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun, and
    /// [`Error::Channel`] if the worker's channel is closed.
    pub(crate) async fn dispatch(&self, stream: TcpStream) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let worker_idx = self.next_worker_index();
        self.workers[worker_idx]
            .send(WorkRequest::Connection(stream))
            .await
            .map_err(|_| Error::Channel {
                context: format!("worker {worker_idx} channel closed"),
            })
    }

    /// Stops all workers.
    ///
    /// Cancels the shared token so no further work is dispatched, then asks
    /// each worker to exit and waits briefly for acknowledgements. In-flight
    /// connections are not waited on beyond the ack window; a worker that
    /// misses the window is logged, not retried.
    pub(crate) async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let mut acks = Vec::with_capacity(self.workers.len());
        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if worker.send(WorkRequest::Shutdown { ack: tx }).await.is_err() {
                tracing::error!("failed to send shutdown to worker {i}");
            } else {
                acks.push((i, rx));
            }
        }

        let waits = acks.into_iter().map(|(i, rx)| async move {
            match timeout(WORKER_ACK_TIMEOUT, rx).await {
                Ok(Ok(())) => tracing::trace!("worker {i} shutdown acknowledged"),
                Ok(Err(_)) => tracing::warn!("worker {i} exited without acknowledging shutdown"),
                Err(_) => tracing::warn!("worker {i} shutdown timed out"),
            }
        });
        futures::future::join_all(waits).await;

        tracing::debug!("worker pool shutdown complete");
    }
}
