//! Connection worker task.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::log::{AccessLogPipeline, ConnectionInfo};

use super::pool::WorkRequest;

/// First part of the single response line sent to every client.
const RESPONSE_PREFIX: &str = "Number of prior requests at the time of this connection: ";

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// Runs until a shutdown request arrives or the channel closes. Every
/// connection is handled to completion before the next one is received,
/// which is what bounds server-wide parallelism to the pool size.
pub(crate) async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    pipeline: Arc<AccessLogPipeline>,
) {
    tracing::trace!("worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Connection(stream) => {
                handle_connection(worker_id, stream, &pipeline).await;
            }
            WorkRequest::Shutdown { ack } => {
                tracing::debug!("worker {worker_id} received shutdown signal");
                if ack.send(()).is_err() {
                    tracing::error!("worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("worker {worker_id} stopped");
}

/// Records the request, responds with the assigned count, and closes the
/// connection.
///
/// I/O failures are contained here: a client that disappears mid-response
/// costs nothing but a warning, and never affects the counter value or other
/// in-flight connections.
async fn handle_connection(worker_id: usize, mut stream: TcpStream, pipeline: &AccessLogPipeline) {
    let conn = match ConnectionInfo::from_stream(&stream) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "worker {worker_id} could not resolve connection addresses"
            );
            return;
        }
    };

    // The log entry is queued the moment the request is recorded; the
    // response only has to carry the returned count.
    let previous_count = pipeline.record(&conn);

    let response = format!("{RESPONSE_PREFIX}{previous_count}\n");
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::warn!(
            error = %e,
            "worker {worker_id} failed to return response data to client"
        );
        return;
    }
    if let Err(e) = stream.shutdown().await {
        tracing::warn!(
            error = %e,
            "worker {worker_id} failed to close client connection"
        );
    }
}
