//! The producer side of the ordered log pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::counter::RequestCounter;
use crate::error::{Error, Result};

use super::entry::{AccessLogEntry, ConnectionInfo};
use super::writer::{LogCommand, writer_loop};

/// How long [`AccessLogPipeline::shutdown`] waits for the writer to drain
/// and flush before giving up.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

/// Couples sequence-number assignment with access-log enqueueing.
///
/// Incrementing the counter and enqueueing the rendered entry happen under
/// one critical section, so the request that takes the lock first gets both
/// the lower sequence number and the earlier queue position. Individually
/// atomic but uncoupled operations would let two workers interleave and put
/// the higher number into the queue first.
///
/// The pipeline is single-use: one instance per server lifetime. Once shut
/// down, the writer never reopens the file.
pub struct AccessLogPipeline {
    counter: Arc<RequestCounter>,
    /// Producer handle of the log queue. Holding this lock is what makes
    /// "increment" and "enqueue" one atomic step.
    queue: Mutex<mpsc::UnboundedSender<LogCommand>>,
    stopped: AtomicBool,
}

impl AccessLogPipeline {
    /// Creates the log queue and spawns the single writer task.
    ///
    /// Must be called from within a Tokio runtime. If the writer cannot open
    /// `access_log_path` it logs the failure and drops entries; recording
    /// and counting keep working.
    pub fn spawn(counter: Arc<RequestCounter>, access_log_path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(access_log_path, rx));
        Self {
            counter,
            queue: Mutex::new(tx),
            stopped: AtomicBool::new(false),
        }
    }

    /// Assigns the next sequence number to `conn` and queues its access-log
    /// entry, returning the number of requests recorded before this one.
    ///
    /// Never blocks on I/O: the critical section covers only the in-memory
    /// increment and queue insertion. The entry reaches the file later, in
    /// sequence order, via the writer task; callers must not wait for that.
    pub fn record(&self, conn: &ConnectionInfo) -> u64 {
        // Render the skeleton (addresses, timestamp) before taking the lock.
        let entry = AccessLogEntry::begin(conn);

        let queue = self.queue.lock();
        let previous_count = self.counter.next();
        let entry = entry.assign(previous_count);
        if queue.send(LogCommand::Append(entry)).is_err() {
            // Writer already stopped; counting continues, the entry is lost.
            tracing::debug!(
                sequence = previous_count,
                "log writer stopped, access log entry dropped"
            );
        }
        previous_count
    }

    /// Drains the queue, flushes the writer, and closes the log file.
    ///
    /// Idempotent: the first call performs the flush, every later call is a
    /// no-op returning `Ok`. Entries recorded before this call are on disk
    /// when it returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the writer is gone or does not
    /// acknowledge within [`FLUSH_TIMEOUT`]. Callers treat this as a
    /// warning-level condition during shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.queue
            .lock()
            .send(LogCommand::Shutdown { ack: ack_tx })
            .map_err(|_| Error::Channel {
                context: "log writer stopped before shutdown".into(),
            })?;

        match timeout(FLUSH_TIMEOUT, ack_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Channel {
                context: "log writer exited without acknowledging shutdown".into(),
            }),
            Err(_) => Err(Error::Channel {
                context: "timed out waiting for the log writer to flush".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn conn() -> ConnectionInfo {
        ConnectionInfo {
            remote: "10.0.0.1:40000".parse().expect("remote addr"),
            local: "127.0.0.1:8189".parse().expect("local addr"),
        }
    }

    fn trailing_numbers(contents: &str) -> Vec<u64> {
        contents
            .lines()
            .map(|line| {
                line.rsplit(' ')
                    .next()
                    .expect("trailing field")
                    .parse()
                    .expect("numeric trailing field")
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_reach_the_file_in_sequence_order() {
        const TASKS: usize = 16;
        const RECORDS: usize = 64;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("access.log");
        let counter = Arc::new(RequestCounter::new(0));
        let pipeline = Arc::new(AccessLogPipeline::spawn(Arc::clone(&counter), path.clone()));

        let mut handles = Vec::with_capacity(TASKS);
        for _ in 0..TASKS {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                let conn = conn();
                for _ in 0..RECORDS {
                    pipeline.record(&conn);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("recording task");
        }

        pipeline.shutdown().await.expect("pipeline shutdown");

        let contents = fs::read_to_string(&path).expect("read access log");
        let expected: Vec<u64> = (0..(TASKS * RECORDS) as u64).collect();
        assert_eq!(trailing_numbers(&contents), expected);
        assert_eq!(counter.current(), (TASKS * RECORDS) as u64);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_returns_pre_increment_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = Arc::new(RequestCounter::new(5));
        let pipeline = AccessLogPipeline::spawn(counter, dir.path().join("access.log"));

        assert_eq!(pipeline.record(&conn()), 5);
        assert_eq!(pipeline.record(&conn()), 6);

        pipeline.shutdown().await.expect("pipeline shutdown");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_twice_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("access.log");
        let counter = Arc::new(RequestCounter::new(0));
        let pipeline = AccessLogPipeline::spawn(counter, path.clone());

        pipeline.record(&conn());
        pipeline.shutdown().await.expect("first shutdown");
        let after_first = fs::read_to_string(&path).expect("read access log");

        pipeline.shutdown().await.expect("second shutdown");
        let after_second = fs::read_to_string(&path).expect("read access log");

        assert_eq!(after_first, after_second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recording_after_shutdown_keeps_counting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = Arc::new(RequestCounter::new(0));
        let pipeline = AccessLogPipeline::spawn(Arc::clone(&counter), dir.path().join("access.log"));

        pipeline.record(&conn());
        pipeline.shutdown().await.expect("pipeline shutdown");

        // The writer is gone; the sequence must still advance correctly.
        assert_eq!(pipeline.record(&conn()), 1);
        assert_eq!(counter.current(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn log_lines_append_across_pipeline_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("access.log");
        let counter = Arc::new(RequestCounter::new(0));

        let pipeline = AccessLogPipeline::spawn(Arc::clone(&counter), path.clone());
        pipeline.record(&conn());
        pipeline.shutdown().await.expect("first pipeline shutdown");

        let pipeline = AccessLogPipeline::spawn(Arc::clone(&counter), path.clone());
        pipeline.record(&conn());
        pipeline.shutdown().await.expect("second pipeline shutdown");

        let contents = fs::read_to_string(&path).expect("read access log");
        assert_eq!(trailing_numbers(&contents), vec![0, 1]);
    }
}
