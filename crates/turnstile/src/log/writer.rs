//! The single writer task behind the log queue.

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};

use super::entry::AccessLogEntry;

/// Buffer in front of the access-log file. 15x the size of a typical 8 KiB
/// buffer; tweak this for I/O vs memory gains.
const LOG_BUFFER_SIZE: usize = 120 * 1024;

/// Commands consumed by the writer task.
#[derive(Debug)]
pub(crate) enum LogCommand {
    /// Append one completed entry to the access log.
    Append(AccessLogEntry),
    /// Drain everything queued before this command, flush, and stop. Acked
    /// once the flush has completed.
    Shutdown { ack: oneshot::Sender<()> },
}

/// Single consumer of the log queue.
///
/// Owns the access-log file handle for the life of the pipeline; no other
/// task touches it. Entries arrive already ordered by sequence number and
/// are appended in that order. A failed write drops that one entry and the
/// loop keeps going; counter correctness never depends on log-write success.
pub(crate) async fn writer_loop(path: PathBuf, mut rx: mpsc::UnboundedReceiver<LogCommand>) {
    let file = match OpenOptions::new().create(true).append(true).open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "could not open access log, entries will be dropped"
            );
            // Keep consuming so producers are unaffected, and still ack a
            // shutdown so the pipeline can stop cleanly.
            while let Some(cmd) = rx.recv().await {
                if let LogCommand::Shutdown { ack } = cmd {
                    let _ = ack.send(());
                    return;
                }
            }
            return;
        }
    };

    let mut writer = BufWriter::with_capacity(LOG_BUFFER_SIZE, file);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            LogCommand::Append(entry) => {
                let mut line = entry.render();
                line.push('\n');
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    tracing::warn!(
                        sequence = entry.sequence(),
                        error = %e,
                        "error writing access log entry, entry dropped"
                    );
                }
            }
            LogCommand::Shutdown { ack } => {
                flush(&mut writer).await;
                let _ = ack.send(());
                return;
            }
        }
    }

    // Every sender dropped without an explicit shutdown; flush what we have
    // before the handle closes.
    flush(&mut writer).await;
}

async fn flush(writer: &mut BufWriter<File>) {
    if let Err(e) = writer.flush().await {
        tracing::warn!(error = %e, "could not flush access logs during shutdown");
    }
}
