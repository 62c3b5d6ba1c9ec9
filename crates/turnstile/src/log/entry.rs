//! Access-log records.

use std::net::SocketAddr;

use chrono::{DateTime, Local};
use tokio::net::TcpStream;

/// Timestamp layout for access-log lines, e.g.
/// `Thursday, August 7, 2025 13:22:17 -0400`.
const TIMESTAMP_FORMAT: &str = "%A, %B %-d, %Y %H:%M:%S %z";

/// Endpoint addresses of one accepted connection.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionInfo {
    pub remote: SocketAddr,
    pub local: SocketAddr,
}

impl ConnectionInfo {
    /// Captures the endpoint addresses of an accepted stream without reading
    /// from or otherwise altering it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when either address lookup fails;
    /// the failure is contained to this connection.
    pub fn from_stream(stream: &TcpStream) -> std::io::Result<Self> {
        Ok(Self {
            remote: stream.peer_addr()?,
            local: stream.local_addr()?,
        })
    }
}

/// One access-log record.
///
/// Created the moment a request reaches the recording step; the sequence
/// number is filled in under the pipeline's critical section and the entry is
/// never mutated afterwards. Ownership moves from the recording worker into
/// the log queue, then to the writer task.
#[derive(Debug)]
pub struct AccessLogEntry {
    remote: SocketAddr,
    local: SocketAddr,
    timestamp: DateTime<Local>,
    sequence: u64,
}

impl AccessLogEntry {
    /// Starts an entry for `conn`, stamped with the current wall-clock time.
    /// The sequence number is assigned later via [`assign`](Self::assign).
    pub(crate) fn begin(conn: &ConnectionInfo) -> Self {
        Self {
            remote: conn.remote,
            local: conn.local,
            timestamp: Local::now(),
            sequence: 0,
        }
    }

    /// Completes the entry with its sequence number.
    pub(crate) fn assign(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// The sequence number assigned to this entry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Renders the entry as one log line, without the trailing newline:
    /// `<remote-ip>:<remote-port> <datetime> <local-ip>:<local-port> <N>`.
    pub fn render(&self) -> String {
        format!(
            "{} {} {} {}",
            self.remote,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.local,
            self.sequence
        )
    }
}
