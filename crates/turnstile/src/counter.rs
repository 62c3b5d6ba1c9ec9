//! The durable request counter.
//!
//! A single atomic word shared by every worker. The counter is seeded from a
//! one-line backup file at startup and written back at shutdown, so the
//! sequence continues (rather than resets) across process restarts. A
//! missing or malformed backup is never fatal: counting simply restarts at
//! zero.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use portable_atomic::{AtomicU64, Ordering};

/// Monotonic counter of handled requests.
///
/// All reads and updates go through [`next`](Self::next) or
/// [`current`](Self::current); no other code path mutates the value. The
/// counter itself is lock-free; ordering relative to the access log is the
/// pipeline's job, not the counter's.
pub struct RequestCounter {
    count: AtomicU64,
}

impl RequestCounter {
    /// Creates a counter starting at `initial`.
    pub const fn new(initial: u64) -> Self {
        Self {
            count: AtomicU64::new(initial),
        }
    }

    /// Restores a counter from the backup file at `path`.
    ///
    /// Reads the first line and parses it as a non-negative integer. If the
    /// file is missing, empty, or does not parse, the counter starts from 0;
    /// that condition is reported at info level and never fails the caller.
    pub fn load(path: &Path) -> Self {
        let initial = match fs::read_to_string(path) {
            Ok(contents) => match contents.lines().next().map(str::trim) {
                Some(line) if !line.is_empty() => line.parse().unwrap_or_else(|_| {
                    tracing::info!(
                        path = %path.display(),
                        "persisted request count is not a number, count will start from 0"
                    );
                    0
                }),
                _ => {
                    tracing::info!(
                        path = %path.display(),
                        "persisted request count is empty, count will start from 0"
                    );
                    0
                }
            },
            Err(_) => {
                tracing::info!(
                    path = %path.display(),
                    "could not find a persisted request count, count will start from 0"
                );
                0
            }
        };
        Self::new(initial)
    }

    /// Atomically returns the current value and increments it by one.
    ///
    /// Safe to call from any number of concurrent callers: no two callers
    /// observe the same value and no increments are lost.
    pub fn next(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed)
    }

    /// The current value, without incrementing.
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Writes the current value to `path` as one line of decimal text,
    /// overwriting prior contents. The write is flushed and synced before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error. Callers treat this as best-effort:
    /// a failed persist is logged and shutdown continues.
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(self.current().to_string().as_bytes())?;
        file.flush()?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    #[test]
    fn next_returns_value_before_increment() {
        let counter = RequestCounter::new(7);
        assert_eq!(counter.next(), 7);
        assert_eq!(counter.next(), 8);
        assert_eq!(counter.current(), 9);
    }

    #[test]
    fn next_is_unique_across_threads() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 512;

        let counter = RequestCounter::new(0);
        let seen = Mutex::new(HashSet::with_capacity(THREADS * PER_THREAD));

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..PER_THREAD {
                        let value = counter.next();
                        assert!(seen.lock().unwrap().insert(value));
                    }
                });
            }
        });

        assert_eq!(counter.current(), (THREADS * PER_THREAD) as u64);
        let seen = seen.lock().unwrap();
        for value in 0..(THREADS * PER_THREAD) as u64 {
            assert!(seen.contains(&value), "missing value {value}");
        }
    }

    #[test]
    fn load_missing_file_starts_from_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = RequestCounter::load(&dir.path().join("nope.txt"));
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn load_malformed_file_starts_from_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("count.txt");
        fs::write(&path, "not-a-number\n").expect("write");
        assert_eq!(RequestCounter::load(&path).current(), 0);

        fs::write(&path, "").expect("write");
        assert_eq!(RequestCounter::load(&path).current(), 0);
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("count.txt");

        let counter = RequestCounter::new(41);
        counter.next();
        counter.persist(&path).expect("persist");

        assert_eq!(RequestCounter::load(&path).current(), 42);
    }

    #[test]
    fn persist_overwrites_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("count.txt");

        RequestCounter::new(1000).persist(&path).expect("persist");
        RequestCounter::new(3).persist(&path).expect("persist");

        assert_eq!(fs::read_to_string(&path).expect("read"), "3");
    }

    #[test]
    fn load_tolerates_trailing_whitespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("count.txt");
        fs::write(&path, " 17 \n").expect("write");
        assert_eq!(RequestCounter::load(&path).current(), 17);
    }
}
