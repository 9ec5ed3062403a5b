//! Bounded retry for store I/O
//!
//! Only `IoFailure` is retried. Integrity failures are never transient.

use std::thread;
use std::time::Duration;

use crate::metadata::StorageResult;
use crate::observability::{log_event_with_fields, Event};

/// Default extra attempts after the first failure
pub const DEFAULT_COMMIT_RETRIES: u32 = 1;

/// Default sleep before the first retry; doubles per retry
pub const DEFAULT_COMMIT_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_RETRIES, DEFAULT_COMMIT_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Fail on the first error
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `op`, retrying transient I/O failures up to the policy bound
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut attempt = 0;
        let mut backoff = self.backoff;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log_event_with_fields(
                        Event::CommitRetry,
                        &[
                            ("operation", operation),
                            ("attempt", &attempt.to_string()),
                            ("error", &e.to_string()),
                        ],
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    if e.is_retryable() {
                        log_event_with_fields(
                            Event::CommitFailed,
                            &[("operation", operation), ("error", &e.to_string())],
                        );
                    }
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StorageError;
    use std::io;

    fn io_err() -> StorageError {
        StorageError::io_failure("test", io::Error::new(io::ErrorKind::Other, "eio"))
    }

    #[test]
    fn test_transient_failure_retried_once() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let mut calls = 0;
        let result = policy.run("commit", || {
            calls += 1;
            if calls == 1 {
                Err(io_err())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_persistent_failure_surfaces_after_bound() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let mut calls = 0;
        let result: StorageResult<()> = policy.run("commit", || {
            calls += 1;
            Err(io_err())
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_corruption_not_retried() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result: StorageResult<()> = policy.run("load", || {
            calls += 1;
            Err(StorageError::corrupt("bad crc"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
