//! Bounded retry around connection establishment.
//!
//! The database may still be starting when the loader runs (container
//! warm-up), so opening the connection is retried with a fixed delay. A
//! rejection that no amount of waiting fixes (bad URI, bad credentials) ends
//! the loop at once. Work done after the connection is up is never retried.

use std::time::Duration;

use tracing::{info, warn};

use hospital_core::{EtlError, EtlResult};

use crate::store::Connector;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

/// Maximum attempts and the fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Attempts actually made; zero is treated as one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Open a store, retrying refused attempts.
    ///
    /// Returns the store and the attempt number that succeeded. Exhausting
    /// every attempt yields [`EtlError::Connection`] with the last error; a
    /// non-transient error is returned unchanged on the attempt it occurs.
    pub async fn connect<C: Connector>(&self, connector: &C) -> EtlResult<(C::Store, u32)> {
        let max = self.attempts();
        let target = connector.target();
        let mut attempt = 1;

        loop {
            match connector.connect().await {
                Ok(store) => {
                    info!(store = %target, attempt, "Connected to graph store");
                    return Ok((store, attempt));
                }
                Err(e) if !e.is_transient() => {
                    warn!(
                        store = %target,
                        attempt,
                        error = %e,
                        "Graph store rejected the connection, not retrying"
                    );
                    return Err(e);
                }
                Err(e) if attempt < max => {
                    warn!(
                        store = %target,
                        attempt,
                        max_attempts = max,
                        error = %e,
                        "Graph store not reachable, retrying in {:?}",
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(EtlError::Connection {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
