// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use aws_credential_types::provider::error::CredentialsError;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Seconds slept before each retry; 20 seconds in total.
pub const FIBONACCI_DELAYS: [u64; 6] = [1, 1, 2, 3, 5, 8];

/// Fixed Fibonacci backoff with no jitter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FibonacciBackoff {
    retries: usize,
}

impl FibonacciBackoff {
    /// Allow up to `retries` retries (clamped to the length of the delay table).
    pub fn new(retries: usize) -> Self {
        Self {
            retries: retries.min(FIBONACCI_DELAYS.len()),
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Retry through the whole delay table.
    pub fn full() -> Self {
        Self::new(FIBONACCI_DELAYS.len())
    }

    /// The delays slept between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let table: &'static [u64] = &FIBONACCI_DELAYS;
        table[..self.retries]
            .iter()
            .map(|secs| Duration::from_secs(*secs))
    }

    /// The maximum number of attempts.
    pub fn max_attempts(&self) -> usize {
        self.retries + 1
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// the delays run out. Returns the last error in the latter cases.
    pub async fn retry<T, E, F, Fut, P>(&self, call: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut delays = self.delays();
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) => match delays.next() {
                    Some(delay) => {
                        warn!("{call}: credentials unavailable, retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Returns `true` if a credentials provider failure is anywhere in the source chain.
pub fn is_credentials_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if e.is::<CredentialsError>() {
            return true;
        }
        source = e.source();
    }
    false
}
