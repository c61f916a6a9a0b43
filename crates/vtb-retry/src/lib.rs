// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded exponential backoff for idempotent backend calls.
//!
//! [`retry_async`] calls an operation until it succeeds, the error is not
//! transient, or [`RetryPolicy::max_attempts`] is reached. Attempts are only
//! reported through `tracing`; callers see either the value or the last
//! error.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

// ── Configuration ───────────────────────────────────────────────────

/// Backoff schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Jitter factor in `[0.0, 1.0]`. 0 = no jitter, 1 = full jitter.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given bounds and default jitter.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Serde helper: `Duration` as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        (val.as_millis() as u64).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// A successful result and how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The produced value.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Wall-clock time across all attempts.
    pub elapsed: Duration,
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Backoff delay after the zero-indexed failed `attempt`.
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let delay_ms = (policy.base_delay.as_millis() as u64).saturating_mul(exp);
    let capped_ms = delay_ms.min(policy.max_delay.as_millis() as u64);

    let jitter_factor = policy.jitter_factor.clamp(0.0, 1.0);
    if jitter_factor > 0.0 && capped_ms > 0 {
        let jitter_range = (capped_ms as f64 * jitter_factor) as u64;
        // Cheap pseudo-random: system-clock nanos mixed with the attempt index.
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        let pseudo = nanos.wrapping_mul(attempt as u64 + 1);
        let jitter = if jitter_range > 0 {
            pseudo % jitter_range
        } else {
            0
        };
        Duration::from_millis(capped_ms.saturating_sub(jitter))
    } else {
        Duration::from_millis(capped_ms)
    }
}

// ── Core retry loop ─────────────────────────────────────────────────

/// Call `op` up to `policy.max_attempts` times.
///
/// `retryable` decides whether an error is transient. `operation` names the
/// call in log events.
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
    retryable: impl Fn(&E) -> bool,
) -> Result<RetryOutcome<T>, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        debug!(
            target: "vtb.retry",
            operation,
            attempt,
            max_attempts,
            "attempting operation"
        );

        match op().await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt + 1,
                    elapsed: start.elapsed(),
                });
            }
            Err(err) => {
                if !retryable(&err) {
                    debug!(
                        target: "vtb.retry",
                        operation,
                        error = %err,
                        "non-retryable error, giving up"
                    );
                    return Err(err);
                }
                if attempt + 1 >= max_attempts {
                    warn!(
                        target: "vtb.retry",
                        operation,
                        error = %err,
                        attempt,
                        "max attempts exhausted"
                    );
                    return Err(err);
                }

                let delay = compute_delay(policy, attempt);
                warn!(
                    target: "vtb.retry",
                    operation,
                    error = %err,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
