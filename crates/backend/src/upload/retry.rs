// Per-target retry policy
//
// Two kinds of failure are retried, each with its own exponential schedule:
// - Rate limiting (HTTP 429)
// - Transport faults (connect errors, timeouts, truncated bodies)
//
// Everything else is final on the first attempt.

use std::time::Duration;

/// Exponential backoff: `base * 2^attempt`, capped at `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  pub base: Duration,
  pub cap: Duration,
}

impl Backoff {
  pub const fn new(base: Duration, cap: Duration) -> Self {
    Self { base, cap }
  }

  /// Calculate backoff duration for a given attempt (0-based)
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    self.base.saturating_mul(factor).min(self.cap)
  }
}

/// Retry configuration carried by each upload target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Maximum number of retry attempts after the first request
  pub max_retries: u32,
  /// Schedule after a 429 response
  pub rate_limited: Backoff,
  /// Schedule after a transport fault
  pub network: Backoff,
}

impl RetryPolicy {
  /// Three retries, each schedule given in seconds as `(base, cap)`.
  pub const fn secs(rate_limited: (u64, u64), network: (u64, u64)) -> Self {
    Self {
      max_retries: 3,
      rate_limited: Backoff::new(Duration::from_secs(rate_limited.0), Duration::from_secs(rate_limited.1)),
      network: Backoff::new(Duration::from_secs(network.0), Duration::from_secs(network.1)),
    }
  }
}
