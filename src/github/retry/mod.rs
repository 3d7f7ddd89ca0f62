//! Exponential backoff retry for GitHub API calls.
//!
//! Every attempt passes through the [`RateGate`] first. Failures are
//! classified and only transient kinds (`RateLimit`, `Network`, `Server`) are
//! retried. The attempt counter lives on the stack of a single
//! [`RetryEngine::execute`] call, so concurrent calls never consume each
//! other's retry budget.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::classify::classify;
use super::error::ApiError;
use super::fault::Fault;
use super::rate_gate::RateGate;
use super::transport::Transport;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Backoff schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries, not counting the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; each later retry doubles it.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Three retries after 1s, 2s, and 4s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        base_delay: Duration::from_secs(1),
    };

    /// Creates a retry configuration.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Iterates over every delay in the schedule.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs GitHub calls through the rate gate with classified retries.
pub struct RetryEngine {
    config: RetryConfig,
    telemetry: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for RetryEngine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RetryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    /// Creates an engine with the given schedule.
    #[must_use]
    pub fn new(config: RetryConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { config, telemetry }
    }

    /// Returns the backoff schedule.
    #[must_use]
    pub const fn config(&self) -> RetryConfig {
        self.config
    }

    /// Executes `op` until it succeeds, fails permanently, or exhausts the
    /// retry budget.
    ///
    /// `transport` is only used by the gate to probe the quota.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the last attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        gate: &RateGate,
        transport: &dyn Transport,
        mut op: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Fault>>,
    {
        let mut attempt: u32 = 0;
        loop {
            gate.acquire(transport).await;

            let fault = match op().await {
                Ok(value) => return Ok(value),
                Err(fault) => fault,
            };
            let error = classify(&fault);

            if !error.is_retryable() || attempt >= self.config.max_retries {
                debug!(
                    operation,
                    attempts = attempt + 1,
                    kind = %error.kind,
                    "GitHub call failed"
                );
                return Err(error);
            }

            let delay = self.config.delay_for_attempt(attempt);
            attempt += 1;
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            info!(
                operation,
                attempt,
                delay_ms,
                kind = %error.kind,
                "retrying GitHub call"
            );
            self.telemetry.record(TelemetryEvent::RetryScheduled {
                operation: operation.to_owned(),
                attempt,
                delay_ms,
                error_kind: error.kind.as_str().to_owned(),
            });
            tokio::time::sleep(delay).await;
        }
    }
}
