//! Quota gate consulted before every outbound GitHub call.
//!
//! The gate keeps the last [`RateLimitInfo`] observed for each resource. When
//! at most one request remains and the window has not reset yet, callers are
//! suspended until the reset instant, bounded by a maximum wait. Without a
//! usable observation the gate asks `GET /rate_limit`; if that probe fails the
//! call proceeds anyway, so a broken quota check never blocks traffic.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use http::HeaderMap;
use tracing::{debug, warn};

use super::fault::Fault;
use super::rate_limit::{
    ApiRateLimitResponse, CORE_RESOURCE, RateLimitInfo, now_unix_seconds,
};
use super::transport::{RATE_LIMIT_PATH, Transport};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Longest suspension applied by default, in seconds.
pub const DEFAULT_MAX_WAIT_SECONDS: u64 = 900;

/// Per-client rate limit gate.
pub struct RateGate {
    observations: Mutex<HashMap<String, RateLimitInfo>>,
    max_wait: Duration,
    telemetry: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for RateGate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RateGate")
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl RateGate {
    /// Creates a gate with no observations.
    #[must_use]
    pub fn new(max_wait: Duration, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            observations: Mutex::new(HashMap::new()),
            max_wait,
            telemetry,
        }
    }

    /// Waits, if necessary, until a `core` request may be issued.
    pub async fn acquire(&self, transport: &dyn Transport) {
        self.acquire_resource(CORE_RESOURCE, transport).await;
    }

    /// Waits, if necessary, until a request against `resource` may be issued.
    pub async fn acquire_resource(&self, resource: &str, transport: &dyn Transport) {
        let now = now_unix_seconds();
        let current = match self
            .observed(resource)
            .filter(|info| info.resets_after(now))
        {
            Some(info) => Some(info),
            None => self.probe(resource, transport).await,
        };

        let Some(info) = current else {
            return;
        };
        let Some(wait) = self.wait_for(&info, now) else {
            return;
        };

        warn!(
            resource,
            remaining = info.remaining(),
            wait_seconds = wait.as_secs(),
            "rate limit nearly exhausted; waiting for reset"
        );
        self.telemetry.record(TelemetryEvent::RateLimitWait {
            resource: resource.to_owned(),
            wait_seconds: wait.as_secs(),
        });
        tokio::time::sleep(wait).await;
    }

    /// Records the quota reported by a response's headers.
    pub fn observe(&self, headers: &HeaderMap) {
        if let Some(info) = RateLimitInfo::from_headers(headers) {
            self.record(info);
        }
    }

    /// Records the quota reported by a failed response's headers.
    pub fn observe_fault(&self, fault: &Fault) {
        if let Some(info) = RateLimitInfo::from_header_lookup(|name| fault.header(name)) {
            self.record(info);
        }
    }

    /// Stores an observation, replacing the previous one for its resource.
    pub fn record(&self, info: RateLimitInfo) {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(info.resource().to_owned(), info);
    }

    /// Returns the last observation for `resource`.
    #[must_use]
    pub fn observed(&self, resource: &str) -> Option<RateLimitInfo> {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned()
    }

    fn wait_for(&self, info: &RateLimitInfo, now: u64) -> Option<Duration> {
        if !info.is_nearly_exhausted() || !info.resets_after(now) {
            return None;
        }
        let until_reset = Duration::from_secs(info.reset_at().saturating_sub(now));
        Some(until_reset.min(self.max_wait))
    }

    async fn probe(&self, resource: &str, transport: &dyn Transport) -> Option<RateLimitInfo> {
        let response = match transport.rate_limit().await {
            Ok(response) => response,
            Err(fault) => {
                warn!(
                    resource,
                    status = ?fault.status,
                    message = %fault.message,
                    "rate limit probe failed; proceeding without a quota check"
                );
                return None;
            }
        };

        let body = match response.json::<ApiRateLimitResponse>(RATE_LIMIT_PATH) {
            Ok(body) => body,
            Err(fault) => {
                warn!(
                    resource,
                    message = %fault.message,
                    "rate limit probe returned an unreadable body; proceeding"
                );
                return None;
            }
        };

        let info = body.resource(resource)?;
        debug!(
            resource,
            remaining = info.remaining(),
            reset_at = info.reset_at(),
            "rate limit probed"
        );
        self.record(info.clone());
        Some(info)
    }
}
