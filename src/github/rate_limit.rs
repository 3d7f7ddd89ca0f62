//! Rate limit information from GitHub API responses.
//!
//! GitHub reports quota through `x-ratelimit-*` response headers and through
//! the `/rate_limit` endpoint. Both are parsed into [`RateLimitInfo`], which
//! the rate gate consults before every outbound call.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderMap;
use serde::Deserialize;

/// Resource name GitHub uses for ordinary REST calls.
pub const CORE_RESOURCE: &str = "core";

/// Rate limit information extracted from GitHub API responses.
///
/// # Example
///
/// ```
/// use octolens::github::rate_limit::RateLimitInfo;
///
/// let info = RateLimitInfo::new(5000, 4999, 1700000000);
/// assert!(!info.is_exhausted());
/// assert_eq!(info.remaining(), 4999);
/// assert_eq!(info.used(), 1);
/// assert_eq!(info.resource(), "core");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    resource: String,
    limit: u32,
    remaining: u32,
    reset_at: u64,
    used: u32,
}

impl RateLimitInfo {
    /// Creates rate limit info for the `core` resource.
    #[must_use]
    pub fn new(limit: u32, remaining: u32, reset_at: u64) -> Self {
        Self {
            resource: CORE_RESOURCE.to_owned(),
            limit,
            remaining,
            reset_at,
            used: limit.saturating_sub(remaining),
        }
    }

    /// Replaces the resource name.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Replaces the used count reported by GitHub.
    #[must_use]
    pub const fn with_used(mut self, used: u32) -> Self {
        self.used = used;
        self
    }

    /// Parses the `x-ratelimit-*` headers of a response.
    ///
    /// Returns `None` unless limit, remaining, and reset are all present and
    /// numeric.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Self::from_header_lookup(|name| headers.get(name).and_then(|value| value.to_str().ok()))
    }

    /// Parses rate limit headers through an arbitrary lookup function.
    pub(crate) fn from_header_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let number = |name: &str| lookup(name).and_then(|raw| raw.trim().parse::<u64>().ok());

        let limit = u32::try_from(number("x-ratelimit-limit")?).ok()?;
        let remaining = u32::try_from(number("x-ratelimit-remaining")?).ok()?;
        let reset_at = number("x-ratelimit-reset")?;

        let mut info = Self::new(limit, remaining, reset_at);
        if let Some(used) = number("x-ratelimit-used").and_then(|used| u32::try_from(used).ok()) {
            info.used = used;
        }
        if let Some(resource) = lookup("x-ratelimit-resource") {
            resource.trim().clone_into(&mut info.resource);
        }
        Some(info)
    }

    /// Returns the resource this quota applies to.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the maximum requests allowed in the current window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the remaining requests in the current window.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns the Unix timestamp when the rate limit resets.
    #[must_use]
    pub const fn reset_at(&self) -> u64 {
        self.reset_at
    }

    /// Returns the requests consumed in the current window.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Returns true if the rate limit has been exhausted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Returns true when at most one request remains in the window.
    #[must_use]
    pub const fn is_nearly_exhausted(&self) -> bool {
        self.remaining <= 1
    }

    /// Returns true while the reset instant lies after `now_unix`.
    #[must_use]
    pub const fn resets_after(&self, now_unix: u64) -> bool {
        self.reset_at > now_unix
    }

    /// Calculates seconds until the rate limit resets.
    ///
    /// Returns 0 if the reset time has already passed or if the system time
    /// cannot be determined.
    #[must_use]
    pub fn seconds_until_reset(&self) -> u64 {
        self.reset_at.saturating_sub(now_unix_seconds())
    }
}

/// Current Unix time in seconds, or 0 when the clock is before the epoch.
#[must_use]
pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

/// Body of `GET /rate_limit`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiRateLimitResponse {
    #[serde(default)]
    resources: HashMap<String, ApiRate>,
    rate: Option<ApiRate>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ApiRate {
    limit: u64,
    remaining: u64,
    reset: u64,
    #[serde(default)]
    used: Option<u64>,
}

impl ApiRateLimitResponse {
    /// Returns the quota for one resource, falling back to the legacy `rate`
    /// block for `core`.
    pub(crate) fn resource(&self, name: &str) -> Option<RateLimitInfo> {
        let rate = self
            .resources
            .get(name)
            .copied()
            .or_else(|| self.rate.filter(|_| name == CORE_RESOURCE))?;
        let limit = u32::try_from(rate.limit).ok()?;
        let remaining = u32::try_from(rate.remaining).ok()?;
        let mut info = RateLimitInfo::new(limit, remaining, rate.reset).with_resource(name);
        if let Some(used) = rate.used.and_then(|used| u32::try_from(used).ok()) {
            info = info.with_used(used);
        }
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;
    use serde_json::json;

    use super::{ApiRateLimitResponse, RateLimitInfo, now_unix_seconds};

    #[test]
    fn seconds_until_reset_returns_zero_when_reset_has_passed() {
        let info = RateLimitInfo::new(5000, 0, 0);
        assert_eq!(info.seconds_until_reset(), 0);
    }

    #[test]
    fn seconds_until_reset_returns_positive_for_future_reset() {
        let info = RateLimitInfo::new(5000, 0, now_unix_seconds() + 60);

        let seconds = info.seconds_until_reset();
        assert!(
            (1..=60).contains(&seconds),
            "expected 1..=60 seconds until reset, got {seconds}"
        );
    }

    #[test]
    fn parses_response_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", "5000".parse().expect("valid header"));
        headers.insert("x-ratelimit-remaining", "1".parse().expect("valid header"));
        headers.insert("x-ratelimit-reset", "1700000000".parse().expect("valid header"));
        headers.insert("x-ratelimit-used", "4999".parse().expect("valid header"));
        headers.insert("x-ratelimit-resource", "core".parse().expect("valid header"));

        let info = RateLimitInfo::from_headers(&headers).expect("headers should parse");

        assert_eq!(info.limit(), 5000);
        assert_eq!(info.remaining(), 1);
        assert_eq!(info.reset_at(), 1_700_000_000);
        assert_eq!(info.used(), 4999);
        assert!(info.is_nearly_exhausted());
        assert!(!info.is_exhausted());
    }

    #[test]
    fn incomplete_headers_yield_nothing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "10".parse().expect("valid header"));

        assert!(RateLimitInfo::from_headers(&headers).is_none());
    }

    #[test]
    fn rate_limit_body_exposes_named_resources() {
        let body: ApiRateLimitResponse = serde_json::from_value(json!({
            "resources": {
                "core": { "limit": 5000, "used": 4990, "remaining": 10, "reset": 1_700_000_000 },
                "search": { "limit": 30, "used": 0, "remaining": 30, "reset": 1_700_000_060 }
            },
            "rate": { "limit": 5000, "used": 4990, "remaining": 10, "reset": 1_700_000_000 }
        }))
        .expect("body should deserialise");

        let core = body.resource("core").expect("core should be present");
        assert_eq!(core.remaining(), 10);
        assert_eq!(core.used(), 4990);

        let search = body.resource("search").expect("search should be present");
        assert_eq!(search.resource(), "search");
        assert_eq!(search.limit(), 30);

        assert!(body.resource("graphql").is_none());
    }
}
