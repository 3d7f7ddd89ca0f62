//! Raw failure shapes observed at the transport boundary.
//!
//! A failure may arrive as an HTTP response with a non-success status, as a
//! transport error without any response, or as an Octocrab error wrapping
//! either. [`Fault`] flattens all of them into one set of optional fields so the
//! classifier can match on what is present rather than on where it came from.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;

use http::HeaderMap;
use serde_json::Value;

/// Transport failure codes recognised as network faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    /// The remote host refused the connection.
    ConnectionRefused,
    /// The connection or request timed out.
    TimedOut,
    /// The host name could not be resolved.
    HostNotFound,
    /// The connection was reset by the peer.
    ConnectionReset,
}

impl TransportCode {
    /// Conventional errno-style label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::TimedOut => "ETIMEDOUT",
            Self::HostNotFound => "ENOTFOUND",
            Self::ConnectionReset => "ECONNRESET",
        }
    }

    /// Maps an I/O error kind onto a transport code.
    #[must_use]
    pub const fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionRefused => Some(Self::ConnectionRefused),
            io::ErrorKind::TimedOut => Some(Self::TimedOut),
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                Some(Self::ConnectionReset)
            }
            _ => None,
        }
    }

    /// Recognises a transport code from an error message.
    #[must_use]
    pub fn from_message(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        let matches_any = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

        if matches_any(&["econnrefused", "connection refused"]) {
            Some(Self::ConnectionRefused)
        } else if matches_any(&["etimedout", "timed out", "timeout", "deadline has elapsed"]) {
            Some(Self::TimedOut)
        } else if matches_any(&[
            "enotfound",
            "dns error",
            "failed to lookup address",
            "name or service not known",
            "no such host",
        ]) {
            Some(Self::HostNotFound)
        } else if matches_any(&["econnreset", "connection reset"]) {
            Some(Self::ConnectionReset)
        } else {
            None
        }
    }
}

/// A failure observed while talking to GitHub, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    /// Transport code when the failure happened below HTTP.
    pub code: Option<TransportCode>,
    /// Error message from the response body or the transport.
    pub message: String,
    /// Response headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON response body, if any.
    pub body: Option<Box<Value>>,
    /// API path that was requested.
    pub endpoint: Option<String>,
    /// HTTP method that was used.
    pub method: Option<String>,
}

impl Fault {
    /// Builds a fault for a failure that produced no response.
    #[must_use]
    pub fn transport(message: impl Into<String>, code: Option<TransportCode>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Builds a fault from a non-success HTTP response.
    ///
    /// The message is taken from the body's `message` field when the body is
    /// JSON, falling back to the canonical reason for the status.
    #[must_use]
    pub fn from_response(status: u16, headers: &HeaderMap, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|value| value.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| canonical_reason(status), ToOwned::to_owned);

        Self {
            status: Some(status),
            code: None,
            message,
            headers: lowercase_headers(headers),
            body: parsed.map(Box::new),
            endpoint: None,
            method: None,
        }
    }

    /// Flattens an Octocrab error into a fault.
    #[must_use]
    pub fn from_octocrab(error: &octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = error {
            let mut body = serde_json::Map::new();
            body.insert("message".to_owned(), Value::from(source.message.clone()));
            if let Some(url) = source.documentation_url.as_deref() {
                body.insert("documentation_url".to_owned(), Value::from(url));
            }
            return Self {
                status: Some(source.status_code.as_u16()),
                message: source.message.clone(),
                body: Some(Box::new(Value::Object(body))),
                ..Self::default()
            };
        }

        Self::transport(describe(error), transport_code(error))
    }

    /// Records the endpoint that produced the fault.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Records the HTTP method that produced the fault.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Looks up a response header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true when the fault carries an HTTP response.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.status.is_some()
    }
}

/// Copies a header map into an ordered map of lower-cased names.
///
/// Headers that are not valid UTF-8 are skipped.
pub(crate) fn lowercase_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|text| (name.as_str().to_ascii_lowercase(), text.to_owned()))
        })
        .collect()
}

fn canonical_reason(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("HTTP status {status}"), ToOwned::to_owned)
}

/// Joins the first line of each error in the source chain.
///
/// Octocrab appends a captured backtrace after a blank line; only the leading
/// line of every message is kept so faults stay one line long.
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut message = first_line(&error.to_string());
    let mut current = error.source();
    while let Some(cause) = current {
        let text = first_line(&cause.to_string());
        if !text.is_empty() && !message.contains(text.as_str()) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_owned()
}

/// Walks the error source chain looking for a recognisable transport failure.
fn transport_code(error: &(dyn StdError + 'static)) -> Option<TransportCode> {
    let mut current = Some(error);
    while let Some(candidate) = current {
        if let Some(code) = candidate
            .downcast_ref::<io::Error>()
            .and_then(|io_error| TransportCode::from_io_kind(io_error.kind()))
        {
            return Some(code);
        }
        if let Some(code) = TransportCode::from_message(&candidate.to_string()) {
            return Some(code);
        }
        current = candidate.source();
    }
    None
}
