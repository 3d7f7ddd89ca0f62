//! Classification of raw faults into semantic errors.
//!
//! Rules are evaluated in table order and the first match wins. Keeping the
//! precedence in one table makes it auditable: a 403 that mentions the rate
//! limit must be classified before the generic status rules see it.

use chrono::Utc;
use serde_json::Value;

use super::error::{ApiError, ErrorContext, ErrorKind};
use super::fault::Fault;

/// Headers copied into the context of a rate limited error.
const RATE_LIMIT_HEADERS: [&str; 4] = [
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-reset",
    "retry-after",
];

const REQUEST_ID_HEADER: &str = "x-github-request-id";

/// One predicate → kind entry of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Short identifier used in logs and tests.
    pub name: &'static str,
    /// Kind produced when the rule applies.
    pub kind: ErrorKind,
    applies: fn(&Fault) -> bool,
}

impl Rule {
    /// Returns true when the rule matches the fault.
    #[must_use]
    pub fn applies(&self, fault: &Fault) -> bool {
        (self.applies)(fault)
    }
}

/// Terminal rule: a fault without a response or a recognised code.
const NO_RESPONSE: Rule = Rule {
    name: "no_response",
    kind: ErrorKind::Server,
    applies: always,
};

/// The classification table, in precedence order.
pub static RULES: [Rule; 9] = [
    Rule {
        name: "transport",
        kind: ErrorKind::Network,
        applies: is_transport_fault,
    },
    Rule {
        name: "rate_limit",
        kind: ErrorKind::RateLimit,
        applies: is_rate_limited,
    },
    Rule {
        name: "unauthorised",
        kind: ErrorKind::Authentication,
        applies: is_unauthorised,
    },
    Rule {
        name: "not_found",
        kind: ErrorKind::NotFound,
        applies: is_not_found,
    },
    Rule {
        name: "conflict",
        kind: ErrorKind::ResourceConflict,
        applies: is_conflict,
    },
    Rule {
        name: "validation",
        kind: ErrorKind::Validation,
        applies: is_validation,
    },
    Rule {
        name: "server",
        kind: ErrorKind::Server,
        applies: is_server_error,
    },
    Rule {
        name: "other_status",
        kind: ErrorKind::Unknown,
        applies: Fault::has_response,
    },
    NO_RESPONSE,
];

/// Returns the first rule in [`RULES`] that matches the fault.
#[must_use]
pub fn matching_rule(fault: &Fault) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| rule.applies(fault))
        .unwrap_or(&NO_RESPONSE)
}

/// Classifies a fault into a semantic error with diagnostic context.
#[must_use]
pub fn classify(fault: &Fault) -> ApiError {
    let rule = matching_rule(fault);
    let kind = rule.kind;

    let status = match kind {
        ErrorKind::Network => Some(0),
        ErrorKind::RateLimit => Some(403),
        _ => fault.status,
    };

    let mut context = ErrorContext {
        timestamp: Utc::now(),
        endpoint: fault.endpoint.clone(),
        method: fault.method.clone(),
        request_id: fault.header(REQUEST_ID_HEADER).map(ToOwned::to_owned),
        ..ErrorContext::default()
    };

    match kind {
        ErrorKind::RateLimit => {
            context.rate_limit = RATE_LIMIT_HEADERS
                .iter()
                .filter_map(|name| {
                    fault
                        .header(name)
                        .map(|value| ((*name).to_owned(), value.to_owned()))
                })
                .collect();
        }
        ErrorKind::Validation => {
            context.field_errors = fault
                .body
                .as_ref()
                .and_then(|body| body.get("errors"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
        }
        ErrorKind::Unknown => context.response_body = fault.body.as_deref().cloned(),
        _ => {}
    }

    ApiError {
        kind,
        message: fault.message.clone(),
        status,
        fault: Box::new(fault.clone()),
        context: Box::new(context),
    }
}

fn is_transport_fault(fault: &Fault) -> bool {
    fault.code.is_some() || fault.message.to_lowercase().contains("network")
}

fn is_rate_limited(fault: &Fault) -> bool {
    fault.status == Some(403)
        && (fault.message.to_lowercase().contains("rate limit")
            || fault.header("x-ratelimit-remaining") == Some("0"))
}

fn is_unauthorised(fault: &Fault) -> bool {
    fault.status == Some(401)
}

fn is_not_found(fault: &Fault) -> bool {
    fault.status == Some(404)
}

fn is_conflict(fault: &Fault) -> bool {
    fault.status == Some(409)
}

const fn is_validation(fault: &Fault) -> bool {
    matches!(fault.status, Some(400 | 422))
}

fn is_server_error(fault: &Fault) -> bool {
    fault.status.is_some_and(|status| status >= 500)
}

const fn always(_fault: &Fault) -> bool {
    true
}
