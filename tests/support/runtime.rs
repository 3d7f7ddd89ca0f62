//! Runtime and mock GitHub API shared by behavioural tests.
//!
//! Step functions are synchronous, so async work is driven through a runtime
//! kept in an `rstest-bdd` slot next to the `wiremock` server it serves.

use std::future::Future;
use std::io;
use std::rc::Rc;

use rstest_bdd::Slot;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Reset instant far enough ahead that the quota never looks stale.
const QUOTA_RESET: u64 = 4_102_444_800;

/// Cloneable handle to a Tokio runtime owned by one scenario.
#[derive(Clone)]
pub struct SharedRuntime(Rc<Runtime>);

impl SharedRuntime {
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.0.block_on(future)
    }

    /// Counts the requests the server received for `request_path`.
    pub fn requests_to(&self, server: &MockServer, request_path: &str) -> usize {
        self.block_on(server.received_requests())
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

/// Starts the scenario runtime and a mock GitHub API with an ample quota.
///
/// Later calls reuse whatever the slots already hold.
///
/// # Errors
///
/// Returns an error if the Tokio runtime cannot be created.
pub fn start_github_api(
    runtime: &Slot<SharedRuntime>,
    server: &Slot<MockServer>,
) -> io::Result<SharedRuntime> {
    if runtime.with_ref(|_| ()).is_none() {
        runtime.set(SharedRuntime(Rc::new(Runtime::new()?)));
    }
    let shared = runtime
        .get()
        .ok_or_else(|| io::Error::other("runtime slot is empty after set"))?;

    if server.with_ref(|_| ()).is_none() {
        let started = shared.block_on(MockServer::start());
        shared.block_on(
            Mock::given(method("GET"))
                .and(path("/rate_limit"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "resources": {
                        "core": { "limit": 5000, "used": 0, "remaining": 5000, "reset": QUOTA_RESET }
                    }
                })))
                .mount(&started),
        );
        server.set(started);
    }

    Ok(shared)
}
