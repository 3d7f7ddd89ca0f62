//! Applies one webhook delivery read from disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use octolens::persistence::SqliteStore;
use octolens::telemetry::{StderrJsonlTelemetrySink, TelemetrySink};
use octolens::{OctolensConfig, Store, WebhookOutcome, WebhookProcessor};
use serde_json::Value;

use super::CliError;
use super::migrations::{map_persistence_error, open_migrated_store, require_database_url};
use super::output::write_webhook_outcome;

/// Applies the configured webhook payload to the local database.
///
/// # Errors
///
/// Returns [`CliError::Configuration`] when the event, payload, or database
/// URL is missing or the payload is not JSON, [`CliError::Webhook`] when the
/// delivery cannot be applied, and [`CliError::Io`] for file or database
/// failures.
pub fn run(config: &OctolensConfig) -> Result<(), CliError> {
    let (event, payload_path) =
        config
            .webhook_source()
            .ok_or_else(|| CliError::Configuration {
                message: "webhook event and payload are both required".to_owned(),
            })?;
    let database_url = require_database_url(config)?;
    let payload = read_payload(Path::new(payload_path))?;

    let telemetry: Arc<dyn TelemetrySink> = Arc::new(StderrJsonlTelemetrySink);
    let store = Arc::new(open_migrated_store(database_url, telemetry.as_ref())?);
    let outcome = apply_delivery(&store, telemetry, event, &payload)?;

    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default();
    write_webhook_outcome(event, action, outcome)
}

/// Applies one delivery, then disconnects the store even when applying fails.
fn apply_delivery(
    store: &Arc<SqliteStore>,
    telemetry: Arc<dyn TelemetrySink>,
    event: &str,
    payload: &Value,
) -> Result<WebhookOutcome, CliError> {
    let shared: Arc<dyn Store> = store.clone();
    let processor = WebhookProcessor::new(shared, telemetry);

    let handled = processor.handle(event, payload);
    let disconnected = store.disconnect();
    let outcome = handled?;
    disconnected.map_err(|error| map_persistence_error(&error))?;
    Ok(outcome)
}

fn read_payload(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|error| CliError::Io {
        message: format!("failed to read webhook payload {}: {error}", path.display()),
    })?;
    serde_json::from_str(&text).map_err(|error| CliError::Configuration {
        message: format!("webhook payload {} is not JSON: {error}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use octolens::persistence::SqliteStore;
    use octolens::telemetry::NoopTelemetrySink;
    use octolens::{OctolensConfig, WebhookError};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    use super::{apply_delivery, run};
    use crate::cli::CliError;

    struct Workspace {
        dir: TempDir,
        database_url: String,
    }

    impl Workspace {
        fn payload(&self, name: &str, body: &str) -> String {
            let path = self.dir.path().join(name);
            fs::write(&path, body).expect("payload should be written");
            path.to_string_lossy().to_string()
        }

        fn config(&self, event: &str, payload_path: String) -> OctolensConfig {
            OctolensConfig {
                database_url: Some(self.database_url.clone()),
                webhook_event: Some(event.to_owned()),
                webhook_payload: Some(payload_path),
                ..Default::default()
            }
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("temporary directory");
        let database_url = dir
            .path()
            .join("octolens.sqlite")
            .to_string_lossy()
            .to_string();
        Workspace { dir, database_url }
    }

    #[rstest]
    fn applies_repository_created(workspace: Workspace) {
        let body = json!({
            "action": "created",
            "repository": {
                "id": 42,
                "name": "cat",
                "full_name": "octo/cat",
                "private": false,
                "html_url": "https://github.com/octo/cat"
            }
        })
        .to_string();
        let path = workspace.payload("created.json", &body);

        run(&workspace.config("repository", path)).expect("delivery should apply");

        let store = SqliteStore::open(&workspace.database_url).expect("database should open");
        store.migrate(&NoopTelemetrySink).expect("schema current");
        let stored = store
            .find_repository("octo/cat")
            .expect("query should succeed")
            .expect("repository should be stored");
        assert_eq!(stored.platform_id, 42);
    }

    #[rstest]
    fn rejects_payloads_that_are_not_json(workspace: Workspace) {
        let path = workspace.payload("broken.json", "{ not json");

        let result = run(&workspace.config("repository", path));

        assert!(matches!(result, Err(CliError::Configuration { .. })));
    }

    #[rstest]
    fn missing_payload_file_is_an_io_error(workspace: Workspace) {
        let path = workspace
            .dir
            .path()
            .join("absent.json")
            .to_string_lossy()
            .to_string();

        let result = run(&workspace.config("repository", path));

        assert!(matches!(result, Err(CliError::Io { .. })));
    }

    #[rstest]
    fn malformed_delivery_surfaces_the_webhook_error(workspace: Workspace) {
        let path = workspace.payload("opened.json", r#"{ "action": "opened" }"#);

        let result = run(&workspace.config("pull_request", path));

        assert!(matches!(result, Err(CliError::Webhook(_))));
    }

    #[rstest]
    fn failed_delivery_still_disconnects_the_store(workspace: Workspace) {
        let store = Arc::new(SqliteStore::open(&workspace.database_url).expect("database"));
        store.migrate(&NoopTelemetrySink).expect("migrations should run");

        let result = apply_delivery(
            &store,
            Arc::new(NoopTelemetrySink),
            "pull_request",
            &json!({ "action": "opened" }),
        );

        assert!(matches!(
            result,
            Err(CliError::Webhook(WebhookError::MalformedPayload { .. }))
        ));
        assert!(!store.is_connected(), "store should be disconnected");
    }
}
