//! Runs process documents from disk against a stand-in orchestrator.

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use stepwise::{RuntimeConfig, Stepwise};
use stepwise_stdlib::OrchestratorAuth;
use stepwise_test_utils::{assert_visit_order, sample_process_json, sample_process_yaml};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_JOBS: &str = "/odata/Jobs/UiPath.Server.Configuration.OData.StartJobs";

fn live_config(server: &MockServer, dir: &tempfile::TempDir) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.logging.log_file = dir.path().join("process.log");
    config.orchestrator.mock = false;
    config.orchestrator.orchestrator_url = server.uri();
    config.orchestrator.auth = Some(OrchestratorAuth::Static {
        token: "test-token".into(),
    });
    config.interpreter.job_retry_delay_ms = 10;
    config
}

#[tokio::test]
async fn test_legacy_json_document_against_orchestrator() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/odata/Releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"Key": "rk-create"}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(START_JOBS))
        .and(body_partial_json(json!({"startInfo": {"ReleaseKey": "rk-create"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"value": [{"Id": 314}]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let document = dir.path().join("process_flow.json");
    std::fs::write(&document, sample_process_json())?;

    let config = live_config(&server, &dir);
    let log_file = config.logging.log_file.clone();
    let stepwise = Stepwise::builder().config(config).build()?;

    let summary = stepwise.run_file(&document).await?;

    assert_eq!(summary.process_name, "DMS Service Flow");
    assert_eq!((summary.succeeded, summary.failed, summary.skipped), (3, 0, 0));
    assert_eq!(summary.branches_taken, 1);
    assert_eq!(
        assert_visit_order(
            &summary,
            &["Preprocess Customer", "Trigger CreateService", "Wait Short", "Check Preprocessing"]
        ),
        Ok(())
    );
    assert_eq!(
        summary.outcome("Preprocess Customer").unwrap().output,
        Some(json!({"name": "Ali Veli", "phone": "905551234567"}))
    );
    assert_eq!(
        summary.outcome("Trigger CreateService").unwrap().output.as_ref().unwrap()["job_id"],
        "314"
    );

    let audit = std::fs::read_to_string(log_file)?;
    assert!(audit.contains("DMS Service Flow / Trigger CreateService"));
    assert!(audit.contains("flow completed: 3 succeeded, 0 failed, 0 skipped"));
    Ok(())
}

#[tokio::test]
async fn test_yaml_document_with_rejecting_orchestrator() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/odata/Releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"Key": "rk-rec"}]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(START_JOBS))
        .respond_with(ResponseTemplate::new(500).set_body_string("orchestrator down"))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let document = dir.path().join("nightly.yml");
    std::fs::write(&document, sample_process_yaml())?;

    let stepwise = Stepwise::builder().config(live_config(&server, &dir)).build()?;
    let summary = stepwise.run_file(&document).await?;

    // transform ok, trigger exhausted its 2 attempts, branch fell through, email skipped
    assert_eq!((summary.succeeded, summary.failed, summary.skipped), (1, 1, 1));
    let failure = summary.outcome("Start Reconciliation").unwrap().error.clone().unwrap();
    assert_eq!(failure.kind, "ERR_RETRY_EXHAUSTED");
    assert!(failure.message.contains("orchestrator down"), "{}", failure.message);
    assert!(summary.outcome("Cool Down").is_none());
    Ok(())
}

#[tokio::test]
async fn test_unreadable_document_is_reported_before_running() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let document = dir.path().join("flow.toml");
    std::fs::write(&document, "name = 'x'")?;

    let mut config = RuntimeConfig::default();
    config.logging.log_file = dir.path().join("process.log");
    let stepwise = Stepwise::builder().config(config).build()?;

    let err = stepwise.run_file(&document).await.unwrap_err();
    assert_eq!(err.error_code(), "ERR_DSL_UNSUPPORTED_FORMAT");
    Ok(())
}
