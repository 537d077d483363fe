//! Pipeline submission, polling, and cancellation against a mocked tenant.

use imclient::models::{
    Import, Pipeline, PipelineRun, PipelineState, PipelineStatus, Purge, StageModule, XmlImport,
};
use imclient::{Error, Tenant, TenantBuilder};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tenant_for(server: &MockServer) -> Tenant {
    TenantBuilder::new("test")
        .base_url(server.uri())
        .build()
        .expect("client")
}

fn running_pipeline(seq: &str) -> Pipeline {
    serde_json::from_value(json!({
        "pipelineRunSeq": seq,
        "command": "PipelineRun",
        "state": "Running",
    }))
    .expect("pipeline fixture")
}

#[tokio::test]
async fn run_pipeline_submits_and_fetches_created_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelines": {"0": ["4711"]},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/pipelines(4711)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelineRunSeq": "4711",
            "command": "XMLImport",
            "state": "Running",
            "runProgress": "5%",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let job = XmlImport::new("plan.xml", "<xml></xml>", true);
    let pipeline = client.run_pipeline(&job).await.unwrap();

    assert_eq!(pipeline.pipeline_run_seq, "4711");
    assert_eq!(pipeline.command.as_deref(), Some("XMLImport"));
    assert_eq!(pipeline.state, PipelineState::Running);

    // The submission body follows the single-element batch convention.
    let requests = server.received_requests().await.unwrap();
    let submitted: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(submitted[0]["command"], "XMLImport");
    assert_eq!(submitted[0]["xmlFileName"], "plan.xml");
}

#[tokio::test]
async fn run_pipeline_rejection_surfaces_submission_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "pipelines": {"0": "TCMP_09012:E: Unable to obtain access."},
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let job = Purge::new("batch.txt", StageModule::TransactionalData);
    let err = client.run_pipeline(&job).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
    assert!(err.to_string().contains("TCMP_09012"));
}

#[tokio::test]
async fn run_pipeline_rejection_without_index_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "pipelines": {},
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let job = Import::validate("1", "batch.txt", StageModule::TransactionalData);
    let err = client.run_pipeline(&job).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test]
async fn run_pipeline_success_without_pipelines_key_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bacon": {}})))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let job = PipelineRun::classify("1", "2");
    let err = client.run_pipeline(&job).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test]
async fn poll_by_read_until_terminal() {
    let server = MockServer::start().await;
    // First poll still running, second poll done. Mount order decides which
    // mock answers first.
    Mock::given(method("GET"))
        .and(path("/api/v2/pipelines(4711)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelineRunSeq": "4711",
            "state": "Running",
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/pipelines(4711)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pipelineRunSeq": "4711",
            "state": "Done",
            "status": "Successful",
            "numErrors": 0,
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let mut pipeline = running_pipeline("4711");
    while !pipeline.state.is_terminal() {
        pipeline = client.read(&pipeline).await.unwrap();
    }
    assert_eq!(pipeline.status, Some(PipelineStatus::Successful));
    assert_eq!(pipeline.num_errors, Some(0));
}

#[tokio::test]
async fn cancel_pipeline_acknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/pipelines(4711)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "4711": "cancel pending",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    assert!(client.cancel_pipeline(&running_pipeline("4711")).await.unwrap());
}

#[tokio::test]
async fn cancel_race_reports_success() {
    let server = MockServer::start().await;
    // Vendor quirk: the grid already finished the job, the cancel fails
    // with TCMP_60255, and the run state is unaffected.
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "4711": "TCMP_60255:E: An error occurred while attempting to delete a job.",
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    assert!(client.cancel_pipeline(&running_pipeline("4711")).await.unwrap());
}

#[tokio::test]
async fn cancel_other_error_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "4711": "TCMP_09012:E: Unable to obtain access.",
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let err = client.cancel_pipeline(&running_pipeline("4711")).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
    assert!(err.to_string().contains("TCMP_09012"));
}

#[tokio::test]
async fn cancel_success_not_keyed_by_run_seq_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "someone-else": "cancel pending",
        })))
        .mount(&server)
        .await;

    let client = tenant_for(&server);
    let err = client.cancel_pipeline(&running_pipeline("4711")).await.unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}
