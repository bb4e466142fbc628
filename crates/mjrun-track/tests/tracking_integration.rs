//! Integration tests for the tracking client
//!
//! These tests run the client against a mocked tracking API.

#![allow(clippy::needless_raw_string_hashes)]
#![allow(clippy::unreadable_literal)]

use mjrun_core::{ConfigFile, FixedClock, LaunchOptions, Overrides, Resolver};
use mjrun_track::{InitRequest, TrackingClient, TrackingError};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolved_request(resume: bool) -> InitRequest {
    let file = ConfigFile::parse(
        "config.toml",
        "[env]\nname = \"Ant\"\n[train]\nseed = 7\nlearning_rate = 0.0003\n",
    )
    .unwrap();
    let launch = LaunchOptions {
        wandb_group: Some("ablations".to_string()),
        exp_id: Some("run12345".to_string()),
        track: true,
        ..LaunchOptions::default()
    };
    let run = Resolver::with_clock(FixedClock::from_timestamp(1_700_000_000))
        .resolve(&file, &launch, &Overrides::new())
        .unwrap();
    InitRequest::from_run(&run, resume).unwrap()
}

fn upsert_response(inserted: bool) -> Value {
    json!({
        "data": {
            "upsertBucket": {
                "bucket": {
                    "id": "UnVuOnYxOnJ1bjEyMzQ1",
                    "name": "run12345",
                    "displayName": "Ant-v4_7_1700000000",
                    "project": {
                        "name": "mujoco",
                        "entity": { "name": "lab" }
                    }
                },
                "inserted": inserted
            }
        }
    })
}

#[tokio::test]
async fn test_init_creates_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Basic YXBpOnNlY3JldA=="))
        .and(body_partial_json(json!({
            "variables": {
                "id": "run12345",
                "project": "mujoco",
                "groupName": "ablations",
                "displayName": "Ant-v4_7_1700000000"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(true)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = TrackingClient::new(mock_server.uri()).with_api_key("secret");
    let session = client.init(&resolved_request(true)).await.unwrap();

    assert_eq!(session.id, "run12345");
    assert_eq!(session.name, "Ant-v4_7_1700000000");
    assert_eq!(session.project, "mujoco");
    assert_eq!(session.entity.as_deref(), Some("lab"));
    assert_eq!(session.group.as_deref(), Some("ablations"));
    assert!(!session.resumed);
    assert_eq!(
        session.url,
        Some(format!("{}/lab/mujoco/runs/run12345", mock_server.uri()))
    );
}

#[tokio::test]
async fn test_init_forwards_config_unchanged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(true)))
        .mount(&mock_server)
        .await;

    let request = resolved_request(true);
    TrackingClient::new(mock_server.uri())
        .init(&request)
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let body: Value = received[0].body_json().unwrap();
    let config: Value =
        serde_json::from_str(body["variables"]["config"].as_str().unwrap()).unwrap();

    for (key, value) in &request.config {
        assert_eq!(&config[key]["value"], value, "config key {key} changed");
    }
    assert_eq!(config["train"]["value"]["seed"], 7);
    assert_eq!(config["_wandb"]["value"]["allow_val_change"], true);
}

#[tokio::test]
async fn test_existing_run_is_resumed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(false)))
        .mount(&mock_server)
        .await;

    let session = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(true))
        .await
        .unwrap();
    assert!(session.resumed);
}

fn run_exists_response(exists: bool) -> Value {
    let run = if exists { json!({ "id": "UnVuOnYxOnJ1bjEyMzQ1" }) } else { Value::Null };
    json!({ "data": { "project": { "run": run } } })
}

#[tokio::test]
async fn test_existing_run_without_resume_is_left_untouched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query RunExists"))
        .and(body_partial_json(json!({
            "variables": { "project": "mujoco", "name": "run12345" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_exists_response(true)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("upsertBucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(false)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(false))
        .await
        .unwrap_err();

    match err.downcast_ref::<TrackingError>() {
        Some(TrackingError::RunAlreadyExists { id }) => assert_eq!(id, "run12345"),
        other => panic!("Expected RunAlreadyExists, got {other:?}"),
    }
}

#[tokio::test]
async fn test_new_run_without_resume_is_created() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query RunExists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_exists_response(false)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("upsertBucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(true)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(false))
        .await
        .unwrap();
    assert!(!session.resumed);
    assert_eq!(session.id, "run12345");
}

#[tokio::test]
async fn test_run_created_concurrently_without_resume_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query RunExists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_exists_response(false)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("upsertBucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(false)))
        .mount(&mock_server)
        .await;

    let err = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(false))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TrackingError>(),
        Some(TrackingError::RunAlreadyExists { .. })
    ));
}

#[tokio::test]
async fn test_resume_skips_existence_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query RunExists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_exists_response(true)))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("upsertBucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upsert_response(false)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(true))
        .await
        .unwrap();
    assert!(session.resumed);
}

#[tokio::test]
async fn test_graphql_errors_propagate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "project not found" }]
        })))
        .mount(&mock_server)
        .await;

    let err = TrackingClient::new(mock_server.uri())
        .init(&resolved_request(true))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("project not found"));
}

#[tokio::test]
async fn test_http_error_status_propagates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let err = TrackingClient::new(mock_server.uri())
        .with_api_key("wrong")
        .init(&resolved_request(true))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("401"));
    assert!(message.contains("invalid api key"));
}

#[tokio::test]
async fn test_entity_falls_back_to_client_setting() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "entity": "team" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "upsertBucket": {
                    "bucket": { "name": "run12345" },
                    "inserted": true
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let session = TrackingClient::new(mock_server.uri())
        .with_entity("team")
        .init(&resolved_request(true))
        .await
        .unwrap();

    assert_eq!(session.entity.as_deref(), Some("team"));
    assert_eq!(session.name, "Ant-v4_7_1700000000");
    assert_eq!(session.project, "mujoco");
}
