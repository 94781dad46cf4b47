//! Wire-level tests of the emulator backend against a mock HTTP server.

use futures::StreamExt;
use rulebench_core::{
    Backend, BackendError, CollectionPath, DatasetId, DocumentPath, Identity, Operation, Outcome,
    Principal, Write, fields,
};
use rulebench_emulator::{EmulatorBackend, EmulatorConfig, Readiness};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

fn dataset() -> DatasetId {
    DatasetId::new("demo").unwrap()
}

fn backend(server: &MockServer) -> EmulatorBackend {
    let config = EmulatorConfig::new(server.uri())
        .unwrap()
        .with_readiness(Readiness::immediate());
    EmulatorBackend::new(config).unwrap()
}

fn doc(p: &str) -> DocumentPath {
    DocumentPath::parse(p).unwrap()
}

fn denied_body() -> serde_json::Value {
    json!({"error": {
        "code": 403,
        "message": "false for 'create' @ L6",
        "status": "PERMISSION_DENIED"
    }})
}

#[tokio::test]
async fn admin_set_sends_owner_token_and_typed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/pax/john", DOCS)))
        .and(header("authorization", "Bearer owner"))
        .and(body_json(json!({"fields": {"is_supervisor": {"booleanValue": true}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/pax/john",
            "fields": {"is_supervisor": {"booleanValue": true}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let admin = backend(&server).open_session(Principal::Admin, &dataset()).await.unwrap();
    let outcome = admin
        .execute(&Operation::set(doc("pax/john"), fields([("is_supervisor", json!(true))])))
        .await
        .unwrap();
    assert!(outcome.is_allowed());
}

#[tokio::test]
async fn anonymous_create_surfaces_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/pax", DOCS)))
        .and(query_param("documentId", "alice"))
        .respond_with(ResponseTemplate::new(403).set_body_json(denied_body()))
        .expect(1)
        .mount(&server)
        .await;

    let anon = backend(&server)
        .open_session(Principal::User(Identity::Anonymous), &dataset())
        .await
        .unwrap();
    let err = anon
        .execute(&Operation::create(doc("pax/alice"), fields([("name", json!("Alice"))])))
        .await
        .unwrap_err();
    assert!(err.is_policy_denial(), "unexpected error {err:?}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn identity_session_sends_unsigned_jwt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pax/alice", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/pax/alice",
            "fields": {"name": {"stringValue": "Alice"}}
        })))
        .mount(&server)
        .await;

    let alice = backend(&server)
        .open_session(Principal::User(Identity::user("alice")), &dataset())
        .await
        .unwrap();
    let outcome = alice.execute(&Operation::read(doc("pax/alice"))).await.unwrap();
    assert_eq!(outcome.document().and_then(|d| d.get("name")), Some(&json!("Alice")));

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("Bearer "));
    assert!(auth.ends_with('.'), "token must carry an empty signature");
}

#[tokio::test]
async fn read_of_missing_document_is_allowed_and_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pax/ghost", DOCS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "not found", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let alice = backend(&server)
        .open_session(Principal::User(Identity::user("ghost")), &dataset())
        .await
        .unwrap();
    let outcome = alice.execute(&Operation::read(doc("pax/ghost"))).await.unwrap();
    assert!(outcome.is_allowed());
    assert!(outcome.document().is_none());
}

#[tokio::test]
async fn update_sends_mask_and_existence_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/pax/alice", DOCS)))
        .and(query_param("currentDocument.exists", "true"))
        .and(query_param("updateMask.fieldPaths", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let alice = backend(&server)
        .open_session(Principal::User(Identity::user("alice")), &dataset())
        .await
        .unwrap();
    let outcome = alice
        .execute(&Operation::update(doc("pax/alice"), fields([("name", json!("Alice 2"))])))
        .await
        .unwrap();
    assert!(outcome.is_allowed());
}

#[tokio::test]
async fn update_of_missing_document_is_not_a_denial() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "no entity to update", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let alice = backend(&server)
        .open_session(Principal::User(Identity::user("alice")), &dataset())
        .await
        .unwrap();
    let err = alice
        .execute(&Operation::update(doc("pax/alice"), fields([("name", json!("x"))])))
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::NotFound("pax/alice".to_string()));
}

#[tokio::test]
async fn list_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pax", DOCS)))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"name": "projects/demo/databases/(default)/documents/pax/bob"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pax", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"name": "projects/demo/databases/(default)/documents/pax/alice"}],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    let admin = backend(&server).open_session(Principal::Admin, &dataset()).await.unwrap();
    let outcome = admin
        .execute(&Operation::list(CollectionPath::parse("pax").unwrap()))
        .await
        .unwrap();
    let ids: Vec<&str> = outcome.documents().iter().map(|d| d.path.id()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
}

#[tokio::test]
async fn batch_write_reports_denial_in_band() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:batchWrite", DOCS)))
        .and(body_partial_json(json!({
            "writes": [{"delete": "projects/demo/databases/(default)/documents/pax/bob"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{}],
            "status": [{"code": 7, "message": "false for 'delete'"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let alice = backend(&server)
        .open_session(Principal::User(Identity::user("alice")), &dataset())
        .await
        .unwrap();
    let outcome = alice
        .execute(&Operation::batch_write(vec![Write::Delete { path: doc("pax/bob") }]))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Denied { reason: Some(r) } if r.contains("delete")));
}

#[tokio::test]
async fn clear_and_rules_hit_emulator_control_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/emulator/v1/projects/demo/databases/(default)/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/emulator/v1/projects/demo:securityRules"))
        .and(body_partial_json(json!({
            "rules": {"files": [{"content": "rules_version = '2';"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.clear_dataset(&dataset()).await.unwrap();
    backend.clear_dataset(&dataset()).await.unwrap();
    backend.load_rules(&dataset(), "rules_version = '2';").await.unwrap();
}

#[tokio::test]
async fn rules_compile_error_is_not_a_denial() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Unexpected token", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server).load_rules(&dataset(), "garbage").await.unwrap_err();
    assert!(matches!(err, BackendError::Status { code: 400, .. }));
}

#[tokio::test]
async fn coverage_report_streams_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/emulator/v1/projects/demo:ruleCoverage.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>coverage</html>"))
        .mount(&server)
        .await;

    let mut stream = backend(&server).coverage_report(&dataset()).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.unwrap());
    }
    assert_eq!(String::from_utf8(body).unwrap(), "<html>coverage</html>");
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let config = EmulatorConfig::new(server.uri())
        .unwrap()
        .with_request_timeout(Duration::from_millis(50));
    let backend = EmulatorBackend::new(config).unwrap();
    let admin = backend.open_session(Principal::Admin, &dataset()).await.unwrap();
    let err = admin.execute(&Operation::read(doc("pax/alice"))).await.unwrap_err();
    assert!(matches!(err, BackendError::Timeout(_)), "unexpected {err:?}");
}

#[tokio::test]
async fn ping_accepts_any_http_answer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok"))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).ping().await.unwrap();
}

#[tokio::test]
async fn closed_session_rejects_operations() {
    let server = MockServer::start().await;
    let admin = backend(&server).open_session(Principal::Admin, &dataset()).await.unwrap();
    admin.close().await;
    admin.close().await;

    let err = admin.execute(&Operation::read(doc("pax/alice"))).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn ping_gives_up_on_unreachable_host_after_deadline() {
    let readiness = Readiness::default()
        .with_deadline(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(50));
    let config = EmulatorConfig::new("127.0.0.1:1").unwrap().with_readiness(readiness);
    let err = EmulatorBackend::new(config).unwrap().ping().await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_) | BackendError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn oversized_integer_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let admin = backend(&server).open_session(Principal::Admin, &dataset()).await.unwrap();

    let err = admin
        .execute(&Operation::set(doc("pax/alice"), fields([("visits", json!(u64::MAX))])))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Codec(_)), "unexpected {err:?}");

    let batch = Operation::batch_write(vec![Write::Set {
        path: doc("pax/bob"),
        fields: fields([("visits", json!(u64::MAX))]),
    }]);
    assert!(matches!(admin.execute(&batch).await, Err(BackendError::Codec(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}
