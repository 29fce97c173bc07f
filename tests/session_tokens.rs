//! Session contract tests: CSRF acquisition and rotation, login, re-login
//! and collection listing against a mock DSpace server.

mod common;

use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api, client_config, credentials, mount_login, requests_with_method};
use dspace_uploader::app::client::{ClientConfig, DspaceSession, SubmissionDriver};
use dspace_uploader::app::models::{MetadataPatch, MetadataValue};
use dspace_uploader::errors::{AuthError, SubmissionError};

#[tokio::test]
async fn test_requests_carry_latest_rotated_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api("core/collections")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api("security/csrf")))
        .respond_with(ResponseTemplate::new(204).insert_header("DSPACE-XSRF-TOKEN", "t1"))
        .expect(1)
        .mount(&server)
        .await;

    // Login must present t1 and rotates to t2
    Mock::given(method("POST"))
        .and(path(api("authn/login")))
        .and(header("X-XSRF-TOKEN", "t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Authorization", "Bearer b1")
                .insert_header("DSPACE-XSRF-TOKEN", "t2"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Creation must present t2 and rotates to t3 through a cookie
    Mock::given(method("POST"))
        .and(path(api("submission/workspaceitems")))
        .and(header("X-XSRF-TOKEN", "t2"))
        .and(header("Authorization", "Bearer b1"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Set-Cookie", "DSPACE-XSRF-COOKIE=t3; Path=/server")
                .set_body_json(json!({ "id": 7 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Metadata patch must present t3 and rotates to t4 through the body
    Mock::given(method("PATCH"))
        .and(path(api("submission/workspaceitems/7")))
        .and(header("X-XSRF-TOKEN", "t3"))
        .and(header("Content-Type", "application/json-patch+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "token": "t4" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = DspaceSession::connect(&client_config(&server), credentials())
        .await
        .unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.bearer_token(), Some("Bearer b1"));
    assert_eq!(session.csrf_token(), Some("t2"));

    let mut patch = MetadataPatch::new();
    patch.add_field("traditionalpageone", "dc.title", MetadataValue::new("Sample"));

    let mut driver = SubmissionDriver::new(&mut session);
    let mut item = driver.create_workspace_item("c0ffee").await.unwrap();
    assert_eq!(item.id, 7);
    driver.add_metadata(&mut item, &patch).await.unwrap();

    assert_eq!(session.csrf_token(), Some("t4"));
}

#[tokio::test]
async fn test_login_rejection_reports_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api("security/csrf")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("authn/login")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authentication failed"))
        .mount(&server)
        .await;

    let result = DspaceSession::connect(&client_config(&server), credentials()).await;
    match result {
        Err(AuthError::AuthRejected { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Authentication failed"));
        }
        other => panic!("expected AuthRejected, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_csrf_endpoint_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api("security/csrf")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut session = DspaceSession::new(&client_config(&server)).unwrap();
    assert!(matches!(
        session.acquire_csrf().await,
        Err(AuthError::NoTokenFound)
    ));
}

#[tokio::test]
async fn test_csrf_from_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api("security/csrf")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "DSPACE-XSRF-COOKIE=from-cookie; Path=/server"),
        )
        .mount(&server)
        .await;

    let mut session = DspaceSession::new(&client_config(&server)).unwrap();
    assert_eq!(session.acquire_csrf().await.unwrap(), "from-cookie");
    assert_eq!(session.csrf_token(), Some("from-cookie"));
}

#[tokio::test]
async fn test_unreachable_server() {
    let config = ClientConfig {
        rate_limit_rps: 1000,
        ..ClientConfig::for_server("http://127.0.0.1:9")
    };

    let result = DspaceSession::connect(&config, credentials()).await;
    assert!(matches!(
        result,
        Err(AuthError::ConnectionUnreachable { .. })
    ));
}

#[tokio::test]
async fn test_relogin_once_after_expired_session() {
    let server = MockServer::start().await;
    mount_login(&server, "t1", "b1").await;

    Mock::given(method("POST"))
        .and(path(api("submission/workspaceitems")))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("submission/workspaceitems")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 12 })))
        .mount(&server)
        .await;

    let mut session = DspaceSession::connect(&client_config(&server), credentials())
        .await
        .unwrap();
    let item = SubmissionDriver::new(&mut session)
        .create_workspace_item("c0ffee")
        .await
        .unwrap();
    assert_eq!(item.id, 12);

    let logins = requests_with_method(&server, "POST")
        .await
        .into_iter()
        .filter(|r| r.url.path() == api("authn/login"))
        .count();
    assert_eq!(logins, 2);
}

#[tokio::test]
async fn test_second_auth_failure_aborts_step() {
    let server = MockServer::start().await;
    mount_login(&server, "t1", "b1").await;

    Mock::given(method("POST"))
        .and(path(api("submission/workspaceitems")))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = DspaceSession::connect(&client_config(&server), credentials())
        .await
        .unwrap();
    let result = SubmissionDriver::new(&mut session)
        .create_workspace_item("c0ffee")
        .await;

    assert!(matches!(
        result,
        Err(SubmissionError::WorkspaceCreateFailed { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_fetch_missing_workspace_is_none() {
    let server = MockServer::start().await;
    mount_login(&server, "t1", "b1").await;

    Mock::given(method("GET"))
        .and(path_regex(common::WORKSPACE_ITEM))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut session = DspaceSession::connect(&client_config(&server), credentials())
        .await
        .unwrap();
    let state = SubmissionDriver::new(&mut session)
        .fetch_workspace(404)
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_list_collections_follows_pages() {
    let server = MockServer::start().await;
    mount_login(&server, "t1", "b1").await;

    Mock::given(method("GET"))
        .and(path(api("core/collections")))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": { "collections": [{ "uuid": "u-1", "name": "Theses" }] },
            "page": { "number": 0, "totalPages": 2, "size": 100, "totalElements": 2 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("core/collections")))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": { "collections": [{ "uuid": "u-2", "name": "Scans" }] },
            "page": { "number": 1, "totalPages": 2, "size": 100, "totalElements": 2 }
        })))
        .mount(&server)
        .await;

    let mut session = DspaceSession::connect(&client_config(&server), credentials())
        .await
        .unwrap();
    let collections = session.list_collections().await.unwrap();

    let names: Vec<_> = collections.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Theses", "Scans"]);
    assert_eq!(collections[1].uuid, "u-2");
}
