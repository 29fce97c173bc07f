//! Shared DSpace mock server fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use dspace_uploader::app::client::ClientConfig;
use dspace_uploader::auth::Credentials;

pub const API: &str = "/server/api";
pub const WORKSPACE_ITEM: &str = r"^/server/api/submission/workspaceitems/\d+$";
pub const UPLOAD_SECTION: &str = r"^/server/api/submission/workspaceitems/\d+/sections/upload$";

pub fn api(endpoint: &str) -> String {
    format!("{}/{}", API, endpoint)
}

/// Client configuration pointing at the mock server, without throttling
pub fn client_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        rate_limit_rps: 1000,
        ..ClientConfig::for_server(server.uri())
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("archivist@example.org", "secret")
}

/// Probe, CSRF and login endpoints; login returns `Bearer <bearer>`
pub async fn mount_login(server: &MockServer, csrf: &str, bearer: &str) {
    Mock::given(method("GET"))
        .and(path(api("core/collections")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "_embedded": { "collections": [] } })),
        )
        .with_priority(10)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(api("security/csrf")))
        .respond_with(ResponseTemplate::new(204).insert_header("DSPACE-XSRF-TOKEN", csrf))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api("authn/login")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Authorization", format!("Bearer {}", bearer).as_str()),
        )
        .mount(server)
        .await;
}

/// Answers workspace creation with increasing ids
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Respond for SequentialIds {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(201).set_body_json(json!({ "id": id, "type": "workspaceitem" }))
    }
}

/// Workspace state as returned by GET, with optional upload and license data
pub fn workspace_body(id: u64, files: &[&str], license_granted: bool) -> serde_json::Value {
    let files: Vec<_> = files
        .iter()
        .map(|name| json!({ "metadata": { "dc.title": [{ "value": name }] } }))
        .collect();
    json!({
        "id": id,
        "sections": {
            "upload": { "files": files },
            "license": { "granted": license_granted }
        }
    })
}

/// Every workflow step answers successfully
pub async fn mount_happy_workflow(server: &MockServer, first_id: u64, workflow_id: u64) {
    Mock::given(method("POST"))
        .and(path(api("submission/workspaceitems")))
        .respond_with(SequentialIds::starting_at(first_id))
        .mount(server)
        .await;

    Mock::given(method("PATCH"))
        .and(path_regex(WORKSPACE_ITEM))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .with_priority(10)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(UPLOAD_SECTION))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .with_priority(10)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(WORKSPACE_ITEM))
        .respond_with(ResponseTemplate::new(200).set_body_json(workspace_body(
            first_id,
            &["doc.pdf"],
            true,
        )))
        .with_priority(10)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api("workflow/workflowitems")))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": workflow_id, "type": "workflowitem" })),
        )
        .with_priority(10)
        .mount(server)
        .await;
}

/// Item folder with a title-only `metadata.xml` and a small PDF
pub fn make_item_folder(root: &Path, name: &str, title: &str) -> PathBuf {
    let folder = root.join(name);
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(
        folder.join("metadata.xml"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<dublin_core>
  <dcvalue element="title" qualifier="none">{}</dcvalue>
  <dcvalue element="contributor" qualifier="author">Doe, Jane</dcvalue>
</dublin_core>
"#,
            title
        ),
    )
    .unwrap();
    std::fs::write(folder.join("doc.pdf"), b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n").unwrap();
    folder
}

/// Requests received by the server with the given method
pub async fn requests_with_method(server: &MockServer, verb: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb)
        .collect()
}

/// Workspace creation calls received so far
pub async fn creation_requests(server: &MockServer) -> Vec<Request> {
    requests_with_method(server, "POST")
        .await
        .into_iter()
        .filter(|r| r.url.path() == api("submission/workspaceitems"))
        .collect()
}
