//! End-to-end tests for the HTTP API.
//!
//! Each test starts a real server on a random port over in-memory backends
//! and drives it with an HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use companynotes::config::{AuthConfig, Environment, ServerConfig};
use companynotes::identity::IdentityResolver;
use companynotes::server::{self, AppState, RunningServer};
use companynotes::store::{
    CompanyDirectory, MemoryBackend, MemoryCompanies, NoteStore, ResolvedBackend,
};
use companynotes::summary::Summarizer;
use companynotes::{Company, Error};

#[derive(Debug)]
struct CannedSummarizer;

#[async_trait]
impl Summarizer for CannedSummarizer {
    async fn summarize(&self, company: &Company) -> companynotes::Result<String> {
        Ok(format!("{} builds things.", company.name))
    }
}

#[derive(Debug)]
struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _company: &Company) -> companynotes::Result<String> {
        Err(Error::summary("quota exceeded"))
    }
}

fn acme() -> Company {
    Company {
        id: 1,
        name: "Acme".to_string(),
        description: "Anvils".to_string(),
        sector: "Manufacturing".to_string(),
        employees: 120,
        website: "https://acme.example".to_string(),
    }
}

struct TestServer {
    base: String,
    client: Client,
    running: RunningServer,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn shutdown(self) {
        self.running.shutdown().await;
    }
}

struct Options {
    environment: Environment,
    companies: Option<Arc<dyn CompanyDirectory>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    body_limit_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            companies: Some(Arc::new(MemoryCompanies::new(vec![acme()]))),
            summarizer: Some(Arc::new(CannedSummarizer)),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

async fn start(options: Options) -> TestServer {
    let store = NoteStore::new(ResolvedBackend::from_parts(
        Arc::new(MemoryBackend::new()),
        options.companies,
    ));
    let auth = AuthConfig {
        environment: options.environment,
        ..AuthConfig::default()
    };
    let state = AppState::new(
        store,
        IdentityResolver::from_config(&auth).unwrap(),
        options.summarizer,
    );
    let server_config = ServerConfig {
        body_limit_bytes: options.body_limit_bytes,
        ..ServerConfig::default()
    };

    let running = server::start_server("127.0.0.1:0", server::router(state, &server_config))
        .await
        .unwrap();
    TestServer {
        base: format!("http://{}", running.local_addr()),
        client: Client::new(),
        running,
    }
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

async fn create_note(server: &TestServer, user: &str, content: &str, private: bool) -> Value {
    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", user)
        .json(&json!({ "companyId": 1, "content": content, "isPrivate": private }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body(response).await["note"].clone()
}

async fn note_ids(server: &TestServer, user: &str) -> Vec<String> {
    let response = server
        .client
        .get(server.url("/companies/1/notes"))
        .header("x-user-id", user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body(response).await["notes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let server = start(Options::default()).await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["time"].as_str().unwrap().ends_with('Z'));

    server.shutdown().await;
}

#[tokio::test]
async fn test_list_companies() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .get(server.url("/companies"))
        .header("x-user-id", "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body(response).await;
    assert_eq!(json["companies"][0]["name"], "Acme");
    assert_eq!(json["companies"][0]["employees"], 120);

    server.shutdown().await;
}

#[tokio::test]
async fn test_companies_without_directory_is_unavailable() {
    let server = start(Options {
        companies: None,
        ..Options::default()
    })
    .await;

    let response = server.client.get(server.url("/companies")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("not configured"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_note_lifecycle() {
    let server = start(Options::default()).await;

    let note = create_note(&server, "user-1", "First note", true).await;
    let id = note["id"].as_str().unwrap().to_string();
    assert_eq!(note["userId"], "user-1");
    assert_eq!(note["isPrivate"], true);
    assert_eq!(note["companyId"], 1);

    assert!(note_ids(&server, "user-1").await.contains(&id));
    assert!(!note_ids(&server, "user-2").await.contains(&id));

    let response = server
        .client
        .put(server.url(&format!("/notes/{id}")))
        .header("x-user-id", "user-1")
        .json(&json!({ "content": "Updated", "isPrivate": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(response).await;
    assert_eq!(updated["note"]["content"], "Updated");
    assert_eq!(updated["note"]["createdAt"], note["createdAt"]);
    assert!(note_ids(&server, "user-2").await.contains(&id));

    let response = server
        .client
        .delete(server.url(&format!("/notes/{id}")))
        .header("x-user-id", "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.bytes().await.unwrap().is_empty());

    assert!(!note_ids(&server, "user-1").await.contains(&id));
    assert!(!note_ids(&server, "user-2").await.contains(&id));

    server.shutdown().await;
}

#[tokio::test]
async fn test_non_owner_cannot_modify() {
    let server = start(Options::default()).await;
    let note = create_note(&server, "user-1", "Public note", false).await;
    let path = format!("/notes/{}", note["id"].as_str().unwrap());

    let response = server
        .client
        .put(server.url(&path))
        .header("x-user-id", "user-2")
        .json(&json!({ "content": "hijack" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(response).await["error"], "Not authorized to edit this note");

    let response = server
        .client
        .delete(server.url(&path))
        .header("x-user-id", "user-2")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body(response).await["error"],
        "Not authorized to delete this note"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_note_is_not_found() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .put(server.url("/notes/missing"))
        .header("x-user-id", "user-1")
        .json(&json!({ "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(response).await["error"], "Note not found");

    let response = server
        .client
        .delete(server.url("/notes/missing"))
        .header("x-user-id", "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.shutdown().await;
}

#[tokio::test]
async fn test_request_validation() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .get(server.url("/companies/abc/notes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "Invalid company id");

    for payload in [
        json!({ "companyId": 1 }),
        json!({ "companyId": 1, "content": "" }),
        json!({ "content": "orphan" }),
    ] {
        let response = server
            .client
            .post(server.url("/notes"))
            .header("x-user-id", "user-1")
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(
            body(response).await["error"],
            "companyId and content are required"
        );
    }

    let note = create_note(&server, "user-1", "keep", false).await;
    let response = server
        .client
        .put(server.url(&format!("/notes/{}", note["id"].as_str().unwrap())))
        .header("x-user-id", "user-1")
        .json(&json!({ "isPrivate": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "content is required");

    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", "user-1")
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await["error"].is_string());

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_body_gets_short_reason() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", "user-1")
        .json(&json!({ "companyId": "one", "content": "typed wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "Invalid JSON body");

    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", "user-1")
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "Invalid JSON body");

    server.shutdown().await;
}

#[tokio::test]
async fn test_dev_fallback_uses_default_user() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .post(server.url("/notes"))
        .json(&json!({ "companyId": 1, "content": "no header" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body(response).await["note"]["userId"], "dev-user");

    server.shutdown().await;
}

#[tokio::test]
async fn test_production_requires_identity() {
    let server = start(Options {
        environment: Environment::Production,
        ..Options::default()
    })
    .await;

    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", "user-1")
        .json(&json!({ "companyId": 1, "content": "asserted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(response).await["error"], "Authentication required");

    let response = server.client.get(server.url("/companies")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .client
        .get(server.url("/companies/1/notes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["notes"], json!([]));

    server.shutdown().await;
}

#[tokio::test]
async fn test_summaries() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({ "companyId": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body(response).await;
    assert_eq!(json["companyId"], 1);
    assert_eq!(json["summary"], "Acme builds things.");

    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({ "companyId": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "companyId is required");

    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({ "companyId": 99 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(response).await["error"], "Company not found");

    server.shutdown().await;
}

#[tokio::test]
async fn test_summaries_unconfigured_and_failing() {
    let server = start(Options {
        summarizer: None,
        ..Options::default()
    })
    .await;
    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({ "companyId": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    server.shutdown().await;

    let server = start(Options {
        summarizer: Some(Arc::new(FailingSummarizer)),
        ..Options::default()
    })
    .await;
    let response = server
        .client
        .post(server.url("/summaries"))
        .json(&json!({ "companyId": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body(response).await["error"].clone();
    assert_eq!(error, "Failed to generate summary");
    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let server = start(Options {
        body_limit_bytes: 64,
        ..Options::default()
    })
    .await;

    let response = server
        .client
        .post(server.url("/notes"))
        .header("x-user-id", "user-1")
        .json(&json!({ "companyId": 1, "content": "x".repeat(256) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    server.shutdown().await;
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = start(Options::default()).await;

    let response = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/notes"))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );

    server.shutdown().await;
}
