//! Tests for the hosted document backend against an in-process fake of the
//! document service's REST API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use companynotes::config::{BackendKind, Config, HostedConfig};
use companynotes::hosted::HostedBackend;
use companynotes::model::{CreateNote, UpdateNote};
use companynotes::store::{CompanyDirectory, NoteBackend, NoteStore, ResolvedBackend};

const TOKEN: &str = "owner";
const ROOT: &str = "projects/demo/databases/(default)/documents";

#[derive(Debug, Default)]
struct FakeDb {
    /// (collection, id, fields) in insertion order.
    docs: Vec<(String, String, Map<String, Value>)>,
    requests: usize,
}

type Shared = Arc<Mutex<FakeDb>>;

impl FakeDb {
    fn find(&self, collection: &str, id: &str) -> Option<usize> {
        self.docs
            .iter()
            .position(|(c, i, _)| c == collection && i == id)
    }

    fn document(collection: &str, id: &str, fields: &Map<String, Value>) -> Value {
        json!({
            "name": format!("{ROOT}/{collection}/{id}"),
            "fields": fields,
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:00Z",
        })
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
        .into_response()
}

fn query_param<'a>(uri: &'a Uri, name: &str) -> Option<&'a str> {
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

async fn handle(
    State(db): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut db = db.lock().await;
    db.requests += 1;

    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, "Request had invalid credentials");
    }

    let path = uri.path().replace("%28", "(").replace("%29", ")");
    let Some(rest) = path.strip_prefix(&format!("/v1/{ROOT}")) else {
        return error(StatusCode::NOT_FOUND, "unknown path");
    };

    if rest == ":runQuery" && method == Method::POST {
        let request: Value = serde_json::from_slice(&body).unwrap();
        return run_query(&db, &request["structuredQuery"]);
    }

    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::GET, [collection]) => list(&db, collection, &uri),
        (Method::GET, [collection, id]) => match db.find(collection, id) {
            Some(i) => Json(FakeDb::document(collection, id, &db.docs[i].2)).into_response(),
            None => error(StatusCode::NOT_FOUND, "Document not found"),
        },
        (Method::PATCH, [collection, id]) => {
            let request: Value = serde_json::from_slice(&body).unwrap();
            let fields = request["fields"].as_object().cloned().unwrap_or_default();
            let existing = db.find(collection, id);
            match (query_param(&uri, "currentDocument.exists"), existing) {
                (Some("false"), Some(_)) => error(StatusCode::CONFLICT, "Document already exists"),
                (Some("true"), None) => error(StatusCode::NOT_FOUND, "No document to update"),
                (_, Some(i)) => {
                    db.docs[i].2 = fields.clone();
                    Json(FakeDb::document(collection, id, &fields)).into_response()
                }
                (_, None) => {
                    db.docs
                        .push(((*collection).to_string(), (*id).to_string(), fields.clone()));
                    Json(FakeDb::document(collection, id, &fields)).into_response()
                }
            }
        }
        (Method::DELETE, [collection, id]) => match db.find(collection, id) {
            Some(i) => {
                db.docs.remove(i);
                Json(json!({})).into_response()
            }
            None if query_param(&uri, "currentDocument.exists") == Some("true") => {
                error(StatusCode::NOT_FOUND, "No document to delete")
            }
            None => Json(json!({})).into_response(),
        },
        _ => error(StatusCode::NOT_FOUND, "unsupported request"),
    }
}

fn list(db: &FakeDb, collection: &str, uri: &Uri) -> Response {
    let page_size: usize = query_param(uri, "pageSize")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let offset: usize = query_param(uri, "pageToken")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let all: Vec<Value> = db
        .docs
        .iter()
        .filter(|(c, _, _)| c == collection)
        .map(|(c, id, fields)| FakeDb::document(c, id, fields))
        .collect();
    let page: Vec<Value> = all.iter().skip(offset).take(page_size).cloned().collect();

    let mut response = json!({ "documents": page });
    if offset + page_size < all.len() {
        response["nextPageToken"] = json!((offset + page_size).to_string());
    }
    Json(response).into_response()
}

fn run_query(db: &FakeDb, query: &Value) -> Response {
    let collection = query["from"][0]["collectionId"].as_str().unwrap_or_default();
    let filter = &query["where"]["fieldFilter"];
    let field = filter["field"]["fieldPath"].as_str().unwrap_or_default();
    let expected = &filter["value"];
    let limit = query["limit"].as_u64().map_or(usize::MAX, |l| l as usize);

    let mut items: Vec<Value> = db
        .docs
        .iter()
        .filter(|(c, _, fields)| c == collection && fields.get(field) == Some(expected))
        .take(limit)
        .map(|(c, id, fields)| {
            json!({ "document": FakeDb::document(c, id, fields), "readTime": "2024-01-01T00:00:00Z" })
        })
        .collect();
    if items.is_empty() {
        items.push(json!({ "readTime": "2024-01-01T00:00:00Z" }));
    }
    Json(Value::Array(items)).into_response()
}

async fn start_fake(db: Shared) -> String {
    let app = Router::new().fallback(handle).with_state(db);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn hosted_config(endpoint: &str, token: &str) -> HostedConfig {
    HostedConfig {
        endpoint: endpoint.to_string(),
        project_id: Some("demo".to_string()),
        access_token: Some(token.to_string()),
        ..HostedConfig::default()
    }
}

fn company_fields(id: Option<i64>, name: &str) -> Map<String, Value> {
    let mut fields = json!({
        "name": { "stringValue": name },
        "description": { "stringValue": format!("{name} does things") },
        "sector": { "stringValue": "Software" },
        "employees": { "integerValue": "42" },
        "website": { "stringValue": "https://example.com" },
    });
    if let Some(id) = id {
        fields["id"] = json!({ "integerValue": id.to_string() });
    }
    fields.as_object().cloned().unwrap()
}

async fn setup() -> (Shared, HostedBackend) {
    let db: Shared = Arc::default();
    let endpoint = start_fake(db.clone()).await;
    let backend = HostedBackend::from_config(&hosted_config(&endpoint, TOKEN))
        .unwrap()
        .unwrap();
    (db, backend)
}

#[tokio::test]
async fn test_probe() {
    let (db, backend) = setup().await;
    backend.probe().await.unwrap();
    assert_eq!(db.lock().await.requests, 1);
}

#[tokio::test]
async fn test_probe_rejects_bad_token() {
    let db: Shared = Arc::default();
    let endpoint = start_fake(db).await;
    let backend = HostedBackend::from_config(&hosted_config(&endpoint, "intruder"))
        .unwrap()
        .unwrap();

    let err = backend.probe().await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("invalid credentials"));
}

#[tokio::test]
async fn test_store_lifecycle_over_hosted_backend() {
    let (db, backend) = setup().await;
    let store = NoteStore::new(ResolvedBackend::hosted(backend));
    assert_eq!(store.backend_name(), "hosted");

    let note = store
        .create_note(
            CreateNote {
                company_id: 1,
                content: "First note".to_string(),
                is_private: Some(true),
            },
            Some("user-1"),
        )
        .await
        .unwrap();

    {
        let db = db.lock().await;
        let (_, _, fields) = &db.docs[0];
        assert_eq!(fields["companyId"], json!({ "integerValue": "1" }));
        assert_eq!(fields["isPrivate"], json!({ "booleanValue": true }));
        assert_eq!(fields["userId"], json!({ "stringValue": "user-1" }));
    }

    let mine = store.list_notes_for_company(1, Some("user-1")).await.unwrap();
    assert_eq!(mine, vec![note.clone()]);
    assert!(store
        .list_notes_for_company(1, Some("user-2"))
        .await
        .unwrap()
        .is_empty());

    let updated = store
        .update_note(
            &note.id,
            UpdateNote {
                content: Some("Updated".to_string()),
                is_private: Some(false),
            },
            Some("user-1"),
        )
        .await
        .unwrap();
    assert_eq!(updated.created_at, note.created_at);
    let theirs = store.list_notes_for_company(1, Some("user-2")).await.unwrap();
    assert_eq!(theirs[0].content, "Updated");

    let err = store.delete_note(&note.id, Some("user-2")).await.unwrap_err();
    assert!(err.is_not_authorized());

    store.delete_note(&note.id, Some("user-1")).await.unwrap();
    assert!(db.lock().await.docs.is_empty());

    let err = store.delete_note(&note.id, Some("user-1")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_notes_for_company_filters_by_company() {
    let (_db, backend) = setup().await;
    let store = NoteStore::new(ResolvedBackend::hosted(backend.clone()));

    for company_id in [1, 2, 1] {
        store
            .create_note(
                CreateNote {
                    company_id,
                    content: format!("about {company_id}"),
                    is_private: None,
                },
                Some("user-1"),
            )
            .await
            .unwrap();
    }

    assert_eq!(backend.notes_for_company(1).await.unwrap().len(), 2);
    assert_eq!(backend.notes_for_company(2).await.unwrap().len(), 1);
    assert!(backend.notes_for_company(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_preconditions() {
    let (_db, backend) = setup().await;
    let store = NoteStore::new(ResolvedBackend::hosted(backend.clone()));
    let note = store
        .create_note(
            CreateNote {
                company_id: 1,
                content: "once".to_string(),
                is_private: None,
            },
            Some("user-1"),
        )
        .await
        .unwrap();

    let err = backend.insert_note(&note).await.unwrap_err();
    assert!(err.to_string().contains("409"));

    let mut ghost = note.clone();
    ghost.id = "ghost".to_string();
    assert!(backend.replace_note(&ghost).await.unwrap_err().is_not_found());
    assert!(!backend.remove_note("ghost").await.unwrap());
    assert!(backend.get_note("ghost").await.unwrap().is_none());
    assert_eq!(backend.get_note(&note.id).await.unwrap(), Some(note));
}

#[tokio::test]
async fn test_list_companies_pages_and_falls_back_to_key() {
    let (db, backend) = setup().await;
    {
        let mut db = db.lock().await;
        for id in 1..=300 {
            db.docs.push((
                "companies".to_string(),
                format!("doc-{id}"),
                company_fields(Some(id), &format!("Company {id}")),
            ));
        }
        db.docs.push((
            "companies".to_string(),
            "777".to_string(),
            company_fields(None, "Keyed"),
        ));
        db.docs.push((
            "companies".to_string(),
            "no-id".to_string(),
            company_fields(None, "Nameless"),
        ));
    }

    let companies = backend.list_companies().await.unwrap();
    assert_eq!(companies.len(), 301);
    assert_eq!(companies[0].id, 1);
    assert_eq!(companies[0].employees, 42);
    assert!(companies.iter().any(|c| c.id == 777 && c.name == "Keyed"));
    assert!(!companies.iter().any(|c| c.name == "Nameless"));
}

#[tokio::test]
async fn test_find_company_by_id_field() {
    let (db, backend) = setup().await;
    db.lock().await.docs.push((
        "companies".to_string(),
        "acme-corp".to_string(),
        company_fields(Some(5), "Acme"),
    ));

    let store = NoteStore::new(ResolvedBackend::hosted(backend));
    let company = store.get_company_by_id(5).await.unwrap().unwrap();
    assert_eq!(company.name, "Acme");
    assert!(store.get_company_by_id(6).await.unwrap().is_none());
}

#[tokio::test]
async fn test_resolve_selects_hosted_when_reachable() {
    let db: Shared = Arc::default();
    let endpoint = start_fake(db).await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.hosted = hosted_config(&endpoint, TOKEN);
    config.storage.notes_path = Some(dir.path().join("notes.json"));

    let resolved = ResolvedBackend::resolve(&config).await.unwrap();
    assert_eq!(resolved.name(), "hosted");

    config.hosted.access_token = Some("intruder".to_string());
    let resolved = ResolvedBackend::resolve(&config).await.unwrap();
    assert_eq!(resolved.name(), "file");

    config.storage.backend = BackendKind::Hosted;
    assert!(ResolvedBackend::resolve(&config).await.is_err());
}
