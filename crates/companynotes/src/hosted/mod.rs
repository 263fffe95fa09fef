//! Hosted document-database backend.
//!
//! Speaks the Firestore REST v1 API, so it works against the hosted service
//! and against a local emulator. Each note is its own document keyed by the
//! note id. Companies are read-only; a company is looked up by querying its
//! `id` field because document names and company ids are not guaranteed to
//! match.

pub mod value;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::HostedConfig;
use crate::error::{Error, Result};
use crate::model::{Company, Note};
use crate::store::{CompanyDirectory, NoteBackend};

/// Page size used when listing whole collections.
const PAGE_SIZE: u32 = 300;

/// A stored document.
#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

/// One element of a query response stream. Elements without a document
/// carry only progress metadata.
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

/// Client for the hosted document database.
#[derive(Clone)]
pub struct HostedBackend {
    client: Client,
    base_url: Url,
    access_token: String,
    notes_collection: String,
    companies_collection: String,
}

impl std::fmt::Debug for HostedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedBackend")
            .field("base_url", &self.base_url.as_str())
            .field("notes_collection", &self.notes_collection)
            .field("companies_collection", &self.companies_collection)
            .finish_non_exhaustive()
    }
}

impl HostedBackend {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when the project or access token is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &HostedConfig) -> Result<Option<Self>> {
        let (Some(project_id), Some(access_token)) = (&config.project_id, &config.access_token)
        else {
            return Ok(None);
        };

        let raw = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            config.endpoint.trim_end_matches('/'),
            project_id,
            config.database
        );
        let base_url = Url::parse(&raw).map_err(|e| Error::ConfigValidation {
            message: format!("invalid hosted.endpoint {:?}: {e}", config.endpoint),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigValidation {
                message: format!("hosted.endpoint {:?} cannot be a base URL", config.endpoint),
            });
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Some(Self {
            client,
            base_url,
            access_token: access_token.clone(),
            notes_collection: config.notes_collection.clone(),
            companies_collection: config.companies_collection.clone(),
        }))
    }

    /// The documents root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Check that the service is reachable and the credentials are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn probe(&self) -> Result<()> {
        let mut url = self.collection_url(&self.companies_collection);
        url.query_pairs_mut().append_pair("pageSize", "1");
        self.send(self.client.get(url)).await?;
        Ok(())
    }

    fn collection_url(&self, collection: &str) -> Url {
        let mut url = self.base_url.clone();
        // The base URL was checked to have a path in `from_config`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(collection);
        }
        url
    }

    fn document_url(&self, collection: &str, id: &str) -> Url {
        let mut url = self.collection_url(collection);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    fn query_url(&self) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}:runQuery", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    /// Send an authorized request and turn failure statuses into errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        Err(Error::Hosted {
            status: status.as_u16(),
            message,
        })
    }

    /// Run a single-field equality query against `collection`.
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        target: i64,
        limit: Option<u32>,
    ) -> Result<Vec<Document>> {
        let mut structured = json!({
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": value::encode_value(&json!(target)),
                }
            }
        });
        if let Some(limit) = limit {
            structured["limit"] = json!(limit);
        }

        let response = self
            .send(
                self.client
                    .post(self.query_url())
                    .json(&json!({ "structuredQuery": structured })),
            )
            .await?;
        let items: Vec<RunQueryItem> = response.json().await?;
        Ok(items.into_iter().filter_map(|item| item.document).collect())
    }

    /// Write a note document, with a precondition on whether it already exists.
    async fn put_note(&self, note: &Note, must_exist: bool) -> Result<()> {
        let mut url = self.document_url(&self.notes_collection, &note.id);
        url.query_pairs_mut()
            .append_pair("currentDocument.exists", if must_exist { "true" } else { "false" });

        let request = self.client.patch(url).json(&value::to_document(note)?);
        match self.send(request).await {
            Err(Error::Hosted { status, .. })
                if must_exist && status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Err(Error::note_not_found(&note.id))
            }
            other => other.map(|_| ()),
        }
    }
}

/// The trailing segment of a document name.
fn document_key(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Decode a company, taking the id from the document key when the `id` field
/// is missing or not an integer.
fn company_from_document(doc: &Document) -> Result<Option<Company>> {
    let mut fields = value::decode_fields(&doc.fields)?;

    let id = match fields.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .or_else(|| document_key(&doc.name).parse().ok());

    let Some(id) = id else {
        warn!("Skipping company document {} without a numeric id", doc.name);
        return Ok(None);
    };
    fields.insert("id".to_string(), Value::from(id));

    serde_json::from_value(Value::Object(fields))
        .map(Some)
        .map_err(|e| Error::MalformedDocument(format!("company {}: {e}", doc.name)))
}

#[async_trait]
impl NoteBackend for HostedBackend {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn notes_for_company(&self, company_id: i64) -> Result<Vec<Note>> {
        let docs = self
            .query_equal(&self.notes_collection, "companyId", company_id, None)
            .await?;
        docs.iter().map(|doc| value::from_fields(&doc.fields)).collect()
    }

    async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let url = self.document_url(&self.notes_collection, id);
        let doc: Document = match self.send(self.client.get(url)).await {
            Ok(response) => response.json().await?,
            Err(Error::Hosted { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        value::from_fields(&doc.fields).map(Some)
    }

    async fn insert_note(&self, note: &Note) -> Result<()> {
        self.put_note(note, false).await?;
        debug!("Stored note document {}", note.id);
        Ok(())
    }

    async fn replace_note(&self, note: &Note) -> Result<()> {
        self.put_note(note, true).await
    }

    async fn remove_note(&self, id: &str) -> Result<bool> {
        let mut url = self.document_url(&self.notes_collection, id);
        url.query_pairs_mut()
            .append_pair("currentDocument.exists", "true");

        match self.send(self.client.delete(url)).await {
            Ok(_) => Ok(true),
            Err(Error::Hosted { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CompanyDirectory for HostedBackend {
    async fn list_companies(&self) -> Result<Vec<Company>> {
        let mut companies = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url(&self.companies_collection);
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: ListDocumentsResponse = self.send(self.client.get(url)).await?.json().await?;
            for doc in &page.documents {
                companies.extend(company_from_document(doc)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(companies)
    }

    async fn find_company(&self, id: i64) -> Result<Option<Company>> {
        let docs = self
            .query_equal(&self.companies_collection, "id", id, Some(1))
            .await?;
        match docs.first() {
            Some(doc) => company_from_document(doc),
            None => Ok(None),
        }
    }
}
