//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::error::ApiError;
use super::AppState;
use crate::error::Error;
use crate::identity::Requester;
use crate::model::{CreateNote, UpdateNote};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateNoteBody {
    company_id: Option<i64>,
    content: Option<String>,
    is_private: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateNoteBody {
    content: Option<String>,
    is_private: Option<bool>,
}

fn require_user(requester: &Requester) -> ApiResult<&str> {
    requester
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(ApiError::authentication_required)
}

fn non_empty(content: Option<String>) -> Option<String> {
    content.filter(|c| !c.is_empty())
}

/// Accepts integers and integral strings, the way loosely typed clients send ids.
#[allow(clippy::cast_possible_truncation)]
fn integer_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub(super) async fn list_companies(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> ApiResult<Json<Value>> {
    require_user(&requester)?;
    let companies = state.store.list_companies().await?;
    Ok(Json(json!({ "companies": companies })))
}

pub(super) async fn list_notes(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let company_id: i64 = id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid company id"))?;
    let notes = state
        .store
        .list_notes_for_company(company_id, requester.id())
        .await?;
    Ok(Json(json!({ "notes": notes })))
}

pub(super) async fn create_note(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    payload: Result<Json<CreateNoteBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let user = require_user(&requester)?;
    let Json(body) = payload?;

    let (Some(company_id), Some(content)) = (body.company_id, non_empty(body.content)) else {
        return Err(ApiError::bad_request("companyId and content are required"));
    };

    let note = state
        .store
        .create_note(
            CreateNote {
                company_id,
                content,
                is_private: body.is_private,
            },
            Some(user),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "note": note }))))
}

pub(super) async fn update_note(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateNoteBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let user = require_user(&requester)?;
    let Json(body) = payload?;

    let Some(content) = non_empty(body.content) else {
        return Err(ApiError::bad_request("content is required"));
    };

    let note = state
        .store
        .update_note(
            &id,
            UpdateNote {
                content: Some(content),
                is_private: body.is_private,
            },
            Some(user),
        )
        .await?;
    Ok(Json(json!({ "note": note })))
}

pub(super) async fn delete_note(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user = require_user(&requester)?;
    state.store.delete_note(&id, Some(user)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn create_summary(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let company_id = body
        .get("companyId")
        .and_then(integer_id)
        .ok_or_else(|| ApiError::bad_request("companyId is required"))?;

    let company = state
        .store
        .get_company_by_id(company_id)
        .await?
        .ok_or_else(|| Error::company_not_found(company_id))?;

    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Summaries are not configured".to_string()))?;

    match summarizer.summarize(&company).await {
        Ok(summary) => Ok(Json(json!({ "companyId": company_id, "summary": summary }))),
        Err(e) => {
            error!("Summary provider failed for company {company_id}: {e}");
            Err(ApiError::Failed("Failed to generate summary".to_string()))
        }
    }
}
