//! Route handlers.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::error::Error;
use crate::model::{ContentType, DocumentInput, Excerpt, Profile, Project, SearchResult};
use crate::search::SearchOptions;
use crate::vector_store::IndexStats;

/// Wrapper for successful responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub owner_id: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
}

#[derive(Debug, Serialize)]
pub struct SearchData {
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChatData {
    pub response: String,
    pub referenced_profiles: Vec<String>,
    pub referenced_projects: Vec<String>,
    pub referenced_documents: Vec<String>,
    pub sources: Vec<Excerpt>,
}

#[derive(Debug, Serialize)]
pub struct QueuedData {
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentData {
    pub id: String,
    /// `false` when the owner was removed while the text was being embedded.
    pub indexed: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub queue: crate::queue::QueueStats,
    pub index: IndexStats,
    pub cache_entries: u64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.start_time.elapsed().as_secs(),
        "queue_running": state.hooks.queue().is_running(),
    }))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ApiResponse<SearchData>>, ApiError> {
    let limit = request
        .limit
        .unwrap_or(state.search.config().default_limit);
    let mut options = SearchOptions {
        threshold: request.threshold,
        filter: None,
    };
    options = match (request.owner_id, request.content_type) {
        (Some(_), Some(_)) => {
            return Err(ApiError::invalid(
                "owner_id and type cannot be combined",
            ))
        }
        (Some(owner), None) => options.owned_by(owner),
        (None, Some(content_type)) => options.of_type(content_type),
        (None, None) => options,
    };

    let results = state.search.search(&request.query, limit, &options).await?;
    Ok(ApiResponse::ok(SearchData {
        count: results.len(),
        results,
    }))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatData>>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::invalid("Query is required"));
    }
    let max_results = request
        .max_results
        .unwrap_or(state.search.config().default_limit);

    let answer =
        crate::search::answer(&state.search, &state.generator, &request.query, max_results)
            .await?;
    Ok(ApiResponse::ok(ChatData {
        response: answer.response,
        referenced_profiles: answer.sources.profiles,
        referenced_projects: answer.sources.projects,
        referenced_documents: answer.sources.documents,
        sources: answer.sources.excerpts,
    }))
}

pub async fn profile_updated(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> impl IntoResponse {
    state.hooks.on_profile_update(profile).await;
    (StatusCode::ACCEPTED, ApiResponse::ok(QueuedData { queued: 1 }))
}

pub async fn project_updated(
    State(state): State<AppState>,
    Json(project): Json<Project>,
) -> impl IntoResponse {
    state.hooks.on_project_update(project).await;
    (StatusCode::ACCEPTED, ApiResponse::ok(QueuedData { queued: 1 }))
}

pub async fn profiles_bulk(
    State(state): State<AppState>,
    Json(profiles): Json<Vec<Profile>>,
) -> impl IntoResponse {
    let queued = state.hooks.bulk_update_profiles(profiles).await;
    (StatusCode::ACCEPTED, ApiResponse::ok(QueuedData { queued }))
}

pub async fn projects_bulk(
    State(state): State<AppState>,
    Json(projects): Json<Vec<Project>>,
) -> impl IntoResponse {
    let queued = state.hooks.bulk_update_projects(projects).await;
    (StatusCode::ACCEPTED, ApiResponse::ok(QueuedData { queued }))
}

pub async fn profile_deleted(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.hooks.on_profile_delete(&profile_id).await?;
    info!(id = %profile_id, deleted = result.deleted_count, "Profile removed from index");
    Ok(ApiResponse::ok(result))
}

pub async fn document_created(
    State(state): State<AppState>,
    Json(input): Json<DocumentInput>,
) -> Result<impl IntoResponse, ApiError> {
    if input.text.trim().is_empty() {
        return Err(ApiError::invalid("Document text is required"));
    }
    if input.owner_id.trim().is_empty() {
        return Err(ApiError::invalid("owner_id is required"));
    }
    let id = match input.id.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::invalid("Document id must not be blank")),
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };

    let indexed = state
        .hooks
        .indexer()
        .index_document(&id, &input)
        .await?
        .is_some();
    info!(id = %id, owner = %input.owner_id, indexed, "Document submitted");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(DocumentData { id, indexed }),
    ))
}

pub async fn document_deleted(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.hooks.indexer().remove_document(&document_id).await? {
        return Err(Error::NotFound(format!("document {}", document_id)).into());
    }
    info!(id = %document_id, "Document removed from index");
    Ok(ApiResponse::ok(json!({ "id": document_id, "deleted": true })))
}

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let index = state.store.describe_stats().await?;
    Ok(ApiResponse::ok(StatsData {
        queue: state.hooks.queue().stats().await,
        index,
        cache_entries: state.search.cache().len().await,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
