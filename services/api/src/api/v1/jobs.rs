//! Job API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tutorhub_id::{JobKey, SequenceKind};
use tutorhub_store::{Filter, Update};

use super::resource::Entity;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

static JOB: Entity = Entity {
    name: "job",
    kind: SequenceKind::JOB,
};

/// Create job routes, mounted at /v1/jobs.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/active", get(list_active_jobs))
        .route("/{id}", get(get_job).patch(update_job))
        .route("/{id}/approval", patch(set_approval))
        .route("/{id}/delete", patch(delete_job))
        .route("/{id}/restore", patch(restore_job))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    #[serde(rename = "isApproved")]
    pub is_approved: bool,
}

/// GET /v1/jobs
async fn list_jobs(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let docs = JOB.list(state.jobs(), &Filter::All, &ctx).await?;
    Ok(Json(docs.iter().map(|d| d.to_json()).collect::<Vec<_>>()))
}

/// GET /v1/jobs/active
async fn list_active_jobs(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let docs = JOB.list(state.jobs(), &Filter::Active, &ctx).await?;
    Ok(Json(docs.iter().map(|d| d.to_json()).collect::<Vec<_>>()))
}

/// GET /v1/jobs/{id}
///
/// Soft-deleted jobs are still returned.
async fn get_job(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = JOB.locate::<JobKey>(state.jobs(), &id, &ctx).await?;
    Ok(Json(doc.to_json()))
}

/// POST /v1/jobs
async fn create_job(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = JOB
        .create::<JobKey>(state.jobs(), state.sequences(), body, &ctx)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "storageKey": doc.storage_key,
            "job": doc.to_json(),
        })),
    ))
}

/// PATCH /v1/jobs/{id}
///
/// Merges the body's top-level fields. Identity fields are ignored.
async fn update_job(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update::set_fields(body);
    if update.set.is_empty() {
        return Err(
            ApiError::bad_request("empty_update", "No updatable fields provided")
                .with_request_id(ctx.request_id),
        );
    }

    let doc = JOB
        .update::<JobKey>(state.jobs(), &id, &update.touch("updatedAt"), &ctx)
        .await?;
    Ok(Json(doc.to_json()))
}

/// PATCH /v1/jobs/{id}/approval
async fn set_approval(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<ApprovalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update::default()
        .with("isApproved", req.is_approved)
        .touch("approvedAt");
    let doc = JOB.update::<JobKey>(state.jobs(), &id, &update, &ctx).await?;
    Ok(Json(doc.to_json()))
}

/// PATCH /v1/jobs/{id}/delete
async fn delete_job(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = JOB
        .update::<JobKey>(state.jobs(), &id, &Update::soft_delete(), &ctx)
        .await?;
    Ok(Json(doc.to_json()))
}

/// PATCH /v1/jobs/{id}/restore
async fn restore_job(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = JOB
        .update::<JobKey>(state.jobs(), &id, &Update::restore(), &ctx)
        .await?;
    Ok(Json(doc.to_json()))
}
