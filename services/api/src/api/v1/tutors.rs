//! Tutor API endpoints.
//!
//! Tutors carry three admin-controlled flags (`isApproved`, `isPremium`,
//! `isVerified`), each flipped by its own route and stamped with the time of
//! the last change.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tutorhub_id::{SequenceKind, TutorKey};
use tutorhub_store::{Document, Filter, Update};

use super::resource::Entity;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

static TUTOR: Entity = Entity {
    name: "tutor",
    kind: SequenceKind::TUTOR,
};

/// Credentials are not handled by this service and never stored or echoed.
const PASSWORD_FIELD: &str = "password";
const EMAIL_FIELD: &str = "email";
/// Set on create; not writable through request bodies.
const ROLE_FIELD: &str = "role";
const TUTOR_ROLE: &str = "tutor";

/// Create tutor routes, mounted at /v1/tutors.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tutors).post(create_tutor))
        .route("/active", get(list_active_tutors))
        .route("/{id}", get(get_tutor).put(update_profile))
        .route("/{id}/approval", patch(toggle_approval))
        .route("/{id}/premium", patch(toggle_premium))
        .route("/{id}/verification", patch(toggle_verification))
        .route("/{id}/delete", patch(delete_tutor))
        .route("/{id}/restore", patch(restore_tutor))
}

/// A boolean tutor flag and the field stamped when it changes.
#[derive(Debug, Clone, Copy)]
struct Flag {
    field: &'static str,
    stamp: &'static str,
}

const APPROVED: Flag = Flag {
    field: "isApproved",
    stamp: "approvedAt",
};
const PREMIUM: Flag = Flag {
    field: "isPremium",
    stamp: "premiumAt",
};
const VERIFIED: Flag = Flag {
    field: "isVerified",
    stamp: "verifiedAt",
};

fn tutor_json(doc: &Document) -> Value {
    let mut value = doc.to_json();
    if let Value::Object(map) = &mut value {
        map.remove(PASSWORD_FIELD);
    }
    value
}

/// Drops members callers may not set on a tutor.
fn writable_fields(mut body: Map<String, Value>) -> Map<String, Value> {
    body.remove(PASSWORD_FIELD);
    body.remove(ROLE_FIELD);
    body
}

/// GET /v1/tutors
async fn list_tutors(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let docs = TUTOR.list(state.tutors(), &Filter::All, &ctx).await?;
    Ok(Json(docs.iter().map(tutor_json).collect::<Vec<_>>()))
}

/// GET /v1/tutors/active
async fn list_active_tutors(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let docs = TUTOR.list(state.tutors(), &Filter::Active, &ctx).await?;
    Ok(Json(docs.iter().map(tutor_json).collect::<Vec<_>>()))
}

/// GET /v1/tutors/{id}
async fn get_tutor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = TUTOR.locate::<TutorKey>(state.tutors(), &id, &ctx).await?;
    Ok(Json(tutor_json(&doc)))
}

/// POST /v1/tutors
///
/// A string `email` must not belong to another tutor. The check runs before
/// an id is allocated.
async fn create_tutor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut body = writable_fields(body);

    if let Some(email) = body.get(EMAIL_FIELD).and_then(Value::as_str) {
        let filter = Filter::field(EMAIL_FIELD, email);
        if TUTOR.exists(state.tutors(), &filter, &ctx).await? {
            tracing::debug!(request_id = %ctx.request_id, "Rejected tutor with registered email");
            return Err(
                ApiError::bad_request("email_taken", "This email is already registered")
                    .with_request_id(ctx.request_id),
            );
        }
    }
    body.insert(ROLE_FIELD.to_string(), Value::from(TUTOR_ROLE));

    let doc = TUTOR
        .create::<TutorKey>(state.tutors(), state.sequences(), body, &ctx)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "storageKey": doc.storage_key,
            "tutor": tutor_json(&doc),
        })),
    ))
}

/// PUT /v1/tutors/{id}
async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let update = Update::set_fields(writable_fields(body)).touch("updatedAt");
    let doc = TUTOR
        .update::<TutorKey>(state.tutors(), &id, &update, &ctx)
        .await?;
    Ok(Json(tutor_json(&doc)))
}

/// Flips `flag` on the located tutor and stamps the change.
async fn toggle(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    flag: Flag,
) -> Result<Json<Value>, ApiError> {
    let update = Update::default().toggle(flag.field).touch(flag.stamp);
    let doc = TUTOR
        .update::<TutorKey>(state.tutors(), id, &update, ctx)
        .await?;
    Ok(Json(tutor_json(&doc)))
}

/// PATCH /v1/tutors/{id}/approval
async fn toggle_approval(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    toggle(&state, &ctx, &id, APPROVED).await
}

/// PATCH /v1/tutors/{id}/premium
async fn toggle_premium(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    toggle(&state, &ctx, &id, PREMIUM).await
}

/// PATCH /v1/tutors/{id}/verification
async fn toggle_verification(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    toggle(&state, &ctx, &id, VERIFIED).await
}

/// PATCH /v1/tutors/{id}/delete
async fn delete_tutor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = TUTOR
        .update::<TutorKey>(state.tutors(), &id, &Update::soft_delete(), &ctx)
        .await?;
    Ok(Json(tutor_json(&doc)))
}

/// PATCH /v1/tutors/{id}/restore
async fn restore_tutor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = TUTOR
        .update::<TutorKey>(state.tutors(), &id, &Update::restore(), &ctx)
        .await?;
    Ok(Json(tutor_json(&doc)))
}
