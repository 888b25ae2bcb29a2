use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use hasslink_api::link::{LinkEntry, LinkEntryPublic, LinkForm, LinkOptions};

use crate::error::{ApiError, ApiResult};
use crate::server::appstate::AppState;

async fn get_links(State(state): State<AppState>) -> Json<Vec<LinkEntryPublic>> {
    let entries = state.links().lock().await.entries();
    Json(entries.iter().map(LinkEntry::public).collect())
}

async fn get_link(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<Json<LinkEntryPublic>> {
    let links = state.links();
    let lock = links.lock().await;
    let entry = lock
        .get(entry_id)
        .map(LinkEntry::public)
        .ok_or(ApiError::EntryNotFound(entry_id))?;
    drop(lock);
    Ok(Json(entry))
}

async fn post_link(
    State(state): State<AppState>,
    Json(form): Json<LinkForm>,
) -> ApiResult<(StatusCode, Json<LinkEntryPublic>)> {
    let entry = state.links().lock().await.create(&form).await?;
    Ok((StatusCode::CREATED, Json(entry.public())))
}

async fn patch_link(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(options): Json<LinkOptions>,
) -> ApiResult<Json<LinkEntryPublic>> {
    let entry = state
        .links()
        .lock()
        .await
        .update(entry_id, &options)
        .await?;
    Ok(Json(entry.public()))
}

async fn delete_link(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.links().lock().await.remove(entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/links", get(get_links).post(post_link))
        .route(
            "/api/links/{entry_id}",
            get(get_link).patch(patch_link).delete(delete_link),
        )
}
