//! Admin API handlers. Mounted behind [`super::auth::require_admin`].

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::admin::{PostDraft, PostEditor};
use crate::content::Post;
use crate::media::{self, StoredImage};

#[derive(Serialize)]
pub struct AdminPostList {
    pub posts: Vec<Post>,
    pub next_id: u64,
}

pub async fn list_posts(State(state): State<Arc<AppState>>) -> ApiResult<Json<AdminPostList>> {
    let mut repo = state.repo.write().await;
    let editor = PostEditor::new(&mut **repo, state.images());
    let next_id = editor.next_id_hint()?;
    let posts = repo.list_posts(true)?;
    Ok(Json(AdminPostList { posts, next_id }))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PostDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let Json(draft) = payload?;
    let mut repo = state.repo.write().await;
    let post = PostEditor::new(&mut **repo, state.images()).create_post(draft)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    payload: Result<Json<PostDraft>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(draft) = payload?;
    let mut repo = state.repo.write().await;
    let post = PostEditor::new(&mut **repo, state.images()).update_post(id, draft)?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    let mut repo = state.repo.write().await;
    PostEditor::new(&mut **repo, state.images()).delete_post(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

pub async fn publish_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(request) = payload?;
    let mut repo = state.repo.write().await;
    let post =
        PostEditor::new(&mut **repo, state.images()).toggle_publish(id, request.published)?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
    pub post_id: Option<u64>,
}

/// Raw-body image upload. Without `post_id` the image is staged under temp.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    params: Result<Query<UploadParams>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<StoredImage>)> {
    let Query(params) = params?;
    let body = body?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }

    let image = media::upload_image(
        state.images(),
        &body,
        &params.filename,
        params.post_id,
        Utc::now(),
    )?;
    tracing::info!("Stored upload {:?} as {}", params.filename, image.path);
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<StatusCode> {
    media::delete_image(state.images(), &path)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cleanup_images(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let retention = Duration::hours(state.config.storage.temp_retention_hours);
    let removed = media::cleanup_temp_images(state.images(), Utc::now(), retention)?;
    Ok(Json(json!({ "removed": removed })))
}
