//! Public API handlers

use axum::{
    extract::{rejection::QueryRejection, ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::config::Profile;
use crate::content::{PostSummary, PostView};
use crate::query::{self, CategoryCounts, PostPage, PostQuery, TagCount};
use crate::store::StoreError;
use crate::visitors::VisitorStats;

/// Header a frontend may set to identify a browser across requests
pub const VISITOR_HEADER: &str = "x-visitor-id";

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> ApiResult<Json<PostPage>> {
    let Query(mut query) = query?;
    query.include_drafts = false;

    let posts = state.repo.read().await.list_posts(false)?;
    Ok(Json(query.run(&posts, &state.config.pagination)))
}

pub async fn featured_posts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PostSummary>>> {
    let posts = state.repo.read().await.list_posts(false)?;
    Ok(Json(query::featured(&posts, state.config.featured_limit)))
}

/// One published post by numeric id or slug. Counts a view.
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<PostView>> {
    let mut repo = state.repo.write().await;

    let found = match key.parse::<u64>() {
        Ok(id) => repo.get_post(id).or_else(|_| repo.get_post_by_slug(&key)),
        Err(_) => repo.get_post_by_slug(&key),
    };
    let post = match found {
        Ok(post) if post.is_published => post,
        Ok(_) | Err(StoreError::NotFound(_)) => {
            return Err(ApiError::NotFound(format!("post {:?}", key)))
        }
        Err(e) => return Err(e.into()),
    };

    let post = repo.increment_view_count(post.id)?;
    let published = repo.list_posts(false)?;
    drop(repo);

    let (prev, next) = query::neighbors(&published, post.id);
    let mut view = post.render(&state.renderer)?;
    view.prev = prev;
    view.next = next;
    Ok(Json(view))
}

pub async fn list_tags(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<TagCount>>> {
    let posts = state.repo.read().await.list_posts(false)?;
    Ok(Json(query::tag_counts(&posts)))
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<CategoryCounts>> {
    let repo = state.repo.read().await;
    let categories = repo.list_categories()?;
    let posts = repo.list_posts(false)?;
    Ok(Json(query::category_counts(&categories, &posts)))
}

pub async fn profile(State(state): State<Arc<AppState>>) -> Json<Profile> {
    Json(state.profile.clone())
}

pub async fn visitor_stats(State(state): State<Arc<AppState>>) -> Json<VisitorStats> {
    let counter = state.visitors.lock().await;
    let today = counter.today(Utc::now());
    Json(counter.stats(today))
}

pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> ApiResult<Json<VisitorStats>> {
    let visitor = visitor_id(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let mut counter = state.visitors.lock().await;
    let today = counter.today(Utc::now());
    Ok(Json(counter.record_visit(&visitor, today)?))
}

/// The `x-visitor-id` header, else the client IP
fn visitor_id(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    headers
        .get(VISITOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| addr.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let repo = state.repo.read().await;
    let posts = repo.list_posts(true)?.len();
    Ok(Json(json!({
        "status": "ok",
        "backend": state.config.backend,
        "read_only": repo.is_read_only(),
        "posts": posts,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_visitor_id_prefers_header() {
        let addr: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(visitor_id(&headers, Some(addr)), "198.51.100.4");
        assert_eq!(visitor_id(&headers, None), "anonymous");

        headers.insert(VISITOR_HEADER, HeaderValue::from_static("browser-1"));
        assert_eq!(visitor_id(&headers, Some(addr)), "browser-1");
    }
}
