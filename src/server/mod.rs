//! HTTP server: JSON API, uploaded media and the built frontend

mod admin;
mod auth;
mod error;
mod routes;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Uri,
    },
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::{BackendKind, Profile, SiteConfig};
use crate::content::{loader::is_markdown_file, MarkdownRenderer};
use crate::media::{self, ImageStore};
use crate::store::{Repository, StoreResult};
use crate::visitors::VisitorCounter;
use crate::Devfolio;

pub use error::{ApiError, ApiResult};
pub use routes::VISITOR_HEADER;

/// State shared by every handler
pub struct AppState {
    pub config: SiteConfig,
    pub repo: RwLock<Box<dyn Repository>>,
    images: Box<dyn ImageStore>,
    pub visitors: Mutex<VisitorCounter>,
    pub profile: Profile,
    pub renderer: MarkdownRenderer,
    pub admin_token: Option<String>,
    media_dir: PathBuf,
    public_dir: PathBuf,
}

impl AppState {
    pub fn new(site: &Devfolio, repo: Box<dyn Repository>) -> Result<Self> {
        let admin_token = site.config.admin.resolve_token();
        if admin_token.is_none() {
            tracing::warn!(
                "No admin token configured (set {}), admin API is disabled",
                site.config.admin.token_env
            );
        }

        Ok(Self {
            config: site.config.clone(),
            repo: RwLock::new(repo),
            images: Box::new(site.image_store()),
            visitors: Mutex::new(site.visitor_counter()),
            profile: Profile::load(site.profile_path())?,
            renderer: MarkdownRenderer::with_options(&site.config.highlight),
            admin_token,
            media_dir: site.media_dir(),
            public_dir: site.public_dir.clone(),
        })
    }

    pub fn images(&self) -> &dyn ImageStore {
        self.images.as_ref()
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.storage.max_upload_bytes);

    let admin = Router::new()
        .route("/posts", get(admin::list_posts).post(admin::create_post))
        .route(
            "/posts/:id",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/posts/:id/publish", post(admin::publish_post))
        .route("/images", post(admin::upload_image).layer(upload_limit))
        .route("/images/*path", delete(admin::delete_image))
        .route("/media/cleanup", post(admin::cleanup_images))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let api = Router::new()
        .route("/posts", get(routes::list_posts))
        .route("/posts/featured", get(routes::featured_posts))
        .route("/posts/:key", get(routes::get_post))
        .route("/tags", get(routes::list_tags))
        .route("/categories", get(routes::list_categories))
        .route("/profile", get(routes::profile))
        .route(
            "/visitors",
            get(routes::visitor_stats).post(routes::record_visit),
        )
        .route("/health", get(routes::health))
        .nest("/admin", admin)
        .fallback(api_not_found);

    // Unknown paths get index.html so the frontend router can take over
    let spa = ServeDir::new(&state.public_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(state.public_dir.join("index.html")));

    let cors = cors_layer(&state.config.server.cors_origins);

    let app = Router::new()
        .nest("/api", api)
        .nest_service(&media_mount(&state.config), ServeDir::new(&state.media_dir))
        .fallback_service(spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

async fn api_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Path the media directory is served under
fn media_mount(config: &SiteConfig) -> String {
    let url = config.storage.public_url.trim_end_matches('/');
    if url.starts_with('/') && url.len() > 1 {
        url.to_string()
    } else {
        "/media".to_string()
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                CONTENT_TYPE,
                AUTHORIZATION,
                HeaderName::from_static(VISITOR_HEADER),
            ])
            .max_age(Duration::from_secs(60 * 60)),
    )
}

/// Start the server. `watch` reloads markdown posts as they change.
pub async fn start(site: &Devfolio, ip: &str, port: u16, watch: bool) -> Result<()> {
    let repo = site.open_repository()?;
    let state = Arc::new(AppState::new(site, repo)?);

    let retention = ChronoDuration::hours(site.config.storage.temp_retention_hours);
    match media::cleanup_temp_images(state.images(), Utc::now(), retention) {
        Ok(0) => {}
        Ok(n) => tracing::info!("Purged {} stale staged images", n),
        Err(e) => tracing::warn!("Staged image cleanup failed: {}", e),
    }

    if watch && site.config.backend == BackendKind::Static {
        let watch_state = state.clone();
        let posts_dir = site.posts_dir();
        std::thread::spawn(move || {
            if let Err(e) = watch_posts(&watch_state, &posts_dir) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Reload the store whenever a markdown post changes
fn watch_posts(state: &AppState, posts_dir: &Path) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    // Debounce so a burst of editor writes triggers one reload
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(posts_dir, RecursiveMode::Recursive)?;
    tracing::info!("Watching {:?} for changes", posts_dir);

    for result in rx {
        match result {
            Ok(events) => {
                let paths: Vec<&Path> = events.iter().map(|e| e.path.as_path()).collect();
                if let Err(e) = reload_changed(&state.repo, &paths) {
                    tracing::error!("Reload failed: {}", e);
                }
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// Reload the store if any changed path is a markdown post.
/// Returns whether a reload happened.
fn reload_changed(repo: &RwLock<Box<dyn Repository>>, paths: &[&Path]) -> StoreResult<bool> {
    let changed: Vec<&&Path> = paths.iter().filter(|p| is_markdown_file(p)).collect();
    if changed.is_empty() {
        return Ok(false);
    }
    for path in &changed {
        tracing::debug!("Changed: {}", path.display());
    }
    repo.blocking_write().reload()?;
    Ok(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    fn site(dir: &TempDir, backend: BackendKind) -> Devfolio {
        let mut config = SiteConfig::default();
        config.backend = backend;
        config.admin.token_env = "DEVFOLIO_TEST_TOKEN_UNSET".to_string();
        config.admin.token = Some(TOKEN.to_string());
        config.storage.max_upload_bytes = 64;

        let site = Devfolio::with_config(dir.path().to_path_buf(), config);
        fs::create_dir_all(site.posts_dir()).unwrap();
        fs::create_dir_all(&site.public_dir).unwrap();
        fs::write(site.public_dir.join("index.html"), "<div id=\"root\"></div>").unwrap();
        fs::write(
            site.posts_dir().join("first.md"),
            "---\ntitle: First Post\ndate: 2024-01-01\ntags: [rust]\ncategory: dev\n---\nHello **world**\n",
        )
        .unwrap();
        fs::write(
            site.posts_dir().join("second.md"),
            "---\ntitle: Second Post\ndate: 2024-02-01\ntags: [rust, axum]\n---\nMore words\n",
        )
        .unwrap();
        fs::write(
            site.posts_dir().join("draft.md"),
            "---\ntitle: Draft\ndate: 2024-03-01\npublished: false\n---\nWIP\n",
        )
        .unwrap();
        site
    }

    fn app(site: &Devfolio) -> Router {
        let repo = site.open_repository().unwrap();
        router(Arc::new(AppState::new(site, repo).unwrap()))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn admin_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", TOKEN))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_upload(uri: &str, bytes: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", format!("Bearer {}", TOKEN))
            .body(Body::from(bytes))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body_bytes(response).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_static_listing_and_detail() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Static));

        let (status, page) = send(&app, get("/api/posts?per_page=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        assert_eq!(page["has_more"], true);
        assert_eq!(page["next_page"], 2);
        assert_eq!(page["items"][0]["slug"], "second");

        let (_, page) = send(&app, get("/api/posts?tag=axum")).await;
        assert_eq!(page["total"], 1);

        let (status, post) = send(&app, get("/api/posts/first")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(post["view_count"], 1);
        assert_eq!(post["prev"]["slug"], "second");
        assert!(post["next"].is_null());
        assert!(post["html"].as_str().unwrap().contains("<strong>world</strong>"));

        let (_, post) = send(&app, get("/api/posts/1")).await;
        assert_eq!(post["slug"], "first");
        assert_eq!(post["view_count"], 2);

        let (status, body) = send(&app, get("/api/posts/draft")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_counts_profile_and_health() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Static));

        let (_, tags) = send(&app, get("/api/tags")).await;
        assert_eq!(tags[0], json!({"name": "rust", "count": 2}));

        let (_, categories) = send(&app, get("/api/categories")).await;
        assert_eq!(categories["counts"]["all"], 2);
        assert_eq!(categories["counts"]["dev"], 1);

        let (status, _) = send(&app, get("/api/profile")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, health) = send(&app, get("/api/health")).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["read_only"], true);

        let (status, _) = send(&app, get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_spa_fallback() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Static));

        let response = app.oneshot(get("/blog/first")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"<div id=\"root\"></div>");
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Static));

        let (status, body) = send(&app, get("/api/admin/posts")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let wrong = Request::builder()
            .uri("/api/admin/posts")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            admin_json("POST", "/api/admin/posts", json!({"title": "New"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_backend_post_with_staged_image() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Local));

        let (status, image) =
            send(&app, admin_upload("/api/admin/images?filename=shot.png", b"\x89PNG")).await;
        assert_eq!(status, StatusCode::CREATED);
        let temp_url = image["url"].as_str().unwrap().to_string();
        let temp_path = image["path"].as_str().unwrap().to_string();
        assert!(temp_path.starts_with("temp/"));

        let (status, post) = send(
            &app,
            admin_json(
                "POST",
                "/api/admin/posts",
                json!({
                    "title": "Hello Backend",
                    "content": format!("![shot]({})", temp_url),
                    "tags": "rust, axum",
                    "is_published": true,
                    "staged_images": [temp_path],
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["id"], 1);
        assert_eq!(post["tags"], json!(["rust", "axum"]));
        let content = post["content"].as_str().unwrap();
        assert!(content.starts_with("![shot](/media/posts/1/"));

        let permanent = post["images"][0].as_str().unwrap().to_string();
        let response = app
            .clone()
            .oneshot(get(&format!("/media/{}", permanent)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, post) = send(&app, get("/api/posts/hello-backend")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(post["view_count"], 1);

        let (_, listing) = send(
            &app,
            Request::builder()
                .uri("/api/admin/posts")
                .header("authorization", format!("Bearer {}", TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(listing["next_id"], 2);
    }

    #[tokio::test]
    async fn test_backend_publish_update_delete() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Local));

        let (_, post) = send(
            &app,
            admin_json("POST", "/api/admin/posts", json!({"title": "Draft One"})),
        )
        .await;
        let id = post["id"].as_u64().unwrap();

        let (status, _) = send(&app, get(&format!("/api/posts/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, post) = send(
            &app,
            admin_json(
                "POST",
                &format!("/api/admin/posts/{}/publish", id),
                json!({"published": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(post["is_published"], true);

        let (status, post) = send(
            &app,
            admin_json(
                "PUT",
                &format!("/api/admin/posts/{}", id),
                json!({"title": "Renamed", "is_published": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(post["title"], "Renamed");

        let (status, _) = send(
            &app,
            admin_json("PUT", &format!("/api/admin/posts/{}", id), json!({"title": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            admin_json("DELETE", &format!("/api/admin/posts/{}", id), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            admin_json("DELETE", &format!("/api/admin/posts/{}", id), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Local));

        let (status, _) =
            send(&app, admin_upload("/api/admin/images?filename=run.exe", b"MZ")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let big: &'static [u8] = &[0u8; 128];
        let (status, body) =
            send(&app, admin_upload("/api/admin/images?filename=big.png", big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            admin_json("POST", "/api/admin/media/cleanup", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 0);
    }

    #[tokio::test]
    async fn test_visitor_counting() {
        let dir = TempDir::new().unwrap();
        let app = app(&site(&dir, BackendKind::Static));

        let visit = || {
            Request::builder()
                .method("POST")
                .uri("/api/visitors")
                .header(VISITOR_HEADER, "browser-1")
                .body(Body::empty())
                .unwrap()
        };

        let (_, first) = send(&app, visit()).await;
        assert_eq!(first["counted"], true);
        assert_eq!(first["total"], 1);

        let (_, second) = send(&app, visit()).await;
        assert_eq!(second["counted"], false);

        let (_, stats) = send(&app, get("/api/visitors")).await;
        assert_eq!(stats["today"], 1);
    }

    #[test]
    fn test_markdown_change_reloads_static_store() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir, BackendKind::Static);
        let repo = RwLock::new(site.open_repository().unwrap());
        assert_eq!(repo.blocking_read().list_posts(false).unwrap().len(), 2);

        let third = site.posts_dir().join("third.md");
        fs::write(&third, "---\ntitle: Third\ndate: 2024-04-01\n---\nNew\n").unwrap();
        let notes = site.posts_dir().join("notes.txt");
        fs::write(&notes, "scratch").unwrap();

        assert!(!reload_changed(&repo, &[notes.as_path()]).unwrap());
        assert_eq!(repo.blocking_read().list_posts(false).unwrap().len(), 2);

        assert!(reload_changed(&repo, &[notes.as_path(), third.as_path()]).unwrap());
        let posts = repo.blocking_read().list_posts(false).unwrap();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].slug, "third");
    }
}
