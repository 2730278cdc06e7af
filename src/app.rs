use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::database::DbPool;
use crate::logging::request_logger;
use crate::pinning::PinStore;
use crate::resolver::GatewayResolver;
use crate::routes::api_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DbPool,
    pub store: Arc<dyn PinStore>,
    pub resolver: Arc<GatewayResolver>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    success: bool,
    message: String,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: format!("Arkiv API {} is running", crate::VERSION),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub fn create_app(
    config: Arc<Config>,
    pool: DbPool,
    store: Arc<dyn PinStore>,
    resolver: Arc<GatewayResolver>,
) -> Router {
    let state = AppState {
        config,
        pool,
        store,
        resolver,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health))
        .merge(api_router());

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state);

    // Serve the web frontend if a build is present
    let static_dir = std::env::var("ARKIV_STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("../web/dist"));

    if static_dir.exists() {
        app = app.fallback(move |req: Request<Body>| {
            let static_dir = static_dir.clone();
            async move {
                let path = req.uri().path().trim_start_matches('/');

                let file_path = static_dir.join(path);
                if file_path.exists() && file_path.is_file() {
                    return serve_static_file(file_path).await;
                }

                // Fall back to index.html for SPA routing
                let index_path = static_dir.join("index.html");
                if index_path.exists() {
                    return serve_static_file(index_path).await;
                }

                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
        });
    }

    app
}

async fn serve_static_file(path: PathBuf) -> Response {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return (StatusCode::NOT_FOUND, "Not Found").into_response(),
    };

    let mime_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .body(body)
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "").into_response())
}
