//! Static File Serving
//!
//! Serves the built dashboard SPA from `web/dist`. Unknown paths fall back to
//! `index.html` so client-side routes survive a reload. Unmatched `/api`
//! paths answer a JSON 404 instead.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::types::AppError;

fn get_static_dir() -> PathBuf {
    let paths = [PathBuf::from("web/dist"), PathBuf::from("../web/dist"), PathBuf::from("static")];

    for path in paths {
        if path.is_dir() {
            info!(path = %path.display(), "Found static files directory");
            return path;
        }
    }

    warn!("Static files directory not found, frontend may not be built");
    PathBuf::from("web/dist")
}

pub fn router() -> Router {
    let static_dir = get_static_dir();
    let index = static_dir.join("index.html");

    let spa = if index.is_file() {
        Router::new().fallback_service(
            ServeDir::new(&static_dir)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(index)),
        )
    } else {
        Router::new().route("/", get(api_only)).fallback(api_only)
    };

    spa.layer(middleware::from_fn(unknown_api_route))
}

async fn unknown_api_route(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::NotFound(format!("No API route for {}", path)).into_response();
    }
    next.run(request).await
}

async fn api_only() -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Html(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Payrail API</title></head>
<body>
    <h1>Payrail</h1>
    <p>The API is running. Build the dashboard into <code>web/dist</code> to serve it here.</p>
    <ul>
        <li><code>GET /api/health</code></li>
        <li><code>POST /api/auth/google</code></li>
        <li><code>GET /api/dashboard</code></li>
        <li><code>POST /api/payments</code></li>
    </ul>
</body>
</html>"#,
        ),
    )
        .into_response()
}
