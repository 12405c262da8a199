//! Static file serving

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embedded stylesheet and scripts
#[derive(RustEmbed)]
#[folder = "static/"]
#[include = "*"]
struct StaticAssets;

/// GET /static/{*path}
pub async fn serve_static(Path(path): Path<String>) -> Response {
    match StaticAssets::get(&path) {
        Some(content) => build_response(&path, content.data.into_owned()),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

fn build_response(path: &str, data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, get_content_type(path)),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        data,
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css",
        "js" => "application/javascript",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
