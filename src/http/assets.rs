//! Bundled static assets served under `/static/`.

use std::path::Path;

use axum::{
    body::Body,
    extract::Path as UrlPath,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Extension → media type. Anything else is served without a content type.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("png", "image/png"),
];

const ASSETS: &[(&str, &[u8])] = &[
    (
        "css/style.css",
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/static/css/style.css")),
    ),
    (
        "js/list.js",
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/static/js/list.js")),
    ),
    (
        "img/logo.png",
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/static/img/logo.png")),
    ),
];

/// Media type for an asset path, from its extension.
pub fn content_type(asset: &str) -> Option<&'static str> {
    let ext = Path::new(asset).extension()?.to_str()?;
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, media)| *media)
}

/// Look up a bundled asset by its path below `/static/`.
pub fn asset(name: &str) -> Option<&'static [u8]> {
    ASSETS.iter().find(|(path, _)| *path == name).map(|(_, bytes)| *bytes)
}

/// `GET /static/{*asset}`
pub async fn static_asset(UrlPath(name): UrlPath<String>) -> Response {
    asset_response(&name)
}

fn asset_response(name: &str) -> Response {
    let Some(bytes) = asset(name) else {
        tracing::debug!(asset = %name, "Static asset not found");
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut response = Response::new(Body::from(bytes));
    if let Some(media) = content_type(name) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(media));
    }
    response
}
