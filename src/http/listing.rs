//! `GET /list`: HTML listing of every stored route.

use std::collections::BTreeMap;
use std::fmt::Write;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::store::{RouteRecord, RouteStore};

/// Render the listing from the route store.
pub async fn list_routes(State(store): State<RouteStore>) -> Response {
    match tokio::task::spawn_blocking(move || store.get_all()).await {
        Ok(Ok(records)) => Html(render_listing(&records)).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to read routes for listing");
            (StatusCode::INTERNAL_SERVER_ERROR, "Route store unavailable").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Listing task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the listing page, one row per record in key order.
pub fn render_listing(records: &BTreeMap<String, RouteRecord>) -> String {
    let mut page = String::from(concat!(
        "<!DOCTYPE html>\n",
        "<html>\n<head>\n",
        "<meta charset=\"utf-8\">\n",
        "<title>Routes</title>\n",
        "<link rel=\"stylesheet\" href=\"/static/css/style.css\">\n",
        "</head>\n<body>\n",
        "<h1><img src=\"/static/img/logo.png\" alt=\"\" width=\"16\" height=\"16\">Routes</h1>\n",
        "<input id=\"filter\" type=\"search\" placeholder=\"Filter\">\n",
        "<table>\n<thead><tr><th>Path</th><th>Target</th><th>Hits</th></tr></thead>\n<tbody>\n",
    ));

    for record in records.values() {
        let key = escape(&record.key);
        let target = escape(&record.target);
        let _ = writeln!(
            page,
            "<tr><td><a href=\"/{key}\">/{key}</a></td><td>{target}</td><td class=\"hits\">{hits}</td></tr>",
            hits = record.hit_count,
        );
    }

    page.push_str("</tbody>\n</table>\n<script src=\"/static/js/list.js\"></script>\n</body>\n</html>\n");
    page
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
