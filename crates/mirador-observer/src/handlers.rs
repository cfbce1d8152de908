//! REST endpoint handlers for the dashboard server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page (online state, name, version) |
//! | `GET` | `/api/state` | Full state tree snapshot, dashboard account only |
//!
//! `/api/state` carries the same data as a socket login, so it asks for
//! the same credentials, sent as HTTP basic authentication.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mirador_types::path;
use serde_json::Value;

use crate::error::ObserverError;
use crate::state::AppState;

/// Escape text for insertion into HTML.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decode `Authorization: Basic <base64(user:password)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing whether the server is up.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sync = state.sync();
    let online = sync.get(&path!["status"]).await.as_ref().and_then(Value::as_u64) == Some(1);
    let status = if online { "ONLINE" } else { "OFFLINE" };
    let text = |value: Option<Value>| {
        escape_html(value.as_ref().and_then(Value::as_str).unwrap_or(""))
    };
    let name = text(sync.get(&path!["server", "info", "name"]).await);
    let version = text(sync.get(&path!["server", "version"]).await);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Mirador</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        code {{ color: #58a6ff; }}
        ul {{ list-style: none; padding: 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Mirador</h1>
    <p class="subtitle">{name} {version}</p>

    <p>Status: <span class="status">{status}</span></p>

    <ul>
        <li><code>ws://host:port/ws</code> -- Dashboard session</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/state -- full snapshot
// ---------------------------------------------------------------------------

/// Return the whole state tree as the dashboard would receive it.
///
/// # Errors
///
/// Returns [`ObserverError::Unauthorized`] unless the request carries the
/// dashboard account's credentials.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ObserverError> {
    let authorized = basic_credentials(&headers)
        .is_some_and(|(username, password)| state.account.matches(&username, &password));
    if !authorized {
        return Err(ObserverError::Unauthorized);
    }
    Ok(Json(state.sync().snapshot().await))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ObserverError {
    ObserverError::NotFound(String::from("no such endpoint"))
}
