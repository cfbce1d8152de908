//! Integration tests for the dashboard REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mirador_core::control::{ControlError, GameInfo};
use mirador_core::dashboard::ServerInfo;
use mirador_core::{Dashboard, HostInfo, PanelConfig, PlayerProfile, ServerControl};
use mirador_observer::router::build_router;
use mirador_observer::state::AppState;
use mirador_types::PluginUpdate;
use serde_json::Value;
use tower::ServiceExt;

struct NoServer;

impl ServerControl for NoServer {
    fn execute_command(&self, _: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("commands"))
    }
    fn broadcast_chat(&self, _: &str, _: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("chat"))
    }
    fn kick_player(&self, uuid: &str, _: Option<&str>) -> Result<String, ControlError> {
        Err(ControlError::PlayerNotFound {
            uuid: uuid.to_owned(),
        })
    }
    fn set_game_rule(&self, _: &str, _: &Value) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("game rules"))
    }
    fn set_commands_enabled(&self, _: bool) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("cheats"))
    }
    fn player_info(&self, uuid: &str) -> Result<GameInfo, ControlError> {
        Err(ControlError::PlayerNotFound {
            uuid: uuid.to_owned(),
        })
    }
    fn install_plugin(&self, _: &str, _: Option<&str>) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugins"))
    }
    fn remove_plugin(&self, _: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugins"))
    }
    fn check_plugin_update(&self, _: &str, _: &str) -> Result<PluginUpdate, ControlError> {
        Ok(PluginUpdate::NotPublished)
    }
    fn online_plugins(&self) -> Result<Vec<Value>, ControlError> {
        Ok(Vec::new())
    }
    fn loaded_plugins(&self) -> Vec<String> {
        Vec::new()
    }
    fn stop(&self) -> Result<(), ControlError> {
        Ok(())
    }
    fn restart(&self) -> Result<(), ControlError> {
        Ok(())
    }
}

async fn make_test_state() -> Arc<AppState> {
    let config = PanelConfig::default();
    let dashboard = Arc::new(Dashboard::new(&config, &HostInfo::probe()).unwrap());
    dashboard
        .mark_online(&ServerInfo {
            session_id: String::from("session-1"),
            version: String::from("1.20.40"),
            protocol: 622,
            motd: String::from("Test Realm"),
            max_players: 8,
        })
        .await
        .unwrap();
    dashboard
        .player_joined(PlayerProfile {
            name: String::from("Steve"),
            uuid: String::from("u-steve"),
            ..PlayerProfile::default()
        })
        .await
        .unwrap();
    dashboard.set_tps(19).await.unwrap();

    Arc::new(AppState::new(dashboard, Arc::new(NoServer), &config))
}

/// A GET request carrying HTTP basic credentials.
fn get_as(uri: &str, username: &str, password: &str) -> Request<Body> {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    Request::get(uri)
        .header("authorization", format!("Basic {encoded}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index_returns_html() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(content_type.contains("text/html"));
    let html = body_to_string(response.into_body()).await;
    assert!(html.contains("ONLINE"));
    assert!(html.contains("Test Realm"));
    assert!(html.contains("1.20.40"));
    assert!(!html.contains("Steve"));
    assert!(!html.contains("/api/state"));
}

#[tokio::test]
async fn test_index_escapes_server_name() {
    let state = make_test_state().await;
    state
        .dashboard
        .mark_online(&ServerInfo {
            session_id: String::from("session-2"),
            version: String::from("1.20.40"),
            protocol: 622,
            motd: String::from("<script>alert('x')</script> & co"),
            max_players: 8,
        })
        .await
        .unwrap();
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let html = body_to_string(response.into_body()).await;
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
}

#[tokio::test]
async fn test_get_state_returns_snapshot() {
    let state = make_test_state().await;
    let expected = state.sync().snapshot().await;
    let router = build_router(state);

    let response = router
        .oneshot(get_as("/api/state", "admin", "admin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, expected);
    assert_eq!(json["status"], 1);
    assert_eq!(json["server"]["version"], "1.20.40");
    assert_eq!(json["server"]["game"]["tps"], 19);
    assert_eq!(json["server"]["game"]["players"]["u-steve"]["name"], "Steve");
}

#[tokio::test]
async fn test_get_state_reflects_later_mutations() {
    let state = make_test_state().await;
    state.dashboard.player_left("u-steve").await.unwrap();
    let router = build_router(state);

    let response = router
        .oneshot(get_as("/api/state", "admin", "admin"))
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["server"]["game"]["players"], serde_json::json!({}));
}

#[tokio::test]
async fn test_get_state_without_credentials_is_401() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(challenge.starts_with("Basic"));
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 401);
    assert!(json.get("server").is_none());
}

#[tokio::test]
async fn test_get_state_with_wrong_password_is_401() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(get_as("/api/state", "admin", "guess"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::get("/api/state")
                .header("origin", "http://dashboard.example")
                .header("authorization", format!("Basic {}", STANDARD.encode("admin:admin")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let allow = response
        .headers()
        .get("access-control-allow-origin")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert_eq!(allow, "*");
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
