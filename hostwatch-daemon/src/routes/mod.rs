pub mod commands;
pub mod health;

use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/commands", commands::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hostwatch_core::monitor::target::Target;
    use hostwatch_core::monitor::ProbeTimeouts;
    use hostwatch_core::probe::TargetProber;
    use hostwatch_core::{InteractionHandle, MonitorEngine, Notifier, Result};
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Port 22 is up, everything else is down.
    struct OnlySsh;

    #[async_trait]
    impl TargetProber for OnlySsh {
        async fn probe(&self, target: &Target, _timeout: Duration) -> bool {
            matches!(target, Target::Port { number: 22, .. })
        }
    }

    #[derive(Default)]
    struct Replies(Mutex<Vec<(String, String, bool)>>);

    #[async_trait]
    impl Notifier for Replies {
        async fn notify(&self, _destination: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn respond(&self, interaction: &InteractionHandle, text: &str, ephemeral: bool) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((interaction.0.clone(), text.to_string(), ephemeral));
            Ok(())
        }

        async fn attach_file(&self, _: &str, _: &str, _: Vec<u8>, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn app(replies: Arc<Replies>) -> Router {
        let config = AppConfig::from_lookup(|key| match key {
            "MONITOR_HOST" => Some("10.0.0.5".to_string()),
            "MONITOR_PORTS" => Some("22:SSH,80:HTTP Website".to_string()),
            _ => None,
        })
        .unwrap();
        let engine = MonitorEngine::new(
            config.monitor_host.clone(),
            config.targets(),
            Arc::new(OnlySsh),
            ProbeTimeouts::default(),
        )
        .unwrap();
        let state = AppState::new(config, replies, engine.checker());
        create_router(Arc::new(state))
    }

    async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["host"], "10.0.0.5");
    }

    #[tokio::test]
    async fn test_status_with_empty_body() {
        let (status, body) = post(app(Arc::default()), "/commands/status", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["header"], "🟡 1/2 services on 10.0.0.5 are down");
        assert_eq!(body["lines"][0], "SSH: ✅ UP");
        assert_eq!(body["lines"][1], "HTTP Website: ❌ DOWN");
        assert_eq!(body["down"], 1);
    }

    #[tokio::test]
    async fn test_status_replies_ephemerally_to_interaction() {
        let replies = Arc::new(Replies::default());
        let (status, _) = post(
            app(replies.clone()),
            "/commands/status",
            r#"{"interaction_url":"http://chat/interactions/1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let sent = replies.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "http://chat/interactions/1");
        assert!(sent[0].1.starts_with("🟡 1/2"));
        assert!(sent[0].2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (status, body) = post(app(Arc::default()), "/commands/status", "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_remote_commands_need_a_credential() {
        for uri in ["/commands/backup", "/commands/patch", "/commands/restart"] {
            let (status, body) = post(app(Arc::default()), uri, r#"{"restart":true}"#).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert!(body["error"].as_str().unwrap().contains("SSH_USERNAME"));
        }
    }
}
