use crate::error::AppError;
use crate::services::backup_service;
use crate::state::AppState;
use anyhow::anyhow;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use hostwatch_core::monitor::report::StatusSummary;
use hostwatch_core::InteractionHandle;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const NO_CREDENTIAL: &str = "Remote access is not configured (set SSH_USERNAME and SSH_KEY)";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", post(status))
        .route("/backup", post(backup))
        .route("/patch", post(patch))
        .route("/restart", post(restart))
}

#[derive(Debug, Default, Deserialize)]
struct CommandRequest {
    #[serde(default)]
    interaction_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PatchRequest {
    #[serde(default)]
    restart: bool,
    #[serde(default)]
    interaction_url: Option<String>,
}

/// An empty body means "no options".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))
}

/// Mirror the reply to the caller's interaction, if it gave one.
async fn reply(state: &AppState, interaction_url: Option<&str>, text: &str, ephemeral: bool) {
    let Some(url) = interaction_url else { return };
    let handle = InteractionHandle(url.to_string());
    if let Err(e) = state.notifier.respond(&handle, text, ephemeral).await {
        tracing::warn!(error = %e, "Failed to respond to interaction");
    }
}

async fn status(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<StatusSummary>, AppError> {
    let req: CommandRequest = parse_body(&body)?;
    let summary = state.status.snapshot(state.config.status_timeout).await.summary();
    reply(&state, req.interaction_url.as_deref(), &summary.text, true).await;
    Ok(Json(summary))
}

async fn backup(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let req: CommandRequest = parse_body(&body)?;
    if state.snapshots.is_none() {
        return Err(AppError::ServiceUnavailable(NO_CREDENTIAL.into()));
    }
    if state.backup_in_progress() {
        return Err(AppError::Conflict("A backup is already in progress".into()));
    }

    reply(&state, req.interaction_url.as_deref(), backup_service::STARTED_MESSAGE, false).await;

    let destination = state.backup_destination.clone();
    let task_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = backup_service::run_backup(task_state, destination).await {
            tracing::error!(error = %e, "Backup command failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": backup_service::STARTED_MESSAGE })),
    ))
}

async fn patch(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, AppError> {
    let req: PatchRequest = parse_body(&body)?;
    let patcher = state
        .patcher
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable(NO_CREDENTIAL.into()))?;
    let interaction = req.interaction_url.as_deref();

    let engine = patcher.clone();
    let applied = tokio::task::spawn_blocking(move || engine.apply_patch())
        .await
        .map_err(|e| anyhow!(e))?;
    let report = match applied {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Patch failed");
            reply(&state, interaction, &format!("Failed to apply patch: {e}"), false).await;
            return Err(e.into());
        }
    };

    let mut text = format!("Patch applied successfully.\n{}", report.summary());
    let mut restarted = None;
    if req.restart {
        let outcome = tokio::task::spawn_blocking(move || patcher.restart_service())
            .await
            .map_err(|e| anyhow!(e))?;
        match outcome {
            Ok(_) => {
                text.push_str("\nService restarted successfully.");
                restarted = Some(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Restart after patch failed");
                text.push_str(&format!("\nService restart failed: {e}"));
                restarted = Some(false);
            }
        }
    }

    reply(&state, interaction, &text, false).await;
    Ok(Json(json!({
        "patched": report.patched,
        "unchanged": report.unchanged,
        "missing": report.missing,
        "restarted": restarted,
        "text": text,
    })))
}

async fn restart(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, AppError> {
    let req: CommandRequest = parse_body(&body)?;
    let patcher = state
        .patcher
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable(NO_CREDENTIAL.into()))?;
    let interaction = req.interaction_url.as_deref();

    let outcome = tokio::task::spawn_blocking(move || patcher.restart_service())
        .await
        .map_err(|e| anyhow!(e))?;
    match outcome {
        Ok(output) => {
            let text = "Service restarted successfully.";
            reply(&state, interaction, text, false).await;
            Ok(Json(json!({ "exit_status": output.exit_status, "text": text })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Service restart failed");
            reply(&state, interaction, &format!("Service restart failed: {e}"), false).await;
            Err(e.into())
        }
    }
}
