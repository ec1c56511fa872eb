// routes/backup.rs
// Admin-triggered backups, artifact history, and guarded deletion.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::backup::{
    backup_history, create_data_backup, create_files_backup, create_full_backup, delete_backup,
};
use crate::session::SessionUser;
use crate::state::AppState;

use super::helpers::*;

fn require_admin(session_user: &SessionUser) -> Result<(), Response> {
    if session_user.is_admin() {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN.into_response())
    }
}

pub async fn run_data_backup(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match create_data_backup(&state).await {
        Ok(path) => Json(json!({
            "ok": true,
            "message": "Database backup created successfully.",
            "path": path.display().to_string(),
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn run_files_backup(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match create_files_backup(&state).await {
        Ok(path) => Json(json!({
            "ok": true,
            "message": "Client files backup created successfully.",
            "path": path.display().to_string(),
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn run_full_backup(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match create_full_backup(&state).await {
        Ok((data, files)) => Json(json!({
            "ok": true,
            "message": "Full backup completed successfully.",
            "data_path": data.display().to_string(),
            "files_path": files.display().to_string(),
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn history(session_user: SessionUser) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match backup_history() {
        Ok(history) => Json(json!({ "backups": history })).into_response(),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct DeleteBackupRequest {
    pub file_path: String,
}

pub async fn delete(session_user: SessionUser, Json(body): Json<DeleteBackupRequest>) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match delete_backup(&body.file_path) {
        Ok(true) => ok_message("Backup deleted."),
        Ok(false) => not_found("Backup file not found."),
        Err(_) => internal_error(),
    }
}
