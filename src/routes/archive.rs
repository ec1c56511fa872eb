// routes/archive.rs
// Archived clients stay readable: filtered listing, details, and stored-file
// serving for Admin and the Document Officer.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::models::UserRole;
use crate::session::SessionUser;
use crate::state::{
    AppState, ArchiveQuery, archived_clients, get_client_by_id, get_photo_by_id,
    list_requirements_with_photos,
};
use crate::storage::{content_type_for, resolve_upload_path};

use super::helpers::*;

const ALLOWED: &[UserRole] = &[UserRole::DocumentOfficer];

pub async fn index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArchiveQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    match archived_clients(&state, &query).await {
        Ok(page) => Json(json!({
            "clients": page,
            "current_filter": query.search,
            "current_sort": query.sort_order,
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn latest(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    query: Query<ArchiveQuery>,
) -> Response {
    index(session_user, state, query).await
}

pub async fn details(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_client_by_id(&state, &id).await {
        Ok(Some(client)) => {
            let requirements = list_requirements_with_photos(&state, &id)
                .await
                .unwrap_or_default();
            Json(json!({ "client": client, "requirements": requirements })).into_response()
        }
        Ok(None) => not_found("Client not found."),
        Err(_) => internal_error(),
    }
}

pub async fn view_file(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let photo = match get_photo_by_id(&state, &id).await {
        Ok(Some(photo)) => photo,
        Ok(None) => return not_found("File not found."),
        Err(_) => return internal_error(),
    };
    let path = resolve_upload_path(&photo.photo_path);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found("File not found on server."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&file_name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
