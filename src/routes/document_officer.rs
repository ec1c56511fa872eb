// routes/document_officer.rs
// Document Officer: documentation queue, requirement file browsing/serving,
// optional extra uploads, and the clearance/return hand-offs.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::models::UserRole;
use crate::session::SessionUser;
use crate::state::{
    AppState, ClientQuery, TransitionOutcome, add_photo, apply_transition, clients_in_statuses,
    delete_photo, get_client_by_id, get_photo_by_id, get_requirement_by_id,
    list_requirements_with_photos,
};
use crate::storage::{
    content_type_for, delete_upload_best_effort, resolve_upload_path, save_proof_photo,
    unique_file_name,
};
use crate::workflow::{Status, WorkflowAction};

use super::helpers::*;

const PAGE_SIZE: u64 = 10;
const ALLOWED: &[UserRole] = &[UserRole::DocumentOfficer];

#[derive(Deserialize)]
pub struct DocumentOfficerDashboardQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub pending_page: Option<u64>,
    pub archived_page: Option<u64>,
}

pub async fn dashboard(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentOfficerDashboardQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let base = |page: Option<u64>| ClientQuery {
        search: query.search.clone(),
        sort_order: query.sort_order.clone(),
        page,
    };
    let pending = clients_in_statuses(
        &state,
        &[Status::DocumentOfficer],
        &base(query.pending_page),
        PAGE_SIZE,
        true,
        None,
    )
    .await;
    let archived = clients_in_statuses(
        &state,
        &[Status::Archived],
        &base(query.archived_page),
        PAGE_SIZE,
        true,
        None,
    )
    .await;
    match (pending, archived) {
        (Ok(pending), Ok(archived)) => Json(json!({
            "pending_clients": pending,
            "archived_clients": archived,
            "current_filter": query.search,
            "current_sort": query.sort_order,
        }))
        .into_response(),
        _ => internal_error(),
    }
}

pub async fn latest(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    query: Query<DocumentOfficerDashboardQuery>,
) -> Response {
    dashboard(session_user, state, query).await
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

pub async fn proceed_to_finance(
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
    match apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToFinance,
        session_user.roles(),
        None,
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("DocumentOfficer");
            ok_message("Client has been sent to Finance for clearance.")
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

pub async fn return_to_customer_care(
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
    match apply_transition(
        &state,
        &id,
        WorkflowAction::ReturnToCustomerCare,
        session_user.roles(),
        None,
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("DocumentOfficer");
            ok_message("Client returned to Customer Care (Liaison).")
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

/// Streams a stored file back with a content type derived from its
/// extension.
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

pub async fn client_files(
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
    match list_requirements_with_photos(&state, &id).await {
        Ok(requirements) => Json(json!({ "requirements": requirements })).into_response(),
        Err(_) => internal_error(),
    }
}

/// Extra supporting files; uses generated unique names and does not touch
/// derived completion.
pub async fn upload_optional_files(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let requirement_id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_requirement_by_id(&state, &requirement_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Requirement not found."),
        Err(_) => return internal_error(),
    }

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return bad_request("malformed multipart body"),
        };
        if field.name() != Some("files") {
            let _ = field.bytes().await;
            continue;
        }
        let original = field.file_name().unwrap_or("file").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(_) => return bad_request("failed to read uploaded file"),
        };
        if bytes.is_empty() {
            continue;
        }
        let file_name = unique_file_name(&original);
        let photo_path = match save_proof_photo(&file_name, &bytes).await {
            Ok(path) => path,
            Err(_) => return internal_error(),
        };
        if add_photo(&state, &requirement_id, &photo_path).await.is_err() {
            return internal_error();
        }
    }

    state.events.publish("DocumentOfficer");
    ok_message("Optional files uploaded successfully.")
}

pub async fn delete_file(
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
    match delete_photo(&state, &id).await {
        Ok(Some(photo)) => {
            delete_upload_best_effort(&photo.photo_path);
            state.events.publish("DocumentOfficer");
            ok_message("File deleted successfully.")
        }
        Ok(None) => not_found("File not found."),
        Err(_) => internal_error(),
    }
}
