// routes/customer_care.rs
// Customer Care / Liaison: the liaison queue, requirement file uploads that
// drive derived completion, the inspection checklist, and hand-offs.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::models::UserRole;
use crate::session::SessionUser;
use crate::state::{
    AppState, ClientQuery, TransitionOutcome, add_photo, apply_transition, clients_in_statuses,
    count_photos, delete_photo, get_client_by_id, get_requirement_by_id,
    list_requirements_with_photos, list_tracking_numbers, recompute_completion, set_presence,
};
use crate::storage::{delete_upload_best_effort, proof_photo_file_name, save_proof_photo};
use crate::workflow::{Status, WorkflowAction};

use super::helpers::*;

const PAGE_SIZE: u64 = 10;
const ALLOWED: &[UserRole] = &[UserRole::CustomerCare];

#[derive(Deserialize)]
pub struct CustomerCareDashboardQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub liaison_page: Option<u64>,
    pub completed_page: Option<u64>,
}

pub async fn dashboard(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerCareDashboardQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let base = |page: Option<u64>| ClientQuery {
        search: query.search.clone(),
        sort_order: query.sort_order.clone(),
        page,
    };
    let liaison = clients_in_statuses(
        &state,
        &[Status::CustomerCare],
        &base(query.liaison_page),
        PAGE_SIZE,
        true,
        None,
    )
    .await;
    let completed = clients_in_statuses(
        &state,
        &[Status::DocumentOfficer, Status::Completed, Status::Clearance],
        &base(query.completed_page),
        PAGE_SIZE,
        true,
        None,
    )
    .await;
    match (liaison, completed) {
        (Ok(liaison), Ok(completed)) => Json(json!({
            "liaison_clients": liaison,
            "completed_clients": completed,
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
    query: Query<CustomerCareDashboardQuery>,
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

/// The only guarded hand-off: every required requirement needs at least one
/// uploaded file, or the transition is rejected with no mutation.
pub async fn proceed_to_document_officer(
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
        WorkflowAction::ProceedToDocumentOfficer,
        session_user.roles(),
        None,
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("CustomerCare");
            ok_message("Client moved to Document Officer.")
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

pub async fn return_to_planning(
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
        WorkflowAction::ReturnToPlanning,
        session_user.roles(),
        None,
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("CustomerCare");
            ok_message("Client returned to Planning Officer.")
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct InspectionRequest {
    #[serde(default)]
    pub present_ids: Vec<String>,
}

/// Inspection checklist: `is_present` is set for exactly the submitted ids.
pub async fn save_requirements(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<InspectionRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_client_by_id(&state, &id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Client not found."),
        Err(_) => return internal_error(),
    }
    let present_ids: Vec<_> = body
        .present_ids
        .iter()
        .filter_map(|raw| mongodb::bson::oid::ObjectId::parse_str(raw).ok())
        .collect();
    match set_presence(&state, &id, &present_ids).await {
        Ok(()) => ok_message("Requirements inspection saved successfully."),
        Err(_) => internal_error(),
    }
}

pub async fn requirement_summary(
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
        Ok(requirements) => {
            let items: Vec<_> = requirements
                .into_iter()
                .map(|r| {
                    json!({
                        "id": r.requirement.id.map(|id| id.to_hex()),
                        "requirement_name": r.requirement.requirement_name,
                        "is_required": r.requirement.is_required,
                        "files": r.photos.len(),
                    })
                })
                .collect();
            Json(json!({ "items": items })).into_response()
        }
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct TrackingQuery {
    pub sort_order: Option<String>,
}

pub async fn tracking_numbers(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    match list_tracking_numbers(&state, query.sort_order.as_deref()).await {
        Ok(clients) => {
            let rows: Vec<_> = clients
                .into_iter()
                .map(|c| {
                    json!({
                        "client_name": c.client_name,
                        "type_of_project": c.type_of_project,
                        "status": c.status.as_str(),
                        "tracking_number": c.tracking_number,
                        "created_date": c.created_date,
                    })
                })
                .collect();
            Json(json!({ "clients": rows })).into_response()
        }
        Err(_) => internal_error(),
    }
}

/// Upload path that owns completion: after storing the files the requirement
/// is completed exactly when its photo count is positive.
pub async fn upload_requirement_files(
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

    let mut stored = 0u32;
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
        let file_name = proof_photo_file_name(&requirement_id, &original);
        let photo_path = match save_proof_photo(&file_name, &bytes).await {
            Ok(path) => path,
            Err(_) => return internal_error(),
        };
        if add_photo(&state, &requirement_id, &photo_path).await.is_err() {
            return internal_error();
        }
        stored += 1;
    }

    if stored > 0 {
        if recompute_completion(&state, &requirement_id).await.is_err() {
            return internal_error();
        }
        state.events.publish("CustomerCare");
    }
    let files = count_photos(&state, &requirement_id).await.unwrap_or(0);
    Json(json!({
        "ok": true,
        "message": "Files uploaded successfully.",
        "requirement_id": requirement_id.to_hex(),
        "files": files,
    }))
    .into_response()
}

/// Deleting the last photo flips the requirement back to incomplete.
pub async fn remove_photo(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let photo_id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match delete_photo(&state, &photo_id).await {
        Ok(Some(photo)) => {
            delete_upload_best_effort(&photo.photo_path);
            if recompute_completion(&state, &photo.requirement_id).await.is_err() {
                return internal_error();
            }
            state.events.publish("CustomerCare");
            let files = count_photos(&state, &photo.requirement_id).await.unwrap_or(0);
            Json(json!({
                "ok": true,
                "message": "Photo deleted successfully.",
                "requirement_id": photo.requirement_id.to_hex(),
                "files": files,
            }))
            .into_response()
        }
        Ok(None) => not_found("Photo not found"),
        Err(_) => internal_error(),
    }
}
