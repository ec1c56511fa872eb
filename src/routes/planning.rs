// routes/planning.rs
// Planning Officer: queue of clients to plan, the requirement checklist CRUD
// (with proof-photo uploads), and hand-offs to Customer Care / Finance.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, sync::Arc};

use crate::models::UserRole;
use crate::session::SessionUser;
use crate::state::{
    AppState, ClientQuery, TransitionOutcome, apply_transition, clients_in_statuses,
    create_requirement, delete_photo, delete_requirement, get_client_by_id,
    get_requirement_by_id, list_requirements_with_photos, list_users_in_role, set_completion,
    update_requirement_fields,
};
use crate::storage::{delete_upload_best_effort, proof_photo_file_name, save_proof_photo};
use crate::workflow::{Status, WorkflowAction};

use super::helpers::*;

const PAGE_SIZE: u64 = 10;
const ALLOWED: &[UserRole] = &[UserRole::PlanningOfficer];

#[derive(Deserialize)]
pub struct PlanningDashboardQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub pending_page: Option<u64>,
    pub completed_page: Option<u64>,
}

pub async fn dashboard(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlanningDashboardQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }

    // Non-admin officers see their own or unassigned clients only.
    let officer_filter = if session_user.is_admin() {
        None
    } else {
        Some(*session_user.user_id())
    };

    let base = |page: Option<u64>| ClientQuery {
        search: query.search.clone(),
        sort_order: query.sort_order.clone(),
        page,
    };
    let pending = match clients_in_statuses(
        &state,
        &[Status::Planning],
        &base(query.pending_page),
        PAGE_SIZE,
        true,
        officer_filter.as_ref(),
    )
    .await
    {
        Ok(page) => page,
        Err(_) => return internal_error(),
    };
    let completed = match clients_in_statuses(
        &state,
        &[Status::CustomerCare, Status::DocumentOfficer, Status::Completed],
        &base(query.completed_page),
        PAGE_SIZE,
        true,
        officer_filter.as_ref(),
    )
    .await
    {
        Ok(page) => page,
        Err(_) => return internal_error(),
    };

    // Requirements for every client on either page, keyed by client id
    let mut requirements_by_client = HashMap::new();
    for client in pending.items.iter().chain(completed.items.iter()) {
        let Some(id) = client.id else { continue };
        if let Ok(requirements) = list_requirements_with_photos(&state, &id).await {
            requirements_by_client.insert(id.to_hex(), requirements);
        }
    }

    Json(json!({
        "pending_clients": pending,
        "completed_clients": completed,
        "requirements_by_client": requirements_by_client,
        "current_filter": query.search,
        "current_sort": query.sort_order,
    }))
    .into_response()
}

pub async fn latest(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    query: Query<PlanningDashboardQuery>,
) -> Response {
    dashboard(session_user, state, query).await
}

pub async fn client_requirements(
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

struct RequirementForm {
    client_id: Option<String>,
    requirement_name: String,
    description: String,
    is_required: bool,
    files: Vec<(String, Vec<u8>)>,
    delete_photo_ids: Vec<String>,
}

fn truthy(value: &str) -> bool {
    matches!(value, "true" | "on" | "1")
}

async fn read_requirement_form(mut multipart: Multipart) -> Result<RequirementForm, Response> {
    let mut form = RequirementForm {
        client_id: None,
        requirement_name: String::new(),
        description: String::new(),
        is_required: false,
        files: Vec::new(),
        delete_photo_ids: Vec::new(),
    };
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return Err(bad_request("malformed multipart body")),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "client_id" => {
                form.client_id = field.text().await.ok().filter(|v| !v.is_empty());
            }
            "requirement_name" => {
                form.requirement_name = field.text().await.unwrap_or_default();
            }
            "description" => {
                form.description = field.text().await.unwrap_or_default();
            }
            "is_required" => {
                form.is_required = field.text().await.map(|v| truthy(&v)).unwrap_or(false);
            }
            "delete_photo_ids" => {
                if let Ok(value) = field.text().await {
                    for id in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                        form.delete_photo_ids.push(id.to_string());
                    }
                }
            }
            "files" => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                match field.bytes().await {
                    Ok(bytes) if !bytes.is_empty() => {
                        form.files.push((file_name, bytes.to_vec()));
                    }
                    Ok(_) => {}
                    Err(_) => return Err(bad_request("failed to read uploaded file")),
                }
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }
    Ok(form)
}

async fn store_photos(
    state: &AppState,
    requirement_id: &mongodb::bson::oid::ObjectId,
    files: &[(String, Vec<u8>)],
) -> anyhow::Result<()> {
    for (original, bytes) in files {
        let file_name = proof_photo_file_name(requirement_id, original);
        let photo_path = save_proof_photo(&file_name, bytes).await?;
        crate::state::add_photo(state, requirement_id, &photo_path).await?;
    }
    Ok(())
}

pub async fn add_requirement(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let form = match read_requirement_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    if form.requirement_name.trim().is_empty() || form.description.trim().is_empty() {
        return bad_request("Name and description are required");
    }
    let Some(client_id) = form.client_id.as_deref() else {
        return bad_request("client_id is required");
    };
    let client_id = match parse_object_id(client_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_client_by_id(&state, &client_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Client not found"),
        Err(_) => return internal_error(),
    }

    let requirement_id = match create_requirement(
        &state,
        &client_id,
        form.requirement_name.trim(),
        form.description.trim(),
        form.is_required,
    )
    .await
    {
        Ok(id) => id,
        Err(_) => return internal_error(),
    };
    if store_photos(&state, &requirement_id, &form.files).await.is_err() {
        return internal_error();
    }
    state.events.publish("PlanningOfficer");
    Json(json!({
        "ok": true,
        "message": "Requirement added successfully!",
        "id": requirement_id.to_hex(),
    }))
    .into_response()
}

/// Edits text fields, deletes the selected photos, adds new uploads.
/// Completion is not touched here; Customer Care owns it.
pub async fn update_requirement(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let form = match read_requirement_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    if form.requirement_name.trim().is_empty() || form.description.trim().is_empty() {
        return bad_request("Name and description are required");
    }

    match update_requirement_fields(
        &state,
        &id,
        form.requirement_name.trim(),
        form.description.trim(),
        form.is_required,
    )
    .await
    {
        Ok(true) => {}
        Ok(false) => return not_found("Requirement not found."),
        Err(_) => return internal_error(),
    }

    for photo_id in &form.delete_photo_ids {
        let Ok(photo_id) = mongodb::bson::oid::ObjectId::parse_str(photo_id) else {
            continue;
        };
        match delete_photo(&state, &photo_id).await {
            Ok(Some(photo)) => delete_upload_best_effort(&photo.photo_path),
            Ok(None) => {}
            Err(_) => return internal_error(),
        }
    }

    if store_photos(&state, &id, &form.files).await.is_err() {
        return internal_error();
    }
    state.events.publish("PlanningOfficer");
    ok_message("Requirement updated successfully!")
}

pub async fn remove_requirement(
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
    // Missing requirement deletes are a silent success
    if get_requirement_by_id(&state, &id).await.ok().flatten().is_some() {
        match delete_requirement(&state, &id).await {
            Ok(photos) => {
                for photo in photos {
                    delete_upload_best_effort(&photo.photo_path);
                }
                state.events.publish("PlanningOfficer");
            }
            Err(_) => return internal_error(),
        }
    }
    ok_message("Requirement deleted successfully!")
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub is_completed: bool,
}

pub async fn toggle_requirement(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match set_completion(&state, &id, body.is_completed).await {
        Ok(true) => {
            state.events.publish("PlanningOfficer");
            ok_message("Requirement updated.")
        }
        Ok(false) => not_found("Requirement not found"),
        Err(_) => internal_error(),
    }
}

pub async fn remove_photo(
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
            state.events.publish("PlanningOfficer");
            ok_message("Photo deleted successfully")
        }
        Ok(None) => not_found("Photo not found"),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct ProceedToLiaisonRequest {
    pub assigned_user_id: Option<String>,
}

pub async fn proceed_to_liaison(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ProceedToLiaisonRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let assignee = match body.assigned_user_id.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => match parse_object_id(raw) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
        None => None,
    };
    match apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToLiaison,
        session_user.roles(),
        None,
        assignee,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(client)) => {
            state.events.publish("PlanningOfficer");
            ok_message(&format!(
                "Client {} has been proceeded to Customer Care.",
                client.client_name
            ))
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct BackToFinanceRequest {
    pub note: Option<String>,
}

pub async fn back_to_finance(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<BackToFinanceRequest>,
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
        WorkflowAction::BackToFinance,
        session_user.roles(),
        body.note.clone(),
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("PlanningOfficer");
            ok_message(&format!(
                "Client returned to Finance for review. Note: {}",
                body.note.unwrap_or_default()
            ))
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

pub async fn complete_planning(
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
        WorkflowAction::CompletePlanning,
        session_user.roles(),
        None,
        None,
    )
    .await
    {
        Ok(TransitionOutcome::Applied(_)) => {
            state.events.publish("PlanningOfficer");
            ok_message("Requirements planning completed successfully!")
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

/// Customer Care staff available for assignment during the liaison hand-off.
pub async fn customer_care_users(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    match list_users_in_role(&state, UserRole::CustomerCare).await {
        Ok(users) => {
            let result: Vec<_> = users
                .into_iter()
                .filter_map(|u| {
                    u.id.map(|id| json!({ "id": id.to_hex(), "name": u.full_name }))
                })
                .collect();
            Json(json!({ "users": result })).into_response()
        }
        Err(_) => internal_error(),
    }
}
