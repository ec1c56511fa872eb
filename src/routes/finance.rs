// routes/finance.rs
// Finance intake: dashboard queues, client CRUD, and the finance-owned
// hand-offs (send to planning, archive, return to document officer).

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::models::UserRole;
use crate::session::SessionUser;
use crate::state::{
    AppState, ClientInput, ClientQuery, TransitionOutcome, apply_transition,
    clients_in_statuses, create_client, delete_client, get_client_by_id,
    list_requirements_with_photos, update_client, validate_client,
};
use crate::workflow::{Status, WorkflowAction};

use super::helpers::*;

const PAGE_SIZE: u64 = 5;
const ALLOWED: &[UserRole] = &[UserRole::Finance];

#[derive(Deserialize)]
pub struct FinanceDashboardQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub pending_page: Option<u64>,
    pub clearance_page: Option<u64>,
    pub planning_page: Option<u64>,
}

async fn dashboard_payload(
    state: &AppState,
    query: &FinanceDashboardQuery,
) -> anyhow::Result<serde_json::Value> {
    let base = |page: Option<u64>| ClientQuery {
        search: query.search.clone(),
        sort_order: query.sort_order.clone(),
        page,
    };
    let pending = clients_in_statuses(
        state,
        &[Status::Pending, Status::Finance],
        &base(query.pending_page),
        PAGE_SIZE,
        false,
        None,
    )
    .await?;
    let clearance = clients_in_statuses(
        state,
        &[Status::Clearance],
        &base(query.clearance_page),
        PAGE_SIZE,
        false,
        None,
    )
    .await?;
    let planning = clients_in_statuses(
        state,
        &[Status::Planning, Status::CustomerCare],
        &base(query.planning_page),
        PAGE_SIZE,
        false,
        None,
    )
    .await?;
    Ok(json!({
        "pending_clients": pending,
        "clearance_clients": clearance,
        "planning_clients": planning,
        "current_filter": query.search,
        "current_sort": query.sort_order,
    }))
}

pub async fn dashboard(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<FinanceDashboardQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    match dashboard_payload(&state, &query).await {
        Ok(payload) => Json(payload).into_response(),
        Err(_) => internal_error(),
    }
}

/// Identical query for polling refresh.
pub async fn latest(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    query: Query<FinanceDashboardQuery>,
) -> Response {
    dashboard(session_user, state, query).await
}

pub async fn create(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ClientInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let errors = validate_client(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match create_client(&state, &input).await {
        Ok(id) => {
            state.events.publish("Finance");
            let tracking_number = get_client_by_id(&state, &id)
                .await
                .ok()
                .flatten()
                .map(|c| c.tracking_number);
            Json(json!({
                "ok": true,
                "message": "Client created successfully!",
                "id": id.to_hex(),
                "tracking_number": tracking_number,
            }))
            .into_response()
        }
        Err(_) => internal_error(),
    }
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

pub async fn update(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<ClientInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let errors = validate_client(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match update_client(&state, &id, &input).await {
        Ok(true) => {
            state.events.publish("Finance");
            ok_message("Client updated successfully!")
        }
        // Concurrent delete and plain not-found are indistinguishable here
        Ok(false) => not_found("Client not found or modified concurrently."),
        Err(_) => internal_error(),
    }
}

/// Deleting a client that is already gone is a silent success.
pub async fn delete(
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
    match delete_client(&state, &id).await {
        Ok(()) => {
            state.events.publish("Finance");
            ok_message("Client deleted.")
        }
        Err(_) => internal_error(),
    }
}

async fn transition(
    state: &AppState,
    session_user: &SessionUser,
    id: &str,
    action: WorkflowAction,
    success: impl Fn(&crate::models::Client) -> String,
) -> Response {
    let id = match parse_object_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match apply_transition(state, &id, action, session_user.roles(), None, None).await {
        Ok(TransitionOutcome::Applied(client)) => {
            state.events.publish("Finance");
            ok_message(&success(&client))
        }
        Ok(TransitionOutcome::NotFound) => not_found("Client not found."),
        Ok(TransitionOutcome::Rejected(reason)) => conflict(&reason),
        Err(_) => internal_error(),
    }
}

pub async fn send_to_planning(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    transition(&state, &session_user, &id, WorkflowAction::SendToPlanning, |_| {
        "Client sent to Planning Officer successfully!".to_string()
    })
    .await
}

pub async fn archive_client(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    transition(&state, &session_user, &id, WorkflowAction::Archive, |client| {
        format!("Client {} has been archived successfully.", client.client_name)
    })
    .await
}

pub async fn return_to_document_officer(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    transition(
        &state,
        &session_user,
        &id,
        WorkflowAction::ReturnToDocumentOfficer,
        |_| "Client returned to Document Officer.".to_string(),
    )
    .await
}
