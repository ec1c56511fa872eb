// routes/admin.rs
// Admin-only surface: user management, approval queue, and the cross-role
// client directory.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{PASSWORD_POLICY_MESSAGE, password_meets_policy};
use crate::models::{AppUser, UserRole};
use crate::session::SessionUser;
use crate::state::{
    AppState, NewUser, UserUpdate, active_clients, create_user, delete_user, find_user_by_email,
    get_client_by_id, get_user_by_id, list_pending_approvals, list_requirements_with_photos,
    list_users, set_user_approval, update_user,
};

use super::helpers::*;

fn require_admin(session_user: &SessionUser) -> Result<(), Response> {
    if session_user.is_admin() {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN.into_response())
    }
}

fn parse_date(value: &Option<String>) -> Option<mongodb::bson::DateTime> {
    let raw = value.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = mongodb::bson::DateTime::parse_rfc3339_str(raw) {
        return Some(dt);
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| mongodb::bson::DateTime::from_chrono(dt.and_utc()))
}

fn user_row(user: &AppUser) -> serde_json::Value {
    json!({
        "id": user.id.map(|id| id.to_hex()),
        "email": user.email,
        "full_name": user.full_name,
        "role": user.roles.first().map(|r| r.as_str()).unwrap_or("No Role"),
        "roles": user.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "is_approved": user.is_approved,
    })
}

fn user_details_json(user: &AppUser) -> serde_json::Value {
    json!({
        "id": user.id.map(|id| id.to_hex()),
        "email": user.email,
        "full_name": user.full_name,
        "age": user.age,
        "birth_date": user.birth_date,
        "address": user.address,
        "city": user.city,
        "state": user.state,
        "zip_code": user.zip_code,
        "country": user.country,
        "contact_number": user.contact_number,
        "roles": user.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "is_approved": user.is_approved,
        "created_at": user.created_at,
    })
}

#[derive(Deserialize)]
pub struct AddUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub age: Option<i32>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub async fn add_user(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddUserRequest>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }

    let mut errors = std::collections::BTreeMap::new();
    if body.email.trim().is_empty() || !body.email.contains('@') {
        errors.insert("email".to_string(), "A valid email is required".to_string());
    }
    if !password_meets_policy(&body.password) {
        errors.insert("password".to_string(), PASSWORD_POLICY_MESSAGE.to_string());
    }
    if body.full_name.trim().is_empty() {
        errors.insert("full_name".to_string(), "Full name is required".to_string());
    }
    let mut roles = Vec::new();
    for raw in &body.roles {
        match UserRole::parse(raw) {
            Some(role) => roles.push(role),
            None => {
                errors.insert("roles".to_string(), format!("Unknown role: {raw}"));
            }
        }
    }
    if roles.is_empty() {
        errors.insert("roles".to_string(), "At least one role is required".to_string());
    }
    if !errors.is_empty() {
        return validation_errors(&errors);
    }

    match find_user_by_email(&state, body.email.trim()).await {
        Ok(Some(_)) => return conflict("User with this email already exists."),
        Ok(None) => {}
        Err(_) => return internal_error(),
    }

    let new_user = NewUser {
        email: body.email.trim().to_string(),
        password: body.password,
        full_name: body.full_name.trim().to_string(),
        age: body.age,
        birth_date: parse_date(&body.birth_date),
        address: body.address,
        city: body.city,
        state: body.state,
        zip_code: body.zip_code,
        country: body.country,
        contact_number: body.contact_number,
        roles: roles.clone(),
    };
    match create_user(&state, new_user).await {
        Ok(id) => {
            state.events.publish("Admin");
            let role_names: Vec<_> = roles.iter().map(|r| r.as_str()).collect();
            Json(json!({
                "ok": true,
                "id": id.to_hex(),
                "message": format!(
                    "User {} created successfully with roles: {}.",
                    body.email.trim(),
                    role_names.join(", ")
                ),
            }))
            .into_response()
        }
        Err(_) => internal_error(),
    }
}

pub async fn users(session_user: SessionUser, State(state): State<Arc<AppState>>) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match list_users(&state).await {
        Ok(users) => {
            let rows: Vec<_> = users.iter().map(user_row).collect();
            Json(json!({ "users": rows })).into_response()
        }
        Err(_) => internal_error(),
    }
}

pub async fn user_details(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_user_by_id(&state, &id).await {
        Ok(Some(user)) => Json(user_details_json(&user)).into_response(),
        Ok(None) => not_found("User not found."),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct EditUserRequest {
    pub full_name: String,
    pub age: Option<i32>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub async fn edit_user(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<EditUserRequest>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_user_by_id(&state, &id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("User not found."),
        Err(_) => return internal_error(),
    }
    let mut roles = Vec::new();
    for raw in &body.roles {
        let Some(role) = UserRole::parse(raw) else {
            return bad_request(&format!("Unknown role: {raw}"));
        };
        roles.push(role);
    }
    let update = UserUpdate {
        full_name: body.full_name.trim().to_string(),
        age: body.age,
        birth_date: parse_date(&body.birth_date),
        address: body.address,
        city: body.city,
        state: body.state,
        zip_code: body.zip_code,
        country: body.country,
        contact_number: body.contact_number,
        roles,
    };
    match update_user(&state, &id, update).await {
        Ok(()) => {
            state.events.publish("Admin");
            ok_message("User updated.")
        }
        Err(_) => internal_error(),
    }
}

pub async fn remove_user(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match delete_user(&state, &id).await {
        Ok(()) => {
            state.events.publish("Admin");
            ok_message("User deleted successfully.")
        }
        Err(_) => internal_error(),
    }
}

pub async fn pending_approvals(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match list_pending_approvals(&state).await {
        Ok(users) => {
            let rows: Vec<_> = users.iter().map(user_row).collect();
            Json(json!({ "users": rows })).into_response()
        }
        Err(_) => internal_error(),
    }
}

pub async fn approve_user(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_user_by_id(&state, &id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("User not found."),
        Err(_) => return internal_error(),
    }
    match set_user_approval(&state, &id, true).await {
        Ok(()) => {
            state.events.publish("Admin");
            ok_message("User approved.")
        }
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct ClientsQuery {
    pub search: Option<String>,
}

/// Cross-role directory of active (non-archived) clients.
pub async fn clients(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientsQuery>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
    }
    match active_clients(&state, query.search.as_deref()).await {
        Ok(clients) => Json(json!({
            "clients": clients,
            "current_filter": query.search,
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn client_details(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(&session_user) {
        return resp;
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
