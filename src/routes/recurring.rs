// routes/recurring.rs
// Recurring monthly obligations: definition CRUD, the projected month view
// and calendar, and the sparse per-month payment overrides.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::models::{PaymentStatus, UserRole};
use crate::session::SessionUser;
use crate::state::{
    AppState, RecurringExpenseInput, create_recurring_expense, delete_recurring_expense,
    get_recurring_by_id, mark_month_paid, parse_month, payments_for_expense, postpone_month,
    recurring_month_view, undo_all_payments, undo_month_paid, update_recurring_expense,
    validate_recurring_expense,
};

use super::helpers::*;

const ALLOWED: &[UserRole] = &[UserRole::Finance];

#[derive(Deserialize)]
pub struct MonthViewQuery {
    pub month: Option<String>,
    pub status: Option<String>,
}

/// Active definitions projected onto the selected (default current) month.
pub async fn index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthViewQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let now = Utc::now();
    let (year, month) = query
        .month
        .as_deref()
        .and_then(parse_month)
        .unwrap_or((now.year(), now.month()));
    let status_filter = query
        .status
        .as_deref()
        .filter(|s| *s != "All")
        .and_then(PaymentStatus::parse);
    match recurring_month_view(&state, year, month, status_filter, false).await {
        Ok(rows) => Json(json!({
            "expenses": rows,
            "year": year,
            "month": month,
            "selected_status": query.status,
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Same projection, but only instances on or after each definition's start.
pub async fn calendar(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let now = Utc::now();
    let mut year = query.year.unwrap_or(now.year());
    let mut month = query.month.unwrap_or(now.month());
    if month > 12 {
        month = 1;
        year += 1;
    } else if month < 1 {
        month = 12;
        year -= 1;
    }
    match recurring_month_view(&state, year, month, None, true).await {
        Ok(rows) => {
            Json(json!({ "year": year, "month": month, "expenses": rows })).into_response()
        }
        Err(_) => internal_error(),
    }
}

pub async fn create(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<RecurringExpenseInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let errors = validate_recurring_expense(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match create_recurring_expense(&state, &input).await {
        Ok(id) => Json(json!({
            "ok": true,
            "id": id.to_hex(),
            "message": "Recurring expense created successfully!",
        }))
        .into_response(),
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
    match get_recurring_by_id(&state, &id).await {
        Ok(Some(expense)) => {
            let payments = payments_for_expense(&state, &id).await.unwrap_or_default();
            Json(json!({ "expense": expense, "payment_history": payments })).into_response()
        }
        Ok(None) => not_found("Recurring expense not found."),
        Err(_) => internal_error(),
    }
}

pub async fn update(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<RecurringExpenseInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let errors = validate_recurring_expense(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match update_recurring_expense(&state, &id, &input).await {
        Ok(true) => ok_message("Recurring expense updated successfully!"),
        Ok(false) => not_found("Recurring expense not found."),
        Err(_) => internal_error(),
    }
}

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
    match delete_recurring_expense(&state, &id).await {
        Ok(true) => ok_message("Recurring expense deleted successfully!"),
        Ok(false) => not_found("Recurring expense not found."),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct MarkPaidRequest {
    pub year: i32,
    pub month: u32,
    pub amount_paid: Option<f64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

pub async fn mark_paid(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<MarkPaidRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !(1..=12).contains(&body.month) {
        return bad_request("month must be between 1 and 12");
    }
    match mark_month_paid(
        &state,
        &id,
        body.year,
        body.month,
        body.amount_paid,
        body.payment_method,
        body.notes,
    )
    .await
    {
        Ok(true) => ok_message(&format!(
            "Payment marked as paid for {}-{:02}",
            body.year, body.month
        )),
        Ok(false) => not_found("Recurring expense not found."),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct PostponeRequest {
    pub year: i32,
    pub month: u32,
    pub notes: Option<String>,
}

pub async fn postpone(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PostponeRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !(1..=12).contains(&body.month) {
        return bad_request("month must be between 1 and 12");
    }
    match postpone_month(&state, &id, body.year, body.month, body.notes).await {
        Ok(true) => ok_message(&format!(
            "Expense postponed for {}-{:02}",
            body.year, body.month
        )),
        Ok(false) => not_found("Recurring expense not found."),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct UndoRequest {
    pub year: i32,
    pub month: u32,
}

pub async fn undo_paid(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UndoRequest>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match undo_month_paid(&state, &id, body.year, body.month).await {
        Ok(true) => ok_message("Payment record has been removed and status is now pending."),
        Ok(false) => not_found("No paid record found to undo."),
        Err(_) => internal_error(),
    }
}

pub async fn undo_all(
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
    match undo_all_payments(&state, &id).await {
        Ok(0) => not_found("No payment records found to undo."),
        Ok(_) => ok_message("All payment history has been undone. All statuses are now pending."),
        Err(_) => internal_error(),
    }
}

pub async fn payment_history(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> Response {
    details(session_user, state, id).await
}
