// routes/expenses.rs
// One-off expense ledger: CRUD, mark-paid with its append-only history and
// soft-delete behavior, the calendar, and the merged payment history.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::models::{Expense, PaymentStatus, UserRole};
use crate::session::SessionUser;
use crate::state::{
    AppState, ExpenseCreateOutcome, ExpenseInput, all_payment_history, create_expense,
    delete_expense, get_expense_by_id, list_all_expenses, list_expenses, mark_expense_paid,
    parse_month, undo_expense_paid, update_expense, validate_expense,
};

use super::helpers::*;

const ALLOWED: &[UserRole] = &[UserRole::Finance];

#[derive(Deserialize)]
pub struct LedgerQuery {
    pub month: Option<String>,
    pub status: Option<String>,
}

pub async fn index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LedgerQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let month = query.month.as_deref().and_then(parse_month);
    let status = query
        .status
        .as_deref()
        .filter(|s| *s != "All")
        .and_then(PaymentStatus::parse);
    match list_expenses(&state, month, status).await {
        Ok(expenses) => Json(json!({
            "expenses": expenses,
            "selected_month": query.month,
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

/// Expands recurring-flagged rows into their monthly repeats for the asked
/// month; plain rows appear when due that month.
pub async fn calendar(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let now = Utc::now();
    let year = query.year.unwrap_or(now.year());
    let month = query.month.unwrap_or(now.month()).clamp(1, 12);

    let expenses = match list_all_expenses(&state).await {
        Ok(expenses) => expenses,
        Err(_) => return internal_error(),
    };

    let mut instances: Vec<Expense> = Vec::new();
    for expense in expenses {
        let due = expense.due_date.to_chrono();
        if expense.recurring && expense.repeat_months.unwrap_or(0) > 0 {
            for offset in 0..expense.repeat_months.unwrap_or(0) {
                let repeat = due
                    .checked_add_months(chrono::Months::new(offset as u32))
                    .unwrap_or(due);
                if repeat.year() == year && repeat.month() == month {
                    let paid_this_month = expense
                        .paid_date
                        .map(|p| {
                            let p = p.to_chrono();
                            p.year() == repeat.year() && p.month() == repeat.month()
                        })
                        .unwrap_or(false);
                    let mut instance = expense.clone();
                    instance.due_date = mongodb::bson::DateTime::from_chrono(repeat);
                    instance.status = if paid_this_month {
                        PaymentStatus::Paid
                    } else {
                        PaymentStatus::Pending
                    };
                    if !paid_this_month {
                        instance.paid_date = None;
                    }
                    instances.push(instance);
                }
            }
        } else if due.year() == year && due.month() == month {
            instances.push(expense);
        }
    }

    Json(json!({ "year": year, "month": month, "expenses": instances })).into_response()
}

pub async fn create(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ExpenseInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }

    // Recurring intent is redirected into the recurring-expense flow with a
    // pre-filled seed, like the original's cross-controller hand-off.
    if input.recurring {
        let day = input
            .due_date
            .get(8..10)
            .and_then(|d| d.parse::<u32>().ok())
            .unwrap_or(1);
        return Json(json!({
            "ok": true,
            "redirect": "/recurring-expenses",
            "seed": {
                "name": input.name,
                "amount": input.amount,
                "category": input.category,
                "location": input.location,
                "start_date": input.due_date,
                "day_of_month_due": day,
                "notes": input.notes,
            },
        }))
        .into_response();
    }

    let errors = validate_expense(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match create_expense(&state, &input).await {
        Ok(ExpenseCreateOutcome::Created(id)) => Json(json!({
            "ok": true,
            "id": id.to_hex(),
            "message": "Expense created successfully!",
        }))
        .into_response(),
        Ok(ExpenseCreateOutcome::Restored(id)) => Json(json!({
            "ok": true,
            "id": id.to_hex(),
            "message": "Expense restored and updated successfully!",
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
    match get_expense_by_id(&state, &id).await {
        Ok(Some(expense)) => Json(json!({ "expense": expense })).into_response(),
        Ok(None) => not_found("Expense not found."),
        Err(_) => internal_error(),
    }
}

pub async fn update(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<ExpenseInput>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let id = match parse_object_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let errors = validate_expense(&input);
    if !errors.is_empty() {
        return validation_errors(&errors);
    }
    match update_expense(&state, &id, &input).await {
        Ok(true) => ok_message("Expense updated successfully!"),
        Ok(false) => not_found("Expense not found."),
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
    match delete_expense(&state, &id).await {
        Ok(true) => ok_message("Expense deleted successfully!"),
        Ok(false) => not_found("Expense not found."),
        Err(_) => internal_error(),
    }
}

pub async fn mark_paid(
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
    match mark_expense_paid(&state, &id).await {
        Ok(true) => ok_message("Expense marked as paid."),
        Ok(false) => not_found("Expense not found."),
        Err(_) => internal_error(),
    }
}

pub async fn undo_paid(
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
    match undo_expense_paid(&state, &id).await {
        Ok(true) => ok_message("Payment has been undone."),
        Ok(false) => not_found("Expense not found."),
        Err(_) => internal_error(),
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub month: Option<String>,
}

/// Merged Paid history across one-off and recurring expenses.
pub async fn payment_history(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let month = query.month.as_deref().and_then(parse_month);
    match all_payment_history(&state, month).await {
        Ok(records) => Json(json!({
            "payments": records,
            "selected_month": query.month,
        }))
        .into_response(),
        Err(_) => internal_error(),
    }
}
