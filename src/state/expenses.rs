use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::models::{
    Expense, ExpensePayment, PAYMENT_ACTION_PAID, PAYMENT_ACTION_UNDONE, PaymentEvent,
    PaymentStatus, RecurringExpense,
};

use super::AppState;

fn now_bson() -> DateTime {
    DateTime::from_system_time(SystemTime::now())
}

fn month_start(year: i32, month: u32) -> Option<DateTime> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_chrono(dt.and_utc()))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// Parses the `YYYY-MM` month picker value.
pub fn parse_month(value: &str) -> Option<(i32, u32)> {
    let (y, m) = value.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    if (1..=12).contains(&month) { Some((year, month)) } else { None }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RecurringExpenseInput {
    #[serde(default)]
    pub name: String,
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    pub day_of_month_due: Option<u32>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

pub fn validate_recurring_expense(input: &RecurringExpenseInput) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if input.name.trim().is_empty() {
        errors.insert("name".to_string(), "Expense Name is required".to_string());
    }
    if input.amount.is_none() {
        errors.insert("amount".to_string(), "Amount is required".to_string());
    }
    if input.category.trim().is_empty() {
        errors.insert("category".to_string(), "Category is required".to_string());
    }
    if input.location.trim().is_empty() {
        errors.insert("location".to_string(), "Location is required".to_string());
    }
    if parse_form_date(&input.start_date).is_none() {
        errors.insert("start_date".to_string(), "Start Date is required".to_string());
    }
    match input.day_of_month_due {
        Some(1..=31) => {}
        _ => {
            errors.insert(
                "day_of_month_due".to_string(),
                "Due Day of Month must be between 1 and 31".to_string(),
            );
        }
    }
    errors
}

fn parse_form_date(value: &str) -> Option<DateTime> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_rfc3339_str(raw) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_chrono(dt.and_utc()))
}

pub async fn create_recurring_expense(
    state: &AppState,
    input: &RecurringExpenseInput,
) -> Result<ObjectId> {
    let now = now_bson();
    let res = state
        .recurring_expenses
        .insert_one(RecurringExpense {
            id: None,
            name: input.name.trim().to_string(),
            amount: input.amount.unwrap_or_default(),
            category: input.category.trim().to_string(),
            location: input.location.trim().to_string(),
            start_date: parse_form_date(&input.start_date).context("start date is required")?,
            day_of_month_due: input.day_of_month_due.unwrap_or(1),
            is_active: true,
            notes: input.notes.clone().filter(|n| !n.trim().is_empty()),
            created_date: now,
            last_modified: now,
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("recurring expense insert missing _id")
}

pub async fn get_recurring_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<RecurringExpense>> {
    state
        .recurring_expenses
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn list_active_recurring(state: &AppState) -> Result<Vec<RecurringExpense>> {
    let mut cursor = state
        .recurring_expenses
        .find(doc! { "is_active": true })
        .await?;
    let mut items = Vec::new();
    while let Some(expense) = cursor.try_next().await? {
        items.push(expense);
    }
    Ok(items)
}

pub async fn update_recurring_expense(
    state: &AppState,
    id: &ObjectId,
    input: &RecurringExpenseInput,
) -> Result<bool> {
    let res = state
        .recurring_expenses
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": input.name.trim(),
                "amount": input.amount.unwrap_or_default(),
                "category": input.category.trim(),
                "location": input.location.trim(),
                "start_date": parse_form_date(&input.start_date)
                    .context("start date is required")?,
                "day_of_month_due": input.day_of_month_due.unwrap_or(1),
                "is_active": input.is_active.unwrap_or(true),
                "notes": input.notes.clone().filter(|n| !n.trim().is_empty()),
                "last_modified": now_bson(),
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

pub async fn delete_recurring_expense(state: &AppState, id: &ObjectId) -> Result<bool> {
    let _ = state
        .expense_payments
        .delete_many(doc! { "recurring_expense_id": id })
        .await;
    let res = state.recurring_expenses.delete_one(doc! { "_id": id }).await?;
    Ok(res.deleted_count > 0)
}

/// Newest month first, matching the payment-history page.
pub async fn payments_for_expense(
    state: &AppState,
    expense_id: &ObjectId,
) -> Result<Vec<ExpensePayment>> {
    let mut cursor = state
        .expense_payments
        .find(doc! { "recurring_expense_id": expense_id })
        .sort(doc! { "year": -1, "month": -1 })
        .await?;
    let mut items = Vec::new();
    while let Some(payment) = cursor.try_next().await? {
        items.push(payment);
    }
    Ok(items)
}

async fn upsert_payment(
    state: &AppState,
    expense: &RecurringExpense,
    year: i32,
    month: u32,
    status: PaymentStatus,
    paid_date: Option<DateTime>,
    amount_paid: Option<f64>,
    payment_method: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let expense_id = expense.id.context("recurring expense missing _id")?;
    let filter = doc! {
        "recurring_expense_id": expense_id,
        "year": year,
        "month": month,
    };
    let existing = state.expense_payments.find_one(filter.clone()).await?;
    match existing {
        Some(_) => {
            state
                .expense_payments
                .update_one(
                    filter,
                    doc! { "$set": {
                        "status": status.as_str(),
                        "paid_date": paid_date,
                        "amount_paid": amount_paid,
                        "payment_method": payment_method,
                        "notes": notes,
                        "last_modified": now_bson(),
                    } },
                )
                .await?;
        }
        None => {
            let now = now_bson();
            state
                .expense_payments
                .insert_one(ExpensePayment {
                    id: None,
                    recurring_expense_id: expense_id,
                    year,
                    month,
                    paid_date,
                    status,
                    amount_paid,
                    notes,
                    payment_method,
                    created_date: now,
                    last_modified: now,
                })
                .await?;
        }
    }
    Ok(())
}

/// Writes the Paid override for one month; absent amount falls back to the
/// expense's defined amount. Returns false when the expense is gone.
pub async fn mark_month_paid(
    state: &AppState,
    id: &ObjectId,
    year: i32,
    month: u32,
    amount_paid: Option<f64>,
    payment_method: Option<String>,
    notes: Option<String>,
) -> Result<bool> {
    let Some(expense) = get_recurring_by_id(state, id).await? else {
        return Ok(false);
    };
    upsert_payment(
        state,
        &expense,
        year,
        month,
        PaymentStatus::Paid,
        Some(now_bson()),
        amount_paid.or(Some(expense.amount)),
        payment_method,
        notes,
    )
    .await?;
    Ok(true)
}

pub async fn postpone_month(
    state: &AppState,
    id: &ObjectId,
    year: i32,
    month: u32,
    notes: Option<String>,
) -> Result<bool> {
    let Some(expense) = get_recurring_by_id(state, id).await? else {
        return Ok(false);
    };
    upsert_payment(
        state,
        &expense,
        year,
        month,
        PaymentStatus::Postponed,
        None,
        None,
        None,
        notes,
    )
    .await?;
    Ok(true)
}

/// Deletes the Paid override so the month reverts to its computed status.
pub async fn undo_month_paid(
    state: &AppState,
    id: &ObjectId,
    year: i32,
    month: u32,
) -> Result<bool> {
    let res = state
        .expense_payments
        .delete_one(doc! {
            "recurring_expense_id": id,
            "year": year,
            "month": month,
            "status": PaymentStatus::Paid.as_str(),
        })
        .await?;
    Ok(res.deleted_count > 0)
}

pub async fn undo_all_payments(state: &AppState, id: &ObjectId) -> Result<u64> {
    let res = state
        .expense_payments
        .delete_many(doc! { "recurring_expense_id": id })
        .await?;
    Ok(res.deleted_count)
}

/// One month's projected row for the dashboard and calendar.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringMonthRow {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub category: String,
    pub location: String,
    pub day_of_month_due: u32,
    pub status: PaymentStatus,
    pub due_date: NaiveDate,
    pub paid_date: Option<DateTime>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub year: i32,
    pub month: u32,
    pub can_mark_as_paid: bool,
    pub can_postpone: bool,
}

pub async fn recurring_month_view(
    state: &AppState,
    year: i32,
    month: u32,
    status_filter: Option<PaymentStatus>,
    only_started: bool,
) -> Result<Vec<RecurringMonthRow>> {
    let today = Utc::now().date_naive();
    let mut rows = Vec::new();
    for expense in list_active_recurring(state).await? {
        let Some(id) = expense.id else { continue };
        let due_date = expense.due_date_for_month(year, month);
        if only_started && due_date < expense.start_date.to_chrono().date_naive() {
            continue;
        }
        let payments = payments_for_expense(state, &id).await?;
        let status = expense.status_for_month(&payments, year, month, today);
        if let Some(wanted) = status_filter {
            if status != wanted {
                continue;
            }
        }
        rows.push(RecurringMonthRow {
            id: id.to_hex(),
            name: expense.name.clone(),
            amount: expense.amount,
            category: expense.category.clone(),
            location: expense.location.clone(),
            day_of_month_due: expense.day_of_month_due,
            status,
            due_date,
            paid_date: expense.paid_date_for_month(&payments, year, month),
            is_active: expense.is_active,
            notes: expense.notes.clone(),
            year,
            month,
            can_mark_as_paid: status != PaymentStatus::Paid,
            can_postpone: status == PaymentStatus::Pending,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExpenseInput {
    #[serde(default)]
    pub name: String,
    pub amount: Option<f64>,
    #[serde(default)]
    pub due_date: String,
    pub status: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    pub paid_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub recurring: bool,
    pub repeat_months: Option<i32>,
}

pub fn validate_expense(input: &ExpenseInput) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if input.name.trim().is_empty() {
        errors.insert("name".to_string(), "Expense Name is required".to_string());
    }
    if input.amount.is_none() {
        errors.insert("amount".to_string(), "Amount is required".to_string());
    }
    if parse_form_date(&input.due_date).is_none() {
        errors.insert("due_date".to_string(), "Due Date is required".to_string());
    }
    if input
        .status
        .as_deref()
        .and_then(PaymentStatus::parse)
        .is_none()
    {
        errors.insert("status".to_string(), "Status is required".to_string());
    }
    if input.category.trim().is_empty() {
        errors.insert("category".to_string(), "Category is required".to_string());
    }
    if input.location.trim().is_empty() {
        errors.insert("location".to_string(), "Location is required".to_string());
    }
    errors
}

pub enum ExpenseCreateOutcome {
    Created(ObjectId),
    /// A soft-deleted twin (name, due date, category, location) was restored
    /// and refreshed instead of inserting a duplicate.
    Restored(ObjectId),
}

pub async fn create_expense(
    state: &AppState,
    input: &ExpenseInput,
) -> Result<ExpenseCreateOutcome> {
    let due_date = parse_form_date(&input.due_date).context("due date is required")?;
    let status = input
        .status
        .as_deref()
        .and_then(PaymentStatus::parse)
        .unwrap_or(PaymentStatus::Pending);
    let paid_date = input.paid_date.as_deref().and_then(|d| parse_form_date(d));
    let notes = input.notes.clone().filter(|n| !n.trim().is_empty());

    let day = due_date.to_chrono().date_naive();
    let day_start = month_day_start(day);
    let day_end = DateTime::from_chrono(
        (day + chrono::Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight")
            .and_utc(),
    );

    let twin = state
        .expenses
        .find_one(doc! {
            "is_deleted": true,
            "name": input.name.trim(),
            "category": input.category.trim(),
            "location": input.location.trim(),
            "due_date": { "$gte": day_start, "$lt": day_end },
        })
        .await?;
    if let Some(twin) = twin {
        let id = twin.id.context("expense twin missing _id")?;
        state
            .expenses
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "is_deleted": false,
                    "status": status.as_str(),
                    "amount": input.amount.unwrap_or_default(),
                    "paid_date": paid_date,
                    "notes": &notes,
                    "created_date": now_bson(),
                } },
            )
            .await?;
        return Ok(ExpenseCreateOutcome::Restored(id));
    }

    let res = state
        .expenses
        .insert_one(Expense {
            id: None,
            name: input.name.trim().to_string(),
            amount: input.amount.unwrap_or_default(),
            due_date,
            status,
            category: input.category.trim().to_string(),
            location: input.location.trim().to_string(),
            paid_date,
            notes,
            created_date: now_bson(),
            recurring: input.recurring,
            repeat_months: input.repeat_months,
            payment_history: Vec::new(),
            is_deleted: false,
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .map(ExpenseCreateOutcome::Created)
        .context("expense insert missing _id")
}

fn month_day_start(day: NaiveDate) -> DateTime {
    DateTime::from_chrono(day.and_hms_opt(0, 0, 0).expect("midnight").and_utc())
}

/// Every ledger row, soft-deleted included; analytics and the calendar use
/// the full set.
pub async fn list_all_expenses(state: &AppState) -> Result<Vec<Expense>> {
    let mut cursor = state.expenses.find(doc! {}).await?;
    let mut items = Vec::new();
    while let Some(expense) = cursor.try_next().await? {
        items.push(expense);
    }
    Ok(items)
}

pub async fn get_expense_by_id(state: &AppState, id: &ObjectId) -> Result<Option<Expense>> {
    state
        .expenses
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Visible ledger rows: soft-deleted entries are excluded; month and status
/// filters are optional.
pub async fn list_expenses(
    state: &AppState,
    month: Option<(i32, u32)>,
    status: Option<PaymentStatus>,
) -> Result<Vec<Expense>> {
    let mut conditions: Vec<Document> = vec![doc! { "is_deleted": { "$ne": true } }];
    if let Some((year, month)) = month {
        if let Some(start) = month_start(year, month) {
            let (ny, nm) = next_month(year, month);
            if let Some(end) = month_start(ny, nm) {
                conditions.push(doc! { "due_date": { "$gte": start, "$lt": end } });
            }
        }
    }
    if let Some(status) = status {
        conditions.push(doc! { "status": status.as_str() });
    }
    let mut cursor = state
        .expenses
        .find(doc! { "$and": conditions })
        .sort(doc! { "due_date": 1 })
        .await?;
    let mut items = Vec::new();
    while let Some(expense) = cursor.try_next().await? {
        items.push(expense);
    }
    Ok(items)
}

pub async fn update_expense(state: &AppState, id: &ObjectId, input: &ExpenseInput) -> Result<bool> {
    let due_date = parse_form_date(&input.due_date).context("due date is required")?;
    let status = input
        .status
        .as_deref()
        .and_then(PaymentStatus::parse)
        .unwrap_or(PaymentStatus::Pending);
    let res = state
        .expenses
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": input.name.trim(),
                "amount": input.amount.unwrap_or_default(),
                "due_date": due_date,
                "status": status.as_str(),
                "category": input.category.trim(),
                "location": input.location.trim(),
                "paid_date": input.paid_date.as_deref().and_then(|d| parse_form_date(d)),
                "notes": input.notes.clone().filter(|n| !n.trim().is_empty()),
                "recurring": input.recurring,
                "repeat_months": input.repeat_months,
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

pub async fn delete_expense(state: &AppState, id: &ObjectId) -> Result<bool> {
    let res = state.expenses.delete_one(doc! { "_id": id }).await?;
    Ok(res.deleted_count > 0)
}

/// Paid: stamp the date, append to the history log, and soft-delete from the
/// main ledger.
pub async fn mark_expense_paid(state: &AppState, id: &ObjectId) -> Result<bool> {
    let Some(_expense) = get_expense_by_id(state, id).await? else {
        return Ok(false);
    };
    let event = mongodb::bson::to_bson(&PaymentEvent {
        date: now_bson(),
        action: PAYMENT_ACTION_PAID.to_string(),
        note: None,
    })?;
    state
        .expenses
        .update_one(
            doc! { "_id": id },
            doc! {
                "$set": {
                    "status": PaymentStatus::Paid.as_str(),
                    "paid_date": now_bson(),
                    "is_deleted": true,
                },
                "$push": { "payment_history": event },
            },
        )
        .await?;
    Ok(true)
}

/// Undo restores the row to the ledger and logs the reversal.
pub async fn undo_expense_paid(state: &AppState, id: &ObjectId) -> Result<bool> {
    let Some(_expense) = get_expense_by_id(state, id).await? else {
        return Ok(false);
    };
    let event = mongodb::bson::to_bson(&PaymentEvent {
        date: now_bson(),
        action: PAYMENT_ACTION_UNDONE.to_string(),
        note: None,
    })?;
    state
        .expenses
        .update_one(
            doc! { "_id": id },
            doc! {
                "$set": {
                    "status": PaymentStatus::Pending.as_str(),
                    "paid_date": null,
                    "is_deleted": false,
                },
                "$push": { "payment_history": event },
            },
        )
        .await?;
    Ok(true)
}

/// Merged Paid history across one-off expenses and recurring overrides.
#[derive(Debug, Clone, Serialize)]
pub struct PaidRecord {
    pub name: String,
    pub amount: f64,
    pub paid_date: Option<DateTime>,
    pub category: String,
    pub kind: &'static str,
    pub notes: Option<String>,
}

pub async fn all_payment_history(
    state: &AppState,
    month: Option<(i32, u32)>,
) -> Result<Vec<PaidRecord>> {
    let in_month = |paid: &Option<DateTime>| -> bool {
        match (month, paid) {
            (None, _) => true,
            (Some((y, m)), Some(date)) => {
                let d = date.to_chrono().date_naive();
                d.year() == y && d.month() == m
            }
            (Some(_), None) => false,
        }
    };

    let mut records = Vec::new();

    let mut cursor = state
        .expenses
        .find(doc! { "status": PaymentStatus::Paid.as_str() })
        .await?;
    while let Some(expense) = cursor.try_next().await? {
        if !in_month(&expense.paid_date) {
            continue;
        }
        records.push(PaidRecord {
            name: expense.name,
            amount: expense.amount,
            paid_date: expense.paid_date,
            category: expense.category,
            kind: "Normal",
            notes: expense.notes,
        });
    }

    let mut cursor = state
        .expense_payments
        .find(doc! { "status": PaymentStatus::Paid.as_str() })
        .await?;
    while let Some(payment) = cursor.try_next().await? {
        if !in_month(&payment.paid_date) {
            continue;
        }
        let Some(expense) =
            get_recurring_by_id(state, &payment.recurring_expense_id).await?
        else {
            continue;
        };
        records.push(PaidRecord {
            name: expense.name.clone(),
            amount: payment.amount_paid.unwrap_or(expense.amount),
            paid_date: payment.paid_date,
            category: expense.category,
            kind: "Recurring",
            notes: payment.notes,
        });
    }

    records.sort_by(|a, b| b.paid_date.cmp(&a.paid_date));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_picker_values_parse() {
        assert_eq!(parse_month("2025-06"), Some((2025, 6)));
        assert_eq!(parse_month("2025-13"), None);
        assert_eq!(parse_month("2025"), None);
        assert_eq!(parse_month("abc-06"), None);
    }

    #[test]
    fn recurring_validation_flags_each_missing_field() {
        let errors = validate_recurring_expense(&RecurringExpenseInput::default());
        for key in ["name", "amount", "category", "location", "start_date", "day_of_month_due"] {
            assert!(errors.contains_key(key), "expected error for {key}");
        }

        let valid = RecurringExpenseInput {
            name: "Internet".into(),
            amount: Some(120.0),
            category: "Utilities".into(),
            location: "HQ".into(),
            start_date: "2025-01-01".into(),
            day_of_month_due: Some(15),
            is_active: Some(true),
            notes: None,
        };
        assert!(validate_recurring_expense(&valid).is_empty());
    }

    #[test]
    fn day_of_month_bounds_are_enforced() {
        let mut input = RecurringExpenseInput {
            name: "Internet".into(),
            amount: Some(120.0),
            category: "Utilities".into(),
            location: "HQ".into(),
            start_date: "2025-01-01".into(),
            day_of_month_due: Some(0),
            is_active: None,
            notes: None,
        };
        assert!(validate_recurring_expense(&input).contains_key("day_of_month_due"));
        input.day_of_month_due = Some(32);
        assert!(validate_recurring_expense(&input).contains_key("day_of_month_due"));
        input.day_of_month_due = Some(31);
        assert!(validate_recurring_expense(&input).is_empty());
    }
}
