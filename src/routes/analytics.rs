// routes/analytics.rs
// Dashboard aggregations over clients, requirements and expenses, the
// monthly report, and the spreadsheet export of the filtered client list.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use serde_json::json;
use std::{collections::BTreeMap, sync::Arc};

use crate::export::{XLSX_CONTENT_TYPE, clients_workbook};
use crate::models::{Client, Expense, Requirement, UserRole};
use crate::session::SessionUser;
use crate::state::{
    AnalyticsFilter, AppState, list_all_clients, list_all_expenses, list_all_requirements,
    list_clients_filtered, parse_month,
};

use super::helpers::*;

const ALLOWED: &[UserRole] = &[UserRole::Finance];

fn month_key(dt: &mongodb::bson::DateTime) -> String {
    dt.to_chrono().format("%Y-%m").to_string()
}

fn count_by<F>(clients: &[Client], key: F) -> BTreeMap<String, u64>
where
    F: Fn(&Client) -> String,
{
    let mut counts = BTreeMap::new();
    for client in clients {
        *counts.entry(key(client)).or_insert(0) += 1;
    }
    counts
}

fn distinct<F>(clients: &[Client], key: F) -> Vec<String>
where
    F: Fn(&Client) -> Option<String>,
{
    let mut values: Vec<String> = clients
        .iter()
        .filter_map(&key)
        .filter(|v| !v.is_empty())
        .collect();
    values.sort();
    values.dedup();
    values
}

fn completion_rate(requirements: &[Requirement]) -> f64 {
    if requirements.is_empty() {
        return 0.0;
    }
    let completed = requirements.iter().filter(|r| r.is_completed).count();
    completed as f64 * 100.0 / requirements.len() as f64
}

fn expense_sums<F>(expenses: &[Expense], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&Expense) -> String,
{
    let mut sums = BTreeMap::new();
    for expense in expenses {
        *sums.entry(key(expense)).or_insert(0.0) += expense.amount;
    }
    sums
}

fn base_aggregates(clients: &[Client], requirements: &[Requirement]) -> serde_json::Value {
    json!({
        "total_clients": clients.len(),
        "clients_by_status": count_by(clients, |c| c.status.as_str().to_string()),
        "clients_by_type": count_by(clients, |c| c.type_of_project.clone()),
        "clients_by_urgency": count_by(clients, |c| c.urgency_level.clone()),
        "clients_by_month": count_by(clients, |c| month_key(&c.created_date)),
        "permit_completion_rate": completion_rate(requirements),
    })
}

async fn analytics_payload(
    state: &AppState,
    filter: &AnalyticsFilter,
) -> anyhow::Result<serde_json::Value> {
    let clients = list_clients_filtered(state, filter).await?;
    let all_clients = list_all_clients(state).await?;
    let requirements = list_all_requirements(state).await?;
    let expenses = list_all_expenses(state).await?;

    let urgent_trend = count_by(
        &all_clients
            .iter()
            .filter(|c| c.urgency_level == "Urgent")
            .cloned()
            .collect::<Vec<_>>(),
        |c| month_key(&c.created_date),
    );

    // Naive forecast: average of the last three months' intake counts
    let three_months_ago = Utc::now() - chrono::Duration::days(90);
    let recent: Vec<Client> = all_clients
        .iter()
        .filter(|c| c.created_date.to_chrono() > three_months_ago)
        .cloned()
        .collect();
    let recent_by_month = count_by(&recent, |c| month_key(&c.created_date));
    let forecast = if recent_by_month.is_empty() {
        0
    } else {
        let total: u64 = recent_by_month.values().sum();
        (total as f64 / recent_by_month.len() as f64).round() as u64
    };

    let daily_counts = count_by(&all_clients, |c| {
        c.created_date.to_chrono().format("%Y-%m-%d").to_string()
    });

    let mut base = base_aggregates(&clients, &requirements);
    let extra = json!({
        "all_project_types": distinct(&all_clients, |c| Some(c.type_of_project.clone())),
        "all_statuses": distinct(&all_clients, |c| Some(c.status.as_str().to_string())),
        "all_urgencies": distinct(&all_clients, |c| Some(c.urgency_level.clone())),
        "all_requesting_parties": distinct(&all_clients, |c| c.requesting_party.clone()),
        "all_client_types": distinct(&all_clients, |c| c.client_type.clone()),
        "urgent_requests_trend": urgent_trend,
        "forecast_next_month_projects": forecast,
        "daily_request_counts": daily_counts,
        "total_expenses": expenses.iter().map(|e| e.amount).sum::<f64>(),
        "expenses_by_month": expense_sums(&expenses, |e| month_key(&e.due_date)),
        "expenses_by_category": expense_sums(&expenses, |e| {
            if e.category.is_empty() { "Uncategorized".to_string() } else { e.category.clone() }
        }),
        "expenses_by_status": expense_sums(&expenses, |e| e.status.as_str().to_string()),
        "filtered_clients": clients,
    });
    if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
        for (key, value) in extra_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
    Ok(base)
}

pub async fn index(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AnalyticsFilter>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    match analytics_payload(&state, &filter).await {
        Ok(payload) => Json(payload).into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn latest(
    session_user: SessionUser,
    state: State<Arc<AppState>>,
    filter: Query<AnalyticsFilter>,
) -> Response {
    index(session_user, state, filter).await
}

#[derive(serde::Deserialize)]
pub struct MonthlyReportQuery {
    pub month: Option<String>,
}

pub async fn monthly_report(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyReportQuery>,
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

    let all_clients = match list_all_clients(&state).await {
        Ok(clients) => clients,
        Err(_) => return internal_error(),
    };
    let requirements = match list_all_requirements(&state).await {
        Ok(requirements) => requirements,
        Err(_) => return internal_error(),
    };
    let clients: Vec<Client> = all_clients
        .into_iter()
        .filter(|c| {
            let created = c.created_date.to_chrono();
            created.year() == year && created.month() == month
        })
        .collect();

    let mut payload = base_aggregates(&clients, &requirements);
    if let Some(map) = payload.as_object_mut() {
        map.insert("month".to_string(), json!(format!("{year:04}-{month:02}")));
        map.insert("filtered_clients".to_string(), json!(clients));
    }
    Json(payload).into_response()
}

/// Spreadsheet download of the filtered client list.
pub async fn export_excel(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AnalyticsFilter>,
) -> Response {
    if let Err(status) = session_user.require_any(ALLOWED) {
        return status.into_response();
    }
    let clients = match list_clients_filtered(&state, &filter).await {
        Ok(clients) => clients,
        Err(_) => return internal_error(),
    };
    match clients_workbook(&clients) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"Clients.xlsx\"".to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => internal_error(),
    }
}
