// main.rs
// Axum server wiring: connects MongoDB state, builds the role-gated router,
// starts the backup scheduler, and serves on :8080.
//
// Public surface: /login plus the forgot-password flow. Everything else sits
// behind the session middleware; per-role allow-lists live in each handler.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use dotenvy::dotenv;
use std::{env, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use casetrack::{backup, routes, session, state};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(
        state::init_state()
            .await
            .expect("failed to initialize MongoDB state"),
    );

    backup::spawn_backup_scheduler(state.clone());

    let protected = Router::new()
        .route("/logout", post(routes::login::logout))
        .route("/events", get(routes::events::events))
        .route(
            "/account/change-password",
            post(routes::account::change_password),
        )
        .route(
            "/account/change-password/confirm",
            post(routes::account::confirm_change_password),
        )
        .route(
            "/account/change-password/resend",
            post(routes::account::resend_change_password_otp),
        )
        .route("/finance/dashboard", get(routes::finance::dashboard))
        .route("/finance/latest", get(routes::finance::latest))
        .route("/finance/clients", post(routes::finance::create))
        .route("/finance/clients/{id}", get(routes::finance::details))
        .route("/finance/clients/{id}/update", post(routes::finance::update))
        .route("/finance/clients/{id}/delete", post(routes::finance::delete))
        .route(
            "/finance/clients/{id}/send-to-planning",
            post(routes::finance::send_to_planning),
        )
        .route(
            "/finance/clients/{id}/archive",
            post(routes::finance::archive_client),
        )
        .route(
            "/finance/clients/{id}/return-to-document-officer",
            post(routes::finance::return_to_document_officer),
        )
        .route("/planning/dashboard", get(routes::planning::dashboard))
        .route("/planning/latest", get(routes::planning::latest))
        .route(
            "/planning/clients/{id}/requirements",
            get(routes::planning::client_requirements),
        )
        .route(
            "/planning/requirements",
            post(routes::planning::add_requirement),
        )
        .route(
            "/planning/requirements/{id}/update",
            post(routes::planning::update_requirement),
        )
        .route(
            "/planning/requirements/{id}/delete",
            post(routes::planning::remove_requirement),
        )
        .route(
            "/planning/requirements/{id}/toggle",
            post(routes::planning::toggle_requirement),
        )
        .route(
            "/planning/photos/{id}/delete",
            post(routes::planning::remove_photo),
        )
        .route(
            "/planning/clients/{id}/proceed-to-liaison",
            post(routes::planning::proceed_to_liaison),
        )
        .route(
            "/planning/clients/{id}/back-to-finance",
            post(routes::planning::back_to_finance),
        )
        .route(
            "/planning/clients/{id}/complete",
            post(routes::planning::complete_planning),
        )
        .route(
            "/planning/customer-care-users",
            get(routes::planning::customer_care_users),
        )
        .route(
            "/customer-care/dashboard",
            get(routes::customer_care::dashboard),
        )
        .route("/customer-care/latest", get(routes::customer_care::latest))
        .route(
            "/customer-care/clients/{id}",
            get(routes::customer_care::details),
        )
        .route(
            "/customer-care/clients/{id}/proceed-to-document-officer",
            post(routes::customer_care::proceed_to_document_officer),
        )
        .route(
            "/customer-care/clients/{id}/return-to-planning",
            post(routes::customer_care::return_to_planning),
        )
        .route(
            "/customer-care/clients/{id}/requirements/save",
            post(routes::customer_care::save_requirements),
        )
        .route(
            "/customer-care/clients/{id}/requirement-summary",
            get(routes::customer_care::requirement_summary),
        )
        .route(
            "/customer-care/tracking-numbers",
            get(routes::customer_care::tracking_numbers),
        )
        .route(
            "/customer-care/requirements/{id}/upload",
            post(routes::customer_care::upload_requirement_files),
        )
        .route(
            "/customer-care/photos/{id}/delete",
            post(routes::customer_care::remove_photo),
        )
        .route(
            "/document-officer/dashboard",
            get(routes::document_officer::dashboard),
        )
        .route(
            "/document-officer/latest",
            get(routes::document_officer::latest),
        )
        .route(
            "/document-officer/clients/{id}",
            get(routes::document_officer::details),
        )
        .route(
            "/document-officer/clients/{id}/proceed-to-finance",
            post(routes::document_officer::proceed_to_finance),
        )
        .route(
            "/document-officer/clients/{id}/return-to-customer-care",
            post(routes::document_officer::return_to_customer_care),
        )
        .route(
            "/document-officer/files/{id}",
            get(routes::document_officer::view_file),
        )
        .route(
            "/document-officer/clients/{id}/files",
            get(routes::document_officer::client_files),
        )
        .route(
            "/document-officer/requirements/{id}/upload",
            post(routes::document_officer::upload_optional_files),
        )
        .route(
            "/document-officer/files/{id}/delete",
            post(routes::document_officer::delete_file),
        )
        .route("/archive", get(routes::archive::index))
        .route("/archive/latest", get(routes::archive::latest))
        .route("/archive/clients/{id}", get(routes::archive::details))
        .route("/archive/files/{id}", get(routes::archive::view_file))
        .route(
            "/admin/users",
            get(routes::admin::users).post(routes::admin::add_user),
        )
        .route("/admin/users/{id}", get(routes::admin::user_details))
        .route("/admin/users/{id}/update", post(routes::admin::edit_user))
        .route("/admin/users/{id}/delete", post(routes::admin::remove_user))
        .route(
            "/admin/pending-approvals",
            get(routes::admin::pending_approvals),
        )
        .route("/admin/users/{id}/approve", post(routes::admin::approve_user))
        .route("/admin/clients", get(routes::admin::clients))
        .route("/admin/clients/{id}", get(routes::admin::client_details))
        .route("/analytics", get(routes::analytics::index))
        .route("/analytics/latest", get(routes::analytics::latest))
        .route(
            "/analytics/monthly-report",
            get(routes::analytics::monthly_report),
        )
        .route("/analytics/export", get(routes::analytics::export_excel))
        .route(
            "/expenses",
            get(routes::expenses::index).post(routes::expenses::create),
        )
        .route("/expenses/calendar", get(routes::expenses::calendar))
        .route(
            "/expenses/payment-history",
            get(routes::expenses::payment_history),
        )
        .route("/expenses/{id}", get(routes::expenses::details))
        .route("/expenses/{id}/update", post(routes::expenses::update))
        .route("/expenses/{id}/delete", post(routes::expenses::delete))
        .route("/expenses/{id}/mark-paid", post(routes::expenses::mark_paid))
        .route("/expenses/{id}/undo-paid", post(routes::expenses::undo_paid))
        .route(
            "/recurring-expenses",
            get(routes::recurring::index).post(routes::recurring::create),
        )
        .route(
            "/recurring-expenses/calendar",
            get(routes::recurring::calendar),
        )
        .route("/recurring-expenses/{id}", get(routes::recurring::details))
        .route(
            "/recurring-expenses/{id}/update",
            post(routes::recurring::update),
        )
        .route(
            "/recurring-expenses/{id}/delete",
            post(routes::recurring::delete),
        )
        .route(
            "/recurring-expenses/{id}/mark-paid",
            post(routes::recurring::mark_paid),
        )
        .route(
            "/recurring-expenses/{id}/postpone",
            post(routes::recurring::postpone),
        )
        .route(
            "/recurring-expenses/{id}/undo-paid",
            post(routes::recurring::undo_paid),
        )
        .route(
            "/recurring-expenses/{id}/undo-all",
            post(routes::recurring::undo_all),
        )
        .route(
            "/recurring-expenses/{id}/payment-history",
            get(routes::recurring::payment_history),
        )
        .route("/backup/data", post(routes::backup::run_data_backup))
        .route("/backup/files", post(routes::backup::run_files_backup))
        .route("/backup/full", post(routes::backup::run_full_backup))
        .route("/backup/history", get(routes::backup::history))
        .route("/backup/delete", post(routes::backup::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    let app = Router::new()
        .route("/login", post(routes::login::login))
        .route("/forgot-password", post(routes::login::forgot_password))
        .route(
            "/reset-password/verify",
            post(routes::login::verify_reset_otp),
        )
        .route("/reset-password", post(routes::login::reset_password))
        .merge(protected)
        .with_state(state);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
