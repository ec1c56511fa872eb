#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceExt; // for oneshot

use casetrack::{
    routes,
    session::require_session,
    state::AppState,
};

fn build_app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(routes::login::logout))
        .route("/finance/dashboard", get(routes::finance::dashboard))
        .route("/admin/users", get(routes::admin::users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/login", post(routes::login::login))
        .merge(protected)
        .with_state(state)
}

fn login_request(email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(
            "{{\"email\":\"{email}\",\"password\":\"{password}\"}}"
        )))
        .unwrap()
}

#[tokio::test]
async fn protected_routes_reject_anonymous_requests() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let app = build_app(Arc::new(ctx.state.clone()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/finance/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn seeded_admin_can_log_in_and_reach_dashboards() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let app = build_app(Arc::new(ctx.state.clone()));

    // Wrong password is a generic failure
    let response = app
        .clone()
        .oneshot(login_request("admin@casetrack.local", "nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Seeded default admin credentials
    let response = app
        .clone()
        .oneshot(login_request("admin@casetrack.local", "ChangeMe#1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["ok"], true);

    // Admin passes every role allow-list
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/finance/dashboard")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/users")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(payload["users"].as_array().is_some_and(|u| !u.is_empty()));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn non_admin_roles_are_kept_out_of_admin_pages() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    let app = build_app(Arc::new(state.clone()));

    use casetrack::models::UserRole;
    use casetrack::state::{NewUser, create_user};
    create_user(
        &state,
        NewUser {
            email: "fin@example.com".to_string(),
            password: "Fin4nce!pass".to_string(),
            full_name: "Finance Clerk".to_string(),
            age: None,
            birth_date: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            contact_number: None,
            roles: vec![UserRole::Finance],
        },
    )
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(login_request("fin@example.com", "Fin4nce!pass"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    // Finance may see its own dashboard
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/finance/dashboard")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // but not the admin user directory
    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/users")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    common::teardown(Some(ctx)).await;
}
