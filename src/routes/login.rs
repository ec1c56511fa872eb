// routes/login.rs
// POST /login { "email": "...", "password": "..." } -> { "ok": true|false }
// plus logout and the guest-mode forgot-password/OTP/reset flow.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, OtpOutcome, PASSWORD_POLICY_MESSAGE};
use crate::mailer;
use crate::models::UserRole;
use crate::session::{SESSION_COOKIE_NAME, SessionUser};
use crate::state::{
    AppState, SESSION_TTL_SECONDS, create_session, delete_session, find_user_by_email,
    set_user_approval, set_user_password,
};

use super::helpers::*;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn invalid_login() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "ok": false, "error": "Invalid login attempt." })),
    )
        .into_response()
}

fn pending_approval() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "ok": false,
            "error": "Your account is pending admin approval. Please wait for approval."
        })),
    )
        .into_response()
}

/// Dashboard preference mirrors the original post-login redirect chain.
fn landing_page(roles: &[UserRole]) -> &'static str {
    for role in [
        UserRole::Finance,
        UserRole::PlanningOfficer,
        UserRole::CustomerCare,
        UserRole::DocumentOfficer,
        UserRole::Admin,
    ] {
        if roles.contains(&role) {
            return role.home_path();
        }
    }
    "/"
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let user = match find_user_by_email(&state, body.email.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_login(),
        Err(_) => return internal_error(),
    };

    // Approval is checked before the password so an unapproved account gets
    // the explicit message instead of a generic failure.
    if !user.is_admin() && !user.is_approved {
        return pending_approval();
    }

    if !auth::verify_password(&user.password_hash, &body.password) {
        return invalid_login();
    }

    match create_session(&state, &user.email).await {
        Ok(token) => {
            state.events.publish("User");
            let mut response = Json(json!({
                "ok": true,
                "redirect_url": landing_page(&user.roles),
            }))
            .into_response();
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                SESSION_COOKIE_NAME, token, SESSION_TTL_SECONDS
            );
            if let Ok(header_value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, header_value);
            }
            response
        }
        Err(_) => internal_error(),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, session_user: SessionUser) -> Response {
    if delete_session(&state, session_user.token()).await.is_err() {
        return internal_error();
    }
    let mut response = ok_message("Logged out.");
    let cookie = format!("{}=deleted; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE_NAME);
    if let Ok(header_value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
    response
}

fn reset_key(email: &str) -> String {
    format!("reset:{}", email.trim().to_lowercase())
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Response {
    let user = match find_user_by_email(&state, body.email.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => return not_found("No account found with that email."),
        Err(_) => return internal_error(),
    };
    if !user.is_approved {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "ok": false,
                "error": "Your account is pending admin approval. You cannot reset your \
                          password until it is approved."
            })),
        )
            .into_response();
    }

    let code = auth::generate_otp();
    state.otps.issue(
        &reset_key(&user.email),
        auth::OtpChallenge::for_reset(code.clone(), user.email.clone()),
    );
    mailer::send_reset_password_otp(&user.email, &code);
    ok_message("A code has been sent to your email. Enter it to continue.")
}

#[derive(Deserialize)]
pub struct ResetOtpRequest {
    pub email: String,
    pub otp: String,
}

pub async fn verify_reset_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetOtpRequest>,
) -> Response {
    match state.otps.verify(&reset_key(&body.email), body.otp.trim()) {
        OtpOutcome::Ok => ok_message("Code verified. You may now set a new password."),
        OtpOutcome::Missing => bad_request("OTP session expired. Please try again."),
        OtpOutcome::Expired => bad_request("OTP expired. Please try again."),
        OtpOutcome::Mismatch => {
            bad_request("Invalid code. Please check your email and try again.")
        }
    }
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Response {
    let key = reset_key(&body.email);
    let Some(challenge) = state.otps.get(&key) else {
        return bad_request("OTP session expired. Please try again.");
    };
    if !challenge.verified {
        return bad_request("Verify the emailed code before setting a new password.");
    }

    let mut errors = std::collections::BTreeMap::new();
    if !auth::password_meets_policy(&body.new_password) {
        errors.insert("new_password".to_string(), PASSWORD_POLICY_MESSAGE.to_string());
    } else if body.new_password != body.confirm_password {
        errors.insert(
            "confirm_password".to_string(),
            "Passwords do not match.".to_string(),
        );
    }
    if !errors.is_empty() {
        return validation_errors(&errors);
    }

    let user = match find_user_by_email(&state, &challenge.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return not_found("User not found."),
        Err(_) => return internal_error(),
    };
    let Some(user_id) = user.id else {
        return internal_error();
    };

    if set_user_password(&state, &user_id, &body.new_password).await.is_err() {
        return internal_error();
    }
    // A reset always demotes the account back to pending approval.
    if set_user_approval(&state, &user_id, false).await.is_err() {
        return internal_error();
    }
    state.otps.remove(&key);
    ok_message(
        "Your account changes will need approval of the administrator. Please contact the \
         authorized person.",
    )
}
