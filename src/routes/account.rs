// routes/account.rs
// Authenticated password change with OTP confirmation, throttled resends,
// and the audit trail of completed changes.

use axum::{Json, extract::State, response::Response};
use chrono::Local;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{self, OtpOutcome, PASSWORD_POLICY_MESSAGE};
use crate::mailer;
use crate::session::SessionUser;
use crate::state::{AppState, set_user_password};
use crate::storage::append_log_line;

use super::helpers::*;

const AUDIT_LOG_FILE: &str = "password_change_audit.log";

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Verifies the current password (throttled), then parks the pending change
/// behind an emailed OTP.
pub async fn change_password(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChangePasswordRequest>,
) -> Response {
    let user = session_user.user().clone();
    let key = session_user.user_id().to_hex();

    if let Some(remaining) = state.limits.password_block_remaining(&key) {
        let minutes = remaining.as_secs().div_ceil(60);
        return conflict(&format!(
            "Too many failed attempts. Try again in about {minutes} minute(s)."
        ));
    }

    if !auth::verify_password(&user.password_hash, &body.current_password) {
        state.limits.record_password_failure(&key);
        let mut errors = std::collections::BTreeMap::new();
        errors.insert(
            "current_password".to_string(),
            "Current password is incorrect.".to_string(),
        );
        return validation_errors(&errors);
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

    let code = auth::generate_otp();
    state.otps.issue(
        &key,
        auth::OtpChallenge::for_change(
            code.clone(),
            user.email.clone(),
            body.current_password,
            body.new_password,
        ),
    );
    mailer::send_change_password_otp(&user.email, &code);
    ok_message("A code has been sent to your email. Enter it to confirm your password change.")
}

#[derive(Deserialize)]
pub struct ConfirmChangeRequest {
    pub otp: String,
}

pub async fn confirm_change_password(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfirmChangeRequest>,
) -> Response {
    let user = session_user.user().clone();
    let key = session_user.user_id().to_hex();

    match state.otps.verify(&key, body.otp.trim()) {
        OtpOutcome::Missing => return bad_request("OTP session expired. Please try again."),
        OtpOutcome::Expired => return bad_request("OTP expired. Please try again."),
        OtpOutcome::Mismatch => {
            return bad_request("Invalid code. Please check your email and try again.");
        }
        OtpOutcome::Ok => {}
    }

    let Some(challenge) = state.otps.get(&key) else {
        return bad_request("OTP session expired. Please try again.");
    };
    let (Some(current), Some(new)) = (challenge.current_password, challenge.new_password) else {
        return bad_request("OTP session expired. Please try again.");
    };

    // The session may outlive an interleaved change from elsewhere; the
    // stored current password must still match.
    if !auth::verify_password(&user.password_hash, &current) {
        state.otps.remove(&key);
        return conflict("Password changed elsewhere; start over.");
    }

    if set_user_password(&state, session_user.user_id(), &new).await.is_err() {
        return internal_error();
    }

    state.limits.clear_password_failures(&key);
    state.otps.remove(&key);
    append_log_line(
        AUDIT_LOG_FILE,
        &format!("{} | {} | OTP", Local::now().format("%Y-%m-%d %H:%M:%S"), user.email),
    );
    mailer::send_password_changed_notice(&user.email);
    ok_message("Password changed successfully.")
}

/// Re-emails a fresh code for the pending change; capped per rolling window.
pub async fn resend_change_password_otp(
    session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user = session_user.user().clone();
    let key = session_user.user_id().to_hex();

    if !state.limits.try_record_otp_resend(&key) {
        return conflict("You have reached the maximum number of resends. Please try again later.");
    }

    let code = auth::generate_otp();
    if !state.otps.reissue_code(&key, code.clone()) {
        return bad_request("No pending password change. Start again.");
    }
    mailer::send_change_password_otp(&user.email, &code);
    ok_message("A new code has been sent to your email.")
}
