// mailer.rs
// Outbound SMTP for OTP delivery and change notifications. Sending is a side
// effect of an already-successful operation, so failures are logged to a
// local file and never surfaced to the user.

use lettre::{
    Message, SmtpTransport, Transport, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use std::env;
use tracing::warn;

use crate::storage::append_log_line;

const DEFAULT_SMTP_PORT: u16 = 587;

struct SmtpConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
}

fn load_config() -> Option<SmtpConfig> {
    let host = env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_SMTP_PORT);
    let username = env::var("SMTP_USERNAME").unwrap_or_default();
    let password = env::var("SMTP_PASSWORD").unwrap_or_default();
    let from = env::var("SMTP_FROM")
        .ok()
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| username.clone());
    Some(SmtpConfig {
        host,
        port,
        username,
        password,
        from,
    })
}

fn error_log_file() -> String {
    env::var("EMAIL_ERROR_LOG").unwrap_or_else(|_| "email_error.log".to_string())
}

fn send(to: &str, subject: &str, body: String) {
    let Some(config) = load_config() else {
        warn!(to, subject, "SMTP not configured; mail skipped");
        return;
    };
    let result = build_and_send(&config, to, subject, body);
    if let Err(err) = result {
        warn!(to, subject, %err, "mail delivery failed");
        append_log_line(
            &error_log_file(),
            &format!("{} | to={to} | subject={subject} | {err}", chrono::Local::now()),
        );
    }
}

fn build_and_send(
    config: &SmtpConfig,
    to: &str,
    subject: &str,
    body: String,
) -> anyhow::Result<()> {
    let message = Message::builder()
        .from(config.from.parse()?)
        .to(to.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)?;

    let transport = SmtpTransport::starttls_relay(&config.host)?
        .port(config.port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .build();
    transport.send(&message)?;
    Ok(())
}

pub fn send_change_password_otp(to: &str, code: &str) {
    send(
        to,
        "Password Change OTP",
        format!("Your password change code is: {code}"),
    );
}

pub fn send_reset_password_otp(to: &str, code: &str) {
    send(
        to,
        "Password Reset OTP",
        format!("Your password reset code is: {code}"),
    );
}

pub fn send_password_changed_notice(to: &str) {
    send(
        to,
        "Password Changed",
        "Your password was changed. If this wasn't you, please contact support.".to_string(),
    );
}
