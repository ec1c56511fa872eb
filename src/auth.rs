// auth.rs
// Password hashing and policy, plus the in-process throttle state for
// password attempts and OTP resends. The throttle maps are process-lifetime
// by design: single-instance deployment, reset on restart.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub const MAX_PASSWORD_ATTEMPTS: u32 = 5;
pub const PASSWORD_BLOCK_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const MAX_OTP_RESENDS: u32 = 3;
pub const OTP_RESEND_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const CHANGE_OTP_TTL: Duration = Duration::from_secs(2 * 60);
pub const RESET_OTP_TTL: Duration = Duration::from_secs(5 * 60);

/// At least 8 characters with upper, lower, digit, and special.
pub fn password_meets_policy(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

pub const PASSWORD_POLICY_MESSAGE: &str = "Password must be at least 8 characters and include \
uppercase, lowercase, number, and special character.";

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("password hashing failed: {e}"))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn generate_otp() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

struct AttemptEntry {
    fail_count: u32,
    blocked_until: Option<Instant>,
}

struct ResendEntry {
    count: u32,
    window_start: Instant,
}

/// Shared throttle state keyed by user id.
#[derive(Clone, Default)]
pub struct RateLimits {
    attempts: Arc<Mutex<HashMap<String, AttemptEntry>>>,
    resends: Arc<Mutex<HashMap<String, ResendEntry>>>,
}

impl Default for AttemptEntry {
    fn default() -> Self {
        AttemptEntry {
            fail_count: 0,
            blocked_until: None,
        }
    }
}

impl RateLimits {
    /// Remaining block time, if the key is currently locked out.
    pub fn password_block_remaining(&self, key: &str) -> Option<Duration> {
        self.password_block_remaining_at(key, Instant::now())
    }

    fn password_block_remaining_at(&self, key: &str, now: Instant) -> Option<Duration> {
        let map = self.attempts.lock().expect("attempts lock");
        map.get(key)
            .and_then(|e| e.blocked_until)
            .and_then(|until| until.checked_duration_since(now))
    }

    /// Records a failed password check; the fifth failure starts the
    /// 15-minute block.
    pub fn record_password_failure(&self, key: &str) {
        self.record_password_failure_at(key, Instant::now());
    }

    fn record_password_failure_at(&self, key: &str, now: Instant) {
        let mut map = self.attempts.lock().expect("attempts lock");
        let entry = map.entry(key.to_string()).or_default();
        if let Some(until) = entry.blocked_until {
            if until <= now {
                entry.fail_count = 0;
                entry.blocked_until = None;
            }
        }
        entry.fail_count += 1;
        if entry.fail_count >= MAX_PASSWORD_ATTEMPTS {
            entry.blocked_until = Some(now + PASSWORD_BLOCK_WINDOW);
        }
    }

    pub fn clear_password_failures(&self, key: &str) {
        let mut map = self.attempts.lock().expect("attempts lock");
        map.remove(key);
    }

    /// True when another OTP resend is allowed inside the rolling window.
    pub fn try_record_otp_resend(&self, key: &str) -> bool {
        self.try_record_otp_resend_at(key, Instant::now())
    }

    fn try_record_otp_resend_at(&self, key: &str, now: Instant) -> bool {
        let mut map = self.resends.lock().expect("resends lock");
        let entry = map.entry(key.to_string()).or_insert(ResendEntry {
            count: 0,
            window_start: now,
        });
        if now.duration_since(entry.window_start) >= OTP_RESEND_WINDOW {
            entry.count = 0;
            entry.window_start = now;
        }
        if entry.count >= MAX_OTP_RESENDS {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// What the user is allowed to do once their emailed code checks out.
#[derive(Clone)]
pub struct OtpChallenge {
    pub code: String,
    pub email: String,
    /// Password change carries the verified new/current passwords across the
    /// confirmation round-trip; reset carries nothing.
    pub new_password: Option<String>,
    pub current_password: Option<String>,
    pub verified: bool,
    issued_at: Instant,
    ttl: Duration,
}

impl OtpChallenge {
    pub fn for_change(code: String, email: String, current: String, new: String) -> Self {
        OtpChallenge {
            code,
            email,
            new_password: Some(new),
            current_password: Some(current),
            verified: false,
            issued_at: Instant::now(),
            ttl: CHANGE_OTP_TTL,
        }
    }

    pub fn for_reset(code: String, email: String) -> Self {
        OtpChallenge {
            code,
            email,
            new_password: None,
            current_password: None,
            verified: false,
            issued_at: Instant::now(),
            ttl: RESET_OTP_TTL,
        }
    }

    fn expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.issued_at) > self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Ok,
    Missing,
    Expired,
    Mismatch,
}

/// In-process store of pending OTP challenges, keyed by user id (change
/// flow) or email (reset flow).
#[derive(Clone, Default)]
pub struct OtpStore {
    inner: Arc<Mutex<HashMap<String, OtpChallenge>>>,
}

impl OtpStore {
    pub fn issue(&self, key: &str, challenge: OtpChallenge) {
        let mut map = self.inner.lock().expect("otp lock");
        map.insert(key.to_string(), challenge);
    }

    /// Swaps in a fresh code, keeping the pending payload; false when there
    /// is no challenge to refresh.
    pub fn reissue_code(&self, key: &str, code: String) -> bool {
        let mut map = self.inner.lock().expect("otp lock");
        match map.get_mut(key) {
            Some(challenge) => {
                challenge.code = code;
                challenge.issued_at = Instant::now();
                challenge.verified = false;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<OtpChallenge> {
        let map = self.inner.lock().expect("otp lock");
        map.get(key).cloned()
    }

    pub fn verify(&self, key: &str, code: &str) -> OtpOutcome {
        self.verify_at(key, code, Instant::now())
    }

    fn verify_at(&self, key: &str, code: &str, now: Instant) -> OtpOutcome {
        let mut map = self.inner.lock().expect("otp lock");
        let Some(challenge) = map.get_mut(key) else {
            return OtpOutcome::Missing;
        };
        if challenge.expired_at(now) {
            map.remove(key);
            return OtpOutcome::Expired;
        }
        if challenge.code != code {
            return OtpOutcome::Mismatch;
        }
        challenge.verified = true;
        OtpOutcome::Ok
    }

    pub fn remove(&self, key: &str) {
        let mut map = self.inner.lock().expect("otp lock");
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_requires_all_character_classes() {
        assert!(password_meets_policy("Str0ng!pass"));
        assert!(!password_meets_policy("sh1!A"));
        assert!(password_meets_policy("short1!A")); // exactly 8 is fine
        assert!(!password_meets_policy("alllower1!"));
        assert!(!password_meets_policy("ALLUPPER1!"));
        assert!(!password_meets_policy("NoDigits!!"));
        assert!(!password_meets_policy("NoSpecial11"));
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Str0ng!pass").unwrap();
        assert!(verify_password(&hash, "Str0ng!pass"));
        assert!(!verify_password(&hash, "Wr0ng!pass"));
    }

    #[test]
    fn fifth_failure_starts_the_block() {
        let limits = RateLimits::default();
        let now = Instant::now();
        for _ in 0..MAX_PASSWORD_ATTEMPTS - 1 {
            limits.record_password_failure_at("u1", now);
            assert!(limits.password_block_remaining_at("u1", now).is_none());
        }
        limits.record_password_failure_at("u1", now);
        let remaining = limits.password_block_remaining_at("u1", now).unwrap();
        assert!(remaining <= PASSWORD_BLOCK_WINDOW);
        // still blocked even if the caller now has the right password
        assert!(limits.password_block_remaining_at("u1", now).is_some());
    }

    #[test]
    fn block_expires_after_the_window() {
        let limits = RateLimits::default();
        let now = Instant::now();
        for _ in 0..MAX_PASSWORD_ATTEMPTS {
            limits.record_password_failure_at("u1", now);
        }
        let later = now + PASSWORD_BLOCK_WINDOW + Duration::from_secs(1);
        assert!(limits.password_block_remaining_at("u1", later).is_none());
    }

    #[test]
    fn success_clears_the_counter() {
        let limits = RateLimits::default();
        let now = Instant::now();
        for _ in 0..MAX_PASSWORD_ATTEMPTS - 1 {
            limits.record_password_failure_at("u1", now);
        }
        limits.clear_password_failures("u1");
        for _ in 0..MAX_PASSWORD_ATTEMPTS - 1 {
            limits.record_password_failure_at("u1", now);
        }
        assert!(limits.password_block_remaining_at("u1", now).is_none());
    }

    #[test]
    fn otp_resends_cap_inside_the_window() {
        let limits = RateLimits::default();
        let now = Instant::now();
        for _ in 0..MAX_OTP_RESENDS {
            assert!(limits.try_record_otp_resend_at("u1", now));
        }
        assert!(!limits.try_record_otp_resend_at("u1", now));
        let later = now + OTP_RESEND_WINDOW;
        assert!(limits.try_record_otp_resend_at("u1", later));
    }

    #[test]
    fn otp_verification_outcomes() {
        let store = OtpStore::default();
        assert_eq!(store.verify("missing", "123456"), OtpOutcome::Missing);

        store.issue(
            "u1",
            OtpChallenge::for_change(
                "123456".into(),
                "a@b.test".into(),
                "Old1!pass".into(),
                "New1!pass".into(),
            ),
        );
        assert_eq!(store.verify("u1", "000000"), OtpOutcome::Mismatch);
        assert_eq!(store.verify("u1", "123456"), OtpOutcome::Ok);
        assert!(store.get("u1").unwrap().verified);

        let now = Instant::now() + CHANGE_OTP_TTL + Duration::from_secs(1);
        assert_eq!(store.verify_at("u1", "123456", now), OtpOutcome::Expired);
        assert!(store.get("u1").is_none());
    }

    #[test]
    fn generated_otps_are_six_digits() {
        for _ in 0..32 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
