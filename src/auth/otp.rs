//! One-time activation codes mailed at registration.

use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};

use crate::auth::repo_types::User;

pub const OTP_LEN: usize = 6;

/// Uniform over `[100000, 999999]`.
pub fn generate_code() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

pub fn expiry_from(now: OffsetDateTime, ttl_minutes: i64) -> OffsetDateTime {
    now + Duration::minutes(ttl_minutes)
}

/// Shape check applied to submitted codes before any lookup.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    /// No pending code, or a different one.
    Mismatch,
    Expired,
}

impl OtpRejection {
    pub fn message(self) -> &'static str {
        match self {
            OtpRejection::Mismatch => "Invalid OTP code.",
            OtpRejection::Expired => "OTP has expired.",
        }
    }
}

/// The code must match and `now` must not be past the stored expiry.
pub fn check(user: &User, submitted: &str, now: OffsetDateTime) -> Result<(), OtpRejection> {
    match user.otp_code.as_deref() {
        Some(stored) if stored == submitted => {}
        _ => return Err(OtpRejection::Mismatch),
    }
    match user.otp_expires_at {
        Some(expires_at) if now > expires_at => Err(OtpRejection::Expired),
        _ => Ok(()),
    }
}
