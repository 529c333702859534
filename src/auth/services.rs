use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    auth::{
        credentials::{normalize_email, spawn_hash, spawn_verify, MIN_PASSWORD_LEN},
        dto::{LoginRequest, RegisterRequest, VerifyOtpRequest},
        jwt::TokenError,
        otp,
        repo_types::NewUser,
    },
    error::{ApiError, ApiResult},
    mailer::{self, OutgoingMail},
    state::AppState,
    validation::Rules,
};

/// Outcome of a registration; `otp` is the raw code for non-production echoes.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub otp: String,
    pub email_delivered: bool,
}

pub async fn register(state: &AppState, req: RegisterRequest) -> ApiResult<Registration> {
    let mut rules = Rules::new();
    let name = rules.required("name", &req.name).map(|n| n.trim().to_string());
    let email = rules.required("email", &req.email).map(normalize_email);
    if let Some(email) = &email {
        if rules.email("email", email) && state.users.find_by_email(email).await?.is_some() {
            rules.fail("email", "The email field must contain a unique value.");
        }
    }
    let password = rules.required("password", &req.password);
    if let Some(password) = password {
        rules.min_len("password", password, MIN_PASSWORD_LEN);
    }
    if let Err(e) = rules.finish() {
        warn!("registration rejected");
        return Err(e);
    }
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    let password_hash = spawn_hash(password).await?;
    let code = otp::generate_code();
    let expires_at = otp::expiry_from(OffsetDateTime::now_utc(), state.config.otp.ttl_minutes);
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            role_id: state.config.default_role_id,
            otp_code: code.clone(),
            otp_expires_at: expires_at,
        })
        .await
        .map_err(|e| e.for_field("email"))?;
    info!(user_id = user.id, email = %user.email, "user registered");

    let expires_text = expires_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| expires_at.to_string());
    let mail = OutgoingMail {
        from: mailer::sender(&state.config.mail),
        to: user.email.clone(),
        subject: "Your OTP Code".into(),
        html: mailer::otp_mail_html(&user.name, &code, &expires_text),
    };
    let email_delivered = match state.mailer.send(&mail).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, user_id = user.id, "failed to send OTP email");
            false
        }
    };

    Ok(Registration {
        email: user.email,
        otp: code,
        email_delivered,
    })
}

pub async fn verify_otp(state: &AppState, req: VerifyOtpRequest) -> ApiResult<()> {
    verify_otp_at(state, req, OffsetDateTime::now_utc()).await
}

async fn verify_otp_at(
    state: &AppState,
    req: VerifyOtpRequest,
    now: OffsetDateTime,
) -> ApiResult<()> {
    let mut rules = Rules::new();
    let email = rules.required("email", &req.email).map(normalize_email);
    if let Some(email) = &email {
        rules.email("email", email);
    }
    let code = rules.required("otp", &req.otp).map(str::trim);
    if let Some(code) = code {
        if !otp::is_well_formed(code) {
            rules.fail("otp", "The otp field must be exactly 6 digits.");
        }
    }
    rules.finish()?;
    let (Some(email), Some(code)) = (email, code) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    if let Err(rejection) = otp::check(&user, code, now) {
        warn!(user_id = user.id, ?rejection, "otp rejected");
        return Err(ApiError::validation(rejection.message()));
    }

    state.users.clear_otp(user.id).await?;
    info!(user_id = user.id, "user verified");
    Ok(())
}

pub async fn login(state: &AppState, req: LoginRequest) -> ApiResult<String> {
    let mut rules = Rules::new();
    let email = rules.required("email", &req.email).map(normalize_email);
    if let Some(email) = &email {
        rules.email("email", email);
    }
    let password = rules.required("password", &req.password);
    rules.finish()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            ApiError::not_found("User not found.")
        })?;

    if !user.is_verified() {
        warn!(user_id = user.id, "login before otp verification");
        return Err(ApiError::auth("Please verify your OTP before logging in."));
    }

    if !spawn_verify(password, &user.password_hash).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::auth("Invalid password."));
    }

    let keys = state.jwt_keys().map_err(|e| {
        error!("login attempted without JWT secret");
        ApiError::Config(e.to_string())
    })?;
    let token = keys.sign(&user).map_err(|e| match e {
        TokenError::SecretMissing => ApiError::Config(e.to_string()),
        other => ApiError::Internal(other.into()),
    })?;

    info!(user_id = user.id, role_id = user.role_id, "user logged in");
    Ok(token)
}
