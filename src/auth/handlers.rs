use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse,
            VerifyOtpRequest,
        },
        services,
    },
    error::ApiResult,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let reg = services::register(&state, payload).await?;

    // Raw codes and delivery diagnostics never leave a production server.
    let expose = !state.config.is_production();
    let email_warning = (expose && !reg.email_delivered).then(|| {
        "Email sending failed. Check the mail relay settings (MAIL_API_URL).".to_string()
    });

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email for OTP.".into(),
            email: reg.email,
            email_delivered: reg.email_delivered,
            otp: expose.then_some(reg.otp),
            email_warning,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::verify_otp(&state, payload).await?;
    Ok(Json(MessageResponse::new(
        "OTP verified successfully. You can now log in.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = services::login(&state, payload).await?;
    Ok(Json(TokenResponse { token }))
}
