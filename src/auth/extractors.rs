//! Access filter for protected routes.
//!
//! Every request is judged on its own headers: a preflight passes untouched,
//! anything else needs a valid `Bearer` token. Decoded claims travel to the
//! handlers through request extensions and are read back with [`AuthUser`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::{
    claims::Claims,
    jwt::{JwtKeys, TokenError},
};
use crate::config::JwtConfig;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access denied")]
    TokenMissing,
    #[error("Access denied")]
    TokenInvalid,
    #[error("Server misconfiguration")]
    SecretMissing,
}

impl AccessError {
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::TokenMissing => "TOKEN_MISSING",
            AccessError::TokenInvalid => "TOKEN_INVALID",
            AccessError::SecretMissing => "JWT_SECRET_MISSING",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::SecretMissing => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        (self.status(), body).into_response()
    }
}

/// Result of a successful gate check.
#[derive(Debug)]
pub enum Gate {
    Preflight,
    Allow(Claims),
}

/// Pulls the token out of `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    lazy_static! {
        static ref BEARER_RE: Regex = Regex::new(r"Bearer\s(\S+)").unwrap();
    }
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    BEARER_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn evaluate(method: &Method, headers: &HeaderMap, jwt: &JwtConfig) -> Result<Gate, AccessError> {
    if method == Method::OPTIONS {
        return Ok(Gate::Preflight);
    }

    let token = bearer_token(headers).ok_or(AccessError::TokenMissing)?;

    let keys = JwtKeys::from_config(jwt).map_err(|_| {
        error!("JWT secret missing; rejecting protected request");
        AccessError::SecretMissing
    })?;

    match keys.verify(token) {
        Ok(claims) => Ok(Gate::Allow(claims)),
        Err(TokenError::Expired) => {
            warn!("expired token");
            Err(AccessError::TokenInvalid)
        }
        Err(e) => {
            warn!(error = %e, "invalid token");
            Err(AccessError::TokenInvalid)
        }
    }
}

/// Middleware guarding every protected router.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AccessError> {
    match evaluate(req.method(), req.headers(), &state.config.jwt)? {
        Gate::Preflight => debug!("preflight passed without auth"),
        Gate::Allow(claims) => {
            debug!(user_id = claims.uid, "request authorized");
            req.extensions_mut().insert(claims);
        }
    }
    Ok(next.run(req).await)
}

/// Identity decoded by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or(AccessError::TokenMissing)
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::HeaderValue, middleware, routing::get, Router};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo_types::User;
    use crate::config::AppConfig;

    fn user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: 7,
            name: "Alice".into(),
            email: "alice@x.com".into(),
            password_hash: String::new(),
            role_id: 1,
            otp_code: None,
            otp_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn jwt() -> JwtConfig {
        AppConfig::for_tests().jwt
    }

    fn token() -> String {
        JwtKeys::from_config(&jwt()).unwrap().sign(&user()).unwrap()
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn missing_header_is_token_missing() {
        let err = evaluate(&Method::GET, &HeaderMap::new(), &jwt()).unwrap_err();
        assert_eq!(err, AccessError::TokenMissing);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "TOKEN_MISSING");

        let err = evaluate(&Method::GET, &headers_with("Token abc"), &jwt()).unwrap_err();
        assert_eq!(err, AccessError::TokenMissing);
    }

    #[test]
    fn preflight_passes_regardless_of_header() {
        assert!(matches!(
            evaluate(&Method::OPTIONS, &HeaderMap::new(), &jwt()),
            Ok(Gate::Preflight)
        ));
        assert!(matches!(
            evaluate(&Method::OPTIONS, &headers_with("Bearer garbage"), &jwt()),
            Ok(Gate::Preflight)
        ));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let token = token();
        let (head, sig) = token.rsplit_once('.').unwrap();
        let flipped: String = sig
            .chars()
            .rev()
            .collect();
        let tampered = format!("{head}.{flipped}");
        let err = evaluate(&Method::GET, &headers_with(&format!("Bearer {tampered}")), &jwt())
            .unwrap_err();
        assert_eq!(err, AccessError::TokenInvalid);
        assert_eq!(err.code(), "TOKEN_INVALID");
    }

    #[test]
    fn missing_secret_is_server_fault() {
        let token = token();
        let mut cfg = jwt();
        cfg.secret = None;
        let err = evaluate(&Method::GET, &headers_with(&format!("Bearer {token}")), &cfg)
            .unwrap_err();
        assert_eq!(err, AccessError::SecretMissing);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "JWT_SECRET_MISSING");
    }

    #[test]
    fn valid_token_yields_claims() {
        let token = token();
        match evaluate(&Method::GET, &headers_with(&format!("Bearer {token}")), &jwt()) {
            Ok(Gate::Allow(claims)) => {
                assert_eq!(claims.uid, 7);
                assert_eq!(claims.email, "alice@x.com");
                assert_eq!(claims.role, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    async fn whoami(AuthUser(claims): AuthUser) -> String {
        claims.uid.to_string()
    }

    fn guarded_app() -> Router {
        let state = AppState::fake();
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    #[tokio::test]
    async fn middleware_forwards_identity() {
        let response = guarded_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {}", token()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"7");
    }

    #[tokio::test]
    async fn middleware_rejects_before_handler() {
        let response = guarded_app()
            .oneshot(axum::http::Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "TOKEN_MISSING");
        assert_eq!(json["error"], "Access denied");
    }
}
