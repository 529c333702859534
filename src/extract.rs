//! Request body extractor whose rejections render as [`ApiError`].

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON body, or a url-encoded form when the client posts one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
        age: u32,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<Payload, ApiError> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        ApiJson::<Payload>::from_request(req, &()).await.map(|ApiJson(p)| p)
    }

    #[tokio::test]
    async fn reads_json_and_forms() {
        let p = extract(Some("application/json"), r#"{"name":"Alice","age":30}"#)
            .await
            .unwrap();
        assert_eq!((p.name.as_str(), p.age), ("Alice", 30));

        let p = extract(
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            "name=Bob&age=41",
        )
        .await
        .unwrap();
        assert_eq!((p.name.as_str(), p.age), ("Bob", 41));
    }

    #[tokio::test]
    async fn every_rejection_is_a_validation_error() {
        for (ct, body) in [
            (Some("application/json"), r#"{"name":5,"age":30}"#),
            (Some("application/json"), r#"{name: "Alice"}"#),
            (None, r#"{"name":"Alice","age":30}"#),
            (Some("application/x-www-form-urlencoded"), "name=Bob&age=old"),
        ] {
            let err = extract(ct, body).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
    }
}
