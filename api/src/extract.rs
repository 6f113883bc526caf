//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! Use `AppJson<T>` as a drop-in replacement for `axum::Json<T>` in handler signatures.
//! Unlike the standard extractor, deserialization failures produce a JSON `AppError`
//! instead of axum's default plain-text 422 response.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request, rejection::JsonRejection},
    http::request::Parts,
};
use portal_core::solutions::SubmitterRole;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the self-declared submitter role.
pub const ROLE_HEADER: &str = "x-portal-role";

/// JSON extractor that converts deserialization errors to structured `AppError` responses.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Convert a `JsonRejection` to a structured `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field_hint = extract_field_from_serde_message(&body_text);

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field_hint.unwrap_or("body".to_string())),
        received: None,
        docs_hint: Some(
            "Check the request body against the endpoint's schema (GET /api-doc/openapi.json)."
                .to_string(),
        ),
    }
}

/// Try to extract a field name from serde's error messages.
fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    for pattern in ["missing field `", "unknown field `"] {
        if let Some(start) = msg.find(pattern) {
            let after = &msg[start + pattern.len()..];
            if let Some(end) = after.find('`') {
                return Some(after[..end].to_string());
            }
        }
    }
    None
}

/// Record id taken from the single path parameter. A segment that is not a
/// UUID cannot name any record, so it is a 404 like any other unknown id.
pub struct IdPath(pub Uuid);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resource = parts.uri.path().to_string();
        let not_found = || AppError::NotFound {
            resource: resource.clone(),
        };
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| not_found())?;
        Uuid::parse_str(raw.trim()).map(IdPath).map_err(|_| not_found())
    }
}

/// Submitter role read from [`ROLE_HEADER`]. Absent means student.
#[derive(Debug, Clone, Copy)]
pub struct Role(pub SubmitterRole);

impl<S> FromRequestParts<S> for Role
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ROLE_HEADER) else {
            return Ok(Role(SubmitterRole::default()));
        };
        let raw = value.to_str().unwrap_or_default();
        parse_role(raw).map(Role).ok_or_else(|| AppError::Validation {
            message: format!("unknown role '{raw}'"),
            field: Some(ROLE_HEADER.to_string()),
            received: Some(serde_json::Value::String(raw.to_string())),
            docs_hint: Some("Use 'student' or 'professor'.".to_string()),
        })
    }
}

fn parse_role(raw: &str) -> Option<SubmitterRole> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "student" => Some(SubmitterRole::Student),
        "professor" => Some(SubmitterRole::Professor),
        _ => None,
    }
}
