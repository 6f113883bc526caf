use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portal_core::dialogue::DialogueError;
use portal_core::error::{self, ApiError, FieldViolation};

use crate::store::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Single malformed input (400)
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Every violated submission constraint at once (400)
    #[error("{}", summarize(.issues))]
    ValidationFailed { issues: Vec<FieldViolation> },
    /// Unknown solution or session id (404)
    #[error("{resource} not found")]
    NotFound { resource: String },
    /// The dialogue is not in a phase that allows the request (409)
    #[error("{message}")]
    PhaseConflict {
        message: String,
        docs_hint: Option<String>,
    },
    /// External text transformation failed or timed out (503)
    #[error("refinement unavailable: {reason}")]
    RefinementUnavailable { reason: String },
    /// Persistence call failed or timed out (503)
    #[error("submission unavailable: {reason}")]
    SubmissionUnavailable { reason: String },
    /// The conversational agent could not produce a turn (503)
    #[error("conversation unavailable: {reason}")]
    ConversationUnavailable { reason: String },
    /// Internal error (500)
    #[error("internal error: {0}")]
    Internal(String),
}

/// `field: message` pairs joined with "; ".
fn summarize(issues: &[FieldViolation]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    fn parts(self, request_id: String) -> (StatusCode, ApiError) {
        let body = |error: &str, message: String| ApiError {
            error: error.to_string(),
            message,
            field: None,
            received: None,
            details: Vec::new(),
            retryable: false,
            request_id: request_id.clone(),
            docs_hint: None,
        };

        match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    field,
                    received,
                    docs_hint,
                    ..body(error::codes::VALIDATION_FAILED, message)
                },
            ),
            AppError::ValidationFailed { issues } => {
                let message = match issues.as_slice() {
                    [single] => format!("{}: {}", single.field, single.message),
                    many => format!("{} fields failed validation", many.len()),
                };
                let field = match issues.as_slice() {
                    [single] => Some(single.field.clone()),
                    _ => None,
                };
                (
                    StatusCode::BAD_REQUEST,
                    ApiError {
                        field,
                        details: issues,
                        ..body(error::codes::VALIDATION_FAILED, message)
                    },
                )
            }
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                body(error::codes::NOT_FOUND, format!("{resource} not found")),
            ),
            AppError::PhaseConflict { message, docs_hint } => (
                StatusCode::CONFLICT,
                ApiError {
                    docs_hint,
                    ..body(error::codes::PHASE_CONFLICT, message)
                },
            ),
            AppError::RefinementUnavailable { reason } => {
                tracing::warn!(reason = %reason, "refinement unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError {
                        retryable: true,
                        docs_hint: Some(
                            "The draft is unchanged. Retry the refinement in a moment.".to_string(),
                        ),
                        ..body(
                            error::codes::REFINEMENT_UNAVAILABLE,
                            "The description could not be refined right now".to_string(),
                        )
                    },
                )
            }
            AppError::SubmissionUnavailable { reason } => {
                tracing::error!(reason = %reason, "store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError {
                        retryable: true,
                        docs_hint: Some(
                            "Nothing was lost. Retry the same request in a moment.".to_string(),
                        ),
                        ..body(
                            error::codes::SUBMISSION_UNAVAILABLE,
                            "The solution store is unavailable right now".to_string(),
                        )
                    },
                )
            }
            AppError::ConversationUnavailable { reason } => {
                tracing::warn!(reason = %reason, "conversation unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError {
                        retryable: true,
                        docs_hint: Some(
                            "The message was not recorded. Send it again in a moment.".to_string(),
                        ),
                        ..body(
                            error::codes::CONVERSATION_UNAVAILABLE,
                            "The assistant could not answer right now".to_string(),
                        )
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body(
                        error::codes::INTERNAL_ERROR,
                        "An internal error occurred".to_string(),
                    ),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();
        let (status, api_error) = self.parts(request_id);
        (status, Json(api_error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { .. } => AppError::Internal(err.to_string()),
            StoreError::Database(_) | StoreError::Timeout(_) => AppError::SubmissionUnavailable {
                reason: err.to_string(),
            },
        }
    }
}

impl From<DialogueError> for AppError {
    fn from(err: DialogueError) -> Self {
        match err {
            DialogueError::InvalidEdit { ref path, .. } => AppError::Validation {
                field: Some(path.clone()),
                message: err.to_string(),
                received: None,
                docs_hint: Some(
                    "Paths use the field names of the draft, e.g. 'solution_name' or \
                     'descricao_refinada.resumo'."
                        .to_string(),
                ),
            },
            DialogueError::Incomplete { ref missing, .. } => AppError::ValidationFailed {
                issues: missing
                    .iter()
                    .map(|field| FieldViolation::new(field.clone(), "required field is missing"))
                    .collect(),
            },
            DialogueError::AwaitingConfirmation => AppError::PhaseConflict {
                message: err.to_string(),
                docs_hint: Some(
                    "Present the draft for review and confirm it before submitting.".to_string(),
                ),
            },
            DialogueError::PhaseConflict { .. } | DialogueError::AlreadySubmitted { .. } => {
                AppError::PhaseConflict {
                    message: err.to_string(),
                    docs_hint: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use portal_core::dialogue::DialoguePhase;

    use super::*;

    fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let (status, body) = err.parts("req-1".to_string());
        (status, serde_json::to_value(body).unwrap())
    }

    #[test]
    fn validation_failures_list_every_violation() {
        let (status, body) = render(AppError::ValidationFailed {
            issues: vec![
                FieldViolation::new("nome_da_solucao", "solution name must not be empty"),
                FieldViolation::new(
                    "cenarios_relacionados",
                    "at least one related scenario is required",
                ),
            ],
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][1]["field"], "cenarios_relacionados");
        assert!(body.get("field").is_none());
        assert!(body.get("retryable").is_none());
    }

    #[test]
    fn display_is_readable_for_notices() {
        let err = AppError::ValidationFailed {
            issues: vec![
                FieldViolation::new("cenarios_relacionados[0]", "unknown scenario 'CENARIO_X'"),
                FieldViolation::new("turma", "is required"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "cenarios_relacionados[0]: unknown scenario 'CENARIO_X'; turma: is required"
        );
        let err = AppError::NotFound {
            resource: "solution abc".to_string(),
        };
        assert_eq!(err.to_string(), "solution abc not found");
    }

    #[test]
    fn single_violation_is_named_in_the_message() {
        let (_, body) = render(AppError::ValidationFailed {
            issues: vec![FieldViolation::new(
                "cenarios_relacionados",
                "at least one related scenario is required",
            )],
        });
        assert_eq!(body["field"], "cenarios_relacionados");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("at least one related scenario")
        );
    }

    #[test]
    fn store_failures_are_retryable_503s() {
        let (status, body) = render(StoreError::Timeout(Duration::from_secs(10)).into());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "submission_unavailable");
        assert_eq!(body["retryable"], true);
    }

    #[test]
    fn dialogue_errors_map_to_conflicts_and_validation() {
        let (status, body) = render(
            DialogueError::PhaseConflict {
                action: "confirm",
                phase: DialoguePhase::CollectingName,
            }
            .into(),
        );
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "phase_conflict");

        let (status, body) = render(
            DialogueError::Incomplete {
                action: "refine",
                missing: vec!["raw_description".to_string()],
            }
            .into(),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "raw_description");

        let (status, _) = render(DialogueError::AwaitingConfirmation.into());
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let (status, body) = render(AppError::Internal("pool exploded".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
        assert_eq!(body["request_id"], "req-1");
    }
}
