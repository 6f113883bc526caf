//! Tool invocations a conversational agent may request.
//!
//! The agent only ever names one of three backend operations. Raw calls
//! arrive as `(name, args)` pairs and are parsed into [`ToolInvocation`];
//! an unknown name or malformed arguments are rejected, never ignored.
//! Confirmation is deliberately absent: only the human can confirm a draft.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::scenarios::Cohort;
use crate::solutions::{Participant, PartialDescription};

pub const REFINE_TOOL: &str = "refine_description";
pub const PRESENT_FOR_REVIEW_TOOL: &str = "present_for_review";
pub const SUBMIT_TOOL: &str = "submit_solution";

/// A function call exactly as the agent emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RawToolCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Arguments of `refine_description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RefineArgs {
    /// Free-form description collected from the participants
    pub raw_text: String,
    pub scenario_ids: Vec<String>,
}

/// Fields the agent has collected so far. Every field is optional: only the
/// ones present overwrite the draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DraftPatch {
    #[serde(default)]
    pub solution_name: Option<String>,
    #[serde(default)]
    pub cohort: Option<Cohort>,
    #[serde(default)]
    pub participants: Option<Vec<Participant>>,
    #[serde(default)]
    pub scenario_ids: Option<Vec<String>>,
    #[serde(default)]
    pub raw_description: Option<String>,
    #[serde(default)]
    pub description: Option<PartialDescription>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl DraftPatch {
    pub fn is_empty(&self) -> bool {
        *self == DraftPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    Refine(RefineArgs),
    PresentForReview(DraftPatch),
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolCallError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

fn args_or_empty(args: &serde_json::Value) -> serde_json::Value {
    if args.is_null() {
        serde_json::json!({})
    } else {
        args.clone()
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &'static str,
    args: &serde_json::Value,
) -> Result<T, ToolCallError> {
    serde_json::from_value(args_or_empty(args)).map_err(|e| ToolCallError::InvalidArguments {
        tool,
        reason: e.to_string(),
    })
}

impl ToolInvocation {
    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::Refine(_) => REFINE_TOOL,
            ToolInvocation::PresentForReview(_) => PRESENT_FOR_REVIEW_TOOL,
            ToolInvocation::Submit => SUBMIT_TOOL,
        }
    }

    pub fn parse(call: &RawToolCall) -> Result<Self, ToolCallError> {
        match call.name.as_str() {
            REFINE_TOOL => parse_args(REFINE_TOOL, &call.args).map(ToolInvocation::Refine),
            PRESENT_FOR_REVIEW_TOOL => parse_args(PRESENT_FOR_REVIEW_TOOL, &call.args)
                .map(ToolInvocation::PresentForReview),
            SUBMIT_TOOL => {
                let args = args_or_empty(&call.args);
                match args.as_object() {
                    Some(map) if map.is_empty() => Ok(ToolInvocation::Submit),
                    _ => Err(ToolCallError::InvalidArguments {
                        tool: SUBMIT_TOOL,
                        reason: "takes no arguments".to_string(),
                    }),
                }
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(name: &str, args: serde_json::Value) -> RawToolCall {
        RawToolCall {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn parses_refine_with_typed_arguments() {
        let parsed = ToolInvocation::parse(&call(
            REFINE_TOOL,
            json!({"raw_text": "um quiosque solar", "scenario_ids": ["CENARIO_A1"]}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            ToolInvocation::Refine(RefineArgs {
                raw_text: "um quiosque solar".to_string(),
                scenario_ids: vec!["CENARIO_A1".to_string()],
            })
        );
        assert_eq!(parsed.name(), REFINE_TOOL);
    }

    #[test]
    fn refine_without_scenarios_is_invalid() {
        let err = ToolInvocation::parse(&call(REFINE_TOOL, json!({"raw_text": "x"}))).unwrap_err();
        assert!(matches!(
            err,
            ToolCallError::InvalidArguments {
                tool: REFINE_TOOL,
                ..
            }
        ));
    }

    #[test]
    fn present_for_review_accepts_partial_drafts() {
        let parsed = ToolInvocation::parse(&call(
            PRESENT_FOR_REVIEW_TOOL,
            json!({"solution_name": "Solar Kiosk", "cohort": "A"}),
        ))
        .unwrap();
        let ToolInvocation::PresentForReview(patch) = parsed else {
            panic!("expected present_for_review");
        };
        assert_eq!(patch.solution_name.as_deref(), Some("Solar Kiosk"));
        assert_eq!(patch.cohort, Some(Cohort::A));
        assert!(patch.participants.is_none());
    }

    #[test]
    fn present_for_review_rejects_unknown_fields() {
        let err = ToolInvocation::parse(&call(PRESENT_FOR_REVIEW_TOOL, json!({"confirmed": true})))
            .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArguments { .. }));
    }

    #[test]
    fn submit_accepts_null_or_empty_arguments() {
        assert_eq!(
            ToolInvocation::parse(&call(SUBMIT_TOOL, serde_json::Value::Null)).unwrap(),
            ToolInvocation::Submit
        );
        assert_eq!(
            ToolInvocation::parse(&call(SUBMIT_TOOL, json!({}))).unwrap(),
            ToolInvocation::Submit
        );
        assert!(ToolInvocation::parse(&call(SUBMIT_TOOL, json!({"force": true}))).is_err());
    }

    #[test]
    fn unknown_tool_names_are_rejected() {
        let err = ToolInvocation::parse(&call("confirm_registration", json!({}))).unwrap_err();
        assert_eq!(
            err,
            ToolCallError::UnknownTool("confirm_registration".to_string())
        );
    }
}
