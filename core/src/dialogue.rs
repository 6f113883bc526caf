//! Registration dialogue: the draft being assembled and the phase machine
//! that guards refinement, review, confirmation and submission.
//!
//! Fields may arrive in any order and may be revised at any time before
//! submission. The phase reported while collecting is always the first
//! required field still missing. Nothing here performs I/O; callers run the
//! external steps and report their outcome back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scenarios::Cohort;
use crate::solutions::{
    DescriptionBlock, ImageReference, Participant, PartialDescription, SolutionPayload,
};
use crate::tools::DraftPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialoguePhase {
    CollectingName,
    CollectingParticipants,
    CollectingCohort,
    CollectingScenarios,
    CollectingRawDescription,
    Refining,
    Reviewing,
    Confirmed,
    Submitted,
}

/// In-progress registration record. Never persisted as such.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Draft {
    pub solution_name: Option<String>,
    pub cohort: Option<Cohort>,
    pub participants: Vec<Participant>,
    pub scenario_ids: Vec<String>,
    /// Free-form prose before refinement
    pub raw_description: Option<String>,
    pub description: Option<DescriptionBlock>,
    pub image: Option<ImageReference>,
    pub link: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Draft {
    /// First collecting phase whose field is still missing, in guided order.
    pub fn next_missing(&self) -> Option<DialoguePhase> {
        if !present(&self.solution_name) {
            Some(DialoguePhase::CollectingName)
        } else if self.participants.is_empty() {
            Some(DialoguePhase::CollectingParticipants)
        } else if self.cohort.is_none() {
            Some(DialoguePhase::CollectingCohort)
        } else if self.scenario_ids.is_empty() {
            Some(DialoguePhase::CollectingScenarios)
        } else if !present(&self.raw_description) && self.description.is_none() {
            Some(DialoguePhase::CollectingRawDescription)
        } else {
            None
        }
    }

    /// Names of required fields a review cannot start without.
    pub fn missing_for_review(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !present(&self.solution_name) {
            missing.push("solution_name".to_string());
        }
        if self.participants.is_empty() {
            missing.push("participants".to_string());
        }
        if self.cohort.is_none() {
            missing.push("cohort".to_string());
        }
        if self.scenario_ids.is_empty() {
            missing.push("scenario_ids".to_string());
        }
        if self.description.is_none() {
            missing.push("description".to_string());
        }
        missing
    }

    fn missing_for_refinement(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !present(&self.raw_description) {
            missing.push("raw_description".to_string());
        }
        if self.scenario_ids.is_empty() {
            missing.push("scenario_ids".to_string());
        }
        missing
    }

    /// Overwrite every field the patch carries.
    pub fn apply_patch(&mut self, patch: DraftPatch) {
        if let Some(name) = patch.solution_name {
            self.solution_name = Some(name);
        }
        if let Some(cohort) = patch.cohort {
            self.cohort = Some(cohort);
        }
        if let Some(participants) = patch.participants {
            self.participants = participants;
        }
        if let Some(ids) = patch.scenario_ids {
            self.scenario_ids = ids;
        }
        if let Some(raw) = patch.raw_description {
            self.raw_description = Some(raw);
        }
        if let Some(partial) = patch.description {
            let merged = match self.description.take() {
                Some(current) => merge_description(current, partial),
                None => DescriptionBlock::with_fallbacks(partial),
            };
            self.description = Some(merged);
        }
        if let Some(url) = patch.image_url {
            self.image = Some(ImageReference::url(url));
        }
        if let Some(link) = patch.link {
            self.link = Some(link).filter(|l| !l.trim().is_empty());
        }
    }

    /// Set one field addressed by path. Both the English field names and the
    /// persisted (Portuguese) names are accepted. `null` clears optional fields.
    pub fn set_field(&mut self, path: &str, value: serde_json::Value) -> Result<(), DialogueError> {
        let invalid = |reason: String| DialogueError::InvalidEdit {
            path: path.to_string(),
            reason,
        };
        let as_string = |value: serde_json::Value| -> Result<String, DialogueError> {
            match value {
                serde_json::Value::String(s) => Ok(s),
                other => Err(invalid(format!("expected a string, got {other}"))),
            }
        };

        match path.trim() {
            "solution_name" | "nome_da_solucao" => self.solution_name = Some(as_string(value)?),
            "cohort" | "turma" => {
                self.cohort =
                    Some(serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?)
            }
            "participants" | "participantes" => {
                self.participants =
                    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?
            }
            "scenario_ids" | "cenarios_relacionados" => {
                self.scenario_ids =
                    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?
            }
            "raw_description" => self.raw_description = Some(as_string(value)?),
            "description" | "descricao_refinada" => {
                self.description = Some(
                    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?,
                )
            }
            "description.summary" | "descricao_refinada.resumo" => {
                self.description_mut().summary = as_string(value)?
            }
            "description.problem_solved" | "descricao_refinada.problema_que_resolve" => {
                self.description_mut().problem_solved = as_string(value)?
            }
            "description.how_it_works" | "descricao_refinada.como_funciona" => {
                self.description_mut().how_it_works = as_string(value)?
            }
            "description.relation_to_scenarios" | "descricao_refinada.relacao_com_os_cenarios" => {
                self.description_mut().relation_to_scenarios = as_string(value)?
            }
            "image" | "imagem" => {
                self.image = if value.is_null() {
                    None
                } else {
                    Some(serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?)
                }
            }
            "image.url" | "imagem.url" => {
                self.image = Some(ImageReference::url(as_string(value)?))
            }
            "link" | "link_solucao" => {
                self.link = if value.is_null() {
                    None
                } else {
                    Some(as_string(value)?).filter(|l| !l.trim().is_empty())
                }
            }
            other => return Err(invalid(format!("unknown field path '{other}'"))),
        }
        Ok(())
    }

    fn description_mut(&mut self) -> &mut DescriptionBlock {
        self.description.get_or_insert_with(DescriptionBlock::placeholder)
    }

    /// The draft as a submission payload. Missing fields become empty values
    /// so that validation reports them.
    pub fn to_payload(&self) -> Option<SolutionPayload> {
        Some(SolutionPayload {
            solution_name: self.solution_name.clone().unwrap_or_default(),
            cohort: self.cohort?,
            participants: self.participants.clone(),
            scenario_ids: self.scenario_ids.clone(),
            description: self.description.clone()?,
            image: self.image.clone().unwrap_or_default(),
            link: self.link.clone(),
        })
    }
}

fn merge_description(current: DescriptionBlock, partial: PartialDescription) -> DescriptionBlock {
    let keep = |new: Option<String>, old: String| match new {
        Some(v) if !v.trim().is_empty() => v,
        _ => old,
    };
    DescriptionBlock {
        summary: keep(partial.summary, current.summary),
        problem_solved: keep(partial.problem_solved, current.problem_solved),
        how_it_works: keep(partial.how_it_works, current.how_it_works),
        relation_to_scenarios: keep(partial.relation_to_scenarios, current.relation_to_scenarios),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogueError {
    #[error("cannot {action}: missing {}", .missing.join(", "))]
    Incomplete {
        action: &'static str,
        missing: Vec<String>,
    },
    #[error("cannot {action} while {phase:?}")]
    PhaseConflict {
        action: &'static str,
        phase: DialoguePhase,
    },
    #[error("the draft has not been confirmed by a participant")]
    AwaitingConfirmation,
    #[error("this dialogue already registered solution {solution_id}")]
    AlreadySubmitted { solution_id: Uuid },
    #[error("invalid edit of '{path}': {reason}")]
    InvalidEdit { path: String, reason: String },
}

/// What refinement needs from the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementRequest {
    pub raw_text: String,
    pub scenario_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Collecting,
    Refining { resume: ResumeStage },
    Reviewing,
    Confirmed,
    Submitted { solution_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeStage {
    Collecting,
    Reviewing,
}

/// Result of a human confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The draft moved from review to confirmed.
    Confirmed,
    /// It was already confirmed and nothing changed since.
    AlreadyConfirmed,
}

/// One registration dialogue: the draft plus where it stands.
#[derive(Debug, Clone)]
pub struct Dialogue {
    draft: Draft,
    stage: Stage,
    updated_at: DateTime<Utc>,
}

impl Default for Dialogue {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialogue {
    pub fn new() -> Self {
        Self {
            draft: Draft::default(),
            stage: Stage::Collecting,
            updated_at: Utc::now(),
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn phase(&self) -> DialoguePhase {
        match &self.stage {
            Stage::Collecting => self
                .draft
                .next_missing()
                .unwrap_or(DialoguePhase::CollectingRawDescription),
            Stage::Refining { .. } => DialoguePhase::Refining,
            Stage::Reviewing => DialoguePhase::Reviewing,
            Stage::Confirmed => DialoguePhase::Confirmed,
            Stage::Submitted { .. } => DialoguePhase::Submitted,
        }
    }

    /// Whether every collected field refinement needs is present.
    pub fn ready_for_refinement(&self) -> bool {
        self.draft.missing_for_refinement().is_empty()
    }

    pub fn submitted_solution(&self) -> Option<Uuid> {
        match self.stage {
            Stage::Submitted { solution_id } => Some(solution_id),
            _ => None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Guard shared by every draft mutation. A confirmed draft that changes
    /// loses its confirmation and goes back to review.
    fn before_mutation(&mut self, action: &'static str) -> Result<(), DialogueError> {
        match self.stage {
            Stage::Collecting | Stage::Reviewing => Ok(()),
            Stage::Confirmed => {
                self.stage = Stage::Reviewing;
                Ok(())
            }
            Stage::Refining { .. } => Err(DialogueError::PhaseConflict {
                action,
                phase: DialoguePhase::Refining,
            }),
            Stage::Submitted { solution_id } => {
                Err(DialogueError::AlreadySubmitted { solution_id })
            }
        }
    }

    /// Merge fields collected by the agent, in any order.
    pub fn update(&mut self, patch: DraftPatch) -> Result<(), DialogueError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.before_mutation("update the draft")?;
        self.draft.apply_patch(patch);
        self.touch();
        Ok(())
    }

    /// `applyEdit(draft, fieldPath, newValue)`.
    pub fn apply_edit(
        &mut self,
        path: &str,
        value: serde_json::Value,
    ) -> Result<&Draft, DialogueError> {
        let mut edited = self.draft.clone();
        edited.set_field(path, value)?;
        self.before_mutation("edit the draft")?;
        self.draft = edited;
        self.touch();
        Ok(&self.draft)
    }

    /// Enter `REFINING`. Requires raw text and at least one scenario.
    pub fn begin_refinement(&mut self) -> Result<RefinementRequest, DialogueError> {
        let resume = match self.stage {
            Stage::Collecting => ResumeStage::Collecting,
            Stage::Reviewing | Stage::Confirmed => ResumeStage::Reviewing,
            Stage::Refining { .. } => {
                return Err(DialogueError::PhaseConflict {
                    action: "refine",
                    phase: DialoguePhase::Refining,
                });
            }
            Stage::Submitted { solution_id } => {
                return Err(DialogueError::AlreadySubmitted { solution_id });
            }
        };
        let missing = self.draft.missing_for_refinement();
        if !missing.is_empty() {
            return Err(DialogueError::Incomplete {
                action: "refine",
                missing,
            });
        }
        self.stage = Stage::Refining { resume };
        self.touch();
        Ok(RefinementRequest {
            raw_text: self.draft.raw_description.clone().unwrap_or_default(),
            scenario_ids: self.draft.scenario_ids.clone(),
        })
    }

    /// Refinement produced a description: store it and move to review.
    pub fn complete_refinement(
        &mut self,
        description: DescriptionBlock,
    ) -> Result<(), DialogueError> {
        if !matches!(self.stage, Stage::Refining { .. }) {
            return Err(DialogueError::PhaseConflict {
                action: "complete refinement",
                phase: self.phase(),
            });
        }
        self.draft.description = Some(description);
        self.stage = Stage::Reviewing;
        self.touch();
        Ok(())
    }

    /// Refinement failed: return to the pre-refinement state, draft intact.
    pub fn abort_refinement(&mut self) {
        if let Stage::Refining { resume } = self.stage {
            self.stage = match resume {
                ResumeStage::Collecting => Stage::Collecting,
                ResumeStage::Reviewing => Stage::Reviewing,
            };
            self.touch();
        }
    }

    /// `presentForReview(draft)`: the draft must be complete enough to submit.
    pub fn present_for_review(&mut self) -> Result<&Draft, DialogueError> {
        match self.stage {
            Stage::Collecting | Stage::Reviewing | Stage::Confirmed => {}
            Stage::Refining { .. } => {
                return Err(DialogueError::PhaseConflict {
                    action: "present the draft for review",
                    phase: DialoguePhase::Refining,
                });
            }
            Stage::Submitted { solution_id } => {
                return Err(DialogueError::AlreadySubmitted { solution_id });
            }
        }
        let missing = self.draft.missing_for_review();
        if !missing.is_empty() {
            return Err(DialogueError::Incomplete {
                action: "present the draft for review",
                missing,
            });
        }
        if self.stage == Stage::Collecting {
            self.stage = Stage::Reviewing;
            self.touch();
        }
        Ok(&self.draft)
    }

    /// Explicit human affirmation. There is no code path from an agent tool
    /// call to this method.
    pub fn confirm(&mut self) -> Result<Confirmation, DialogueError> {
        match self.stage {
            Stage::Reviewing => {
                self.stage = Stage::Confirmed;
                self.touch();
                Ok(Confirmation::Confirmed)
            }
            Stage::Confirmed => Ok(Confirmation::AlreadyConfirmed),
            Stage::Submitted { solution_id } => {
                Err(DialogueError::AlreadySubmitted { solution_id })
            }
            Stage::Collecting | Stage::Refining { .. } => Err(DialogueError::PhaseConflict {
                action: "confirm",
                phase: self.phase(),
            }),
        }
    }

    /// The payload for the single submission a confirmation allows.
    pub fn begin_submission(&self) -> Result<SolutionPayload, DialogueError> {
        match self.stage {
            Stage::Confirmed => {}
            Stage::Submitted { solution_id } => {
                return Err(DialogueError::AlreadySubmitted { solution_id });
            }
            _ => return Err(DialogueError::AwaitingConfirmation),
        }
        self.draft.to_payload().ok_or_else(|| DialogueError::Incomplete {
            action: "submit",
            missing: self.draft.missing_for_review(),
        })
    }

    /// The store rejected the payload: the confirmation no longer stands.
    pub fn reject_submission(&mut self) {
        if self.stage == Stage::Confirmed {
            self.stage = Stage::Reviewing;
            self.touch();
        }
    }

    /// Enter `SUBMITTED` and discard the draft.
    pub fn complete_submission(&mut self, solution_id: Uuid) -> Result<(), DialogueError> {
        match self.stage {
            Stage::Confirmed => {
                self.stage = Stage::Submitted { solution_id };
                self.draft = Draft::default();
                self.touch();
                Ok(())
            }
            Stage::Submitted { solution_id } => {
                Err(DialogueError::AlreadySubmitted { solution_id })
            }
            _ => Err(DialogueError::AwaitingConfirmation),
        }
    }
}

/// Who produced a turn in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Model,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}
