//! Dialogue sessions: one registration conversation per session object.
//!
//! Each session lives behind its own async mutex so a session handles one
//! request at a time while different sessions never contend. The agent only
//! ever proposes operations; confirmation comes exclusively from
//! [`Orchestrator::confirm`], which the human calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use utoipa::ToSchema;
use uuid::Uuid;

use portal_core::dialogue::{
    ChatTurn, Confirmation, Dialogue, DialogueError, DialoguePhase, Draft, TurnRole,
};
use portal_core::solutions::{Solution, SubmitterRole};
use portal_core::tools::{DraftPatch, RawToolCall, RefineArgs, ToolInvocation};

use crate::error::AppError;
use crate::genai::{ConversationRequest, GenerativeAgent};
use crate::refinement;
use crate::registration::Registrar;

pub struct DialogueSession {
    pub id: Uuid,
    pub role: SubmitterRole,
    pub dialogue: Dialogue,
    pub history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
    /// The record this session registered, once it has.
    pub submitted: Option<Solution>,
}

impl DialogueSession {
    pub fn new(role: SubmitterRole) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            dialogue: Dialogue::new(),
            history: Vec::new(),
            created_at: Utc::now(),
            submitted: None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            phase: self.dialogue.phase(),
            role: self.role,
            draft: self.dialogue.draft().clone(),
            history: self.history.clone(),
            solution: self.submitted.clone(),
            created_at: self.created_at,
            updated_at: self.dialogue.updated_at(),
        }
    }

    fn record_tool(&mut self, tool: &str, message: &str) {
        self.history
            .push(ChatTurn::new(TurnRole::Tool, format!("{tool}: {message}")));
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub phase: DialoguePhase,
    pub role: SubmitterRole,
    pub draft: Draft,
    pub history: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What became of one tool call the agent requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Applied,
    Rejected,
    AwaitingConfirmation,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolNotice {
    pub tool: String,
    pub outcome: ToolOutcome,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TurnOutcome {
    /// The agent's text for the participant
    pub reply: String,
    pub notices: Vec<ToolNotice>,
    pub session: SessionView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmOutcome {
    pub solution: Solution,
    /// True when this session had already registered the solution and
    /// nothing new was written.
    pub already_submitted: bool,
    pub session: SessionView,
}

// --- Registry ---

struct Entry {
    session: Arc<AsyncMutex<DialogueSession>>,
    last_seen: Instant,
}

/// Live sessions keyed by id. Sessions idle longer than the TTL are dropped.
pub struct SessionRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self, role: SubmitterRole) -> (Uuid, Arc<AsyncMutex<DialogueSession>>) {
        let session = DialogueSession::new(role);
        let id = session.id;
        let shared = Arc::new(AsyncMutex::new(session));

        let mut entries = self.lock();
        let evicted = Self::evict(&mut entries, self.ttl);
        entries.insert(
            id,
            Entry {
                session: Arc::clone(&shared),
                last_seen: Instant::now(),
            },
        );
        tracing::info!(
            session_id = %id,
            role = ?role,
            evicted,
            live = entries.len(),
            "dialogue session started"
        );
        (id, shared)
    }

    /// Look up a live session and mark it as seen.
    pub fn get(&self, id: Uuid) -> Option<Arc<AsyncMutex<DialogueSession>>> {
        let mut entries = self.lock();
        Self::evict(&mut entries, self.ttl);
        let entry = entries.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Abandon a session. Its draft is discarded and nothing is persisted.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "dialogue session abandoned");
        }
        removed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn evict(entries: &mut HashMap<Uuid, Entry>, ttl: Duration) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - entries.len()
    }
}

// --- Orchestration ---

const SYSTEM_INSTRUCTION: &str = "\
Você é o assistente de cadastro de soluções de um curso de design especulativo. \
Conduza uma conversa curta, em português, para coletar: nome da solução, \
participantes (nome completo e email de cada um), turma (A ou B), cenários \
relacionados do catálogo da turma e uma descrição livre da solução. Os dados \
podem chegar em qualquer ordem; pergunte apenas pelo que falta. \
Quando houver descrição livre e ao menos um cenário, chame refine_description. \
Para mostrar o rascunho, chame present_for_review com todos os campos coletados. \
Nunca considere o rascunho confirmado por conta própria: a confirmação é feita \
por um participante na interface. Só chame submit_solution depois disso.";

fn system_instruction(session: &DialogueSession) -> String {
    let draft = serde_json::to_string(session.dialogue.draft()).unwrap_or_default();
    format!(
        "{SYSTEM_INSTRUCTION}\n\nFase atual: {}\nRascunho atual: {draft}",
        serde_json::to_string(&session.dialogue.phase()).unwrap_or_default()
    )
}

/// The external capabilities a dialogue turn may call out to.
#[derive(Clone, Copy)]
pub struct Orchestrator<'a> {
    pub agent: &'a dyn GenerativeAgent,
    pub registrar: Registrar<'a>,
}

impl Orchestrator<'_> {
    /// One user turn: ask the agent, then run every operation it requested.
    /// Nothing is recorded when the agent itself is unreachable, so the same
    /// message can be sent again.
    pub async fn handle_message(
        &self,
        session: &mut DialogueSession,
        message: &str,
    ) -> Result<TurnOutcome, AppError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation {
                message: "message must not be empty".to_string(),
                field: Some("message".to_string()),
                received: None,
                docs_hint: None,
            });
        }

        let reply = self
            .agent
            .converse(ConversationRequest {
                system_instruction: system_instruction(session),
                history: &session.history,
                message,
            })
            .await
            .map_err(|e| AppError::ConversationUnavailable {
                reason: e.to_string(),
            })?;

        session.history.push(ChatTurn::new(TurnRole::User, message));
        if !reply.text.trim().is_empty() {
            session
                .history
                .push(ChatTurn::new(TurnRole::Model, reply.text.clone()));
        }

        let mut notices = Vec::with_capacity(reply.tool_calls.len());
        for call in &reply.tool_calls {
            let notice = self.dispatch(session, call).await;
            session.record_tool(&notice.tool, &notice.message);
            notices.push(notice);
        }

        tracing::debug!(
            session_id = %session.id,
            phase = ?session.dialogue.phase(),
            tools = notices.len(),
            "dialogue turn handled"
        );
        Ok(TurnOutcome {
            reply: reply.text,
            notices,
            session: session.view(),
        })
    }

    async fn dispatch(&self, session: &mut DialogueSession, call: &RawToolCall) -> ToolNotice {
        let invocation = match ToolInvocation::parse(call) {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    tool = %call.name,
                    error = %e,
                    "tool call rejected"
                );
                return ToolNotice {
                    tool: call.name.clone(),
                    outcome: ToolOutcome::Rejected,
                    message: e.to_string(),
                };
            }
        };

        let tool = invocation.name();
        tracing::info!(
            session_id = %session.id,
            tool,
            phase = ?session.dialogue.phase(),
            "dispatching tool"
        );
        let (outcome, message) = match invocation {
            ToolInvocation::Refine(args) => self.run_refinement(session, args).await,
            ToolInvocation::PresentForReview(patch) => Self::run_review(session, patch),
            ToolInvocation::Submit => self.run_agent_submit(session).await,
        };
        ToolNotice {
            tool: tool.to_string(),
            outcome,
            message,
        }
    }

    async fn run_refinement(
        &self,
        session: &mut DialogueSession,
        args: RefineArgs,
    ) -> (ToolOutcome, String) {
        // Arguments that could never refine must not reach the draft.
        if let Err(issues) =
            refinement::check_inputs(&args.raw_text, &args.scenario_ids, self.registrar.catalog)
        {
            return (
                ToolOutcome::Rejected,
                AppError::ValidationFailed { issues }.to_string(),
            );
        }
        let patch = DraftPatch {
            raw_description: Some(args.raw_text),
            scenario_ids: Some(args.scenario_ids),
            ..DraftPatch::default()
        };
        if let Err(e) = session.dialogue.update(patch) {
            return (ToolOutcome::Rejected, e.to_string());
        }
        match self.refine_draft(session).await {
            Ok(()) => (
                ToolOutcome::Applied,
                "description refined; the draft is ready for review".to_string(),
            ),
            Err(e @ AppError::RefinementUnavailable { .. }) => {
                (ToolOutcome::Unavailable, e.to_string())
            }
            Err(e) => (ToolOutcome::Rejected, e.to_string()),
        }
    }

    /// Refine the draft's raw description. On any failure the dialogue is
    /// back where it was before refinement started.
    pub async fn refine_draft(&self, session: &mut DialogueSession) -> Result<(), AppError> {
        let request = session.dialogue.begin_refinement()?;
        let result = refinement::refine(
            self.agent,
            self.registrar.catalog,
            &request.raw_text,
            &request.scenario_ids,
        )
        .await;

        match result {
            Ok(block) => {
                session.dialogue.complete_refinement(block)?;
                tracing::info!(
                    session_id = %session.id,
                    phase = ?session.dialogue.phase(),
                    "draft refined"
                );
                Ok(())
            }
            Err(e) => {
                session.dialogue.abort_refinement();
                Err(e)
            }
        }
    }

    fn run_review(session: &mut DialogueSession, patch: DraftPatch) -> (ToolOutcome, String) {
        let result = session
            .dialogue
            .update(patch)
            .and_then(|()| session.dialogue.present_for_review().map(|_| ()));
        match result {
            Ok(()) => (
                ToolOutcome::Applied,
                "draft presented for review; waiting for a participant to confirm".to_string(),
            ),
            Err(e) => (ToolOutcome::Rejected, e.to_string()),
        }
    }

    async fn run_agent_submit(&self, session: &mut DialogueSession) -> (ToolOutcome, String) {
        if let Some(solution) = &session.submitted {
            return (
                ToolOutcome::Rejected,
                format!("solution {} was already registered", solution.id),
            );
        }
        if session.dialogue.phase() != DialoguePhase::Confirmed {
            return (
                ToolOutcome::AwaitingConfirmation,
                DialogueError::AwaitingConfirmation.to_string(),
            );
        }
        match self.submit_confirmed(session).await {
            Ok(solution) => (
                ToolOutcome::Applied,
                format!("solution {} registered", solution.id),
            ),
            Err(e @ AppError::SubmissionUnavailable { .. }) => {
                (ToolOutcome::Unavailable, e.to_string())
            }
            Err(e) => (ToolOutcome::Rejected, e.to_string()),
        }
    }

    /// `presentForReview(draft)` initiated by the human.
    pub fn present(&self, session: &mut DialogueSession) -> Result<SessionView, AppError> {
        session.dialogue.present_for_review()?;
        Ok(session.view())
    }

    /// `applyEdit(draft, fieldPath, newValue)`.
    pub fn edit(
        &self,
        session: &mut DialogueSession,
        path: &str,
        value: serde_json::Value,
    ) -> Result<SessionView, AppError> {
        session.dialogue.apply_edit(path, value)?;
        tracing::debug!(
            session_id = %session.id,
            path,
            phase = ?session.dialogue.phase(),
            "draft edited"
        );
        Ok(session.view())
    }

    /// Human confirmation. Triggers the one submission this dialogue makes;
    /// repeating it after success returns the same record.
    pub async fn confirm(&self, session: &mut DialogueSession) -> Result<ConfirmOutcome, AppError> {
        if let Some(solution) = session.submitted.clone() {
            return Ok(ConfirmOutcome {
                solution,
                already_submitted: true,
                session: session.view(),
            });
        }

        if session.dialogue.confirm()? == Confirmation::Confirmed {
            tracing::info!(session_id = %session.id, "draft confirmed by participant");
        }
        let solution = self.submit_confirmed(session).await?;
        Ok(ConfirmOutcome {
            solution,
            already_submitted: false,
            session: session.view(),
        })
    }

    async fn submit_confirmed(&self, session: &mut DialogueSession) -> Result<Solution, AppError> {
        let payload = session.dialogue.begin_submission()?;
        match self.registrar.submit(payload, session.role).await {
            Ok(solution) => {
                session.dialogue.complete_submission(solution.id)?;
                session.submitted = Some(solution.clone());
                session.record_tool(
                    "submit_solution",
                    &format!("solution {} registered", solution.id),
                );
                tracing::info!(
                    session_id = %session.id,
                    solution_id = %solution.id,
                    "dialogue submitted"
                );
                Ok(solution)
            }
            Err(e @ AppError::ValidationFailed { .. }) => {
                session.dialogue.reject_submission();
                Err(e)
            }
            // Store unavailable: stay confirmed so the same confirmation can be retried.
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use portal_core::scenarios::ScenarioCatalog;
    use portal_core::solutions::PartialDescription;
    use portal_core::tools::{PRESENT_FOR_REVIEW_TOOL, REFINE_TOOL, SUBMIT_TOOL};

    use super::*;
    use crate::genai::GenAiError;
    use crate::genai::tests::ScriptedAgent;
    use crate::store::tests::FailingStore;
    use crate::store::{MemorySolutionStore, SolutionStore};

    fn orchestrator<'a>(
        agent: &'a ScriptedAgent,
        store: &'a dyn SolutionStore,
    ) -> Orchestrator<'a> {
        Orchestrator {
            agent,
            registrar: Registrar {
                store,
                catalog: ScenarioCatalog::builtin(),
                timeout: Duration::from_secs(5),
            },
        }
    }

    fn call(name: &str, args: serde_json::Value) -> RawToolCall {
        RawToolCall {
            name: name.to_string(),
            args,
        }
    }

    fn collected_fields() -> RawToolCall {
        call(
            PRESENT_FOR_REVIEW_TOOL,
            json!({
                "solution_name": "Solar Kiosk",
                "cohort": "A",
                "participants": [{"nome_completo": "Ana Silva", "email": "ana@x.com"}],
                "scenario_ids": ["CENARIO_A1"]
            }),
        )
    }

    fn refine_call() -> RawToolCall {
        call(
            REFINE_TOOL,
            json!({
                "raw_text": "um quiosque que recarrega celulares com energia solar",
                "scenario_ids": ["CENARIO_A1"]
            }),
        )
    }

    fn refined() -> PartialDescription {
        PartialDescription {
            summary: Some("Quiosque solar".to_string()),
            problem_solved: Some("Falta de energia".to_string()),
            how_it_works: Some("Painéis e baterias".to_string()),
            relation_to_scenarios: Some("Cidades em expansão".to_string()),
        }
    }

    /// Agent that collects every field, refines, then presents for review.
    fn happy_agent() -> ScriptedAgent {
        ScriptedAgent::default()
            .reply("Anotado.", vec![collected_fields()])
            .reply("Vou refinar a descrição.", vec![refine_call()])
            .refinement(Ok(refined()))
    }

    #[tokio::test]
    async fn guided_flow_reaches_review_and_submits_on_confirmation() {
        let agent = happy_agent();
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        let first = o.handle_message(&mut session, "Somos Ana, projeto Solar Kiosk").await.unwrap();
        // The review attempt is rejected because the description is not refined yet.
        assert_eq!(first.notices[0].outcome, ToolOutcome::Rejected);
        assert_eq!(first.session.phase, DialoguePhase::CollectingRawDescription);

        let second = o.handle_message(&mut session, "É um quiosque solar").await.unwrap();
        assert_eq!(second.notices[0].outcome, ToolOutcome::Applied);
        assert_eq!(second.session.phase, DialoguePhase::Reviewing);
        assert_eq!(store.len(), 0);

        let confirmed = o.confirm(&mut session).await.unwrap();
        assert!(!confirmed.already_submitted);
        assert_eq!(confirmed.session.phase, DialoguePhase::Submitted);
        assert_eq!(confirmed.solution.solution_name, "Solar Kiosk");
        assert_eq!(store.len(), 1);

        let again = o.confirm(&mut session).await.unwrap();
        assert!(again.already_submitted);
        assert_eq!(again.solution.id, confirmed.solution.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn agent_cannot_submit_without_human_confirmation() {
        let agent = happy_agent().reply("Pronto, enviando!", vec![call(SUBMIT_TOOL, json!({}))]);
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        o.handle_message(&mut session, "dados").await.unwrap();
        o.handle_message(&mut session, "descrição").await.unwrap();
        let turn = o.handle_message(&mut session, "pode enviar").await.unwrap();

        assert_eq!(turn.notices[0].outcome, ToolOutcome::AwaitingConfirmation);
        assert_eq!(turn.session.phase, DialoguePhase::Reviewing);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn refine_with_unknown_scenario_leaves_the_draft_alone() {
        let bad_refine = call(
            REFINE_TOOL,
            json!({"raw_text": "outra ideia", "scenario_ids": ["CENARIO_X"]}),
        );
        let agent = ScriptedAgent::default()
            .reply("Anotado.", vec![collected_fields()])
            .reply("Vou refinar.", vec![bad_refine]);
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        o.handle_message(&mut session, "dados").await.unwrap();
        let before = session.dialogue.draft().clone();
        let turn = o.handle_message(&mut session, "refine").await.unwrap();

        assert_eq!(turn.notices[0].outcome, ToolOutcome::Rejected);
        assert!(turn.notices[0].message.contains("unknown scenario 'CENARIO_X'"));
        assert!(!turn.notices[0].message.contains("ValidationFailed"));
        assert_eq!(session.dialogue.draft(), &before);
        assert_eq!(session.dialogue.draft().scenario_ids, vec!["CENARIO_A1"]);
        assert_eq!(session.dialogue.draft().raw_description, None);
    }

    #[tokio::test]
    async fn agent_submit_after_confirmation_is_the_single_write() {
        let agent = happy_agent().reply("Enviando.", vec![call(SUBMIT_TOOL, json!(null))]);
        let store = FailingStore::default();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        o.handle_message(&mut session, "dados").await.unwrap();
        o.handle_message(&mut session, "descrição").await.unwrap();
        assert!(matches!(
            o.confirm(&mut session).await,
            Err(AppError::SubmissionUnavailable { .. })
        ));
        assert_eq!(session.dialogue.phase(), DialoguePhase::Confirmed);

        let turn = o.handle_message(&mut session, "tente de novo").await.unwrap();
        assert_eq!(turn.notices[0].outcome, ToolOutcome::Unavailable);
        assert!(store.called.load(Ordering::SeqCst));
        assert_eq!(session.dialogue.phase(), DialoguePhase::Confirmed);
        assert_eq!(
            session.dialogue.draft().solution_name.as_deref(),
            Some("Solar Kiosk")
        );
    }

    #[tokio::test]
    async fn unknown_tools_are_rejected_and_recorded() {
        let agent = ScriptedAgent::default().reply(
            "Confirmado!",
            vec![call("confirm_registration", json!({}))],
        );
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        let turn = o.handle_message(&mut session, "oi").await.unwrap();
        assert_eq!(turn.notices[0].outcome, ToolOutcome::Rejected);
        assert!(turn.notices[0].message.contains("unknown tool"));
        let roles: Vec<TurnRole> = session.history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Model, TurnRole::Tool]);
    }

    #[tokio::test]
    async fn failed_conversation_records_nothing() {
        let agent = ScriptedAgent::default()
            .reply_error(GenAiError::Timeout(Duration::from_secs(30)))
            .reply("Olá!", vec![]);
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        assert!(matches!(
            o.handle_message(&mut session, "oi").await,
            Err(AppError::ConversationUnavailable { .. })
        ));
        assert!(session.history.is_empty());

        o.handle_message(&mut session, "oi").await.unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(*agent.seen_history_lengths.lock().unwrap(), vec![0, 0]);
        assert_eq!(*agent.seen_messages.lock().unwrap(), vec!["oi", "oi"]);
    }

    #[tokio::test]
    async fn refinement_failure_keeps_collected_fields() {
        let agent = ScriptedAgent::default()
            .reply("Anotado.", vec![collected_fields()])
            .reply("Refinando.", vec![refine_call()])
            .refinement(Err(GenAiError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }));
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);

        o.handle_message(&mut session, "dados").await.unwrap();
        let turn = o.handle_message(&mut session, "descrição").await.unwrap();
        assert_eq!(turn.notices[0].outcome, ToolOutcome::Unavailable);
        assert_eq!(turn.session.phase, DialoguePhase::CollectingRawDescription);
        assert!(session.dialogue.ready_for_refinement());
        assert_eq!(session.dialogue.draft().participants.len(), 1);
    }

    #[tokio::test]
    async fn confirm_before_review_is_a_conflict() {
        let agent = ScriptedAgent::default();
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);
        assert!(matches!(
            o.confirm(&mut session).await,
            Err(AppError::PhaseConflict { .. })
        ));
        assert!(matches!(o.present(&mut session), Err(AppError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn edits_during_review_reach_the_stored_record() {
        let agent = happy_agent();
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);
        o.handle_message(&mut session, "dados").await.unwrap();
        o.handle_message(&mut session, "descrição").await.unwrap();

        o.edit(&mut session, "descricao_refinada.resumo", json!("Quiosque de recarga"))
            .unwrap();
        assert!(matches!(
            o.edit(&mut session, "turma", json!("Z")),
            Err(AppError::Validation { .. })
        ));
        let outcome = o.confirm(&mut session).await.unwrap();
        assert_eq!(outcome.solution.description.summary, "Quiosque de recarga");
    }

    #[tokio::test]
    async fn cross_cohort_draft_is_sent_back_to_review() {
        let agent = happy_agent();
        let store = MemorySolutionStore::new();
        let o = orchestrator(&agent, &store);
        let mut session = DialogueSession::new(SubmitterRole::Student);
        o.handle_message(&mut session, "dados").await.unwrap();
        o.handle_message(&mut session, "descrição").await.unwrap();
        o.edit(&mut session, "turma", json!("B")).unwrap();

        assert!(matches!(
            o.confirm(&mut session).await,
            Err(AppError::ValidationFailed { .. })
        ));
        assert_eq!(session.dialogue.phase(), DialoguePhase::Reviewing);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn registry_isolates_and_expires_sessions() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let (a, _) = registry.create(SubmitterRole::Student);
        let (b, _) = registry.create(SubmitterRole::Professor);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(a));
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());

        let expiring = SessionRegistry::new(Duration::ZERO);
        let (c, _) = expiring.create(SubmitterRole::Student);
        assert!(expiring.get(c).is_none());
        assert_eq!(expiring.len(), 0);
    }
}
