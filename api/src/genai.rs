//! Client for the external generative capability.
//!
//! Two operations are consumed: `converse`, a function-calling chat turn, and
//! `refine`, a structured rewrite of free text into the four description
//! fields. Both go through [`GenerativeAgent`] so the dialogue can run against
//! a scripted agent in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use portal_core::dialogue::{ChatTurn, TurnRole};
use portal_core::scenarios::Scenario;
use portal_core::solutions::PartialDescription;
use portal_core::tools::{PRESENT_FOR_REVIEW_TOOL, REFINE_TOOL, RawToolCall, SUBMIT_TOOL};

use crate::config::Settings;

#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("generative API key is not configured")]
    NotConfigured,
    #[error("request to generative API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generative API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generative API call timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected generative API response: {0}")]
    Malformed(String),
}

/// Everything one conversational turn needs.
#[derive(Debug, Clone)]
pub struct ConversationRequest<'a> {
    pub system_instruction: String,
    pub history: &'a [ChatTurn],
    pub message: &'a str,
}

/// The agent's answer: text for the participant plus any operations it wants run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
}

#[async_trait]
pub trait GenerativeAgent: Send + Sync {
    /// Model identifier, reported in `/v1/system/config`.
    fn model_id(&self) -> &str;

    async fn converse(&self, request: ConversationRequest<'_>) -> Result<AgentReply, GenAiError>;

    /// Rewrite `raw_text` into description fields. Fields the model could not
    /// produce are left `None` for the caller to fill.
    async fn refine(
        &self,
        raw_text: &str,
        scenarios: &[Scenario],
    ) -> Result<PartialDescription, GenAiError>;
}

/// Google Gemini `generateContent` over REST.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, GenAiError> {
        let http = reqwest::Client::builder().timeout(settings.genai_timeout).build()?;
        Ok(Self {
            http,
            base_url: settings.genai_base_url.clone(),
            model: settings.genai_model.clone(),
            api_key: settings.genai_api_key.clone(),
            timeout: settings.genai_timeout,
        })
    }

    async fn generate(&self, body: Value) -> Result<GenerateContentResponse, GenAiError> {
        let api_key = self.api_key.as_deref().ok_or(GenAiError::NotConfigured)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let call = async {
            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenAiError::Status {
                    status: status.as_u16(),
                    body: truncate(&body, 500),
                });
            }
            response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|e| GenAiError::Malformed(e.to_string()))
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GenAiError::Timeout(self.timeout))?
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl GenerativeAgent for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn converse(&self, request: ConversationRequest<'_>) -> Result<AgentReply, GenAiError> {
        let started = std::time::Instant::now();
        let response = self.generate(conversation_body(&request)).await?;
        let reply = response.into_reply()?;
        tracing::debug!(
            model = %self.model,
            tool_calls = reply.tool_calls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "converse completed"
        );
        Ok(reply)
    }

    async fn refine(
        &self,
        raw_text: &str,
        scenarios: &[Scenario],
    ) -> Result<PartialDescription, GenAiError> {
        let response = self.generate(refinement_body(raw_text, scenarios)).await?;
        let text = response.into_reply()?.text;
        parse_refinement(&text)
    }
}

fn role_name(role: TurnRole) -> &'static str {
    match role {
        TurnRole::Model => "model",
        TurnRole::User | TurnRole::Tool => "user",
    }
}

fn turn_text(turn: &ChatTurn) -> String {
    match turn.role {
        TurnRole::Tool => format!("[resultado de ferramenta] {}", turn.text),
        TurnRole::User | TurnRole::Model => turn.text.clone(),
    }
}

fn conversation_body(request: &ConversationRequest<'_>) -> Value {
    let mut contents: Vec<Value> = request
        .history
        .iter()
        .map(|turn| json!({"role": role_name(turn.role), "parts": [{"text": turn_text(turn)}]}))
        .collect();
    contents.push(json!({"role": "user", "parts": [{"text": request.message}]}));

    json!({
        "systemInstruction": {"parts": [{"text": request.system_instruction}]},
        "contents": contents,
        "tools": [{"functionDeclarations": function_declarations()}],
    })
}

/// Schemas of the three operations the agent may call.
pub fn function_declarations() -> Value {
    let participant = json!({
        "type": "OBJECT",
        "properties": {
            "nome_completo": {"type": "STRING"},
            "email": {"type": "STRING"}
        },
        "required": ["nome_completo", "email"]
    });
    let description = json!({
        "type": "OBJECT",
        "properties": {
            "resumo": {"type": "STRING"},
            "problema_que_resolve": {"type": "STRING"},
            "como_funciona": {"type": "STRING"},
            "relacao_com_os_cenarios": {"type": "STRING"}
        }
    });

    json!([
        {
            "name": REFINE_TOOL,
            "description": "Transforma a descrição livre da solução nos quatro campos estruturados. Chame somente quando já houver descrição livre e pelo menos um cenário escolhido.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "raw_text": {"type": "STRING", "description": "Descrição livre escrita pelos participantes"},
                    "scenario_ids": {"type": "ARRAY", "items": {"type": "STRING"}}
                },
                "required": ["raw_text", "scenario_ids"]
            }
        },
        {
            "name": PRESENT_FOR_REVIEW_TOOL,
            "description": "Apresenta o rascunho completo para revisão humana. Envie todos os campos coletados.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "solution_name": {"type": "STRING"},
                    "cohort": {"type": "STRING", "enum": ["A", "B"]},
                    "participants": {"type": "ARRAY", "items": participant},
                    "scenario_ids": {"type": "ARRAY", "items": {"type": "STRING"}},
                    "raw_description": {"type": "STRING"},
                    "description": description,
                    "image_url": {"type": "STRING"},
                    "link": {"type": "STRING"}
                }
            }
        },
        {
            "name": SUBMIT_TOOL,
            "description": "Registra a solução. Só tem efeito depois que um participante confirmou o rascunho na interface; nunca confirme por conta própria.",
            "parameters": {"type": "OBJECT", "properties": {}}
        }
    ])
}

fn refinement_body(raw_text: &str, scenarios: &[Scenario]) -> Value {
    let context: Vec<String> = scenarios
        .iter()
        .map(|s| format!("- {} ({}): {}", s.title, s.id, s.description))
        .collect();
    let prompt = format!(
        "Reescreva a descrição de uma solução de design criada por estudantes.\n\
         Cenários relacionados:\n{}\n\n\
         Descrição original:\n{}\n\n\
         Responda apenas com um objeto JSON com as chaves \"resumo\", \
         \"problema_que_resolve\", \"como_funciona\" e \"relacao_com_os_cenarios\", \
         cada uma com um texto curto em português.",
        context.join("\n"),
        raw_text
    );

    json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        "generationConfig": {"responseMimeType": "application/json"},
    })
}

/// Parse the model's JSON answer. Models sometimes wrap JSON in a markdown
/// fence, which is stripped first.
pub fn parse_refinement(text: &str) -> Result<PartialDescription, GenAiError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str::<PartialDescription>(unfenced)
        .map_err(|e| GenAiError::Malformed(format!("refinement is not the expected JSON: {e}")))
}

// --- Wire types of generateContent ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "functionCall", default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

impl GenerateContentResponse {
    fn into_reply(self) -> Result<AgentReply, GenAiError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GenAiError::Malformed("no candidates in response".to_string()))?;

        let Some(content) = candidate.content else {
            return Err(GenAiError::Malformed(format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        };

        let mut reply = AgentReply::default();
        let mut texts = Vec::new();
        for part in content.parts {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                reply.tool_calls.push(RawToolCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }
        reply.text = texts.join("");
        Ok(reply)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Agent that replays canned answers in order and records what it was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedAgent {
        replies: Mutex<VecDeque<Result<AgentReply, GenAiError>>>,
        refinements: Mutex<VecDeque<Result<PartialDescription, GenAiError>>>,
        pub(crate) seen_messages: Mutex<Vec<String>>,
        pub(crate) seen_history_lengths: Mutex<Vec<usize>>,
    }

    impl ScriptedAgent {
        pub(crate) fn reply(self, text: &str, tool_calls: Vec<RawToolCall>) -> Self {
            self.replies.lock().unwrap().push_back(Ok(AgentReply {
                text: text.to_string(),
                tool_calls,
            }));
            self
        }

        pub(crate) fn reply_error(self, error: GenAiError) -> Self {
            self.replies.lock().unwrap().push_back(Err(error));
            self
        }

        pub(crate) fn refinement(self, result: Result<PartialDescription, GenAiError>) -> Self {
            self.refinements.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl GenerativeAgent for ScriptedAgent {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn converse(
            &self,
            request: ConversationRequest<'_>,
        ) -> Result<AgentReply, GenAiError> {
            self.seen_messages
                .lock()
                .unwrap()
                .push(request.message.to_string());
            self.seen_history_lengths
                .lock()
                .unwrap()
                .push(request.history.len());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(AgentReply::default()))
        }

        async fn refine(
            &self,
            _raw_text: &str,
            _scenarios: &[Scenario],
        ) -> Result<PartialDescription, GenAiError> {
            self.refinements
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenAiError::NotConfigured))
        }
    }

    #[test]
    fn reply_collects_text_and_function_calls() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Vou refinar "},
                        {"text": "a descrição."},
                        {"functionCall": {"name": "refine_description", "args": {"raw_text": "x", "scenario_ids": ["CENARIO_A1"]}}}
                    ]
                },
                "finishReason": "STOP"
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let reply = response.into_reply().unwrap();
        assert_eq!(reply.text, "Vou refinar a descrição.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, REFINE_TOOL);
        assert_eq!(reply.tool_calls[0].args["scenario_ids"][0], "CENARIO_A1");
    }

    #[test]
    fn empty_candidates_are_malformed() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            response.into_reply(),
            Err(GenAiError::Malformed(_))
        ));

        let blocked: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        let err = blocked.into_reply().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn refinement_parses_plain_and_fenced_json() {
        let plain = parse_refinement(r#"{"resumo": "r", "como_funciona": "c"}"#).unwrap();
        assert_eq!(plain.summary.as_deref(), Some("r"));
        assert_eq!(plain.how_it_works.as_deref(), Some("c"));
        assert!(plain.problem_solved.is_none());

        let fenced = parse_refinement("```json\n{\"resumo\": \"r\"}\n```").unwrap();
        assert_eq!(fenced.summary.as_deref(), Some("r"));
    }

    #[test]
    fn refinement_rejects_prose() {
        assert!(matches!(
            parse_refinement("Claro! Aqui está o resumo..."),
            Err(GenAiError::Malformed(_))
        ));
    }

    #[test]
    fn conversation_body_maps_roles_and_declares_tools() {
        let history = vec![
            ChatTurn::new(TurnRole::User, "Oi"),
            ChatTurn::new(TurnRole::Model, "Qual o nome da solução?"),
            ChatTurn::new(TurnRole::Tool, "refine_description: ok"),
        ];
        let body = conversation_body(&ConversationRequest {
            system_instruction: "sys".to_string(),
            history: &history,
            message: "Solar Kiosk",
        });
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert!(contents[2]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("[resultado de ferramenta]"));
        assert_eq!(contents[3]["parts"][0]["text"], "Solar Kiosk");

        let names: Vec<&str> = body["tools"][0]["functionDeclarations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec![REFINE_TOOL, PRESENT_FOR_REVIEW_TOOL, SUBMIT_TOOL]);
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let client = GeminiClient::from_settings(&Settings::for_tests()).unwrap();
        let err = client.refine("texto", &[]).await.unwrap_err();
        assert!(matches!(err, GenAiError::NotConfigured));
    }
}
