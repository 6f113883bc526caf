//! Interactive registration dialogue over stdin.

use portal_core::dialogue::DialoguePhase;
use serde_json::{Value, json};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::util::{RequestParts, exit_code_for_status, pretty, raw_api_request};

const HELP: &str = "\
Type freely to talk to the assistant. Commands:
  /review               ask for the consolidated summary
  /edit <path> <json>   change one field, e.g. /edit link_solucao \"https://x.org\"
  /confirm              confirm the reviewed summary and register it
  /show                 print the current session
  /help                 this text
  /quit                 leave (an unsubmitted draft is discarded)";

#[derive(Debug, PartialEq)]
enum ChatLine {
    Message(String),
    Review,
    Edit { path: String, value: Value },
    Confirm,
    Show,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_chat_line(line: &str) -> ChatLine {
    let line = line.trim();
    if line.is_empty() {
        return ChatLine::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatLine::Message(line.to_string());
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));
    match name {
        "review" => ChatLine::Review,
        "confirm" => ChatLine::Confirm,
        "show" => ChatLine::Show,
        "help" => ChatLine::Help,
        "quit" | "exit" => ChatLine::Quit,
        "edit" => {
            let Some((path, raw)) = rest.split_once(char::is_whitespace) else {
                return ChatLine::Invalid("usage: /edit <path> <json value>".to_string());
            };
            // Bare words are taken as strings so `/edit turma A` works.
            let raw = raw.trim();
            let value = serde_json::from_str(raw).unwrap_or_else(|_| json!(raw));
            ChatLine::Edit {
                path: path.to_string(),
                value,
            }
        }
        other => ChatLine::Invalid(format!("unknown command '/{other}', try /help")),
    }
}

fn phase_of(body: &Value) -> Option<DialoguePhase> {
    let session = body.get("session").unwrap_or(body);
    serde_json::from_value(session.get("phase")?.clone()).ok()
}

fn print_turn(body: &Value) {
    if let Some(reply) = body.get("reply").and_then(|r| r.as_str())
        && !reply.is_empty()
    {
        println!("\n{reply}\n");
    }
    for notice in body
        .get("notices")
        .and_then(|n| n.as_array())
        .into_iter()
        .flatten()
    {
        let tool = notice.get("tool").and_then(|t| t.as_str()).unwrap_or("?");
        let outcome = notice.get("outcome").and_then(|o| o.as_str()).unwrap_or("?");
        let message = notice.get("message").and_then(|m| m.as_str()).unwrap_or("");
        println!("  [{tool}: {outcome}] {message}");
    }
    if let Some(phase) = phase_of(body) {
        println!("  phase: {phase:?}");
    }
}

struct ChatSession<'a> {
    api_url: &'a str,
    role: Option<&'a str>,
    id: Uuid,
    phase: Option<DialoguePhase>,
}

impl ChatSession<'_> {
    async fn call(&mut self, method: reqwest::Method, suffix: &str, body: Option<Value>) -> bool {
        let path = format!("/v1/dialogue/sessions/{}{suffix}", self.id);
        let result = raw_api_request(
            self.api_url,
            method,
            &path,
            RequestParts {
                body,
                role: self.role,
                ..RequestParts::default()
            },
        )
        .await;
        match result {
            Ok((status, body)) if exit_code_for_status(status) == 0 => {
                if let Some(phase) = phase_of(&body) {
                    self.phase = Some(phase);
                }
                print_turn(&body);
                if let Some(solution) = body.get("solution").filter(|_| suffix == "/confirm") {
                    println!("{}", pretty(solution));
                }
                true
            }
            Ok((_, body)) => {
                eprintln!("{}", pretty(&body));
                true
            }
            Err(e) => {
                e.report();
                false
            }
        }
    }
}

pub async fn run(api_url: &str, role: Option<&str>) -> i32 {
    let (status, body) = match raw_api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/dialogue/sessions",
        RequestParts {
            role,
            ..RequestParts::default()
        },
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            e.report();
            return e.exit_code();
        }
    };
    if exit_code_for_status(status) != 0 {
        eprintln!("{}", pretty(&body));
        return exit_code_for_status(status);
    }
    let Some(id) = body
        .get("id")
        .and_then(|i| i.as_str())
        .and_then(|i| Uuid::parse_str(i).ok())
    else {
        let err = json!({"error": "cli_error", "message": "session response without id"});
        eprintln!("{}", pretty(&err));
        return 2;
    };

    let mut chat = ChatSession {
        api_url,
        role,
        id,
        phase: phase_of(&body),
    };
    println!("{HELP}");
    tracing::debug!(session_id = %id, "dialogue session started");

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            line = lines.next_line() => line.ok().flatten(),
        };
        let Some(line) = line else { break };

        let alive = match parse_chat_line(&line) {
            ChatLine::Empty => true,
            ChatLine::Help => {
                println!("{HELP}");
                true
            }
            ChatLine::Invalid(message) => {
                eprintln!("{message}");
                true
            }
            ChatLine::Quit => break,
            ChatLine::Message(message) => {
                chat.call(
                    reqwest::Method::POST,
                    "/messages",
                    Some(json!({"message": message})),
                )
                .await
            }
            ChatLine::Review => chat.call(reqwest::Method::POST, "/review", None).await,
            ChatLine::Edit { path, value } => {
                chat.call(
                    reqwest::Method::POST,
                    "/edits",
                    Some(json!({"path": path, "value": value})),
                )
                .await
            }
            ChatLine::Confirm => chat.call(reqwest::Method::POST, "/confirm", None).await,
            ChatLine::Show => {
                let path = format!("/v1/dialogue/sessions/{id}");
                match raw_api_request(api_url, reqwest::Method::GET, &path, RequestParts::default())
                    .await
                {
                    Ok((_, body)) => {
                        println!("{}", pretty(&body));
                        true
                    }
                    Err(e) => {
                        e.report();
                        false
                    }
                }
            }
        };
        if !alive {
            return 3;
        }
    }

    if chat.phase != Some(DialoguePhase::Submitted) {
        chat.call(reqwest::Method::DELETE, "", None).await;
        println!("draft discarded");
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_text_is_a_message() {
        assert_eq!(
            parse_chat_line("  somos da turma A  "),
            ChatLine::Message("somos da turma A".to_string())
        );
        assert_eq!(parse_chat_line("   "), ChatLine::Empty);
    }

    #[test]
    fn edit_parses_json_or_falls_back_to_string() {
        assert_eq!(
            parse_chat_line("/edit cenarios_relacionados [\"CENARIO_A1\"]"),
            ChatLine::Edit {
                path: "cenarios_relacionados".to_string(),
                value: json!(["CENARIO_A1"]),
            }
        );
        assert_eq!(
            parse_chat_line("/edit turma A"),
            ChatLine::Edit {
                path: "turma".to_string(),
                value: json!("A"),
            }
        );
        assert!(matches!(parse_chat_line("/edit turma"), ChatLine::Invalid(_)));
    }

    #[test]
    fn known_and_unknown_commands() {
        assert_eq!(parse_chat_line("/review"), ChatLine::Review);
        assert_eq!(parse_chat_line("/confirm"), ChatLine::Confirm);
        assert_eq!(parse_chat_line("/exit"), ChatLine::Quit);
        assert!(matches!(parse_chat_line("/dance"), ChatLine::Invalid(_)));
    }

    #[test]
    fn phase_is_read_from_turn_or_session() {
        let turn = json!({"reply": "ok", "session": {"phase": "REVIEWING"}});
        assert_eq!(phase_of(&turn), Some(DialoguePhase::Reviewing));
        let session = json!({"id": "x", "phase": "SUBMITTED"});
        assert_eq!(phase_of(&session), Some(DialoguePhase::Submitted));
        assert_eq!(phase_of(&json!({})), None);
    }
}
