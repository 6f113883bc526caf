use serde_json::json;

use crate::util::{RequestParts, api_request, exit_error};

/// `--text` wins over `--file`; `-` as file reads stdin.
pub async fn run(
    api_url: &str,
    text: Option<String>,
    file: Option<String>,
    scenarios: Vec<String>,
) -> i32 {
    let raw_text = match (text, file) {
        (Some(t), _) => t,
        (None, Some(path)) if path == "-" => std::io::read_to_string(std::io::stdin())
            .unwrap_or_else(|e| exit_error(&format!("Failed to read stdin: {e}"), None)),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .unwrap_or_else(|e| exit_error(&format!("Failed to read file '{path}': {e}"), None)),
        (None, None) => exit_error(
            "a description is required",
            Some("Pass --text '...' or --file description.txt"),
        ),
    };

    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/refine",
        RequestParts {
            body: Some(json!({"raw_text": raw_text, "scenario_ids": scenarios})),
            ..RequestParts::default()
        },
    )
    .await
}
