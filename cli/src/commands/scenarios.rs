use crate::util::{RequestParts, api_request};

pub async fn run(api_url: &str, turma: Option<String>) -> i32 {
    let query: Vec<(String, String)> = turma
        .into_iter()
        .map(|t| ("turma".to_string(), t))
        .collect();
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/scenarios",
        RequestParts {
            query: &query,
            ..RequestParts::default()
        },
    )
    .await
}
