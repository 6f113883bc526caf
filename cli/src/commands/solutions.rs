use clap::Subcommand;
use uuid::Uuid;

use crate::util::{RequestParts, api_request, exit_error, read_json_from_file};

#[derive(Subcommand)]
pub enum SolutionCommands {
    /// List every registered solution, newest first
    List,
    /// Register a solution from a JSON payload
    Create {
        /// JSON file with the payload (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: String,
    },
    /// Replace every field of a solution
    Update {
        #[arg(long)]
        id: Uuid,
        /// JSON file with the full payload (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: String,
    },
    /// Delete a solution
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

pub async fn run(api_url: &str, role: Option<&str>, command: SolutionCommands) -> i32 {
    match command {
        SolutionCommands::List => {
            api_request(
                api_url,
                reqwest::Method::GET,
                "/v1/solutions",
                RequestParts::default(),
            )
            .await
        }
        SolutionCommands::Create { file } => {
            let body = read_json_from_file(&file).unwrap_or_else(|e| exit_error(&e, None));
            api_request(
                api_url,
                reqwest::Method::POST,
                "/v1/solutions",
                RequestParts {
                    body: Some(body),
                    role,
                    ..RequestParts::default()
                },
            )
            .await
        }
        SolutionCommands::Update { id, file } => {
            let body = read_json_from_file(&file).unwrap_or_else(|e| {
                exit_error(
                    &e,
                    Some("PUT replaces every field; start from `portal solutions list` output."),
                )
            });
            api_request(
                api_url,
                reqwest::Method::PUT,
                &format!("/v1/solutions/{id}"),
                RequestParts {
                    body: Some(body),
                    role,
                    ..RequestParts::default()
                },
            )
            .await
        }
        SolutionCommands::Delete { id } => {
            api_request(
                api_url,
                reqwest::Method::DELETE,
                &format!("/v1/solutions/{id}"),
                RequestParts::default(),
            )
            .await
        }
    }
}
