mod commands;
mod util;

use clap::{Parser, Subcommand};

use commands::solutions::SolutionCommands;

#[derive(Parser)]
#[command(
    name = "portal",
    version,
    about = "Futures course portal CLI: register solutions, browse scenarios, follow the gallery"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "PORTAL_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Caller role sent as x-portal-role (student or professor)
    #[arg(long, env = "PORTAL_ROLE")]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Show operational settings (poll interval, timeouts, model)
    Config,
    /// Print the OpenAPI document
    Discover {
        /// Only list method, path and summary per endpoint
        #[arg(long)]
        endpoints: bool,
    },
    /// List the scenario catalog
    Scenarios {
        /// Filter by cohort (A or B)
        #[arg(long)]
        turma: Option<String>,
    },
    /// Registered solutions
    Solutions {
        #[command(subcommand)]
        command: SolutionCommands,
    },
    /// Poll the solution list and print new registrations as they appear
    Watch {
        /// Seconds between polls (defaults to the server's advertised interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Skip solutions that already exist when watching starts
        #[arg(long)]
        only_new: bool,
    },
    /// Refine a free-form description into the four structured blocks
    Refine {
        /// Description text
        #[arg(long)]
        text: Option<String>,
        /// File with the description (use '-' for stdin)
        #[arg(long, short = 'f')]
        file: Option<String>,
        /// Related scenario id (repeatable)
        #[arg(long = "scenario")]
        scenarios: Vec<String>,
    },
    /// Register a solution through the guided assistant dialogue
    Chat,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PORTAL_LOG")
                .unwrap_or_else(|_| "portal_cli=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let role = cli.role.as_deref();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Config => commands::system::config(&cli.api_url).await,
        Commands::Discover { endpoints } => {
            commands::system::discover(&cli.api_url, endpoints).await
        }
        Commands::Scenarios { turma } => commands::scenarios::run(&cli.api_url, turma).await,
        Commands::Solutions { command } => {
            commands::solutions::run(&cli.api_url, role, command).await
        }
        Commands::Watch { interval, only_new } => {
            commands::watch::run(&cli.api_url, interval, only_new).await
        }
        Commands::Refine {
            text,
            file,
            scenarios,
        } => commands::refine::run(&cli.api_url, text, file, scenarios).await,
        Commands::Chat => commands::chat::run(&cli.api_url, role).await,
    };

    std::process::exit(code);
}
