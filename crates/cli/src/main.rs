//! metalrag CLI
//!
//! Main entry point for the metalrag command-line tool.
//! Builds a metallurgy article base and answers questions over it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, FetchCommand, HypothesizeCommand, IndexCommand, IngestCommand, PromptsCommand,
    SearchCommand, StatsCommand,
};
use metalrag_core::logging::{self, LogFormat};
use metalrag_core::{config::AppConfig, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// metalrag - retrieval-augmented research assistant for steel metallurgy
#[derive(Parser, Debug)]
#[command(name = "metalrag")]
#[command(about = "Retrieval-augmented research assistant for steel metallurgy", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "METALRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "METALRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "METALRAG_PROVIDER")]
    provider: Option<String>,

    /// Chat model identifier
    #[arg(short, long, global = true, env = "METALRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect articles from arXiv and OpenAlex
    Fetch(FetchCommand),

    /// Clean and chunk the raw corpus
    Ingest(IngestCommand),

    /// Embed chunks and build the vector index
    Index(IndexCommand),

    /// Show the nearest chunks for a query
    Search(SearchCommand),

    /// Answer a question from the article base
    Ask(AskCommand),

    /// Generate and critique research hypotheses
    Hypothesize(HypothesizeCommand),

    /// Show corpus and index statistics
    Stats(StatsCommand),

    /// List prompt templates
    Prompts(PromptsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Fetch(_) => "fetch",
            Commands::Ingest(_) => "ingest",
            Commands::Index(_) => "index",
            Commands::Search(_) => "search",
            Commands::Ask(_) => "ask",
            Commands::Hypothesize(_) => "hypothesize",
            Commands::Stats(_) => "stats",
            Commands::Prompts(_) => "prompts",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_state_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let result = run(&cli.command, &config).instrument(span.clone()).await;

    span.in_scope(|| match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(retryable = e.is_retryable(), "Command failed: {}", e),
    });
    if let Err(e) = &result {
        eprintln!("Error: {}", e.user_message());
    }

    result
}

/// Route to the command handler.
async fn run(command: &Commands, config: &AppConfig) -> AppResult<()> {
    match command {
        Commands::Fetch(cmd) => cmd.execute(config).await,
        Commands::Ingest(cmd) => cmd.execute(config).await,
        Commands::Index(cmd) => cmd.execute(config).await,
        Commands::Search(cmd) => cmd.execute(config).await,
        Commands::Ask(cmd) => cmd.execute(config).await,
        Commands::Hypothesize(cmd) => cmd.execute(config).await,
        Commands::Stats(cmd) => cmd.execute(config).await,
        Commands::Prompts(cmd) => cmd.execute(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use metalrag_knowledge::IndexChoice;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hypothesize_flags() {
        let cli = Cli::try_parse_from([
            "metalrag",
            "hypothesize",
            "Зарастание стаканов",
            "-k",
            "12",
            "--show-raw",
        ])
        .unwrap();
        match cli.command {
            Commands::Hypothesize(cmd) => {
                assert_eq!(cmd.problem, "Зарастание стаканов");
                assert_eq!(cmd.top_k, Some(12));
                assert!(cmd.show_raw);
                assert!(!cmd.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_index_kind() {
        let cli = Cli::try_parse_from(["metalrag", "index", "--kind", "ivf", "--json"]).unwrap();
        match cli.command {
            Commands::Index(cmd) => {
                assert_eq!(cmd.kind, Some(IndexChoice::Ivf));
                assert!(cmd.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["metalrag", "index", "--kind", "hnsw"]).is_err());
    }

    #[test]
    fn test_instrumented_command_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let cli = Cli::try_parse_from(["metalrag", "stats"]).unwrap();
        let config = AppConfig::default();
        let future = run(&cli.command, &config).instrument(tracing::info_span!("command"));
        assert_send(&future);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "metalrag",
            "ask",
            "Что такое ферротитан?",
            "--model",
            "qwen2.5",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.model.as_deref(), Some("qwen2.5"));
        assert!(cli.log_json);
        assert_eq!(cli.command.name(), "ask");
    }
}
