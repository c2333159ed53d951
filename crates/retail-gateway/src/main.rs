//! retail-gateway: Retail Analytics Agent Gateway
//!
//! Main entry point. Builds the text generator and knowledge base from
//! configuration, starts one agent per built-in specialist, and runs the
//! interactive CLI or a one-shot query.
//!
//! Usage:
//!   retail-gateway                    - Start interactive CLI mode
//!   retail-gateway --execute "<text>" - Route one message and exit
//!   retail-gateway --help             - Show help

mod cli;

use std::sync::Arc;

use retail_core::{
    Config, EmptyKnowledgeBase, KnowledgeBase, MockTextGenerator, ModelProvider, Orchestrator,
    ProviderRouter, SqliteKnowledgeStore, TextGenerator,
};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive CLI mode
    Cli,
    /// Route a single message and exit
    Execute(String),
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args()?;

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("retail-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting retail-gateway...");
    tracing::info!("Provider: {} / Model: {}", config.llm.provider, config.llm.model);

    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let sweeper = orchestrator.spawn_context_sweeper();

    let result = match mode {
        RunMode::Cli => {
            tracing::info!("Running in CLI mode");
            cli::run_cli(orchestrator.clone()).await
        }
        RunMode::Execute(prompt) => cli::run_execute(orchestrator.clone(), &prompt).await,
        _ => Ok(()),
    };

    if let Some(handle) = sweeper {
        handle.abort();
    }
    orchestrator.cleanup().await;

    result
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--execute" | "-e" => {
                let prompt = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--execute requires a message"))?;
                return Ok(RunMode::Execute(prompt));
            }
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            _ => {}
        }
    }

    Ok(RunMode::Cli)
}

/// Print help message
fn print_help() {
    println!("retail-gateway - Retail Analytics Agent Gateway");
    println!();
    println!("Usage:");
    println!("  retail-gateway                    Start interactive CLI mode");
    println!("  retail-gateway --execute \"<text>\" Route one message and exit");
    println!("  retail-gateway --help             Show this help message");
    println!("  retail-gateway --version          Show version");
    println!();
    println!("Environment Variables:");
    println!("  LLM_API_KEY          API key (without it a local mock generator is used)");
    println!("  LLM_PROVIDER         openai, chatglm, deepseek or anthropic (default: openai)");
    println!("  LLM_MODEL            Model name (default: gpt-4o-mini)");
    println!("  LLM_BASE_URL         Custom API endpoint");
    println!("  OPENAI_API_KEY, CHATGLM_API_KEY, DEEPSEEK_API_KEY, ANTHROPIC_API_KEY");
    println!("                       Extra providers selectable per agent");
    println!("  LLM_TIMEOUT_SECS     Request timeout (default: 120)");
    println!("  HISTORY_LIMIT        Messages kept per conversation (default: 50)");
    println!("  CONTEXT_TTL_SECS     Idle conversation expiry, 0 = never (default: 86400)");
    println!("  MAX_CONTEXTS         Live conversation cap, 0 = unbounded (default: 10000)");
    println!("  KNOWLEDGE_DB_PATH    SQLite knowledge database (optional)");
    println!("  RUST_LOG             Log filter (default: info)");
}

/// Wire services into an orchestrator with one agent per built-in type
async fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let provider_configs = config.provider_configs();
    let (generator, default_provider): (Arc<dyn TextGenerator>, ModelProvider) =
        match provider_configs.first() {
            Some(primary) => {
                let router = ProviderRouter::from_configs(&provider_configs)
                    .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?;
                tracing::info!("Available providers: {:?}", router.providers());
                (Arc::new(router), primary.provider)
            }
            None => {
                tracing::warn!("No API key is set; answers come from the local mock generator");
                (Arc::new(MockTextGenerator::new()), config.llm.provider)
            }
        };

    let knowledge: Arc<dyn KnowledgeBase> = match &config.knowledge.db_path {
        Some(path) => {
            let store = SqliteKnowledgeStore::new(path)
                .map_err(|e| anyhow::anyhow!("Failed to open knowledge base: {}", e))?;
            tracing::info!("Knowledge base: {}", path);
            Arc::new(store)
        }
        None => {
            tracing::info!("No knowledge base configured");
            Arc::new(EmptyKnowledgeBase)
        }
    };

    let orchestrator = Orchestrator::new(config.orchestrator.clone(), generator, knowledge)
        .with_default_provider(default_provider);
    orchestrator.register_default_agents().await;

    let ids = orchestrator.create_default_agents().await?;
    tracing::info!("Started {} agents", ids.len());

    Ok(orchestrator)
}
