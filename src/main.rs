//! docscout command-line entry point
//!
//! ```text
//! docscout serve                       # HTTP server on DOCSCOUT_BIND
//! docscout ask "how do I cache fetch"  # one query, answer on stdout
//! docscout tool grep '{"pattern":"revalidate"}'
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use docscout::agent::{AgentConfig, AgentController, RetrievalMode};
use docscout::config::{Config, ServerConfig};
use docscout::corpus::{Corpus, CorpusConfig};
use docscout::ollama::ChatClient;
use docscout::server::{self, AppState, RateLimiter};
use docscout::telemetry;
use docscout::tools::ToolRegistry;

#[derive(Parser, Debug)]
#[command(name = "docscout", version, about = "Agentic retrieval over a local documentation tree")]
struct Cli {
    /// Documentation root directory
    #[arg(long, env = "DOCSCOUT_ROOT", default_value = ".next-docs", global = true)]
    root: PathBuf,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434", global = true)]
    ollama_url: String,

    /// Model used for every turn
    #[arg(long, env = "DOCSCOUT_MODEL", default_value = "qwen3", global = true)]
    model: String,

    /// Maximum model turns per query
    #[arg(long, env = "DOCSCOUT_MAX_STEPS", default_value_t = 15, global = true)]
    max_steps: usize,

    /// agentic (tool loop) or eager (whole corpus in the prompt)
    #[arg(long, env = "DOCSCOUT_MODE", default_value = "agentic", global = true)]
    mode: RetrievalMode,

    /// File whose contents replace the default system prompt
    #[arg(long, env = "DOCSCOUT_SYSTEM_PROMPT_FILE", global = true)]
    system_prompt_file: Option<PathBuf>,

    /// OTLP collector endpoint (traces are not exported when unset)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Log as JSON lines
    #[arg(long, env = "DOCSCOUT_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve /api/rag, /health and /metrics
    Serve {
        /// Listen address
        #[arg(long, env = "DOCSCOUT_BIND", default_value = "127.0.0.1:3000")]
        bind: String,

        /// Queries admitted in a burst
        #[arg(long, env = "DOCSCOUT_RATE_BURST", default_value_t = 20)]
        rate_limit_burst: u64,

        /// Sustained queries per second
        #[arg(long, env = "DOCSCOUT_RATE_PER_SEC", default_value_t = 2.0)]
        rate_limit_per_sec: f64,

        /// Per-query timeout in seconds
        #[arg(long, env = "DOCSCOUT_REQUEST_TIMEOUT", default_value_t = 120)]
        request_timeout_secs: u64,
    },
    /// Answer one query and print the result
    Ask {
        /// The request to retrieve documentation for
        query: String,
    },
    /// Run a single tool call against the corpus and print its JSON output
    Tool {
        /// list_files, read_file or grep
        name: String,
        /// JSON arguments
        #[arg(default_value = "{}")]
        args: String,
    },
}

impl Cli {
    fn config(&self) -> Result<Config, Box<dyn Error>> {
        let system_prompt = match &self.system_prompt_file {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                format!("failed to read system prompt {}: {}", path.display(), e)
            })?),
            None => None,
        };

        let mut server = ServerConfig {
            ollama_url: self.ollama_url.clone(),
            otlp_endpoint: self.otlp_endpoint.clone(),
            log_json: self.log_json,
            ..ServerConfig::default()
        };
        if let Command::Serve {
            bind,
            rate_limit_burst,
            rate_limit_per_sec,
            request_timeout_secs,
        } = &self.command
        {
            server.bind = bind.clone();
            server.rate_limit_burst = *rate_limit_burst;
            server.rate_limit_per_sec = *rate_limit_per_sec;
            server.request_timeout_secs = *request_timeout_secs;
        }

        let config = Config {
            agent: AgentConfig {
                model: self.model.clone(),
                max_steps: self.max_steps,
                system_prompt,
                mode: self.mode,
            },
            corpus: CorpusConfig {
                root: self.root.clone(),
                ..CorpusConfig::default()
            },
            server,
        };
        config.validate()?;
        Ok(config)
    }
}

fn build_registry(config: &Config) -> Result<ToolRegistry, Box<dyn Error>> {
    let corpus = Corpus::open(&config.corpus)?;
    info!(root = %corpus.root().display(), "Corpus opened");
    Ok(ToolRegistry::new(Arc::new(corpus), (&config.corpus).into()))
}

fn build_agent(config: &Config, registry: ToolRegistry) -> AgentController {
    let chat_client = Arc::new(ChatClient::new(config.server.ollama_url.clone()));
    AgentController::new(chat_client, registry, config.agent.clone())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.config()?;

    telemetry::init_tracing(
        "docscout",
        config.server.otlp_endpoint.as_deref(),
        config.server.log_json,
    )
    .map_err(|e| format!("failed to initialize tracing: {}", e))?;

    let result = run(cli.command, &config).await;
    telemetry::shutdown_tracing();
    result
}

async fn run(command: Command, config: &Config) -> Result<(), Box<dyn Error>> {
    let registry = build_registry(config)?;

    match command {
        Command::Serve { .. } => {
            let agent = Arc::new(build_agent(config, registry));
            let limiter = Arc::new(RateLimiter::new(
                config.server.rate_limit_burst,
                config.server.rate_limit_per_sec,
            ));
            info!(
                model = %config.agent.model,
                mode = ?config.agent.mode,
                max_steps = config.agent.max_steps,
                ollama_url = %config.server.ollama_url,
                "Starting docscout server"
            );
            let state = AppState::new(agent, limiter, config.server.request_timeout());
            server::serve(&config.server.bind, state).await?;
        }
        Command::Ask { query } => {
            let agent = build_agent(config, registry);
            let result = agent.run(&query).await?;
            info!(
                trace_id = %result.trace_id,
                outcome = result.outcome.as_str(),
                steps = result.steps,
                tool_calls = result.tool_calls_made,
                "Query answered"
            );
            println!("{}", result.answer);
        }
        Command::Tool { name, args } => {
            let arguments: serde_json::Value = serde_json::from_str(&args)
                .map_err(|e| format!("tool arguments are not valid JSON: {}", e))?;
            let output =
                tokio::task::spawn_blocking(move || registry.call(&name, &arguments)).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
