//! docscout - agentic documentation retrieval over a local docs tree
//!
//! A query is answered by letting an Ollama model explore a read-only
//! documentation corpus with three tools until it can quote the relevant
//! sections back.
//!
//! # Modules
//!
//! - `corpus` - sandboxed listing, paged reads and regex search over the root
//! - `tools` - tool definitions, argument validation and dispatch
//! - `ollama` - `/api/chat` client and conversation types
//! - `agent` - the bounded model/tool loop (and the single-call eager mode)
//! - `server` - axum routes for `/api/rag`, `/health` and `/metrics`
//! - `config` - defaults for every tunable
//! - `metrics` - Prometheus metrics for observability
//! - `telemetry` - logging and OpenTelemetry setup
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docscout::{AgentConfig, AgentController, ChatClient, Corpus, CorpusConfig, ToolRegistry};
//!
//! let corpus_config = CorpusConfig::default();
//! let corpus = Arc::new(Corpus::open(&corpus_config)?);
//! let registry = ToolRegistry::new(corpus, (&corpus_config).into());
//! let agent = AgentController::new(
//!     Arc::new(ChatClient::new("http://localhost:11434")),
//!     registry,
//!     AgentConfig::default(),
//! );
//! let result = agent.run("How do I revalidate a cached fetch?").await?;
//! println!("{}", result.answer);
//! ```

pub mod agent;
pub mod config;
pub mod corpus;
pub mod metrics;
pub mod ollama;
pub mod server;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentController, AgentOutcome, AgentResult, RetrievalMode};
pub use config::{Config, ServerConfig};
pub use corpus::{Corpus, CorpusConfig, CorpusError};
pub use ollama::{ChatClient, ChatModel};
pub use tools::{ToolOutput, ToolRegistry};
