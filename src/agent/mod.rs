//! Agent module for LLM-driven documentation retrieval
//!
//! This module provides the agent loop that orchestrates:
//! - Ollama LLM with tool calling (/api/chat)
//! - Read-only corpus tools (list_files, read_file, grep)
//!
//! # Architecture
//!
//! ```text
//! Query → AgentController → Ollama /api/chat (with tools)
//!              ↓
//!       Tool Calls: list_files / read_file / grep   (run concurrently)
//!              ↓
//!       ToolRegistry → PathSandbox → Corpus
//!              ↓
//!       {result} or {error} per call id
//!              ↓
//!       Feed results back to Ollama → Loop, Done, or Exhausted
//! ```

pub mod controller;
pub mod prompt;

pub use controller::{
    AgentConfig, AgentController, AgentError, AgentOutcome, AgentResult, RetrievalMode, ToolRecord,
};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, EAGER_SYSTEM_PROMPT};
