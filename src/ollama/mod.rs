//! Ollama LLM integration module
//!
//! This module provides a client for Ollama's `/api/chat` endpoint and the
//! message types the agent conversation is made of.

pub mod tool_use;

// Re-export public types so other modules can `use crate::ollama::ChatMessage`
pub use tool_use::{
    parse_tool_calls_from_text, ChatClient, ChatError, ChatMessage, ChatModel, ChatResponse,
    FunctionCall, Tool, ToolCall, ToolFunction,
};
