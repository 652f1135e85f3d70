//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.
//!
//! The agent only depends on the [`ChatModel`] trait, so tests can script
//! model turns without a running Ollama.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call a "tool" message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool a "tool" message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    /// Assistant turn that requests tool calls
    pub fn assistant_with_tools(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role("assistant", content)
        }
    }

    /// Result of one tool call, tagged with the call it answers
    pub fn tool(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::with_role("tool", content)
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id; filled in by the agent when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: None,
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

impl ChatResponse {
    /// Final response carrying only text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(content),
            done: true,
            eval_count: 0,
            eval_duration: 0,
        }
    }

    /// Response requesting the given tool calls
    pub fn tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            message: ChatMessage::assistant_with_tools(content, calls),
            done: true,
            eval_count: 0,
            eval_duration: 0,
        }
    }
}

/// Error type for chat operations
#[derive(Debug)]
pub enum ChatError {
    Request(reqwest::Error),
    Parse(serde_json::Error),
    /// Non-success HTTP status from the model server
    Status(u16, String),
    EmptyResponse,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Request(e) => write!(f, "Request error: {}", e),
            ChatError::Parse(e) => write!(f, "Parse error: {}", e),
            ChatError::Status(code, body) => write!(f, "Model server returned {}: {}", code, body),
            ChatError::EmptyResponse => write!(f, "Empty response from Ollama"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Request(e)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Parse(e)
    }
}

/// A chat model that can be driven by the agent loop
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation (and optionally the tool list) and return the
    /// model's next message
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, ChatError>;
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
    temperature: f32,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    /// Send a chat request with optional tools
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `model` - The model name (e.g., "llama3.2")
    /// * `tools` - Optional list of tools the model can use
    ///
    /// # Returns
    /// ChatResponse containing the model's reply and any tool calls
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, ChatError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": self.temperature
            }
        });

        if let Some(t) = tools {
            body["tools"] = serde_json::to_value(t)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16(), text));
        }
        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let mut chat_response: ChatResponse = serde_json::from_str(&text)?;
        if let Some(calls) = chat_response.message.tool_calls.as_mut() {
            for call in calls.iter_mut() {
                normalize_arguments(&mut call.function.arguments);
            }
        }
        Ok(chat_response)
    }
}

/// Some models send arguments as a JSON-encoded string instead of an object
fn normalize_arguments(arguments: &mut serde_json::Value) {
    if let serde_json::Value::String(raw) = arguments {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) {
            *arguments = parsed;
        }
    }
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field. Only objects naming one of
/// `known_tools` are accepted, so JSON quoted from the docs is not mistaken
/// for a call.
pub fn parse_tool_calls_from_text(content: &str, known_tools: &[&str]) -> Vec<ToolCall> {
    let content = content.trim();

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content, known_tools) {
        return vec![tool_call];
    }

    // Otherwise scan for balanced {...} spans
    let mut tool_calls = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Some(tool_call) = try_parse_tool_call(&content[s..=i], known_tools) {
                            tool_calls.push(tool_call);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    tool_calls
}

/// Parse `{"name": ..., "arguments" | "parameters": {...}}`
fn try_parse_tool_call(json_str: &str, known_tools: &[&str]) -> Option<ToolCall> {
    let value = serde_json::from_str::<serde_json::Value>(json_str).ok()?;
    let name = value.get("name").and_then(|n| n.as_str())?;
    if !known_tools.contains(&name) {
        return None;
    }

    // Some models use "parameters" instead of "arguments"
    let mut arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    normalize_arguments(&mut arguments);

    Some(ToolCall::new(name, arguments))
}
