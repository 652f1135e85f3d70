//! Agent Controller - main orchestration loop for documentation retrieval
//!
//! The AgentController drives the conversation between the model and the
//! corpus tools, executing requested tool calls and feeding results back to
//! the LLM until it produces a final answer or runs out of steps.
//!
//! # State Machine
//!
//! ```text
//! Start ──► ModelTurn ──tool calls──► ToolExecution ──┐
//!              ▲                                       │
//!              └───────────────────────────────────────┘
//!              │
//!              ├──no tool calls──► Done       (answer = this turn's text)
//!              └──max_steps hit──► Exhausted  (answer = last non-empty text)
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::corpus::CorpusSnapshot;
use crate::metrics::{AGENT_STEPS, AGENT_TASKS, LLM_CALL_TIME};
use crate::ollama::{
    parse_tool_calls_from_text, ChatError, ChatMessage, ChatModel, ChatResponse, Tool, ToolCall,
};
use crate::tools::{ToolOutput, ToolRegistry};

use super::prompt::{DEFAULT_SYSTEM_PROMPT, EAGER_SYSTEM_PROMPT};

/// How queries are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Multi-step tool use over the corpus
    #[default]
    Agentic,
    /// Whole corpus in the system prompt, one model call, no tools
    Eager,
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agentic" => Ok(RetrievalMode::Agentic),
            "eager" => Ok(RetrievalMode::Eager),
            other => Err(format!("unknown retrieval mode: {} (expected agentic or eager)", other)),
        }
    }
}

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model to use for Ollama (e.g., "llama3.2")
    pub model: String,
    /// Maximum number of model turns before stopping
    pub max_steps: usize,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
    /// Agentic tool loop or eager whole-corpus prompt
    pub mode: RetrievalMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "qwen3".to_string(),
            max_steps: 15,
            system_prompt: None,
            mode: RetrievalMode::Agentic,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model answered without requesting more tools
    Done,
    /// The step budget ran out while the model still wanted tools
    Exhausted,
}

impl AgentOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentOutcome::Done => "done",
            AgentOutcome::Exhausted => "exhausted",
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final text from the LLM (may be empty)
    pub answer: String,
    /// Whether the model finished or the budget ran out
    pub outcome: AgentOutcome,
    /// Number of model turns made
    pub steps: usize,
    /// Number of tool calls executed
    pub tool_calls_made: usize,
    /// Record of every tool call, in execution order
    pub tool_records: Vec<ToolRecord>,
    /// Unique trace ID for this agent run
    pub trace_id: String,
}

/// Record of a single tool execution
#[derive(Debug, Clone)]
pub struct ToolRecord {
    /// Call id the result was correlated with
    pub call_id: String,
    /// Tool name as requested by the model
    pub tool: String,
    /// Raw arguments as requested by the model
    pub arguments: serde_json::Value,
    /// Whether the tool returned an error payload
    pub is_error: bool,
    /// Execution duration in milliseconds
    pub duration_ms: f64,
}

/// Error type for agent operations
#[derive(Debug)]
pub enum AgentError {
    /// The query was empty
    EmptyQuery,
    /// The model call failed; fatal for the request
    Model(ChatError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::EmptyQuery => write!(f, "Query is empty"),
            AgentError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Model(e) => Some(e),
            AgentError::EmptyQuery => None,
        }
    }
}

impl From<ChatError> for AgentError {
    fn from(e: ChatError) -> Self {
        AgentError::Model(e)
    }
}

/// A tool call together with its output
struct ToolExecution {
    call_id: String,
    call: ToolCall,
    output: ToolOutput,
    duration_ms: f64,
}

/// Agent Controller orchestrating the LLM and the corpus tools
///
/// The controller itself is shared between requests; every call to
/// [`AgentController::run`] owns its own conversation.
pub struct AgentController {
    chat_client: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    config: AgentConfig,
    snapshot: Option<Arc<CorpusSnapshot>>,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `chat_client` - Chat model used for every turn
    /// * `registry` - Tools over the shared corpus
    /// * `config` - Agent configuration
    ///
    /// In eager mode the corpus snapshot is loaded here, once.
    pub fn new(chat_client: Arc<dyn ChatModel>, registry: ToolRegistry, config: AgentConfig) -> Self {
        let snapshot = match config.mode {
            RetrievalMode::Eager => Some(Arc::new(CorpusSnapshot::load(registry.corpus()))),
            RetrievalMode::Agentic => None,
        };
        Self {
            chat_client,
            registry,
            config,
            snapshot,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer a query
    ///
    /// # Returns
    /// AgentResult with the final text; only a model failure is an error
    pub async fn run(&self, query: &str) -> Result<AgentResult, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        let trace_id = Uuid::now_v7().to_string();

        // Create root span for the entire agent task
        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.config.model,
            mode = ?self.config.mode,
            otel.name = "agent_task"
        );

        async {
            info!(trace_id = %trace_id, query = %query, "Starting agent task");

            let result = match &self.snapshot {
                Some(snapshot) => self.run_eager(snapshot, query, trace_id.clone()).await,
                None => self.run_agentic(query, trace_id.clone()).await,
            };

            match &result {
                Ok(r) => {
                    AGENT_TASKS.with_label_values(&[r.outcome.as_str()]).inc();
                    AGENT_STEPS.observe(r.steps as f64);
                    info!(
                        trace_id = %trace_id,
                        outcome = r.outcome.as_str(),
                        steps = r.steps,
                        tool_calls = r.tool_calls_made,
                        answer_len = r.answer.len(),
                        "Agent task finished"
                    );
                }
                Err(e) => {
                    AGENT_TASKS.with_label_values(&["model_error"]).inc();
                    error!(trace_id = %trace_id, error = %e, "Agent task failed");
                }
            }
            result
        }
        .instrument(root_span)
        .await
    }

    async fn run_agentic(&self, query: &str, trace_id: String) -> Result<AgentResult, AgentError> {
        let tools = self.registry.definitions();
        let tool_names = self.registry.names();

        let system_prompt = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(query)];

        let mut steps = 0;
        let mut tool_calls_made = 0;
        let mut tool_records = Vec::new();
        let mut last_text = String::new();

        while steps < self.config.max_steps {
            steps += 1;

            let response = self
                .call_model(&messages, Some(tools.as_slice()), steps, &trace_id)
                .await?;
            let content = response.message.content;
            if !content.trim().is_empty() {
                last_text = content.clone();
            }

            // Native tool_calls first, then JSON embedded in the text
            let tool_calls = response
                .message
                .tool_calls
                .filter(|tc| !tc.is_empty())
                .unwrap_or_else(|| parse_tool_calls_from_text(&content, &tool_names));

            if tool_calls.is_empty() {
                return Ok(AgentResult {
                    answer: content,
                    outcome: AgentOutcome::Done,
                    steps,
                    tool_calls_made,
                    tool_records,
                    trace_id,
                });
            }

            let tool_calls: Vec<ToolCall> = tool_calls
                .into_iter()
                .enumerate()
                .map(|(i, call)| match call.id {
                    Some(_) => call,
                    None => call.with_id(format!("call_{}_{}", steps, i)),
                })
                .collect();

            messages.push(ChatMessage::assistant_with_tools(content, tool_calls.clone()));

            for execution in self.execute_tools(tool_calls, &trace_id).await {
                tool_calls_made += 1;
                messages.push(ChatMessage::tool(
                    execution.call_id.clone(),
                    execution.call.function.name.clone(),
                    execution.output.to_json(),
                ));
                tool_records.push(ToolRecord {
                    call_id: execution.call_id,
                    tool: execution.call.function.name,
                    arguments: execution.call.function.arguments,
                    is_error: execution.output.is_error(),
                    duration_ms: execution.duration_ms,
                });
            }
        }

        warn!(trace_id = %trace_id, steps, "Step budget exhausted");
        Ok(AgentResult {
            answer: last_text,
            outcome: AgentOutcome::Exhausted,
            steps,
            tool_calls_made,
            tool_records,
            trace_id,
        })
    }

    async fn run_eager(
        &self,
        snapshot: &CorpusSnapshot,
        query: &str,
        trace_id: String,
    ) -> Result<AgentResult, AgentError> {
        let base = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(EAGER_SYSTEM_PROMPT);
        let messages = vec![
            ChatMessage::system(snapshot.system_prompt(base)),
            ChatMessage::user(query),
        ];

        let response = self.call_model(&messages, None, 1, &trace_id).await?;
        Ok(AgentResult {
            answer: response.message.content,
            outcome: AgentOutcome::Done,
            steps: 1,
            tool_calls_made: 0,
            tool_records: Vec::new(),
            trace_id,
        })
    }

    /// One model turn, timed and traced
    async fn call_model(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
        step: usize,
        trace_id: &str,
    ) -> Result<ChatResponse, AgentError> {
        let llm_span = info_span!(
            "llm_call",
            trace_id = %trace_id,
            step,
            model = %self.config.model,
            otel.name = "llm_call"
        );

        let call_start = Instant::now();
        let response = self
            .chat_client
            .chat(messages, &self.config.model, tools)
            .instrument(llm_span)
            .await?;
        let call_duration = call_start.elapsed();

        LLM_CALL_TIME
            .with_label_values(&[&self.config.model])
            .observe(call_duration.as_secs_f64());
        info!(
            trace_id = %trace_id,
            step,
            duration_ms = call_duration.as_secs_f64() * 1000.0,
            tool_calls = response.message.tool_calls.as_ref().map(Vec::len).unwrap_or(0),
            "LLM call completed"
        );
        Ok(response)
    }

    /// Run every call of one turn concurrently on the blocking pool.
    ///
    /// Results come back in the order of `calls`, whatever order they finish in.
    async fn execute_tools(&self, calls: Vec<ToolCall>, trace_id: &str) -> Vec<ToolExecution> {
        let tasks = calls.into_iter().map(|call| {
            let registry = self.registry.clone();
            let call_id = call.id.clone().unwrap_or_default();
            let span = info_span!(
                "tool_call",
                trace_id = %trace_id,
                tool = %call.function.name,
                call_id = %call_id,
                otel.name = "tool_call"
            );

            async move {
                let start = Instant::now();
                let name = call.function.name.clone();
                let arguments = call.function.arguments.clone();
                let output = tokio::task::spawn_blocking(move || registry.call(&name, &arguments))
                    .await
                    .unwrap_or_else(|e| ToolOutput::error(format!("Tool execution failed: {}", e)));
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

                if let ToolOutput::Error { error } = &output {
                    warn!(error = %error, "Tool call returned an error");
                } else {
                    info!(duration_ms, "Tool call succeeded");
                }

                ToolExecution {
                    call_id,
                    call,
                    output,
                    duration_ms,
                }
            }
            .instrument(span)
        });

        join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("agentic".parse::<RetrievalMode>(), Ok(RetrievalMode::Agentic));
        assert_eq!("EAGER".parse::<RetrievalMode>(), Ok(RetrievalMode::Eager));
        assert!("hybrid".parse::<RetrievalMode>().is_err());
    }

    #[test]
    fn test_agent_error_display() {
        assert_eq!(AgentError::EmptyQuery.to_string(), "Query is empty");
        let e = AgentError::from(ChatError::EmptyResponse);
        assert!(e.to_string().starts_with("Model error"));
    }
}
