//! Integration tests for the agent loop
//!
//! The model is replaced by a scripted [`ChatModel`] and the corpus by a
//! [`MemoryTree`], so every turn of the conversation can be asserted on.
//! The test that talks to a real Ollama is marked #[ignore].

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use docscout::agent::{AgentConfig, AgentController, AgentError, AgentOutcome, RetrievalMode};
use docscout::corpus::{Corpus, CorpusConfig, DirEntry, DocTree, EntryKind, MemoryTree};
use docscout::ollama::{ChatClient, ChatError, ChatMessage, ChatModel, ChatResponse, Tool, ToolCall};
use docscout::tools::ToolRegistry;

/// One request as the model saw it
#[derive(Debug, Clone)]
struct SeenRequest {
    messages: Vec<ChatMessage>,
    tools_offered: bool,
}

/// Chat model that replays a fixed script of turns
struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ChatResponse, ChatError>>>,
    /// Returned once the script runs out
    fallback: Option<ChatResponse>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedModel {
    fn new(turns: Vec<Result<ChatResponse, ChatError>>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn repeating(turn: ChatResponse) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(VecDeque::new()),
            fallback: Some(turn),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, ChatError> {
        self.seen.lock().unwrap().push(SeenRequest {
            messages: messages.to_vec(),
            tools_offered: tools.map(|t| !t.is_empty()).unwrap_or(false),
        });
        let next = self.turns.lock().unwrap().pop_front();
        match next {
            Some(turn) => turn,
            None => self.fallback.clone().ok_or(ChatError::EmptyResponse),
        }
    }
}

fn registry() -> ToolRegistry {
    let tree = MemoryTree::new("/docs")
        .with_file(
            "/docs/app/caching.mdx",
            "# Caching\nUse revalidatePath to purge the cache.\nSee also revalidateTag.",
        )
        .with_file("/docs/app/routing.md", "# Routing\nDynamic segments use [slug].")
        .with_file("/docs/index.md", "# Docs\nStart here.");
    let config = CorpusConfig::default();
    let corpus = Corpus::with_tree("/docs", tree, &config);
    ToolRegistry::new(Arc::new(corpus), (&config).into())
}

/// MemoryTree whose file reads take a per-path delay
///
/// Finished reads are recorded in completion order.
struct SlowTree {
    inner: MemoryTree,
    delays: HashMap<PathBuf, Duration>,
    finished: Arc<Mutex<Vec<PathBuf>>>,
}

impl DocTree for SlowTree {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        self.inner.kind(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if let Some(delay) = self.delays.get(path) {
            std::thread::sleep(*delay);
        }
        let content = self.inner.read_to_string(path);
        self.finished.lock().unwrap().push(path.to_path_buf());
        content
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.inner.canonicalize(path)
    }
}

fn agent(model: Arc<ScriptedModel>, config: AgentConfig) -> AgentController {
    AgentController::new(model, registry(), config)
}

fn tool_messages(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    messages.iter().filter(|m| m.role == "tool").collect()
}

/// Test that AgentConfig has sensible defaults
#[test]
fn test_agent_config_defaults() {
    let config = AgentConfig::default();

    assert_eq!(config.model, "qwen3");
    assert_eq!(config.max_steps, 15);
    assert_eq!(config.mode, RetrievalMode::Agentic);
    assert!(config.system_prompt.is_none());
}

/// A turn without tool calls ends the run with that turn's text
#[tokio::test]
async fn test_answer_without_tools() {
    let model = ScriptedModel::new(vec![Ok(ChatResponse::text("docs/app/caching.mdx: ..."))]);
    let result = agent(model.clone(), AgentConfig::default())
        .run("how do I purge the cache")
        .await
        .unwrap();

    assert_eq!(result.outcome, AgentOutcome::Done);
    assert_eq!(result.answer, "docs/app/caching.mdx: ...");
    assert_eq!(result.steps, 1);
    assert_eq!(result.tool_calls_made, 0);

    let seen = model.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].tools_offered);
    assert_eq!(seen[0].messages.len(), 2);
    assert_eq!(seen[0].messages[0].role, "system");
    assert_eq!(seen[0].messages[1].role, "user");
    assert_eq!(seen[0].messages[1].content, "how do I purge the cache");
}

/// Tool results are fed back tagged with the id the agent assigned
#[tokio::test]
async fn test_tool_result_fed_back() {
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_calls(
            "",
            vec![ToolCall::new("list_files", json!({"path": "."}))],
        )),
        Ok(ChatResponse::text("done")),
    ]);
    let result = agent(model.clone(), AgentConfig::default())
        .run("routing")
        .await
        .unwrap();

    assert_eq!(result.outcome, AgentOutcome::Done);
    assert_eq!(result.steps, 2);
    assert_eq!(result.tool_calls_made, 1);
    assert_eq!(result.tool_records[0].call_id, "call_1_0");
    assert!(!result.tool_records[0].is_error);

    let second = &model.seen()[1].messages;
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, "assistant");
    let requested = second[2].tool_calls.as_ref().unwrap();
    assert_eq!(requested[0].id.as_deref(), Some("call_1_0"));

    let tool = &second[3];
    assert_eq!(tool.role, "tool");
    assert_eq!(tool.tool_call_id.as_deref(), Some("call_1_0"));
    assert_eq!(tool.tool_name.as_deref(), Some("list_files"));
    let payload: serde_json::Value = serde_json::from_str(&tool.content).unwrap();
    assert_eq!(payload["entries"][0]["name"], "app");
    assert_eq!(payload["entries"][0]["type"], "dir");
    assert_eq!(payload["entries"][1]["name"], "index.md");
}

/// Several calls in one turn come back in call order, errors included
#[tokio::test]
async fn test_multiple_calls_keep_order() {
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_calls(
            "",
            vec![
                ToolCall::new("read_file", json!({"path": "missing.md"})).with_id("a"),
                ToolCall::new("grep", json!({"pattern": "revalidate", "path": "."})).with_id("b"),
                ToolCall::new("read_file", json!({"path": "app/routing.md", "limit": 1}))
                    .with_id("c"),
            ],
        )),
        Ok(ChatResponse::text("answer")),
    ]);
    let result = agent(model.clone(), AgentConfig::default())
        .run("revalidate")
        .await
        .unwrap();

    assert_eq!(result.tool_calls_made, 3);
    let ids: Vec<&str> = result.tool_records.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(result.tool_records[0].is_error);
    assert!(!result.tool_records[1].is_error);

    let seen = model.seen();
    let tools = tool_messages(&seen[1].messages);
    assert_eq!(tools.len(), 3);
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("a"));
    assert!(tools[0].content.contains("\"error\""));

    let grep: serde_json::Value = serde_json::from_str(&tools[1].content).unwrap();
    assert_eq!(grep["totalFound"], 2);
    assert_eq!(grep["truncated"], false);
    assert_eq!(grep["matches"][0]["file"], "app/caching.mdx");
    assert_eq!(grep["matches"][0]["line"], 2);

    let read: serde_json::Value = serde_json::from_str(&tools[2].content).unwrap();
    assert_eq!(read["content"], "# Routing");
    assert_eq!(read["totalLines"], 2);
    assert_eq!(read["showing"], "lines 1-1 of 2");
}

/// A slow first call finishing after a fast second one doesn't reorder results
#[tokio::test]
async fn test_out_of_order_completion_keeps_call_order() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let tree = SlowTree {
        inner: MemoryTree::new("/docs")
            .with_file("/docs/slow.md", "# Slow\nTook a while.")
            .with_file("/docs/fast.md", "# Fast"),
        delays: HashMap::from([(PathBuf::from("/docs/slow.md"), Duration::from_millis(300))]),
        finished: finished.clone(),
    };
    let config = CorpusConfig::default();
    let corpus = Corpus::with_tree("/docs", tree, &config);
    let registry = ToolRegistry::new(Arc::new(corpus), (&config).into());

    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_calls(
            "",
            vec![
                ToolCall::new("read_file", json!({"path": "slow.md"})).with_id("a"),
                ToolCall::new("read_file", json!({"path": "fast.md"})).with_id("b"),
            ],
        )),
        Ok(ChatResponse::text("done")),
    ]);
    let result = AgentController::new(model.clone(), registry, AgentConfig::default())
        .run("which is faster")
        .await
        .unwrap();

    assert_eq!(
        *finished.lock().unwrap(),
        vec![PathBuf::from("/docs/fast.md"), PathBuf::from("/docs/slow.md")]
    );

    let ids: Vec<&str> = result.tool_records.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let seen = model.seen();
    let tools = tool_messages(&seen[1].messages);
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("a"));
    assert_eq!(tools[1].tool_call_id.as_deref(), Some("b"));

    let slow: serde_json::Value = serde_json::from_str(&tools[0].content).unwrap();
    assert_eq!(slow["content"], "# Slow\nTook a while.");
    let fast: serde_json::Value = serde_json::from_str(&tools[1].content).unwrap();
    assert_eq!(fast["content"], "# Fast");
}

/// Escapes and unknown tools are reported to the model, not raised
#[tokio::test]
async fn test_tool_errors_do_not_abort() {
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_calls(
            "",
            vec![
                ToolCall::new("read_file", json!({"path": "../../etc/passwd"})),
                ToolCall::new("delete_file", json!({"path": "index.md"})),
                ToolCall::new("grep", json!({"pattern": "(", "path": "."})),
            ],
        )),
        Ok(ChatResponse::text("recovered")),
    ]);
    let result = agent(model.clone(), AgentConfig::default())
        .run("passwords")
        .await
        .unwrap();

    assert_eq!(result.outcome, AgentOutcome::Done);
    assert_eq!(result.answer, "recovered");
    assert!(result.tool_records.iter().all(|r| r.is_error));

    let seen = model.seen();
    let tools = tool_messages(&seen[1].messages);
    assert!(tools[0].content.contains("Access denied"));
    assert!(tools[1].content.contains("Unknown tool"));
}

/// The loop stops at max_steps with the last non-empty text
#[tokio::test]
async fn test_step_budget_exhausted() {
    let model = ScriptedModel::repeating(ChatResponse::tool_calls(
        "still looking",
        vec![ToolCall::new("list_files", json!({"path": "app"}))],
    ));
    let config = AgentConfig {
        max_steps: 3,
        ..AgentConfig::default()
    };
    let result = agent(model.clone(), config).run("anything").await.unwrap();

    assert_eq!(result.outcome, AgentOutcome::Exhausted);
    assert_eq!(result.steps, 3);
    assert_eq!(result.tool_calls_made, 3);
    assert_eq!(result.answer, "still looking");
    assert_eq!(model.seen().len(), 3);
}

/// Exhausting the budget without any text gives an empty answer
#[tokio::test]
async fn test_step_budget_exhausted_without_text() {
    let model = ScriptedModel::repeating(ChatResponse::tool_calls(
        "",
        vec![ToolCall::new("list_files", json!({"path": "."}))],
    ));
    let config = AgentConfig {
        max_steps: 2,
        ..AgentConfig::default()
    };
    let result = agent(model, config).run("anything").await.unwrap();

    assert_eq!(result.outcome, AgentOutcome::Exhausted);
    assert_eq!(result.answer, "");
}

/// A model failure ends the run with an error
#[tokio::test]
async fn test_model_error_is_fatal() {
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_calls(
            "",
            vec![ToolCall::new("list_files", json!({"path": "."}))],
        )),
        Err(ChatError::Status(500, "model crashed".to_string())),
    ]);
    let err = agent(model.clone(), AgentConfig::default())
        .run("routing")
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Model(ChatError::Status(500, _))));
    assert_eq!(model.seen().len(), 2);
}

/// Empty queries never reach the model
#[tokio::test]
async fn test_empty_query_rejected() {
    let model = ScriptedModel::new(vec![]);
    let err = agent(model.clone(), AgentConfig::default())
        .run("   ")
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::EmptyQuery));
    assert!(model.seen().is_empty());
}

/// An off-topic query can legitimately produce an empty answer
#[tokio::test]
async fn test_irrelevant_query_empty_answer() {
    let model = ScriptedModel::new(vec![Ok(ChatResponse::text(""))]);
    let result = agent(model, AgentConfig::default())
        .run("what is the capital of France")
        .await
        .unwrap();

    assert_eq!(result.outcome, AgentOutcome::Done);
    assert_eq!(result.answer, "");
}

/// Tool calls written as JSON in the text are executed too
#[tokio::test]
async fn test_text_embedded_tool_call() {
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::text(
            r#"{"name": "grep", "arguments": {"pattern": "slug", "path": "app"}}"#,
        )),
        Ok(ChatResponse::text("app/routing.md: Dynamic segments use [slug].")),
    ]);
    let result = agent(model.clone(), AgentConfig::default())
        .run("dynamic routes")
        .await
        .unwrap();

    assert_eq!(result.steps, 2);
    assert_eq!(result.tool_records[0].tool, "grep");
    assert_eq!(result.tool_records[0].call_id, "call_1_0");

    let seen = model.seen();
    let tools = tool_messages(&seen[1].messages);
    assert!(tools[0].content.contains("app/routing.md"));
}

/// A custom system prompt replaces the default one
#[tokio::test]
async fn test_custom_system_prompt() {
    let model = ScriptedModel::new(vec![Ok(ChatResponse::text("ok"))]);
    let config = AgentConfig {
        system_prompt: Some("Only quote docs.".to_string()),
        ..AgentConfig::default()
    };
    agent(model.clone(), config).run("caching").await.unwrap();

    assert_eq!(model.seen()[0].messages[0].content, "Only quote docs.");
}

/// Eager mode makes one call with the whole corpus and no tools
#[tokio::test]
async fn test_eager_mode_single_call() {
    let model = ScriptedModel::new(vec![Ok(ChatResponse::text("app/caching.mdx ..."))]);
    let config = AgentConfig {
        mode: RetrievalMode::Eager,
        ..AgentConfig::default()
    };
    let result = agent(model.clone(), config).run("caching").await.unwrap();

    assert_eq!(result.outcome, AgentOutcome::Done);
    assert_eq!(result.steps, 1);
    assert_eq!(result.answer, "app/caching.mdx ...");

    let seen = model.seen();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].tools_offered);
    let system = &seen[0].messages[0].content;
    assert!(system.contains("--- DOCUMENTATION START ---"));
    assert!(system.contains("--- FILE: app/caching.mdx ---"));
    assert!(system.contains("--- FILE: index.md ---"));
    assert!(system.contains("--- DOCUMENTATION END ---"));
}

// Integration tests that require external services

/// Full run against a local model (requires Ollama with qwen3 pulled)
#[tokio::test]
#[ignore = "Requires Ollama running on localhost:11434"]
async fn test_agent_live_ollama() {
    let controller = AgentController::new(
        Arc::new(ChatClient::new("http://localhost:11434")),
        registry(),
        AgentConfig::default(),
    );
    let result = controller
        .run("How do I purge cached data after a mutation?")
        .await
        .unwrap();
    assert!(result.steps >= 1);
    assert!(result.steps <= 15);
}
