//! Tool registry: the operations the model may call
//!
//! The tool set is closed. [`ToolKind`] names the three tools, [`ToolRequest`]
//! carries validated arguments for one of them, and [`ToolRegistry::execute`]
//! dispatches with an exhaustive `match`.
//!
//! ```text
//! ToolCall { name, arguments: Value }
//!        │
//!        ▼
//! ToolRequest::parse ──unknown tool / bad args──► ToolOutput::Error
//!        │
//!        ▼
//! ToolRegistry::execute ──► Corpus ──► ToolOutput (success | {error})
//! ```
//!
//! Execution never fails from the caller's point of view: every problem
//! becomes a `{"error": "..."}` payload the model can read and react to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::corpus::{Corpus, CorpusConfig, DirEntry, FileSlice, SearchResult};
use crate::metrics::{GREP_MATCHES, TOOL_CALLS};
use crate::ollama::{Tool, ToolFunction};

/// The tools exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListFiles,
    ReadFile,
    Grep,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::ListFiles, ToolKind::ReadFile, ToolKind::Grep];

    /// Name the model uses to call the tool
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListFiles => "list_files",
            ToolKind::ReadFile => "read_file",
            ToolKind::Grep => "grep",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Tool definition sent to the model, with its JSON Schema
    pub fn definition(self) -> Tool {
        let (description, parameters) = match self {
            ToolKind::ListFiles => (
                "List the files and subdirectories of a directory in the documentation tree. \
                 Use \".\" for the top level.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory path relative to the docs root"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            ToolKind::ReadFile => (
                "Read a documentation file, a page of lines at a time. Use offset to continue \
                 where the previous page ended.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File path relative to the docs root"
                        },
                        "offset": {
                            "type": "integer",
                            "description": "0-based line to start from (default 0)"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Number of lines to read (default 200)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            ToolKind::Grep => (
                "Search documentation files for a case-insensitive regular expression. \
                 Searches a single file, or every document under a directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Regular expression, matched case-insensitively per line"
                        },
                        "path": {
                            "type": "string",
                            "description": "File or directory relative to the docs root"
                        },
                        "maxResults": {
                            "type": "integer",
                            "description": "Maximum matches to return (default 20)"
                        }
                    },
                    "required": ["pattern", "path"]
                }),
            ),
        };

        Tool {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFilesArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    pub path: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrepArgs {
    pub pattern: String,
    pub path: String,
    #[serde(default, rename = "maxResults", alias = "max_results")]
    pub max_results: Option<u64>,
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    ListFiles(ListFilesArgs),
    ReadFile(ReadFileArgs),
    Grep(GrepArgs),
}

/// Error raised while turning a raw call into a [`ToolRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    UnknownTool(String),
    InvalidArguments { tool: &'static str, message: String },
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::UnknownTool(name) => write!(
                f,
                "Unknown tool: {} (available: list_files, read_file, grep)",
                name
            ),
            ToolError::InvalidArguments { tool, message } => {
                write!(f, "Invalid arguments for {}: {}", tool, message)
            }
        }
    }
}

impl std::error::Error for ToolError {}

impl ToolRequest {
    /// Validate raw JSON arguments against the tool's schema
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: kind.name(),
            message: e.to_string(),
        };

        // A call with no arguments at all is an empty object, so missing
        // required fields get reported by name
        let empty = json!({});
        let arguments = if arguments.is_null() { &empty } else { arguments };

        Ok(match kind {
            ToolKind::ListFiles => {
                ToolRequest::ListFiles(ListFilesArgs::deserialize(arguments).map_err(invalid)?)
            }
            ToolKind::ReadFile => {
                ToolRequest::ReadFile(ReadFileArgs::deserialize(arguments).map_err(invalid)?)
            }
            ToolKind::Grep => ToolRequest::Grep(GrepArgs::deserialize(arguments).map_err(invalid)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::ListFiles(_) => ToolKind::ListFiles,
            ToolRequest::ReadFile(_) => ToolKind::ReadFile,
            ToolRequest::Grep(_) => ToolKind::Grep,
        }
    }
}

/// Result of one tool execution, serialized straight into the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Entries { entries: Vec<DirEntry> },
    File(FileSlice),
    Search(SearchResult),
    Error { error: String },
}

impl ToolOutput {
    pub fn error(message: impl std::fmt::Display) -> Self {
        ToolOutput::Error {
            error: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error { .. })
    }

    /// JSON text handed back to the model
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode tool output: {}"}}"#, e))
    }
}

/// Bounds applied to caller-supplied tool arguments
#[derive(Debug, Clone, Copy)]
pub struct ToolLimits {
    pub default_read_limit: usize,
    pub max_read_limit: usize,
    pub default_max_results: usize,
    pub max_results_limit: usize,
}

impl From<&CorpusConfig> for ToolLimits {
    fn from(config: &CorpusConfig) -> Self {
        Self {
            default_read_limit: config.default_read_limit,
            max_read_limit: config.max_read_limit.max(1),
            default_max_results: config.default_max_results,
            max_results_limit: config.max_results_limit.max(1),
        }
    }
}

/// Executes tool requests against a shared corpus
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    corpus: Arc<Corpus>,
    limits: ToolLimits,
}

impl ToolRegistry {
    pub fn new(corpus: Arc<Corpus>, limits: ToolLimits) -> Self {
        Self { corpus, limits }
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Definitions of every tool, in a stable order
    pub fn definitions(&self) -> Vec<Tool> {
        ToolKind::ALL.into_iter().map(ToolKind::definition).collect()
    }

    /// Names of every tool
    pub fn names(&self) -> Vec<&'static str> {
        ToolKind::ALL.into_iter().map(ToolKind::name).collect()
    }

    /// Parse and execute a raw call
    pub fn call(&self, name: &str, arguments: &Value) -> ToolOutput {
        match ToolRequest::parse(name, arguments) {
            Ok(request) => self.execute(&request),
            Err(e) => {
                TOOL_CALLS.with_label_values(&["invalid", "error"]).inc();
                debug!(tool = name, error = %e, "Rejected tool call");
                ToolOutput::error(e)
            }
        }
    }

    /// Execute a validated request. Blocking: reads the filesystem.
    pub fn execute(&self, request: &ToolRequest) -> ToolOutput {
        let output = match request {
            ToolRequest::ListFiles(args) => match self.corpus.list(&args.path) {
                Ok(entries) => ToolOutput::Entries { entries },
                Err(e) => ToolOutput::error(e),
            },
            ToolRequest::ReadFile(args) => {
                let offset = args.offset.unwrap_or(0) as usize;
                let limit = args
                    .limit
                    .map(|l| l as usize)
                    .unwrap_or(self.limits.default_read_limit)
                    .clamp(1, self.limits.max_read_limit);
                match self.corpus.read_range(&args.path, offset, limit) {
                    Ok(slice) => ToolOutput::File(slice),
                    Err(e) => ToolOutput::error(e),
                }
            }
            ToolRequest::Grep(args) => {
                let max_results = args
                    .max_results
                    .map(|m| m as usize)
                    .unwrap_or(self.limits.default_max_results)
                    .clamp(1, self.limits.max_results_limit);
                match self.corpus.search(&args.path, &args.pattern, max_results) {
                    Ok(result) => {
                        GREP_MATCHES.observe(result.total_found as f64);
                        ToolOutput::Search(result)
                    }
                    Err(e) => ToolOutput::error(e),
                }
            }
        };

        let status = if output.is_error() { "error" } else { "ok" };
        TOOL_CALLS
            .with_label_values(&[request.kind().name(), status])
            .inc();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryTree;

    fn registry() -> ToolRegistry {
        let config = CorpusConfig::default();
        let tree = MemoryTree::new("/docs")
            .with_file("/docs/intro.md", "Welcome\nData fetching\nCaching")
            .with_file("/docs/app/routing.mdx", "# Routing\nfetching in layouts");
        let corpus = Corpus::with_tree("/docs", tree, &config);
        ToolRegistry::new(Arc::new(corpus), ToolLimits::from(&config))
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("write_file"), None);
    }

    #[test]
    fn test_definitions_have_required_fields() {
        let grep = ToolKind::Grep.definition();
        assert_eq!(grep.tool_type, "function");
        assert_eq!(grep.function.parameters["required"], json!(["pattern", "path"]));
        let read = ToolKind::ReadFile.definition();
        assert_eq!(read.function.parameters["required"], json!(["path"]));
        assert_eq!(registry().definitions().len(), 3);
    }

    #[test]
    fn test_parse_valid_requests() {
        assert_eq!(
            ToolRequest::parse("grep", &json!({"pattern": "x", "path": ".", "maxResults": 5})).unwrap(),
            ToolRequest::Grep(GrepArgs {
                pattern: "x".into(),
                path: ".".into(),
                max_results: Some(5)
            })
        );
        assert_eq!(
            ToolRequest::parse("read_file", &json!({"path": "a.md"})).unwrap(),
            ToolRequest::ReadFile(ReadFileArgs {
                path: "a.md".into(),
                offset: None,
                limit: None
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed_arguments() {
        assert!(matches!(
            ToolRequest::parse("list_files", &json!({})),
            Err(ToolError::InvalidArguments { tool: "list_files", .. })
        ));
        assert!(ToolRequest::parse("list_files", &Value::Null).is_err());
        assert!(ToolRequest::parse("read_file", &json!({"path": "a", "offset": -1})).is_err());
        assert!(ToolRequest::parse("read_file", &json!({"path": 7})).is_err());
        assert!(ToolRequest::parse("grep", &json!({"pattern": "x", "path": ".", "extra": 1})).is_err());
        assert!(matches!(
            ToolRequest::parse("delete", &json!({})),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_list_files_output_shape() {
        let out = registry().call("list_files", &json!({"path": "."}));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"entries": [{"name": "app", "type": "dir"}, {"name": "intro.md", "type": "file"}]})
        );
    }

    #[test]
    fn test_read_file_output_shape() {
        let out = registry().call("read_file", &json!({"path": "intro.md", "offset": 1, "limit": 1}));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"content": "Data fetching", "totalLines": 3, "showing": "lines 2-2 of 3"})
        );
    }

    #[test]
    fn test_grep_output_shape() {
        let out = registry().call("grep", &json!({"pattern": "FETCHING", "path": "."}));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "matches": [
                    {"file": "app/routing.mdx", "line": 2, "text": "fetching in layouts"},
                    {"file": "intro.md", "line": 2, "text": "Data fetching"}
                ],
                "totalFound": 2,
                "truncated": false
            })
        );
    }

    #[test]
    fn test_grep_max_results_clamped() {
        let out = registry().call("grep", &json!({"pattern": "fetching", "path": ".", "maxResults": 0}));
        match out {
            ToolOutput::Search(result) => {
                assert_eq!(result.total_found, 1);
                assert!(result.truncated);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_errors_become_error_payloads() {
        let reg = registry();
        let out = reg.call("read_file", &json!({"path": "../../etc/passwd"}));
        let json = serde_json::to_value(&out).unwrap();
        assert!(json["error"].as_str().unwrap().contains("outside allowed directory"));

        let out = reg.call("list_files", &json!({"path": "nope"}));
        assert!(out.is_error());

        let out = reg.call("grep", &json!({"pattern": "(", "path": "."}));
        assert!(out.to_json().starts_with(r#"{"error":"#));

        let out = reg.call("bogus", &json!({}));
        assert!(out.is_error());
    }
}
