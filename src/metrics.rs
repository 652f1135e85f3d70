//! Prometheus metrics for the retrieval service
//!
//! All metrics live in the default registry and are created lazily on first
//! use. `GET /metrics` renders them with [`gather_text`].
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `docscout_rag_requests_total` | counter | status |
//! | `docscout_requests_in_flight` | gauge | - |
//! | `docscout_agent_tasks_total` | counter | outcome |
//! | `docscout_agent_steps` | histogram | - |
//! | `docscout_tool_calls_total` | counter | tool, status |
//! | `docscout_llm_call_duration_seconds` | histogram | model |
//! | `docscout_grep_matches` | histogram | - |

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// HTTP queries by response status ("ok", "bad_request", "rate_limited", "model_error", "timeout")
    pub static ref RAG_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "docscout_rag_requests_total",
        "Queries received on /api/rag by status",
        &["status"]
    )
    .expect("register docscout_rag_requests_total");

    /// Queries currently running
    pub static ref REQUESTS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "docscout_requests_in_flight",
        "Queries currently being answered"
    )
    .expect("register docscout_requests_in_flight");

    /// Agent runs by outcome ("done", "exhausted", "model_error")
    pub static ref AGENT_TASKS: IntCounterVec = register_int_counter_vec!(
        "docscout_agent_tasks_total",
        "Agent runs by terminal outcome",
        &["outcome"]
    )
    .expect("register docscout_agent_tasks_total");

    /// Model turns per agent run
    pub static ref AGENT_STEPS: Histogram = register_histogram!(
        "docscout_agent_steps",
        "Model turns used per agent run",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0, 20.0, 30.0]
    )
    .expect("register docscout_agent_steps");

    /// Tool executions by tool name and status ("ok", "error")
    pub static ref TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "docscout_tool_calls_total",
        "Tool executions by tool and status",
        &["tool", "status"]
    )
    .expect("register docscout_tool_calls_total");

    /// Latency of a single model call
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "docscout_llm_call_duration_seconds",
        "Duration of one model call",
        &["model"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("register docscout_llm_call_duration_seconds");

    /// Matches returned per grep call
    pub static ref GREP_MATCHES: Histogram = register_histogram!(
        "docscout_grep_matches",
        "Matches returned by one grep call",
        vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .expect("register docscout_grep_matches");
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
