// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON-RPC 2.0 over stdio exposing the bridge as tools.
//!
//! Tool calls run on their own tasks and a single writer task owns stdout,
//! so `respond_to_copilot` can settle a pending question while the run
//! that asked it is still in flight. Logging goes to stderr only; stdout
//! carries nothing but protocol frames.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::PermissionMode;
use crate::driver::{RunOptions, RunResult, Runner};
use crate::store::{cli_state_dir, list_cli_sessions, SessionStore};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "copilot-bridge";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize, Default)]
struct RunToolArgs {
    #[serde(default)]
    prompt: String,
    model: Option<String>,
    cwd: Option<String>,
    #[serde(default)]
    allow_tools: Vec<String>,
    #[serde(default)]
    add_dirs: Vec<String>,
    timeout_ms: Option<u64>,
    no_ask_user: Option<bool>,
    permission_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResumeToolArgs {
    session_id: String,
    #[serde(default)]
    prompt: String,
    model: Option<String>,
    cwd: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RespondToolArgs {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    answer: String,
}

/// Everything a tool call needs, shared across call tasks.
pub struct ServerState {
    pub runner: Runner,
    pub store: Mutex<SessionStore>,
    /// Where the CLI keeps its own session state.
    pub cli_state_dir: PathBuf,
}

impl ServerState {
    pub fn new(runner: Runner, store: SessionStore) -> Self {
        Self { runner, store: Mutex::new(store), cli_state_dir: cli_state_dir() }
    }
}

/// Serve requests from stdin until end of stream.
pub async fn serve(state: Arc<ServerState>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    info!(protocol = PROTOCOL_VERSION, "serving on stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        handle_line(&state, line, &out_tx);
    }
    debug!("stdin closed; shutting down");

    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

/// Parse and dispatch one frame. Tool calls are spawned; everything else
/// answers inline through the writer channel.
fn handle_line(state: &Arc<ServerState>, line: String, out_tx: &mpsc::UnboundedSender<String>) {
    let request: JsonRpcRequest = match serde_json::from_str(&line) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "unparseable frame");
            send(out_tx, JsonRpcResponse::err(Value::Null, PARSE_ERROR, "parse error"));
            return;
        }
    };
    if request.jsonrpc != "2.0" {
        if let Some(id) = request.id {
            send(out_tx, JsonRpcResponse::err(id, INVALID_REQUEST, "invalid JSON-RPC version"));
        }
        return;
    }

    match request.method.as_str() {
        "initialize" => {
            if let Some(id) = request.id {
                send(out_tx, JsonRpcResponse::ok(id, initialize_result()));
            }
        }
        "notifications/initialized" => {}
        "tools/list" => {
            if let Some(id) = request.id {
                send(out_tx, JsonRpcResponse::ok(id, json!({ "tools": tool_listing() })));
            }
        }
        "tools/call" => {
            let Some(id) = request.id else { return };
            let params: ToolCallParams =
                match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                    Ok(p) => p,
                    Err(e) => {
                        send(
                            out_tx,
                            JsonRpcResponse::err(id, INVALID_PARAMS, format!("bad params: {e}")),
                        );
                        return;
                    }
                };
            let state = Arc::clone(state);
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                debug!(tool = %params.name, "tool call started");
                let response = match call_tool(&state, &params.name, params.arguments).await {
                    Ok(result) => JsonRpcResponse::ok(id, result),
                    Err(ToolError::UnknownTool(name)) => JsonRpcResponse::err(
                        id,
                        METHOD_NOT_FOUND,
                        format!("unknown tool: {name}"),
                    ),
                    Err(ToolError::BadArguments(detail)) => {
                        JsonRpcResponse::err(id, INVALID_PARAMS, detail)
                    }
                };
                send(&out_tx, response);
            });
        }
        other => {
            if let Some(id) = request.id {
                send(
                    out_tx,
                    JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
                );
            }
        }
    }
}

fn send(out_tx: &mpsc::UnboundedSender<String>, response: JsonRpcResponse) {
    match serde_json::to_string(&response) {
        Ok(frame) => {
            let _ = out_tx.send(frame);
        }
        Err(e) => warn!(error = %e, "unserializable response"),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

fn tool_listing() -> Value {
    json!([
        {
            "name": "run_copilot_conversation",
            "description": "Execute a prompt with GitHub Copilot CLI and return the complete response. Use for one-shot tasks like code generation, explanation, or debugging.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "The prompt to send to Copilot CLI" },
                    "model": { "type": "string", "description": "AI model to use (e.g., claude-sonnet-4, gpt-4.1)" },
                    "cwd": { "type": "string", "description": "Working directory for Copilot to operate in" },
                    "allow_tools": { "type": "array", "items": { "type": "string" }, "description": "Specific tools to allow (e.g., 'shell(git:*)', 'write'). If not set, all tools are allowed." },
                    "add_dirs": { "type": "array", "items": { "type": "string" }, "description": "Additional directories Copilot may access" },
                    "timeout_ms": { "type": "number", "description": "Timeout in milliseconds (default: 300000)" },
                    "no_ask_user": { "type": "boolean", "description": "Disable the ask_user tool so Copilot works autonomously (default: true)" },
                    "permission_mode": { "type": "string", "enum": ["autonomous", "interactive"], "description": "Override the server's permission mode for this run" }
                },
                "required": ["prompt"]
            }
        },
        {
            "name": "resume_copilot_session",
            "description": "Resume a previous Copilot CLI session by session ID, continuing the conversation with a follow-up prompt.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "The session ID (UUID) to resume" },
                    "prompt": { "type": "string", "description": "Follow-up prompt or additional instructions" },
                    "model": { "type": "string", "description": "AI model to use (overrides the session's model)" },
                    "cwd": { "type": "string", "description": "Working directory (overrides the session's cwd)" },
                    "timeout_ms": { "type": "number", "description": "Timeout in milliseconds (default: 300000)" }
                },
                "required": ["session_id", "prompt"]
            }
        },
        {
            "name": "list_copilot_sessions",
            "description": "List available Copilot CLI sessions that can be resumed.",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "respond_to_copilot",
            "description": "Answer a question a running Copilot session is waiting on. Call with no session_id to list the currently pending questions.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Session whose question to answer" },
                    "answer": { "type": "string", "description": "The answer to type into the session (e.g., 'y', 'n', or free text)" }
                }
            }
        }
    ])
}

#[derive(Debug)]
enum ToolError {
    UnknownTool(String),
    BadArguments(String),
}

async fn call_tool(state: &ServerState, name: &str, arguments: Value) -> Result<Value, ToolError> {
    match name {
        "run_copilot_conversation" => {
            let args: RunToolArgs = parse_args(arguments)?;
            if args.prompt.is_empty() {
                return Err(ToolError::BadArguments("prompt is required".to_owned()));
            }
            Ok(run_conversation(state, args).await)
        }
        "resume_copilot_session" => {
            let args: ResumeToolArgs = parse_args(arguments)?;
            if args.prompt.is_empty() {
                return Err(ToolError::BadArguments("prompt is required".to_owned()));
            }
            Ok(resume_session(state, args).await)
        }
        "list_copilot_sessions" => Ok(list_sessions(state)),
        "respond_to_copilot" => {
            let args: RespondToolArgs = parse_args(arguments)?;
            Ok(respond(state, args))
        }
        other => Err(ToolError::UnknownTool(other.to_owned())),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::BadArguments(e.to_string()))
}

async fn run_conversation(state: &ServerState, args: RunToolArgs) -> Value {
    let allow_all = args.allow_tools.is_empty();
    let options = RunOptions {
        prompt: args.prompt.clone(),
        model: args.model.clone(),
        allow_tools: args.allow_tools,
        allow_all_tools: allow_all,
        add_dirs: args.add_dirs,
        cwd: args.cwd.clone().map(PathBuf::from),
        timeout: args.timeout_ms.map(Duration::from_millis),
        resume_session_id: None,
        no_ask_user: args.no_ask_user.unwrap_or(true),
        permission_mode: args.permission_mode.as_deref().map(PermissionMode::parse),
    };

    match state.runner.run(&options).await {
        Ok(result) => {
            if let Some(ref session_id) = result.session_id {
                state.store.lock().register(
                    session_id,
                    &args.prompt,
                    args.model.as_deref(),
                    options.cwd.as_deref(),
                );
            }
            run_payload(&result, result.session_id.as_deref())
        }
        Err(e) => error_payload(&format!("Error running Copilot CLI: {e}")),
    }
}

async fn resume_session(state: &ServerState, args: ResumeToolArgs) -> Value {
    // Known sessions contribute their model and cwd when the call omits them.
    let remembered = state.store.lock().get(&args.session_id).cloned();
    let options = RunOptions {
        prompt: args.prompt,
        model: args.model.or_else(|| remembered.as_ref().and_then(|m| m.model.clone())),
        cwd: args
            .cwd
            .or_else(|| remembered.as_ref().and_then(|m| m.cwd.clone()))
            .map(PathBuf::from),
        timeout: args.timeout_ms.map(Duration::from_millis),
        resume_session_id: Some(args.session_id.clone()),
        ..RunOptions::default()
    };

    match state.runner.run(&options).await {
        Ok(result) => {
            state.store.lock().touch(&args.session_id);
            run_payload(&result, Some(&args.session_id))
        }
        Err(e) => error_payload(&format!("Error resuming Copilot session: {e}")),
    }
}

fn list_sessions(state: &ServerState) -> Value {
    let managed = state.store.lock().list();
    let on_disk = list_cli_sessions(&state.cli_state_dir);

    let mut lines: Vec<String> = Vec::new();
    if !managed.is_empty() {
        lines.push("## Managed Sessions (with metadata)".to_owned());
        lines.push(String::new());
        for session in managed.iter().take(20) {
            lines.push(format!("- **{}**", session.session_id));
            lines.push(format!("  - Prompt: {}", session.initial_prompt));
            lines.push(format!("  - Model: {}", session.model.as_deref().unwrap_or("default")));
            lines.push(format!("  - Created: {}", session.created_at_ms));
            lines.push(format!("  - Last used: {}", session.last_used_at_ms));
            lines.push(String::new());
        }
    }
    lines.push(format!("## All Copilot Sessions ({} total)", on_disk.len()));
    lines.push(String::new());
    for session_id in on_disk.iter().take(10) {
        let tag = if managed.iter().any(|s| s.session_id == *session_id) {
            " (managed)"
        } else {
            ""
        };
        lines.push(format!("- {session_id}{tag}"));
    }

    let text = lines.join("\n");
    let text = if text.trim().is_empty() { "No sessions found.".to_owned() } else { text };
    text_payload(&text)
}

fn respond(state: &ServerState, args: RespondToolArgs) -> Value {
    let registry = state.runner.registry();
    if !args.session_id.is_empty() && !args.answer.is_empty() {
        if registry.provide_input(&args.session_id, &args.answer) {
            return text_payload(&format!("Answer delivered to session {}.", args.session_id));
        }
        // Fall through to the listing so the caller can see what is live.
    }

    let pending = registry.list_pending();
    if pending.is_empty() {
        let text = if args.session_id.is_empty() {
            "No sessions are waiting for input.".to_owned()
        } else {
            format!("No pending question for session {}. No sessions are waiting for input.", args.session_id)
        };
        return error_payload(&text);
    }

    let mut lines = vec!["## Pending Questions".to_owned(), String::new()];
    for q in pending {
        lines.push(format!("- **{}**: {}", q.session_id, q.question));
    }
    if args.session_id.is_empty() {
        text_payload(&lines.join("\n"))
    } else {
        lines.insert(0, format!("No pending question for session {}.", args.session_id));
        lines.insert(1, String::new());
        error_payload(&lines.join("\n"))
    }
}

/// Result shape shared by the run tools: output text, then a metadata line.
fn run_payload(result: &RunResult, session_id: Option<&str>) -> Value {
    let mut metadata: Vec<String> = Vec::new();
    if let Some(id) = session_id {
        metadata.push(format!("Session ID: {id}"));
    }
    metadata.push(format!("Duration: {}ms", result.duration_ms));
    metadata.push(format!("Exit code: {}", result.exit_code));
    if result.needs_input == Some(true) {
        metadata.push(format!(
            "Needs input: {}",
            result.pending_question.as_deref().unwrap_or("(unknown question)")
        ));
    }

    json!({
        "content": [
            { "type": "text", "text": result.output },
            { "type": "text", "text": format!("\n---\n{}", metadata.join(" | ")) }
        ]
    })
}

fn text_payload(text: &str) -> Value {
    json!({ "content": [ { "type": "text", "text": text } ] })
}

fn error_payload(text: &str) -> Value {
    json!({ "content": [ { "type": "text", "text": text } ], "isError": true })
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
