//! Handlers for `/api/tasks`, `/api/agents`, and `/api/execute` (§6.2).
//! Every handler returns a fully built `Response`: success through
//! `success_response`, failure through `GatewayError::into_response_with`.
//! The output-filter stage still runs after these on the way out.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use conclave_types::{Task, TaskKind, Worker, WorkerStatus};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;
use crate::envelope::{error_response, success_response};
use crate::error::GatewayError;
use crate::proxy::{execute_proxy_request, ProxyRequest};
use crate::state::GatewayState;

fn ctx(parts: &axum::http::request::Parts) -> Option<RequestContext> {
    parts.extensions.get::<RequestContext>().cloned()
}

// ---- /api/tasks ----

#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    #[serde(default)]
    pub id: Option<String>,
    pub objective: String,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct PatchTaskInput {
    #[serde(default)]
    pub objective: Option<String>,
}

pub async fn list_tasks(State(state): State<GatewayState>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let tasks = state.registry.list_tasks();
    success_response(StatusCode::OK, json!(tasks), ctx(&parts).as_ref())
}

pub async fn get_task(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    match state.registry.get_task(&id) {
        Some(record) => success_response(StatusCode::OK, json!(record), ctx(&parts).as_ref()),
        None => GatewayError::new("RES_001", format!("task '{id}' not found")).into_response_with(ctx(&parts).as_ref()),
    }
}

pub async fn create_task(
    State(state): State<GatewayState>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", "could not read request body", None, c.as_ref()),
    };
    let input: CreateTaskInput = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", &format!("invalid task body: {e}"), None, c.as_ref()),
    };
    let task = Task {
        id: input.id.unwrap_or_else(GatewayState::new_task_id),
        kind: input.kind.unwrap_or(TaskKind::Composite),
        objective: input.objective,
        constraints: input.constraints,
        output_schema: input.output_schema,
        priority: None,
        complexity: None,
    };
    let record = state.registry.insert_task(task);
    success_response(StatusCode::CREATED, json!(record), c.as_ref())
}

pub async fn patch_task(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let input: PatchTaskInput = serde_json::from_slice(&bytes).unwrap_or(PatchTaskInput { objective: None });
    match state.registry.patch_task(&id, input.objective) {
        Some(record) => success_response(StatusCode::OK, json!(record), c.as_ref()),
        None => GatewayError::new("RES_001", format!("task '{id}' not found")).into_response_with(c.as_ref()),
    }
}

pub async fn delete_task(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let c = ctx(&parts);
    if state.registry.delete_task(&id) {
        success_response(StatusCode::OK, json!({ "deleted": id }), c.as_ref())
    } else {
        GatewayError::new("RES_001", format!("task '{id}' not found")).into_response_with(c.as_ref())
    }
}

// ---- /api/agents ----

fn worker_json(w: &Worker) -> serde_json::Value {
    json!({
        "id": w.id,
        "status": w.status,
        "currentTaskId": w.current_task_id,
        "load": w.load,
        "capabilities": w.capabilities,
        "lastHeartbeat": w.last_heartbeat,
    })
}

pub async fn list_agents(State(state): State<GatewayState>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let workers: Vec<_> = state.orchestrator.pool().workers().iter().map(worker_json).collect();
    success_response(StatusCode::OK, json!(workers), ctx(&parts).as_ref())
}

pub async fn get_agent(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let c = ctx(&parts);
    match state.orchestrator.pool().workers().into_iter().find(|w| w.id == id) {
        Some(w) => success_response(StatusCode::OK, worker_json(&w), c.as_ref()),
        None => GatewayError::new("RES_001", format!("agent '{id}' not found")).into_response_with(c.as_ref()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterAgentInput {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

pub async fn create_agent(
    State(state): State<GatewayState>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", "could not read request body", None, c.as_ref()),
    };
    let input: RegisterAgentInput = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", &format!("invalid agent body: {e}"), None, c.as_ref()),
    };
    let mut worker = Worker::new(&input.id);
    worker.capabilities = input.capabilities;
    if state.orchestrator.pool().register(worker.clone()) {
        success_response(StatusCode::CREATED, worker_json(&worker), c.as_ref())
    } else {
        error_response(StatusCode::CONFLICT, "REQ_001", &format!("agent '{}' already registered or pool full", input.id), None, c.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchAgentInput {
    #[serde(default)]
    pub status: Option<WorkerStatus>,
}

pub async fn patch_agent(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let input: PatchAgentInput = serde_json::from_slice(&bytes).unwrap_or(PatchAgentInput { status: None });
    let Some(status) = input.status else {
        return error_response(StatusCode::BAD_REQUEST, "REQ_001", "patch requires a status field", None, c.as_ref());
    };
    if state.orchestrator.pool().update_worker_status(&id, status, None) {
        success_response(StatusCode::OK, json!({ "id": id, "status": status }), c.as_ref())
    } else {
        GatewayError::new("RES_001", format!("agent '{id}' not found")).into_response_with(c.as_ref())
    }
}

pub async fn delete_agent(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let c = ctx(&parts);
    if state.orchestrator.pool().unregister(&id) {
        success_response(StatusCode::OK, json!({ "deleted": id }), c.as_ref())
    } else {
        GatewayError::new("RES_001", format!("agent '{id}' not found")).into_response_with(c.as_ref())
    }
}

pub async fn agent_status(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let c = ctx(&parts);
    match state.orchestrator.pool().workers().into_iter().find(|w| w.id == id) {
        Some(w) => success_response(StatusCode::OK, json!({ "id": w.id, "status": w.status, "load": w.load }), c.as_ref()),
        None => GatewayError::new("RES_001", format!("agent '{id}' not found")).into_response_with(c.as_ref()),
    }
}

// ---- /api/execute ----

#[derive(Debug, Deserialize)]
pub struct ExecuteInput {
    #[serde(default)]
    pub id: Option<String>,
    pub objective: String,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

pub async fn execute_task(
    State(state): State<GatewayState>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", "could not read request body", None, c.as_ref()),
    };
    let input: ExecuteInput = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", &format!("invalid execute body: {e}"), None, c.as_ref()),
    };
    let task = Task {
        id: input.id.unwrap_or_else(GatewayState::new_task_id),
        kind: input.kind.unwrap_or(TaskKind::Composite),
        objective: input.objective,
        constraints: input.constraints,
        output_schema: None,
        priority: None,
        complexity: None,
    };
    state.registry.insert_task(task.clone());
    let result = state.orchestrator.run(task, CancellationToken::new()).await;
    state.registry.record_execution(result.clone());
    success_response(StatusCode::OK, json!(result), c.as_ref())
}

#[derive(Debug, Deserialize)]
pub struct ToolExecuteInput {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Direct single-tool invocation, bypassing the plan/assign lifecycle.
/// Out of scope per the core control-plane spec (tool execution is the
/// worker's province); this records the request but cannot itself run a
/// tool, since no executor is wired into the gateway.
pub async fn execute_tool(request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let input: Result<ToolExecuteInput, _> = serde_json::from_slice(&bytes);
    match input {
        Ok(input) => error_response(
            StatusCode::NOT_IMPLEMENTED,
            "SRV_002",
            &format!("no executor is wired in for tool '{}'", input.tool),
            None,
            c.as_ref(),
        ),
        Err(e) => error_response(StatusCode::BAD_REQUEST, "REQ_001", &format!("invalid tool body: {e}"), None, c.as_ref()),
    }
}

pub async fn execute_proxy(
    State(state): State<GatewayState>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let c = ctx(&parts);
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", "could not read request body", None, c.as_ref()),
    };
    let input: ProxyRequest = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "REQ_001", &format!("invalid proxy body: {e}"), None, c.as_ref()),
    };
    match execute_proxy_request(&state, c.as_ref(), input).await {
        Ok(response) => success_response(StatusCode::OK, json!(response), c.as_ref()),
        Err(e) => e.into_response_with(c.as_ref()),
    }
}

/// `/api/execute/mcp` forwards to an MCP server the same way the outbound
/// proxy forwards to an arbitrary allow-listed host; MCP transport itself
/// is an external collaborator (§1 Out of scope).
pub async fn execute_mcp(request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    error_response(
        StatusCode::NOT_IMPLEMENTED,
        "SRV_002",
        "MCP transport is not wired into this gateway",
        None,
        ctx(&parts).as_ref(),
    )
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn execute_history(State(state): State<GatewayState>, Query(q): Query<HistoryQuery>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let mut history = state.registry.execution_history();
    if let Some(limit) = q.limit {
        let start = history.len().saturating_sub(limit);
        history = history.split_off(start);
    }
    success_response(StatusCode::OK, json!(history), ctx(&parts).as_ref())
}

pub async fn execute_by_id(State(state): State<GatewayState>, Path(id): Path<String>, request: axum::extract::Request) -> Response {
    let (parts, _) = request.into_parts();
    let c = ctx(&parts);
    match state.registry.execution_by_id(&id) {
        Some(result) => success_response(StatusCode::OK, json!(result), c.as_ref()),
        None => GatewayError::new("RES_001", format!("no execution recorded for task '{id}'")).into_response_with(c.as_ref()),
    }
}

// ---- public routes ----

pub async fn banner(State(state): State<GatewayState>) -> Response {
    success_response(StatusCode::OK, json!({ "service": state.config.service_name, "status": "ok" }), None)
}

pub async fn health(State(state): State<GatewayState>) -> Response {
    success_response(
        StatusCode::OK,
        json!({
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "version": env!("CARGO_PKG_VERSION"),
            "service": state.config.service_name,
        }),
        None,
    )
}
