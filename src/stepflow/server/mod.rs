// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::runtime::error::FlowError;
use crate::stepflow::config::AppConfig;
use crate::stepflow::workflow::graph::{normalize_graph, GraphDefinition, WorkflowEngine};
use crate::stepflow::workflow::log::ExecutionLog;
use crate::stepflow::workflow::registry::NodeRegistry;
use crate::stepflow::workflow::run::Run;
use crate::stepflow::workflow::state::WorkflowState;
use crate::stepflow::workflow::store::{GraphStore, RunStore};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    engine: Arc<WorkflowEngine>,
    graphs: GraphStore,
    runs: RunStore,
}

impl AppState {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            graphs: GraphStore::new(),
            runs: RunStore::new(),
        }
    }

    pub fn runs(&self) -> &RunStore {
        &self.runs
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/graph/create", post(create_graph))
        .route("/graph/run", post(run_graph))
        .route("/graph/run-async", post(run_graph_async))
        .route("/graph/state/{run_id}", get(get_run_state))
        .route("/graph/runs/{graph_id}", get(list_runs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    config: &AppConfig,
    registry: NodeRegistry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let engine = WorkflowEngine::from_config(registry, config);
    let app = router(AppState::new(engine));

    let addr = config.socket_addr();
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// An error response: status code plus `{"detail": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn execution(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Execution failed: {}", err),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        let status = match &err {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            FlowError::InvalidGraph(_)
            | FlowError::InvalidState(_)
            | FlowError::InvalidCondition { .. }
            | FlowError::Json(_)
            | FlowError::Yaml(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RunGraphRequest {
    pub graph_id: String,
    #[serde(default)]
    pub initial_state: WorkflowState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGraphResponse {
    pub graph_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunGraphResponse {
    pub run_id: String,
    pub final_state: WorkflowState,
    pub log: ExecutionLog,
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_graph(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<CreateGraphResponse>, ApiError> {
    let graph = normalize_graph(payload)?;
    graph.validate()?;

    let graph_id = state.graphs.insert(graph).await;
    log::info!("Created graph {}", graph_id);
    Ok(Json(CreateGraphResponse { graph_id }))
}

/// Run the engine on the blocking pool
async fn execute_blocking(
    engine: Arc<WorkflowEngine>,
    graph: Arc<GraphDefinition>,
    initial: WorkflowState,
) -> Result<(WorkflowState, ExecutionLog), ApiError> {
    tokio::task::spawn_blocking(move || engine.execute(&graph, &initial))
        .await
        .map_err(ApiError::execution)?
        .map_err(|e| {
            log::error!("Execution failed: {}", e);
            ApiError::execution(e)
        })
}

async fn run_graph(
    State(state): State<AppState>,
    Json(request): Json<RunGraphRequest>,
) -> Result<Json<RunGraphResponse>, ApiError> {
    let graph = state.graphs.get(&request.graph_id).await?;
    let mut run = Run::start(&request.graph_id, request.initial_state.clone());

    let (final_state, log) =
        execute_blocking(state.engine.clone(), graph, request.initial_state).await?;

    run.complete(final_state.clone(), log.clone());
    let run_id = run.run_id.clone();
    state.runs.put(run).await;

    Ok(Json(RunGraphResponse {
        run_id,
        final_state,
        log,
    }))
}

async fn run_graph_async(
    State(state): State<AppState>,
    Json(request): Json<RunGraphRequest>,
) -> Result<Json<Value>, ApiError> {
    let graph = state.graphs.get(&request.graph_id).await?;
    let run = state
        .runs
        .reserve(&request.graph_id, request.initial_state.clone())
        .await;
    let run_id = run.run_id;

    let engine = state.engine.clone();
    let runs = state.runs.clone();
    let background_id = run_id.clone();
    tokio::spawn(async move {
        log::info!("Background run started: {}", background_id);
        match execute_blocking(engine, graph, request.initial_state).await {
            Ok((final_state, log)) => {
                if let Err(e) = runs.complete(&background_id, final_state, log).await {
                    log::error!("Failed to record run {}: {}", background_id, e);
                } else {
                    log::info!("Background run completed: {}", background_id);
                }
            }
            Err(e) => runs.mark_failed(&background_id, &e.message).await,
        }
    });

    Ok(Json(json!({ "run_id": run_id, "status": "started" })))
}

async fn get_run_state(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(state.runs.get(&run_id).await?))
}

/// Every run of one graph, oldest first
async fn list_runs(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Result<Json<Vec<Run>>, ApiError> {
    state.graphs.get(&graph_id).await?;
    Ok(Json(state.runs.list_for_graph(&graph_id).await))
}
