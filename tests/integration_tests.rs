//! Integration tests for graph loading and execution
//!
//! These tests drive the public API end to end with the built-in
//! code-review nodes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use stepflow_rs::runtime::{FlowError, NodeResult};
use stepflow_rs::stepflow::nodes::default_registry;
use stepflow_rs::stepflow::server::{router, AppState};
use stepflow_rs::stepflow::workflow::condition::{self, ConditionCause};
use stepflow_rs::stepflow::workflow::graph::{normalize_graph, GraphDefinition, WorkflowEngine};
use stepflow_rs::stepflow::workflow::loader::GraphLoader;
use stepflow_rs::stepflow::workflow::registry::NodeRegistry;
use stepflow_rs::stepflow::workflow::state::WorkflowState;
use tower::ServiceExt;

// ============================================================================
// Fixtures
// ============================================================================

const SAMPLE_CODE: &str = r#"
def hello(name):
    # TODO: add more functionality
    print(f"Hello, {name}!")

def complex_function(a, b, c, d, e, f, g):
    if a > 0 and b > 0:
        for i in range(a):
            while i < b:
                if c or d:
                    print(f"Very long line that exceeds 100 characters limit and is intentionally written to trigger the long line detection {c}")
                i += 1
    return a + b

def bad_function(x, y, z, w, p, q, r):
    # This function has too many parameters
    # and a missing docstring
    return x + y
"#;

/// One function with three issues: a score of 0.4 that never improves
const POOR_CODE: &str = "def f(a, b, c, d, e, g):\n    # TODO fix\n    return a\n";

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/code_review.yaml")
}

fn code_state(code: &str) -> WorkflowState {
    WorkflowState::from_json(json!({ "code": code })).unwrap()
}

// ============================================================================
// Demo pipeline
// ============================================================================

#[test]
fn test_demo_graph_loads() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    assert_eq!(graph.start_node, "extract_functions");
    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(
        graph.successors("suggest_improvements"),
        ["suggest_improvements", "end_node"]
    );
}

#[test]
fn test_code_review_reaches_quality_threshold() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    let engine = WorkflowEngine::new(default_registry());

    let (final_state, log) = engine.execute(&graph, &code_state(SAMPLE_CODE)).unwrap();

    assert_eq!(
        log.path(),
        vec![
            "extract_functions",
            "check_complexity",
            "detect_issues",
            "suggest_improvements",
            "end_node"
        ]
    );
    let score = final_state.get("quality_score").and_then(Value::as_f64).unwrap();
    assert!(score >= 0.5);
    assert_eq!(final_state.get("iterations"), Some(&json!(1)));
    assert_eq!(final_state.get("issues").unwrap().as_array().unwrap().len(), 7);
    assert_eq!(log.entries()[3].decision, vec!["end_node"]);
}

#[test]
fn test_code_review_stops_after_five_iterations() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    let engine = WorkflowEngine::new(default_registry());

    let (final_state, log) = engine.execute(&graph, &code_state(POOR_CODE)).unwrap();

    assert_eq!(final_state.get("iterations"), Some(&json!(5)));
    assert_eq!(log.len(), 8);
    let last = log.last().unwrap();
    assert_eq!(last.node_name, "suggest_improvements");
    assert!(last.decision.is_empty());
}

#[test]
fn test_code_review_without_code() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    let engine = WorkflowEngine::new(default_registry());

    let (final_state, log) = engine.execute(&graph, &WorkflowState::empty()).unwrap();
    assert_eq!(final_state.get("functions"), Some(&json!([])));
    assert_eq!(final_state.get("quality_score"), Some(&json!(1.0)));
    assert_eq!(log.last().unwrap().node_name, "end_node");
}

#[test]
fn test_log_snapshots_track_each_step() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    let engine = WorkflowEngine::new(default_registry());

    let (_, log) = engine.execute(&graph, &code_state(SAMPLE_CODE)).unwrap();

    let first = &log.entries()[0];
    assert!(!first.entry_state.contains_key("functions"));
    assert!(first.exit_state.contains_key("functions"));
    for pair in log.entries().windows(2) {
        assert_eq!(pair[0].exit_state, pair[1].entry_state);
        assert_eq!(pair[0].step + 1, pair[1].step);
    }
}

// ============================================================================
// Engine behaviour
// ============================================================================

#[test]
fn test_engine_shared_across_threads() {
    let graph = Arc::new(GraphLoader::new().load(demo_path()).unwrap());
    let engine = Arc::new(WorkflowEngine::new(default_registry()));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let graph = graph.clone();
                let engine = engine.clone();
                scope.spawn(move || {
                    let code = if i % 2 == 0 { SAMPLE_CODE } else { POOR_CODE };
                    engine.execute(&graph, &code_state(code)).unwrap().1.len()
                })
            })
            .collect();
        let lengths: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(lengths, vec![5, 8, 5, 8]);
    });
}

#[test]
fn test_normalized_graph_runs_with_custom_nodes() {
    let graph = normalize_graph(json!({
        "edges": {"classify": ["search", "code"]},
        "conditions": {
            "classify->search": "state['intent'] == 'search'",
            "classify->code": "state['intent'] == 'code'"
        },
        "start_node": "classify"
    }))
    .unwrap();
    graph.validate().unwrap();

    let registry = NodeRegistry::new()
        .with("classify", |mut state: WorkflowState| -> NodeResult {
            state.update("intent", json!("code"));
            Ok(state)
        })
        .with("search", |_state: WorkflowState| -> NodeResult {
            Err("search should not run".into())
        })
        .with("code", |mut state: WorkflowState| -> NodeResult {
            state.update("handled_by", json!("code"));
            Ok(state)
        });

    let (state, log) = WorkflowEngine::new(registry)
        .execute(&graph, &WorkflowState::empty())
        .unwrap();
    assert_eq!(state.get("handled_by"), Some(&json!("code")));
    assert_eq!(log.path(), vec!["classify", "code"]);
}

#[test]
fn test_step_limit_applies_to_demo_loop() {
    let graph = GraphLoader::new().load(demo_path()).unwrap();
    let engine = WorkflowEngine::new(default_registry()).with_max_steps(6);

    let err = engine.execute(&graph, &code_state(POOR_CODE)).unwrap_err();
    assert!(matches!(err, FlowError::StepLimitExceeded { limit: 6 }));
}

#[test]
fn test_missing_function_for_custom_graph() {
    let graph = GraphDefinition::new("a").node_with_func("a", "no_such_function");
    let err = WorkflowEngine::new(default_registry())
        .execute(&graph, &WorkflowState::empty())
        .unwrap_err();
    assert!(matches!(err, FlowError::MissingNodeFunction { .. }));
}

// ============================================================================
// Condition sandbox
// ============================================================================

#[test]
fn test_conditions_never_reach_outside_state() {
    let state = WorkflowState::from_json(json!({"x": 1})).unwrap();
    for expression in [
        "__import__('os').system('echo hi')",
        "open('/etc/passwd').read()",
        "state.__class__",
        "state.keys()",
        "globals()",
        "x > 0",
        "lambda: 1",
        "state['x'] if True else 0",
    ] {
        let err = condition::evaluate(expression, &state).unwrap_err();
        assert!(
            matches!(
                err.cause,
                ConditionCause::Disallowed(_) | ConditionCause::Syntax { .. }
            ),
            "{} was not rejected up front",
            expression
        );
        assert!(err.to_string().starts_with("Invalid or unsafe condition: "));
    }
}

#[test]
fn test_condition_examples() {
    let state = WorkflowState::from_json(json!({"x": 10, "i": 2, "name": "ada"})).unwrap();
    assert!(condition::evaluate("state['x'] > 5", &state).unwrap());
    assert!(condition::evaluate("state.get('i', 0) < 5", &state).unwrap());
    assert!(condition::evaluate("state.get('missing', 0) < 5", &state).unwrap());
    let greeting = "state['name'] == 'ada' and not state.get('done')";
    assert!(condition::evaluate(greeting, &state).unwrap());
    assert!(condition::evaluate("state['missing'] > 5", &state).is_err());
}

// ============================================================================
// HTTP API
// ============================================================================

async fn call(app: axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_http_code_review_run() {
    let app = router(AppState::new(WorkflowEngine::new(default_registry())));
    let raw: Value = serde_yaml::from_str(&std::fs::read_to_string(demo_path()).unwrap()).unwrap();

    let (status, body) = call(app.clone(), "POST", "/graph/create", raw).await;
    assert_eq!(status, StatusCode::OK);
    let graph_id = body["graph_id"].as_str().unwrap().to_string();

    let (status, body) = call(
        app,
        "POST",
        "/graph/run",
        json!({"graph_id": graph_id, "initial_state": {"code": SAMPLE_CODE}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["log"].as_array().unwrap().len(), 5);
    assert_eq!(body["final_state"]["iterations"], 1);
}
