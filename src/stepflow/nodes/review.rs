//! Code-review pipeline nodes
//!
//! Each node reads and writes plain JSON in the workflow state:
//! - `code`: Python source under review (input)
//! - `functions`: one [`FunctionReport`] per definition found
//! - `issues`: every issue as `{function, issue}`
//! - `suggestions`, `quality_score`, `iterations`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::tools;
use crate::runtime::node::NodeResult;
use crate::stepflow::workflow::state::WorkflowState;

/// Lines longer than this count as an issue
pub const LONG_LINE_THRESHOLD: usize = 100;
/// More parameters than this count as an issue
pub const MAX_PARAMETERS: usize = 5;
/// Complexity above this earns a split suggestion
pub const MAX_COMPLEXITY: usize = 10;
/// Issues per function that drive the quality score to zero
pub const ISSUES_PER_FUNCTION: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub name: String,
    pub source: String,
    pub line_start: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub function: String,
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub function: String,
    pub suggestions: Vec<String>,
}

fn functions(state: &WorkflowState) -> Result<Vec<FunctionReport>, serde_json::Error> {
    match state.get("functions") {
        Some(value) => serde_json::from_value(value.clone()),
        None => Ok(Vec::new()),
    }
}

fn store_functions(
    state: &mut WorkflowState,
    functions: &[FunctionReport],
) -> Result<(), serde_json::Error> {
    state.update("functions", serde_json::to_value(functions)?);
    Ok(())
}

/// Split `state.code` into functions
pub fn extract_functions(mut state: WorkflowState) -> NodeResult {
    let found: Vec<FunctionReport> = match state.get("code") {
        Some(Value::String(code)) => tools::extract_functions(code)
            .into_iter()
            .map(|f| FunctionReport {
                name: f.name,
                source: f.source,
                line_start: f.line_start,
                complexity_score: None,
                issues: None,
                suggestions: None,
            })
            .collect(),
        _ => Vec::new(),
    };
    log::debug!("Extracted {} functions", found.len());
    store_functions(&mut state, &found)?;
    Ok(state)
}

/// Score each function as 1 plus its branching keywords
pub fn check_complexity(mut state: WorkflowState) -> NodeResult {
    let mut found = functions(&state)?;
    for function in &mut found {
        function.complexity_score = Some(1 + tools::count_control_flow(&function.source));
    }
    store_functions(&mut state, &found)?;
    Ok(state)
}

/// Flag long lines, TODOs, missing docstrings and long parameter lists
pub fn detect_issues(mut state: WorkflowState) -> NodeResult {
    let mut found = functions(&state)?;
    let mut issues = Vec::new();

    for function in &mut found {
        let src = &function.source;
        let mut function_issues = Vec::new();

        let long_lines = tools::detect_long_lines(src, LONG_LINE_THRESHOLD);
        if !long_lines.is_empty() {
            function_issues.push(format!("Long lines: {:?}", long_lines));
        }
        let todos = tools::detect_todos(src);
        if !todos.is_empty() {
            function_issues.push(format!("TODO comments: {:?}", todos));
        }
        if tools::missing_docstring(src) {
            function_issues.push("Missing docstring".to_string());
        }
        let params = tools::count_parameters(src);
        if params > MAX_PARAMETERS {
            function_issues.push(format!("Too many parameters: {}", params));
        }

        issues.extend(function_issues.iter().map(|issue| Issue {
            function: function.name.clone(),
            issue: issue.clone(),
        }));
        function.issues = Some(function_issues);
    }

    log::debug!("Detected {} issues", issues.len());
    store_functions(&mut state, &found)?;
    state.update("issues", serde_json::to_value(&issues)?);
    Ok(state)
}

/// Suggest fixes and compute `quality_score` in `[0, 1]`
pub fn suggest_improvements(mut state: WorkflowState) -> NodeResult {
    let mut found = functions(&state)?;
    let total_issues = state
        .get("issues")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let mut suggestions = Vec::with_capacity(found.len());

    for function in &mut found {
        let mut function_suggestions = Vec::new();
        if function.complexity_score.unwrap_or(0) > MAX_COMPLEXITY {
            function_suggestions.push(
                "Break function into smaller pieces (high complexity)".to_string(),
            );
        }
        if let Some(issues) = function.issues.as_ref().filter(|i| !i.is_empty()) {
            function_suggestions.push(format!("Address {} code issues", issues.len()));
        }
        suggestions.push(Suggestion {
            function: function.name.clone(),
            suggestions: function_suggestions.clone(),
        });
        function.suggestions = Some(function_suggestions);
    }

    let max_issues = found.len() * ISSUES_PER_FUNCTION;
    let quality_score = if max_issues > 0 {
        (1.0 - total_issues as f64 / max_issues as f64).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let iterations = state
        .get("iterations")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        + 1;

    store_functions(&mut state, &found)?;
    state.update("suggestions", serde_json::to_value(&suggestions)?);
    state.update("quality_score", json!(quality_score));
    state.update("iterations", json!(iterations));
    Ok(state)
}

/// Terminal node; passes the state through
pub fn end_node(state: WorkflowState) -> NodeResult {
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn code_state() -> WorkflowState {
        WorkflowState::from_json(json!({ "code": SAMPLE_CODE })).unwrap()
    }

    fn run_all(state: WorkflowState) -> WorkflowState {
        let state = extract_functions(state).unwrap();
        let state = check_complexity(state).unwrap();
        let state = detect_issues(state).unwrap();
        suggest_improvements(state).unwrap()
    }

    #[test]
    fn test_extract_functions() {
        let state = extract_functions(code_state()).unwrap();
        let found = functions(&state).unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["hello", "complex_function", "bad_function"]);
        assert_eq!(found[0].line_start, 2);
        assert!(found[2].source.ends_with("return x + y"));
    }

    #[test]
    fn test_extract_functions_without_code() {
        let state = extract_functions(WorkflowState::empty()).unwrap();
        assert_eq!(state.get("functions"), Some(&json!([])));

        let state =
            extract_functions(WorkflowState::from_json(json!({"code": 42})).unwrap()).unwrap();
        assert_eq!(state.get("functions"), Some(&json!([])));
    }

    #[test]
    fn test_check_complexity() {
        let state = check_complexity(extract_functions(code_state()).unwrap()).unwrap();
        let found = functions(&state).unwrap();
        assert_eq!(found[0].complexity_score, Some(1));
        // if, and, for, while, if, or, plus the "and" inside the long string
        assert_eq!(found[1].complexity_score, Some(8));
    }

    #[test]
    fn test_detect_issues() {
        let state = detect_issues(extract_functions(code_state()).unwrap()).unwrap();
        let found = functions(&state).unwrap();

        assert_eq!(
            found[0].issues.as_deref(),
            Some(&["TODO comments: [2]".to_string(), "Missing docstring".to_string()][..])
        );
        let complex = found[1].issues.clone().unwrap();
        assert!(complex.iter().any(|i| i.starts_with("Long lines")));
        assert!(complex.contains(&"Too many parameters: 7".to_string()));

        let raw = state.get("issues").unwrap().clone();
        let issues: Vec<Issue> = serde_json::from_value(raw).unwrap();
        assert_eq!(issues.len(), 7);
        assert_eq!(issues[0].function, "hello");
    }

    #[test]
    fn test_suggest_improvements_scores_quality() {
        let state = run_all(code_state());
        let score = state.get("quality_score").and_then(Value::as_f64).unwrap();
        assert!((score - (1.0 - 7.0 / 15.0)).abs() < 1e-9);
        assert_eq!(state.get("iterations"), Some(&json!(1)));

        let suggestions: Vec<Suggestion> =
            serde_json::from_value(state.get("suggestions").unwrap().clone()).unwrap();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].suggestions, vec!["Address 2 code issues"]);
    }

    #[test]
    fn test_suggest_improvements_counts_iterations() {
        let state = suggest_improvements(run_all(code_state())).unwrap();
        assert_eq!(state.get("iterations"), Some(&json!(2)));
    }

    #[test]
    fn test_quality_is_perfect_without_functions() {
        let state = run_all(WorkflowState::empty());
        assert_eq!(state.get("quality_score"), Some(&json!(1.0)));
    }

    #[test]
    fn test_malformed_functions_fail_the_node() {
        let state = WorkflowState::from_json(json!({"functions": "not a list"})).unwrap();
        assert!(check_complexity(state).is_err());
    }

    #[test]
    fn test_end_node_is_identity() {
        let state = code_state();
        assert_eq!(end_node(state.clone()).unwrap(), state);
    }
}
