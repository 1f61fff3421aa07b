//! Graph loader - YAML/JSON file loading and parsing
//!
//! Files go through the same normalization as graphs submitted over HTTP
//! and are then validated, guards included.

use serde_json::Value;
use std::fs;
use std::path::Path;

use super::graph::{normalize_graph, GraphDefinition};
use crate::runtime::error::FlowError;

/// Loads graph definitions from files
pub struct GraphLoader;

impl GraphLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a graph from a `.json`, `.yaml` or `.yml` file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<GraphDefinition, FlowError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("Loading graph from {}", path.display());

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::parse_json(&content)
        } else {
            Self::parse_yaml(&content)
        }
    }

    /// Parse a graph from YAML text
    pub fn parse_yaml(content: &str) -> Result<GraphDefinition, FlowError> {
        let raw: Value = serde_yaml::from_str(content)?;
        Self::finish(raw)
    }

    /// Parse a graph from JSON text
    pub fn parse_json(content: &str) -> Result<GraphDefinition, FlowError> {
        let raw: Value = serde_json::from_str(content)?;
        Self::finish(raw)
    }

    fn finish(raw: Value) -> Result<GraphDefinition, FlowError> {
        let graph = normalize_graph(raw)?;
        graph.validate()?;
        Ok(graph)
    }
}

impl Default for GraphLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REVIEW_YAML: &str = r#"
start_node: extract
nodes:
  extract: {}
  review:
    func: suggest_improvements
  done:
    func: end_node
edges:
  extract: [review]
  review: [review, done]
conditions:
  "review->review": "state.get('iterations', 0) < 5"
  "review->done": "state['quality_score'] >= 0.5"
"#;

    #[test]
    fn test_parse_yaml_graph() {
        let graph = GraphLoader::parse_yaml(REVIEW_YAML).unwrap();
        assert_eq!(graph.start_node, "extract");
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes["review"].function_name("review"), "suggest_improvements");
        assert_eq!(graph.successors("review"), ["review", "done"]);
        assert_eq!(
            graph.guard("review", "done"),
            Some("state['quality_score'] >= 0.5")
        );
    }

    #[test]
    fn test_parse_json_graph() {
        let graph = GraphLoader::parse_json(
            r#"{"nodes": {"a": {}}, "edges": {"a": ["b"]}, "start_node": "a"}"#,
        )
        .unwrap();
        assert!(graph.nodes.contains_key("b"));
    }

    #[test]
    fn test_yaml_without_start_uses_first_declared_node() {
        let yaml = r#"
nodes:
  review: {}
  extract: {}
edges:
  extract: [review]
"#;
        let graph = GraphLoader::parse_yaml(yaml).unwrap();
        assert_eq!(graph.start_node, "review");
    }

    #[test]
    fn test_bad_guard_is_rejected_on_load() {
        let yaml = r#"
start_node: a
edges:
  a: [b]
conditions:
  "a->b": "open('/etc/passwd')"
"#;
        assert!(matches!(
            GraphLoader::parse_yaml(yaml),
            Err(FlowError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = "start_node: [unclosed";
        assert!(matches!(
            GraphLoader::parse_yaml(yaml),
            Err(FlowError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("stepflow-loader-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let yaml_path = dir.join("graph.yaml");
        fs::File::create(&yaml_path)
            .unwrap()
            .write_all(REVIEW_YAML.as_bytes())
            .unwrap();
        let json_path = dir.join("graph.json");
        fs::write(&json_path, r#"{"start_node": "only"}"#).unwrap();

        let loader = GraphLoader::new();
        assert_eq!(loader.load(&yaml_path).unwrap().start_node, "extract");
        assert!(loader.load(&json_path).unwrap().nodes.contains_key("only"));
        assert!(matches!(
            loader.load(dir.join("missing.yaml")),
            Err(FlowError::Io(_))
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
