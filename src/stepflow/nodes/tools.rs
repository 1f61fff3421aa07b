// SPDX-License-Identifier: MIT

//! Text scanning helpers for Python source
//!
//! Line numbers are 1-based and relative to the text passed in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(")
        .expect("function definition pattern")
});

static PARAMETER_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)def\s+\w+\s*\((.*?)\)\s*(?:->[^:]*)?:").expect("parameter list pattern")
});

static CONTROL_FLOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:if|for|while|and|or)\b").expect("control flow pattern"));

/// A function definition found in a larger source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSource {
    pub name: String,
    pub source: String,
    pub line_start: usize,
}

/// Find every `def` and the indented block that belongs to it
pub fn extract_functions(code: &str) -> Vec<FunctionSource> {
    let lines: Vec<&str> = code.lines().collect();

    FUNCTION_DEF
        .captures_iter(code)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let indent = caps.get(1).map_or(0, |m| m.as_str().len());
            let name = caps.get(2)?.as_str().to_string();
            let start = code[..whole.start()].matches('\n').count();

            let mut end = start + 1;
            let mut last_code_line = start;
            let mut in_signature = !signature_closed(lines.get(start).copied().unwrap_or(""));
            while end < lines.len() {
                let line = lines[end];
                if in_signature {
                    in_signature = !signature_closed(line);
                    last_code_line = end;
                } else if !line.trim().is_empty() {
                    if indentation(line) <= indent {
                        break;
                    }
                    last_code_line = end;
                }
                end += 1;
            }

            Some(FunctionSource {
                name,
                source: lines[start..=last_code_line].join("\n"),
                line_start: start + 1,
            })
        })
        .collect()
}

/// Line numbers of lines longer than `threshold` characters
pub fn detect_long_lines(source: &str, threshold: usize) -> Vec<usize> {
    source
        .split('\n')
        .enumerate()
        .filter(|(_, line)| line.chars().count() > threshold)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Line numbers of lines mentioning TODO
pub fn detect_todos(source: &str) -> Vec<usize> {
    source
        .split('\n')
        .enumerate()
        .filter(|(_, line)| line.contains("TODO"))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Whether the first function in `source` lacks a docstring
pub fn missing_docstring(source: &str) -> bool {
    let lines: Vec<&str> = source.trim().split('\n').map(str::trim).collect();
    let Some(def) = lines
        .iter()
        .position(|line| line.starts_with("def ") || line.starts_with("async def "))
    else {
        return false;
    };
    // The body starts after the line that closes the signature.
    let Some(close) = lines[def..].iter().position(|line| line.ends_with(':')) else {
        return false;
    };
    match lines[def + close + 1..].iter().find(|line| !line.is_empty()) {
        Some(line) => !(line.contains("\"\"\"") || line.contains("'''")),
        None => false,
    }
}

/// Number of parameters of the first function in `source`
pub fn count_parameters(source: &str) -> usize {
    PARAMETER_LIST
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map_or(0, |params| {
            params
                .as_str()
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .count()
        })
}

/// Occurrences of `if`, `for`, `while`, `and` and `or` as whole words
pub fn count_control_flow(source: &str) -> usize {
    CONTROL_FLOW.find_iter(source).count()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn signature_closed(line: &str) -> bool {
    line.trim_end().ends_with(':')
}
