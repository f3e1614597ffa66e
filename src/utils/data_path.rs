use crate::errors::ExecutionError;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ExecutionError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ExecutionError::invalid_argument(
            "Path must be a non-empty string",
        ));
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    for ch in trimmed.chars() {
        match ch {
            '.' if !in_brackets => {
                if !current.trim().is_empty() {
                    segments.push(segment_from(&current));
                }
                current.clear();
            }
            '[' => {
                if !current.trim().is_empty() {
                    segments.push(segment_from(&current));
                    current.clear();
                }
                in_brackets = true;
            }
            ']' => {
                if !current.trim().is_empty() {
                    segments.push(segment_from(&current));
                }
                current.clear();
                in_brackets = false;
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        segments.push(segment_from(&current));
    }
    Ok(segments)
}

fn segment_from(raw: &str) -> PathSegment {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'').trim();
    if let Ok(index) = trimmed.parse::<usize>() {
        return PathSegment::Index(index);
    }
    PathSegment::Key(trimmed.to_string())
}

/// Walks `target` along a dot path. An empty path returns the whole value;
/// a missing segment is a classified failure naming the path.
pub fn get_path_value(target: &Value, path: &str) -> Result<Value, ExecutionError> {
    if path.trim().is_empty() {
        return Ok(target.clone());
    }
    let segments = parse_path(path)?;
    let mut current = target;
    for segment in &segments {
        let next = match segment {
            PathSegment::Key(key) => current.get(key),
            PathSegment::Index(index) => current.as_array().and_then(|arr| arr.get(*index)),
        };
        current = next
            .ok_or_else(|| ExecutionError::failed(format!("Path '{}' not found", path)))?;
    }
    Ok(current.clone())
}
