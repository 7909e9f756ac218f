//! Path addressing into a [`MappingNode`].
//!
//! Paths start at the root `$` and continue with `.name`, `["name"]` or
//! `[index]` segments, e.g. `$.vpcConfig.subnetIds[0]`. There are no wildcards
//! or filters.

use std::fmt::Display;

use crate::value::MappingNode;

/// Maximum number of segments a path may traverse.
pub const MAX_TRAVERSE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path {path:?} must start with \"$\"")]
    MissingRoot { path: String },
    #[error("invalid path {path:?}: unexpected input at position {position}")]
    InvalidSegment { path: String, position: usize },
    #[error("path {path:?} exceeds the maximum traversal depth of {max}")]
    TooDeep { path: String, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn parse(path: &str) -> Result<Path, PathError> {
        let rest = path.strip_prefix('$').ok_or_else(|| PathError::MissingRoot {
            path: path.to_string(),
        })?;
        let bytes = rest.as_bytes();
        let invalid = |i: usize| PathError::InvalidSegment {
            path: path.to_string(),
            // +1 for the root marker
            position: i + 1,
        };

        let mut segments = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if segments.len() == MAX_TRAVERSE_DEPTH {
                return Err(PathError::TooDeep {
                    path: path.to_string(),
                    max: MAX_TRAVERSE_DEPTH,
                });
            }
            match bytes[i] {
                b'.' => {
                    let start = i + 1;
                    let end = rest[start..]
                        .find(&['.', '['][..])
                        .map_or(rest.len(), |offset| start + offset);
                    if end == start {
                        return Err(invalid(i));
                    }
                    segments.push(PathSegment::Field(rest[start..end].to_string()));
                    i = end;
                }
                b'[' => {
                    let close = rest[i..]
                        .find(']')
                        .map(|offset| i + offset)
                        .ok_or_else(|| invalid(i))?;
                    let inner = &rest[i + 1..close];
                    let segment = if let Some(quoted) = inner
                        .strip_prefix('"')
                        .and_then(|s| s.strip_suffix('"'))
                    {
                        PathSegment::Field(quoted.to_string())
                    } else {
                        PathSegment::Index(inner.parse().map_err(|_| invalid(i))?)
                    };
                    segments.push(segment);
                    i = close + 1;
                }
                _ => return Err(invalid(i)),
            }
        }
        Ok(Path { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn get<'a>(&self, node: &'a MappingNode) -> Option<&'a MappingNode> {
        self.segments
            .iter()
            .try_fold(node, |current, segment| match (segment, current) {
                (PathSegment::Field(name), MappingNode::Fields(fields)) => fields.get(name),
                (PathSegment::Index(index), MappingNode::Items(items)) => items.get(*index),
                _ => None,
            })
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Looks up `path` in `node`.
///
/// A missing location is `Ok(None)`; only a malformed or over-deep path is an
/// error.
pub fn get_value_by_path<'a>(
    path: &str,
    node: &'a MappingNode,
) -> Result<Option<&'a MappingNode>, PathError> {
    Ok(Path::parse(path)?.get(node))
}

/// Turns a root-relative path into the form used by change sets, e.g.
/// `$.memorySize` in scope `spec` becomes `spec.memorySize`.
pub fn qualify(scope: &str, path: &str) -> String {
    let rest = path.strip_prefix('$').unwrap_or(path);
    if scope.is_empty() {
        rest.strip_prefix('.').unwrap_or(rest).to_string()
    } else {
        format!("{}{}", scope, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> MappingNode {
        MappingNode::from(json!({
            "memorySize": 256,
            "vpcConfig": {
                "subnetIds": ["subnet-1", "subnet-2"]
            },
            "environment": {
                "variables": {"with.dot": "yes"}
            }
        }))
    }

    #[test]
    fn test_field_access() {
        let spec = spec();
        let value = get_value_by_path("$.memorySize", &spec).unwrap();
        assert_eq!(value, Some(&MappingNode::int(256)));
    }

    #[test]
    fn test_index_and_quoted_access() {
        let spec = spec();
        assert_eq!(
            get_value_by_path("$.vpcConfig.subnetIds[1]", &spec).unwrap(),
            Some(&MappingNode::string("subnet-2"))
        );
        assert_eq!(
            get_value_by_path("$.environment.variables[\"with.dot\"]", &spec).unwrap(),
            Some(&MappingNode::string("yes"))
        );
    }

    #[test]
    fn test_root_returns_whole_tree() {
        let spec = spec();
        assert_eq!(get_value_by_path("$", &spec).unwrap(), Some(&spec));
    }

    #[test]
    fn test_missing_is_not_an_error() {
        let spec = spec();
        assert_eq!(get_value_by_path("$.timeout", &spec).unwrap(), None);
        assert_eq!(get_value_by_path("$.memorySize.nested", &spec).unwrap(), None);
        assert_eq!(get_value_by_path("$.vpcConfig.subnetIds[7]", &spec).unwrap(), None);
    }

    #[test]
    fn test_malformed_paths() {
        let spec = spec();
        assert!(matches!(
            get_value_by_path("memorySize", &spec),
            Err(PathError::MissingRoot { .. })
        ));
        assert!(matches!(
            get_value_by_path("$..memorySize", &spec),
            Err(PathError::InvalidSegment { position: 1, .. })
        ));
        assert!(matches!(
            get_value_by_path("$.a[x]", &spec),
            Err(PathError::InvalidSegment { .. })
        ));
        assert!(matches!(
            get_value_by_path("$.a[0", &spec),
            Err(PathError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_depth_is_capped() {
        let ok = format!("${}", ".a".repeat(MAX_TRAVERSE_DEPTH));
        assert!(Path::parse(&ok).is_ok());

        let too_deep = format!("${}", ".a".repeat(MAX_TRAVERSE_DEPTH + 1));
        assert_eq!(
            Path::parse(&too_deep),
            Err(PathError::TooDeep {
                path: too_deep.clone(),
                max: MAX_TRAVERSE_DEPTH
            })
        );
    }

    #[test]
    fn test_display_normalises() {
        let path = Path::parse("$[\"vpcConfig\"].subnetIds[0]").unwrap();
        assert_eq!(path.to_string(), "$.vpcConfig.subnetIds[0]");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("spec", "$.memorySize"), "spec.memorySize");
        assert_eq!(
            qualify("spec.imageConfig", "$.entryPoint"),
            "spec.imageConfig.entryPoint"
        );
        assert_eq!(qualify("", "$.tags"), "tags");
    }
}
