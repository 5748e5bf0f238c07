use serde_json::{Map, Value};

/// Collapses repeated separators and strips the trailing one; the result
/// always starts with `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Decoded, non-empty segments of a request path.
pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// Compiled scope path. `:name` segments capture one request segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Static(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    /// Matches the pattern against the start of `path`, capturing params.
    pub(crate) fn match_prefix(&self, path: &[String]) -> Option<Map<String, Value>> {
        if path.len() < self.segments.len() {
            return None;
        }

        let mut params = Map::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Static(expected) if expected == actual => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), Value::String(actual.clone()));
                }
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(path: &str) -> Vec<String> {
        split_path(path)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("books/"), "/books");
        assert_eq!(normalize_path("//books///:id//"), "/books/:id");
    }

    #[test]
    fn test_split_path_decodes_segments() {
        assert_eq!(segments("/books/war%20and%20peace/"), vec!["books", "war and peace"]);
        assert!(segments("/").is_empty());
    }

    #[test]
    fn test_prefix_match_captures_params() {
        let pattern = Pattern::parse("/books/:id");

        let params = pattern.match_prefix(&segments("/books/10/edit")).unwrap();
        assert_eq!(Value::Object(params), json!({"id": "10"}));
        assert!(pattern.match_prefix(&segments("/books")).is_none());
        assert!(pattern.match_prefix(&segments("/authors/10")).is_none());
    }

    #[test]
    fn test_root_pattern_matches_everything() {
        let pattern = Pattern::parse("/");

        assert_eq!(pattern.len(), 0);
        assert!(pattern.match_prefix(&segments("/anything")).is_some());
    }
}
