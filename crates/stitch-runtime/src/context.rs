//! Render context: ambient globals plus a stack of local scopes.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Variables visible while rendering.
///
/// Globals are shared, read-only data that partially isolated components
/// still see (site name, current user, and so on). Scopes hold locals; the
/// innermost scope wins on lookup.
#[derive(Debug, Clone, Default)]
pub struct Context {
    globals: Arc<Map<String, Value>>,
    scopes: Vec<Map<String, Value>>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose only scope holds `data`.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            globals: Arc::default(),
            scopes: vec![data],
        }
    }

    /// Create a context from globals and local data.
    #[must_use]
    pub fn with_globals(globals: Map<String, Value>, data: Map<String, Value>) -> Self {
        Self {
            globals: Arc::new(globals),
            scopes: vec![data],
        }
    }

    /// Context for a partially isolated component: same globals, fresh locals.
    #[must_use]
    pub fn isolated(&self, data: Map<String, Value>) -> Self {
        Self {
            globals: Arc::clone(&self.globals),
            scopes: vec![data],
        }
    }

    /// Ambient globals.
    #[must_use]
    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }

    /// Push a new innermost scope.
    pub fn push(&mut self, scope: Map<String, Value>) {
        self.scopes.push(scope);
    }

    /// Remove and return the innermost scope.
    pub fn pop(&mut self) -> Option<Map<String, Value>> {
        self.scopes.pop()
    }

    /// Set `key` in the innermost scope, creating one if needed.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if self.scopes.is_empty() {
            self.scopes.push(Map::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Look up a top-level name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(key))
            .or_else(|| self.globals.get(key))
    }

    /// Resolve a dotted path such as `user.name` or `items.0`.
    ///
    /// Numeric segments index arrays. Returns `None` if any segment is missing.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Whether `text` is a dotted variable path (`user.name`, `items.0`).
///
/// The first segment must start with a letter or `_`; later segments may be
/// numeric indexes.
#[must_use]
pub fn is_variable_path(text: &str) -> bool {
    let mut segments = text.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    let is_ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');

    is_ident(first)
        && first.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && segments.all(is_ident)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_inner_scope_shadows_outer_and_globals() {
        let mut ctx = Context::with_globals(map(json!({"a": "global", "g": 1})), map(json!({"a": "outer"})));
        ctx.push(map(json!({"a": "inner"})));

        assert_eq!(ctx.get("a"), Some(&json!("inner")));
        assert_eq!(ctx.get("g"), Some(&json!(1)));

        ctx.pop();
        assert_eq!(ctx.get("a"), Some(&json!("outer")));
    }

    #[test]
    fn test_lookup_dotted_paths() {
        let ctx = Context::from_map(map(json!({
            "user": {"name": "Ada", "tags": ["x", "y"]},
        })));

        assert_eq!(ctx.lookup("user.name"), Some(&json!("Ada")));
        assert_eq!(ctx.lookup("user.tags.1"), Some(&json!("y")));
        assert_eq!(ctx.lookup("user.tags.5"), None);
        assert_eq!(ctx.lookup("user.missing"), None);
        assert_eq!(ctx.lookup("user.name.first"), None);
    }

    #[test]
    fn test_isolated_keeps_globals_only() {
        let ctx = Context::with_globals(map(json!({"site": "S"})), map(json!({"local": 1})));
        let child = ctx.isolated(map(json!({"title": "T"})));

        assert_eq!(child.get("site"), Some(&json!("S")));
        assert_eq!(child.get("title"), Some(&json!("T")));
        assert_eq!(child.get("local"), None);
    }

    #[test]
    fn test_set_creates_scope() {
        let mut ctx = Context::new();
        ctx.set("x", json!(1));
        assert_eq!(ctx.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_is_variable_path() {
        assert!(is_variable_path("user"));
        assert!(is_variable_path("user.name"));
        assert!(is_variable_path("items.0"));
        assert!(is_variable_path("_private"));
        assert!(is_variable_path("True"));
        assert!(!is_variable_path(""));
        assert!(!is_variable_path("1.5"));
        assert!(!is_variable_path("a..b"));
        assert!(!is_variable_path("'quoted'"));
        assert!(!is_variable_path("a-b"));
        assert!(!is_variable_path("[1]"));
    }
}
