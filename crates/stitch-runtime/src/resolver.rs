//! Dynamic attribute resolution.
//!
//! A `:`-prefixed attribute value runs through an ordered chain of
//! resolvers; the first one that produces a value wins:
//!
//! 1. variable lookup (`user.name`)
//! 2. boolean (empty value)
//! 3. embedded template (`{{ ... }}` or `{% ... %}`), kept only if rendering
//!    changed the text
//! 4. literal (`[1, 2]`, `'text'`, `True`, ...)
//!
//! If none applies the value is [`AttributeValue::Unprocessable`], which is
//! never an error: callers fall back to a declared default.

use serde_json::Value;

use crate::context::is_variable_path;
use crate::literal::parse_literal;
use crate::value::to_display;

/// A resolved component attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// An opaque string.
    Literal(String),
    /// A typed value.
    Resolved(Value),
    /// A bare attribute: `true`.
    Boolean,
    /// Nothing in the chain applied; holds the raw text.
    Unprocessable(String),
}

impl AttributeValue {
    /// Value exposed to templates.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(s) | Self::Unprocessable(s) => Value::String(s.clone()),
            Self::Resolved(value) => value.clone(),
            Self::Boolean => Value::Bool(true),
        }
    }

    /// Text used in a serialized attribute string.
    #[must_use]
    pub fn to_display(&self) -> String {
        match self {
            Self::Literal(s) | Self::Unprocessable(s) => s.clone(),
            Self::Resolved(value) => to_display(value),
            Self::Boolean => "true".to_owned(),
        }
    }

    #[must_use]
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, Self::Unprocessable(_))
    }
}

/// What the resolver needs from the renderer.
pub trait Evaluate {
    /// Resolve a variable path in the current context.
    fn lookup(&self, path: &str) -> Option<Value>;

    /// Render `source` as a template fragment in the current context.
    ///
    /// `None` if it fails to parse or render.
    fn render_fragment(&mut self, source: &str) -> Option<String>;
}

type Resolver = fn(&str, &mut dyn Evaluate) -> Option<AttributeValue>;

const CHAIN: [Resolver; 4] = [as_variable, as_boolean, as_template, as_literal];

/// Resolve a dynamic attribute value.
pub fn resolve(raw: &str, env: &mut dyn Evaluate) -> AttributeValue {
    CHAIN
        .iter()
        .find_map(|resolver| resolver(raw, &mut *env))
        .unwrap_or_else(|| AttributeValue::Unprocessable(raw.to_owned()))
}

fn as_variable(raw: &str, env: &mut dyn Evaluate) -> Option<AttributeValue> {
    if !is_variable_path(raw) {
        return None;
    }
    env.lookup(raw).map(AttributeValue::Resolved)
}

fn as_boolean(raw: &str, _: &mut dyn Evaluate) -> Option<AttributeValue> {
    raw.is_empty().then_some(AttributeValue::Boolean)
}

fn as_template(raw: &str, env: &mut dyn Evaluate) -> Option<AttributeValue> {
    if !raw.contains("{{") && !raw.contains("{%") {
        return None;
    }
    let rendered = env.render_fragment(raw)?;
    if rendered == raw {
        return None;
    }
    Some(match parse_literal(&rendered) {
        Some(value) => AttributeValue::Resolved(value),
        None => AttributeValue::Literal(rendered),
    })
}

fn as_literal(raw: &str, _: &mut dyn Evaluate) -> Option<AttributeValue> {
    parse_literal(raw).map(AttributeValue::Resolved)
}
