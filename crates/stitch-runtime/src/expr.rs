//! Expressions: `path|filter:arg` values and `if` conditions.

use serde_json::Value;

use crate::context::{Context, is_variable_path};
use crate::literal::parse_literal;
use crate::value::{is_truthy, loosely_equal, to_display};

/// A single value source: a literal or a variable path.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal such as `"text"`, `3` or `True`.
    Literal(Value),
    /// A dotted variable path.
    Path(String),
}

impl Operand {
    /// Parse an operand.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if is_variable_path(text) {
            return Ok(Self::Path(text.to_owned()));
        }
        parse_literal(text)
            .map(Self::Literal)
            .ok_or_else(|| format!("invalid expression '{text}'"))
    }

    /// Evaluate against `ctx`; `None` if a path is undefined.
    ///
    /// Paths that are not defined but spell a keyword literal (`True`,
    /// `None`, ...) evaluate to that literal.
    #[must_use]
    pub fn eval(&self, ctx: &Context) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Path(path) => ctx.lookup(path).cloned().or_else(|| keyword(path)),
        }
    }
}

fn keyword(path: &str) -> Option<Value> {
    match path {
        "True" | "true" => Some(Value::Bool(true)),
        "False" | "false" => Some(Value::Bool(false)),
        "None" | "null" => Some(Value::Null),
        _ => None,
    }
}

/// Built-in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    Default,
    Upper,
    Lower,
    Length,
    Join,
    Safe,
    First,
    Last,
    Add,
}

impl FilterKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "default" => Self::Default,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "length" => Self::Length,
            "join" => Self::Join,
            "safe" => Self::Safe,
            "first" => Self::First,
            "last" => Self::Last,
            "add" => Self::Add,
            _ => return None,
        })
    }

    fn needs_arg(self) -> bool {
        matches!(self, Self::Default | Self::Join | Self::Add)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    kind: FilterKind,
    arg: Option<Operand>,
}

/// A value expression with optional filters, e.g. `title|default:"Untitled"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    base: Operand,
    filters: Vec<Filter>,
}

impl FilterExpr {
    /// Parse an expression.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut parts = split_outside_quotes(text, |c| c == '|').into_iter();
        let base = parts
            .next()
            .filter(|part| !part.trim().is_empty())
            .ok_or_else(|| "empty expression".to_owned())?;
        let base = Operand::parse(base)?;

        let mut filters = Vec::new();
        for part in parts {
            let (name, arg) = match split_outside_quotes(part, |c| c == ':').as_slice() {
                [name] => (name.trim(), None),
                [name, arg] => (name.trim(), Some(Operand::parse(arg)?)),
                _ => return Err(format!("invalid filter '{}'", part.trim())),
            };
            let kind =
                FilterKind::from_name(name).ok_or_else(|| format!("unknown filter '{name}'"))?;
            if kind.needs_arg() && arg.is_none() {
                return Err(format!("filter '{name}' requires an argument"));
            }
            filters.push(Filter { kind, arg });
        }

        Ok(Self { base, filters })
    }

    /// Evaluate the expression; undefined values become `null`.
    #[must_use]
    pub fn eval(&self, ctx: &Context) -> Value {
        let mut value = self.base.eval(ctx).unwrap_or(Value::Null);
        for filter in &self.filters {
            let arg = filter.arg.as_ref().and_then(|a| a.eval(ctx));
            value = apply_filter(filter.kind, value, arg);
        }
        value
    }
}

fn apply_filter(kind: FilterKind, value: Value, arg: Option<Value>) -> Value {
    match kind {
        FilterKind::Default => {
            if is_truthy(&value) {
                value
            } else {
                arg.unwrap_or(Value::Null)
            }
        }
        FilterKind::Upper => Value::String(to_display(&value).to_uppercase()),
        FilterKind::Lower => Value::String(to_display(&value).to_lowercase()),
        FilterKind::Length => Value::from(match &value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }),
        FilterKind::Join => {
            let separator = arg.as_ref().map(to_display).unwrap_or_default();
            match &value {
                Value::Array(items) => {
                    let parts: Vec<String> = items.iter().map(to_display).collect();
                    Value::String(parts.join(&separator))
                }
                _ => value,
            }
        }
        FilterKind::Safe => value,
        FilterKind::First => match value {
            Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
            Value::String(s) => s.chars().next().map_or(Value::Null, |c| Value::from(c.to_string())),
            _ => Value::Null,
        },
        FilterKind::Last => match value {
            Value::Array(items) => items.into_iter().last().unwrap_or(Value::Null),
            Value::String(s) => s.chars().last().map_or(Value::Null, |c| Value::from(c.to_string())),
            _ => Value::Null,
        },
        FilterKind::Add => add(&value, &arg.unwrap_or(Value::Null)),
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.checked_add(y).map_or(Value::Null, Value::from),
            _ => a
                .as_f64()
                .zip(b.as_f64())
                .and_then(|(x, y)| serde_json::Number::from_f64(x + y))
                .map_or(Value::Null, Value::Number),
        },
        (Value::Array(a), Value::Array(b)) => Value::Array(a.iter().chain(b).cloned().collect()),
        _ => Value::String(format!("{}{}", to_display(left), to_display(right))),
    }
}

/// Comparison operators allowed in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
}

impl CompareOp {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "in" => Self::In,
            _ => return None,
        })
    }

    fn apply(self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering;

        let ordering = || match (left, right) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        };

        match self {
            Self::Eq => loosely_equal(left, right),
            Self::Ne => !loosely_equal(left, right),
            Self::Lt => ordering() == Some(Ordering::Less),
            Self::Gt => ordering() == Some(Ordering::Greater),
            Self::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Self::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            Self::In => match right {
                Value::String(haystack) => haystack.contains(&to_display(left)),
                Value::Array(items) => items.iter().any(|item| loosely_equal(item, left)),
                Value::Object(map) => map.contains_key(&to_display(left)),
                _ => false,
            },
        }
    }
}

/// A boolean condition for `{% if %}`.
///
/// Grammar: `or` of `and` of optionally negated comparisons, where a
/// comparison is `expr [op expr]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Any branch true.
    Or(Vec<Condition>),
    /// All branches true.
    And(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// Binary comparison.
    Compare(FilterExpr, CompareOpToken, FilterExpr),
    /// Truthiness of a single expression.
    Test(FilterExpr),
}

/// Opaque comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOpToken(CompareOp);

impl Condition {
    /// Parse a condition.
    pub fn parse(text: &str) -> Result<Self, String> {
        let tokens = split_outside_quotes(text, char::is_whitespace)
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err("empty condition".to_owned());
        }
        parse_or(&tokens)
    }

    /// Evaluate against `ctx`.
    #[must_use]
    pub fn eval(&self, ctx: &Context) -> bool {
        match self {
            Self::Or(parts) => parts.iter().any(|c| c.eval(ctx)),
            Self::And(parts) => parts.iter().all(|c| c.eval(ctx)),
            Self::Not(inner) => !inner.eval(ctx),
            Self::Compare(left, op, right) => op.0.apply(&left.eval(ctx), &right.eval(ctx)),
            Self::Test(expr) => is_truthy(&expr.eval(ctx)),
        }
    }
}

fn parse_or(tokens: &[&str]) -> Result<Condition, String> {
    let parts = tokens
        .split(|t| *t == "or")
        .map(parse_and)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collapse(parts, Condition::Or))
}

fn parse_and(tokens: &[&str]) -> Result<Condition, String> {
    let parts = tokens
        .split(|t| *t == "and")
        .map(parse_not)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collapse(parts, Condition::And))
}

fn parse_not(tokens: &[&str]) -> Result<Condition, String> {
    match tokens {
        [] => Err("missing operand".to_owned()),
        ["not", rest @ ..] => Ok(Condition::Not(Box::new(parse_not(rest)?))),
        [single] => Ok(Condition::Test(FilterExpr::parse(single)?)),
        [left, op, right] => {
            let op = CompareOp::from_token(op).ok_or_else(|| format!("unknown operator '{op}'"))?;
            Ok(Condition::Compare(
                FilterExpr::parse(left)?,
                CompareOpToken(op),
                FilterExpr::parse(right)?,
            ))
        }
        [left, "not", "in", right] => Ok(Condition::Not(Box::new(Condition::Compare(
            FilterExpr::parse(left)?,
            CompareOpToken(CompareOp::In),
            FilterExpr::parse(right)?,
        )))),
        _ => Err(format!("invalid condition '{}'", tokens.join(" "))),
    }
}

fn collapse(mut parts: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}

/// Split `text` on characters matching `is_separator` outside quotes.
pub(crate) fn split_outside_quotes(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, c) if is_separator(c) => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            (None, _) => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
