//! Per-render state: the component stack and push stacks.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::resolver::AttributeValue;

/// Name of the default slot.
pub const DEFAULT_SLOT: &str = "slot";

/// State of one component invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentFrame {
    /// Component name as written in the tag.
    pub key: String,
    /// Attributes in insertion order.
    pub attrs: IndexMap<String, AttributeValue>,
    /// Attribute names left out of the serialized attribute string.
    pub excluded: HashSet<String>,
    /// Named slots, plus the default slot once the body is rendered.
    pub slots: IndexMap<String, String>,
}

impl ComponentFrame {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set an attribute; a later value replaces an earlier one in place.
    pub fn set_attr(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attrs.insert(key.into(), value);
    }

    /// Serialize attributes as `key="value"` pairs for pass-through.
    ///
    /// Boolean attributes are emitted bare. Excluded and unprocessable
    /// attributes are skipped.
    #[must_use]
    pub fn attrs_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.attrs {
            if self.excluded.contains(key) || value.is_unprocessable() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            match value {
                AttributeValue::Boolean | AttributeValue::Resolved(Value::Bool(true)) => {
                    out.push_str(key);
                }
                _ => {
                    let _ = write!(out, "{key}={}", ensure_quoted(&value.to_display()));
                }
            }
        }
        out
    }

    /// Attributes as an object, in insertion order.
    #[must_use]
    pub fn attrs_dict(&self) -> Map<String, Value> {
        self.attrs
            .iter()
            .filter(|(_, value)| !value.is_unprocessable())
            .map(|(key, value)| (key.clone(), value.to_value()))
            .collect()
    }

    /// Attributes under template-accessible names (`-` becomes `_`).
    ///
    /// Unprocessable attributes are left out so a declared default can fill them.
    #[must_use]
    pub fn accessible(&self) -> Map<String, Value> {
        self.attrs
            .iter()
            .filter(|(_, value)| !value.is_unprocessable())
            .map(|(key, value)| (key.replace('-', "_"), value.to_value()))
            .collect()
    }
}

fn ensure_quoted(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value.to_owned()
    } else {
        format!("\"{value}\"")
    }
}

/// Stack of active component frames.
#[derive(Debug, Default)]
pub struct ComponentStack {
    frames: Vec<ComponentFrame>,
}

impl ComponentStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame, returning the depth before the push.
    ///
    /// Pass the returned depth to [`truncate`](Self::truncate) on exit.
    pub fn push(&mut self, frame: ComponentFrame) -> usize {
        let depth = self.frames.len();
        self.frames.push(frame);
        depth
    }

    /// The innermost frame.
    pub fn top_mut(&mut self) -> Option<&mut ComponentFrame> {
        self.frames.last_mut()
    }

    /// Move the innermost frame's state out, leaving an empty frame with the
    /// same key in place.
    pub fn take_top(&mut self) -> Option<ComponentFrame> {
        let top = self.frames.last_mut()?;
        let key = top.key.clone();
        Some(std::mem::replace(top, ComponentFrame::new(key)))
    }

    /// Drop every frame above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A named collection of pushed content.
#[derive(Debug, Default)]
struct PushStack {
    items: Vec<String>,
    keys: HashSet<String>,
}

/// A `{% stack %}` placeholder waiting for the outermost render to finish.
#[derive(Debug)]
struct StackSlot {
    placeholder: String,
    name: String,
    fallback: String,
}

/// Content pushed by `{% push %}` and the stacks that will receive it.
#[derive(Debug, Default)]
pub struct PushStacks {
    stacks: HashMap<String, PushStack>,
    slots: Vec<StackSlot>,
}

impl PushStacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `content` to stack `name`.
    ///
    /// Unless `multiple` is set, content whose key (or trimmed content when
    /// no key is given) was already pushed is dropped. Returns whether the
    /// content was added.
    pub fn push(&mut self, name: &str, content: String, key: Option<String>, multiple: bool) -> bool {
        let stack = self.stacks.entry(name.to_owned()).or_default();
        if !multiple {
            let key = key.unwrap_or_else(|| content.trim().to_owned());
            if !stack.keys.insert(key) {
                return false;
            }
        }
        stack.items.push(content);
        true
    }

    /// Reserve a placeholder for stack `name`.
    pub fn placeholder(&mut self, name: String, fallback: String) -> String {
        let placeholder = format!("__STITCH_STACK_{}__", self.slots.len());
        self.slots.push(StackSlot {
            placeholder: placeholder.clone(),
            name,
            fallback,
        });
        placeholder
    }

    /// Replace every placeholder in `output` with its stack's content.
    ///
    /// A stack nothing was pushed to renders its fallback.
    #[must_use]
    pub fn finish(&self, output: &str) -> String {
        let mut output = output.to_owned();
        for slot in &self.slots {
            let content = self
                .stacks
                .get(&slot.name)
                .map(|stack| stack.items.concat())
                .filter(|content| !content.is_empty())
                .unwrap_or_else(|| slot.fallback.clone());
            output = output.replace(&slot.placeholder, &content);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn frame() -> ComponentFrame {
        let mut frame = ComponentFrame::new("box");
        frame.set_attr("class", AttributeValue::Literal("a b".to_owned()));
        frame.set_attr("disabled", AttributeValue::Boolean);
        frame.set_attr("data-n", AttributeValue::Resolved(json!(3)));
        frame.set_attr("bad", AttributeValue::Unprocessable("x.y".to_owned()));
        frame.set_attr("quoted", AttributeValue::Literal("\"q\"".to_owned()));
        frame
    }

    #[test]
    fn test_attrs_string() {
        let mut frame = frame();
        assert_eq!(
            frame.attrs_string(),
            r#"class="a b" disabled data-n="3" quoted="q""#
        );

        frame.excluded.insert("class".to_owned());
        assert_eq!(frame.attrs_string(), r#"disabled data-n="3" quoted="q""#);
    }

    #[test]
    fn test_attrs_string_keeps_insertion_order_on_update() {
        let mut frame = frame();
        frame.set_attr("class", AttributeValue::Literal("c".to_owned()));
        assert!(frame.attrs_string().starts_with(r#"class="c""#));
    }

    #[test]
    fn test_accessible_and_dict() {
        let frame = frame();
        let accessible = frame.accessible();
        assert_eq!(accessible.get("data_n"), Some(&json!(3)));
        assert!(!accessible.contains_key("bad"));

        let dict = frame.attrs_dict();
        assert_eq!(dict.get("data-n"), Some(&json!(3)));
        assert!(!dict.contains_key("bad"));
    }

    #[test]
    fn test_stack_take_top_and_truncate() {
        let mut stack = ComponentStack::new();
        assert_eq!(stack.push(ComponentFrame::new("a")), 0);
        let depth = stack.push(frame());
        assert_eq!(depth, 1);

        let taken = stack.take_top().unwrap();
        assert_eq!(taken.attrs.len(), 5);
        assert_eq!(stack.top_mut().unwrap(), &ComponentFrame::new("box"));

        stack.truncate(depth);
        assert_eq!(stack.depth(), 1);
        stack.truncate(0);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_push_dedupe() {
        let mut pushes = PushStacks::new();
        assert!(pushes.push("head", "<a>".to_owned(), None, false));
        assert!(!pushes.push("head", " <a> ".to_owned(), None, false));
        assert!(pushes.push("head", "<b>".to_owned(), Some("k".to_owned()), false));
        assert!(!pushes.push("head", "<c>".to_owned(), Some("k".to_owned()), false));
        assert!(pushes.push("head", "<a>".to_owned(), None, true));

        let placeholder = pushes.placeholder("head".to_owned(), "none".to_owned());
        assert_eq!(pushes.finish(&format!("[{placeholder}]")), "[<a><b><a>]");
    }

    #[test]
    fn test_empty_stack_uses_fallback() {
        let mut pushes = PushStacks::new();
        let a = pushes.placeholder("css".to_owned(), "fallback".to_owned());
        let b = pushes.placeholder("js".to_owned(), String::new());
        assert_eq!(pushes.finish(&format!("{a}|{b}")), "fallback|");
    }
}
