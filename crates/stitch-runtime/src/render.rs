//! Node rendering and the component lifecycle.
//!
//! A component invocation moves through these steps:
//!
//! 1. push a frame keyed by the component name;
//! 2. resolve the tag's attributes into the frame;
//! 3. render the body, letting `slot` and `attr` tags write into the frame;
//! 4. merge the component template's vars declaration;
//! 5. render the component template in a child context;
//! 6. truncate the stack back to where it was, on success or error.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use stitch_compiler::scanner::Attribute;
use stitch_config::IsolationMode;

use crate::context::Context;
use crate::engine::Engine;
use crate::error::RenderError;
use crate::resolver::{AttributeValue, Evaluate, resolve};
use crate::stack::{ComponentFrame, ComponentStack, DEFAULT_SLOT, PushStacks};
use crate::template::{
    AttrNode, ComponentNode, ForNode, IfNode, Node, PushNode, SlotNode, StackNode, Template,
    VarsDecl,
};
use crate::value::{is_truthy, to_display};

/// Name of the dynamic component whose target comes from its `is` attribute.
const DYNAMIC_COMPONENT: &str = "component";

/// Name used when parsing attribute values as templates.
const FRAGMENT: &str = "<attribute>";

fn has_template_syntax(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

/// State owned by a single top-level render call.
pub(crate) struct RenderState<'e> {
    engine: &'e Engine,
    stack: ComponentStack,
    pushes: PushStacks,
}

/// Resolver access to the renderer and the context being rendered.
struct Env<'s, 'e> {
    state: &'s mut RenderState<'e>,
    ctx: &'s mut Context,
}

impl Evaluate for Env<'_, '_> {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.ctx.lookup(path).cloned()
    }

    fn render_fragment(&mut self, source: &str) -> Option<String> {
        self.state.render_fragment(source, self.ctx)
    }
}

impl<'e> RenderState<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            stack: ComponentStack::new(),
            pushes: PushStacks::new(),
        }
    }

    /// Render a top-level template and fill its push stacks.
    pub(crate) fn render_root(
        &mut self,
        template: &Template,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        if let Some(vars) = template.vars() {
            self.inject_vars(vars, ctx);
        }
        let mut out = String::new();
        self.render_nodes(&template.nodes, ctx, &mut out)?;
        Ok(self.pushes.finish(&out))
    }

    /// Render one component with pre-resolved attributes and slots.
    pub(crate) fn render_component_root(
        &mut self,
        name: &str,
        attrs: Map<String, Value>,
        mut slots: IndexMap<String, String>,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        let mut frame = ComponentFrame::new(name);
        for (key, value) in attrs {
            frame.set_attr(key, AttributeValue::Resolved(value));
        }
        let body = slots.shift_remove(DEFAULT_SLOT).unwrap_or_default();
        frame.slots = slots;

        let depth = self.stack.push(frame);
        let result = self.finish_component(name, body, false, ctx);
        self.stack.truncate(depth);
        Ok(self.pushes.finish(&result?))
    }

    fn render_nodes(
        &mut self,
        nodes: &[Node],
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node, ctx, out)?;
        }
        Ok(())
    }

    fn render_to_string(&mut self, nodes: &[Node], ctx: &mut Context) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render_nodes(nodes, ctx, &mut out)?;
        Ok(out)
    }

    fn render_node(&mut self, node: &Node, ctx: &mut Context, out: &mut String) -> Result<(), RenderError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(expr) => out.push_str(&to_display(&expr.eval(ctx))),
            Node::If(node) => self.render_if(node, ctx, out)?,
            Node::For(node) => self.render_for(node, ctx, out)?,
            Node::Component(node) => {
                let rendered = self.render_component(node, ctx)?;
                out.push_str(&rendered);
            }
            Node::Slot(node) => self.render_slot(node, ctx)?,
            Node::Attr(node) => self.render_attr(node, ctx)?,
            Node::Push(node) => self.render_push(node, ctx)?,
            Node::Stack(node) => {
                let placeholder = self.render_stack(node, ctx)?;
                out.push_str(&placeholder);
            }
        }
        Ok(())
    }

    fn render_if(&mut self, node: &IfNode, ctx: &mut Context, out: &mut String) -> Result<(), RenderError> {
        let body = node
            .branches
            .iter()
            .find(|(condition, _)| condition.eval(ctx))
            .map_or(&node.otherwise, |(_, body)| body);
        self.render_nodes(body, ctx, out)
    }

    fn render_for(&mut self, node: &ForNode, ctx: &mut Context, out: &mut String) -> Result<(), RenderError> {
        let mut rows = loop_rows(node.iterable.eval(ctx), node.targets.len());
        if node.reversed {
            rows.reverse();
        }
        if rows.is_empty() {
            return self.render_nodes(&node.empty, ctx, out);
        }

        let len = rows.len();
        for (index, row) in rows.into_iter().enumerate() {
            let mut scope: Map<String, Value> = node.targets.iter().cloned().zip(row).collect();
            scope.insert(
                "forloop".to_owned(),
                serde_json::json!({
                    "counter": index + 1,
                    "counter0": index,
                    "revcounter": len - index,
                    "first": index == 0,
                    "last": index + 1 == len,
                }),
            );

            ctx.push(scope);
            let result = self.render_nodes(&node.body, ctx, out);
            ctx.pop();
            result?;
        }
        Ok(())
    }

    /// Render a component invocation, keeping the stack balanced on every path.
    fn render_component(&mut self, node: &ComponentNode, ctx: &mut Context) -> Result<String, RenderError> {
        let depth = self.stack.push(ComponentFrame::new(&node.name));
        let result = self.run_component(node, ctx);
        self.stack.truncate(depth);
        result.map_err(|err| match err {
            RenderError::TemplateNotFound { .. } | RenderError::IncompleteDynamicComponent => {
                RenderError::Component {
                    name: node.name.clone(),
                    line: node.line,
                    source: Box::new(err),
                }
            }
            other => other,
        })
    }

    fn run_component(&mut self, node: &ComponentNode, ctx: &mut Context) -> Result<String, RenderError> {
        for attr in &node.attrs {
            let (key, value) = self.resolve_attribute(attr, ctx);
            if let Some(frame) = self.stack.top_mut() {
                frame.set_attr(key, value);
            }
        }

        let body = self.render_to_string(&node.body, ctx)?;
        self.finish_component(&node.name, body, node.only, ctx)
    }

    /// Plain attributes stay opaque strings; `:` attributes go through the resolver.
    fn resolve_attribute(&mut self, attr: &Attribute, ctx: &mut Context) -> (String, AttributeValue) {
        match (attr.key.strip_prefix(':'), attr.unquoted()) {
            (Some(key), raw) => {
                let value = resolve(raw.unwrap_or(""), &mut Env { state: self, ctx });
                (key.to_owned(), value)
            }
            (None, None) => (attr.key.clone(), AttributeValue::Boolean),
            (None, Some(value)) => (attr.key.clone(), AttributeValue::Literal(value.to_owned())),
        }
    }

    /// Render the component template for the frame on top of the stack.
    fn finish_component(
        &mut self,
        name: &str,
        body: String,
        only: bool,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        let mut frame = self
            .stack
            .take_top()
            .unwrap_or_else(|| ComponentFrame::new(name));
        frame.slots.entry(DEFAULT_SLOT.to_owned()).or_insert(body);

        let target = if name == DYNAMIC_COMPONENT {
            frame
                .attrs
                .get("is")
                .filter(|value| !value.is_unprocessable())
                .map(AttributeValue::to_display)
                .ok_or(RenderError::IncompleteDynamicComponent)?
        } else {
            name.to_owned()
        };
        let template = self.engine.component_template(&target)?;
        tracing::debug!(component = %target, template = template.name(), "Rendering component");

        let data = component_data(&frame);
        let isolation = if only {
            IsolationMode::Full
        } else {
            self.engine.options().isolation
        };

        match isolation {
            IsolationMode::Legacy => {
                ctx.push(data);
                let result = self.render_component_template(&template, &mut frame, ctx);
                ctx.pop();
                result
            }
            IsolationMode::Partial => {
                let mut child = ctx.isolated(data);
                self.render_component_template(&template, &mut frame, &mut child)
            }
            IsolationMode::Full => {
                let mut child = Context::from_map(data);
                self.render_component_template(&template, &mut frame, &mut child)
            }
        }
    }

    fn render_component_template(
        &mut self,
        template: &Template,
        frame: &mut ComponentFrame,
        child: &mut Context,
    ) -> Result<String, RenderError> {
        if let Some(vars) = template.vars() {
            self.apply_vars(vars, frame, child);
        }
        child.set("attrs", Value::String(frame.attrs_string()));
        child.set("attrs_dict", Value::Object(frame.attrs_dict()));

        self.render_to_string(&template.nodes, child)
    }

    /// Merge declared defaults into the frame and the child context.
    ///
    /// A caller attribute wins unless it is unprocessable; a slot of the same
    /// name also wins. Declared names never appear in the attribute string.
    fn apply_vars(&mut self, vars: &VarsDecl, frame: &mut ComponentFrame, child: &mut Context) {
        for attr in &vars.attrs {
            let (name, dynamic) = match attr.key.strip_prefix(':') {
                Some(name) => (name, true),
                None => (attr.key.as_str(), false),
            };
            frame.excluded.insert(name.to_owned());

            let supplied = frame
                .attrs
                .get(name)
                .is_some_and(|value| !value.is_unprocessable());
            if supplied || frame.slots.contains_key(name) {
                continue;
            }

            if let Some(value) = self.evaluate_default(attr, dynamic, child) {
                child.set(name.replace('-', "_"), value.to_value());
                frame.set_attr(name, value);
            }
        }

        for name in &vars.empty {
            frame.excluded.insert(name.clone());
        }
    }

    /// Evaluate a declared default in `ctx`; `None` leaves the name unset.
    fn evaluate_default(
        &mut self,
        attr: &Attribute,
        dynamic: bool,
        ctx: &mut Context,
    ) -> Option<AttributeValue> {
        let raw = attr.unquoted().unwrap_or("");
        if dynamic {
            return match resolve(raw, &mut Env { state: self, ctx }) {
                AttributeValue::Unprocessable(_) => None,
                value => Some(value),
            };
        }
        if has_template_syntax(raw) {
            let rendered = self.render_fragment(raw, ctx).unwrap_or_else(|| raw.to_owned());
            return Some(AttributeValue::Literal(rendered));
        }
        Some(AttributeValue::Literal(raw.to_owned()))
    }

    /// Apply a vars declaration rendered outside any component.
    ///
    /// Defaults fill in names the context does not already define.
    fn inject_vars(&mut self, vars: &VarsDecl, ctx: &mut Context) {
        for attr in &vars.attrs {
            let (name, dynamic) = match attr.key.strip_prefix(':') {
                Some(name) => (name, true),
                None => (attr.key.as_str(), false),
            };
            let name = name.replace('-', "_");
            if ctx.get(&name).is_some() {
                continue;
            }
            if let Some(value) = self.evaluate_default(attr, dynamic, ctx) {
                ctx.set(name, value.to_value());
            }
        }
    }

    fn render_fragment(&mut self, source: &str, ctx: &mut Context) -> Option<String> {
        let template = Template::parse(FRAGMENT, source).ok()?;
        self.render_to_string(&template.nodes, ctx).ok()
    }

    fn render_slot(&mut self, node: &SlotNode, ctx: &mut Context) -> Result<(), RenderError> {
        if self.stack.is_empty() {
            return Err(RenderError::SlotOutsideComponent {
                name: node.name.clone(),
            });
        }
        let content = self.render_to_string(&node.body, ctx)?;
        if let Some(frame) = self.stack.top_mut() {
            frame.slots.insert(node.name.clone(), content);
        }
        Ok(())
    }

    /// Set an extracted attribute on the current component, replacing its
    /// inline position marker; ignored outside a component.
    fn render_attr(&mut self, node: &AttrNode, ctx: &mut Context) -> Result<(), RenderError> {
        if self.stack.is_empty() {
            return Ok(());
        }
        let content = self.render_to_string(&node.body, ctx)?;
        let (key, value) = match node.name.strip_prefix(':') {
            Some(key) => (key, resolve(&content, &mut Env { state: self, ctx })),
            None => (node.name.as_str(), AttributeValue::Literal(content)),
        };
        if let Some(frame) = self.stack.top_mut() {
            frame.set_attr(key, value);
        }
        Ok(())
    }

    fn render_push(&mut self, node: &PushNode, ctx: &mut Context) -> Result<(), RenderError> {
        let content = self.render_to_string(&node.body, ctx)?;
        let to = to_display(&node.to.eval(ctx));
        let key = node.key.as_ref().map(|key| to_display(&key.eval(ctx)));
        if !self.pushes.push(&to, content, key, node.multiple) {
            tracing::debug!(stack = %to, "Skipped duplicate push");
        }
        Ok(())
    }

    fn render_stack(&mut self, node: &StackNode, ctx: &mut Context) -> Result<String, RenderError> {
        let name = to_display(&node.name.eval(ctx));
        let fallback = self.render_to_string(&node.fallback, ctx)?;
        Ok(self.pushes.placeholder(name, fallback))
    }
}

/// Context data for a component template: slots, then accessible attributes.
fn component_data(frame: &ComponentFrame) -> Map<String, Value> {
    let mut data: Map<String, Value> = frame
        .slots
        .iter()
        .map(|(name, content)| (name.clone(), Value::String(content.clone())))
        .collect();
    data.extend(frame.accessible());
    data
}

/// Bindings for each iteration of a `for` loop.
fn loop_rows(iterable: Value, targets: usize) -> Vec<Vec<Value>> {
    let unpack = |item: Value| -> Vec<Value> {
        if targets == 1 {
            return vec![item];
        }
        match item {
            Value::Array(mut pair) => {
                pair.resize(targets, Value::Null);
                pair
            }
            other => {
                let mut row = vec![other];
                row.resize(targets, Value::Null);
                row
            }
        }
    };

    match iterable {
        Value::Array(items) => items.into_iter().map(unpack).collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                if targets == 1 {
                    vec![Value::String(key)]
                } else {
                    vec![Value::String(key), value]
                }
            })
            .collect(),
        Value::String(s) => s.chars().map(|c| unpack(Value::String(c.to_string()))).collect(),
        _ => Vec::new(),
    }
}
