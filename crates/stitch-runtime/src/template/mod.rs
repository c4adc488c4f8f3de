//! Directive template parsing.
//!
//! The runtime understands the directive tokens emitted by the tag compiler
//! (`c`, `slot`, `attr`, `vars`, `push`, `stack`) plus a small core of native
//! syntax: `{{ expr|filter }}`, `if`/`elif`/`else`, `for`/`empty`,
//! `verbatim` and comments.

mod lexer;
mod node;
mod parser;

pub(crate) use node::{
    AttrNode, ComponentNode, ForNode, IfNode, Node, PushNode, SlotNode, StackNode,
};
pub use node::VarsDecl;

use crate::error::ParseError;

/// A parsed directive template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    pub(crate) nodes: Vec<Node>,
    vars: Option<VarsDecl>,
}

impl Template {
    /// Parse directive text (already compiled from custom tags).
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, ParseError> {
        let (nodes, vars) = parser::parse(source)?;
        Ok(Self {
            name: name.into(),
            nodes,
            vars,
        })
    }

    /// Template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `{% vars %}` declaration, if the template has one.
    #[must_use]
    pub fn vars(&self) -> Option<&VarsDecl> {
        self.vars.as_ref()
    }
}
