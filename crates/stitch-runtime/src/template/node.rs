//! Parsed template tree.

use stitch_compiler::scanner::Attribute;

use crate::expr::{Condition, FilterExpr};

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Var(FilterExpr),
    If(IfNode),
    For(ForNode),
    Component(ComponentNode),
    Slot(SlotNode),
    Attr(AttrNode),
    Push(PushNode),
    Stack(StackNode),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IfNode {
    pub(crate) branches: Vec<(Condition, Vec<Node>)>,
    pub(crate) otherwise: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForNode {
    /// Loop variables; two targets unpack pairs or map entries.
    pub(crate) targets: Vec<String>,
    pub(crate) iterable: FilterExpr,
    pub(crate) reversed: bool,
    pub(crate) body: Vec<Node>,
    /// Rendered when the iterable is empty.
    pub(crate) empty: Vec<Node>,
}

/// `{% c name attrs [only] %}...{% endc %}`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ComponentNode {
    pub(crate) name: String,
    /// Attributes in source order, values still quoted.
    pub(crate) attrs: Vec<Attribute>,
    pub(crate) only: bool,
    pub(crate) body: Vec<Node>,
    pub(crate) line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SlotNode {
    pub(crate) name: String,
    pub(crate) body: Vec<Node>,
}

/// An attribute value too complex to stay inline on the component tag.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttrNode {
    /// Attribute key, including a leading `:` for dynamic attributes.
    pub(crate) name: String,
    pub(crate) body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PushNode {
    pub(crate) to: FilterExpr,
    /// Dedupe key; the trimmed content is used when absent.
    pub(crate) key: Option<FilterExpr>,
    pub(crate) multiple: bool,
    pub(crate) body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StackNode {
    pub(crate) name: FilterExpr,
    pub(crate) fallback: Vec<Node>,
}

/// The `{% vars %}` declaration of a component template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarsDecl {
    /// Declared names with defaults, in source order; keys keep a leading `:`.
    pub(crate) attrs: Vec<Attribute>,
    /// Declared names without a default.
    pub(crate) empty: Vec<String>,
}

impl VarsDecl {
    /// Every declared name, without the dynamic prefix.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .map(|attr| attr.key.trim_start_matches(':'))
            .chain(self.empty.iter().map(String::as_str))
    }
}
