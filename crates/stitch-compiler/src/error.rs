//! Compilation errors.

/// Error raised while compiling custom tags.
///
/// Line numbers are 1-based and refer to the original source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A `<c-slot>` without a `name` attribute.
    #[error("line {line}: slot tag must have a name attribute")]
    MissingSlotName { line: usize },
    /// A custom tag with nothing after the prefix.
    #[error("line {line}: component tag must have a name")]
    MissingComponentName { line: usize },
    /// A second vars tag in the same template.
    #[error("line {line}: only one vars tag is allowed per template")]
    DuplicateVars { line: usize },
    /// An opening tag (or tag head) that is never closed.
    #[error("line {line}: unterminated <{tag}> tag")]
    Unterminated { tag: String, line: usize },
    /// A closing tag with no matching opening tag.
    #[error("line {line}: unexpected closing </{tag}> tag")]
    UnexpectedClosing { tag: String, line: usize },
}

impl CompileError {
    /// Line the error refers to.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::MissingSlotName { line }
            | Self::MissingComponentName { line }
            | Self::DuplicateVars { line }
            | Self::Unterminated { line, .. }
            | Self::UnexpectedClosing { line, .. } => *line,
        }
    }
}
