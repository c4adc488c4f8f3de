//! Runtime error types.

use std::path::PathBuf;

use stitch_compiler::CompileError;

/// Error raised while parsing directive text into a node tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A block tag no parser knows about.
    #[error("line {line}: unknown tag '{tag}'")]
    UnknownTag { tag: String, line: usize },
    /// A closing or branch tag where none is expected.
    #[error("line {line}: unexpected '{tag}'")]
    UnexpectedTag { tag: String, line: usize },
    /// A block tag whose end tag never appears.
    #[error("line {line}: '{tag}' is never closed")]
    Unclosed { tag: String, line: usize },
    /// A `{{` or `{%` without its closing delimiter.
    #[error("line {line}: unterminated '{delimiter}'")]
    UnterminatedToken { delimiter: &'static str, line: usize },
    /// Malformed tag arguments or expression.
    #[error("line {line}: {message}")]
    Syntax { message: String, line: usize },
}

/// Error raised by a [`TemplateLoader`](crate::TemplateLoader).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Template name escapes the template directories or is absolute.
    #[error("invalid template name: {0}")]
    InvalidName(String),
    /// Reading the template failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error raised while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Custom tag compilation failed.
    #[error("failed to compile {name}: {source}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
    },
    /// Directive parsing failed.
    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },
    /// No loader knows the template.
    #[error("template not found: {name} (tried: {})", tried.join(", "))]
    TemplateNotFound { name: String, tried: Vec<String> },
    /// A dynamic component invoked without `is`.
    #[error("dynamic component requires an \"is\" attribute")]
    IncompleteDynamicComponent,
    /// Loader failure.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A component invocation that could not be resolved to a template.
    #[error("line {line}: component '{name}': {source}")]
    Component {
        name: String,
        line: usize,
        #[source]
        source: Box<RenderError>,
    },
    /// A slot rendered while no component is active.
    #[error("slot '{name}' must be used inside a component")]
    SlotOutsideComponent { name: String },
}
