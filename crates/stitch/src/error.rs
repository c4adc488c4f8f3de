//! CLI error types.

use std::path::PathBuf;

use stitch_compiler::CompileError;
use stitch_config::ConfigError;
use stitch_runtime::{ParseError, RenderError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("invalid context: {0}")]
    Context(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}
