//! CLI command implementations.

mod check;
mod compile;
mod render;

pub(crate) use check::CheckArgs;
pub(crate) use compile::CompileArgs;
pub(crate) use render::RenderArgs;

use std::path::{Path, PathBuf};

use stitch_compiler::{CompilerConfig, TagCompiler};
use stitch_config::Config;

use crate::error::CliError;

/// Read a template file from disk.
fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Tag compiler using the configured prefix.
fn compiler_for(config: &Config) -> TagCompiler {
    TagCompiler::new(CompilerConfig::new().with_prefix(config.components_resolved.prefix.clone()))
}

/// Compile one file, attaching its path to compile errors.
fn compile_file(compiler: &TagCompiler, path: &Path) -> Result<String, CliError> {
    let source = read_source(path)?;
    compiler.compile(&source).map_err(|source| CliError::Compile {
        path: PathBuf::from(path),
        source,
    })
}
