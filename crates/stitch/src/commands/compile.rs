//! `stitch compile` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use stitch_config::Config;

use super::{compile_file, compiler_for};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compile command.
#[derive(Args)]
pub(crate) struct CompileArgs {
    /// Template file to compile.
    file: PathBuf,
}

impl CompileArgs {
    /// Execute the compile command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the file cannot be read or
    /// its custom tags are malformed.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let config = Config::load(config_path, None)?;
        let compiled = compile_file(&compiler_for(&config), &self.file)?;
        Output::new().result(&compiled)?;
        Ok(())
    }
}
