//! `stitch check` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use stitch_compiler::TagCompiler;
use stitch_config::Config;
use stitch_runtime::Template;

use super::{compile_file, compiler_for};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Template files to check.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// Every file is checked; failures are reported as they are found.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or any file fails to compile
    /// or parse.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(config_path, None)?;
        let compiler = compiler_for(&config);

        let mut failed = 0;
        for path in &self.files {
            match check_file(&compiler, path) {
                Ok(()) => output.success(&format!("ok: {}", path.display())),
                Err(err) => {
                    failed += 1;
                    output.error(&err.to_string());
                }
            }
        }

        if failed > 0 {
            return Err(CliError::Validation(format!(
                "{failed} of {} templates failed",
                self.files.len()
            )));
        }
        Ok(())
    }
}

fn check_file(compiler: &TagCompiler, path: &Path) -> Result<(), CliError> {
    let compiled = compile_file(compiler, path)?;
    Template::parse(path.display().to_string(), &compiled).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Template checked");
    Ok(())
}
