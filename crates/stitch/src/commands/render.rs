//! `stitch render` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::{Map, Value};
use stitch_config::{CliSettings, Config};
use stitch_runtime::{Context, Engine};

use super::read_source;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Template name relative to the template directories.
    name: String,

    /// JSON file holding the context object.
    #[arg(long)]
    context: Option<PathBuf>,

    /// JSON file holding ambient globals, visible inside components under
    /// partial isolation.
    #[arg(long)]
    globals: Option<PathBuf>,

    /// Template directory (overrides config; repeatable).
    #[arg(short, long = "template-dir")]
    template_dirs: Vec<PathBuf>,

    /// Component subdirectory (overrides config).
    #[arg(long)]
    component_dir: Option<String>,

    /// Disable the compiled template cache.
    #[arg(long)]
    no_cache: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the context file is invalid
    /// or rendering fails.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let cli_settings = CliSettings {
            template_dirs: (!self.template_dirs.is_empty()).then_some(self.template_dirs),
            component_dir: self.component_dir,
            cache_enabled: self.no_cache.then_some(false),
            isolation: None,
        };
        let config = Config::load(config_path, Some(&cli_settings))?;

        let data = load_object(self.context.as_deref())?;
        let globals = load_object(self.globals.as_deref())?;

        let engine = Engine::from_config(&config);
        let mut ctx = Context::with_globals(globals, data);
        let rendered = engine.render(&self.name, &mut ctx)?;
        Output::new().result(&rendered)?;
        Ok(())
    }
}

/// Load a JSON object file; no file means an empty object.
fn load_object(path: Option<&Path>) -> Result<Map<String, Value>, CliError> {
    match path {
        Some(path) => parse_context(&read_source(path)?),
        None => Ok(Map::new()),
    }
}

/// Parse a JSON context, which must be an object.
fn parse_context(text: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation(format!(
            "context must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stitch_runtime::{EngineOptions, FsLoader};

    use super::*;

    #[test]
    fn test_parse_context_object() {
        let map = parse_context(r#"{"user": {"name": "Ann"}, "n": 2}"#).unwrap();
        assert_eq!(map.get("n"), Some(&json!(2)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["user", "n"]);
    }

    #[test]
    fn test_parse_context_rejects_non_objects() {
        let err = parse_context("[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "context must be a JSON object, got an array");
        assert!(matches!(parse_context("{"), Err(CliError::Context(_))));
    }

    #[test]
    fn test_globals_reach_isolated_components() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(templates.join("cotton")).unwrap();
        std::fs::write(templates.join("cotton/hello.html"), "{{ site }}:{{ user }}").unwrap();
        std::fs::write(templates.join("page.html"), "<c-hello />|{{ user }}").unwrap();
        let context = dir.path().join("ctx.json");
        std::fs::write(&context, r#"{"user": "ann"}"#).unwrap();
        let globals = dir.path().join("globals.json");
        std::fs::write(&globals, r#"{"site": "docs"}"#).unwrap();

        let mut ctx = Context::with_globals(
            load_object(Some(&globals)).unwrap(),
            load_object(Some(&context)).unwrap(),
        );
        let engine = Engine::new(FsLoader::new(vec![templates]), EngineOptions::new());

        assert_eq!(engine.render("page.html", &mut ctx).unwrap(), "docs:|ann");
        assert!(load_object(None).unwrap().is_empty());
    }
}
