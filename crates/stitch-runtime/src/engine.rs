//! Template engine: loading, compilation, caching and rendering entry points.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use stitch_cache::{FileCache, MemoryCache, TemplateCache, cache_key};
use stitch_compiler::{CompilerConfig, TagCompiler};
use stitch_config::{CacheBackend, ComponentsConfig, Config, IsolationMode};

use crate::context::Context;
use crate::error::RenderError;
use crate::loader::{FsLoader, LoadedTemplate, TemplateLoader};
use crate::render::RenderState;
use crate::template::Template;

/// Name used for templates rendered from a string.
const INLINE_TEMPLATE: &str = "<string>";

/// Component lookup and rendering options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory (relative to the template roots) holding component templates.
    ///
    /// Default: `cotton`
    pub component_dir: String,
    /// Map `-` to `_` when deriving a component's template name.
    ///
    /// Default: `true`
    pub snake_case_names: bool,
    /// Context isolation for components without `only`.
    ///
    /// Default: [`IsolationMode::Partial`]
    pub isolation: IsolationMode,
    /// Custom tag prefix.
    ///
    /// Default: `c`
    pub prefix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            component_dir: stitch_config::DEFAULT_COMPONENT_DIR.to_owned(),
            snake_case_names: true,
            isolation: IsolationMode::default(),
            prefix: stitch_config::DEFAULT_PREFIX.to_owned(),
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from the `[components]` configuration section.
    #[must_use]
    pub fn from_config(config: &ComponentsConfig) -> Self {
        Self {
            component_dir: config.dir.clone(),
            snake_case_names: config.snake_case_names,
            isolation: config.isolation,
            prefix: config.prefix.clone(),
        }
    }

    #[must_use]
    pub fn with_component_dir(mut self, dir: impl Into<String>) -> Self {
        self.component_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_snake_case_names(mut self, enabled: bool) -> Self {
        self.snake_case_names = enabled;
        self
    }

    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Template names tried for a component, in order.
    ///
    /// `forms.input-field` maps to `cotton/forms/input_field.html`, then
    /// `cotton/forms/input_field/index.html`.
    #[must_use]
    pub fn component_candidates(&self, name: &str) -> Vec<String> {
        let mut path = name.replace('.', "/");
        if self.snake_case_names {
            path = path.replace('-', "_");
        }
        let dir = self.component_dir.trim_end_matches('/');
        vec![format!("{dir}/{path}.html"), format!("{dir}/{path}/index.html")]
    }
}

/// Parsed templates by identity, tagged with the cache key they were built from.
type ParsedMap = HashMap<String, (String, Arc<Template>)>;

/// Renders templates containing custom component tags.
///
/// `Engine` is `Send + Sync`; every render call keeps its own component
/// stack, so one engine can serve concurrent renders.
///
/// # Example
///
/// ```
/// use stitch_runtime::{Context, Engine, EngineOptions, MemoryLoader};
///
/// let loader = MemoryLoader::new()
///     .with_template("cotton/box.html", "<div {{ attrs }}>{{ slot }}</div>")
///     .with_template("page.html", "<c-box class=\"card\">Hi</c-box>");
/// let engine = Engine::new(loader, EngineOptions::new());
///
/// let html = engine.render("page.html", &mut Context::new()).unwrap();
/// assert_eq!(html, "<div class=\"card\">Hi</div>");
/// ```
pub struct Engine {
    options: EngineOptions,
    loader: Box<dyn TemplateLoader>,
    compiler: TagCompiler,
    cache: TemplateCache,
    parsed: RwLock<ParsedMap>,
}

impl Engine {
    /// Create an engine with an in-memory template cache.
    #[must_use]
    pub fn new(loader: impl TemplateLoader + 'static, options: EngineOptions) -> Self {
        let compiler = TagCompiler::new(CompilerConfig::new().with_prefix(options.prefix.clone()));
        Self {
            options,
            loader: Box::new(loader),
            compiler,
            cache: TemplateCache::new(&MemoryCache::new()),
            parsed: RwLock::default(),
        }
    }

    /// Replace the compiled template cache.
    #[must_use]
    pub fn with_cache(mut self, cache: TemplateCache) -> Self {
        self.cache = cache;
        self
    }

    /// Build an engine from configuration: a filesystem loader over the
    /// template directories and the configured cache backend.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let components = &config.components_resolved;
        let loader = FsLoader::new(components.template_dirs.clone());
        let engine = Self::new(loader, EngineOptions::from_config(components));

        let cache_config = &config.cache_resolved;
        let cache = if !cache_config.enabled {
            TemplateCache::disabled()
        } else {
            match cache_config.backend {
                CacheBackend::Memory => TemplateCache::new(&MemoryCache::new()),
                CacheBackend::File => TemplateCache::new(&FileCache::new(
                    cache_config.dir.clone(),
                    env!("CARGO_PKG_VERSION"),
                )),
            }
        };
        tracing::info!(
            enabled = cache_config.enabled,
            backend = ?cache_config.backend,
            "Template cache initialised"
        );

        engine.with_cache(cache)
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The tag compiler used for every loaded template.
    #[must_use]
    pub fn compiler(&self) -> &TagCompiler {
        &self.compiler
    }

    /// Load, compile and parse a template by name.
    pub fn get_template(&self, name: &str) -> Result<Arc<Template>, RenderError> {
        let loaded = self
            .loader
            .load(name)?
            .ok_or_else(|| RenderError::TemplateNotFound {
                name: name.to_owned(),
                tried: vec![name.to_owned()],
            })?;
        self.prepare(name, loaded)
    }

    /// Load the template of component `name`, trying each candidate path.
    pub(crate) fn component_template(&self, name: &str) -> Result<Arc<Template>, RenderError> {
        let candidates = self.options.component_candidates(name);
        for candidate in &candidates {
            if let Some(loaded) = self.loader.load(candidate)? {
                tracing::debug!(component = name, template = %candidate, "Resolved component template");
                return self.prepare(candidate, loaded);
            }
        }
        Err(RenderError::TemplateNotFound {
            name: name.to_owned(),
            tried: candidates,
        })
    }

    fn prepare(&self, name: &str, loaded: LoadedTemplate) -> Result<Arc<Template>, RenderError> {
        let key = cache_key(&loaded.identity, loaded.mtime);

        if self.cache.is_enabled() {
            let parsed = self.parsed.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached_key, template)) = parsed.get(&loaded.identity)
                && *cached_key == key
            {
                return Ok(Arc::clone(template));
            }
        }

        let compiled = self
            .cache
            .get_or_compile(&loaded.identity, loaded.mtime, || {
                self.compiler
                    .compile(&loaded.source)
                    .map_err(|source| RenderError::Compile {
                        name: name.to_owned(),
                        source,
                    })
            })?;
        let template = Arc::new(Template::parse(name, &compiled).map_err(|source| {
            RenderError::Parse {
                name: name.to_owned(),
                source,
            }
        })?);

        if self.cache.is_enabled() {
            let mut parsed = self.parsed.write().unwrap_or_else(PoisonError::into_inner);
            parsed.insert(loaded.identity, (key, Arc::clone(&template)));
        }
        Ok(template)
    }

    /// Render the named template.
    pub fn render(&self, name: &str, ctx: &mut Context) -> Result<String, RenderError> {
        let template = self.get_template(name)?;
        RenderState::new(self).render_root(&template, ctx)
    }

    /// Compile and render template source directly, bypassing the loader and cache.
    pub fn render_str(&self, source: &str, ctx: &mut Context) -> Result<String, RenderError> {
        let compiled = self
            .compiler
            .compile(source)
            .map_err(|source| RenderError::Compile {
                name: INLINE_TEMPLATE.to_owned(),
                source,
            })?;
        let template =
            Template::parse(INLINE_TEMPLATE, &compiled).map_err(|source| RenderError::Parse {
                name: INLINE_TEMPLATE.to_owned(),
                source,
            })?;
        RenderState::new(self).render_root(&template, ctx)
    }

    /// Render a single component without a caller template.
    ///
    /// `attrs` are passed as already-resolved values; `slots` may include the
    /// default `slot`.
    pub fn render_component(
        &self,
        name: &str,
        attrs: Map<String, Value>,
        slots: IndexMap<String, String>,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        RenderState::new(self).render_component_root(name, attrs, slots, ctx)
    }

    /// Drop every cached compilation and parsed template.
    pub fn reset_cache(&self) {
        self.cache.reset();
        self.parsed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MemoryLoader;

    #[test]
    fn test_component_candidates() {
        let options = EngineOptions::new();
        assert_eq!(
            options.component_candidates("forms.input-field"),
            vec![
                "cotton/forms/input_field.html".to_owned(),
                "cotton/forms/input_field/index.html".to_owned(),
            ]
        );

        let options = options.with_snake_case_names(false).with_component_dir("ui/");
        assert_eq!(options.component_candidates("my-box")[0], "ui/my-box.html");
    }

    #[test]
    fn test_parsed_templates_are_reused_until_source_changes() {
        let loader = MemoryLoader::new().with_template("a.html", "one");
        let engine = Engine::new(loader, EngineOptions::new());

        let first = engine.get_template("a.html").unwrap();
        let second = engine.get_template("a.html").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_template() {
        let engine = Engine::new(MemoryLoader::new(), EngineOptions::new());
        let err = engine.get_template("nope.html").unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound { .. }));
        assert_eq!(err.to_string(), "template not found: nope.html (tried: nope.html)");
    }

    #[test]
    fn test_compile_errors_name_the_template() {
        let loader = MemoryLoader::new().with_template("bad.html", "<c-box>");
        let engine = Engine::new(loader, EngineOptions::new());
        let err = engine.get_template("bad.html").unwrap_err();
        assert!(matches!(err, RenderError::Compile { ref name, .. } if name == "bad.html"));
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
