//! Configuration management for Stitch.
//!
//! Parses `stitch.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Example
//!
//! ```toml
//! [components]
//! dir = "cotton"
//! template_dirs = ["templates"]
//! snake_case_names = true
//! isolation = "partial"
//! prefix = "c"
//!
//! [cache]
//! enabled = true
//! backend = "memory"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "stitch.toml";

/// Default component subdirectory inside each template directory.
pub const DEFAULT_COMPONENT_DIR: &str = "cotton";

/// Default custom tag prefix (`<c-name>`).
pub const DEFAULT_PREFIX: &str = "c";

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override template directories.
    pub template_dirs: Option<Vec<PathBuf>>,
    /// Override the component subdirectory.
    pub component_dir: Option<String>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override the default isolation mode.
    pub isolation: Option<IsolationMode>,
}

/// How much of the caller's context a component template can see.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// The component shares (and can mutate) the caller's context.
    Legacy,
    /// The component sees ambient globals plus its own attributes and slots.
    #[default]
    Partial,
    /// The component sees only its own attributes and slots.
    ///
    /// Selected per invocation with the `only` flag; not a valid default.
    Full,
}

/// Where compiled templates are cached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map, lost on exit.
    #[default]
    Memory,
    /// Files under the cache directory, kept across runs.
    File,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Component configuration (paths are relative strings from TOML).
    components: ComponentsConfigRaw,
    /// Cache configuration (paths are relative strings from TOML).
    cache: CacheConfigRaw,

    /// Resolved component configuration (set after loading).
    #[serde(skip)]
    pub components_resolved: ComponentsConfig,
    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw component configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ComponentsConfigRaw {
    dir: Option<String>,
    template_dirs: Option<Vec<String>>,
    snake_case_names: Option<bool>,
    isolation: Option<IsolationMode>,
    prefix: Option<String>,
}

/// Resolved component configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct ComponentsConfig {
    /// Subdirectory holding component templates (e.g. `cotton/box.html`).
    pub dir: String,
    /// Directories searched, in order, for templates.
    pub template_dirs: Vec<PathBuf>,
    /// Normalize `-` to `_` when mapping component names to file names.
    pub snake_case_names: bool,
    /// Default context isolation for component templates.
    pub isolation: IsolationMode,
    /// Custom tag prefix (`c` matches `<c-box>`).
    pub prefix: String,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_COMPONENT_DIR.to_owned(),
            template_dirs: Vec::new(),
            snake_case_names: true,
            isolation: IsolationMode::Partial,
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }
}

/// Raw cache configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    backend: Option<CacheBackend>,
    dir: Option<String>,
}

/// Resolved cache configuration.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Whether compiled templates are cached.
    pub enabled: bool,
    /// Storage used for the cache.
    pub backend: CacheBackend,
    /// Cache directory for the file backend.
    pub dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `stitch.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(dirs) = &settings.template_dirs {
            self.components_resolved.template_dirs.clone_from(dirs);
        }
        if let Some(dir) = &settings.component_dir {
            self.components_resolved.dir.clone_from(dir);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = cache_enabled;
        }
        if let Some(isolation) = settings.isolation {
            self.components_resolved.isolation = isolation;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            components: ComponentsConfigRaw::default(),
            cache: CacheConfigRaw::default(),
            components_resolved: ComponentsConfig {
                template_dirs: vec![base.join("templates")],
                ..ComponentsConfig::default()
            },
            cache_resolved: CacheConfig {
                enabled: true,
                backend: CacheBackend::Memory,
                dir: base.join(".stitch").join("cache"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_components()?;
        self.validate_cache()?;
        Ok(())
    }

    /// Validate component configuration.
    fn validate_components(&self) -> Result<(), ConfigError> {
        let components = &self.components_resolved;

        require_non_empty(&components.dir, "components.dir")?;
        let dir = Path::new(&components.dir);
        if dir.is_absolute() || components.dir.split('/').any(|s| s == "..") {
            return Err(ConfigError::Validation(
                "components.dir must be a relative path inside the template directories"
                    .to_owned(),
            ));
        }

        require_non_empty(&components.prefix, "components.prefix")?;
        if !components
            .prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation(
                "components.prefix may only contain ASCII letters, digits and '_'".to_owned(),
            ));
        }

        if components.isolation == IsolationMode::Full {
            return Err(ConfigError::Validation(
                "components.isolation must be \"legacy\" or \"partial\"; use the `only` flag for full isolation"
                    .to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate cache configuration.
    fn validate_cache(&self) -> Result<(), ConfigError> {
        if self.cache_resolved.enabled && self.cache_resolved.backend == CacheBackend::File {
            require_non_empty(
                &self.cache_resolved.dir.to_string_lossy(),
                "cache.dir",
            )?;
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let template_dirs = match &self.components.template_dirs {
            Some(dirs) => dirs.iter().map(|d| config_dir.join(d)).collect(),
            None => vec![config_dir.join("templates")],
        };

        self.components_resolved = ComponentsConfig {
            dir: self
                .components
                .dir
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPONENT_DIR.to_owned()),
            template_dirs,
            snake_case_names: self.components.snake_case_names.unwrap_or(true),
            isolation: self.components.isolation.unwrap_or_default(),
            prefix: self
                .components
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
        };

        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            backend: self.cache.backend.unwrap_or_default(),
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(".stitch/cache")),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        let components = &config.components_resolved;
        assert_eq!(components.dir, "cotton");
        assert_eq!(components.template_dirs, vec![PathBuf::from("/test/templates")]);
        assert!(components.snake_case_names);
        assert_eq!(components.isolation, IsolationMode::Partial);
        assert_eq!(components.prefix, "c");
        assert!(config.cache_resolved.enabled);
        assert_eq!(config.cache_resolved.backend, CacheBackend::Memory);
        assert_eq!(
            config.cache_resolved.dir,
            PathBuf::from("/test/.stitch/cache")
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.components_resolved.dir, "cotton");
        assert_eq!(
            config.components_resolved.template_dirs,
            vec![PathBuf::from("/project/templates")]
        );
        assert!(config.cache_resolved.enabled);
    }

    #[test]
    fn test_parse_components_config() {
        let toml = r#"
[components]
dir = "components"
template_dirs = ["templates", "shared/templates"]
snake_case_names = false
isolation = "legacy"
prefix = "x"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let components = &config.components_resolved;
        assert_eq!(components.dir, "components");
        assert_eq!(
            components.template_dirs,
            vec![
                PathBuf::from("/project/templates"),
                PathBuf::from("/project/shared/templates")
            ]
        );
        assert!(!components.snake_case_names);
        assert_eq!(components.isolation, IsolationMode::Legacy);
        assert_eq!(components.prefix, "x");
    }

    #[test]
    fn test_parse_cache_config() {
        let toml = r#"
[cache]
enabled = false
backend = "file"
dir = "build/cache"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert!(!config.cache_resolved.enabled);
        assert_eq!(config.cache_resolved.backend, CacheBackend::File);
        assert_eq!(
            config.cache_resolved.dir,
            PathBuf::from("/project/build/cache")
        );
    }

    #[test]
    fn test_unknown_isolation_mode_is_parse_error() {
        let toml = r#"
[components]
isolation = "shared"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_full_isolation_rejected_as_default() {
        let toml = r#"
[components]
isolation = "full"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        assert!(err.to_string().contains("only"));
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.components_resolved.prefix = "c-x".to_owned();
        assert!(config.validate().is_err());

        config.components_resolved.prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_escaping_component_dir() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.components_resolved.dir = "../outside".to_owned();
        assert!(config.validate().is_err());

        config.components_resolved.dir = "/abs".to_owned();
        assert!(config.validate().is_err());

        config.components_resolved.dir = "ui/components".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            template_dirs: Some(vec![PathBuf::from("/custom")]),
            cache_enabled: Some(false),
            isolation: Some(IsolationMode::Legacy),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(
            config.components_resolved.template_dirs,
            vec![PathBuf::from("/custom")]
        );
        assert!(!config.cache_resolved.enabled);
        assert_eq!(config.components_resolved.isolation, IsolationMode::Legacy);
        assert_eq!(config.components_resolved.dir, "cotton"); // Unchanged
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/stitch.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stitch.toml");
        std::fs::write(
            &path,
            r#"
[components]
template_dirs = ["views"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(
            config.components_resolved.template_dirs,
            vec![tmp.path().join("views")]
        );
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_applies_cli_settings_after_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stitch.toml");
        std::fs::write(&path, "[cache]\nenabled = true\n").unwrap();

        let settings = CliSettings {
            cache_enabled: Some(false),
            component_dir: Some("components".to_owned()),
            ..Default::default()
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert!(!config.cache_resolved.enabled);
        assert_eq!(config.components_resolved.dir, "components");
    }
}
