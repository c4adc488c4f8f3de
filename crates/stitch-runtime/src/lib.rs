//! Component runtime for Stitch.
//!
//! Loads templates, compiles their custom component tags with
//! [`stitch_compiler`], and renders the resulting directive text. Components
//! are rendered with an explicit [`ComponentStack`]: each invocation pushes a
//! frame that collects its attributes and slots, merges the component
//! template's declared defaults, and renders that template in an isolated
//! child [`Context`].
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stitch_runtime::{Context, Engine, EngineOptions, MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with_template(
//!         "cotton/alert.html",
//!         r#"<c-vars type="info" /><div class="alert-{{ type }}" {{ attrs }}>{{ slot }}</div>"#,
//!     )
//!     .with_template("page.html", r#"<c-alert role="status">{{ message }}</c-alert>"#);
//! let engine = Engine::new(loader, EngineOptions::new());
//!
//! let mut ctx = Context::new();
//! ctx.set("message", json!("Saved"));
//! assert_eq!(
//!     engine.render("page.html", &mut ctx).unwrap(),
//!     r#"<div class="alert-info" role="status">Saved</div>"#
//! );
//! ```

mod context;
mod engine;
mod error;
mod expr;
mod literal;
mod loader;
mod render;
mod resolver;
mod stack;
mod template;
mod value;

pub use context::{Context, is_variable_path};
pub use engine::{Engine, EngineOptions};
pub use error::{LoadError, ParseError, RenderError};
pub use literal::parse_literal;
pub use loader::{FsLoader, LoadedTemplate, MemoryLoader, TemplateLoader};
pub use resolver::{AttributeValue, Evaluate, resolve};
pub use stack::{ComponentFrame, ComponentStack, DEFAULT_SLOT, PushStacks};
pub use template::{Template, VarsDecl};
pub use value::{is_truthy, to_display};
