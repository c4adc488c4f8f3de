//! Component tag compiler for Stitch.
//!
//! Rewrites custom markup tags (`<c-box title="Hi">...</c-box>`) into the
//! directive tokens understood by `stitch-runtime`
//! (`{% c box title="Hi" %}...{% endc %}`). Everything that is not a custom
//! tag passes through byte-identical, including native `{{ }}` and `{% %}`
//! syntax, comments and verbatim blocks.
//!
//! # Example
//!
//! ```
//! let compiled = stitch_compiler::compile(r#"<c-box title="Hi">body</c-box>"#).unwrap();
//! assert_eq!(compiled, r#"{% c box title="Hi" %}body{% endc %}"#);
//! ```

mod compiler;
mod error;
mod protect;
pub mod scanner;
mod tag;

pub use compiler::{CompilerConfig, TagCompiler, compile};
pub use error::CompileError;
