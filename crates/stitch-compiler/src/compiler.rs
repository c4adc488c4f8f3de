//! Custom tag compilation.
//!
//! The pipeline is: protect ignorable regions, pull out the vars tag, rewrite
//! every custom tag into its directive token in a single left-to-right pass
//! (children are emitted between their parent's open and close tokens, so the
//! result is the same as a depth-first rewrite), then restore the protected
//! regions.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::CompileError;
use crate::protect::{ESCAPE_MARKER, Protected};
use crate::scanner::{ScanMode, ScannedAttrs, scan_attributes, strip_quotes};
use crate::tag::{RawTag, TagScanner};

const VARS: &str = "vars";
const SLOT: &str = "slot";
const PUSH: &str = "push";
const STACK: &str = "stack";

/// Configuration for the [`TagCompiler`].
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Custom tag prefix (`c` matches `<c-box>`).
    ///
    /// Default: `c`
    pub prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: "c".to_owned(),
        }
    }

    /// Set the custom tag prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Compiles custom component tags into directive tokens.
///
/// # Example
///
/// ```
/// use stitch_compiler::{CompilerConfig, TagCompiler};
///
/// let compiler = TagCompiler::new(CompilerConfig::new().with_prefix("x"));
/// let out = compiler.compile("<x-card><x-slot name=\"title\">T</x-slot></x-card>").unwrap();
/// assert_eq!(out, "{% c card %}{% slot title %}T{% endslot %}{% endc %}");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagCompiler {
    config: CompilerConfig,
}

/// The vars tag and the span it occupied (including any closing tag).
struct VarsTag {
    directive: String,
    start: usize,
    end: usize,
}

impl TagCompiler {
    /// Create a compiler with the given configuration.
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Whether `source` contains anything the compiler would rewrite.
    #[must_use]
    pub fn needs_compilation(&self, source: &str) -> bool {
        source.contains(&format!("<{}-", self.config.prefix)) || source.contains(ESCAPE_MARKER)
    }

    /// Compile `source`, returning directive text.
    ///
    /// Sources without custom tags are returned unchanged.
    pub fn compile(&self, source: &str) -> Result<String, CompileError> {
        if !self.needs_compilation(source) {
            return Ok(source.to_owned());
        }

        let protected = Protected::new(source);
        let line_of = |offset: usize| protected.line_of(offset);
        let tags = TagScanner::new(&protected.text, &self.config.prefix).collect_all(line_of)?;
        let vars = self.extract_vars(&tags, line_of)?;

        let mut out = String::with_capacity(protected.text.len() + 64);
        if let Some(vars) = &vars {
            out.push_str(&vars.directive);
        }
        self.rewrite(&protected.text, &tags, vars.as_ref(), line_of, &mut out)?;

        Ok(protected.restore(&out))
    }

    fn label(&self, name: &str) -> String {
        format!("{}-{name}", self.config.prefix)
    }

    /// Find the single vars tag and turn it into a `{% vars %}` directive.
    fn extract_vars(
        &self,
        tags: &[RawTag<'_>],
        line_of: impl Fn(usize) -> usize,
    ) -> Result<Option<VarsTag>, CompileError> {
        let mut found: Option<VarsTag> = None;
        let mut i = 0;

        while i < tags.len() {
            let tag = &tags[i];
            if tag.name != VARS {
                i += 1;
                continue;
            }

            let line = line_of(tag.start);
            if tag.is_closing {
                return Err(CompileError::UnexpectedClosing {
                    tag: self.label(VARS),
                    line,
                });
            }
            if found.is_some() {
                return Err(CompileError::DuplicateVars { line });
            }

            let mut end = tag.end;
            if !tag.is_self_closing {
                // Content between <c-vars> and </c-vars> is discarded.
                let close = tags[i + 1..]
                    .iter()
                    .position(|t| t.name == VARS && t.is_closing)
                    .ok_or_else(|| CompileError::Unterminated {
                        tag: self.label(VARS),
                        line,
                    })?;
                i += 1 + close;
                end = tags[i].end;
            }

            let attrs = tag.raw_attrs.trim();
            let directive = if attrs.is_empty() {
                "{% vars %}".to_owned()
            } else {
                format!("{{% vars {attrs} %}}")
            };
            found = Some(VarsTag {
                directive,
                start: tag.start,
                end,
            });
            i += 1;
        }

        Ok(found)
    }

    /// Emit `text` with every custom tag replaced by its directive token.
    fn rewrite(
        &self,
        text: &str,
        tags: &[RawTag<'_>],
        vars: Option<&VarsTag>,
        line_of: impl Fn(usize) -> usize,
        out: &mut String,
    ) -> Result<(), CompileError> {
        let mut open: Vec<(&str, usize)> = Vec::new();
        let mut last = 0;

        for tag in tags {
            if let Some(vars) = vars
                && tag.start >= vars.start
                && tag.start < vars.end
            {
                if tag.start == vars.start {
                    out.push_str(&text[last..vars.start]);
                    last = vars.end;
                }
                continue;
            }

            out.push_str(&text[last..tag.start]);
            last = tag.end;

            let line = line_of(tag.start);
            if tag.name.is_empty() {
                return Err(CompileError::MissingComponentName { line });
            }

            if tag.is_closing {
                match open.pop() {
                    Some((name, _)) if name == tag.name => out.push_str(close_token(tag.name)),
                    _ => {
                        return Err(CompileError::UnexpectedClosing {
                            tag: self.label(tag.name),
                            line,
                        });
                    }
                }
                continue;
            }

            self.open_token(tag, line, out)?;
            if tag.is_self_closing {
                out.push_str(close_token(tag.name));
            } else {
                open.push((tag.name, line));
            }
        }
        out.push_str(&text[last..]);

        if let Some((name, line)) = open.pop() {
            return Err(CompileError::Unterminated {
                tag: self.label(name),
                line,
            });
        }

        Ok(())
    }

    fn open_token(&self, tag: &RawTag<'_>, line: usize, out: &mut String) -> Result<(), CompileError> {
        let scanned = scan_attributes(tag.raw_attrs, ScanMode::Component);

        match tag.name {
            SLOT => {
                let name = scanned
                    .get("name")
                    .and_then(|attr| attr.unquoted())
                    .filter(|name| !name.is_empty())
                    .ok_or(CompileError::MissingSlotName { line })?;
                let _ = write!(out, "{{% slot {name} %}}");
            }
            PUSH | STACK => {
                let (inline, _) = self.serialize_attrs(tag, &scanned, line, false);
                let _ = write!(out, "{{% {}{inline} %}}", tag.name);
            }
            name => {
                let (inline, extracted) = self.serialize_attrs(tag, &scanned, line, true);
                let only = if scanned.only { " only" } else { "" };
                let _ = write!(out, "{{% c {name}{inline}{only} %}}{extracted}");
            }
        }

        Ok(())
    }

    /// Serialize attributes in source order.
    ///
    /// Returns the inline attribute text (each entry preceded by a space) and
    /// the `{% attr %}` directives for values that cannot stay inline. An
    /// extracted attribute leaves its bare key inline so it keeps its position.
    fn serialize_attrs(
        &self,
        tag: &RawTag<'_>,
        scanned: &ScannedAttrs,
        line: usize,
        extract: bool,
    ) -> (String, String) {
        let mut inline = String::new();
        let mut extracted = String::new();
        let mut seen = HashSet::new();

        for attr in &scanned.attrs {
            if !seen.insert(attr.key.as_str()) {
                tracing::warn!(
                    tag = %self.label(tag.name),
                    attribute = %attr.key,
                    line,
                    "duplicate attribute ignored"
                );
                continue;
            }

            let Some(raw) = &attr.value else {
                inline.push(' ');
                inline.push_str(&attr.key);
                continue;
            };

            let value = strip_quotes(raw);
            if extract && needs_extraction(value) {
                inline.push(' ');
                inline.push_str(&attr.key);
                let _ = write!(extracted, "{{% attr {} %}}{value}{{% endattr %}}", attr.key);
            } else {
                let _ = write!(inline, " {}={}", attr.key, quoted(raw));
            }
        }

        (inline, extracted)
    }
}

/// Compile `source` with the default configuration.
pub fn compile(source: &str) -> Result<String, CompileError> {
    TagCompiler::default().compile(source)
}

/// Values the directive attribute grammar cannot carry inline.
fn needs_extraction(value: &str) -> bool {
    Protected::contains_placeholder(value) || value.contains('\n') || value.contains('=')
}

fn close_token(name: &str) -> &'static str {
    match name {
        SLOT => "{% endslot %}",
        PUSH => "{% endpush %}",
        STACK => "{% endstack %}",
        _ => "{% endc %}",
    }
}

/// Keep a properly quoted value as written; quote anything else.
fn quoted(raw: &str) -> String {
    if let Some(first @ ('"' | '\'')) = raw.chars().next()
        && raw.len() >= 2
        && raw.ends_with(first)
    {
        return raw.to_owned();
    }

    let inner = strip_quotes(raw);
    if inner.contains('"') && !inner.contains('\'') {
        format!("'{inner}'")
    } else {
        format!("\"{inner}\"")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_basic_expansion() {
        assert_eq!(
            compile(r#"<c-box title="Hi">body</c-box>"#).unwrap(),
            r#"{% c box title="Hi" %}body{% endc %}"#
        );
    }

    #[test]
    fn test_plain_markup_passes_through() {
        let source = "<div class=\"x\">{% if a %}{{ b|upper }}{% endif %}</div>\n{# c #}";
        assert_eq!(compile(source).unwrap(), source);
    }

    #[test]
    fn test_native_syntax_around_tags_is_untouched() {
        let source = "{% if a %}<c-box>{{ x }} {% for i in l %}{{ i }}{% endfor %}</c-box>{% endif %}";
        assert_eq!(
            compile(source).unwrap(),
            "{% if a %}{% c box %}{{ x }} {% for i in l %}{{ i }}{% endfor %}{% endc %}{% endif %}"
        );
    }

    #[test]
    fn test_self_closing() {
        assert_eq!(compile("<c-box/>").unwrap(), "{% c box %}{% endc %}");
        assert_eq!(
            compile(r#"<c-box title="x" />"#).unwrap(),
            r#"{% c box title="x" %}{% endc %}"#
        );
    }

    #[test]
    fn test_attribute_forms() {
        assert_eq!(
            compile(r#"<c-box a='x' b=y flag :c="1" only></c-box>"#).unwrap(),
            r#"{% c box a='x' b="y" flag :c="1" only %}{% endc %}"#
        );
    }

    #[test]
    fn test_template_syntax_in_value_is_extracted() {
        assert_eq!(
            compile(r#"<c-box title="Hello {{ name }}" size="lg" />"#).unwrap(),
            r#"{% c box title size="lg" %}{% attr title %}Hello {{ name }}{% endattr %}{% endc %}"#
        );
    }

    #[test]
    fn test_nested_quotes_in_value() {
        assert_eq!(
            compile(r#"<c-box attr="{% x "y" %}" other="z" />"#).unwrap(),
            r#"{% c box attr other="z" %}{% attr attr %}{% x "y" %}{% endattr %}{% endc %}"#
        );
    }

    #[test]
    fn test_multiline_value_is_extracted() {
        assert_eq!(
            compile("<c-box class=\"a\n b\"></c-box>").unwrap(),
            "{% c box class %}{% attr class %}a\n b{% endattr %}{% endc %}"
        );
    }

    #[test]
    fn test_value_with_equals_is_extracted() {
        assert_eq!(
            compile(r#"<c-link href="/search?q=rust" :n="1" />"#).unwrap(),
            r#"{% c link href :n="1" %}{% attr href %}/search?q=rust{% endattr %}{% endc %}"#
        );
    }

    #[test]
    fn test_duplicate_attribute_keeps_first() {
        assert_eq!(
            compile(r#"<c-box a="1" a="2" />"#).unwrap(),
            r#"{% c box a="1" %}{% endc %}"#
        );
    }

    #[test]
    fn test_named_slots() {
        assert_eq!(
            compile(r#"<c-card><c-slot name="header">H</c-slot>B</c-card>"#).unwrap(),
            "{% c card %}{% slot header %}H{% endslot %}B{% endc %}"
        );
    }

    #[test]
    fn test_slot_requires_name() {
        let err = compile("<c-card>\n<c-slot>x</c-slot></c-card>").unwrap_err();
        assert_eq!(err, CompileError::MissingSlotName { line: 2 });
    }

    #[test]
    fn test_nested_components_of_same_name() {
        assert_eq!(
            compile("<c-box><c-box>inner</c-box></c-box>").unwrap(),
            "{% c box %}{% c box %}inner{% endc %}{% endc %}"
        );
    }

    #[test]
    fn test_dotted_and_dynamic_components() {
        assert_eq!(
            compile(r#"<c-forms.input-field /><c-component is="box" />"#).unwrap(),
            r#"{% c forms.input-field %}{% endc %}{% c component is="box" %}{% endc %}"#
        );
    }

    #[test]
    fn test_vars_moved_to_top() {
        let source = "<div>\n<c-vars title=\"Untitled\" :count=\"1\" icon />\n<h1>{{ title }}</h1></div>";
        assert_eq!(
            compile(source).unwrap(),
            "{% vars title=\"Untitled\" :count=\"1\" icon %}<div>\n\n<h1>{{ title }}</h1></div>"
        );
    }

    #[test]
    fn test_vars_with_closing_tag_discards_content() {
        assert_eq!(
            compile("<c-vars a=\"1\">ignored</c-vars>x").unwrap(),
            "{% vars a=\"1\" %}x"
        );
        assert_eq!(compile("<c-vars />x").unwrap(), "{% vars %}x");
    }

    #[test]
    fn test_vars_default_with_template_syntax() {
        assert_eq!(
            compile(r#"<c-vars label="{{ name }}!" />"#).unwrap(),
            r#"{% vars label="{{ name }}!" %}"#
        );
    }

    #[test]
    fn test_duplicate_vars_reports_second_line() {
        let err = compile("<c-vars a=\"1\" />\n\n<c-vars b=\"2\" />").unwrap_err();
        assert_eq!(err, CompileError::DuplicateVars { line: 3 });
    }

    #[test]
    fn test_unterminated_component() {
        let err = compile("ok\n<c-box>\n<c-inner></c-inner>").unwrap_err();
        assert_eq!(
            err,
            CompileError::Unterminated {
                tag: "c-box".to_owned(),
                line: 2
            }
        );
    }

    #[test]
    fn test_unexpected_closing() {
        let err = compile("</c-box>").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnexpectedClosing {
                tag: "c-box".to_owned(),
                line: 1
            }
        );

        let err = compile("<c-a>\n<c-b></c-a>").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnexpectedClosing {
                tag: "c-a".to_owned(),
                line: 2
            }
        );
    }

    #[test]
    fn test_missing_component_name() {
        let err = compile("<c- title=\"x\" />").unwrap_err();
        assert_eq!(err, CompileError::MissingComponentName { line: 1 });
    }

    #[test]
    fn test_line_numbers_count_protected_newlines() {
        let err = compile("{% comment %}\n\n{% endcomment %}\n</c-box>").unwrap_err();
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn test_comments_and_verbatim_are_not_compiled() {
        let source = "{# <c-box /> #}{% comment %}<c-box>{% endcomment %}\
                      {% verbatim %}<c-box />{% endverbatim %}";
        assert_eq!(compile(source).unwrap(), source);
    }

    #[test]
    fn test_escape_wrapper_is_stripped() {
        assert_eq!(
            compile("{% stitch:verbatim %}<c-box />{% endstitch:verbatim %}<c-box />").unwrap(),
            "<c-box />{% c box %}{% endc %}"
        );
    }

    #[test]
    fn test_push_and_stack() {
        assert_eq!(
            compile(r#"<c-stack name="head">fallback</c-stack><c-push to="head" key="a">x</c-push>"#)
                .unwrap(),
            r#"{% stack name="head" %}fallback{% endstack %}{% push to="head" key="a" %}x{% endpush %}"#
        );
    }

    #[test]
    fn test_custom_prefix_ignores_default_prefix() {
        let compiler = TagCompiler::new(CompilerConfig::new().with_prefix("ui"));
        assert_eq!(
            compiler.compile("<c-box /><ui-box />").unwrap(),
            "<c-box />{% c box %}{% endc %}"
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = r#"<c-a x="1"><c-slot name="s">{{ v }}</c-slot><c-b :y="z" /></c-a>"#;
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}
