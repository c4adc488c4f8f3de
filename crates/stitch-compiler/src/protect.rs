//! Protection of regions the compiler must never rewrite.
//!
//! Native template syntax, comments and verbatim blocks are swapped for
//! opaque placeholders before custom tags are scanned, then restored
//! byte-exactly afterwards.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Ignorable regions, most specific first.
static IGNORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)",
        r"\{%\s*verbatim(?:\s+\w+)?\s*%\}.*?\{%\s*endverbatim(?:\s+\w+)?\s*%\}",
        r"|\{%\s*stitch:verbatim\s*%\}.*?\{%\s*endstitch:verbatim\s*%\}",
        r"|\{%\s*comment\s*%\}.*?\{%\s*endcomment\s*%\}",
        r"|\{#.*?#\}",
        r"|\{\{.*?\}\}",
        r"|\{%.*?%\}",
    ))
    .expect("invalid ignore regex")
});

/// The escape wrapper, capturing its inner content.
static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\{%\s*stitch:verbatim\s*%\}(.*)\{%\s*endstitch:verbatim\s*%\}\z")
        .expect("invalid escape wrapper regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__STITCH_IGNORE_(\d+)__").expect("invalid placeholder regex"));

/// Marker that makes a source worth compiling even without custom tags.
pub(crate) const ESCAPE_MARKER: &str = "stitch:verbatim";

/// A protected region and where its placeholder sits.
#[derive(Debug)]
struct Region {
    /// Byte offset of the placeholder in the protected text.
    offset: usize,
    content: String,
    newlines: usize,
}

/// Source text with ignorable regions replaced by placeholders.
#[derive(Debug)]
pub(crate) struct Protected {
    pub(crate) text: String,
    regions: Vec<Region>,
}

impl Protected {
    /// Replace every ignorable region of `source` with a placeholder.
    pub(crate) fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut regions = Vec::new();
        let mut last = 0;

        for m in IGNORE_RE.find_iter(source) {
            text.push_str(&source[last..m.start()]);
            let placeholder = placeholder(regions.len());
            regions.push(Region {
                offset: text.len(),
                content: m.as_str().to_owned(),
                newlines: m.as_str().matches('\n').count(),
            });
            text.push_str(&placeholder);
            last = m.end();
        }
        text.push_str(&source[last..]);

        Self { text, regions }
    }

    /// Whether `value` contains any placeholder.
    pub(crate) fn contains_placeholder(value: &str) -> bool {
        PLACEHOLDER_RE.is_match(value)
    }

    /// 1-based line in the original source for a byte offset in [`Self::text`].
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        let visible = self.text[..offset].matches('\n').count();
        let hidden: usize = self
            .regions
            .iter()
            .take_while(|region| region.offset < offset)
            .map(|region| region.newlines)
            .sum();
        visible + hidden + 1
    }

    /// Put protected regions back into `compiled`.
    ///
    /// The escape wrapper is dropped; only its inner content is emitted.
    pub(crate) fn restore(&self, compiled: &str) -> String {
        if self.regions.is_empty() {
            return compiled.to_owned();
        }

        PLACEHOLDER_RE
            .replace_all(compiled, |caps: &Captures<'_>| {
                let region = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.regions.get(index));
                match region {
                    Some(region) => match ESCAPE_RE.captures(&region.content) {
                        Some(inner) => inner[1].to_owned(),
                        None => region.content.clone(),
                    },
                    None => caps[0].to_owned(),
                }
            })
            .into_owned()
    }
}

fn placeholder(index: usize) -> String {
    format!("__STITCH_IGNORE_{index}__")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_protects_native_syntax() {
        let source = "a {{ x }} b {% if y %}c{% endif %} {# note #}";
        let protected = Protected::new(source);

        assert_eq!(
            protected.text,
            "a __STITCH_IGNORE_0__ b __STITCH_IGNORE_1__c__STITCH_IGNORE_2__ __STITCH_IGNORE_3__"
        );
        assert_eq!(protected.restore(&protected.text), source);
    }

    #[test]
    fn test_verbatim_and_comment_blocks_are_single_regions() {
        let source = "{% verbatim %}<c-box>{{ x }}</c-box>{% endverbatim %}\
                      {% comment %}<c-box>{% endcomment %}";
        let protected = Protected::new(source);

        assert_eq!(protected.text, "__STITCH_IGNORE_0____STITCH_IGNORE_1__");
        assert!(!protected.text.contains("<c-"));
        assert_eq!(protected.restore(&protected.text), source);
    }

    #[test]
    fn test_named_verbatim_block() {
        let source = "{% verbatim raw %}{% verbatim %}x{% endverbatim raw %}";
        let protected = Protected::new(source);
        assert_eq!(protected.text, "__STITCH_IGNORE_0__");
    }

    #[test]
    fn test_escape_wrapper_is_stripped() {
        let source = "x{% stitch:verbatim %}<c-box />{% endstitch:verbatim %}y";
        let protected = Protected::new(source);

        assert_eq!(protected.text, "x__STITCH_IGNORE_0__y");
        assert_eq!(protected.restore(&protected.text), "x<c-box />y");
    }

    #[test]
    fn test_line_of_counts_hidden_newlines() {
        let source = "one\n{# two\nthree #}\n<c-box>";
        let protected = Protected::new(source);
        let offset = protected.text.find("<c-box>").unwrap();

        assert_eq!(protected.line_of(offset), 4);
        assert_eq!(protected.line_of(0), 1);
    }

    #[test]
    fn test_unknown_placeholder_is_left_alone() {
        let protected = Protected::new("{{ a }}");
        assert_eq!(
            protected.restore("__STITCH_IGNORE_0__ __STITCH_IGNORE_7__"),
            "{{ a }} __STITCH_IGNORE_7__"
        );
    }
}
