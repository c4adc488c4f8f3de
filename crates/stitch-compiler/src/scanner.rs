//! Lexical scanning of attribute lists.
//!
//! A small character state machine shared by the tag compiler and the
//! runtime directive parser. Quoted values are atomic, and quote characters
//! inside nested `{{ }}` or `{% %}` blocks never terminate a value, so
//! attributes such as `x-data='{ name: "{{ user|default:"Guest" }}" }'`
//! survive intact.

/// What a bare key (one without `=`) means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Bare keys are boolean flags; `only` sets [`ScannedAttrs::only`].
    Component,
    /// Bare keys are declared names without a default.
    Vars,
}

/// A single scanned attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute key, including a leading `:` for dynamic attributes.
    pub key: String,
    /// Raw value with its surrounding quotes, or `None` for a bare key.
    pub value: Option<String>,
}

impl Attribute {
    /// Value with surrounding quotes removed.
    #[must_use]
    pub fn unquoted(&self) -> Option<&str> {
        self.value.as_deref().map(strip_quotes)
    }
}

/// Result of [`scan_attributes`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScannedAttrs {
    /// Attributes in source order.
    pub attrs: Vec<Attribute>,
    /// Bare keys seen in [`ScanMode::Vars`].
    pub empty: Vec<String>,
    /// Whether the `only` keyword was present in [`ScanMode::Component`].
    pub only: bool,
}

impl ScannedAttrs {
    /// First attribute named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|attr| attr.key == key)
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && is_whitespace(bytes[i]) {
        i += 1;
    }
    i
}

/// Scan an attribute list such as `title="Hi" :count="3" disabled only`.
///
/// Whitespace around `=` is allowed. Unquoted values run to the next
/// whitespace; an unterminated quote consumes the rest of the input.
#[must_use]
pub fn scan_attributes(text: &str, mode: ScanMode) -> ScannedAttrs {
    let bytes = text.as_bytes();
    let mut scanned = ScannedAttrs::default();
    let mut i = 0;

    loop {
        i = skip_whitespace(bytes, i);
        if i >= bytes.len() {
            break;
        }

        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !is_whitespace(bytes[i]) {
            i += 1;
        }
        let key = &text[key_start..i];
        let after_key = skip_whitespace(bytes, i);

        if after_key < bytes.len() && bytes[after_key] == b'=' {
            if key.is_empty() {
                // Stray '='
                i = after_key + 1;
                continue;
            }
            let value_start = skip_whitespace(bytes, after_key + 1);
            let value_end = scan_value(bytes, value_start);
            scanned.attrs.push(Attribute {
                key: key.to_owned(),
                value: Some(text[value_start..value_end].to_owned()),
            });
            i = value_end;
        } else {
            match mode {
                ScanMode::Component if key == "only" => scanned.only = true,
                ScanMode::Component => scanned.attrs.push(Attribute {
                    key: key.to_owned(),
                    value: None,
                }),
                ScanMode::Vars => scanned.empty.push(key.to_owned()),
            }
            i = after_key;
        }
    }

    scanned
}

/// Return the end of the value starting at `start`.
fn scan_value(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start) {
        Some(&quote @ (b'"' | b'\'')) => scan_quoted(bytes, start + 1, quote),
        Some(_) => {
            let mut i = start;
            while i < bytes.len() && !is_whitespace(bytes[i]) {
                i += 1;
            }
            i
        }
        None => start,
    }
}

/// Return the index just past the quote closing a value opened before `from`.
///
/// Tracks `{{ }}` and `{% %}` depth; backslash escapes the next byte.
fn scan_quoted(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut depth = 0usize;
    let mut i = from;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match (bytes[i], next) {
            (b'\\', _) => i += 2,
            (b'{', Some(b'{' | b'%')) => {
                depth += 1;
                i += 2;
            }
            (b'}', Some(b'}')) | (b'%', Some(b'}')) => {
                depth = depth.saturating_sub(1);
                i += 2;
            }
            (c, _) if c == quote && depth == 0 => return i + 1,
            _ => i += 1,
        }
    }

    bytes.len()
}

/// Remove one pair of matching surrounding quotes.
///
/// An unterminated leading quote is removed on its own.
#[must_use]
pub fn strip_quotes(value: &str) -> &str {
    let Some(first) = value.chars().next().filter(|c| matches!(c, '"' | '\'')) else {
        return value;
    };
    let inner = &value[1..];
    inner.strip_suffix(first).unwrap_or(inner)
}

/// Find the `>` ending a markup tag whose head starts at `from`.
///
/// Returns the index just past `>` and whether the tag is self-closing.
/// `>` inside quoted attribute values does not end the tag.
#[must_use]
pub fn find_tag_end(text: &str, from: usize) -> Option<(usize, bool)> {
    let bytes = text.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => i = scan_quoted(bytes, i + 1, quote),
            b'>' => {
                let self_closing = text[from..i].trim_end().ends_with('/');
                return Some((i + 1, self_closing));
            }
            _ => i += 1,
        }
    }

    None
}

/// Find the start of `close` (`%}` or `}}`) ending a token opened before `from`.
///
/// Quoted strings are skipped as a unit. If quoting is unbalanced the first
/// plain occurrence of `close` is used instead.
#[must_use]
pub fn find_directive_end(text: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let close_bytes = close.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => i = scan_quoted(bytes, i + 1, quote),
            _ if bytes[i..].starts_with(close_bytes) => return Some(i),
            _ => i += 1,
        }
    }

    text.get(from..)?.find(close).map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn pairs(scanned: &ScannedAttrs) -> Vec<(&str, Option<&str>)> {
        scanned
            .attrs
            .iter()
            .map(|a| (a.key.as_str(), a.value.as_deref()))
            .collect()
    }

    #[test]
    fn test_scan_mixed_attributes() {
        let scanned = scan_attributes(
            r#"title="Hi there" :count='3' size=lg disabled"#,
            ScanMode::Component,
        );

        assert_eq!(
            pairs(&scanned),
            vec![
                ("title", Some(r#""Hi there""#)),
                (":count", Some("'3'")),
                ("size", Some("lg")),
                ("disabled", None),
            ]
        );
        assert!(!scanned.only);
    }

    #[test]
    fn test_scan_only_flag() {
        let scanned = scan_attributes(r#"a="1" only"#, ScanMode::Component);
        assert!(scanned.only);
        assert_eq!(pairs(&scanned), vec![("a", Some(r#""1""#))]);

        // "only" as a key with a value is an ordinary attribute
        let scanned = scan_attributes(r#"only="x""#, ScanMode::Component);
        assert!(!scanned.only);
        assert_eq!(pairs(&scanned), vec![("only", Some(r#""x""#))]);
    }

    #[test]
    fn test_scan_vars_mode_collects_empty_names() {
        let scanned = scan_attributes(r#"title="Untitled" icon :n="1""#, ScanMode::Vars);
        assert_eq!(
            pairs(&scanned),
            vec![("title", Some(r#""Untitled""#)), (":n", Some(r#""1""#))]
        );
        assert_eq!(scanned.empty, vec!["icon".to_owned()]);
    }

    #[test]
    fn test_scan_quotes_inside_template_syntax() {
        let scanned = scan_attributes(r#"attr="{% x "y" %}" next="z""#, ScanMode::Component);
        assert_eq!(
            pairs(&scanned),
            vec![("attr", Some(r#""{% x "y" %}""#)), ("next", Some(r#""z""#))]
        );

        let scanned = scan_attributes(
            r#"@click="modal = 'id-{{ date|date:"Y-m-d" }}'""#,
            ScanMode::Component,
        );
        assert_eq!(
            scanned.attrs[0].unquoted(),
            Some(r#"modal = 'id-{{ date|date:"Y-m-d" }}'"#)
        );
    }

    #[test]
    fn test_scan_escaped_quote() {
        let scanned = scan_attributes(r#"label="say \"hi\"""#, ScanMode::Component);
        assert_eq!(scanned.attrs[0].unquoted(), Some(r#"say \"hi\""#));
    }

    #[test]
    fn test_scan_whitespace_around_equals() {
        let scanned = scan_attributes("title = \"Hi\"\n  other\t=\tx", ScanMode::Component);
        assert_eq!(
            pairs(&scanned),
            vec![("title", Some(r#""Hi""#)), ("other", Some("x"))]
        );
    }

    #[test]
    fn test_scan_unterminated_quote_consumes_rest() {
        let scanned = scan_attributes(r#"a="open b=2"#, ScanMode::Component);
        assert_eq!(pairs(&scanned), vec![("a", Some(r#""open b=2"#))]);
        assert_eq!(scanned.attrs[0].unquoted(), Some("open b=2"));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes(r#""a""#), "a");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes("a"), "a");
        assert_eq!(strip_quotes(r#""a'"#), "a'");
        assert_eq!(strip_quotes(r#""""#), "");
    }

    #[test]
    fn test_find_tag_end() {
        let text = r#"<c-box title="a > b">x"#;
        assert_eq!(find_tag_end(text, 6), Some((21, false)));

        let text = "<c-box />";
        assert_eq!(find_tag_end(text, 6), Some((9, true)));

        assert_eq!(find_tag_end("<c-box title=\"x", 6), None);
    }

    #[test]
    fn test_find_directive_end_skips_quoted_closers() {
        let text = r#"{% c box title="{{ a }} %}" %}rest"#;
        let end = find_directive_end(text, 2, "%}").unwrap();
        assert_eq!(&text[end..], "%}rest");

        let text = "{% if x %}";
        assert_eq!(find_directive_end(text, 2, "%}"), Some(8));
    }

    #[test]
    fn test_find_directive_end_falls_back_on_stray_quote() {
        let text = "{% c box title=it's %} tail";
        let end = find_directive_end(text, 2, "%}").unwrap();
        assert_eq!(&text[end..], "%} tail");
    }
}
