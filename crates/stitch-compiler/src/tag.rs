//! Custom tag discovery.

use crate::CompileError;
use crate::scanner::find_tag_end;

/// A custom tag found in (protected) source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawTag<'a> {
    /// Name after the prefix, e.g. `box` for `<c-box>`.
    pub(crate) name: &'a str,
    /// Attribute text between the name and the tag end, without a trailing `/`.
    pub(crate) raw_attrs: &'a str,
    pub(crate) is_closing: bool,
    pub(crate) is_self_closing: bool,
    /// Byte offset of `<`.
    pub(crate) start: usize,
    /// Byte offset just past `>`.
    pub(crate) end: usize,
}

/// Iterator over custom tags with a given prefix.
pub(crate) struct TagScanner<'a> {
    text: &'a str,
    /// `<c-`
    open: String,
    pos: usize,
}

impl<'a> TagScanner<'a> {
    pub(crate) fn new(text: &'a str, prefix: &str) -> Self {
        Self {
            text,
            open: format!("<{prefix}-"),
            pos: 0,
        }
    }

    /// Find the next custom tag at or after the current position.
    ///
    /// The error carries the byte offset of the offending tag so callers
    /// can attach a line number.
    pub(crate) fn next_tag(&mut self) -> Result<Option<RawTag<'a>>, (usize, String)> {
        let text = self.text;

        while let Some(found) = text[self.pos..].find('<') {
            let start = self.pos + found;
            let rest = &text[start..];
            let (is_closing, head_len) = if rest.starts_with(self.open.as_str()) {
                (false, self.open.len())
            } else if rest.starts_with("</") && rest[2..].starts_with(&self.open[1..]) {
                (true, self.open.len() + 1)
            } else {
                self.pos = start + 1;
                continue;
            };

            let name_start = start + head_len;
            let name_len = name_length(&text[name_start..]);
            let name = &text[name_start..name_start + name_len];

            let Some((end, is_self_closing)) = find_tag_end(text, name_start + name_len) else {
                return Err((start, name.to_owned()));
            };

            let mut raw_attrs = text[name_start + name_len..end - 1].trim_end();
            if is_self_closing {
                raw_attrs = raw_attrs.strip_suffix('/').unwrap_or(raw_attrs);
            }

            self.pos = end;
            return Ok(Some(RawTag {
                name,
                raw_attrs,
                is_closing,
                is_self_closing: is_self_closing && !is_closing,
                start,
                end,
            }));
        }

        self.pos = text.len();
        Ok(None)
    }

    /// Collect every remaining tag, attaching line numbers to errors.
    pub(crate) fn collect_all(
        mut self,
        line_of: impl Fn(usize) -> usize,
    ) -> Result<Vec<RawTag<'a>>, CompileError> {
        let mut tags = Vec::new();
        loop {
            match self.next_tag() {
                Ok(Some(tag)) => tags.push(tag),
                Ok(None) => return Ok(tags),
                Err((offset, name)) => {
                    return Err(CompileError::Unterminated {
                        tag: format!("{}{name}", &self.open[1..]),
                        line: line_of(offset),
                    });
                }
            }
        }
    }
}

/// Length of a tag name: runs to whitespace, `>` or `/>`.
fn name_length(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' | b'>' => break,
            b'/' if bytes.get(i + 1) == Some(&b'>') => break,
            _ => i += 1,
        }
    }
    i
}
