//! Splits directive text into text, variable and block tokens.

use stitch_compiler::scanner::find_directive_end;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    /// `{{ ... }}`
    Var,
    /// `{% ... %}`
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub(crate) kind: TokenKind,
    /// Trimmed token content, or raw text.
    pub(crate) content: &'a str,
    pub(crate) line: usize,
}

/// Tokenize `source`.
///
/// `{# #}` and `{% comment %}` blocks are dropped; `{% verbatim %}` blocks
/// become a single text token holding their inner content.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        line: 1,
        counted: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    /// Offset up to which newlines are already counted in `line`.
    counted: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn line_at(&mut self, offset: usize) -> usize {
        self.line += self.src[self.counted..offset].matches('\n').count();
        self.counted = offset;
        self.line
    }

    fn text(&mut self, end: usize) {
        if end > self.pos {
            let line = self.line_at(self.pos);
            self.tokens.push(Token {
                kind: TokenKind::Text,
                content: &self.src[self.pos..end],
                line,
            });
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        let src = self.src;

        while let Some(found) = next_opener(&src[self.pos..]) {
            let start = self.pos + found;
            self.text(start);
            let line = self.line_at(start);

            match &src[start..start + 2] {
                "{#" => {
                    let end = src[start + 2..]
                        .find("#}")
                        .ok_or(ParseError::UnterminatedToken { delimiter: "{#", line })?;
                    self.pos = start + 2 + end + 2;
                }
                "{{" => {
                    let end = find_directive_end(src, start + 2, "}}")
                        .ok_or(ParseError::UnterminatedToken { delimiter: "{{", line })?;
                    self.tokens.push(Token {
                        kind: TokenKind::Var,
                        content: src[start + 2..end].trim(),
                        line,
                    });
                    self.pos = end + 2;
                }
                _ => {
                    let end = find_directive_end(src, start + 2, "%}")
                        .ok_or(ParseError::UnterminatedToken { delimiter: "{%", line })?;
                    let content = src[start + 2..end].trim();
                    self.pos = end + 2;
                    self.block(content, line)?;
                }
            }
        }

        self.text(src.len());
        Ok(())
    }

    fn block(&mut self, content: &'a str, line: usize) -> Result<(), ParseError> {
        let (word, rest) = content.split_once(char::is_whitespace).unwrap_or((content, ""));
        match word {
            "verbatim" => {
                let close = closing_name("endverbatim", rest);
                let (inner_end, after) = self.find_block_end(&close, "verbatim", line)?;
                if inner_end > self.pos {
                    self.tokens.push(Token {
                        kind: TokenKind::Text,
                        content: &self.src[self.pos..inner_end],
                        line,
                    });
                }
                self.pos = after;
            }
            "comment" => {
                let (_, after) = self.find_block_end("endcomment", "comment", line)?;
                self.pos = after;
            }
            _ => self.tokens.push(Token {
                kind: TokenKind::Block,
                content,
                line,
            }),
        }
        Ok(())
    }

    /// Find `{% close %}` at or after the current position.
    ///
    /// Returns the offset of its `{%` and the offset just past its `%}`.
    fn find_block_end(&self, close: &str, tag: &str, line: usize) -> Result<(usize, usize), ParseError> {
        let src = self.src;
        let mut from = self.pos;

        while let Some(found) = src[from..].find("{%") {
            let start = from + found;
            let Some(end) = src[start + 2..].find("%}").map(|e| start + 2 + e) else {
                break;
            };
            if src[start + 2..end].trim() == close {
                return Ok((start, end + 2));
            }
            from = start + 2;
        }

        Err(ParseError::Unclosed {
            tag: tag.to_owned(),
            line,
        })
    }
}

fn closing_name(end: &str, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        end.to_owned()
    } else {
        format!("{end} {name}")
    }
}

/// Offset of the next `{{`, `{%` or `{#`.
fn next_opener(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let i = from + found;
        if matches!(bytes.get(i + 1), Some(b'{' | b'%' | b'#')) {
            return Some(i);
        }
        from = i + 1;
    }
    None
}
