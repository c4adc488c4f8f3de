//! Restricted literal parser.
//!
//! Accepts the literal forms attribute authors write in dynamic attributes:
//! integers, floats, `True`/`False`/`true`/`false`, `None`/`null`, single or
//! double quoted strings with escapes, lists, tuples (parsed as lists) and
//! mappings. Anything else, including names and operators, is rejected.

use serde_json::{Map, Number, Value};

/// Parse `text` as a single literal.
///
/// Returns `None` unless the whole input is one literal.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stitch_runtime::parse_literal;
///
/// assert_eq!(parse_literal("[1, 'a', None]"), Some(json!([1, "a", null])));
/// assert_eq!(parse_literal("{'k': (1, 2)}"), Some(json!({"k": [1, 2]})));
/// assert_eq!(parse_literal("user.name"), None);
/// ```
#[must_use]
pub fn parse_literal(text: &str) -> Option<Value> {
    let mut parser = LiteralParser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    (parser.pos == parser.bytes.len()).then_some(value)
}

struct LiteralParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match self.peek()? {
            b'[' => {
                self.pos += 1;
                self.sequence(b']').map(|(items, _)| Value::Array(items))
            }
            b'(' => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.sequence(b')')?;
                // `(x)` is a parenthesized value, `(x,)` a one-item tuple
                if items.len() == 1 && !trailing_comma {
                    items.pop()
                } else {
                    Some(Value::Array(items))
                }
            }
            b'{' => {
                self.pos += 1;
                self.mapping()
            }
            quote @ (b'"' | b'\'') => {
                self.pos += 1;
                self.string(quote).map(Value::String)
            }
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number(),
            _ => self.keyword(),
        }
    }

    /// Items up to `close`; also reports whether the last item had a trailing comma.
    fn sequence(&mut self, close: u8) -> Option<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Some((items, trailing_comma));
            }
            items.push(self.value()?);
            trailing_comma = self.eat(b',');
            if !trailing_comma {
                return self.eat(close).then_some((items, false));
            }
        }
    }

    fn mapping(&mut self) -> Option<Value> {
        let mut map = Map::new();
        loop {
            if self.eat(b'}') {
                return Some(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            if !self.eat(b':') {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            if !self.eat(b',') {
                return self.eat(b'}').then_some(Value::Object(map));
            }
        }
    }

    fn string(&mut self, quote: u8) -> Option<String> {
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();

        while let Some((offset, c)) = chars.next() {
            match c {
                c if c == char::from(quote) => {
                    self.pos += offset + 1;
                    return Some(out);
                }
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        'u' => {
                            let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                            let code = u32::from_str_radix(&hex, 16).ok()?;
                            out.push(char::from_u32(code)?);
                        }
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }

        None
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'_' => {}
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.bytes.get(self.pos + 1), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let text: String = self.src[start..self.pos].chars().filter(|&c| c != '_').collect();
        let text = text.strip_prefix('+').unwrap_or(&text);
        if is_float {
            let parsed = text.parse::<f64>().ok()?;
            Number::from_f64(parsed).map(Value::Number)
        } else if let Ok(int) = text.parse::<i64>() {
            Some(Value::from(int))
        } else {
            text.parse::<u64>().ok().map(Value::from)
        }
    }

    fn keyword(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            "None" | "null" => Some(Value::Null),
            _ => None,
        }
    }
}
