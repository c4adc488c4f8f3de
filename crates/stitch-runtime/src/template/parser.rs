//! Recursive descent parser from tokens to [`Node`] trees.

use stitch_compiler::scanner::{ScanMode, scan_attributes, strip_quotes};

use super::lexer::{Token, TokenKind, tokenize};
use super::node::{
    AttrNode, ComponentNode, ForNode, IfNode, Node, PushNode, SlotNode, StackNode, VarsDecl,
};
use crate::error::ParseError;
use crate::expr::{Condition, FilterExpr};

/// Tags that only make sense as the end or branch of an enclosing block.
const END_TAGS: &[&str] = &[
    "elif", "else", "endif", "empty", "endfor", "endc", "endslot", "endattr", "endpush",
    "endstack", "endverbatim", "endcomment",
];

/// Parse result: the node tree and the vars declaration, if any.
pub(crate) fn parse(source: &str) -> Result<(Vec<Node>, Option<VarsDecl>), ParseError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        vars: None,
    };
    let (nodes, _) = parser.parse_until(&[])?;
    Ok((nodes, parser.vars))
}

/// The block tag that stopped [`Parser::parse_until`].
struct Stop<'a> {
    word: &'a str,
    rest: &'a str,
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    vars: Option<VarsDecl>,
}

fn syntax(message: impl Into<String>, line: usize) -> ParseError {
    ParseError::Syntax {
        message: message.into(),
        line,
    }
}

fn split_word(content: &str) -> (&str, &str) {
    content
        .split_once(char::is_whitespace)
        .map_or((content, ""), |(word, rest)| (word, rest.trim()))
}

impl<'a> Parser<'a> {
    /// Parse nodes until one of `ends` or end of input.
    fn parse_until(&mut self, ends: &[&str]) -> Result<(Vec<Node>, Option<Stop<'a>>), ParseError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.get(self.pos).copied() {
            self.pos += 1;
            match token.kind {
                TokenKind::Text => nodes.push(Node::Text(token.content.to_owned())),
                TokenKind::Var => {
                    let expr =
                        FilterExpr::parse(token.content).map_err(|msg| syntax(msg, token.line))?;
                    nodes.push(Node::Var(expr));
                }
                TokenKind::Block => {
                    let (word, rest) = split_word(token.content);
                    if ends.contains(&word) {
                        return Ok((nodes, Some(Stop { word, rest })));
                    }
                    if let Some(node) = self.parse_tag(word, rest, token.line)? {
                        nodes.push(node);
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    /// Parse a block body that must be closed by one of `ends`.
    fn parse_body(
        &mut self,
        tag: &str,
        line: usize,
        ends: &[&str],
    ) -> Result<(Vec<Node>, Stop<'a>), ParseError> {
        match self.parse_until(ends)? {
            (nodes, Some(stop)) => Ok((nodes, stop)),
            (_, None) => Err(ParseError::Unclosed {
                tag: tag.to_owned(),
                line,
            }),
        }
    }

    fn parse_tag(&mut self, word: &str, rest: &'a str, line: usize) -> Result<Option<Node>, ParseError> {
        let node = match word {
            "if" => Node::If(self.parse_if(rest, line)?),
            "for" => Node::For(self.parse_for(rest, line)?),
            "c" => Node::Component(self.parse_component(rest, line)?),
            "slot" => {
                let name = strip_quotes(rest);
                if name.is_empty() {
                    return Err(syntax("slot tag requires a name", line));
                }
                let (body, _) = self.parse_body("slot", line, &["endslot"])?;
                Node::Slot(SlotNode {
                    name: name.to_owned(),
                    body,
                })
            }
            "attr" => {
                if rest.is_empty() {
                    return Err(syntax("attr tag requires a name", line));
                }
                let (body, _) = self.parse_body("attr", line, &["endattr"])?;
                Node::Attr(AttrNode {
                    name: rest.to_owned(),
                    body,
                })
            }
            "push" => Node::Push(self.parse_push(rest, line)?),
            "stack" => Node::Stack(self.parse_stack(rest, line)?),
            "vars" => {
                if self.vars.is_some() {
                    return Err(syntax("a template may declare vars only once", line));
                }
                let scanned = scan_attributes(rest, ScanMode::Vars);
                self.vars = Some(VarsDecl {
                    attrs: scanned.attrs,
                    empty: scanned.empty,
                });
                return Ok(None);
            }
            word if END_TAGS.contains(&word) => {
                return Err(ParseError::UnexpectedTag {
                    tag: word.to_owned(),
                    line,
                });
            }
            word => {
                return Err(ParseError::UnknownTag {
                    tag: word.to_owned(),
                    line,
                });
            }
        };
        Ok(Some(node))
    }

    fn parse_if(&mut self, condition: &str, line: usize) -> Result<IfNode, ParseError> {
        let mut branches = Vec::new();
        let mut condition = Condition::parse(condition).map_err(|msg| syntax(msg, line))?;

        loop {
            let (body, stop) = self.parse_body("if", line, &["elif", "else", "endif"])?;
            branches.push((condition, body));
            match stop.word {
                "elif" => {
                    condition = Condition::parse(stop.rest).map_err(|msg| syntax(msg, line))?;
                }
                "else" => {
                    let (otherwise, _) = self.parse_body("if", line, &["endif"])?;
                    return Ok(IfNode { branches, otherwise });
                }
                _ => {
                    return Ok(IfNode {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
            }
        }
    }

    fn parse_for(&mut self, args: &str, line: usize) -> Result<ForNode, ParseError> {
        let (targets, iterable) = args
            .split_once(" in ")
            .ok_or_else(|| syntax("for tag must be 'for x in items'", line))?;
        let targets: Vec<String> = targets.split(',').map(|t| t.trim().to_owned()).collect();
        if targets.is_empty() || targets.len() > 2 || targets.iter().any(|t| t.is_empty()) {
            return Err(syntax(format!("invalid loop variables '{args}'"), line));
        }

        let iterable = iterable.trim();
        let (iterable, reversed) = match iterable.strip_suffix(" reversed") {
            Some(inner) => (inner.trim(), true),
            None => (iterable, false),
        };
        let iterable = FilterExpr::parse(iterable).map_err(|msg| syntax(msg, line))?;

        let (body, stop) = self.parse_body("for", line, &["empty", "endfor"])?;
        let empty = if stop.word == "empty" {
            self.parse_body("for", line, &["endfor"])?.0
        } else {
            Vec::new()
        };

        Ok(ForNode {
            targets,
            iterable,
            reversed,
            body,
            empty,
        })
    }

    fn parse_component(&mut self, args: &str, line: usize) -> Result<ComponentNode, ParseError> {
        let (name, attrs) = split_word(args);
        if name.is_empty() {
            return Err(syntax("component tag requires a name", line));
        }
        let scanned = scan_attributes(attrs, ScanMode::Component);
        let (body, _) = self.parse_body("c", line, &["endc"])?;

        Ok(ComponentNode {
            name: name.to_owned(),
            attrs: scanned.attrs,
            only: scanned.only,
            body,
            line,
        })
    }

    fn parse_push(&mut self, args: &str, line: usize) -> Result<PushNode, ParseError> {
        let scanned = scan_attributes(args, ScanMode::Component);
        let mut to = None;
        let mut key = None;
        let mut multiple = false;

        for attr in &scanned.attrs {
            match (attr.key.as_str(), &attr.value) {
                ("to", Some(value)) => to = Some(value.as_str()),
                ("key" | "id", Some(value)) => {
                    if key.is_some() {
                        return Err(syntax("push tag cannot have both 'key' and 'id'", line));
                    }
                    key = Some(value.as_str());
                }
                ("multiple", None) => multiple = true,
                (other, _) => {
                    return Err(syntax(format!("unknown argument '{other}' for push tag"), line));
                }
            }
        }

        let to = to.ok_or_else(|| syntax("push tag requires a 'to' attribute", line))?;
        let to = FilterExpr::parse(to).map_err(|msg| syntax(msg, line))?;
        let key = key
            .map(FilterExpr::parse)
            .transpose()
            .map_err(|msg| syntax(msg, line))?;
        let (body, _) = self.parse_body("push", line, &["endpush"])?;

        Ok(PushNode {
            to,
            key,
            multiple,
            body,
        })
    }

    fn parse_stack(&mut self, args: &str, line: usize) -> Result<StackNode, ParseError> {
        let scanned = scan_attributes(args, ScanMode::Component);
        let mut name = None;
        for attr in &scanned.attrs {
            match (attr.key.as_str(), &attr.value) {
                ("name", Some(value)) => name = Some(value.as_str()),
                (other, _) => {
                    return Err(syntax(format!("unknown argument '{other}' for stack tag"), line));
                }
            }
        }

        let name = name.ok_or_else(|| syntax("stack tag requires a 'name' attribute", line))?;
        let name = FilterExpr::parse(name).map_err(|msg| syntax(msg, line))?;
        let (fallback, _) = self.parse_body("stack", line, &["endstack"])?;

        Ok(StackNode { name, fallback })
    }
}
