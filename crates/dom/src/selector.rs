//! A small CSS selector subset: type, `*`, `.class`, `#id`, `[attr]`,
//! `[attr=value]`, descendant and child combinators, and selector lists.
//!
//! Hosts backed by a real browser can ignore the parsed form and hand
//! [`Selector::source`] to the native query engine.

use crate::error::{DomError, Result};
use crate::NodeId;
use std::fmt;
use std::str::FromStr;

/// Read access needed to evaluate a selector against a tree.
pub trait MatchContext {
    /// Lower-case tag name, or `None` for non-element nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let alternatives = Parser::new(source).parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches<C: MatchContext + ?Sized>(&self, ctx: &C, node: NodeId) -> bool {
        ctx.tag_name(node).is_some()
            && self
                .alternatives
                .iter()
                .any(|complex| complex.matches_at(ctx, node, complex.compounds.len() - 1))
    }
}

impl FromStr for Selector {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl ComplexSelector {
    fn matches_at<C: MatchContext + ?Sized>(&self, ctx: &C, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(ctx, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => ctx
                .parent_element(node)
                .is_some_and(|parent| self.matches_at(ctx, parent, idx - 1)),
            Combinator::Descendant => {
                let mut current = ctx.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_at(ctx, ancestor, idx - 1) {
                        return true;
                    }
                    current = ctx.parent_element(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches<C: MatchContext + ?Sized>(&self, ctx: &C, node: NodeId) -> bool {
        let Some(tag) = ctx.tag_name(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if ctx.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = ctx.attribute(node, "class").unwrap_or("");
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|attr| {
            match (ctx.attribute(node, &attr.name), attr.value.as_deref()) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            }
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DomError {
        DomError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<Vec<ComplexSelector>> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            out.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(other) => return Err(self.error(format!("unexpected `{other}`"))),
            }
        }
        Ok(out)
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(other) => return Err(self.error(format!("unexpected `{other}`"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut consumed = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                consumed = true;
            }
            Some(ch) if is_ident_char(ch) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
                consumed = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
            consumed = true;
        }

        if consumed {
            Ok(compound)
        } else {
            Err(self.error("expected a simple selector"))
        }
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> Result<AttributeMatch> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let value = match self.bump() {
            Some(']') => return Ok(AttributeMatch { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('\'' | '"')) => {
                        self.bump();
                        let start = self.pos;
                        while self.peek().is_some_and(|ch| ch != quote) {
                            self.pos += 1;
                        }
                        if self.bump() != Some(quote) {
                            return Err(self.error("unterminated attribute value"));
                        }
                        self.chars[start..self.pos - 1].iter().collect()
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_whitespace();
                value
            }
            _ => return Err(self.error("malformed attribute selector")),
        };
        if self.bump() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        Ok(AttributeMatch {
            name,
            value: Some(value),
        })
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}
