#![forbid(unsafe_code)]

//! A small CSS selector subset.
//!
//! Supported: type (`div`), universal (`*`), `#id`, `.class`, `[attr]`,
//! `[attr=value]` with bare or quoted values, compound selectors, the
//! descendant (whitespace) and child (`>`) combinators, and comma lists.
//!
//! Everything else is rejected with a [`SelectorError`]; the parser never
//! panics on arbitrary input.
//!
//! Matching runs right to left against any [`ElementTree`], so the selector
//! engine does not depend on the document's storage.

use std::str::FromStr;

use crate::error::{SelectorError, SelectorErrorKind};
use crate::node::{ElementData, NodeId};

/// Read-only view of a tree, enough to match selectors against it.
pub trait ElementTree {
    /// The element payload, or `None` for non-element nodes.
    fn element(&self, node: NodeId) -> Option<&ElementData>;

    /// The parent node of any kind.
    fn parent_node(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// `None` for the universal selector or when no type is given.
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

impl Compound {
    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag
            && tag != element.tag()
        {
            return false;
        }
        self.ids.iter().all(|id| element.id() == Some(id.as_str()))
            && self.classes.iter().all(|class| element.has_class(class))
            && self.attributes.iter().all(|attr| {
                match (element.attribute(&attr.name), &attr.value) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                }
            })
    }
}

/// Compounds left to right; `combinators[i]` joins `parts[i]` and `parts[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.matches_at(tree, node, self.parts.len() - 1)
    }

    fn matches_at<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId, index: usize) -> bool {
        let Some(element) = tree.element(node) else {
            return false;
        };
        if !self.parts[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent_node(node)
                .is_some_and(|parent| self.matches_at(tree, parent, index - 1)),
            Combinator::Descendant => {
                let mut current = tree.parent_node(node);
                while let Some(ancestor) = current {
                    if self.matches_at(tree, ancestor, index - 1) {
                        return true;
                    }
                    current = tree.parent_node(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser { input, pos: 0 };
        parser.skip_ws();
        if parser.at_end() {
            return Err(SelectorError::new(SelectorErrorKind::Empty, 0));
        }

        let mut selectors = vec![parser.complex()?];
        loop {
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => {
                    let at = parser.pos;
                    parser.bump();
                    parser.skip_ws();
                    if parser.at_end() {
                        return Err(SelectorError::new(
                            SelectorErrorKind::DanglingCombinator,
                            at,
                        ));
                    }
                    selectors.push(parser.complex()?);
                }
                Some(c) => {
                    return Err(SelectorError::new(
                        SelectorErrorKind::UnexpectedChar(c),
                        parser.pos,
                    ));
                }
            }
        }
        Ok(Self { selectors })
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(tree, node))
    }

    /// Number of comma-separated selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Returns whether any whitespace was consumed.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos != start
    }

    fn error(&self, kind: SelectorErrorKind) -> SelectorError {
        SelectorError::new(kind, self.pos)
    }

    fn end_or_unexpected(&self) -> SelectorError {
        match self.peek() {
            None => self.error(SelectorErrorKind::UnexpectedEnd),
            Some(c) => self.error(SelectorErrorKind::UnexpectedChar(c)),
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut parts = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    let at = self.pos;
                    self.bump();
                    self.skip_ws();
                    if matches!(self.peek(), None | Some(',') | Some('>')) {
                        return Err(SelectorError::new(
                            SelectorErrorKind::DanglingCombinator,
                            at,
                        ));
                    }
                    Combinator::Child
                }
                Some(c @ ('+' | '~')) => {
                    return Err(self.error(SelectorErrorKind::Unsupported(c)));
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(SelectorErrorKind::UnexpectedChar(c))),
            };
            combinators.push(combinator);
            parts.push(self.compound()?);
        }
        Ok(ComplexSelector { parts, combinators })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;
        match self.peek() {
            Some('*') => {
                self.bump();
                any = true;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.attribute()?);
                }
                Some(':') => return Err(self.error(SelectorErrorKind::Unsupported(':'))),
                _ => break,
            }
            any = true;
        }
        if !any {
            return Err(self.end_or_unexpected());
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error(SelectorErrorKind::ExpectedIdent));
        }
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error(SelectorErrorKind::UnexpectedEnd)),
                Some(c) if c == quote => {
                    let value = self.input[start..self.pos].to_string();
                    self.bump();
                    return Ok(value);
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn attribute(&mut self) -> Result<AttributeMatch, SelectorError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.bump();
                self.skip_ws();
                let value = match self.peek() {
                    Some(q @ ('"' | '\'')) => self.quoted(q)?,
                    Some(_) => self.ident()?,
                    None => return Err(self.error(SelectorErrorKind::UnexpectedEnd)),
                };
                self.skip_ws();
                Some(value)
            }
            _ => return Err(self.end_or_unexpected()),
        };
        if self.peek() != Some(']') {
            return Err(self.end_or_unexpected());
        }
        self.bump();
        Ok(AttributeMatch { name, value })
    }
}
