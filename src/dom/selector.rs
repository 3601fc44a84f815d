//! CSS selector subset.
//!
//! Supports type, universal, `#id`, `.class`, attribute selectors
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`), `:nth-of-type(n)`,
//! descendant and child combinators, and comma-separated lists. That covers the
//! selectors the synthesizer emits plus the common hand-written shapes.

use thiserror::Error;

use super::document::{Document, NodeId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected '{found}' at position {position} in selector")]
    Unexpected { found: char, position: usize },

    #[error("unexpected end of selector")]
    UnexpectedEnd,

    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    nth_of_type: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    /// `combinators[i]` sits between `parts[i]` and `parts[i + 1]`.
    combinators: Vec<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse_list()
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives.iter().any(|c| {
            let last = c.parts.len() - 1;
            matches_at(doc, node, c, last)
        })
    }

    /// All matching elements in document order.
    pub fn query_all(&self, doc: &Document) -> Vec<NodeId> {
        doc.all_elements()
            .into_iter()
            .filter(|&n| self.matches(doc, n))
            .collect()
    }
}

/// Parse `selector` and return every match in document order.
pub fn query_selector_all(doc: &Document, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
    Ok(Selector::parse(selector)?.query_all(doc))
}

/// Quote a value for use inside an attribute selector.
pub fn quote_attr_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// True when `value` can be written as a bare identifier (`#value`, `.value`).
pub fn is_plain_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some('-') => {
            if !value[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                return false;
            }
        }
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn matches_at(doc: &Document, node: NodeId, complex: &Complex, idx: usize) -> bool {
    if !compound_matches(doc, node, &complex.parts[idx]) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match complex.combinators[idx - 1] {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| matches_at(doc, p, complex, idx - 1)),
        Combinator::Descendant => doc
            .ancestors(node)
            .any(|a| matches_at(doc, a, complex, idx - 1)),
    }
}

fn compound_matches(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let el = doc.element(node);
    if let Some(tag) = &compound.tag {
        if el.tag != *tag {
            return false;
        }
    }
    if compound
        .ids
        .iter()
        .any(|id| el.get_attribute("id") != Some(id.as_str()))
    {
        return false;
    }
    if !compound
        .classes
        .iter()
        .all(|class| el.classes().any(|c| c == class))
    {
        return false;
    }
    for attr in &compound.attrs {
        let value = el.get_attribute(&attr.name);
        let ok = match (&attr.op, value) {
            (_, None) => false,
            (AttrOp::Exists, Some(_)) => true,
            (AttrOp::Equals(v), Some(actual)) => actual == v,
            (AttrOp::Prefix(v), Some(actual)) => !v.is_empty() && actual.starts_with(v.as_str()),
            (AttrOp::Suffix(v), Some(actual)) => !v.is_empty() && actual.ends_with(v.as_str()),
            (AttrOp::Contains(v), Some(actual)) => !v.is_empty() && actual.contains(v.as_str()),
            (AttrOp::Word(v), Some(actual)) => actual.split_whitespace().any(|w| w == v),
        };
        if !ok {
            return false;
        }
    }
    if let Some(n) = compound.nth_of_type {
        let siblings = doc.same_tag_siblings(node);
        match siblings.iter().position(|&s| s == node) {
            Some(pos) if pos + 1 == n => {}
            _ => return false,
        }
    }
    true
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.trim().chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                found,
                position: self.pos,
            },
            None => SelectorError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), SelectorError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_list(&mut self) -> Result<Selector, SelectorError> {
        if self.chars.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut alternatives = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            self.skip_ws();
            alternatives.push(self.parse_complex()?);
        }
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(Selector { alternatives })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                    parts.push(self.parse_compound()?);
                }
                Some(',') | None => break,
                Some(_) if had_ws => {
                    combinators.push(Combinator::Descendant);
                    parts.push(self.parse_compound()?);
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(Complex { parts, combinators })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.nth_of_type = Some(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.bump().ok_or(SelectorError::UnexpectedEnd)?);
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.unexpected());
        }
        Ok(out)
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op_char = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => None,
            Some(c @ ('^' | '$' | '*' | '~')) => {
                self.pos += 1;
                Some(c)
            }
            _ => return Err(self.unexpected()),
        };
        self.expect('=')?;
        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_quoted(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;
        let op = match op_char {
            None => AttrOp::Equals(value),
            Some('^') => AttrOp::Prefix(value),
            Some('$') => AttrOp::Suffix(value),
            Some('*') => AttrOp::Contains(value),
            _ => AttrOp::Word(value),
        };
        Ok(AttrSelector { name, op })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnexpectedEnd),
                Some('\\') => out.push(self.bump().ok_or(SelectorError::UnexpectedEnd)?),
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<usize, SelectorError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        if name != "nth-of-type" {
            return Err(SelectorError::UnsupportedPseudo(name));
        }
        self.expect('(')?;
        self.skip_ws();
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.pos += 1;
        }
        self.skip_ws();
        self.expect(')')?;
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(SelectorError::UnsupportedPseudo(format!("nth-of-type({})", digits))),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    fn sample() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        let form = doc.append(body, Element::new("form").attr("id", "login"));
        let first = doc.append(form, Element::new("input").attr("name", "user").attr("class", "field wide"));
        let second = doc.append(form, Element::new("input").attr("name", "pass").attr("class", "field"));
        let button = doc.append(
            form,
            Element::new("button")
                .attr("data-testid", "submit-btn")
                .attr("aria-label", "Sign \"in\""),
        );
        (doc, vec![form, first, second, button])
    }

    #[test]
    fn test_basic_selectors() {
        let (doc, n) = sample();
        assert_eq!(query_selector_all(&doc, "#login").unwrap(), vec![n[0]]);
        assert_eq!(query_selector_all(&doc, "input.field").unwrap(), vec![n[1], n[2]]);
        assert_eq!(query_selector_all(&doc, ".field.wide").unwrap(), vec![n[1]]);
        assert_eq!(
            query_selector_all(&doc, "[data-testid=\"submit-btn\"]").unwrap(),
            vec![n[3]]
        );
        assert_eq!(query_selector_all(&doc, "[name^=pa]").unwrap(), vec![n[2]]);
    }

    #[test]
    fn test_combinators_and_nth() {
        let (doc, n) = sample();
        assert_eq!(
            query_selector_all(&doc, "#login > input:nth-of-type(2)").unwrap(),
            vec![n[2]]
        );
        assert_eq!(query_selector_all(&doc, "body input").unwrap(), vec![n[1], n[2]]);
        assert!(query_selector_all(&doc, "body > input").unwrap().is_empty());
        assert_eq!(
            query_selector_all(&doc, "button, #login").unwrap(),
            vec![n[0], n[3]]
        );
    }

    #[test]
    fn test_quoted_values() {
        let (doc, n) = sample();
        let sel = format!("[aria-label={}]", quote_attr_value("Sign \"in\""));
        assert_eq!(query_selector_all(&doc, &sel).unwrap(), vec![n[3]]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(Selector::parse("a:hover").is_err());
        assert!(Selector::parse("[name=").is_err());
        assert!(Selector::parse("div >").is_err());
    }

    #[test]
    fn test_plain_ident() {
        assert!(is_plain_ident("main-nav"));
        assert!(!is_plain_ident("1abc"));
        assert!(!is_plain_ident("a.b"));
    }
}
