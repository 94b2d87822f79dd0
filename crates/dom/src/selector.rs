//! Small CSS selector engine used for block/ignore policies.
//!
//! Supported grammar: selector lists (`,`), descendant and child (`>`)
//! combinators, and compounds built from `*`, type, `#id`, `.class` and
//! attribute selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`).
//! Matching follows the document's ancestry and never crosses a shadow
//! boundary.

use crate::{Document, NodeKey};
use memchr::memmem;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectorError {
    Empty,
    UnexpectedChar { pos: usize, ch: char },
    UnterminatedAttribute { pos: usize },
    DanglingCombinator { pos: usize },
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Empty => f.write_str("empty selector"),
            SelectorError::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected {ch:?} at offset {pos}")
            }
            SelectorError::UnterminatedAttribute { pos } => {
                write!(f, "unterminated attribute selector at offset {pos}")
            }
            SelectorError::DanglingCombinator { pos } => {
                write!(f, "combinator without a right-hand side at offset {pos}")
            }
        }
    }
}

impl std::error::Error for SelectorError {}

#[derive(Clone, Debug)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

/// Compounds stored left to right; `combinators[i]` joins `compounds[i]`
/// and `compounds[i + 1]`.
#[derive(Clone, Debug)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrMatcher>,
}

#[derive(Clone, Debug)]
struct AttrMatcher {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser {
            src: source.as_bytes(),
            pos: 0,
        };
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(b',') => parser.pos += 1,
                Some(ch) => {
                    return Err(SelectorError::UnexpectedChar {
                        pos: parser.pos,
                        ch: ch as char,
                    });
                }
            }
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether an element matches any alternative. Non-elements never match.
    pub fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        doc.is_element(key) && self.alternatives.iter().any(|c| c.matches(doc, key))
    }

    /// Nearest inclusive element ancestor matching the selector.
    pub fn closest(&self, doc: &Document, key: NodeKey) -> Option<NodeKey> {
        std::iter::once(key)
            .chain(doc.ancestors(key))
            .take_while(|k| doc.is_element(*k))
            .find(|k| self.matches(doc, *k))
    }
}

impl Complex {
    fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        self.matches_at(doc, key, self.compounds.len() - 1)
    }

    fn matches_at(&self, doc: &Document, key: NodeKey, index: usize) -> bool {
        if !self.compounds[index].matches(doc, key) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent_element(key)
                .is_some_and(|parent| self.matches_at(doc, parent, index - 1)),
            Combinator::Descendant => doc
                .ancestors(key)
                .take_while(|k| doc.is_element(*k))
                .any(|ancestor| self.matches_at(doc, ancestor, index - 1)),
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        let Some(name) = doc.name(key) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(name) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attribute(key, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|class| doc.class_list(key).any(|c| c == class))
        {
            return false;
        }
        self.attributes.iter().all(|attr| attr.matches(doc, key))
    }
}

impl AttrMatcher {
    fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        let Some(actual) = doc.attribute(key, &self.name) else {
            return false;
        };
        let expected = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_ascii_whitespace().any(|t| t == expected),
            AttrOp::DashMatch => {
                actual == expected
                    || (actual.starts_with(expected)
                        && actual.as_bytes().get(expected.len()) == Some(&b'-'))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOp::Substring => {
                !expected.is_empty() && memmem::find(actual.as_bytes(), expected.as_bytes()).is_some()
            }
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(ch) => SelectorError::UnexpectedChar {
                pos: self.pos,
                ch: ch as char,
            },
            None => SelectorError::Empty,
        }
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_ws();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(b',') => break,
                Some(b'>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            if matches!(self.peek(), None | Some(b',')) {
                return Err(SelectorError::DanglingCombinator { pos: self.pos });
            }
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        if self.peek() == Some(b'*') {
            self.pos += 1;
            compound.tag = Some("*".to_string());
        } else if self.peek().is_some_and(is_ident_byte) {
            compound.tag = Some(self.ident().to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some(b'#') => {
                    self.pos += 1;
                    compound.id = Some(self.required_ident()?);
                }
                Some(b'.') => {
                    self.pos += 1;
                    compound.classes.push(self.required_ident()?);
                }
                Some(b'[') => {
                    self.pos += 1;
                    compound.attributes.push(self.attribute()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn required_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.ident();
        if ident.is_empty() {
            return Err(self.unexpected());
        }
        Ok(ident)
    }

    fn attribute(&mut self) -> Result<AttrMatcher, SelectorError> {
        let open = self.pos - 1;
        self.skip_ws();
        let name = self.required_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(b']') => {
                self.pos += 1;
                return Ok(AttrMatcher {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some(b'=') => AttrOp::Equals,
            Some(b'~') => AttrOp::Includes,
            Some(b'|') => AttrOp::DashMatch,
            Some(b'^') => AttrOp::Prefix,
            Some(b'$') => AttrOp::Suffix,
            Some(b'*') => AttrOp::Substring,
            None => return Err(SelectorError::UnterminatedAttribute { pos: open }),
            Some(_) => return Err(self.unexpected()),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            if self.peek() != Some(b'=') {
                return Err(self.unexpected());
            }
            self.pos += 1;
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::UnterminatedAttribute { pos: open });
                }
                let value = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.pos += 1;
                value
            }
            _ => self.required_ident()?,
        };
        self.skip_ws();
        if self.peek() != Some(b']') {
            return Err(SelectorError::UnterminatedAttribute { pos: open });
        }
        self.pos += 1;
        Ok(AttrMatcher { name, op, value })
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}
