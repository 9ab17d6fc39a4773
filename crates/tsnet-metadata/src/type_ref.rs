//! Parser for type references written in target-runtime syntax.
//!
//! Accepted forms:
//! - `System.String`, `T`
//! - ``System.Collections.Generic.Dictionary`2<System.String, System.Int32>``
//! - `T[]`, `System.Int32[,]` (multi-dimensional arrays keep their rank)
//! - `System.Int32&` (by-reference, used for ref/out/in parameters)
//! - `Outer+Nested` (nested types keep the `+` separator)

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tsnet_common::limits::MAX_TYPE_NESTING_DEPTH;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeRef {
    /// A named type or generic parameter. `name` keeps the arity suffix.
    Named { name: String, args: Vec<TypeRef> },
    Array { element: Box<TypeRef>, rank: u32 },
    ByRef(Box<TypeRef>),
}

impl TypeRef {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Strip a trailing by-reference marker.
    #[must_use]
    pub fn without_by_ref(&self) -> &TypeRef {
        match self {
            TypeRef::ByRef(inner) => inner,
            other => other,
        }
    }

    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(self, TypeRef::ByRef(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    f.write_str(",")?;
                }
                f.write_str("]")
            }
            TypeRef::ByRef(inner) => write!(f, "{inner}&"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeRefError {
    #[error("empty type reference")]
    Empty,
    #[error("unexpected '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unexpected end of type reference")]
    UnexpectedEnd,
    #[error("type arguments nested deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: u32, offset: usize },
}

/// Parse a complete type reference string.
pub fn parse_type_ref(text: &str) -> Result<TypeRef, TypeRefError> {
    let mut parser = TypeRefParser {
        bytes: text.as_bytes(),
        text,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    if parser.pos >= parser.bytes.len() {
        return Err(TypeRefError::Empty);
    }
    let parsed = parser.parse()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(parsed),
        Some(_) => Err(parser.unexpected()),
    }
}

struct TypeRefParser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    /// Generic-argument nesting of the current `parse` call.
    depth: u32,
}

impl TypeRefParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> TypeRefError {
        match self.text[self.pos..].chars().next() {
            Some(found) => TypeRefError::Unexpected {
                found,
                offset: self.pos,
            },
            None => TypeRefError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), TypeRefError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse(&mut self) -> Result<TypeRef, TypeRefError> {
        self.skip_whitespace();
        let name = self.parse_name()?;
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'<') {
            if self.depth >= MAX_TYPE_NESTING_DEPTH {
                return Err(TypeRefError::TooDeep {
                    limit: MAX_TYPE_NESTING_DEPTH,
                    offset: self.pos,
                });
            }
            self.pos += 1;
            self.depth += 1;
            loop {
                args.push(self.parse()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b'>') => {
                        self.pos += 1;
                        self.depth -= 1;
                        break;
                    }
                    _ => return Err(self.unexpected()),
                }
            }
        }
        let mut result = TypeRef::Named { name, args };

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'[') => {
                    self.pos += 1;
                    let mut rank = 1;
                    self.skip_whitespace();
                    while self.peek() == Some(b',') {
                        rank += 1;
                        self.pos += 1;
                        self.skip_whitespace();
                    }
                    self.expect(b']')?;
                    result = TypeRef::Array {
                        element: Box::new(result),
                        rank,
                    };
                }
                Some(b'&') => {
                    self.pos += 1;
                    result = TypeRef::ByRef(Box::new(result));
                }
                _ => break,
            }
        }
        Ok(result)
    }

    fn parse_name(&mut self) -> Result<String, TypeRefError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'`' | b'+' | b'$') || b >= 0x80)
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.text[start..self.pos].to_string())
    }
}

/// Simple name of a target type: namespace, nesting, and arity removed.
///
/// ``System.Collections.Generic.List`1`` becomes `List`; `Outer+Inner` becomes `Inner`.
#[must_use]
pub fn simple_name(target_name: &str) -> &str {
    let last = target_name
        .rsplit(['.', '+'])
        .next()
        .unwrap_or(target_name);
    match last.find('`') {
        Some(tick) => &last[..tick],
        None => last,
    }
}

/// Namespace part of a target name (`System.Collections.Generic` for ``...List`1``).
#[must_use]
pub fn namespace_of(target_name: &str) -> &str {
    let outer = target_name.split('+').next().unwrap_or(target_name);
    match outer.rfind('.') {
        Some(dot) => &outer[..dot],
        None => "",
    }
}

#[cfg(test)]
#[path = "../tests/type_ref_tests.rs"]
mod tests;
