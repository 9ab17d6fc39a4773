//! Scanner - tokenizes TypeScript source text.
//!
//! The scanner runs eagerly and hands the parser a flat token vector, which keeps
//! parser lookahead and backtracking a matter of saving an index.
//! Keywords are scanned as `Identifier`; the parser treats them contextually.

use memchr::{memchr, memmem};
use tsnet_common::diagnostic_codes;
use tsnet_common::{Diagnostic, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Identifier,
    StringLiteral,
    NumericLiteral,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    LessThan,
    LessThanEquals,
    GreaterThan,
    Comma,
    Semicolon,
    Colon,
    Question,
    QuestionDot,
    QuestionQuestion,
    Dot,
    DotDotDot,
    Equals,
    EqualsEquals,
    EqualsEqualsEquals,
    ExclamationEquals,
    ExclamationEqualsEquals,
    EqualsGreaterThan,
    Exclamation,
    Bar,
    BarBar,
    Ampersand,
    AmpersandAmpersand,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    At,
    Unknown,
    EndOfFile,
}

impl SyntaxKind {
    /// Source text of punctuation tokens, used in diagnostics.
    #[must_use]
    pub const fn punctuation_text(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::StringLiteral => "string literal",
            Self::NumericLiteral => "numeric literal",
            Self::OpenBrace => "{",
            Self::CloseBrace => "}",
            Self::OpenParen => "(",
            Self::CloseParen => ")",
            Self::OpenBracket => "[",
            Self::CloseBracket => "]",
            Self::LessThan => "<",
            Self::LessThanEquals => "<=",
            Self::GreaterThan => ">",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Question => "?",
            Self::QuestionDot => "?.",
            Self::QuestionQuestion => "??",
            Self::Dot => ".",
            Self::DotDotDot => "...",
            Self::Equals => "=",
            Self::EqualsEquals => "==",
            Self::EqualsEqualsEquals => "===",
            Self::ExclamationEquals => "!=",
            Self::ExclamationEqualsEquals => "!==",
            Self::EqualsGreaterThan => "=>",
            Self::Exclamation => "!",
            Self::Bar => "|",
            Self::BarBar => "||",
            Self::Ampersand => "&",
            Self::AmpersandAmpersand => "&&",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Asterisk => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::At => "@",
            Self::Unknown => "unknown token",
            Self::EndOfFile => "end of file",
        }
    }

    /// Binary operators accepted in expression position.
    #[must_use]
    pub const fn is_binary_operator(self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanEquals
                | Self::GreaterThan
                | Self::QuestionQuestion
                | Self::EqualsEquals
                | Self::EqualsEqualsEquals
                | Self::ExclamationEquals
                | Self::ExclamationEqualsEquals
                | Self::BarBar
                | Self::AmpersandAmpersand
                | Self::Bar
                | Self::Ampersand
                | Self::Plus
                | Self::Minus
                | Self::Asterisk
                | Self::Slash
                | Self::Percent
        )
    }
}

/// A scanned token.
///
/// `text` holds the identifier name, the cooked value of a string literal, or the
/// raw text of a numeric literal; it is empty for punctuation.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: Span,
    pub text: String,
}

impl Token {
    #[must_use]
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == SyntaxKind::Identifier && self.text == text
    }

    /// Human-readable rendering for diagnostics.
    #[must_use]
    pub fn display(&self) -> &str {
        match self.kind {
            SyntaxKind::Identifier | SyntaxKind::NumericLiteral => &self.text,
            other => other.punctuation_text(),
        }
    }
}

/// Eager tokenizer over one source file.
pub struct ScannerState<'a> {
    file_name: &'a str,
    text: &'a [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ScannerState<'a> {
    #[must_use]
    pub fn new(file_name: &'a str, text: &'a str) -> Self {
        Self {
            file_name,
            text: text.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Scan the whole file. The returned vector always ends with `EndOfFile`.
    #[must_use]
    pub fn scan_all(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::with_capacity(self.text.len() / 4 + 1);
        loop {
            let token = self.scan();
            let done = token.kind == SyntaxKind::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.text.get(self.pos + offset).copied()
    }

    fn token(&self, kind: SyntaxKind, start: usize, text: String) -> Token {
        Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
            text,
        }
    }

    fn error(&mut self, code: u32, start: usize, args: &[&str]) {
        let length = self.pos.saturating_sub(start).max(1) as u32;
        self.diagnostics
            .push(Diagnostic::from_code(code, args).at(self.file_name, start as u32, length));
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek_byte(0) {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek_byte(1) == Some(b'/') => {
                    match memchr(b'\n', &self.text[self.pos..]) {
                        Some(offset) => self.pos += offset + 1,
                        None => self.pos = self.text.len(),
                    }
                }
                b'/' if self.peek_byte(1) == Some(b'*') => {
                    let start = self.pos;
                    match memmem::find(&self.text[self.pos + 2..], b"*/") {
                        Some(offset) => self.pos += offset + 4,
                        None => {
                            self.pos = self.text.len();
                            self.error(diagnostic_codes::UNTERMINATED_COMMENT, start, &[]);
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos;
        let Some(byte) = self.peek_byte(0) else {
            return self.token(SyntaxKind::EndOfFile, start, String::new());
        };

        if is_identifier_start(byte) {
            return self.scan_identifier(start);
        }
        if byte.is_ascii_digit() || (byte == b'.' && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())) {
            return self.scan_number(start);
        }
        if matches!(byte, b'"' | b'\'' | b'`') {
            return self.scan_string(start, byte);
        }

        let (kind, width) = self.scan_punctuation(byte);
        self.pos += width;
        if kind == SyntaxKind::Unknown {
            let ch = char::from(byte).to_string();
            self.error(diagnostic_codes::INVALID_CHARACTER, start, &[&ch]);
        }
        self.token(kind, start, String::new())
    }

    fn scan_punctuation(&self, byte: u8) -> (SyntaxKind, usize) {
        let next = self.peek_byte(1);
        let next2 = self.peek_byte(2);
        match byte {
            b'{' => (SyntaxKind::OpenBrace, 1),
            b'}' => (SyntaxKind::CloseBrace, 1),
            b'(' => (SyntaxKind::OpenParen, 1),
            b')' => (SyntaxKind::CloseParen, 1),
            b'[' => (SyntaxKind::OpenBracket, 1),
            b']' => (SyntaxKind::CloseBracket, 1),
            b'<' if next == Some(b'=') => (SyntaxKind::LessThanEquals, 2),
            b'<' => (SyntaxKind::LessThan, 1),
            // `>` is always a single token so `Array<Array<T>>` closes both lists.
            b'>' => (SyntaxKind::GreaterThan, 1),
            b',' => (SyntaxKind::Comma, 1),
            b';' => (SyntaxKind::Semicolon, 1),
            b':' => (SyntaxKind::Colon, 1),
            b'?' if next == Some(b'.') && !next2.is_some_and(|b| b.is_ascii_digit()) => {
                (SyntaxKind::QuestionDot, 2)
            }
            b'?' if next == Some(b'?') => (SyntaxKind::QuestionQuestion, 2),
            b'?' => (SyntaxKind::Question, 1),
            b'.' if next == Some(b'.') && next2 == Some(b'.') => (SyntaxKind::DotDotDot, 3),
            b'.' => (SyntaxKind::Dot, 1),
            b'=' if next == Some(b'=') && next2 == Some(b'=') => (SyntaxKind::EqualsEqualsEquals, 3),
            b'=' if next == Some(b'=') => (SyntaxKind::EqualsEquals, 2),
            b'=' if next == Some(b'>') => (SyntaxKind::EqualsGreaterThan, 2),
            b'=' => (SyntaxKind::Equals, 1),
            b'!' if next == Some(b'=') && next2 == Some(b'=') => {
                (SyntaxKind::ExclamationEqualsEquals, 3)
            }
            b'!' if next == Some(b'=') => (SyntaxKind::ExclamationEquals, 2),
            b'!' => (SyntaxKind::Exclamation, 1),
            b'|' if next == Some(b'|') => (SyntaxKind::BarBar, 2),
            b'|' => (SyntaxKind::Bar, 1),
            b'&' if next == Some(b'&') => (SyntaxKind::AmpersandAmpersand, 2),
            b'&' => (SyntaxKind::Ampersand, 1),
            b'+' => (SyntaxKind::Plus, 1),
            b'-' => (SyntaxKind::Minus, 1),
            b'*' => (SyntaxKind::Asterisk, 1),
            b'/' => (SyntaxKind::Slash, 1),
            b'%' => (SyntaxKind::Percent, 1),
            b'@' => (SyntaxKind::At, 1),
            _ => (SyntaxKind::Unknown, utf8_width(byte)),
        }
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while self.peek_byte(0).is_some_and(is_identifier_part) {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
        self.token(SyntaxKind::Identifier, start, text)
    }

    fn scan_number(&mut self, start: usize) -> Token {
        if self.peek_byte(0) == Some(b'0') && matches!(self.peek_byte(1), Some(b'x' | b'X')) {
            self.pos += 2;
            while self
                .peek_byte(0)
                .is_some_and(|b| b.is_ascii_hexdigit() || b == b'_')
            {
                self.pos += 1;
            }
        } else {
            while self
                .peek_byte(0)
                .is_some_and(|b| b.is_ascii_digit() || b == b'_' || b == b'.')
            {
                self.pos += 1;
            }
            if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
                self.pos += 1;
                if matches!(self.peek_byte(0), Some(b'+' | b'-')) {
                    self.pos += 1;
                }
                while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
        self.token(SyntaxKind::NumericLiteral, start, text)
    }

    fn scan_string(&mut self, start: usize, quote: u8) -> Token {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            let Some(byte) = self.peek_byte(0) else {
                self.error(diagnostic_codes::UNTERMINATED_STRING_LITERAL, start, &[]);
                break;
            };
            if byte == quote {
                self.pos += 1;
                break;
            }
            if byte == b'\n' && quote != b'`' {
                self.error(diagnostic_codes::UNTERMINATED_STRING_LITERAL, start, &[]);
                break;
            }
            if byte == b'\\' {
                let escaped = self.peek_byte(1);
                self.pos += 2;
                match escaped {
                    Some(b'n') => value.push(b'\n'),
                    Some(b't') => value.push(b'\t'),
                    Some(b'r') => value.push(b'\r'),
                    Some(b'0') => value.push(0),
                    Some(other) => value.push(other),
                    None => {}
                }
                continue;
            }
            value.push(byte);
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&value).into_owned();
        self.token(SyntaxKind::StringLiteral, start, text)
    }
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn is_identifier_part(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

fn utf8_width(byte: u8) -> usize {
    match byte {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
#[path = "../tests/scanner_tests.rs"]
mod tests;
