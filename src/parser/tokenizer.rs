// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Byte-oriented tokenizer for formula scripts
//!
//! - Zero-copy string slices for identifiers, numbers and string bodies
//! - Shared keyword table for O(1) keyword lookup
//! - Line-break tracking so the parser can insert missing semicolons

use super::error::{ParseError, ParseResult};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// Script token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    // Literals
    /// Number literal as source slice, parsed by the parser (e.g., 42, 0.99, 1e3)
    Number(&'input str),
    /// String body between the quotes, escapes not yet processed
    String(&'input str),

    /// Identifier, `$` allowed anywhere (e.g., `rate`, `$LOAN`)
    Identifier(&'input str),

    // Keywords
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
    /// `function`
    Function,
    /// `return`
    Return,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `typeof`
    Typeof,

    // Operators
    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Remainder operator (%)
    Percent,
    /// Increment (++)
    Increment,
    /// Decrement (--)
    Decrement,
    /// Assignment (=)
    Assign,
    /// Add-assign (+=)
    PlusAssign,
    /// Subtract-assign (-=)
    MinusAssign,
    /// Multiply-assign (*=)
    MultiplyAssign,
    /// Divide-assign (/=)
    DivideAssign,
    /// Remainder-assign (%=)
    PercentAssign,
    /// Loose equality (==)
    Equal,
    /// Loose inequality (!=)
    NotEqual,
    /// Strict equality (===)
    StrictEqual,
    /// Strict inequality (!==)
    StrictNotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Logical AND (&&)
    And,
    /// Logical OR (||)
    Or,
    /// Logical NOT (!)
    Not,
    /// Question mark (?)
    Question,
    /// Colon (:)
    Colon,

    // Punctuation
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot operator (.) for property access
    Dot,
    /// Comma separator (,)
    Comma,
    /// Semicolon (;)
    Semicolon,
}

impl<'input> Token<'input> {
    /// Source text of a keyword token, used where keywords are valid property names
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Var => "var",
            Token::Let => "let",
            Token::Const => "const",
            Token::Function => "function",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            Token::Typeof => "typeof",
            _ => return None,
        };
        Some(text)
    }

    /// Check if this token is a keyword
    #[inline]
    pub fn is_keyword(&self) -> bool {
        self.keyword_text().is_some()
    }

    /// Get identifier text
    #[inline]
    pub fn as_identifier(&self) -> Option<&'input str> {
        match self {
            Token::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(keyword) = self.keyword_text() {
            return f.write_str(keyword);
        }
        let text = match self {
            Token::Number(text) | Token::Identifier(text) => *text,
            Token::String(text) => return write!(f, "\"{text}\""),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Multiply => "*",
            Token::Divide => "/",
            Token::Percent => "%",
            Token::Increment => "++",
            Token::Decrement => "--",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::MultiplyAssign => "*=",
            Token::DivideAssign => "/=",
            Token::PercentAssign => "%=",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::StrictEqual => "===",
            Token::StrictNotEqual => "!==",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Not => "!",
            Token::Question => "?",
            Token::Colon => ":",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semicolon => ";",
            _ => "",
        };
        f.write_str(text)
    }
}

/// Shared keyword table built once per process
static KEYWORD_TABLE: Lazy<FxHashMap<&'static str, Token<'static>>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("var", Token::Var);
    map.insert("let", Token::Let);
    map.insert("const", Token::Const);
    map.insert("function", Token::Function);
    map.insert("return", Token::Return);
    map.insert("if", Token::If);
    map.insert("else", Token::Else);
    map.insert("while", Token::While);
    map.insert("for", Token::For);
    map.insert("break", Token::Break);
    map.insert("continue", Token::Continue);
    map.insert("true", Token::True);
    map.insert("false", Token::False);
    map.insert("null", Token::Null);
    map.insert("undefined", Token::Undefined);
    map.insert("typeof", Token::Typeof);
    map
});

/// Tokenizer over a script's bytes
#[derive(Clone)]
pub struct Tokenizer<'input> {
    bytes: &'input [u8],
    pos: usize,
    end: usize,
    /// Start of the most recently returned token
    token_start: usize,
    /// Whether a line break preceded the most recently returned token
    newline_before: bool,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    #[inline]
    pub fn new(input: &'input str) -> Self {
        let bytes = input.as_bytes();
        Self {
            bytes,
            pos: 0,
            end: bytes.len(),
            token_start: 0,
            newline_before: false,
        }
    }

    /// Get input string slice from byte positions
    #[inline(always)]
    fn slice(&self, start: usize, end: usize) -> &'input str {
        std::str::from_utf8(&self.bytes[start..end]).unwrap_or("")
    }

    #[inline(always)]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Identifier start: ASCII letters, `_`, `$`, or any non-ASCII byte
    #[inline(always)]
    fn is_id_start(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'$') || ch >= 0x80
    }

    #[inline(always)]
    fn is_id_continue(ch: u8) -> bool {
        Self::is_id_start(ch) || ch.is_ascii_digit()
    }

    /// Skip whitespace and comments, recording line breaks
    fn skip_trivia(&mut self) -> ParseResult<()> {
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'\n' => {
                    self.newline_before = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek_byte(1) == Some(b'/') => self.skip_single_line_comment(),
                b'/' if self.peek_byte(1) == Some(b'*') => self.skip_multi_line_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip to the end of the line; the newline itself is left for `skip_trivia`
    #[inline]
    fn skip_single_line_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.end && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_multi_line_comment(&mut self) -> ParseResult<()> {
        let start = self.pos;
        self.pos += 2;

        while self.pos + 1 < self.end {
            match (self.bytes[self.pos], self.bytes[self.pos + 1]) {
                (b'*', b'/') => {
                    self.pos += 2;
                    return Ok(());
                }
                (b'\n', _) => self.newline_before = true,
                _ => {}
            }
            self.pos += 1;
        }

        Err(ParseError::UnclosedComment { position: start })
    }

    /// Scan `digits[.digits][e[+-]digits]`, also `.digits`
    fn parse_number(&mut self) -> Token<'input> {
        let start = self.pos;

        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }

        if self.peek_byte(0) == Some(b'.') {
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let exponent_digits = match self.peek_byte(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self
                .peek_byte(exponent_digits)
                .is_some_and(|b| b.is_ascii_digit())
            {
                self.pos += exponent_digits;
                while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }

        Token::Number(self.slice(start, self.pos))
    }

    #[inline]
    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while self.pos < self.end && Self::is_id_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.slice(start, self.pos)
    }

    /// Scan a string delimited by `quote`, returning the raw body
    fn parse_string_literal(&mut self, quote: u8) -> ParseResult<&'input str> {
        let opening = self.pos;
        self.pos += 1;
        let start = self.pos;

        while self.pos < self.end {
            match self.bytes[self.pos] {
                b if b == quote => {
                    let content = self.slice(start, self.pos);
                    self.pos += 1;
                    return Ok(content);
                }
                b'\\' => {
                    self.pos += if self.pos + 1 < self.end { 2 } else { 1 };
                }
                b'\n' => break,
                _ => self.pos += 1,
            }
        }

        Err(ParseError::UnclosedString { position: opening })
    }

    /// Consume `single`, or `with_eq` when followed by `=`
    #[inline]
    fn operator_or_assign(&mut self, single: Token<'input>, with_eq: Token<'input>) -> Token<'input> {
        if self.peek_byte(1) == Some(b'=') {
            self.pos += 2;
            with_eq
        } else {
            self.pos += 1;
            single
        }
    }

    /// Return the next token, `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Token<'input>>> {
        self.newline_before = false;
        self.skip_trivia()?;
        self.token_start = self.pos;

        if self.pos >= self.end {
            return Ok(None);
        }

        let token = match self.bytes[self.pos] {
            b'(' => {
                self.pos += 1;
                Token::LeftParen
            }
            b')' => {
                self.pos += 1;
                Token::RightParen
            }
            b'[' => {
                self.pos += 1;
                Token::LeftBracket
            }
            b']' => {
                self.pos += 1;
                Token::RightBracket
            }
            b'{' => {
                self.pos += 1;
                Token::LeftBrace
            }
            b'}' => {
                self.pos += 1;
                Token::RightBrace
            }
            b',' => {
                self.pos += 1;
                Token::Comma
            }
            b';' => {
                self.pos += 1;
                Token::Semicolon
            }
            b':' => {
                self.pos += 1;
                Token::Colon
            }
            b'?' => {
                self.pos += 1;
                Token::Question
            }
            b'.' if self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) => self.parse_number(),
            b'.' => {
                self.pos += 1;
                Token::Dot
            }
            b'0'..=b'9' => self.parse_number(),
            quote @ (b'\'' | b'"') => Token::String(self.parse_string_literal(quote)?),

            b'+' => match self.peek_byte(1) {
                Some(b'+') => {
                    self.pos += 2;
                    Token::Increment
                }
                _ => self.operator_or_assign(Token::Plus, Token::PlusAssign),
            },
            b'-' => match self.peek_byte(1) {
                Some(b'-') => {
                    self.pos += 2;
                    Token::Decrement
                }
                _ => self.operator_or_assign(Token::Minus, Token::MinusAssign),
            },
            b'*' => self.operator_or_assign(Token::Multiply, Token::MultiplyAssign),
            b'/' => self.operator_or_assign(Token::Divide, Token::DivideAssign),
            b'%' => self.operator_or_assign(Token::Percent, Token::PercentAssign),
            b'<' => self.operator_or_assign(Token::LessThan, Token::LessThanOrEqual),
            b'>' => self.operator_or_assign(Token::GreaterThan, Token::GreaterThanOrEqual),
            b'=' => match (self.peek_byte(1), self.peek_byte(2)) {
                (Some(b'='), Some(b'=')) => {
                    self.pos += 3;
                    Token::StrictEqual
                }
                (Some(b'='), _) => {
                    self.pos += 2;
                    Token::Equal
                }
                _ => {
                    self.pos += 1;
                    Token::Assign
                }
            },
            b'!' => match (self.peek_byte(1), self.peek_byte(2)) {
                (Some(b'='), Some(b'=')) => {
                    self.pos += 3;
                    Token::StrictNotEqual
                }
                (Some(b'='), _) => {
                    self.pos += 2;
                    Token::NotEqual
                }
                _ => {
                    self.pos += 1;
                    Token::Not
                }
            },
            b'&' if self.peek_byte(1) == Some(b'&') => {
                self.pos += 2;
                Token::And
            }
            b'|' if self.peek_byte(1) == Some(b'|') => {
                self.pos += 2;
                Token::Or
            }

            ch if Self::is_id_start(ch) => {
                let ident = self.parse_identifier();
                match KEYWORD_TABLE.get(ident) {
                    Some(keyword) => keyword.clone(),
                    None => Token::Identifier(ident),
                }
            }

            ch => {
                return Err(ParseError::UnexpectedToken {
                    token: (ch as char).to_string(),
                    position: self.pos,
                });
            }
        };

        Ok(Some(token))
    }

    /// Start offset of the last token returned by `next_token`
    #[inline]
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Whether a line break separated the last token from the one before it
    #[inline]
    pub fn newline_before(&self) -> bool {
        self.newline_before
    }

    /// Current byte position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }
}
