//! Token definitions
//!
//! This module defines all the tokens the lexer can produce. Keyword matching
//! is case-insensitive (`If`, `IF` and `if` are the same keyword); the
//! original spelling is preserved in [`Token::text`].

use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal text as written (string literals carry their content without
    /// the surrounding quotes)
    pub text: String,
    /// Line number (1-based)
    pub line: u32,
    /// Column (0-based offset within the line)
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

/// All possible token kinds
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"'[^\n]*")] // Skip line comments (apostrophe to end of line)
pub enum TokenKind {
    // ============ Keywords (case-insensitive) ============
    #[token("if", ignore(ascii_case))]
    If,
    #[token("then", ignore(ascii_case))]
    Then,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("elseif", ignore(ascii_case))]
    ElseIf,
    #[token("endif", ignore(ascii_case))]
    EndIf,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("to", ignore(ascii_case))]
    To,
    #[token("step", ignore(ascii_case))]
    Step,
    #[token("endfor", ignore(ascii_case))]
    EndFor,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("endwhile", ignore(ascii_case))]
    EndWhile,
    #[token("sub", ignore(ascii_case))]
    Sub,
    #[token("endsub", ignore(ascii_case))]
    EndSub,
    #[token("goto", ignore(ascii_case))]
    GoTo,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("and", ignore(ascii_case))]
    And,

    // ============ Punctuation and operators ============
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("=")]
    Equal,
    #[token("<>")]
    NotEqual,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Multiply,
    #[token("/")]
    Divide,
    #[token(":")]
    Colon,
    #[token("<")]
    LessThan,
    #[token(">")]
    GreaterThan,
    #[token("<=")]
    LessThanOrEqual,
    #[token(">=")]
    GreaterThanOrEqual,

    // ============ Literals and identifiers ============
    /// Identifier: foo, _bar, TextWindow
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    /// Number literal: decimal digit run with at most one dot (`1.` is valid)
    #[regex(r"[0-9]+(\.[0-9]*)?")]
    NumberLiteral,

    /// String literal: `"`-delimited, no escapes, single line
    #[regex(r#""[^"\n]*""#)]
    StringLiteral,

    /// A string literal that was never closed on its line; the lexer reports
    /// it and downgrades it to a `StringLiteral` with partial content
    #[regex(r#""[^"\n]*"#)]
    UnterminatedString,

    // ============ Special ============
    /// End of file
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::If => "If",
            TokenKind::Then => "Then",
            TokenKind::Else => "Else",
            TokenKind::ElseIf => "ElseIf",
            TokenKind::EndIf => "EndIf",
            TokenKind::For => "For",
            TokenKind::To => "To",
            TokenKind::Step => "Step",
            TokenKind::EndFor => "EndFor",
            TokenKind::While => "While",
            TokenKind::EndWhile => "EndWhile",
            TokenKind::Sub => "Sub",
            TokenKind::EndSub => "EndSub",
            TokenKind::GoTo => "GoTo",
            TokenKind::Or => "Or",
            TokenKind::And => "And",
            TokenKind::Dot => "Dot",
            TokenKind::Comma => "Comma",
            TokenKind::LeftParen => "LeftParen",
            TokenKind::RightParen => "RightParen",
            TokenKind::LeftBracket => "LeftBracket",
            TokenKind::RightBracket => "RightBracket",
            TokenKind::Equal => "Equal",
            TokenKind::NotEqual => "NotEqual",
            TokenKind::Plus => "Plus",
            TokenKind::Minus => "Minus",
            TokenKind::Multiply => "Multiply",
            TokenKind::Divide => "Divide",
            TokenKind::Colon => "Colon",
            TokenKind::LessThan => "LessThan",
            TokenKind::GreaterThan => "GreaterThan",
            TokenKind::LessThanOrEqual => "LessThanOrEqual",
            TokenKind::GreaterThanOrEqual => "GreaterThanOrEqual",
            TokenKind::Identifier => "Identifier",
            TokenKind::NumberLiteral => "NumberLiteral",
            TokenKind::StringLiteral | TokenKind::UnterminatedString => "StringLiteral",
            TokenKind::Eof => "Eof",
        };
        write!(f, "{}", s)
    }
}
