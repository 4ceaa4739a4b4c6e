//! Lexer
//!
//! Converts source text into a token stream using the `logos` crate. The
//! lexer is batch, not fail-fast: malformed input is reported to the shared
//! diagnostics sink and scanning continues, so one run surfaces every
//! lexical problem in the file.

use crate::diagnostics::Diagnostics;
use crate::span::{LineIndex, SourceLocation};
use crate::token::{Token, TokenKind};
use logos::Logos;

/// Tokenize `source`, reporting lexical errors into `diagnostics`.
///
/// Always returns a token sequence ending in a single `Eof` token, even for
/// malformed input.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let index = LineIndex::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let (line, column) = index.position(span.start);

        match result {
            Ok(TokenKind::StringLiteral) => {
                // Strip the surrounding quotes
                let content = &slice[1..slice.len() - 1];
                tokens.push(Token::new(TokenKind::StringLiteral, content, line, column));
            }
            Ok(TokenKind::UnterminatedString) => {
                let hint = if span.end == source.len() {
                    "expected closing `\"`"
                } else {
                    "strings cannot span multiple lines"
                };
                diagnostics.add_error(
                    "unterminated string literal",
                    SourceLocation::point(line, column),
                    hint,
                );
                // Keep the partial content so later stages still see a token
                let content = &slice[1..];
                tokens.push(Token::new(TokenKind::StringLiteral, content, line, column));
            }
            Ok(kind) => {
                tokens.push(Token::new(kind, slice, line, column));
            }
            Err(()) => {
                diagnostics.add_error(
                    format!("unexpected character: '{}'", slice),
                    SourceLocation::point(line, column),
                    "this character is not valid in this context",
                );
            }
        }
    }

    let (line, column) = index.position(source.len());
    tokens.push(Token::new(TokenKind::Eof, "", line, column));
    tokens
}
