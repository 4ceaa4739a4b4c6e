//! Parser
//!
//! A recursive descent parser with one method per precedence level:
//! primary → postfix → unary minus → multiplicative → additive → comparison
//! → And → Or.
//!
//! Error recovery is local: a failed `expect` reports and continues with a
//! synthesized token, and a malformed primary expression becomes a zero
//! literal, so the parser always hands later passes a well-formed tree.
//! Only a stray structure keyword in top-level statement position causes a
//! skip to the next statement-starting keyword.

use crate::ast::{BinaryOp, Expression, ExpressionKind, Program, Statement, StatementKind};
use crate::diagnostics::Diagnostics;
use crate::span::SourceLocation;
use crate::token::{Token, TokenKind};

/// Parse a token stream into a [`Program`], reporting syntax errors into
/// `diagnostics`.
pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Program {
    Parser::new(tokens, diagnostics).parse_program()
}

/// Keywords that may only appear as part of an enclosing construct
const STRUCTURE_KEYWORDS: [TokenKind; 9] = [
    TokenKind::Then,
    TokenKind::ElseIf,
    TokenKind::Else,
    TokenKind::EndIf,
    TokenKind::EndWhile,
    TokenKind::EndFor,
    TokenKind::EndSub,
    TokenKind::To,
    TokenKind::Step,
];

struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    fn new(tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Self {
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    // ============ Token cursor ============

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Advance past the current token if it matches
    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of `kind` or report `message` and continue with a
    /// synthesized token at the current position. Never advances on mismatch.
    fn expect(&mut self, kind: TokenKind, message: &str) -> Token {
        if self.check(kind) {
            self.advance();
            return self.previous().clone();
        }

        let location = self.location();
        self.diagnostics
            .add_error(message, location, format!("expected '{}'", kind));
        let current = self.current();
        Token::new(kind, "", current.line, current.column)
    }

    fn location(&self) -> SourceLocation {
        let tok = self.current();
        SourceLocation::new(tok.line, tok.column, tok.text.len())
    }

    // ============ Statements ============

    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.is_at_end() {
            match self.statement() {
                Some(stmt) => program.statements.push(stmt),
                None => self.skip_to_next_statement(),
            }
        }

        program
    }

    /// Advance until the next statement-starting keyword, to bound error
    /// cascades during batch parsing
    fn skip_to_next_statement(&mut self) {
        while !self.is_at_end() {
            match self.current().kind {
                TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Sub
                | TokenKind::GoTo => return,
                _ => self.advance(),
            }
        }
    }

    fn statement(&mut self) -> Option<Statement> {
        if self.consume(TokenKind::If) {
            return Some(self.if_statement());
        }
        if self.consume(TokenKind::While) {
            return Some(self.while_statement());
        }
        if self.consume(TokenKind::For) {
            return Some(self.for_statement());
        }
        if self.consume(TokenKind::Sub) {
            return Some(self.subroutine_statement());
        }
        if self.consume(TokenKind::GoTo) {
            return Some(self.goto_statement());
        }

        if self.check(TokenKind::Identifier) && self.peek(1).kind == TokenKind::Colon {
            return Some(self.label_statement());
        }

        self.assignment_or_expression()
    }

    fn assignment_or_expression(&mut self) -> Option<Statement> {
        let start = self.current().clone();

        if STRUCTURE_KEYWORDS.contains(&start.kind) {
            let location = self.location();
            self.diagnostics.add_error(
                format!("unexpected keyword '{}'", start.text),
                location,
                "expected statement",
            );
            self.advance();
            return None;
        }

        let target = self.assignment_target();

        if self.consume(TokenKind::Equal) {
            let value = self.expression();
            return Some(Statement::new(
                StatementKind::Assignment { target, value },
                start.line,
                start.column,
            ));
        }

        Some(Statement::new(
            StatementKind::Expression(target),
            start.line,
            start.column,
        ))
    }

    /// Dedicated entry for assignment targets: a postfix chain with no
    /// leading unary operator
    fn assignment_target(&mut self) -> Expression {
        let expr = self.primary();
        self.postfix_operators(expr)
    }

    fn if_statement(&mut self) -> Statement {
        let if_token = self.previous().clone();
        let condition = self.expression();
        self.expect(TokenKind::Then, "expected 'Then' after if condition");

        let mut then_block = Vec::new();
        while !self.is_at_end()
            && !self.check(TokenKind::ElseIf)
            && !self.check(TokenKind::Else)
            && !self.check(TokenKind::EndIf)
        {
            if let Some(s) = self.statement() {
                then_block.push(s);
            }
        }

        let mut else_if_blocks = Vec::new();
        while self.consume(TokenKind::ElseIf) {
            let cond = self.expression();
            self.expect(TokenKind::Then, "expected 'Then' after elseif condition");

            let mut block = Vec::new();
            while !self.is_at_end()
                && !self.check(TokenKind::ElseIf)
                && !self.check(TokenKind::Else)
                && !self.check(TokenKind::EndIf)
            {
                if let Some(s) = self.statement() {
                    block.push(s);
                }
            }
            else_if_blocks.push((cond, block));
        }

        let mut else_block = Vec::new();
        if self.consume(TokenKind::Else) {
            while !self.is_at_end() && !self.check(TokenKind::EndIf) {
                if let Some(s) = self.statement() {
                    else_block.push(s);
                }
            }
        }

        self.expect(TokenKind::EndIf, "expected 'EndIf'");

        Statement::new(
            StatementKind::If {
                condition,
                then_block,
                else_if_blocks,
                else_block,
            },
            if_token.line,
            if_token.column,
        )
    }

    fn while_statement(&mut self) -> Statement {
        let while_token = self.previous().clone();
        let condition = self.expression();

        let mut body = Vec::new();
        while !self.is_at_end() && !self.check(TokenKind::EndWhile) {
            if let Some(s) = self.statement() {
                body.push(s);
            }
        }

        self.expect(TokenKind::EndWhile, "expected 'EndWhile'");

        Statement::new(
            StatementKind::While { condition, body },
            while_token.line,
            while_token.column,
        )
    }

    fn for_statement(&mut self) -> Statement {
        let for_token = self.previous().clone();

        let var_token = self.expect(TokenKind::Identifier, "expected variable name");
        self.expect(TokenKind::Equal, "expected '='");
        let start = self.expression();
        self.expect(TokenKind::To, "expected 'To'");
        let end = self.expression();

        let step = if self.consume(TokenKind::Step) {
            Some(self.expression())
        } else {
            None
        };

        let mut body = Vec::new();
        while !self.is_at_end() && !self.check(TokenKind::EndFor) {
            if let Some(s) = self.statement() {
                body.push(s);
            }
        }

        self.expect(TokenKind::EndFor, "expected 'EndFor'");

        Statement::new(
            StatementKind::For {
                variable: var_token.text,
                start,
                end,
                step,
                body,
            },
            for_token.line,
            for_token.column,
        )
    }

    fn subroutine_statement(&mut self) -> Statement {
        let sub_token = self.previous().clone();
        let name_token = self.expect(TokenKind::Identifier, "expected subroutine name");

        let mut body = Vec::new();
        while !self.is_at_end() && !self.check(TokenKind::EndSub) {
            if let Some(s) = self.statement() {
                body.push(s);
            }
        }

        self.expect(TokenKind::EndSub, "expected 'EndSub'");

        Statement::new(
            StatementKind::Subroutine {
                name: name_token.text,
                body,
            },
            sub_token.line,
            sub_token.column,
        )
    }

    fn goto_statement(&mut self) -> Statement {
        let goto_token = self.previous().clone();
        let label_token = self.expect(TokenKind::Identifier, "expected label");

        Statement::new(
            StatementKind::Goto {
                label: label_token.text,
            },
            goto_token.line,
            goto_token.column,
        )
    }

    fn label_statement(&mut self) -> Statement {
        self.advance();
        let label_token = self.previous().clone();
        self.expect(TokenKind::Colon, "expected ':'");

        Statement::new(
            StatementKind::Label {
                name: label_token.text,
            },
            label_token.line,
            label_token.column,
        )
    }

    // ============ Expressions ============

    fn expression(&mut self) -> Expression {
        self.or_expression()
    }

    fn or_expression(&mut self) -> Expression {
        let mut expr = self.and_expression();

        while self.consume(TokenKind::Or) {
            let op_token = self.previous().clone();
            let right = self.and_expression();
            expr = Expression::new(
                ExpressionKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                op_token.line,
                op_token.column,
            );
        }

        expr
    }

    fn and_expression(&mut self) -> Expression {
        let mut expr = self.comparison();

        while self.consume(TokenKind::And) {
            let op_token = self.previous().clone();
            let right = self.comparison();
            expr = Expression::new(
                ExpressionKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                op_token.line,
                op_token.column,
            );
        }

        expr
    }

    fn comparison(&mut self) -> Expression {
        let mut expr = self.additive();

        loop {
            let op = if self.consume(TokenKind::Equal) {
                BinaryOp::Equal
            } else if self.consume(TokenKind::NotEqual) {
                BinaryOp::NotEqual
            } else if self.consume(TokenKind::LessThanOrEqual) {
                BinaryOp::LessThanOrEqual
            } else if self.consume(TokenKind::GreaterThanOrEqual) {
                BinaryOp::GreaterThanOrEqual
            } else if self.consume(TokenKind::LessThan) {
                BinaryOp::LessThan
            } else if self.consume(TokenKind::GreaterThan) {
                BinaryOp::GreaterThan
            } else {
                break;
            };

            let op_token = self.previous().clone();
            let right = self.additive();
            expr = Expression::new(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                op_token.line,
                op_token.column,
            );
        }

        expr
    }

    fn additive(&mut self) -> Expression {
        let mut expr = self.multiplicative();

        loop {
            let op = if self.consume(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.consume(TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };

            let op_token = self.previous().clone();
            let right = self.multiplicative();
            expr = Expression::new(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                op_token.line,
                op_token.column,
            );
        }

        expr
    }

    fn multiplicative(&mut self) -> Expression {
        let mut expr = self.unary();

        loop {
            let op = if self.consume(TokenKind::Multiply) {
                BinaryOp::Multiply
            } else if self.consume(TokenKind::Divide) {
                BinaryOp::Divide
            } else {
                break;
            };

            let op_token = self.previous().clone();
            let right = self.unary();
            expr = Expression::new(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                op_token.line,
                op_token.column,
            );
        }

        expr
    }

    fn unary(&mut self) -> Expression {
        if self.consume(TokenKind::Minus) {
            let op_token = self.previous().clone();
            let operand = self.unary();
            return Expression::new(
                ExpressionKind::Unary {
                    operand: Box::new(operand),
                },
                op_token.line,
                op_token.column,
            );
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Expression {
        let expr = self.primary();
        self.postfix_operators(expr)
    }

    fn postfix_operators(&mut self, mut expr: Expression) -> Expression {
        loop {
            if self.consume(TokenKind::LeftBracket) {
                let bracket_token = self.previous().clone();
                let index = self.expression();
                self.expect(TokenKind::RightBracket, "expected ']'");

                expr = Expression::new(
                    ExpressionKind::ArrayAccess {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    bracket_token.line,
                    bracket_token.column,
                );
            } else if self.consume(TokenKind::Dot) {
                let dot_token = self.previous().clone();
                let prop_token = self.expect(TokenKind::Identifier, "expected property name");

                expr = Expression::new(
                    ExpressionKind::PropertyAccess {
                        object: Box::new(expr),
                        property: prop_token.text,
                    },
                    dot_token.line,
                    dot_token.column,
                );
            } else if self.consume(TokenKind::LeftParen) {
                let paren_token = self.previous().clone();
                let mut arguments = Vec::new();

                if !self.check(TokenKind::RightParen) {
                    loop {
                        arguments.push(self.expression());
                        if !self.consume(TokenKind::Comma) {
                            break;
                        }
                    }
                }

                self.expect(TokenKind::RightParen, "expected ')'");

                expr = Expression::new(
                    ExpressionKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    paren_token.line,
                    paren_token.column,
                );
            } else {
                break;
            }
        }

        expr
    }

    fn primary(&mut self) -> Expression {
        if self.consume(TokenKind::NumberLiteral) {
            let token = self.previous().clone();
            let value = token.text.parse::<f64>().unwrap_or(0.0);
            return Expression::new(ExpressionKind::NumberLiteral(value), token.line, token.column);
        }

        if self.consume(TokenKind::StringLiteral) {
            let token = self.previous().clone();
            return Expression::new(
                ExpressionKind::StringLiteral(token.text),
                token.line,
                token.column,
            );
        }

        if self.consume(TokenKind::Identifier) {
            let token = self.previous().clone();
            return Expression::new(
                ExpressionKind::Identifier(token.text),
                token.line,
                token.column,
            );
        }

        if self.consume(TokenKind::LeftParen) {
            let expr = self.expression();
            self.expect(TokenKind::RightParen, "expected ')'");
            return expr;
        }

        // Keep the tree well-formed for later passes: report, skip one token,
        // stand in a zero literal
        let token = self.current().clone();
        let location = self.location();
        self.diagnostics.add_error(
            format!("unexpected token: '{}'", token.text),
            location,
            "expected expression",
        );
        if !self.is_at_end() {
            self.advance();
        }

        Expression::new(ExpressionKind::NumberLiteral(0.0), token.line, token.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> (Program, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = tokenize(source, &mut diagnostics);
        let program = parse(tokens, &mut diagnostics);
        (program, diagnostics)
    }

    fn parse_ok(source: &str) -> Program {
        let (program, diagnostics) = parse_source(source);
        assert!(
            !diagnostics.has_errors(),
            "unexpected errors: {:?}",
            diagnostics.entries()
        );
        program
    }

    #[test]
    fn test_assignment() {
        let program = parse_ok("x = 1");
        assert_eq!(program.statements.len(), 1);
        let StatementKind::Assignment { target, value } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&target.kind, ExpressionKind::Identifier(n) if n == "x"));
        assert!(matches!(value.kind, ExpressionKind::NumberLiteral(v) if v == 1.0));
    }

    #[test]
    fn test_multiplicative_binds_tighter_than_additive() {
        let program = parse_ok("x = 1 + 2 * 3");
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        let ExpressionKind::Binary { op, right, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            &right.kind,
            ExpressionKind::Binary { op: BinaryOp::Multiply, .. }
        ));
    }

    #[test]
    fn test_comparison_chain_left_associative() {
        let program = parse_ok("x = 1 < 2 = 3");
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        // ((1 < 2) = 3)
        let ExpressionKind::Binary { op, left, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Equal);
        assert!(matches!(
            &left.kind,
            ExpressionKind::Binary { op: BinaryOp::LessThan, .. }
        ));
    }

    #[test]
    fn test_or_is_loosest() {
        let program = parse_ok("x = 1 And 2 Or 3");
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        let ExpressionKind::Binary { op, left, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(
            &left.kind,
            ExpressionKind::Binary { op: BinaryOp::And, .. }
        ));
    }

    #[test]
    fn test_unary_minus() {
        let program = parse_ok("x = -y");
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&value.kind, ExpressionKind::Unary { .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let program = parse_ok("x = a[1].b(2, 3)");
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        let ExpressionKind::Call { callee, arguments } = &value.kind else {
            panic!("expected call");
        };
        assert_eq!(arguments.len(), 2);
        let ExpressionKind::PropertyAccess { object, property } = &callee.kind else {
            panic!("expected property access");
        };
        assert_eq!(property, "b");
        assert!(matches!(&object.kind, ExpressionKind::ArrayAccess { .. }));
    }

    #[test]
    fn test_method_call_statement() {
        let program = parse_ok("TextWindow.WriteLine(\"hi\")");
        let StatementKind::Expression(expr) = &program.statements[0].kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(&expr.kind, ExpressionKind::Call { .. }));
    }

    #[test]
    fn test_if_elseif_else() {
        let program = parse_ok(
            "If x = 1 Then\n  a = 1\nElseIf x = 2 Then\n  a = 2\nElseIf x = 3 Then\n  a = 3\nElse\n  a = 4\nEndIf",
        );
        let StatementKind::If {
            then_block,
            else_if_blocks,
            else_block,
            ..
        } = &program.statements[0].kind
        else {
            panic!("expected if");
        };
        assert_eq!(then_block.len(), 1);
        assert_eq!(else_if_blocks.len(), 2);
        assert_eq!(else_block.len(), 1);
    }

    #[test]
    fn test_while() {
        let program = parse_ok("While x < 10\n  x = x + 1\nEndWhile");
        let StatementKind::While { body, .. } = &program.statements[0].kind else {
            panic!("expected while");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_for_with_and_without_step() {
        let program = parse_ok("For i = 1 To 10\nEndFor\nFor j = 10 To 1 Step -1\nEndFor");
        let StatementKind::For { variable, step, .. } = &program.statements[0].kind else {
            panic!("expected for");
        };
        assert_eq!(variable, "i");
        assert!(step.is_none());

        let StatementKind::For { step, .. } = &program.statements[1].kind else {
            panic!("expected for");
        };
        assert!(step.is_some());
    }

    #[test]
    fn test_goto_and_label() {
        let program = parse_ok("start:\nGoTo start");
        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Label { name } if name == "start"
        ));
        assert!(matches!(
            &program.statements[1].kind,
            StatementKind::Goto { label } if label == "start"
        ));
    }

    #[test]
    fn test_subroutine() {
        let program = parse_ok("Sub Greet\n  TextWindow.WriteLine(\"hi\")\nEndSub");
        let StatementKind::Subroutine { name, body } = &program.statements[0].kind else {
            panic!("expected subroutine");
        };
        assert_eq!(name, "Greet");
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_missing_endif_reports_but_returns_node() {
        let (program, diagnostics) = parse_source("If x Then\n  y = 1");
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| d.message == "expected 'EndIf'"));
        assert!(matches!(&program.statements[0].kind, StatementKind::If { .. }));
    }

    #[test]
    fn test_malformed_primary_becomes_zero_literal() {
        let (program, diagnostics) = parse_source("x = +");
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| d.hint.as_deref() == Some("expected expression")));
        let StatementKind::Assignment { value, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        // The bad operand is replaced by a zero literal so the tree stays usable
        assert!(matches!(&value.kind, ExpressionKind::NumberLiteral(v) if *v == 0.0));
    }

    #[test]
    fn test_stray_keyword_recovers_to_next_statement_keyword() {
        let (program, diagnostics) = parse_source("EndIf\njunk junk\nWhile x\nEndWhile");
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| d.message == "unexpected keyword 'EndIf'"));
        // Everything up to While was skipped
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(&program.statements[0].kind, StatementKind::While { .. }));
    }

    #[test]
    fn test_call_target_assignment_is_parsed() {
        // The parser builds the node; rejecting it is the analyzer's job
        let program = parse_ok("f(1) = 2");
        let StatementKind::Assignment { target, .. } = &program.statements[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&target.kind, ExpressionKind::Call { .. }));
    }

    #[test]
    fn test_deterministic_reparse() {
        let source = "For i = 1 To 3\n  TextWindow.WriteLine(i)\nEndFor";
        let a = format!("{:?}", parse_ok(source));
        let b = format!("{:?}", parse_ok(source));
        assert_eq!(a, b);
    }

    #[test]
    fn test_node_positions() {
        let program = parse_ok("x = 1\ny = 2");
        assert_eq!(program.statements[0].line, 1);
        assert_eq!(program.statements[1].line, 2);
        assert_eq!(program.statements[1].column, 0);
    }
}
