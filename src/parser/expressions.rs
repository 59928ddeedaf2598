//! Expression parsing using Pratt precedence.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{get_precedence, Precedence};

/// Calls and function declarations take at most this many arguments.
pub(crate) const MAX_ARGUMENTS: usize = 255;

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.peek().kind);
            if precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let start_span = token.span;

        match &token.kind {
            TokenKind::Number(n) => Ok(Expr::new(ExprKind::Number(*n), start_span)),
            TokenKind::StringLiteral(s) => Ok(Expr::new(ExprKind::String(s.clone()), start_span)),
            TokenKind::True => Ok(Expr::new(ExprKind::Bool(true), start_span)),
            TokenKind::False => Ok(Expr::new(ExprKind::Bool(false), start_span)),
            TokenKind::Nil => Ok(Expr::new(ExprKind::Nil, start_span)),

            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Variable(name.clone()), start_span))
            }

            TokenKind::This | TokenKind::Super => {
                Err(ParserError::unsupported("classes", start_span))
            }

            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(ExprKind::Grouping(Box::new(expr)), span))
            }

            TokenKind::Minus => self.parse_unary(UnaryOp::Negate, start_span),
            TokenKind::Bang => self.parse_unary(UnaryOp::Not, start_span),

            _ => Err(ParserError::unexpected_token(
                "expression",
                format!("{}", token.kind),
                token.span,
            )),
        }
    }

    fn parse_unary(&mut self, operator: UnaryOp, start_span: Span) -> ParseResult<Expr> {
        let operand = self.parse_precedence(Precedence::Unary)?;
        let span = start_span.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance();

        match &token.kind {
            TokenKind::Equal => self.parse_assignment(left, &token),

            TokenKind::And | TokenKind::Or => {
                let operator = if token.kind == TokenKind::And {
                    LogicalOp::And
                } else {
                    LogicalOp::Or
                };
                let right = self.parse_precedence(precedence.next())?;
                let span = left.span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::Logical {
                        left: Box::new(left),
                        operator,
                        right: Box::new(right),
                    },
                    span,
                ))
            }

            TokenKind::LeftParen => self.finish_call(left),

            TokenKind::Dot => Err(ParserError::unsupported("classes", token.span)),

            kind => {
                let operator = match kind {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Subtract,
                    TokenKind::Star => BinaryOp::Multiply,
                    TokenKind::Slash => BinaryOp::Divide,
                    TokenKind::EqualEqual => BinaryOp::Equal,
                    TokenKind::BangEqual => BinaryOp::NotEqual,
                    TokenKind::Less => BinaryOp::Less,
                    TokenKind::LessEqual => BinaryOp::LessEqual,
                    TokenKind::Greater => BinaryOp::Greater,
                    TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                    _ => {
                        return Err(ParserError::unexpected_token(
                            "operator",
                            format!("{}", kind),
                            token.span,
                        ))
                    }
                };
                let right = self.parse_precedence(precedence.next())?;
                let span = left.span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(left),
                        operator,
                        right: Box::new(right),
                    },
                    span,
                ))
            }
        }
    }

    /// Assignment is right-associative and only a bare variable is a valid
    /// target.
    fn parse_assignment(&mut self, target: Expr, equals: &Token) -> ParseResult<Expr> {
        let value = self.parse_precedence(Precedence::Assignment)?;
        match target.kind {
            ExprKind::Variable(name) => {
                let span = target.span.merge(&value.span);
                Ok(Expr::new(
                    ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    },
                    span,
                ))
            }
            _ => Err(ParserError::invalid_assignment_target(equals.span)),
        }
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    return Err(ParserError::general(
                        format!("Can't have more than {} arguments", MAX_ARGUMENTS),
                        self.current_span(),
                    ));
                }
                arguments.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen)?;
        let span = callee.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }
}
