//! Declaration parsing: functions, variables, and the rejected class form.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};
use super::expressions::MAX_ARGUMENTS;

impl Parser {
    pub(crate) fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::Fun) {
            self.function_declaration()
        } else if self.check(&TokenKind::Var) {
            self.var_declaration()
        } else if self.check(&TokenKind::Class) {
            self.class_declaration()
        } else {
            self.statement()
        }
    }

    pub(crate) fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Var)?;
        let name = self.expect_identifier()?;

        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Var { name, initializer }, span))
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Fun)?;
        let name = self.expect_identifier()?;

        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    return Err(ParserError::general(
                        format!("Can't have more than {} parameters", MAX_ARGUMENTS),
                        self.current_span(),
                    ));
                }
                params.push(self.expect_identifier()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let body = self.block()?;
        let span = start_span.merge(&self.previous_span());

        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                body,
                span,
            }),
            span,
        ))
    }

    /// Classes are reserved but not supported. The body is skipped up to its
    /// closing brace, which is left for `synchronize` to consume.
    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Class)?;

        while !self.check(&TokenKind::LeftBrace) && !self.is_at_end() {
            self.advance();
        }

        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace if depth <= 1 => break,
                TokenKind::RightBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }

        Err(ParserError::unsupported("classes", start_span))
    }
}
