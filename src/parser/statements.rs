//! Statement parsing: print, if, while, for, return, blocks.

use crate::ast::*;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::Print) {
            self.print_statement()
        } else if self.check(&TokenKind::If) {
            self.if_statement()
        } else if self.check(&TokenKind::While) {
            self.while_statement()
        } else if self.check(&TokenKind::For) {
            self.for_statement()
        } else if self.check(&TokenKind::Return) {
            self.return_statement()
        } else if self.check(&TokenKind::LeftBrace) {
            self.block_statement()
        } else {
            self.expression_statement()
        }
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Print)?;
        let expr = self.expression()?;
        self.expect(&TokenKind::Semicolon)?;
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Print(expr), span))
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen)?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = start_span.merge(&self.previous_span());

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.statement()?);
        let span = start_span.merge(&self.previous_span());

        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    /// `for (init; cond; incr) body` becomes
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LeftParen)?;

        let initializer = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let mut body = self.statement()?;
        let span = start_span.merge(&self.previous_span());

        if let Some(increment) = increment {
            let incr_span = increment.span;
            body = Stmt::new(
                StmtKind::Block(vec![
                    body,
                    Stmt::new(StmtKind::Expression(increment), incr_span),
                ]),
                span,
            );
        }

        let condition = condition.unwrap_or_else(|| Expr::new(ExprKind::Bool(true), span));
        let mut stmt = Stmt::new(
            StmtKind::While {
                condition,
                body: Box::new(body),
            },
            span,
        );

        if let Some(initializer) = initializer {
            stmt = Stmt::new(StmtKind::Block(vec![initializer, stmt]), span);
        }

        Ok(stmt)
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Return)?;

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn block_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        let statements = self.block()?;
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Block(statements), span))
    }

    /// Parse `{ declarations }`, consuming both braces.
    pub(crate) fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(statements)
    }

    pub(crate) fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.expect(&TokenKind::Semicolon)?;
        let span: Span = expr.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
