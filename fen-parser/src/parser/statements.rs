// Statement and block parsing

use super::Parser;
use crate::ParseError;
use fen_ast::{Block, Expr, NodeId, Stmt};
use fen_lexer::Token;

impl Parser {
    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::LBrace, "expected '{'")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        self.consume(&Token::RBrace, "expected '}'")?;
        let span = start.to(self.prev_span());
        Ok(Block {
            stmts,
            span,
            id: NodeId::fresh(),
        })
    }

    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&Token::Let) {
            return self.parse_let();
        }
        if self.check(&Token::If) {
            return self.parse_if();
        }
        if self.check(&Token::While) {
            return self.parse_while();
        }
        if self.check(&Token::Return) {
            return self.parse_return();
        }
        if self.check(&Token::Break) {
            let span = self.peek_span();
            self.advance();
            self.consume(&Token::Semicolon, "expected ';' after 'break'")?;
            return Ok(Stmt::Break {
                span,
                id: NodeId::fresh(),
            });
        }
        if self.check(&Token::Continue) {
            let span = self.peek_span();
            self.advance();
            self.consume(&Token::Semicolon, "expected ';' after 'continue'")?;
            return Ok(Stmt::Continue {
                span,
                id: NodeId::fresh(),
            });
        }
        // `name = expr;` assignment, distinguished from an expression
        // statement by one token of lookahead
        if self.check(&Token::Ident(String::new())) && self.check_ahead(1, &Token::Eq) {
            return self.parse_assign();
        }
        let expr = self.parse_expression()?;
        self.consume(&Token::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Let, "expected 'let'")?;
        let name = self.consume_ident("expected variable name after 'let'")?;
        let ty = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(&Token::Eq, "expected '=' in let binding")?;
        let value = self.parse_expression()?;
        self.consume(&Token::Semicolon, "expected ';' after let binding")?;
        let span = start.to(self.prev_span());
        Ok(Stmt::Let {
            name,
            ty,
            value,
            span,
            id: NodeId::fresh(),
        })
    }

    fn parse_assign(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        let name = self.consume_ident("expected variable name")?;
        self.consume(&Token::Eq, "expected '='")?;
        let value = self.parse_expression()?;
        self.consume(&Token::Semicolon, "expected ';' after assignment")?;
        let span = start.to(self.prev_span());
        Ok(Stmt::Assign {
            name,
            value,
            span,
            id: NodeId::fresh(),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let prev = self.struct_init_allowed;
        self.struct_init_allowed = false;
        let cond = self.parse_expression();
        self.struct_init_allowed = prev;
        cond
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::If, "expected 'if'")?;
        let mut branches = Vec::new();
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        branches.push((cond, body));

        let mut else_block = None;
        loop {
            if self.match_token(&Token::Elif) {
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else if self.match_token(&Token::Else) {
                else_block = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        let span = start.to(self.prev_span());
        Ok(Stmt::If {
            branches,
            else_block,
            span,
            id: NodeId::fresh(),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::While, "expected 'while'")?;
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        let span = start.to(self.prev_span());
        Ok(Stmt::While {
            cond,
            body,
            span,
            id: NodeId::fresh(),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Return, "expected 'return'")?;
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "expected ';' after return")?;
        let span = start.to(self.prev_span());
        Ok(Stmt::Return {
            value,
            span,
            id: NodeId::fresh(),
        })
    }
}
