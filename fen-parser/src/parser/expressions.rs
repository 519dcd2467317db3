// Expression parsing with precedence climbing
//
// Precedence, lowest first: or, and, equality, comparison, term, factor,
// postfix (call / attribute), primary.

use super::Parser;
use crate::ParseError;
use fen_ast::{BinOp, Expr, LitKind, NodeId};
use fen_lexer::Token;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span().to(rhs.span());
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
            id: NodeId::fresh(),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while self.match_token(&Token::Or) {
            let rhs = self.parse_and()?;
            expr = Self::binary(BinOp::Or, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_equality()?;
        while self.match_token(&Token::And) {
            let rhs = self.parse_equality()?;
            expr = Self::binary(BinOp::And, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = if self.match_token(&Token::EqEq) {
                BinOp::EqEq
            } else if self.match_token(&Token::NotEq) {
                BinOp::NotEq
            } else {
                break;
            };
            let rhs = self.parse_comparison()?;
            expr = Self::binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = if self.match_token(&Token::LtEq) {
                BinOp::LtEq
            } else if self.match_token(&Token::GtEq) {
                BinOp::GtEq
            } else if self.match_token(&Token::Lt) {
                BinOp::Lt
            } else if self.match_token(&Token::Gt) {
                BinOp::Gt
            } else {
                break;
            };
            let rhs = self.parse_term()?;
            expr = Self::binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.match_token(&Token::Plus) {
                BinOp::Add
            } else if self.match_token(&Token::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_factor()?;
            expr = Self::binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_postfix()?;
        loop {
            let op = if self.match_token(&Token::Star) {
                BinOp::Mul
            } else if self.match_token(&Token::Slash) {
                BinOp::Div
            } else {
                break;
            };
            let rhs = self.parse_postfix()?;
            expr = Self::binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_token(&Token::Dot) {
                let name = self.consume_ident("expected attribute name after '.'")?;
                let span = expr.span().to(self.prev_span());
                expr = Expr::Attr {
                    object: Box::new(expr),
                    name,
                    span,
                    id: NodeId::fresh(),
                };
            } else if self.check(&Token::LParen) {
                self.advance();
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        // Arguments may contain struct-init literals even in
                        // condition position: `while check(State { n: 1 })`.
                        let prev = self.struct_init_allowed;
                        self.struct_init_allowed = true;
                        let arg = self.parse_expression();
                        self.struct_init_allowed = prev;
                        args.push(arg?);
                        if !self.match_token(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&Token::RParen, "expected ')' after arguments")?;
                let span = expr.span().to(self.prev_span());
                expr = Expr::Call {
                    source: Box::new(expr),
                    args,
                    span,
                    id: NodeId::fresh(),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();

        if let Token::IntLiteral(value) = self.peek() {
            let value = *value;
            self.advance();
            return Ok(Expr::Literal {
                kind: LitKind::Int(value),
                span,
                id: NodeId::fresh(),
            });
        }
        if let Token::FloatLiteral(value) = self.peek() {
            let value = *value;
            self.advance();
            return Ok(Expr::Literal {
                kind: LitKind::Float(value),
                span,
                id: NodeId::fresh(),
            });
        }
        if let Token::StringLiteral(value) = self.peek() {
            let value = value.clone();
            self.advance();
            return Ok(Expr::Literal {
                kind: LitKind::Str(value),
                span,
                id: NodeId::fresh(),
            });
        }
        if self.match_token(&Token::True) {
            return Ok(Expr::Literal {
                kind: LitKind::Bool(true),
                span,
                id: NodeId::fresh(),
            });
        }
        if self.match_token(&Token::False) {
            return Ok(Expr::Literal {
                kind: LitKind::Bool(false),
                span,
                id: NodeId::fresh(),
            });
        }
        if self.match_token(&Token::LParen) {
            let prev = self.struct_init_allowed;
            self.struct_init_allowed = true;
            let expr = self.parse_expression();
            self.struct_init_allowed = prev;
            let expr = expr?;
            self.consume(&Token::RParen, "expected ')' after expression")?;
            return Ok(expr);
        }
        if let Token::Ident(name) = self.peek().clone() {
            self.advance();
            if self.struct_init_allowed && self.check(&Token::LBrace) {
                return self.parse_struct_init(name, span);
            }
            let span = span.to(self.prev_span());
            return Ok(Expr::Var {
                name,
                span,
                id: NodeId::fresh(),
            });
        }

        Err(self.error("expected expression"))
    }

    fn parse_struct_init(
        &mut self,
        name: String,
        start: fen_ast::Span,
    ) -> Result<Expr, ParseError> {
        self.consume(&Token::LBrace, "expected '{'")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let field_name = self.consume_ident("expected field name")?;
            self.consume(&Token::Colon, "expected ':' after field name")?;
            let value = self.parse_expression()?;
            fields.push((field_name, value));
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "expected '}' after struct fields")?;
        let span = start.to(self.prev_span());
        Ok(Expr::StructInit {
            name,
            fields,
            span,
            id: NodeId::fresh(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(source: &str) -> Expr {
        Parser::new(source)
            .expect("lexer failure")
            .parse_expression()
            .expect("parse failure")
    }

    #[test]
    fn test_precedence_mul_over_add() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expr("1 + 2 * 3");
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_comparison_below_arithmetic() {
        let expr = parse_expr("a + 1 < b * 2");
        assert!(matches!(expr, Expr::Binary { op: BinOp::Lt, .. }));
    }

    #[test]
    fn test_method_call_chain() {
        let expr = parse_expr("get(true).into()");
        let Expr::Call { source, args, .. } = expr else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert!(matches!(*source, Expr::Attr { .. }));
    }

    #[test]
    fn test_parenthesized_receiver() {
        let expr = parse_expr("(1).into()");
        let Expr::Call { source, .. } = expr else {
            panic!("expected call");
        };
        let Expr::Attr { object, name, .. } = *source else {
            panic!("expected attribute");
        };
        assert_eq!(name, "into");
        assert!(matches!(*object, Expr::Literal { .. }));
    }

    #[test]
    fn test_struct_init() {
        let expr = parse_expr("Box { item: 41 }");
        let Expr::StructInit { name, fields, .. } = expr else {
            panic!("expected struct init");
        };
        assert_eq!(name, "Box");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, "item");
    }

    #[test]
    fn test_logical_operators() {
        let expr = parse_expr("a and b or c");
        // or is lowest: (a and b) or c
        let Expr::Binary { op, lhs, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinOp::Or);
        assert!(matches!(*lhs, Expr::Binary { op: BinOp::And, .. }));
    }
}
