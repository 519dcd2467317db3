// Type and generic-parameter parsing

use super::Parser;
use crate::ParseError;
use fen_ast::{Span, TraitBound, TypeNode, TypeParam};
use fen_lexer::Token;

impl Parser {
    /// Parse a type: `Name`, `Name<T, U>`, or `impl Trait<...> [+ ...]`.
    pub(crate) fn parse_type(&mut self) -> Result<TypeNode, ParseError> {
        if self.check(&Token::Impl) {
            let start = self.peek_span();
            self.advance();
            let bounds = self.parse_bound_list()?;
            let span = start.to(self.prev_span());
            return Ok(TypeNode::ImplTrait { bounds, span });
        }

        let start = self.peek_span();
        let name = self.consume_ident("expected type name")?;
        let args = if self.check(&Token::Lt) {
            self.parse_type_args()?
        } else {
            Vec::new()
        };
        let span = start.to(self.prev_span());
        Ok(TypeNode::Named { name, args, span })
    }

    /// Parse `<T1, T2, ...>` type arguments (the `<` is still pending).
    pub(crate) fn parse_type_args(&mut self) -> Result<Vec<TypeNode>, ParseError> {
        self.consume(&Token::Lt, "expected '<'")?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::Gt, "expected '>' after type arguments")?;
        Ok(args)
    }

    /// Parse one trait bound: `Name` or `Name<T, ...>`.
    pub(crate) fn parse_trait_bound(&mut self) -> Result<TraitBound, ParseError> {
        let start = self.peek_span();
        let name = self.consume_ident("expected trait name")?;
        let args = if self.check(&Token::Lt) {
            self.parse_type_args()?
        } else {
            Vec::new()
        };
        let span = start.to(self.prev_span());
        Ok(TraitBound { name, args, span })
    }

    /// Parse `Bound + Bound + ...` (at least one).
    pub(crate) fn parse_bound_list(&mut self) -> Result<Vec<TraitBound>, ParseError> {
        let mut bounds = vec![self.parse_trait_bound()?];
        while self.match_token(&Token::Plus) {
            bounds.push(self.parse_trait_bound()?);
        }
        Ok(bounds)
    }

    /// Parse an optional `<T: Bound, U, ...>` generic parameter list.
    pub(crate) fn parse_type_params(&mut self) -> Result<Vec<TypeParam>, ParseError> {
        if !self.match_token(&Token::Lt) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            let start = self.peek_span();
            let name = self.consume_ident("expected type parameter name")?;
            let bounds = if self.match_token(&Token::Colon) {
                self.parse_bound_list()?
            } else {
                Vec::new()
            };
            let span: Span = start.to(self.prev_span());
            params.push(TypeParam { name, bounds, span });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::Gt, "expected '>' after type parameters")?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_generic_type() {
        let mut parser = Parser::new("Pair<Box<Int>, String>").expect("lexer failure");
        let ty = parser.parse_type().expect("parse failure");
        let TypeNode::Named { name, args, .. } = ty else {
            panic!("expected named type");
        };
        assert_eq!(name, "Pair");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0], TypeNode::Named { name, args, .. } if name == "Box" && args.len() == 1));
    }

    #[test]
    fn test_impl_trait_type() {
        let mut parser = Parser::new("impl Into<String>").expect("lexer failure");
        let ty = parser.parse_type().expect("parse failure");
        let TypeNode::ImplTrait { bounds, .. } = ty else {
            panic!("expected impl-trait type");
        };
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0].name, "Into");
        assert_eq!(bounds[0].args.len(), 1);
    }

    #[test]
    fn test_bounded_type_params() {
        let mut parser = Parser::new("<T: Printable, U: Read + Write>").expect("lexer failure");
        let params = parser.parse_type_params().expect("parse failure");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].bounds.len(), 1);
        assert_eq!(params[1].bounds.len(), 2);
    }
}
