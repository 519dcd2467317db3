// Top-level item parsing: functions, structs, traits, trait impls

use super::Parser;
use crate::ParseError;
use fen_ast::{
    Field, FunctionDef, NodeId, Param, StructDef, TraitDef, TraitFunction, TraitImplDef, TypeNode,
};
use fen_lexer::Token;

impl Parser {
    /// `def name<T, ...>(a: A, ...) -> R { ... }`
    pub(crate) fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Def, "expected 'def'")?;
        let name = self.consume_ident("expected function name")?;
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        let return_type = if self.match_token(&Token::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = start.to(self.prev_span());
        Ok(FunctionDef {
            name,
            type_params,
            params,
            return_type,
            body,
            span,
            id: NodeId::fresh(),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.consume(&Token::LParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let start = self.peek_span();
                let name = self.consume_ident("expected parameter name")?;
                self.consume(&Token::Colon, "expected ':' after parameter name")?;
                let ty = self.parse_type()?;
                let span = start.to(self.prev_span());
                params.push(Param { name, ty, span });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "expected ')' after parameters")?;
        Ok(params)
    }

    /// `struct Name<T, ...> { field: Type, ... }`
    pub(crate) fn parse_struct(&mut self) -> Result<StructDef, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Struct, "expected 'struct'")?;
        let name = self.consume_ident("expected struct name")?;
        let type_params = self.parse_type_params()?;
        self.consume(&Token::LBrace, "expected '{' after struct name")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let field_start = self.peek_span();
            let field_name = self.consume_ident("expected field name")?;
            self.consume(&Token::Colon, "expected ':' after field name")?;
            let ty = self.parse_type()?;
            let span = field_start.to(self.prev_span());
            fields.push(Field {
                name: field_name,
                ty,
                span,
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "expected '}' after struct fields")?;
        let span = start.to(self.prev_span());
        Ok(StructDef {
            name,
            type_params,
            fields,
            span,
            id: NodeId::fresh(),
        })
    }

    /// `trait Name<T, ...> { def m(a: A) -> R; ... }`
    pub(crate) fn parse_trait(&mut self) -> Result<TraitDef, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Trait, "expected 'trait'")?;
        let name = self.consume_ident("expected trait name")?;
        let type_params = self.parse_type_params()?;
        self.consume(&Token::LBrace, "expected '{' after trait name")?;
        let mut functions = Vec::new();
        while !self.check(&Token::RBrace) {
            let fn_start = self.peek_span();
            self.consume(&Token::Def, "expected 'def' in trait body")?;
            let fn_name = self.consume_ident("expected trait method name")?;
            let params = self.parse_params()?;
            let return_type = if self.match_token(&Token::Arrow) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.consume(&Token::Semicolon, "expected ';' after trait method signature")?;
            let span = fn_start.to(self.prev_span());
            functions.push(TraitFunction {
                name: fn_name,
                params,
                return_type,
                span,
                id: NodeId::fresh(),
            });
        }
        self.consume(&Token::RBrace, "expected '}' after trait body")?;
        let span = start.to(self.prev_span());
        Ok(TraitDef {
            name,
            type_params,
            functions,
            span,
            id: NodeId::fresh(),
        })
    }

    /// `impl<T, ...> Trait<...> for Target { def m ... }`
    pub(crate) fn parse_trait_impl(&mut self) -> Result<TraitImplDef, ParseError> {
        let start = self.peek_span();
        self.consume(&Token::Impl, "expected 'impl'")?;
        let type_params = self.parse_type_params()?;
        let trait_name = self.consume_ident("expected trait name after 'impl'")?;
        let trait_args = if self.check(&Token::Lt) {
            self.parse_type_args()?
        } else {
            Vec::new()
        };
        self.consume(&Token::For, "expected 'for' in trait impl")?;
        let target: TypeNode = self.parse_type()?;
        self.consume(&Token::LBrace, "expected '{' after impl target")?;
        let mut functions = Vec::new();
        while !self.check(&Token::RBrace) {
            functions.push(self.parse_function()?);
        }
        self.consume(&Token::RBrace, "expected '}' after impl body")?;
        let span = start.to(self.prev_span());
        Ok(TraitImplDef {
            type_params,
            trait_name,
            trait_args,
            target,
            functions,
            span,
            id: NodeId::fresh(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_with_params() {
        let mut parser = Parser::new("struct Box<T> { item: T }").expect("lexer failure");
        let def = parser.parse_struct().expect("parse failure");
        assert_eq!(def.name, "Box");
        assert_eq!(def.type_params.len(), 1);
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].name, "item");
    }

    #[test]
    fn test_generic_impl() {
        let source = "impl<T: Into> Read<T> for Source { def read() -> T { return self.value; } }";
        let mut parser = Parser::new(source).expect("lexer failure");
        let imp = parser.parse_trait_impl().expect("parse failure");
        assert_eq!(imp.trait_name, "Read");
        assert_eq!(imp.type_params.len(), 1);
        assert_eq!(imp.trait_args.len(), 1);
        assert_eq!(imp.functions.len(), 1);
    }

    #[test]
    fn test_impl_trait_return() {
        let source = "def get(flag: Bool) -> impl Into<String> { return 7; }";
        let mut parser = Parser::new(source).expect("lexer failure");
        let func = parser.parse_function().expect("parse failure");
        assert!(matches!(
            func.return_type,
            Some(TypeNode::ImplTrait { .. })
        ));
    }

    #[test]
    fn test_unit_return_omitted() {
        let source = "def log(message: String) { echo(message); }";
        let mut parser = Parser::new(source).expect("lexer failure");
        let func = parser.parse_function().expect("parse failure");
        assert!(func.return_type.is_none());
    }
}
