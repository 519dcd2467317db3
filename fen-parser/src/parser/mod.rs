// Modular parser for the Fen language
// This module organizes the parser into logical components

use crate::ParseError;
use fen_ast::*;
use fen_lexer::{Lexer, Token, TokenSpan};

// Sub-modules for different parsing responsibilities
mod expressions;
mod items;
mod statements;
mod types;

pub struct Parser {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    pub(crate) source_len: usize,
    // Struct-init literals are not allowed directly in `if`/`while`
    // condition position: `if x {` must parse `x` as a variable, not the
    // start of `x { ... }`.
    pub(crate) struct_init_allowed: bool,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let lexer = Lexer::new(source);
        let tokens: Result<Vec<_>, _> = lexer.collect();
        let tokens = tokens.map_err(|e| match e {
            fen_lexer::LexError::InvalidToken { span } => ParseError::LexerError {
                message: "invalid token".to_string(),
                span,
            },
        })?;

        Ok(Self {
            tokens,
            current: 0,
            source_len: source.len(),
            struct_init_allowed: true,
        })
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut decls = Vec::new();

        while !self.is_at_end() {
            if self.check(&Token::Def) {
                decls.push(TopLevel::Item(Item::Function(self.parse_function()?)));
            } else if self.check(&Token::Struct) {
                decls.push(TopLevel::Item(Item::Struct(self.parse_struct()?)));
            } else if self.check(&Token::Trait) {
                decls.push(TopLevel::Item(Item::Trait(self.parse_trait()?)));
            } else if self.check(&Token::Impl) {
                decls.push(TopLevel::Item(Item::TraitImpl(self.parse_trait_impl()?)));
            } else {
                decls.push(TopLevel::Stmt(self.parse_statement()?));
            }
        }
        Ok(Program { decls })
    }

    // ==================== Helper Methods ====================

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn check_ahead(&self, offset: usize, kind: &Token) -> bool {
        match self.tokens.get(self.current + offset) {
            Some(ts) => std::mem::discriminant(&ts.token) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current].token
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current - 1].token
    }

    /// Span of the token about to be consumed (or an empty span at EOF).
    pub(crate) fn peek_span(&self) -> Span {
        match self.tokens.get(self.current) {
            Some(ts) => Span::new(ts.span.start, ts.span.end),
            None => Span::new(self.source_len, self.source_len),
        }
    }

    /// Span of the most recently consumed token.
    pub(crate) fn prev_span(&self) -> Span {
        let ts = &self.tokens[self.current - 1];
        Span::new(ts.span.start, ts.span.end)
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn consume_ident(&mut self, message: &str) -> Result<String, ParseError> {
        if let Token::Ident(name) = self.peek().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn error(&self, message: &str) -> ParseError {
        let span = match self.tokens.get(self.current) {
            Some(ts) => ts.span.clone(),
            None => self.source_len..self.source_len,
        };
        let found = if self.is_at_end() {
            "end of input".to_string()
        } else {
            format!("{:?}", self.peek())
        };
        ParseError::SyntaxError {
            message: format!("{} (found {})", message, found),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source)
            .expect("lexer failure")
            .parse()
            .expect("parse failure")
    }

    #[test]
    fn test_parse_top_level_let_and_call() {
        let program = parse("let a = 1 + 2 * 3;\necho(int_to_string(a));");
        assert_eq!(program.decls.len(), 2);
        assert!(matches!(
            program.decls[0],
            TopLevel::Stmt(Stmt::Let { .. })
        ));
        assert!(matches!(
            program.decls[1],
            TopLevel::Stmt(Stmt::Expr(Expr::Call { .. }))
        ));
    }

    #[test]
    fn test_parse_generic_function() {
        let program = parse("def unwrap<T>(b: Box<T>) -> T { return b.item; }");
        let TopLevel::Item(Item::Function(func)) = &program.decls[0] else {
            panic!("expected function item");
        };
        assert_eq!(func.name, "unwrap");
        assert_eq!(func.type_params.len(), 1);
        assert_eq!(func.params.len(), 1);
        assert!(func.return_type.is_some());
    }

    #[test]
    fn test_parse_trait_and_impl() {
        let program = parse(
            "trait Say { def say() -> String; }\n\
             struct A {}\n\
             impl Say for A { def say() -> String { return \"hello\"; } }",
        );
        assert_eq!(program.decls.len(), 3);
        let TopLevel::Item(Item::TraitImpl(imp)) = &program.decls[2] else {
            panic!("expected impl item");
        };
        assert_eq!(imp.trait_name, "Say");
        assert_eq!(imp.functions.len(), 1);
    }

    #[test]
    fn test_if_condition_is_not_struct_init() {
        let program = parse("if flag { return 7; } else { return 8; }");
        let TopLevel::Stmt(Stmt::If { branches, else_block, .. }) = &program.decls[0] else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 1);
        assert!(matches!(branches[0].0, Expr::Var { .. }));
        assert!(else_block.is_some());
    }
}
