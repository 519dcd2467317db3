use logos::Logos;

/// Helper function to unescape string literals
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Token types for the Fen programming language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("def")]
    Def,
    #[token("struct")]
    Struct,
    #[token("trait")]
    Trait,
    #[token("impl")]
    Impl,
    #[token("for")]
    For,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("continue")]
    Continue,
    #[token("break")]
    Break,
    #[token("return")]
    Return,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    // Literals
    // Float must be declared before Int so `3.14` does not lex as `3` `.` `14`
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    FloatLiteral(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    IntLiteral(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringLiteral(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(_) => Some(Err(LexError::InvalidToken { span: span.clone() })),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("invalid token at {span:?}")]
    InvalidToken { span: std::ops::Range<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .map(|r| r.expect("lex failure").token)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let toks = tokens("let def struct trait impl for while");
        assert_eq!(
            toks,
            vec![
                Token::Let,
                Token::Def,
                Token::Struct,
                Token::Trait,
                Token::Impl,
                Token::For,
                Token::While,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let toks = tokens(r#"42 3.14 "hello" true false"#);
        assert_eq!(
            toks,
            vec![
                Token::IntLiteral(42),
                Token::FloatLiteral(3.14),
                Token::StringLiteral("hello".to_string()),
                Token::True,
                Token::False,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let toks = tokens(r#""a\nb\"c""#);
        assert_eq!(toks, vec![Token::StringLiteral("a\nb\"c".to_string())]);
    }

    #[test]
    fn test_operators() {
        let toks = tokens("== != <= >= < > -> = + - * /");
        assert_eq!(
            toks,
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::Lt,
                Token::Gt,
                Token::Arrow,
                Token::Eq,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
            ]
        );
    }

    #[test]
    fn test_float_not_attribute() {
        // `3.14` is one float token, `b.item` is ident dot ident
        assert_eq!(tokens("3.14"), vec![Token::FloatLiteral(3.14)]);
        assert_eq!(
            tokens("b.item"),
            vec![
                Token::Ident("b".to_string()),
                Token::Dot,
                Token::Ident("item".to_string()),
            ]
        );
    }

    #[test]
    fn test_generic_function_def() {
        let toks = tokens("def unwrap<T>(b: Box<T>) -> T");
        assert_eq!(toks[0], Token::Def);
        assert_eq!(toks[1], Token::Ident("unwrap".to_string()));
        assert_eq!(toks[2], Token::Lt);
        assert_eq!(toks[3], Token::Ident("T".to_string()));
        assert_eq!(toks[4], Token::Gt);
        assert_eq!(toks[5], Token::LParen);
    }

    #[test]
    fn test_comments_skipped() {
        let toks = tokens("let a = 1; // trailing comment\nlet b = 2;");
        assert_eq!(toks.len(), 10);
        assert_eq!(toks[4], Token::Semicolon);
        assert_eq!(toks[5], Token::Let);
    }

    #[test]
    fn test_spans() {
        let mut lexer = Lexer::new("let x");
        let first = lexer.next().expect("token").expect("lex failure");
        assert_eq!(first.span, 0..3);
        let second = lexer.next().expect("token").expect("lex failure");
        assert_eq!(second.span, 4..5);
    }

    #[test]
    fn test_invalid_token() {
        let mut lexer = Lexer::new("let @ x");
        assert!(lexer.next().expect("token").is_ok());
        assert!(lexer.next().expect("token").is_err());
    }
}
