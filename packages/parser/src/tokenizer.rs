use crate::error::{ParseError, ParseResult};
use cascara_core::Span;
use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Coarse token stream for the statement layer. Refinement of selector and
/// value text happens later, on the raw slices, so the lexer only needs to
/// find statement boundaries without being fooled by strings or comments.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token<'src> {
    #[regex(r"@[a-zA-Z-][a-zA-Z0-9-]*", |lex| &lex.slice()[1..])]
    AtKeyword(&'src str),

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r"'([^'\\]|\\.)*'", |lex| lex.slice())]
    QuotedString(&'src str),

    // comment text without the delimiters
    #[regex(r"/\*([^*]|\*[^/])*\*/", |lex| {
        let s = lex.slice();
        &s[2..s.len() - 2]
    })]
    Comment(&'src str),

    #[regex(r#"[^{}@;'"/]+"#, |lex| lex.slice())]
    Chunk(&'src str),

    #[token("/")]
    Slash,

    #[token("@")]
    StrayAt,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::AtKeyword(name) => write!(f, "@{name}"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Semicolon => write!(f, "';'"),
            Token::QuotedString(s) => write!(f, "{s}"),
            Token::Comment(_) => write!(f, "comment"),
            Token::Chunk(s) => write!(f, "'{}'", s.trim()),
            Token::Slash => write!(f, "'/'"),
            Token::StrayAt => write!(f, "'@'"),
        }
    }
}

/// Tokenize a whole source string, spans in byte offsets.
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, Range<usize>)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        match token {
            Ok(t) => tokens.push((t, lexer.span())),
            Err(()) => {
                let span = LineIndex::new(source).span_at(lexer.span().start);
                return Err(ParseError::lexer_error(span.line, span.column));
            }
        }
    }
    Ok(tokens)
}

/// Byte offset to 1-based line/column translation.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    pub fn span_at(&self, offset: usize) -> Span {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Span::new(line as u32, column as u32)
    }
}
