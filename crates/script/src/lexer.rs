//! Lexer for script-node sources
//!
//! Uses Logos for fast tokenization. The parser works on the raw
//! source; the token stream exists for cheap structural scans that must
//! run even on sources that do not parse, like the wildcard-import
//! check.

use logos::Logos;

/// Token type for the script language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token<'src> {
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    // === Keywords ===
    #[token("import")]
    Import,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // === Operators ===
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("==")]
    DoubleEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Equals,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // === Literals and identifiers ===
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Float(&'src str),
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Integer(&'src str),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    Text(&'src str),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),
}

/// Whether the source contains a wildcard import (`import *`). Checked
/// before parsing: a star import disqualifies the source even when the
/// rest of it would not parse.
pub fn contains_star_import(source: &str) -> bool {
    let mut lexer = Token::lexer(source);
    let mut after_import = false;
    while let Some(result) = lexer.next() {
        match result {
            Ok(Token::Import) => after_import = true,
            Ok(Token::Star) if after_import => return true,
            Ok(_) => after_import = false,
            // Unlexable input cannot hide a star import; skip it
            Err(()) => after_import = false,
        }
    }
    false
}
