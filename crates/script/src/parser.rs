//! Parser for script-node sources
//!
//! Uses Chumsky for direct string parsing with good error recovery.
//! Spans are converted to 1-based line numbers so syntax and runtime
//! errors point into the user's own source.

use chumsky::prelude::*;

use crate::ast::{BinaryOp, Literal, ScriptExpr, ScriptStmt, StmtKind, UnaryOp};

/// Parse error type
pub type ParseError<'src> = Rich<'src, char>;

/// A reported syntax error with its 1-based source line
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub line: u32,
    pub message: String,
}

/// Statement with a byte offset, converted to a line number after the
/// parse completes
#[derive(Debug, Clone)]
struct RawStmt {
    kind: RawKind,
    offset: usize,
}

#[derive(Debug, Clone)]
enum RawKind {
    Import(String),
    Assign(String, ScriptExpr),
    If(ScriptExpr, Vec<RawStmt>, Vec<RawStmt>),
    Expr(ScriptExpr),
}

/// Parse source code into script statements. On failure, every error
/// carries the line it occurred on; the first one drives the generated
/// error message.
pub fn parse(source: &str) -> Result<Vec<ScriptStmt>, Vec<SyntaxError>> {
    let (output, errors) = script().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(errors
            .into_iter()
            .map(|error| SyntaxError {
                line: line_of(source, error.span().start),
                message: error.to_string(),
            })
            .collect());
    }
    match output {
        Some(stmts) => Ok(stmts.into_iter().map(|s| resolve_lines(s, source)).collect()),
        None => Err(vec![SyntaxError {
            line: 1,
            message: "empty parse".to_string(),
        }]),
    }
}

fn line_of(source: &str, offset: usize) -> u32 {
    let clamped = offset.min(source.len());
    1 + source[..clamped].matches('\n').count() as u32
}

fn resolve_lines(stmt: RawStmt, source: &str) -> ScriptStmt {
    let line = line_of(source, stmt.offset);
    let kind = match stmt.kind {
        RawKind::Import(module) => StmtKind::Import { module },
        RawKind::Assign(name, value) => StmtKind::Assign { name, value },
        RawKind::If(cond, then_body, else_body) => StmtKind::If {
            cond,
            then_body: then_body
                .into_iter()
                .map(|s| resolve_lines(s, source))
                .collect(),
            else_body: else_body
                .into_iter()
                .map(|s| resolve_lines(s, source))
                .collect(),
        },
        RawKind::Expr(value) => StmtKind::Expr { value },
    };
    ScriptStmt { kind, line }
}

// =============================================================================
// Helper Combinators
// =============================================================================

/// Parse whitespace and comments
fn ws<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    let hash_comment = just("#")
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    choice((
        hash_comment.ignored(),
        text::whitespace().at_least(1).ignored(),
    ))
    .repeated()
    .ignored()
}

fn ident<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    text::ascii::ident().map(|s: &str| s.to_string())
}

/// Dot-separated identifiers
fn path<'src>() -> impl Parser<'src, &'src str, Vec<String>, extra::Err<ParseError<'src>>> + Clone
{
    ident()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
}

fn string_lit<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone
{
    none_of("\"\\")
        .or(just('\\').ignore_then(any()))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
}

/// Number literal: integer unless a fraction or exponent is present
fn number<'src>() -> impl Parser<'src, &'src str, Literal, extra::Err<ParseError<'src>>> + Clone {
    text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(
            one_of("eE")
                .then(one_of("+-").or_not())
                .then(text::digits(10))
                .or_not(),
        )
        .to_slice()
        .map(|s: &str| {
            if s.contains(['.', 'e', 'E']) {
                Literal::Float(s.parse().unwrap_or(0.0))
            } else {
                Literal::Integer(s.parse().unwrap_or(0))
            }
        })
}

// =============================================================================
// Expressions
// =============================================================================

fn expr<'src>() -> impl Parser<'src, &'src str, ScriptExpr, extra::Err<ParseError<'src>>> + Clone {
    recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(',').padded_by(ws()))
            .allow_trailing()
            .collect::<Vec<_>>();

        let call = path()
            .then(
                args.padded_by(ws())
                    .delimited_by(just('('), just(')')),
            )
            .map(|(path, args)| ScriptExpr::Call { path, args });

        let list = expr
            .clone()
            .separated_by(just(',').padded_by(ws()))
            .allow_trailing()
            .collect::<Vec<_>>()
            .padded_by(ws())
            .delimited_by(just('['), just(']'))
            .map(ScriptExpr::List);

        let atom = choice((
            number().map(ScriptExpr::Literal),
            string_lit().map(|s| ScriptExpr::Literal(Literal::Text(s))),
            text::keyword("true").to(ScriptExpr::Literal(Literal::Boolean(true))),
            text::keyword("false").to(ScriptExpr::Literal(Literal::Boolean(false))),
            list,
            call,
            path().map(ScriptExpr::Name),
            expr.clone()
                .padded_by(ws())
                .delimited_by(just('('), just(')')),
        ))
        .padded_by(ws());

        // Unary negation and logical not
        let unary = choice((
            just('-').padded_by(ws()).to(UnaryOp::Neg),
            text::keyword("not").padded_by(ws()).to(UnaryOp::Not),
        ))
        .repeated()
        .foldr(atom, |op, operand| ScriptExpr::Unary {
            op,
            operand: Box::new(operand),
        });

        let power = unary.clone().foldl(
            just('^')
                .padded_by(ws())
                .to(BinaryOp::Pow)
                .then(unary.clone())
                .repeated(),
            fold_binary,
        );

        let product = power.clone().foldl(
            choice((just('*').to(BinaryOp::Mul), just('/').to(BinaryOp::Div)))
                .padded_by(ws())
                .then(power.clone())
                .repeated(),
            fold_binary,
        );

        let sum = product.clone().foldl(
            choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub)))
                .padded_by(ws())
                .then(product.clone())
                .repeated(),
            fold_binary,
        );

        let comparison = sum.clone().foldl(
            choice((
                just("==").to(BinaryOp::Eq),
                just("!=").to(BinaryOp::Ne),
                just("<=").to(BinaryOp::Le),
                just(">=").to(BinaryOp::Ge),
                just('<').to(BinaryOp::Lt),
                just('>').to(BinaryOp::Gt),
            ))
            .padded_by(ws())
            .then(sum.clone())
            .repeated(),
            fold_binary,
        );

        let conjunction = comparison.clone().foldl(
            text::keyword("and")
                .padded_by(ws())
                .to(BinaryOp::And)
                .then(comparison.clone())
                .repeated(),
            fold_binary,
        );

        conjunction.clone().foldl(
            text::keyword("or")
                .padded_by(ws())
                .to(BinaryOp::Or)
                .then(conjunction.clone())
                .repeated(),
            fold_binary,
        )
    })
}

fn fold_binary(left: ScriptExpr, (op, right): (BinaryOp, ScriptExpr)) -> ScriptExpr {
    ScriptExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// =============================================================================
// Statements
// =============================================================================

fn script<'src>() -> impl Parser<'src, &'src str, Vec<RawStmt>, extra::Err<ParseError<'src>>> {
    ws().ignore_then(stmt().padded_by(ws()).repeated().collect())
}

fn stmt<'src>() -> impl Parser<'src, &'src str, RawStmt, extra::Err<ParseError<'src>>> + Clone {
    recursive(|stmt| {
        let block = stmt
            .clone()
            .padded_by(ws())
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('{').padded_by(ws()), just('}').padded_by(ws()));

        let import_stmt = text::keyword("import")
            .padded_by(ws())
            .ignore_then(path())
            .map(|segments| RawKind::Import(segments.join(".")));

        let if_stmt = text::keyword("if")
            .padded_by(ws())
            .ignore_then(expr())
            .then(block.clone())
            .then(
                text::keyword("else")
                    .padded_by(ws())
                    .ignore_then(block.clone())
                    .or_not(),
            )
            .map(|((cond, then_body), else_body)| {
                RawKind::If(cond, then_body, else_body.unwrap_or_default())
            });

        let assign = ident()
            .then_ignore(just('=').padded_by(ws()))
            .then(expr())
            .map(|(name, value)| RawKind::Assign(name, value));

        let expr_stmt = expr().map(RawKind::Expr);

        choice((import_stmt, if_stmt, assign, expr_stmt)).map_with(|kind, e| RawStmt {
            kind,
            offset: e.span().start,
        })
    })
}
