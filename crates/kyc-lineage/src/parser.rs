//! # Rule Expression Parser
//!
//! A `nom` parser for the derivation rule language.
//!
//! ## Grammar
//!
//! Lowest to highest precedence; all binary operators are left-associative.
//!
//! ```text
//! expr        = or
//! or          = and        ( "||" and )*
//! and         = equality   ( "&&" equality )*
//! equality    = comparison ( ("==" | "!=") comparison )*
//! comparison  = membership ( ("<=" | ">=" | "<" | ">") membership )*
//! membership  = additive   ( ("not" "in" | "in") additive )*
//! additive    = term       ( ("+" | "-") term )*
//! term        = unary      ( ("*" | "/" | "%") unary )*
//! unary       = ("!" | "not" | "-") unary | primary
//! primary     = number | string | "true" | "false" | "nil"
//!             | ident "(" args ")" | ident | "[" args "]" | "(" expr ")"
//! ```

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, satisfy},
    combinator::{all_consuming, cut, map, map_res, not, opt, peek, recognize, value},
    error::{context, VerboseError},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::value::Value;

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse a complete rule expression.
pub fn parse_expression(input: &str) -> Result<Expr, String> {
    match all_consuming(ws(expr))(input) {
        Ok((_, e)) => Ok(e),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete expression".to_string()),
    }
}

// ─── Lexical helpers ─────────────────────────────────────────────────

fn ws<'a, T>(
    inner: impl FnMut(&'a str) -> PResult<'a, T>,
) -> impl FnMut(&'a str) -> PResult<'a, T> {
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A keyword not immediately followed by an identifier character.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(kw), not(peek(satisfy(is_ident_char))))
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn number(input: &str) -> PResult<'_, f64> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        str::parse::<f64>,
    )(input)
}

fn string_literal(input: &str) -> PResult<'_, String> {
    let body = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            value("\\", char('\\')),
            value("\"", char('"')),
            value("\n", char('n')),
            value("\t", char('t')),
        )),
    );
    map(
        delimited(char('"'), opt(body), cut(char('"'))),
        Option::unwrap_or_default,
    )(input)
}

// ─── Expressions ─────────────────────────────────────────────────────

/// Fold `next (op next)*` left-associatively.
fn left_assoc<'a>(
    input: &'a str,
    mut next: impl FnMut(&'a str) -> PResult<'a, Expr>,
    mut op: impl FnMut(&'a str) -> PResult<'a, BinaryOp>,
) -> PResult<'a, Expr> {
    let (mut input, mut acc) = next(input)?;
    loop {
        match op(input) {
            Ok((rest, binop)) => {
                let (rest, rhs) = cut(&mut next)(rest)?;
                acc = Expr::binary(binop, acc, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}

fn expr(input: &str) -> PResult<'_, Expr> {
    or_expr(input)
}

fn or_expr(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, and_expr, ws(value(BinaryOp::Or, tag("||"))))
}

fn and_expr(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, equality, ws(value(BinaryOp::And, tag("&&"))))
}

fn equality(input: &str) -> PResult<'_, Expr> {
    left_assoc(
        input,
        comparison,
        ws(alt((
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
        ))),
    )
}

fn comparison(input: &str) -> PResult<'_, Expr> {
    left_assoc(
        input,
        membership,
        ws(alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        ))),
    )
}

fn membership(input: &str) -> PResult<'_, Expr> {
    left_assoc(
        input,
        additive,
        ws(alt((
            value(
                BinaryOp::NotIn,
                tuple((keyword("not"), multispace0, keyword("in"))),
            ),
            value(BinaryOp::In, keyword("in")),
        ))),
    )
}

fn additive(input: &str) -> PResult<'_, Expr> {
    left_assoc(
        input,
        term,
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
    )
}

fn term(input: &str) -> PResult<'_, Expr> {
    left_assoc(
        input,
        unary,
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Rem, char('%')),
        ))),
    )
}

fn unary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(
            pair(
                ws(alt((
                    value(UnaryOp::Not, terminated(char('!'), not(char('=')))),
                    value(UnaryOp::Not, keyword("not")),
                    value(UnaryOp::Neg, char('-')),
                ))),
                unary,
            ),
            |(op, operand)| Expr::unary(op, operand),
        ),
        ws(primary),
    ))(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    context(
        "operand",
        alt((
            map(number, |n| Expr::Literal(Value::Number(n))),
            map(string_literal, |s| Expr::Literal(Value::String(s))),
            map(
                delimited(
                    char('['),
                    ws(separated_list0(char(','), ws(expr))),
                    cut(char(']')),
                ),
                Expr::List,
            ),
            delimited(char('('), ws(expr), cut(char(')'))),
            name_or_call,
        )),
    )(input)
}

fn name_or_call(input: &str) -> PResult<'_, Expr> {
    let (input, name) = identifier(input)?;
    match name {
        "true" => return Ok((input, Expr::Literal(Value::Bool(true)))),
        "false" => return Ok((input, Expr::Literal(Value::Bool(false)))),
        "nil" => return Ok((input, Expr::Literal(Value::Nil))),
        _ => {}
    }
    let (input, args) = opt(preceded(
        pair(multispace0, char('(')),
        cut(terminated(
            ws(separated_list0(char(','), ws(expr))),
            char(')'),
        )),
    ))(input)?;
    Ok((
        input,
        match args {
            Some(args) => Expr::Call(name.to_string(), args),
            None => Expr::Ident(name.to_string()),
        },
    ))
}
