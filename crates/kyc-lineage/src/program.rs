//! # Compiled Rules
//!
//! A [`Program`] is a parsed rule whose attribute references and function
//! calls were checked when it was compiled. Running it only reads the
//! environment; storing the result is the evaluator's job.
//!
//! ## Semantics
//!
//! - `==` / `!=` compare structurally; values of different types are unequal.
//! - `<`, `<=`, `>`, `>=` accept two numbers or two strings.
//! - `&&`, `||`, `!` require booleans and short-circuit.
//! - `x in list` tests membership by equality; `s in t` on two strings
//!   tests for a substring.
//! - `+` adds numbers and concatenates strings or lists.
//! - Functions: `len`, `max`, `min`, `sum`, `abs`, `lower`, `upper`.
//!   `max` and `min` take one list or several numbers.
//!
//! ## Compile-time types
//!
//! Literals, list literals, operator results, and function results have a
//! type known at compile time; attribute references do not. An operator
//! whose operands have known, incompatible types (`"a" + 1`, `!3`,
//! `len(true)`) is rejected when the rule compiles. Anything involving an
//! attribute of the wrong type still fails at evaluation.

use std::collections::BTreeMap;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::EvalError;
use crate::parser::parse_expression;
use crate::value::Value;

/// The attribute environment rules run against.
pub type Environment = BTreeMap<String, Value>;

// ─── Builtins ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Len,
    Max,
    Min,
    Sum,
    Abs,
    Lower,
    Upper,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "max" => Self::Max,
            "min" => Self::Min,
            "sum" => Self::Sum,
            "abs" => Self::Abs,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::Abs => "abs",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    /// Check known argument types and return the result type.
    fn result_type(&self, args: &[Option<Ty>]) -> Result<Ty, String> {
        let name = self.name();
        let expect = |allowed: &[Ty], got: &Option<Ty>| match got {
            Some(t) if !allowed.contains(t) => Err(format!(
                "type mismatch in {name}: expected {}, got {}",
                allowed.iter().map(|t| t.name()).collect::<Vec<_>>().join(" or "),
                t.name()
            )),
            _ => Ok(()),
        };
        match (self, args) {
            (Self::Len, [arg]) => expect(&[Ty::List, Ty::String], arg).map(|_| Ty::Number),
            (Self::Max | Self::Min, [arg]) => {
                expect(&[Ty::List, Ty::Number], arg).map(|_| Ty::Number)
            }
            (Self::Max | Self::Min, args) => {
                for arg in args {
                    expect(&[Ty::Number], arg)?;
                }
                Ok(Ty::Number)
            }
            (Self::Sum, [arg]) => expect(&[Ty::List], arg).map(|_| Ty::Number),
            (Self::Abs, [arg]) => expect(&[Ty::Number], arg).map(|_| Ty::Number),
            (Self::Lower | Self::Upper, [arg]) => expect(&[Ty::String], arg).map(|_| Ty::String),
            _ => Err(format!("function {name} does not accept {} argument(s)", args.len())),
        }
    }

    fn accepts(&self, argc: usize) -> bool {
        match self {
            Self::Max | Self::Min => argc >= 1,
            _ => argc == 1,
        }
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let name = self.name();
        let Some(first) = args.first() else {
            return Err(mismatch(name, "missing argument".to_string()));
        };
        match self {
            Self::Len => match first {
                Value::List(items) => Ok(Value::Number(items.len() as f64)),
                Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
                other => Err(mismatch(name, format!("cannot take length of {}", other.type_name()))),
            },
            Self::Max | Self::Min => {
                let numbers = match args.as_slice() {
                    [Value::List(items)] => numbers_of(name, items)?,
                    _ => numbers_of(name, &args)?,
                };
                let pick = if *self == Self::Max { f64::max } else { f64::min };
                numbers
                    .into_iter()
                    .reduce(pick)
                    .map(Value::Number)
                    .ok_or_else(|| EvalError::EmptyAggregate(name.to_string()))
            }
            Self::Sum => match first {
                Value::List(items) => Ok(Value::Number(numbers_of(name, items)?.into_iter().sum())),
                other => Err(mismatch(name, format!("expected list, got {}", other.type_name()))),
            },
            Self::Abs => match first {
                Value::Number(n) => Ok(Value::Number(n.abs())),
                other => Err(mismatch(name, format!("expected number, got {}", other.type_name()))),
            },
            Self::Lower | Self::Upper => match first {
                Value::String(s) if *self == Self::Lower => Ok(Value::String(s.to_lowercase())),
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(mismatch(name, format!("expected string, got {}", other.type_name()))),
            },
        }
    }
}

fn mismatch(op: &str, detail: String) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        detail,
    }
}

fn numbers_of(op: &str, values: &[Value]) -> Result<Vec<f64>, EvalError> {
    values
        .iter()
        .map(|v| {
            v.as_number()
                .ok_or_else(|| mismatch(op, format!("expected number, got {}", v.type_name())))
        })
        .collect()
}

// ─── Static types ────────────────────────────────────────────────────

/// Value type of a sub-expression, when it does not depend on the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Nil,
    Bool,
    Number,
    String,
    List,
}

impl Ty {
    fn of(value: &Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::List(_) => Self::List,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
        }
    }
}

fn type_error(op: &str, detail: String) -> String {
    format!("type mismatch in {op}: {detail}")
}

/// Infer the type of `expr`, rejecting operators applied to known
/// incompatible types. `None` means the type depends on the environment.
fn check_types(expr: &Expr) -> Result<Option<Ty>, String> {
    match expr {
        Expr::Literal(v) => Ok(Some(Ty::of(v))),
        Expr::Ident(_) => Ok(None),
        Expr::List(items) => {
            for item in items {
                check_types(item)?;
            }
            Ok(Some(Ty::List))
        }
        Expr::Unary(op, operand) => {
            let (sym, want) = match op {
                UnaryOp::Not => ("!", Ty::Bool),
                UnaryOp::Neg => ("-", Ty::Number),
            };
            match check_types(operand)? {
                Some(t) if t != want => Err(type_error(
                    sym,
                    format!("expected {}, got {}", want.name(), t.name()),
                )),
                _ => Ok(Some(want)),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let (l, r) = (check_types(lhs)?, check_types(rhs)?);
            binary_type(*op, l, r)
        }
        Expr::Call(name, args) => {
            let f = Builtin::lookup(name).ok_or_else(|| format!("unknown function {name}"))?;
            let types = args.iter().map(check_types).collect::<Result<Vec<_>, _>>()?;
            f.result_type(&types).map(Some)
        }
    }
}

fn binary_type(op: BinaryOp, l: Option<Ty>, r: Option<Ty>) -> Result<Option<Ty>, String> {
    let sym = op.symbol();
    let names = |l: Ty, r: Ty| (l.name(), r.name());
    match op {
        BinaryOp::Eq | BinaryOp::Ne => Ok(Some(Ty::Bool)),
        BinaryOp::And | BinaryOp::Or => {
            for t in [l, r].into_iter().flatten() {
                if t != Ty::Bool {
                    return Err(type_error(sym, format!("expected bool, got {}", t.name())));
                }
            }
            Ok(Some(Ty::Bool))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let comparable = |t: Ty| matches!(t, Ty::Number | Ty::String);
            match (l, r) {
                (Some(a), Some(b)) if a != b || !comparable(a) => {
                    let (a, b) = names(a, b);
                    Err(type_error(sym, format!("cannot compare {a} with {b}")))
                }
                (Some(t), None) | (None, Some(t)) if !comparable(t) => {
                    Err(type_error(sym, format!("cannot compare {}", t.name())))
                }
                _ => Ok(Some(Ty::Bool)),
            }
        }
        BinaryOp::In | BinaryOp::NotIn => match (l, r) {
            (Some(a), Some(b)) if b != Ty::List && (a, b) != (Ty::String, Ty::String) => {
                let (a, b) = names(a, b);
                Err(type_error(sym, format!("cannot test {a} in {b}")))
            }
            (None, Some(b)) if !matches!(b, Ty::List | Ty::String) => {
                Err(type_error(sym, format!("cannot test membership in {}", b.name())))
            }
            _ => Ok(Some(Ty::Bool)),
        },
        BinaryOp::Add => {
            let addable = |t: Ty| matches!(t, Ty::Number | Ty::String | Ty::List);
            match (l, r) {
                (Some(a), Some(b)) if a != b || !addable(a) => {
                    let (a, b) = names(a, b);
                    Err(type_error(sym, format!("cannot add {a} and {b}")))
                }
                (Some(t), None) | (None, Some(t)) if !addable(t) => {
                    Err(type_error(sym, format!("cannot add {}", t.name())))
                }
                (Some(t), _) | (None, Some(t)) => Ok(Some(t)),
                (None, None) => Ok(None),
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            for t in [l, r].into_iter().flatten() {
                if t != Ty::Number {
                    return Err(type_error(sym, format!("expected numbers, got {}", t.name())));
                }
            }
            Ok(Some(Ty::Number))
        }
    }
}

// ─── Program ─────────────────────────────────────────────────────────

/// A compiled rule expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    expr: Expr,
}

impl Program {
    /// Parse `source` and check it against the names `is_known` accepts.
    ///
    /// Fails on syntax errors, unknown attributes, unknown functions, wrong
    /// function arity, and operators applied to known incompatible types.
    pub fn compile(source: &str, is_known: impl Fn(&str) -> bool) -> Result<Self, String> {
        let expr = parse_expression(source)?;
        expr.try_walk(&mut |node| match node {
            Expr::Ident(name) if !is_known(name.as_str()) => Err(format!("unknown attribute {name}")),
            Expr::Call(name, args) => match Builtin::lookup(name) {
                None => Err(format!("unknown function {name}")),
                Some(f) if !f.accepts(args.len()) => Err(format!(
                    "function {name} does not accept {} argument(s)",
                    args.len()
                )),
                Some(_) => Ok(()),
            },
            _ => Ok(()),
        })?;
        check_types(&expr)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attribute names the rule reads.
    pub fn references(&self) -> Vec<&str> {
        self.expr.identifiers()
    }

    /// Evaluate against `env`.
    pub fn run(&self, env: &Environment) -> Result<Value, EvalError> {
        eval(&self.expr, env)
    }
}

fn eval(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedAttribute(name.clone())),
        Expr::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|item| eval(item, env))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Unary(op, operand) => {
            let v = eval(operand, env)?;
            match (op, &v) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnaryOp::Not, _) => Err(mismatch("!", format!("expected bool, got {}", v.type_name()))),
                (UnaryOp::Neg, _) => Err(mismatch("-", format!("expected number, got {}", v.type_name()))),
            }
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if !truthy("&&", eval(lhs, env)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy("&&", eval(rhs, env)?)?))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if truthy("||", eval(lhs, env)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy("||", eval(rhs, env)?)?))
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs, env)?, eval(rhs, env)?),
        Expr::Call(name, args) => {
            let f = Builtin::lookup(name)
                .ok_or_else(|| mismatch(name, "unknown function".to_string()))?;
            let args = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<Vec<_>, _>>()?;
            f.call(args)
        }
    }
}

fn truthy(op: &str, v: Value) -> Result<bool, EvalError> {
    v.as_bool()
        .ok_or_else(|| mismatch(op, format!("expected bool, got {}", v.type_name())))
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    let sym = op.symbol();
    match op {
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::Ne => Ok(Value::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => {
                    return Err(mismatch(
                        sym,
                        format!("cannot compare {} with {}", l.type_name(), r.type_name()),
                    ))
                }
            };
            let Some(ord) = ord else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let found = match (&l, &r) {
                (_, Value::List(items)) => items.contains(&l),
                (Value::String(needle), Value::String(hay)) => hay.contains(needle.as_str()),
                _ => {
                    return Err(mismatch(
                        sym,
                        format!("cannot test {} in {}", l.type_name(), r.type_name()),
                    ))
                }
            };
            Ok(Value::Bool(found == (op == BinaryOp::In)))
        }
        BinaryOp::Add => match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (l, r) => Err(mismatch(
                sym,
                format!("cannot add {} and {}", l.type_name(), r.type_name()),
            )),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&l, &r) else {
                return Err(mismatch(
                    sym,
                    format!("expected numbers, got {} and {}", l.type_name(), r.type_name()),
                ));
            };
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Sub => Ok(Value::Number(a - b)),
                BinaryOp::Mul => Ok(Value::Number(a * b)),
                _ if b == 0.0 => Err(EvalError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Number(a / b)),
                _ => Ok(Value::Number(a % b)),
            }
        }
        // `eval` short-circuits these before both sides are computed.
        BinaryOp::And => Ok(Value::Bool(truthy(sym, l)? && truthy(sym, r)?)),
        BinaryOp::Or => Ok(Value::Bool(truthy(sym, l)? || truthy(sym, r)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.insert("TAX_RESIDENCY_COUNTRY".into(), Value::from("IR"));
        env.insert("UBO_PERCENT".into(), Value::from(vec![35.0, 45.0, 20.0]));
        env.insert(
            "UBO_NAME".into(),
            Value::from(vec!["Larry Fink", "Institutional Investors", "Vanguard Group"]),
        );
        env.insert("PEP_STATUS".into(), Value::Bool(false));
        env
    }

    fn run(src: &str) -> Result<Value, EvalError> {
        let env = env();
        Program::compile(src, |n| env.contains_key(n))
            .unwrap()
            .run(&env)
    }

    #[test]
    fn high_risk_jurisdiction() {
        assert_eq!(
            run(r#"TAX_RESIDENCY_COUNTRY in ["IR", "KP", "SY", "YE", "AF", "MM"]"#),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run(r#"TAX_RESIDENCY_COUNTRY not in ["IR"]"#),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn aggregates() {
        assert_eq!(run("max(UBO_PERCENT)"), Ok(Value::Number(45.0)));
        assert_eq!(run("min(UBO_PERCENT)"), Ok(Value::Number(20.0)));
        assert_eq!(run("sum(UBO_PERCENT)"), Ok(Value::Number(100.0)));
        assert_eq!(run("max(1, 7, 3)"), Ok(Value::Number(7.0)));
        assert_eq!(run("len(UBO_NAME) > 3"), Ok(Value::Bool(false)));
        assert_eq!(run("max([])"), Err(EvalError::EmptyAggregate("max".into())));
    }

    #[test]
    fn boolean_connectives_short_circuit() {
        // The right side would be a type error if evaluated.
        assert_eq!(run("PEP_STATUS && UBO_PERCENT"), Ok(Value::Bool(false)));
        assert_eq!(run("!PEP_STATUS || UBO_PERCENT"), Ok(Value::Bool(true)));
        assert!(matches!(
            run("PEP_STATUS || UBO_PERCENT"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn mixed_type_equality_is_false() {
        assert_eq!(run(r#"PEP_STATUS == "false""#), Ok(Value::Bool(false)));
        assert_eq!(run("PEP_STATUS == false"), Ok(Value::Bool(true)));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("7 % 4 + 2 * 3"), Ok(Value::Number(9.0)));
        assert_eq!(run("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(run(r#"lower("AbC") + "d""#), Ok(Value::from("abcd")));
        assert_eq!(run("abs(-2)"), Ok(Value::Number(2.0)));
    }

    #[test]
    fn compile_rejects_unknown_names() {
        let err = Program::compile("MISSING > 1", |_| false).unwrap_err();
        assert!(err.contains("unknown attribute MISSING"));

        let err = Program::compile("median(X)", |_| true).unwrap_err();
        assert!(err.contains("unknown function median"));

        let err = Program::compile("len(X, X)", |_| true).unwrap_err();
        assert!(err.contains("does not accept 2"));
    }

    #[test]
    fn compile_rejects_literal_type_mismatches() {
        let cases = [
            (r#""a" + 1"#, "cannot add string and number"),
            ("!3", "expected bool, got number"),
            (r#"-"x""#, "expected number, got string"),
            ("true && 1", "expected bool, got number"),
            (r#"1 < "2""#, "cannot compare number with string"),
            ("[1] < [2]", "cannot compare list with list"),
            ("1 in 2", "cannot test number in number"),
            (r#"2 * "x""#, "expected numbers, got string"),
            ("len(true)", "expected list or string, got bool"),
            (r#"abs("x") > 1"#, "expected number, got string"),
            (r#"max(1, "2")"#, "expected number, got string"),
            ("sum(1)", "expected list, got number"),
            ("lower(len(X)) == \"a\"", "expected string, got number"),
        ];
        for (src, want) in cases {
            let err = Program::compile(src, |_| true).unwrap_err();
            assert!(err.contains(want), "{src}: {err}");
        }
    }

    #[test]
    fn compile_leaves_attribute_types_to_evaluation() {
        for src in [
            r#"X + 1"#,
            r#""a" + X"#,
            "X && true",
            "X in Y",
            r#""ab" in X"#,
            "max(X) > 1",
            "len(X) + 1 > 2",
            r#"lower(X) == "a""#,
            r#""a" in "abc""#,
            "1 in [1, 2]",
        ] {
            assert!(Program::compile(src, |_| true).is_ok(), "{src}");
        }
        let env = env();
        let program = Program::compile("UBO_NAME + 1", |n| env.contains_key(n)).unwrap();
        assert!(matches!(
            program.run(&env),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn run_reports_undefined_attribute() {
        let program = Program::compile("A == true", |_| true).unwrap();
        assert_eq!(
            program.run(&Environment::new()),
            Err(EvalError::UndefinedAttribute("A".into()))
        );
        assert_eq!(program.references(), vec!["A"]);
        assert_eq!(program.source(), "A == true");
    }
}
