//! # S-Expression Reader
//!
//! Tokenizes snapshot text into a tree of atoms, quoted strings, and
//! lists. `;` starts a comment that runs to the end of the line.
//!
//! ```text
//! (kyc-case FUND-001            ──▶ List [ Atom "kyc-case", Atom "FUND-001",
//!   (nature-purpose                        List [ Atom "nature-purpose",
//!     (nature "Corporate")) ...)                  List [ Atom "nature", Str "Corporate" ] ] ... ]
//! ```

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_till, take_while1},
    character::complete::{char, multispace1},
    combinator::{all_consuming, cut, map, opt, value},
    error::{context, VerboseError},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// A node of the snapshot tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexpr {
    /// Bare token such as `kyc-case`, `FUND-001`, or `60%`.
    Atom(String),
    /// Double-quoted string, unescaped.
    Str(String),
    List(Vec<Sexpr>),
}

impl Sexpr {
    /// The atom text, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// Atom or string text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::Str(s) => Some(s),
            Self::List(_) => None,
        }
    }

    /// Head atom and remaining items of a list form.
    pub fn as_form(&self) -> Option<(&str, &[Sexpr])> {
        match self {
            Self::List(items) => match items.split_first() {
                Some((Self::Atom(head), rest)) => Some((head, rest)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Read every top-level form in `input`.
pub fn read_all(input: &str) -> Result<Vec<Sexpr>, String> {
    match all_consuming(delimited(trivia, many0(preceded(trivia, datum)), trivia))(input) {
        Ok((_, forms)) => Ok(forms),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete input".to_string()),
    }
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';')
}

fn comment(input: &str) -> PResult<'_, ()> {
    value((), pair(char(';'), take_till(|c| c == '\n')))(input)
}

/// Whitespace and comments.
fn trivia(input: &str) -> PResult<'_, ()> {
    value((), many0(alt((value((), multispace1), comment))))(input)
}

fn atom(input: &str) -> PResult<'_, Sexpr> {
    map(take_while1(is_atom_char), |s: &str| Sexpr::Atom(s.to_string()))(input)
}

fn string(input: &str) -> PResult<'_, Sexpr> {
    let body = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            value("\\", char('\\')),
            value("\"", char('"')),
            value("\n", char('n')),
        )),
    );
    map(
        delimited(char('"'), opt(body), context("closing quote", cut(char('"')))),
        |s: Option<String>| Sexpr::Str(s.unwrap_or_default()),
    )(input)
}

fn list(input: &str) -> PResult<'_, Sexpr> {
    map(
        delimited(
            char('('),
            many0(preceded(trivia, datum)),
            preceded(trivia, context("closing parenthesis", cut(char(')')))),
        ),
        Sexpr::List,
    )(input)
}

fn datum(input: &str) -> PResult<'_, Sexpr> {
    alt((list, string, atom))(input)
}

/// Quote `s` for writing back into a snapshot.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Sexpr {
        Sexpr::Atom(s.to_string())
    }

    #[test]
    fn reads_nested_forms() {
        let forms = read_all("(kyc-case X (nature \"Corp\") (policy P-1))").unwrap();
        assert_eq!(
            forms,
            vec![Sexpr::List(vec![
                atom("kyc-case"),
                atom("X"),
                Sexpr::List(vec![atom("nature"), Sexpr::Str("Corp".to_string())]),
                Sexpr::List(vec![atom("policy"), atom("P-1")]),
            ])]
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "; header\n\n(a b) ; trailing\n; another\n(c)\n\n";
        let forms = read_all(text).unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1], Sexpr::List(vec![atom("c")]));
    }

    #[test]
    fn percent_atoms_and_escapes() {
        let forms = read_all(r#"(owner HOLDCO 100%) "say \"hi\"" """#).unwrap();
        assert_eq!(
            forms[0],
            Sexpr::List(vec![atom("owner"), atom("HOLDCO"), atom("100%")])
        );
        assert_eq!(forms[1], Sexpr::Str("say \"hi\"".to_string()));
        assert_eq!(forms[2], Sexpr::Str(String::new()));
    }

    #[test]
    fn quote_escapes_round_trip() {
        let raw = "a \"quoted\" \\ value";
        let forms = read_all(&quote(raw)).unwrap();
        assert_eq!(forms, vec![Sexpr::Str(raw.to_string())]);
    }

    #[test]
    fn rejects_unbalanced_input() {
        assert!(read_all("(kyc-case X").is_err());
        assert!(read_all("(a))").is_err());
        assert!(read_all("(a \"open)").is_err());
    }

    #[test]
    fn empty_input_has_no_forms() {
        assert!(read_all("").unwrap().is_empty());
        assert!(read_all("  ; only a comment").unwrap().is_empty());
    }

    #[test]
    fn as_form_splits_head() {
        let forms = read_all("(policy P-1)").unwrap();
        let (head, rest) = forms[0].as_form().unwrap();
        assert_eq!(head, "policy");
        assert_eq!(rest[0].as_atom(), Some("P-1"));
        assert!(Sexpr::Str("x".into()).as_form().is_none());
    }
}
