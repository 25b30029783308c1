use std::fmt;

use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{take, take_while};

use super::grammar::ws;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        })
    }
}

/// Parsed arithmetic/dice formula. Aliases stay symbolic until evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    Number(f64),
    /// `@path` reference into the draft.
    Alias(String),
    /// `NdM`; the count may itself be an expression, as in `(@details.level)d6`.
    Dice {
        count: Box<FormulaExpr>,
        faces: u32,
    },
    Neg(Box<FormulaExpr>),
    Binary {
        op: BinaryOp,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    Call {
        function: String,
        args: Vec<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Whether evaluating this formula consults the dice subsystem.
    #[must_use]
    pub fn has_dice(&self) -> bool {
        match self {
            FormulaExpr::Number(_) | FormulaExpr::Alias(_) => false,
            FormulaExpr::Dice { .. } => true,
            FormulaExpr::Neg(inner) => inner.has_dice(),
            FormulaExpr::Binary { left, right, .. } => left.has_dice() || right.has_dice(),
            FormulaExpr::Call { args, .. } => args.iter().any(FormulaExpr::has_dice),
        }
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{n}"),
            FormulaExpr::Alias(path) => write!(f, "@{path}"),
            FormulaExpr::Dice { count, faces } => match count.as_ref() {
                FormulaExpr::Number(n) => write!(f, "{n}d{faces}"),
                other => write!(f, "({other})d{faces}"),
            },
            FormulaExpr::Neg(inner) => write!(f, "-{inner}"),
            FormulaExpr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            FormulaExpr::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// -- Atoms ------------------------------------------------------------------

fn digits<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<FormulaExpr> {
    (digits, opt(('.', digits)))
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .map(FormulaExpr::Number)
        .parse_next(input)
}

fn faces(input: &mut &str) -> ModalResult<u32> {
    preceded(alt(('d', 'D')), digits.try_map(|s: &str| s.parse::<u32>()))
    .context(StrContext::Expected(StrContextValue::Description(
        "die size",
    )))
    .parse_next(input)
}

/// Length of an alias path at the start of `s`. A `-` belongs to the path
/// only when a letter follows, so `@a-b` is a path but `@a-1` is a subtraction.
fn alias_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut len = 0;
    while len < bytes.len() {
        let c = bytes[len];
        let keep = c.is_ascii_alphanumeric()
            || c == b'_'
            || (c == b'.' && bytes.get(len + 1).is_some_and(u8::is_ascii_alphanumeric))
            || (c == b'-' && bytes.get(len + 1).is_some_and(u8::is_ascii_alphabetic));
        if !keep {
            break;
        }
        len += 1;
    }
    len
}

fn alias(input: &mut &str) -> ModalResult<FormulaExpr> {
    '@'.parse_next(input)?;
    let len = alias_len(input);
    if len == 0 {
        return Err(ErrMode::from_input(input).cut());
    }
    let path: &str = take(len).parse_next(input)?;
    Ok(FormulaExpr::Alias(path.to_owned()))
}

fn call(input: &mut &str) -> ModalResult<FormulaExpr> {
    let name = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    let args: Vec<FormulaExpr> = delimited(
        (ws, '('),
        cut_err(separated(1.., expr, (ws, ','))),
        (ws, cut_err(')')),
    )
    .parse_next(input)?;
    Ok(FormulaExpr::Call {
        function: name.to_ascii_lowercase(),
        args,
    })
}

fn atom(input: &mut &str) -> ModalResult<FormulaExpr> {
    ws.parse_next(input)?;
    let base = alt((
        delimited('(', expr, (ws, cut_err(')'))),
        number,
        // A bare `dM` rolls one die.
        faces.map(|faces| FormulaExpr::Dice {
            count: Box::new(FormulaExpr::Number(1.0)),
            faces,
        }),
        alias,
        call,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "number, dice, alias, or function call",
    )))
    .parse_next(input)?;

    if matches!(base, FormulaExpr::Dice { .. }) {
        return Ok(base);
    }
    match opt(faces).parse_next(input)? {
        Some(faces) => Ok(FormulaExpr::Dice {
            count: Box::new(base),
            faces,
        }),
        None => Ok(base),
    }
}

// -- Operators (precedence: +- < */ < unary) --------------------------------

fn unary(input: &mut &str) -> ModalResult<FormulaExpr> {
    ws.parse_next(input)?;
    if opt('-').parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        return Ok(FormulaExpr::Neg(Box::new(inner)));
    }
    if opt('+').parse_next(input)?.is_some() {
        return cut_err(unary).parse_next(input);
    }
    atom(input)
}

fn fold_binary(first: FormulaExpr, rest: Vec<(BinaryOp, FormulaExpr)>) -> FormulaExpr {
    rest.into_iter()
        .fold(first, |left, (op, right)| FormulaExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn term(input: &mut &str) -> ModalResult<FormulaExpr> {
    let first = unary(input)?;
    let rest: Vec<(BinaryOp, FormulaExpr)> = repeat(
        0..,
        (
            preceded(ws, alt(('*'.value(BinaryOp::Mul), '/'.value(BinaryOp::Div)))),
            cut_err(unary),
        ),
    )
    .parse_next(input)?;
    Ok(fold_binary(first, rest))
}

fn expr(input: &mut &str) -> ModalResult<FormulaExpr> {
    let first = term(input)?;
    let rest: Vec<(BinaryOp, FormulaExpr)> = repeat(
        0..,
        (
            preceded(ws, alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub)))),
            cut_err(term),
        ),
    )
    .parse_next(input)?;
    Ok(fold_binary(first, rest))
}

/// A complete formula, including trailing whitespace.
pub fn parse_formula(input: &mut &str) -> ModalResult<FormulaExpr> {
    let formula = expr.parse_next(input)?;
    ws.parse_next(input)?;
    Ok(formula)
}
