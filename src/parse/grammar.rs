use winnow::combinator::{alt, cut_err, delimited, opt, peek, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::types::{CompareOp, Operand, Predicate, Statement, Value};

// -- Whitespace & comments --------------------------------------------------

pub(super) fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', winnow::ascii::till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

/// A keyword that must be followed by whitespace or an opening parenthesis,
/// so `NOT` never swallows the start of an option like `notable`.
fn keyword<'i>(
    upper: &'static str,
    lower: &'static str,
) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    terminated(
        alt((upper, lower)),
        peek(one_of(|c: char| c.is_ascii_whitespace() || c == '(')),
    )
}

// -- Roll options -----------------------------------------------------------

fn roll_option<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
        }),
    )
        .take()
        .parse_next(input)
}

// -- Comparison operands ----------------------------------------------------

fn number(input: &mut &str) -> ModalResult<Value> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .parse_next(input)?;
    if text.contains('.') {
        let f: f64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Float(f))
    } else {
        let i: i64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Int(i))
    }
}

fn operand(input: &mut &str) -> ModalResult<Operand> {
    ws.parse_next(input)?;
    alt((
        number.map(Operand::Number),
        roll_option.map(|o: &str| Operand::Option(o.to_owned())),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "number or roll option",
    )))
    .parse_next(input)
}

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
    ))
    .parse_next(input)
}

// -- Statements (precedence: OR < AND < NOT < primary) ----------------------

fn primary(input: &mut &str) -> ModalResult<Statement> {
    ws.parse_next(input)?;
    alt((
        delimited('(', statement, (ws, cut_err(')'))),
        comparison_or_option,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "statement",
    )))
    .parse_next(input)
}

fn comparison_or_option(input: &mut &str) -> ModalResult<Statement> {
    let name = roll_option.parse_next(input)?;
    let checkpoint = input.checkpoint();
    if let Ok(op) = compare_op.parse_next(input) {
        let operand = cut_err(operand).parse_next(input)?;
        Ok(Statement::Compare {
            option: name.to_owned(),
            op,
            operand,
        })
    } else {
        input.reset(&checkpoint);
        Ok(Statement::Atom(name.to_owned()))
    }
}

fn unary(input: &mut &str) -> ModalResult<Statement> {
    ws.parse_next(input)?;
    if opt(keyword("NOT", "not")).parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Statement::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_statement(input: &mut &str) -> ModalResult<Statement> {
    let first = unary(input)?;
    let rest: Vec<Statement> =
        repeat(0.., preceded((ws, keyword("AND", "and")), cut_err(unary))).parse_next(input)?;
    Ok(rest.into_iter().fold(first, Statement::and))
}

fn or_statement(input: &mut &str) -> ModalResult<Statement> {
    let first = and_statement(input)?;
    let rest: Vec<Statement> = repeat(
        0..,
        preceded((ws, keyword("OR", "or")), cut_err(and_statement)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, Statement::or))
}

fn statement(input: &mut &str) -> ModalResult<Statement> {
    ws.parse_next(input)?;
    or_statement(input)
}

// -- Top-level parser -------------------------------------------------------

/// A whole predicate. A top-level conjunction becomes the predicate's
/// statement list; blank input is the always-true predicate.
pub fn parse_predicate(input: &mut &str) -> ModalResult<Predicate> {
    ws.parse_next(input)?;
    if input.is_empty() {
        return Ok(Predicate::always());
    }
    let root = statement.parse_next(input)?;
    ws.parse_next(input)?;
    Ok(match root {
        Statement::And(items) => Predicate::new(items),
        single => Predicate::new(vec![single]),
    })
}
