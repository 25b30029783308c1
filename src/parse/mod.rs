mod error;
mod formula;
mod grammar;

pub use error::ParseError;
pub use formula::{BinaryOp, FormulaExpr};

use crate::types::{FormulaError, Predicate};

/// Parse the text form of a predicate, e.g. `"self:level >= 5 AND NOT target:undead"`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid predicate syntax.
pub fn parse_predicate(input: &str) -> Result<Predicate, ParseError> {
    use winnow::Parser;
    grammar::parse_predicate
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

/// Parse an arithmetic/dice formula such as `"max(1, @details.level / 2) + 1d4"`.
///
/// # Errors
///
/// Returns [`FormulaError::Syntax`] if the input is not a valid formula.
pub fn parse_formula(input: &str) -> Result<FormulaExpr, FormulaError> {
    use winnow::Parser;
    formula::parse_formula
        .parse(input)
        .map_err(|e| FormulaError::Syntax {
            formula: input.to_owned(),
            message: e.to_string(),
        })
}
