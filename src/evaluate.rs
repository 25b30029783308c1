use crate::types::{Operand, Predicate, RollOptionSet, Statement, Value};

/// Test a predicate against a set of roll options.
///
/// Every top-level statement must hold; the empty predicate always holds.
/// Evaluation is pure and total: a malformed comparison (for example a
/// numeric option that is not present) is simply false.
#[must_use]
pub fn test(predicate: &Predicate, options: &RollOptionSet) -> bool {
    predicate
        .statements()
        .iter()
        .all(|statement| eval_statement(statement, options))
}

fn eval_statement(statement: &Statement, options: &RollOptionSet) -> bool {
    match statement {
        Statement::Atom(option) => options.contains(option),
        Statement::And(items) => items.iter().all(|s| eval_statement(s, options)),
        Statement::Or(items) => items.iter().any(|s| eval_statement(s, options)),
        Statement::Nor(items) => !items.iter().any(|s| eval_statement(s, options)),
        Statement::Nand(items) => !items.iter().all(|s| eval_statement(s, options)),
        Statement::Not(inner) => !eval_statement(inner, options),
        Statement::Compare {
            option,
            op,
            operand,
        } => {
            let left = options.numeric_values(option);
            match operand {
                Operand::Number(right) => left
                    .iter()
                    .any(|&l| Value::Int(l).compare(*op, right).unwrap_or(false)),
                Operand::Option(other) => {
                    let right = options.numeric_values(other);
                    left.iter().any(|&l| {
                        right
                            .iter()
                            .any(|&r| Value::Int(l).compare(*op, &Value::Int(r)) == Some(true))
                    })
                }
            }
        }
    }
}
