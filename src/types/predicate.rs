use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};

use super::error::PredicateError;
use super::value::Value;

/// Numeric comparison operators usable against numeric roll options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn key(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "eq" => CompareOp::Eq,
            "gt" => CompareOp::Gt,
            "gte" => CompareOp::Gte,
            "lt" => CompareOp::Lt,
            "lte" => CompareOp::Lte,
            _ => return None,
        })
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

/// Right-hand side of a numeric comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal number.
    Number(Value),
    /// Another numeric roll option prefix, compared value-to-value.
    Option(String),
}

/// One node of a predicate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Holds when the roll option is present.
    Atom(String),
    And(Vec<Statement>),
    Or(Vec<Statement>),
    Nor(Vec<Statement>),
    Nand(Vec<Statement>),
    Not(Box<Statement>),
    /// Holds when a numeric roll option `"<option>:<n>"` satisfies `op`.
    Compare {
        option: String,
        op: CompareOp,
        operand: Operand,
    },
}

/// A conjunction of statements over roll options. The empty predicate
/// always holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    statements: Vec<Statement>,
}

impl Predicate {
    /// The always-true predicate.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Shorthand for a predicate requiring every listed option.
    #[must_use]
    pub fn all<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            options
                .into_iter()
                .map(|o| Statement::Atom(o.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Parse the JSON authoring form: an array of statements, or a string in
    /// the text form accepted by [`parse_predicate`](crate::parse::parse_predicate).
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError`] when the structure is malformed.
    pub fn from_json(json: &Json) -> Result<Self, PredicateError> {
        match json {
            Json::Null => Ok(Self::always()),
            Json::Array(items) => Ok(Self::new(
                items
                    .iter()
                    .map(statement_from_json)
                    .collect::<Result<_, _>>()?,
            )),
            Json::String(text) => crate::parse::parse_predicate(text)
                .map_err(|e| PredicateError::Syntax(e.to_string())),
            other => Err(PredicateError::NotAList(other.to_string())),
        }
    }

    /// Render back to the JSON authoring form.
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Array(self.statements.iter().map(statement_to_json).collect())
    }
}

fn statement_from_json(json: &Json) -> Result<Statement, PredicateError> {
    match json {
        Json::String(option) => Ok(Statement::Atom(option.clone())),
        Json::Object(map) if map.len() == 1 => {
            let (key, body) = map.iter().next().ok_or(PredicateError::EmptyObject)?;
            let list = |body: &Json| -> Result<Vec<Statement>, PredicateError> {
                match body {
                    Json::Array(items) => items.iter().map(statement_from_json).collect(),
                    other => Err(PredicateError::ExpectedList {
                        operator: key.clone(),
                        found: other.to_string(),
                    }),
                }
            };
            match key.as_str() {
                "and" => Ok(Statement::And(list(body)?)),
                "or" => Ok(Statement::Or(list(body)?)),
                "nor" => Ok(Statement::Nor(list(body)?)),
                "nand" => Ok(Statement::Nand(list(body)?)),
                "not" => match body {
                    Json::Array(_) => Err(PredicateError::NotExpectsStatement(body.to_string())),
                    inner => Ok(Statement::Not(Box::new(statement_from_json(inner)?))),
                },
                op_key => match CompareOp::from_key(op_key) {
                    Some(op) => compare_from_json(op, body),
                    // Unknown operators read as a plain required tag.
                    None => Ok(Statement::Atom(op_key.to_owned())),
                },
            }
        }
        Json::Object(map) if map.is_empty() => Err(PredicateError::EmptyObject),
        Json::Object(map) => Err(PredicateError::MultipleOperators(
            map.keys().cloned().collect::<Vec<_>>().join(", "),
        )),
        other => Err(PredicateError::InvalidStatement(other.to_string())),
    }
}

fn compare_from_json(op: CompareOp, body: &Json) -> Result<Statement, PredicateError> {
    let malformed = || PredicateError::MalformedComparison {
        operator: op.key().to_owned(),
        found: body.to_string(),
    };
    let [left, right] = body.as_array().map(Vec::as_slice).ok_or_else(malformed)? else {
        return Err(malformed());
    };
    let option = left.as_str().ok_or_else(malformed)?.to_owned();
    let operand = match right {
        Json::String(other) => Operand::Option(other.clone()),
        Json::Number(n) => Operand::Number(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(malformed)?),
        }),
        _ => return Err(malformed()),
    };
    Ok(Statement::Compare { option, op, operand })
}

fn statement_to_json(statement: &Statement) -> Json {
    let single = |key: &str, body: Json| {
        let mut map = Map::new();
        map.insert(key.to_owned(), body);
        Json::Object(map)
    };
    let list = |items: &[Statement]| Json::Array(items.iter().map(statement_to_json).collect());
    match statement {
        Statement::Atom(option) => Json::String(option.clone()),
        Statement::And(items) => single("and", list(items)),
        Statement::Or(items) => single("or", list(items)),
        Statement::Nor(items) => single("nor", list(items)),
        Statement::Nand(items) => single("nand", list(items)),
        Statement::Not(inner) => single("not", statement_to_json(inner)),
        Statement::Compare {
            option,
            op,
            operand,
        } => {
            let right = match operand {
                Operand::Option(other) => Json::String(other.clone()),
                Operand::Number(Value::Int(i)) => Json::from(*i),
                Operand::Number(v) => serde_json::to_value(v).unwrap_or(Json::Null),
            };
            single(op.key(), Json::Array(vec![Json::String(option.clone()), right]))
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Predicate::from_json(&json).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, items: &[Statement], sep: &str| {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, ")")
        };
        match self {
            Statement::Atom(option) => write!(f, "{option}"),
            Statement::And(items) => join(f, items, "AND"),
            Statement::Or(items) => join(f, items, "OR"),
            Statement::Nor(items) => {
                write!(f, "(NOT ")?;
                join(f, items, "OR")?;
                write!(f, ")")
            }
            Statement::Nand(items) => {
                write!(f, "(NOT ")?;
                join(f, items, "AND")?;
                write!(f, ")")
            }
            Statement::Not(inner) => write!(f, "(NOT {inner})"),
            Statement::Compare {
                option,
                op,
                operand: Operand::Number(v),
            } => write!(f, "({option} {op} {v})"),
            Statement::Compare {
                option,
                op,
                operand: Operand::Option(other),
            } => write!(f, "({option} {op} {other})"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return write!(f, "(always)");
        }
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl Statement {
    #[must_use]
    pub fn and(self, other: Statement) -> Statement {
        match self {
            Statement::And(mut items) => {
                items.push(other);
                Statement::And(items)
            }
            first => Statement::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Statement) -> Statement {
        match self {
            Statement::Or(mut items) => {
                items.push(other);
                Statement::Or(items)
            }
            first => Statement::Or(vec![first, other]),
        }
    }
}

impl Not for Statement {
    type Output = Statement;

    fn not(self) -> Statement {
        Statement::Not(Box::new(self))
    }
}

impl From<Statement> for Predicate {
    fn from(statement: Statement) -> Self {
        Predicate::new(vec![statement])
    }
}

/// Intermediate builder for numeric comparisons against a roll option prefix.
/// Created by [`numeric()`].
#[derive(Debug, Clone)]
pub struct NumericOption {
    prefix: String,
}

impl NumericOption {
    fn cmp(self, op: CompareOp, value: impl Into<Value>) -> Statement {
        Statement::Compare {
            option: self.prefix,
            op,
            operand: Operand::Number(value.into()),
        }
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Statement {
        self.cmp(CompareOp::Eq, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Statement {
        self.cmp(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Statement {
        self.cmp(CompareOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Statement {
        self.cmp(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Statement {
        self.cmp(CompareOp::Lte, value)
    }
}

/// A statement requiring one roll option.
#[must_use]
pub fn option(tag: &str) -> Statement {
    Statement::Atom(tag.to_owned())
}

/// Start a numeric comparison on roll options shaped `"<prefix>:<n>"`.
#[must_use]
pub fn numeric(prefix: &str) -> NumericOption {
    NumericOption {
        prefix: prefix.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builder_chains_flatten() {
        let s = option("a").and(option("b")).and(option("c"));
        assert_eq!(
            s,
            Statement::And(vec![option("a"), option("b"), option("c")])
        );
        let s = option("a").or(option("b"));
        assert!(matches!(s, Statement::Or(ref items) if items.len() == 2));
    }

    #[test]
    fn not_builds_negation() {
        assert!(matches!(!option("x"), Statement::Not(_)));
    }

    #[test]
    fn numeric_builder() {
        assert_eq!(
            numeric("self:level").gte(5_i64),
            Statement::Compare {
                option: "self:level".into(),
                op: CompareOp::Gte,
                operand: Operand::Number(Value::Int(5)),
            }
        );
    }

    #[test]
    fn from_json_full_grammar() {
        let p = Predicate::from_json(&json!([
            "a",
            {"or": ["b", "c"]},
            {"not": "d"},
            {"nor": ["e"]},
            {"nand": ["f", "g"]},
            {"and": ["h"]},
            {"gte": ["self:level", 5]},
            {"lt": ["self:level", "target:level"]}
        ]))
        .unwrap();
        assert_eq!(p.statements().len(), 8);
        assert_eq!(p.statements()[0], option("a"));
        assert!(matches!(
            &p.statements()[7],
            Statement::Compare { operand: Operand::Option(o), .. } if o == "target:level"
        ));
    }

    #[test]
    fn null_is_always() {
        assert!(Predicate::from_json(&Json::Null).unwrap().is_empty());
    }

    #[test]
    fn unknown_operator_is_required_tag() {
        let p = Predicate::from_json(&json!([{"flanked": true}])).unwrap();
        assert_eq!(p.statements(), &[option("flanked")]);
    }

    #[test]
    fn malformed_structures_are_rejected() {
        assert!(matches!(
            Predicate::from_json(&json!(5)),
            Err(PredicateError::NotAList(_))
        ));
        assert!(matches!(
            Predicate::from_json(&json!([5])),
            Err(PredicateError::InvalidStatement(_))
        ));
        assert!(matches!(
            Predicate::from_json(&json!([{"or": "a"}])),
            Err(PredicateError::ExpectedList { .. })
        ));
        assert!(matches!(
            Predicate::from_json(&json!([{"not": ["a"]}])),
            Err(PredicateError::NotExpectsStatement(_))
        ));
        assert!(matches!(
            Predicate::from_json(&json!([{"gte": ["a"]}])),
            Err(PredicateError::MalformedComparison { .. })
        ));
        assert!(matches!(
            Predicate::from_json(&json!([{"a": 1, "b": 2}])),
            Err(PredicateError::MultipleOperators(_))
        ));
        assert!(matches!(
            Predicate::from_json(&json!([{}])),
            Err(PredicateError::EmptyObject)
        ));
    }

    #[test]
    fn json_round_trip_preserves_tree() {
        let source = json!(["a", {"or": ["b", {"not": "c"}]}, {"gt": ["self:level", 3]}]);
        let p = Predicate::from_json(&source).unwrap();
        assert_eq!(p.to_json(), source);
    }

    #[test]
    fn text_form_is_accepted() {
        let p = Predicate::from_json(&json!("a AND NOT b")).unwrap();
        assert_eq!(p.statements(), &[option("a"), !option("b")]);
    }

    #[test]
    fn display() {
        let p = Predicate::new(vec![option("a"), option("b").or(!option("c"))]);
        assert_eq!(p.to_string(), "a AND (b OR (NOT c))");
        assert_eq!(Predicate::always().to_string(), "(always)");
    }
}
