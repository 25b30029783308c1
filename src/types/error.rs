use thiserror::Error;

/// A predicate whose structure cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("predicate must be a list of statements, found {0}")]
    NotAList(String),

    #[error("invalid predicate statement {0}")]
    InvalidStatement(String),

    #[error("predicate statement object has no operator")]
    EmptyObject,

    #[error("predicate statement has more than one operator: {0}")]
    MultipleOperators(String),

    #[error("operator '{operator}' expects a list of statements, found {found}")]
    ExpectedList { operator: String, found: String },

    #[error("operator 'not' expects a single statement, found {0}")]
    NotExpectsStatement(String),

    #[error("operator '{operator}' expects [option, number-or-option], found {found}")]
    MalformedComparison { operator: String, found: String },

    #[error("predicate syntax error: {0}")]
    Syntax(String),
}

/// A formula that cannot be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula syntax error in '{formula}': {message}")]
    Syntax { formula: String, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("invalid dice term '{0}'")]
    InvalidDice(String),

    #[error("formula produced a non-finite result")]
    NonFinite,

    #[error("formula result {0} is out of range for a whole number")]
    OutOfRange(f64),
}

/// A declared value that could not be resolved against the draft.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("cannot evaluate formula '{formula}': {source}")]
    Formula {
        formula: String,
        #[source]
        source: FormulaError,
    },

    #[error("value {0} is not numeric")]
    NotNumeric(String),

    #[error("value {0} is out of range for a whole number")]
    OutOfRange(String),
}

/// A rule element declaration that fails validation at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleElementError {
    #[error("rule element declaration must be an object, found {0}")]
    NotAnObject(String),

    #[error("rule element declaration has no 'key'")]
    MissingKey,

    #[error("unknown rule element key '{0}'")]
    UnknownKind(String),

    #[error("{kind} is missing required field '{field}'")]
    MissingField { kind: String, field: &'static str },

    #[error("{kind} has invalid field '{field}': {reason}")]
    InvalidField {
        kind: String,
        field: &'static str,
        reason: String,
    },

    #[error("invalid predicate: {0}")]
    Predicate(#[from] PredicateError),
}
