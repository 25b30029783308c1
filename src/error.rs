use thiserror::Error;

use crate::parse::ParseError;
use crate::types::{FormulaError, PredicateError, ResolveError, RuleElementError};

/// Unified error type covering parsing, resolution, and I/O.
///
/// Returned by convenience loaders like [`Character::from_file()`](crate::Character::from_file)
/// and [`Settings::from_file()`](crate::Settings::from_file).
#[derive(Debug, Error)]
pub enum RulesError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    RuleElement(#[from] RuleElementError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
