use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The set of contextual tags ("roll options") true for one evaluation.
///
/// Iteration is ordered so that snapshots built from the same input
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollOptionSet {
    options: BTreeSet<String>,
}

impl RollOptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, returning `true` if it was not already present.
    pub fn insert(&mut self, option: impl Into<String>) -> bool {
        self.options.insert(option.into())
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, option: impl Into<String>) -> Self {
        self.insert(option);
        self
    }

    /// Remove an option, returning `true` if it was present.
    pub fn remove(&mut self, option: &str) -> bool {
        self.options.remove(option)
    }

    #[must_use]
    pub fn contains(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(String::as_str)
    }

    /// Merge every option of `other` into this set.
    pub fn extend_from(&mut self, other: &RollOptionSet) {
        self.options.extend(other.options.iter().cloned());
    }

    /// Integer suffixes of every option shaped `"<prefix>:<int>"`.
    ///
    /// `numeric_values("self:level")` on `{"self:level:5"}` yields `[5]`.
    #[must_use]
    pub fn numeric_values(&self, prefix: &str) -> Vec<i64> {
        let lower = format!("{prefix}:");
        self.options
            .range(lower.clone()..)
            .take_while(|o| o.starts_with(&lower))
            .filter_map(|o| o[lower.len()..].parse::<i64>().ok())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for RollOptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for RollOptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, option) in self.options.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{option}")?;
        }
        write!(f, "}}")
    }
}
