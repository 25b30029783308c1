use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::derived::DerivedData;
use super::rule_element::Phase;

/// Where a rule element failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticStage {
    /// The declaration was rejected; the element is a disabled stub.
    Construction,
    /// A value could not be resolved; the element was skipped for the pass.
    Resolution,
}

/// A contained rule element failure, kept in the finished snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Element id, `"<item-slug>#<rule-index>"`.
    pub element: String,
    pub key: String,
    pub stage: DiagnosticStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.element)?;
        if let Some(phase) = self.phase {
            write!(f, " [{phase}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Detailed preparation report returned by
/// [`CompiledCharacter::prepare_detailed()`](super::compiled::CompiledCharacter::prepare_detailed).
///
/// Holds the finished snapshot plus the elements that ran, the elements
/// whose predicate was false, the elements that failed, and the wall-clock
/// duration of the pass.
#[derive(Debug, Clone)]
#[must_use]
pub struct PreparationReport {
    data: DerivedData,
    executed: Vec<String>,
    skipped: Vec<String>,
    failed: Vec<String>,
    duration: Duration,
}

impl PreparationReport {
    pub(crate) fn new(
        data: DerivedData,
        executed: Vec<String>,
        skipped: Vec<String>,
        failed: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            data,
            executed,
            skipped,
            failed,
            duration,
        }
    }

    /// The finished snapshot, same as [`CompiledCharacter::prepare()`](super::compiled::CompiledCharacter::prepare).
    #[must_use]
    pub fn data(&self) -> &DerivedData {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> DerivedData {
        self.data
    }

    /// Ids of elements whose effects were applied, in execution order.
    #[must_use]
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Ids of elements skipped because their predicate was false or they
    /// were marked ignored.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Ids of elements that failed, at construction or at resolution.
    #[must_use]
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Wall-clock duration of the pass.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for PreparationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.name)?;
        write!(f, ", executed: [{}]", self.executed.join(", "))?;
        if !self.skipped.is_empty() {
            write!(f, ", skipped: [{}]", self.skipped.join(", "))?;
        }
        if !self.failed.is_empty() {
            write!(f, ", failed: [{}]", self.failed.join(", "))?;
        }
        write!(f, ", duration: {:?}", self.duration)
    }
}
