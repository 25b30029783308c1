use std::fmt;

use crate::dice::DiceRoller;
use crate::resolve::truncate;
use crate::stacking::{self, StackingResult};
use crate::types::{FormulaError, Modifier, RollOptionSet, Statistic};

/// A pending roll against one statistic. Toggling re-stacks cloned
/// modifiers; the snapshot it came from is never touched.
#[derive(Debug, Clone)]
pub struct Check {
    selector: String,
    base: i64,
    modifiers: Vec<Modifier>,
    options: RollOptionSet,
    die: String,
    result: StackingResult,
}

/// The realised outcome of a committed [`Check`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRoll {
    pub selector: String,
    /// The formula handed to the dice subsystem, e.g. `"1d20 + 4"`.
    pub formula: String,
    pub total: i64,
    pub breakdown: Vec<Modifier>,
}

impl fmt::Display for CheckRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.selector, self.formula, self.total)
    }
}

impl Check {
    /// Build a check from a finished statistic. `options` must already hold
    /// every option the roll sees.
    #[must_use]
    pub fn new(statistic: &Statistic, options: RollOptionSet, die: &str) -> Self {
        let modifiers = statistic.modifiers.clone();
        let result = stacking::resolve(&modifiers, &options);
        Self {
            selector: statistic.selector.clone(),
            base: statistic.base,
            modifiers,
            options,
            die: die.to_owned(),
            result,
        }
    }

    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Every modifier of the check, including hidden ones.
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Modifiers shown to the user, with their positions in [`modifiers`](Self::modifiers).
    pub fn visible(&self) -> impl Iterator<Item = (usize, &Modifier)> {
        self.modifiers.iter().enumerate().filter(|(_, m)| !m.hidden)
    }

    #[must_use]
    pub fn options(&self) -> &RollOptionSet {
        &self.options
    }

    /// Enable or disable the modifier at `index`. Returns `false`, leaving
    /// the check unchanged, when the index is out of range or the modifier is
    /// hidden or forced.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        let Some(modifier) = self.modifiers.get_mut(index) else {
            return false;
        };
        if !modifier.is_toggleable() {
            return false;
        }
        if modifier.enabled != enabled {
            modifier.enabled = enabled;
            self.result = stacking::resolve(&self.modifiers, &self.options);
        }
        true
    }

    /// Flip the modifier at `index`. See [`set_enabled`](Self::set_enabled).
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.modifiers.get(index) {
            Some(m) => {
                let enabled = !m.enabled;
                self.set_enabled(index, enabled)
            }
            None => false,
        }
    }

    /// Toggle the first visible modifier whose slug or label matches `name`.
    pub fn toggle_named(&mut self, name: &str) -> bool {
        let found = self
            .visible()
            .find(|(_, m)| m.slug.as_deref() == Some(name) || m.source == name)
            .map(|(i, _)| i);
        found.is_some_and(|i| self.toggle(i))
    }

    /// Stacked modifier total.
    #[must_use]
    pub fn modifier(&self) -> i64 {
        self.result.total
    }

    /// Base plus stacked modifiers.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.base.saturating_add(self.result.total)
    }

    #[must_use]
    pub fn breakdown(&self) -> &[Modifier] {
        &self.result.breakdown
    }

    /// Explanation of the stacked modifiers, e.g. `"Flanking +2, Rage +3"`.
    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.result.formula
    }

    /// Dice formula for the roll, e.g. `"1d20 + 4"`.
    #[must_use]
    pub fn formula(&self) -> String {
        match self.total() {
            0 => self.die.clone(),
            t if t < 0 => format!("{} - {}", self.die, t.unsigned_abs()),
            t => format!("{} + {t}", self.die),
        }
    }

    /// Hand the formula to the dice subsystem and consume the check.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError`] if the configured die expression is malformed
    /// or the rolled total does not fit in an `i64`.
    pub fn commit(self, roller: &dyn DiceRoller) -> Result<CheckRoll, FormulaError> {
        let formula = self.formula();
        let rolled = roller.evaluate_formula(&formula)?;
        let total = truncate(rolled).ok_or(FormulaError::OutOfRange(rolled))?;
        tracing::debug!(selector = %self.selector, %formula, total, "check committed");
        Ok(CheckRoll {
            selector: self.selector,
            formula,
            total,
            breakdown: self.result.breakdown,
        })
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector, self.formula())?;
        if !self.result.formula.is_empty() {
            write!(f, " ({})", self.result.formula)?;
        }
        Ok(())
    }
}
