use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::EvaluationContext;
use super::modifier::Modifier;
use super::properties::PropertyTree;
use super::report::Diagnostic;
use super::roll_options::RollOptionSet;
use crate::check::Check;
use crate::stacking;

/// Roll option domain whose options join the pass-wide option set.
pub const ALL_DOMAIN: &str = "all";

/// One aggregated selector: its base value, every modifier declared for it,
/// and the stacked result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub selector: String,
    pub base: i64,
    /// Full modifier list, including suppressed and disabled modifiers.
    pub modifiers: Vec<Modifier>,
    /// Stacked modifier total.
    pub modifier: i64,
    /// `base + modifier`.
    pub total: i64,
    pub breakdown: Vec<Modifier>,
    pub formula: String,
}

impl Statistic {
    /// Stack `modifiers` against `options` and fold in the base value.
    #[must_use]
    pub fn resolve(
        selector: &str,
        base: i64,
        modifiers: Vec<Modifier>,
        options: &RollOptionSet,
    ) -> Self {
        let result = stacking::resolve(&modifiers, options);
        Self {
            selector: selector.to_owned(),
            base,
            modifiers,
            modifier: result.total,
            total: base.saturating_add(result.total),
            breakdown: result.breakdown,
            formula: result.formula,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:+}", self.selector, self.total)?;
        if !self.formula.is_empty() {
            write!(f, " (base {}, {})", self.base, self.formula)?;
        }
        Ok(())
    }
}

/// The finished, immutable result of one preparation pass.
///
/// Every map is ordered, so the serialized form is identical for identical
/// input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedData {
    pub name: String,
    pub properties: PropertyTree,
    /// Options of the `all` domain at the end of the pass.
    pub roll_options: RollOptionSet,
    /// Options kept aside for checks against one selector.
    pub domain_options: BTreeMap<String, RollOptionSet>,
    pub statistics: BTreeMap<String, Statistic>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DerivedData {
    #[must_use]
    pub fn statistic(&self, selector: &str) -> Option<&Statistic> {
        self.statistics.get(selector)
    }

    /// Total of a statistic, if the selector was aggregated.
    #[must_use]
    pub fn total(&self, selector: &str) -> Option<i64> {
        self.statistic(selector).map(|s| s.total)
    }

    /// The options visible to a check against `selector`: the `all` domain
    /// plus that selector's own domain.
    #[must_use]
    pub fn options_for(&self, selector: &str) -> RollOptionSet {
        let mut options = self.roll_options.clone();
        if let Some(domain) = self.domain_options.get(selector) {
            options.extend_from(domain);
        }
        options
    }

    /// Open a check against `selector` with roll-specific options.
    ///
    /// Returns `None` when the selector was never aggregated.
    #[must_use]
    pub fn check(
        &self,
        selector: &str,
        roll_options: &RollOptionSet,
        ctx: &EvaluationContext,
    ) -> Option<Check> {
        let statistic = self.statistic(selector)?;
        let mut options = self.options_for(selector);
        options.extend_from(roll_options);
        Some(Check::new(statistic, options, &ctx.settings().check_die))
    }
}
