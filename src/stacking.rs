use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Modifier, ModifierType, RollOptionSet};

/// Outcome of stacking one selector's modifiers for a given set of roll options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackingResult {
    pub total: i64,
    /// Surviving modifiers, ordered by type then descending magnitude.
    pub breakdown: Vec<Modifier>,
    /// Human-readable explanation, e.g. `"Flanking +2, Frightened -1, Rage +3"`.
    pub formula: String,
}

impl fmt::Display for StackingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.formula.is_empty() {
            write!(f, "{:+}", self.total)
        } else {
            write!(f, "{:+} ({})", self.total, self.formula)
        }
    }
}

#[derive(Default)]
struct Extremes {
    bonus: Option<usize>,
    penalty: Option<usize>,
}

/// Resolve the modifiers of one selector. Untyped and stackable modifiers
/// always add; every other type keeps only its largest bonus and penalty.
///
/// ```
/// use ruleforge::{Modifier, ModifierType, RollOptionSet, stacking};
///
/// let modifiers = [
///     Modifier::new("attack", "Flanking", 2, ModifierType::Circumstance),
///     Modifier::new("attack", "Aid", 1, ModifierType::Circumstance),
///     Modifier::new("attack", "Frightened", -1, ModifierType::Status),
///     Modifier::new("attack", "Rage", 3, ModifierType::Untyped),
/// ];
/// let result = stacking::resolve(&modifiers, &RollOptionSet::new());
/// assert_eq!(result.total, 4);
/// assert_eq!(result.formula, "Flanking +2, Frightened -1, Rage +3");
/// ```
#[must_use]
pub fn resolve(modifiers: &[Modifier], options: &RollOptionSet) -> StackingResult {
    let mut slugs = BTreeSet::new();
    let active: Vec<&Modifier> = modifiers
        .iter()
        .filter(|m| m.applies(options))
        .filter(|m| m.slug.as_ref().is_none_or(|slug| slugs.insert(slug.as_str())))
        .collect();

    let mut keep = vec![false; active.len()];
    let mut extremes: BTreeMap<ModifierType, Extremes> = BTreeMap::new();
    for (i, m) in active.iter().enumerate() {
        if m.stackable || m.modifier_type == ModifierType::Untyped || m.value == 0 {
            keep[i] = true;
            continue;
        }
        let slot = extremes.entry(m.modifier_type).or_default();
        if m.value > 0 {
            if slot.bonus.is_none_or(|j| m.value > active[j].value) {
                slot.bonus = Some(i);
            }
        } else if slot.penalty.is_none_or(|j| m.value < active[j].value) {
            slot.penalty = Some(i);
        }
    }
    for slot in extremes.values() {
        for i in slot.bonus.into_iter().chain(slot.penalty) {
            keep[i] = true;
        }
    }

    let mut breakdown: Vec<Modifier> = active
        .into_iter()
        .zip(keep)
        .filter_map(|(m, kept)| kept.then(|| m.clone()))
        .collect();
    breakdown.sort_by(|a, b| {
        a.modifier_type
            .cmp(&b.modifier_type)
            .then_with(|| b.value.unsigned_abs().cmp(&a.value.unsigned_abs()))
    });

    let total = breakdown.iter().fold(0_i64, |sum, m| sum.saturating_add(m.value));
    let formula = breakdown
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    StackingResult {
        total,
        breakdown,
        formula,
    }
}
