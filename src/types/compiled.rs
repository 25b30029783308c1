use std::fmt;
use std::time::Instant;

use super::character::Character;
use super::context::EvaluationContext;
use super::derived::DerivedData;
use super::report::{Diagnostic, PreparationReport};
use super::rule_element::RuleElement;

/// A character whose rule declarations have been constructed once.
///
/// Immutable and `Send + Sync`; prepare it as often as needed, from as many
/// threads as needed. Every call to [`prepare`](Self::prepare) starts from a
/// fresh draft.
///
/// ```
/// use ruleforge::{Character, CompiledCharacter, EvaluationContext, Item};
/// use serde_json::json;
///
/// let character = Character::new("Valeros", 1)
///     .with_statistic("attack", 7)
///     .with_item(Item::new("flanking", "Flanking").with_rule(json!({
///         "key": "FlatModifier",
///         "selector": "attack",
///         "type": "circumstance",
///         "value": 2
///     })));
/// let compiled = CompiledCharacter::compile(character);
/// let data = compiled.prepare(&EvaluationContext::new());
/// assert_eq!(data.total("attack"), Some(9));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledCharacter {
    character: Character,
    elements: Vec<RuleElement>,
    diagnostics: Vec<Diagnostic>,
}

impl CompiledCharacter {
    /// Construct every rule element. Malformed declarations become disabled
    /// stubs and are reported in [`diagnostics`](Self::diagnostics).
    #[must_use]
    pub fn compile(character: Character) -> Self {
        let (elements, diagnostics) = crate::compile::compile(&character);
        Self {
            character,
            elements,
            diagnostics,
        }
    }

    /// Run one preparation pass.
    #[must_use]
    pub fn prepare(&self, ctx: &EvaluationContext) -> DerivedData {
        crate::pipeline::run(&self.character, &self.elements, &self.diagnostics, ctx).data
    }

    /// Run one preparation pass and report what ran, what was skipped, what
    /// failed, and how long it took.
    pub fn prepare_detailed(&self, ctx: &EvaluationContext) -> PreparationReport {
        let start = Instant::now();
        let outcome = crate::pipeline::run(&self.character, &self.elements, &self.diagnostics, ctx);
        PreparationReport::new(
            outcome.data,
            outcome.executed,
            outcome.skipped,
            outcome.failed,
            start.elapsed(),
        )
    }

    #[must_use]
    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Every constructed element, including disabled stubs, in input order.
    #[must_use]
    pub fn rule_elements(&self) -> &[RuleElement] {
        &self.elements
    }

    /// Construction failures, one per disabled element.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Ids of runnable elements in the order a pass would run them under
    /// `default_priority`.
    #[must_use]
    pub fn execution_order(&self, default_priority: i32) -> Vec<String> {
        let mut order: Vec<&RuleElement> =
            self.elements.iter().filter(|e| !e.is_failed()).collect();
        order.sort_by_key(|e| (e.phase(), e.priority_or(default_priority), e.input_order()));
        order.into_iter().map(RuleElement::id).collect()
    }
}

impl From<Character> for CompiledCharacter {
    fn from(character: Character) -> Self {
        Self::compile(character)
    }
}

impl fmt::Display for CompiledCharacter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompiledCharacter({}, {} items, {} rule elements, {} disabled)",
            self.character.name,
            self.character.items.len(),
            self.elements.len(),
            self.diagnostics.len(),
        )
    }
}
