use std::collections::{BTreeMap, BTreeSet};

use crate::resolve::Resolver;
use crate::types::{
    ALL_DOMAIN, Character, DerivedData, Diagnostic, DiagnosticStage, EffectMode,
    EvaluationContext, Modifier, Phase, PropertyTree, ResolveError, RollOptionSet, RuleElement,
    RuleElementKind, Statistic, Value,
};

/// Mutable pass-scoped state.
#[derive(Debug, Default)]
struct Draft {
    properties: PropertyTree,
    roll_options: RollOptionSet,
    domain_options: BTreeMap<String, RollOptionSet>,
    modifiers: BTreeMap<String, Vec<Modifier>>,
}

impl Draft {
    fn options_for(&self, selector: &str) -> RollOptionSet {
        let mut options = self.roll_options.clone();
        if let Some(domain) = self.domain_options.get(selector) {
            options.extend_from(domain);
        }
        options
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Modifier(modifier) => self
                .modifiers
                .entry(modifier.selector.clone())
                .or_default()
                .push(modifier),
            Effect::RollOption { domain, option } if domain == ALL_DOMAIN => {
                self.roll_options.insert(option);
            }
            Effect::RollOption { domain, option } => {
                self.domain_options.entry(domain).or_default().insert(option);
            }
            Effect::Property { path, value } => self.properties.insert(&path, value),
        }
    }
}

/// A staged side effect of one rule element.
#[derive(Debug)]
enum Effect {
    Modifier(Modifier),
    RollOption { domain: String, option: String },
    Property { path: String, value: Value },
}

/// Everything a pass produces; [`PreparationReport`](crate::PreparationReport)
/// is built from this.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) data: DerivedData,
    pub(crate) executed: Vec<String>,
    pub(crate) skipped: Vec<String>,
    pub(crate) failed: Vec<String>,
}

/// Run every phase over `elements` and freeze the result.
///
/// Within a phase elements run by ascending priority, then item order, then
/// rule order. An element stages all of its effects before any is applied.
pub(crate) fn run(
    character: &Character,
    elements: &[RuleElement],
    construction: &[Diagnostic],
    ctx: &EvaluationContext,
) -> Outcome {
    let mut pass = Pass {
        ctx,
        draft: seed(character, ctx),
        outcome: Outcome {
            data: DerivedData {
                name: character.name.clone(),
                diagnostics: construction.to_vec(),
                ..DerivedData::default()
            },
            executed: Vec::new(),
            skipped: Vec::new(),
            failed: construction.iter().map(|d| d.element.clone()).collect(),
        },
    };

    let schedule = schedule(elements, ctx.settings().default_priority);
    for phase in Phase::ALL {
        match phase {
            Phase::ItemBaseDataPrepared => pass.prepare_items(character),
            Phase::AfterPrepareData => pass.aggregate(character),
            Phase::BeforePrepareData | Phase::PrepareData => {}
        }
        let in_phase: Vec<&RuleElement> = schedule
            .iter()
            .copied()
            .filter(|e| e.phase() == phase)
            .collect();
        tracing::debug!(
            character = %character.name,
            %phase,
            elements = in_phase.len(),
            "running phase"
        );
        for element in in_phase {
            pass.run_element(element, phase);
        }
    }
    pass.aggregate(character);

    let Pass {
        draft, mut outcome, ..
    } = pass;
    outcome.data.properties = draft.properties;
    outcome.data.roll_options = draft.roll_options;
    outcome.data.domain_options = draft.domain_options;
    outcome
}

/// Fresh draft: base attributes, level, traits, and configured options.
fn seed(character: &Character, ctx: &EvaluationContext) -> Draft {
    let mut draft = Draft {
        properties: PropertyTree::from_json(&character.attributes),
        ..Draft::default()
    };
    draft
        .properties
        .insert("details.level", Value::Int(character.level));
    for name in &character.traits {
        draft.roll_options.insert(format!("self:trait:{name}"));
    }
    draft
        .roll_options
        .insert(format!("self:level:{}", character.level));
    for option in &ctx.settings().base_roll_options {
        draft.roll_options.insert(option.clone());
    }
    draft
}

/// Runnable elements in execution order: phase, then priority, then input order.
fn schedule(elements: &[RuleElement], default_priority: i32) -> Vec<&RuleElement> {
    let mut order: Vec<&RuleElement> = elements.iter().filter(|e| !e.is_failed()).collect();
    order.sort_by_key(|e| (e.phase(), e.priority_or(default_priority), e.input_order()));
    order
}

struct Pass<'a> {
    ctx: &'a EvaluationContext,
    draft: Draft,
    outcome: Outcome,
}

impl Pass<'_> {
    fn prepare_items(&mut self, character: &Character) {
        for item in &character.items {
            if item.slug.is_empty() {
                continue;
            }
            self.draft
                .properties
                .merge_json(&format!("items.{}", item.slug), &item.data);
            self.draft
                .roll_options
                .insert(format!("self:item:{}", item.slug));
        }
    }

    /// Stack every selector and publish totals as properties and options.
    fn aggregate(&mut self, character: &Character) {
        let selectors: BTreeSet<&String> = character
            .statistics
            .keys()
            .chain(self.draft.modifiers.keys())
            .collect();
        let mut statistics = BTreeMap::new();
        for selector in selectors {
            let base = character.statistics.get(selector).copied().unwrap_or(0);
            let modifiers = self
                .draft
                .modifiers
                .get(selector)
                .cloned()
                .unwrap_or_default();
            let options = self.draft.options_for(selector);
            let statistic = Statistic::resolve(selector, base, modifiers, &options);
            statistics.insert(selector.clone(), statistic);
        }
        for (selector, statistic) in &statistics {
            if let Some(previous) = self.outcome.data.statistics.get(selector) {
                self.draft
                    .roll_options
                    .remove(&format!("self:statistic:{selector}:{}", previous.total));
            }
            let props = &mut self.draft.properties;
            props.insert(&format!("statistics.{selector}.total"), Value::Int(statistic.total));
            props.insert(
                &format!("statistics.{selector}.modifier"),
                Value::Int(statistic.modifier),
            );
            self.draft
                .roll_options
                .insert(format!("self:statistic:{selector}:{}", statistic.total));
        }
        self.outcome.data.statistics = statistics;
    }

    fn run_element(&mut self, element: &RuleElement, phase: Phase) {
        let id = element.id();
        let active = !element.is_ignored()
            && crate::evaluate::test(element.predicate(), &self.draft.roll_options);
        if !active {
            tracing::debug!(element = %id, key = element.key(), %phase, "rule element skipped");
            self.outcome.skipped.push(id);
            return;
        }
        match self.effects(element) {
            Ok(effects) => {
                for effect in effects {
                    self.draft.apply(effect);
                }
                self.outcome.executed.push(id);
            }
            Err(error) => {
                tracing::warn!(
                    element = %id,
                    key = element.key(),
                    %phase,
                    %error,
                    "rule element failed"
                );
                self.outcome.data.diagnostics.push(Diagnostic {
                    element: id.clone(),
                    key: element.key().to_owned(),
                    stage: DiagnosticStage::Resolution,
                    phase: Some(phase),
                    message: error.to_string(),
                });
                self.outcome.failed.push(id);
            }
        }
    }

    /// Resolve every value the element needs and stage its effects.
    fn effects(&self, element: &RuleElement) -> Result<Vec<Effect>, ResolveError> {
        let resolver =
            Resolver::new(&self.draft.properties, self.ctx.roller()).with_item(element.item_slug());
        match element.kind() {
            RuleElementKind::FlatModifier(flat) => {
                let value = resolver.integer(&flat.value)?;
                let source = self.ctx.localize(element.label()).to_owned();
                Ok(flat
                    .selectors
                    .iter()
                    .map(|selector| {
                        Effect::Modifier(Modifier {
                            slug: element.slug().map(str::to_owned),
                            selector: selector.clone(),
                            modifier_type: flat.modifier_type,
                            value,
                            enabled: true,
                            source: source.clone(),
                            predicate: flat.roll_predicate.clone(),
                            stackable: flat.stackable,
                            forced: flat.forced,
                            hidden: flat.hidden,
                        })
                    })
                    .collect())
            }
            RuleElementKind::RollOption(roll_option) => Ok(vec![Effect::RollOption {
                domain: roll_option.domain.clone(),
                option: roll_option.option.clone(),
            }]),
            RuleElementKind::ActiveEffectLike(effect) => {
                let path = resolver.property_path(&effect.path);
                let value = match effect.mode {
                    EffectMode::Override => resolver.value(&effect.value)?,
                    mode => {
                        let current = match self.draft.properties.get(&path) {
                            None => 0.0,
                            Some(v) => v
                                .as_f64()
                                .ok_or_else(|| ResolveError::NotNumeric(format!("{path} = {v}")))?,
                        };
                        Value::from_number(mode.apply(current, resolver.number(&effect.value)?))
                    }
                };
                Ok(vec![Effect::Property { path, value }])
            }
            RuleElementKind::Failed { .. } => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compile::compile;
    use crate::dice::FixedRoller;
    use crate::types::Item;

    fn prepare(character: &Character) -> Outcome {
        let ctx = EvaluationContext::new().with_roller(FixedRoller::new(1));
        let (elements, diagnostics) = compile(character);
        run(character, &elements, &diagnostics, &ctx)
    }

    #[test]
    fn seeds_level_traits_and_attributes() {
        let character = Character::new("Lini", 4)
            .with_trait("gnome")
            .with_attribute("abilities.wis.mod", json!(4));
        let outcome = prepare(&character);
        let data = &outcome.data;
        assert_eq!(data.properties.get("details.level"), Some(&Value::Int(4)));
        assert_eq!(data.properties.get("abilities.wis.mod"), Some(&Value::Int(4)));
        assert!(data.roll_options.contains("self:trait:gnome"));
        assert!(data.roll_options.contains("self:level:4"));
    }

    #[test]
    fn item_data_and_options() {
        let character = Character::new("Lini", 1).with_item(
            Item::new("staff", "Staff")
                .with_data("runes.potency", json!(1))
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": "spell-attack",
                    "type": "item",
                    "value": "@item.runes.potency",
                    "predicate": ["self:item:staff"]
                })),
        );
        let data = prepare(&character).data;
        assert!(data.roll_options.contains("self:item:staff"));
        assert_eq!(data.total("spell-attack"), Some(1));
        assert_eq!(data.properties.get_number("statistics.spell-attack.total"), Some(1.0));
    }

    #[test]
    fn priority_orders_within_phase() {
        // The override runs last despite being declared first.
        let character = Character::new("Valeros", 1).with_item(
            Item::new("belt", "Belt")
                .with_rule(json!({
                    "key": "ActiveEffectLike",
                    "path": "abilities.str.mod",
                    "mode": "override",
                    "value": 5,
                    "priority": 200
                }))
                .with_rule(json!({
                    "key": "ActiveEffectLike",
                    "path": "abilities.str.mod",
                    "mode": "add",
                    "value": 2,
                    "priority": 10
                })),
        );
        let outcome = prepare(&character);
        assert_eq!(outcome.executed, vec!["belt#1", "belt#0"]);
        assert_eq!(
            outcome.data.properties.get("abilities.str.mod"),
            Some(&Value::Int(5))
        );
    }

    #[test]
    fn roll_options_feed_later_elements_only() {
        let character = Character::new("Amiri", 1).with_item(
            Item::new("rage", "Rage")
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": "damage",
                    "value": 2,
                    "predicate": ["raging"],
                    "phase": "beforePrepareData",
                    "priority": 1
                }))
                .with_rule(json!({"key": "RollOption", "option": "raging", "priority": 2}))
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": "damage",
                    "value": 3,
                    "label": "Rage",
                    "predicate": ["raging"]
                })),
        );
        let outcome = prepare(&character);
        assert_eq!(outcome.skipped, vec!["rage#0"]);
        assert_eq!(outcome.data.total("damage"), Some(3));
    }

    #[test]
    fn domain_options_stay_out_of_predicates() {
        let character = Character::new("Kyra", 1).with_item(
            Item::new("scimitar", "Scimitar")
                .with_rule(json!({"key": "RollOption", "option": "forceful", "domain": "attack"}))
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": "attack",
                    "value": 1,
                    "predicate": ["forceful"]
                })),
        );
        let outcome = prepare(&character);
        assert!(!outcome.data.roll_options.contains("forceful"));
        assert!(outcome.data.domain_options["attack"].contains("forceful"));
        assert_eq!(outcome.skipped, vec!["scimitar#1"]);
    }

    #[test]
    fn statistics_are_published_before_after_phase() {
        let character = Character::new("Harsk", 1)
            .with_statistic("perception", 5)
            .with_item(
                Item::new("scope", "Scope")
                    .with_rule(json!({
                        "key": "FlatModifier",
                        "selector": "perception",
                        "type": "item",
                        "value": 1
                    }))
                    .with_rule(json!({
                        "key": "FlatModifier",
                        "selector": "initiative",
                        "value": "@statistics.perception.total",
                        "phase": "afterPrepareData"
                    }))
                    .with_rule(json!({
                        "key": "FlatModifier",
                        "selector": "stealth",
                        "value": 1,
                        "phase": "afterPrepareData",
                        "predicate": [{"gte": ["self:statistic:perception", 6]}]
                    })),
            );
        let data = prepare(&character).data;
        assert_eq!(data.total("perception"), Some(6));
        assert_eq!(data.total("initiative"), Some(6));
        assert_eq!(data.total("stealth"), Some(1));
        assert_eq!(data.properties.get_number("statistics.initiative.total"), Some(6.0));
    }

    #[test]
    fn resolution_failure_is_contained_and_staged() {
        let character = Character::new("Ezren", 1).with_item(
            Item::new("wand", "Wand")
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": ["arcana", "occultism"],
                    "value": "1 / 0"
                }))
                .with_rule(json!({"key": "FlatModifier", "selector": "arcana", "value": 1})),
        );
        let outcome = prepare(&character);
        assert_eq!(outcome.failed, vec!["wand#0"]);
        assert_eq!(outcome.data.total("arcana"), Some(1));
        assert_eq!(outcome.data.total("occultism"), None);
        let diagnostic = &outcome.data.diagnostics[0];
        assert_eq!(diagnostic.stage, DiagnosticStage::Resolution);
        assert_eq!(diagnostic.phase, Some(Phase::PrepareData));
    }

    #[test]
    fn ignored_elements_are_skipped() {
        let character = Character::new("Seelah", 1).with_item(
            Item::new("shield", "Shield").with_rule(json!({
                "key": "FlatModifier",
                "selector": "ac",
                "value": 2,
                "ignored": true
            })),
        );
        let outcome = prepare(&character);
        assert_eq!(outcome.skipped, vec!["shield#0"]);
        assert!(outcome.data.statistics.is_empty());
    }

    #[test]
    fn non_numeric_property_cannot_be_added_to() {
        let character = Character::new("Seoni", 1)
            .with_attribute("details.ancestry", json!("human"))
            .with_item(Item::new("hat", "Hat").with_rule(json!({
                "key": "ActiveEffectLike",
                "path": "details.ancestry",
                "mode": "add",
                "value": 1
            })));
        let outcome = prepare(&character);
        assert_eq!(outcome.failed, vec!["hat#0"]);
        assert_eq!(
            outcome.data.properties.get("details.ancestry"),
            Some(&Value::from("human"))
        );
    }
}
