use ruleforge::{
    Character, CompiledCharacter, DiagnosticStage, EvaluationContext, FixedRoller, Item, Phase,
    RollOptionSet, Settings, Value,
};
use serde_json::json;

fn fighter_items() -> Vec<Item> {
    vec![
        Item::new("strength", "Strength").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "ability",
            "value": "@abilities.str.mod"
        })),
        Item::new("flanking", "Flanking").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "circumstance",
            "value": 2,
            "rollPredicate": ["target:flat-footed"]
        })),
        Item::new("rage", "Rage")
            .with_rule(json!({"key": "RollOption", "option": "raging"}))
            .with_rule(json!({
                "key": "FlatModifier",
                "selector": ["attack", "damage"],
                "type": "status",
                "value": 2,
                "predicate": ["raging"]
            })),
        Item::new("frightened", "Frightened").with_rule(json!({
            "key": "FlatModifier",
            "selector": ["attack", "ac"],
            "type": "status",
            "value": -1
        })),
    ]
}

fn fighter(items: Vec<Item>) -> Character {
    items.into_iter().fold(
        Character::new("Valeros", 5)
            .with_trait("human")
            .with_attribute("abilities.str.mod", json!(4))
            .with_statistic("attack", 7)
            .with_statistic("ac", 18),
        Character::with_item,
    )
}

fn one_item(rules: Vec<serde_json::Value>) -> CompiledCharacter {
    let item = rules
        .into_iter()
        .fold(Item::new("gear", "Gear"), Item::with_rule);
    Character::new("Kyra", 3)
        .with_attribute("attributes.speed", json!(25))
        .with_attribute("details.ancestry", json!("human"))
        .with_attribute("abilities.str.mod", json!(4))
        .with_statistic("attack", 5)
        .with_item(item)
        .into()
}

#[test]
fn fighter_totals() {
    let data = CompiledCharacter::compile(fighter(fighter_items())).prepare(&EvaluationContext::new());

    // 7 base, +4 ability, +2 status, -1 status; flanking is gated off.
    assert_eq!(data.total("attack"), Some(12));
    assert_eq!(data.total("ac"), Some(17));
    assert_eq!(data.total("damage"), Some(2));

    let attack = data.statistic("attack").unwrap();
    assert_eq!(attack.modifiers.len(), 4);
    assert_eq!(attack.breakdown.len(), 3);
    assert_eq!(attack.formula, "Strength +4, Rage +2, Frightened -1");

    assert_eq!(
        data.properties.get("statistics.attack.total"),
        Some(&Value::Int(12))
    );
    assert!(data.roll_options.contains("self:statistic:attack:12"));
    assert!(data.roll_options.contains("self:trait:human"));
    assert!(data.roll_options.contains("self:level:5"));
    assert!(data.roll_options.contains("raging"));
}

#[test]
fn check_sees_roll_specific_options() {
    let data = CompiledCharacter::compile(fighter(fighter_items())).prepare(&EvaluationContext::new());
    let ctx = EvaluationContext::new();

    let check = data
        .check("attack", &RollOptionSet::new().with("target:flat-footed"), &ctx)
        .unwrap();
    assert_eq!(check.total(), 14);
    assert_eq!(check.formula(), "1d20 + 14");

    // The snapshot itself is unchanged.
    assert_eq!(data.total("attack"), Some(12));

    let roll = check.commit(&FixedRoller::new(11)).unwrap();
    assert_eq!(roll.total, 25);
}

#[test]
fn preparation_is_idempotent() {
    let compiled = CompiledCharacter::compile(fighter(fighter_items()));
    let ctx = EvaluationContext::new();
    let first = serde_json::to_vec(&compiled.prepare(&ctx)).unwrap();
    let second = serde_json::to_vec(&compiled.prepare(&ctx)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn item_order_does_not_change_totals() {
    let ctx = EvaluationContext::new();
    let forward = CompiledCharacter::compile(fighter(fighter_items())).prepare(&ctx);
    let mut items = fighter_items();
    items.reverse();
    let reversed = CompiledCharacter::compile(fighter(items)).prepare(&ctx);

    for selector in ["attack", "ac", "damage"] {
        assert_eq!(forward.total(selector), reversed.total(selector), "{selector}");
    }
    assert_eq!(forward.roll_options, reversed.roll_options);
    assert_eq!(forward.properties, reversed.properties);
}

#[test]
fn one_failure_among_five_is_contained() {
    let compiled = one_item(vec![
        json!({"key": "FlatModifier", "selector": "attack", "value": 1}),
        json!({"key": "FlatModifier", "selector": "attack", "value": "1/0"}),
        json!({"key": "RollOption", "option": "blessed"}),
        json!({"key": "Bogus"}),
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "add", "value": 5}),
    ]);
    let report = compiled.prepare_detailed(&EvaluationContext::new());
    let data = report.data();

    assert_eq!(data.total("attack"), Some(6));
    assert!(data.roll_options.contains("blessed"));
    assert_eq!(data.properties.get("attributes.speed"), Some(&Value::Int(30)));

    assert_eq!(report.executed(), &["gear#2", "gear#4", "gear#0"]);
    assert_eq!(report.failed(), &["gear#3", "gear#1"]);

    assert_eq!(data.diagnostics.len(), 2);
    assert_eq!(data.diagnostics[0].stage, DiagnosticStage::Construction);
    assert_eq!(data.diagnostics[0].key, "Bogus");
    assert_eq!(data.diagnostics[1].stage, DiagnosticStage::Resolution);
    assert_eq!(data.diagnostics[1].element, "gear#1");
    assert_eq!(data.diagnostics[1].phase, Some(Phase::PrepareData));
}

#[test]
fn huge_values_saturate_instead_of_overflowing() {
    let compiled = one_item(vec![
        json!({"key": "FlatModifier", "selector": "attack", "value": i64::MAX}),
        json!({"key": "FlatModifier", "selector": "attack", "value": 1}),
    ]);
    let ctx = EvaluationContext::new().with_roller(FixedRoller::new(10));
    let data = compiled.prepare_detailed(&ctx).into_data();

    let attack = data.statistic("attack").unwrap();
    assert_eq!(attack.modifier, i64::MAX);
    assert_eq!(attack.total, i64::MAX);
    assert!(data.diagnostics.is_empty());

    let check = data.check("attack", &RollOptionSet::new(), &ctx).unwrap();
    assert_eq!(check.total(), i64::MAX);
    assert!(check.commit(ctx.roller()).is_err());
}

#[test]
fn out_of_range_formula_fails_only_its_element() {
    let item = Item::new("gear", "Gear")
        .with_rule(json!({"key": "FlatModifier", "selector": "ac", "value": "100000000000000000000 * 1"}))
        .with_rule(json!({"key": "FlatModifier", "selector": "ac", "type": "item", "value": 2}))
        .with_rule(json!({"key": "RollOption", "option": "armored"}));
    let compiled: CompiledCharacter = Character::new("Seoni", 4)
        .with_statistic("ac", 10)
        .with_item(item)
        .into();
    let report = compiled.prepare_detailed(&EvaluationContext::new());
    let data = report.data();

    assert_eq!(data.total("ac"), Some(12));
    assert!(data.roll_options.contains("armored"));
    assert_eq!(report.failed(), &["gear#0"]);
    assert_eq!(data.diagnostics.len(), 1);
    assert_eq!(data.diagnostics[0].stage, DiagnosticStage::Resolution);
    assert!(data.diagnostics[0].message.contains("out of range"));
}

#[test]
fn priority_orders_effects_within_a_phase() {
    let prioritized = one_item(vec![
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "add", "value": 10, "priority": 20}),
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "override", "value": 5, "priority": 10}),
    ]);
    let data = prioritized.prepare(&EvaluationContext::new());
    assert_eq!(data.properties.get("attributes.speed"), Some(&Value::Int(15)));

    // Equal priorities fall back to declaration order.
    let declared = one_item(vec![
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "add", "value": 10}),
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "override", "value": 5}),
    ]);
    let data = declared.prepare(&EvaluationContext::new());
    assert_eq!(data.properties.get("attributes.speed"), Some(&Value::Int(5)));
}

#[test]
fn default_priority_comes_from_settings() {
    let compiled = one_item(vec![
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "add", "value": 10, "priority": 50}),
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "override", "value": 5}),
    ]);
    let low = EvaluationContext::new().with_settings(Settings {
        default_priority: 0,
        ..Settings::default()
    });
    assert_eq!(
        compiled.prepare(&low).properties.get("attributes.speed"),
        Some(&Value::Int(15))
    );
    assert_eq!(
        compiled
            .prepare(&EvaluationContext::new())
            .properties
            .get("attributes.speed"),
        Some(&Value::Int(5))
    );
}

#[test]
fn effect_modes() {
    let compiled = one_item(vec![
        json!({"key": "ActiveEffectLike", "path": "attributes.speed", "mode": "upgrade", "value": 30}),
        json!({"key": "ActiveEffectLike", "path": "attributes.climb", "mode": "downgrade", "value": 10}),
        json!({"key": "ActiveEffectLike", "path": "@actor.attributes.swim", "mode": "add", "value": "@attributes.speed"}),
        json!({"key": "ActiveEffectLike", "path": "flags.tough", "mode": "override", "value": true}),
    ]);
    let data = compiled.prepare(&EvaluationContext::new());
    assert_eq!(data.properties.get("attributes.speed"), Some(&Value::Int(30)));
    // Absent properties read as zero.
    assert_eq!(data.properties.get("attributes.climb"), Some(&Value::Int(0)));
    assert_eq!(data.properties.get("attributes.swim"), Some(&Value::Int(30)));
    assert_eq!(data.properties.get("flags.tough"), Some(&Value::Bool(true)));
}

#[test]
fn aliases_and_formulas() {
    let compiled = one_item(vec![
        json!({"key": "FlatModifier", "selector": "missing", "value": "@abilities.missing"}),
        json!({"key": "FlatModifier", "selector": "formula", "value": "@abilities.str.mod * 2 + 1"}),
        json!({"key": "FlatModifier", "selector": "floored", "value": "floor(@abilities.str.mod / 3)"}),
        json!({"key": "FlatModifier", "selector": "dice", "value": "1d4 + 1"}),
    ]);
    let ctx = EvaluationContext::new().with_roller(FixedRoller::new(3));
    let data = compiled.prepare(&ctx);
    assert_eq!(data.total("missing"), Some(0));
    assert_eq!(data.total("formula"), Some(9));
    assert_eq!(data.total("floored"), Some(1));
    assert_eq!(data.total("dice"), Some(4));
    assert!(data.diagnostics.is_empty());
}

#[test]
fn alias_to_text_is_a_resolution_failure() {
    let compiled = one_item(vec![
        json!({"key": "FlatModifier", "selector": "attack", "value": "@details.ancestry"}),
    ]);
    let data = compiled.prepare(&EvaluationContext::new());
    assert_eq!(data.total("attack"), Some(5));
    assert_eq!(data.diagnostics.len(), 1);
    assert_eq!(data.diagnostics[0].stage, DiagnosticStage::Resolution);
}

#[test]
fn item_data_is_visible_to_its_rules() {
    let character = Character::new("Ezren", 2).with_item(
        Item::new("belt", "Belt of Climbing")
            .with_data("bonus", json!(2))
            .with_rule(json!({
                "key": "FlatModifier",
                "selector": "athletics",
                "type": "item",
                "value": "@item.bonus",
                "predicate": ["self:item:belt"]
            })),
    );
    let data = CompiledCharacter::compile(character).prepare(&EvaluationContext::new());
    assert_eq!(data.properties.get("items.belt.bonus"), Some(&Value::Int(2)));
    assert!(data.roll_options.contains("self:item:belt"));
    assert_eq!(data.total("athletics"), Some(2));
}

#[test]
fn statistics_are_published_before_the_final_phase() {
    let compiled = one_item(vec![
        json!({"key": "FlatModifier", "selector": "attack", "value": 4}),
        json!({
            "key": "ActiveEffectLike",
            "phase": "afterPrepareData",
            "predicate": "self:statistic:attack >= 9",
            "path": "flags.accurate",
            "mode": "override",
            "value": true
        }),
    ]);
    let data = compiled.prepare(&EvaluationContext::new());
    assert_eq!(data.properties.get("flags.accurate"), Some(&Value::Bool(true)));
    assert!(data.roll_options.contains("self:statistic:attack:9"));
    assert_eq!(
        data.roll_options
            .iter()
            .filter(|o| o.starts_with("self:statistic:attack:"))
            .count(),
        1
    );
}

#[test]
fn domain_options_gate_only_their_selector() {
    let compiled = one_item(vec![
        json!({"key": "RollOption", "domain": "attack", "option": "charging"}),
        json!({
            "key": "FlatModifier",
            "selector": ["attack", "ac"],
            "type": "circumstance",
            "value": 1,
            "rollPredicate": ["charging"]
        }),
    ]);
    let data = compiled.prepare(&EvaluationContext::new());
    assert_eq!(data.total("attack"), Some(6));
    assert_eq!(data.total("ac"), Some(0));
    assert!(!data.roll_options.contains("charging"));
    assert!(data.options_for("attack").contains("charging"));
}

#[test]
fn labels_are_localized() {
    let character = fighter(fighter_items());
    let ctx = EvaluationContext::new().with_label("Frightened", "Asustado");
    let data = CompiledCharacter::compile(character).prepare(&ctx);
    let ac = data.statistic("ac").unwrap();
    assert_eq!(ac.modifiers[0].source, "Asustado");
    assert_eq!(ac.formula, "Asustado -1");
}

#[test]
fn base_roll_options_are_seeded() {
    let compiled = one_item(vec![json!({
        "key": "FlatModifier",
        "selector": "attack",
        "value": 2,
        "predicate": ["encounter"]
    })]);
    let ctx = EvaluationContext::new().with_settings(Settings {
        base_roll_options: vec!["encounter".to_owned()],
        ..Settings::default()
    });
    assert_eq!(compiled.prepare(&ctx).total("attack"), Some(7));
    assert_eq!(compiled.prepare(&EvaluationContext::new()).total("attack"), Some(5));
}
