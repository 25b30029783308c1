use ruleforge::{Character, CompiledCharacter, EvaluationContext, Item};
use serde_json::json;

fn main() {
    // Describe a character and the rule elements its items carry
    let character = Character::new("Valeros", 3)
        .with_trait("human")
        .with_attribute("abilities.str.mod", json!(4))
        .with_statistic("attack", 7)
        .with_statistic("ac", 18)
        .with_item(Item::new("strength", "Strength").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "ability",
            "value": "@abilities.str.mod"
        })))
        .with_item(
            Item::new("shield", "Steel Shield")
                .with_rule(json!({"key": "RollOption", "option": "shield-raised"}))
                .with_rule(json!({
                    "key": "FlatModifier",
                    "selector": "ac",
                    "type": "circumstance",
                    "value": 2,
                    "predicate": ["shield-raised"]
                })),
        )
        .with_item(Item::new("frightened", "Frightened").with_rule(json!({
            "key": "FlatModifier",
            "selector": ["attack", "ac"],
            "type": "status",
            "value": -1
        })));

    let compiled = CompiledCharacter::compile(character);
    println!("{compiled}");

    // Run one preparation pass
    let report = compiled.prepare_detailed(&EvaluationContext::new());
    println!("{report}");
    let data = report.into_data();
    for statistic in data.statistics.values() {
        println!("  {statistic}");
    }
}
