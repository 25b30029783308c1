use ruleforge::{
    Character, CompiledCharacter, EvaluationContext, Item, RollOptionSet, SeededRoller,
};
use serde_json::json;

fn main() {
    let character = Character::new("Amiri", 5)
        .with_statistic("attack", 11)
        .with_item(Item::new("flanking", "Flanking").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "circumstance",
            "value": 2,
            "rollPredicate": ["target:flat-footed"]
        })))
        .with_item(Item::new("aid", "Aid").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "circumstance",
            "value": 1
        })))
        .with_item(Item::new("rage", "Rage").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "value": 2
        })))
        .with_item(Item::new("sickened", "Sickened").with_rule(json!({
            "key": "FlatModifier",
            "selector": "attack",
            "type": "status",
            "value": -1,
            "forced": true
        })));

    let ctx = EvaluationContext::new().with_roller(SeededRoller::new(7));
    let data = CompiledCharacter::compile(character).prepare(&ctx);

    // Open the dialog against a flat-footed target
    let roll_options = RollOptionSet::new().with("target:flat-footed");
    let Some(mut check) = data.check("attack", &roll_options, &ctx) else {
        println!("no attack statistic");
        return;
    };

    println!("{check}");
    for (index, modifier) in check.visible() {
        let state = if modifier.enabled { "x" } else { " " };
        println!("  [{state}] {index}: {} {}", modifier.source, modifier.signed_value());
    }

    // The player decides flanking does not apply after all
    check.toggle_named("Flanking");
    println!("after toggling Flanking: {check}");

    match check.commit(ctx.roller()) {
        Ok(roll) => println!("{roll}"),
        Err(error) => println!("roll failed: {error}"),
    }
}
