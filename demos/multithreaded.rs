use std::sync::Arc;
use std::thread;

use ruleforge::{Character, CompiledCharacter, EvaluationContext, Item, Settings};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let compiled = Arc::new(CompiledCharacter::compile(
        Character::new("Kyra", 4)
            .with_attribute("abilities.wis.mod", json!(3))
            .with_statistic("will", 9)
            .with_item(
                Item::new("bless", "Bless")
                    .with_rule(json!({
                        "key": "FlatModifier",
                        "selector": ["attack", "will"],
                        "type": "status",
                        "value": 1,
                        "predicate": ["encounter"]
                    }))
                    .with_rule(json!({
                        "key": "FlatModifier",
                        "selector": "will",
                        "value": "1/0"
                    })),
            ),
    ));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let compiled = Arc::clone(&compiled);
            thread::spawn(move || {
                // Every other thread prepares in an encounter
                let mut settings = Settings::default();
                if i % 2 == 0 {
                    settings.base_roll_options.push("encounter".to_owned());
                }
                let data = compiled.prepare(&EvaluationContext::new().with_settings(settings));
                println!(
                    "Thread {i}: will {:?}, {} diagnostics",
                    data.total("will"),
                    data.diagnostics.len()
                );
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
