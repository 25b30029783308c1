use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A character as handed over by storage: plain data plus the raw rule
/// declarations of every owned item.
///
/// ```
/// use ruleforge::{Character, Item};
/// use serde_json::json;
///
/// let character = Character::new("Amiri", 3)
///     .with_trait("human")
///     .with_attribute("abilities.str.mod", json!(4))
///     .with_statistic("attack", 0)
///     .with_item(Item::new("rage", "Rage").with_rule(json!({
///         "key": "FlatModifier",
///         "selector": "attack",
///         "value": 2
///     })));
/// assert_eq!(character.items.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Character {
    pub name: String,
    pub level: i64,
    pub traits: Vec<String>,
    /// Base attributes; copied into the draft as the root of the property tree.
    pub attributes: Json,
    /// Base value of each statistic selector.
    pub statistics: BTreeMap<String, i64>,
    pub items: Vec<Item>,
}

impl Character {
    #[must_use]
    pub fn new(name: &str, level: i64) -> Self {
        Self {
            name: name.to_owned(),
            level,
            attributes: Json::Object(Map::new()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_trait(mut self, name: &str) -> Self {
        self.traits.push(name.to_owned());
        self
    }

    /// Set a base attribute at a dot-separated path.
    #[must_use]
    pub fn with_attribute(mut self, path: &str, value: Json) -> Self {
        set_path(&mut self.attributes, path, value);
        self
    }

    #[must_use]
    pub fn with_statistic(mut self, selector: &str, base: i64) -> Self {
        self.statistics.insert(selector.to_owned(), base);
        self
    }

    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    /// Parse a character from its JSON storage form.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Json`](crate::RulesError::Json) on malformed input.
    pub fn from_json(input: &str) -> Result<Self, crate::RulesError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Read a character from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`](crate::RulesError) on I/O or JSON failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RulesError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }
}

/// An owned item and the rule declarations it carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub data: Json,
    pub rules: Vec<Json>,
}

impl Item {
    #[must_use]
    pub fn new(slug: &str, name: &str) -> Self {
        Self {
            id: slug.to_owned(),
            slug: slug.to_owned(),
            name: name.to_owned(),
            data: Json::Object(Map::new()),
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, path: &str, value: Json) -> Self {
        set_path(&mut self.data, path, value);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Json) -> Self {
        self.rules.push(rule);
        self
    }
}

fn set_path(node: &mut Json, path: &str, value: Json) {
    if !node.is_object() {
        *node = Json::Object(Map::new());
    }
    let Json::Object(map) = node else { return };
    match path.split_once('.') {
        None => {
            map.insert(path.to_owned(), value);
        }
        Some((head, rest)) => set_path(
            map.entry(head.to_owned()).or_insert(Json::Null),
            rest,
            value,
        ),
    }
}
