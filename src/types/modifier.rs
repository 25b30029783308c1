use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::predicate::Predicate;
use super::roll_options::RollOptionSet;

/// Stacking category of a modifier.
///
/// Declaration order is the display order of a breakdown.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModifierType {
    Ability,
    Proficiency,
    Circumstance,
    Status,
    Item,
    #[default]
    Untyped,
}

impl ModifierType {
    pub const ALL: [ModifierType; 6] = [
        ModifierType::Ability,
        ModifierType::Proficiency,
        ModifierType::Circumstance,
        ModifierType::Status,
        ModifierType::Item,
        ModifierType::Untyped,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModifierType::Ability => "ability",
            ModifierType::Proficiency => "proficiency",
            ModifierType::Circumstance => "circumstance",
            ModifierType::Status => "status",
            ModifierType::Item => "item",
            ModifierType::Untyped => "untyped",
        }
    }
}

impl FromStr for ModifierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModifierType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown modifier type '{s}'"))
    }
}

impl fmt::Display for ModifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed, signed contribution to a selector's total.
///
/// Modifiers are built fresh on every preparation pass. Adapting one for a
/// specific roll clones it first; nothing mutates a modifier held by a
/// finished snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    /// Identity used for deduplication; modifiers without a slug never dedupe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub selector: String,
    #[serde(rename = "type")]
    pub modifier_type: ModifierType,
    pub value: i64,
    pub enabled: bool,
    /// Display label.
    pub source: String,
    /// Roll-scoped gate, checked against the options of a specific roll.
    #[serde(default, skip_serializing_if = "Predicate::is_empty")]
    pub predicate: Predicate,
    #[serde(default)]
    pub stackable: bool,
    /// Cannot be toggled off by the user.
    #[serde(default)]
    pub forced: bool,
    /// Not offered in the toggle surface.
    #[serde(default)]
    pub hidden: bool,
}

impl Modifier {
    #[must_use]
    pub fn new(
        selector: impl Into<String>,
        source: impl Into<String>,
        value: i64,
        modifier_type: ModifierType,
    ) -> Self {
        Self {
            slug: None,
            selector: selector.into(),
            modifier_type,
            value,
            enabled: true,
            source: source.into(),
            predicate: Predicate::always(),
            stackable: false,
            forced: false,
            hidden: false,
        }
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Into<Predicate>) -> Self {
        self.predicate = predicate.into();
        self
    }

    #[must_use]
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    #[must_use]
    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this modifier takes part in a roll with the given options.
    #[must_use]
    pub fn applies(&self, options: &RollOptionSet) -> bool {
        self.enabled && crate::evaluate::test(&self.predicate, options)
    }

    /// Whether the user may flip `enabled` in a check dialog.
    #[must_use]
    pub fn is_toggleable(&self) -> bool {
        !self.forced && !self.hidden
    }

    /// The value with an explicit sign, e.g. `+2`, `-1`, `+0`.
    #[must_use]
    pub fn signed_value(&self) -> String {
        format!("{:+}", self.value)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.signed_value())
    }
}
