use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RuleElementError;
use super::modifier::ModifierType;
use super::predicate::Predicate;
use super::value_source::ValueSource;

/// Preparation phases, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    BeforePrepareData,
    ItemBaseDataPrepared,
    PrepareData,
    AfterPrepareData,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::BeforePrepareData,
        Phase::ItemBaseDataPrepared,
        Phase::PrepareData,
        Phase::AfterPrepareData,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::BeforePrepareData => "beforePrepareData",
            Phase::ItemBaseDataPrepared => "itemBaseDataPrepared",
            Phase::PrepareData => "prepareData",
            Phase::AfterPrepareData => "afterPrepareData",
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an [`ActiveEffectLike`] combines its value with the existing property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectMode {
    Add,
    Subtract,
    Multiply,
    /// Keep the larger of the current and new value.
    Upgrade,
    /// Keep the smaller of the current and new value.
    Downgrade,
    Override,
}

impl EffectMode {
    pub const ALL: [EffectMode; 6] = [
        EffectMode::Add,
        EffectMode::Subtract,
        EffectMode::Multiply,
        EffectMode::Upgrade,
        EffectMode::Downgrade,
        EffectMode::Override,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EffectMode::Add => "add",
            EffectMode::Subtract => "subtract",
            EffectMode::Multiply => "multiply",
            EffectMode::Upgrade => "upgrade",
            EffectMode::Downgrade => "downgrade",
            EffectMode::Override => "override",
        }
    }

    /// Combine a current numeric value with a resolved operand.
    #[must_use]
    pub fn apply(self, current: f64, operand: f64) -> f64 {
        match self {
            EffectMode::Add => current + operand,
            EffectMode::Subtract => current - operand,
            EffectMode::Multiply => current * operand,
            EffectMode::Upgrade => current.max(operand),
            EffectMode::Downgrade => current.min(operand),
            EffectMode::Override => operand,
        }
    }
}

impl FromStr for EffectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}

/// Adds a typed modifier to one or more selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatModifier {
    pub selectors: Vec<String>,
    pub modifier_type: ModifierType,
    pub value: ValueSource,
    /// Gate checked per roll, separate from the element's activation predicate.
    pub roll_predicate: Predicate,
    pub stackable: bool,
    pub forced: bool,
    pub hidden: bool,
}

/// Contributes a roll option. Options outside the `all` domain only reach
/// checks rolled against that domain's selector.
#[derive(Debug, Clone, PartialEq)]
pub struct RollOptionElement {
    pub option: String,
    pub domain: String,
}

/// Writes a property of the draft.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffectLike {
    pub path: String,
    pub mode: EffectMode,
    pub value: ValueSource,
}

/// The closed set of rule element kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleElementKind {
    FlatModifier(FlatModifier),
    RollOption(RollOptionElement),
    ActiveEffectLike(ActiveEffectLike),
    /// A declaration that failed validation. Never runs.
    Failed {
        key: Option<String>,
        error: RuleElementError,
    },
}

impl RuleElementKind {
    /// The declared discriminant, e.g. `"FlatModifier"`.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            RuleElementKind::FlatModifier(_) => "FlatModifier",
            RuleElementKind::RollOption(_) => "RollOption",
            RuleElementKind::ActiveEffectLike(_) => "ActiveEffectLike",
            RuleElementKind::Failed { key, .. } => key.as_deref().unwrap_or("Unknown"),
        }
    }

    #[must_use]
    pub fn default_phase(&self) -> Phase {
        match self {
            RuleElementKind::RollOption(_) | RuleElementKind::ActiveEffectLike(_) => {
                Phase::BeforePrepareData
            }
            RuleElementKind::FlatModifier(_) | RuleElementKind::Failed { .. } => Phase::PrepareData,
        }
    }
}

/// One constructed rule element, bound to its owning item.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleElement {
    pub(crate) item_slug: String,
    pub(crate) item_name: String,
    pub(crate) item_index: usize,
    pub(crate) index: usize,
    pub(crate) label: Option<String>,
    pub(crate) slug: Option<String>,
    pub(crate) predicate: Predicate,
    pub(crate) priority: Option<i32>,
    pub(crate) phase: Phase,
    pub(crate) ignored: bool,
    pub(crate) kind: RuleElementKind,
}

impl RuleElement {
    /// Stable identifier `"<item-slug>#<rule-index>"`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}#{}", self.item_slug, self.index)
    }

    #[must_use]
    pub fn item_slug(&self) -> &str {
        &self.item_slug
    }

    #[must_use]
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Position of this element on its item.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declared label, falling back to the item's name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.item_name)
    }

    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Declared priority, or `default` when none was declared.
    #[must_use]
    pub fn priority_or(&self, default: i32) -> i32 {
        self.priority.unwrap_or(default)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Whether construction failed and this element is a disabled stub.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.kind, RuleElementKind::Failed { .. })
    }

    #[must_use]
    pub fn kind(&self) -> &RuleElementKind {
        &self.kind
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.kind.key()
    }

    /// Position in the stable input order: item order, then rule order.
    pub(crate) fn input_order(&self) -> (usize, usize) {
        (self.item_index, self.index)
    }
}

impl fmt::Display for RuleElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key(), self.id())
    }
}
