mod character;
mod compiled;
mod context;
mod derived;
mod error;
mod modifier;
mod predicate;
mod properties;
mod report;
mod roll_options;
mod rule_element;
mod value;
mod value_source;

pub use character::{Character, Item};
pub use compiled::CompiledCharacter;
pub use context::{EvaluationContext, Settings};
pub use derived::{ALL_DOMAIN, DerivedData, Statistic};
pub use error::{FormulaError, PredicateError, ResolveError, RuleElementError};
pub use modifier::{Modifier, ModifierType};
pub use predicate::{CompareOp, NumericOption, Operand, Predicate, Statement, numeric, option};
pub use properties::PropertyTree;
#[cfg(feature = "binary-cache")]
pub(crate) use properties::Node;
pub use report::{Diagnostic, DiagnosticStage, PreparationReport};
pub use roll_options::RollOptionSet;
pub use rule_element::{
    ActiveEffectLike, EffectMode, FlatModifier, Phase, RollOptionElement, RuleElement,
    RuleElementKind,
};
pub use value::Value;
pub(crate) use value_source::is_property_path;
pub use value_source::ValueSource;
