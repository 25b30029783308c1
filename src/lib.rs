pub mod check;
mod compile;
pub mod dice;
mod error;
mod evaluate;
pub mod parse;
mod pipeline;
pub mod resolve;
#[cfg(feature = "binary-cache")]
pub mod serial;
pub mod stacking;
mod types;

pub use check::{Check, CheckRoll};
pub use dice::{DiceRoller, FixedRoller, SeededRoller, ThreadRngRoller};
pub use error::RulesError;
pub use evaluate::test;
pub use parse::ParseError;
pub use resolve::{Resolver, resolve};
pub use stacking::StackingResult;
pub use types::{
    ALL_DOMAIN, ActiveEffectLike, Character, CompareOp, CompiledCharacter, DerivedData,
    Diagnostic, DiagnosticStage, EffectMode, EvaluationContext, FlatModifier, FormulaError, Item,
    Modifier, ModifierType, NumericOption, Operand, Phase, Predicate, PredicateError,
    PreparationReport, PropertyTree, ResolveError, RollOptionElement, RollOptionSet, RuleElement,
    RuleElementError, RuleElementKind, Settings, Statement, Statistic, Value, ValueSource,
    numeric, option,
};
