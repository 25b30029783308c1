use std::collections::BTreeMap;

use crate::dice::DiceRoller;
use crate::parse::{BinaryOp, FormulaExpr, parse_formula};
use crate::types::{FormulaError, PropertyTree, ResolveError, Value, ValueSource};

const MAX_DICE: f64 = 10_000.0;

/// Resolves declared values for one rule element: reads the draft's property
/// tree, scopes `@item.` aliases to the owning item, and rolls dice through
/// the context's roller.
pub struct Resolver<'a> {
    properties: &'a PropertyTree,
    item_slug: Option<&'a str>,
    roller: &'a dyn DiceRoller,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(properties: &'a PropertyTree, roller: &'a dyn DiceRoller) -> Self {
        Self {
            properties,
            item_slug: None,
            roller,
        }
    }

    /// Scope `@item.` aliases to `items.<slug>`.
    #[must_use]
    pub fn with_item(mut self, slug: &'a str) -> Self {
        self.item_slug = Some(slug);
        self
    }

    /// Resolve to a number. Absent alias paths read as `0`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when a formula is malformed or fails to
    /// evaluate, or when the value is not numeric.
    pub fn number(&self, source: &ValueSource) -> Result<f64, ResolveError> {
        match source {
            ValueSource::Literal(value @ (Value::Int(_) | Value::Float(_))) => {
                value.as_f64().ok_or_else(|| ResolveError::NotNumeric(value.to_string()))
            }
            ValueSource::Literal(other) => Err(ResolveError::NotNumeric(other.to_string())),
            ValueSource::Alias(path) => self.alias(path),
            ValueSource::Formula(formula) => self.formula(formula),
        }
    }

    /// Resolve to a whole number, truncating toward zero. Integer literals
    /// are taken as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::OutOfRange`] when the truncated value does not
    /// fit in an `i64`, plus everything [`Resolver::number`] can return.
    pub fn integer(&self, source: &ValueSource) -> Result<i64, ResolveError> {
        if let ValueSource::Literal(Value::Int(n)) = source {
            return Ok(*n);
        }
        let n = self.number(source)?;
        truncate(n).ok_or_else(|| ResolveError::OutOfRange(n.to_string()))
    }

    /// Resolve to a property value. Literals keep their type, aliases copy
    /// the value found at the path, formulas produce numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when a formula fails.
    pub fn value(&self, source: &ValueSource) -> Result<Value, ResolveError> {
        match source {
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Alias(path) => Ok(self
                .properties
                .get(&self.property_path(path))
                .cloned()
                .unwrap_or(Value::Int(0))),
            ValueSource::Formula(formula) => self.formula(formula).map(Value::from_number),
        }
    }

    /// Map an alias path (without `@`) to its location in the draft.
    #[must_use]
    pub fn property_path(&self, path: &str) -> String {
        if let Some(rest) = path.strip_prefix("actor.") {
            return rest.to_owned();
        }
        match (path.strip_prefix("item."), self.item_slug) {
            (Some(rest), Some(slug)) => format!("items.{slug}.{rest}"),
            _ => path.to_owned(),
        }
    }

    fn alias(&self, path: &str) -> Result<f64, ResolveError> {
        match self.properties.get(&self.property_path(path)) {
            None => Ok(0.0),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| ResolveError::NotNumeric(format!("@{path} = {value}"))),
        }
    }

    fn formula(&self, formula: &str) -> Result<f64, ResolveError> {
        let wrap = |source| ResolveError::Formula {
            formula: formula.to_owned(),
            source,
        };
        let expr = parse_formula(formula).map_err(wrap)?;
        if expr.has_dice() {
            tracing::debug!(formula, item = self.item_slug, "rolling dice in declared value");
        }
        let mut aliases = BTreeMap::new();
        collect_aliases(&expr, &mut |path: &str| {
            if !aliases.contains_key(path) {
                aliases.insert(path.to_owned(), self.alias(path)?);
            }
            Ok(())
        })?;
        eval_with(&expr, &|path: &str| aliases.get(path).copied().unwrap_or(0.0), self.roller)
            .map_err(wrap)
    }
}

/// Resolve `source` numerically against `properties`.
///
/// ```
/// use ruleforge::{FixedRoller, PropertyTree, ValueSource, resolve};
///
/// let props = PropertyTree::new().set("details.level", 5_i64);
/// let roller = FixedRoller::new(1);
/// let source = ValueSource::from_text("max(1, floor(@details.level / 2))");
/// assert_eq!(resolve(&source, &props, &roller).unwrap(), 2.0);
/// assert_eq!(resolve(&ValueSource::from_text("@missing.path"), &props, &roller).unwrap(), 0.0);
/// ```
///
/// # Errors
///
/// Returns [`ResolveError`] when the value cannot be resolved.
pub fn resolve(
    source: &ValueSource,
    properties: &PropertyTree,
    roller: &dyn DiceRoller,
) -> Result<f64, ResolveError> {
    Resolver::new(properties, roller).number(source)
}

/// Truncate a resolved number toward zero for use as a modifier value.
/// `None` when the result does not fit in an `i64`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn truncate(n: f64) -> Option<i64> {
    let t = n.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

fn collect_aliases(
    expr: &FormulaExpr,
    visit: &mut dyn FnMut(&str) -> Result<(), ResolveError>,
) -> Result<(), ResolveError> {
    match expr {
        FormulaExpr::Number(_) => Ok(()),
        FormulaExpr::Alias(path) => visit(path),
        FormulaExpr::Dice { count, .. } => collect_aliases(count, visit),
        FormulaExpr::Neg(inner) => collect_aliases(inner, visit),
        FormulaExpr::Binary { left, right, .. } => {
            collect_aliases(left, visit)?;
            collect_aliases(right, visit)
        }
        FormulaExpr::Call { args, .. } => args.iter().try_for_each(|a| collect_aliases(a, visit)),
    }
}

/// Evaluate a formula with no draft; every alias reads as `0`.
///
/// # Errors
///
/// Returns [`FormulaError`] on division by zero, bad function calls, invalid
/// dice, or a non-finite result.
pub(crate) fn eval_formula<R: DiceRoller + ?Sized>(
    expr: &FormulaExpr,
    roller: &R,
) -> Result<f64, FormulaError> {
    eval_with(expr, &|_: &str| 0.0, roller)
}

fn eval_with<R: DiceRoller + ?Sized>(
    expr: &FormulaExpr,
    lookup: &dyn Fn(&str) -> f64,
    roller: &R,
) -> Result<f64, FormulaError> {
    let n = eval_node(expr, lookup, roller)?;
    if n.is_finite() {
        Ok(n)
    } else {
        Err(FormulaError::NonFinite)
    }
}

fn eval_node<R: DiceRoller + ?Sized>(
    expr: &FormulaExpr,
    lookup: &dyn Fn(&str) -> f64,
    roller: &R,
) -> Result<f64, FormulaError> {
    match expr {
        FormulaExpr::Number(n) => Ok(*n),
        FormulaExpr::Alias(path) => Ok(lookup(path)),
        FormulaExpr::Neg(inner) => Ok(-eval_node(inner, lookup, roller)?),
        FormulaExpr::Binary { op, left, right } => {
            let l = eval_node(left, lookup, roller)?;
            let r = eval_node(right, lookup, roller)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div if r == 0.0 => Err(FormulaError::DivisionByZero),
                BinaryOp::Div => Ok(l / r),
            }
        }
        FormulaExpr::Dice { count, faces } => {
            let n = eval_node(count, lookup, roller)?.trunc();
            if *faces == 0 || !(0.0..=MAX_DICE).contains(&n) {
                return Err(FormulaError::InvalidDice(expr.to_string()));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = n as u32;
            #[allow(clippy::cast_precision_loss)]
            let total = roller.roll(count, *faces) as f64;
            Ok(total)
        }
        FormulaExpr::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| eval_node(a, lookup, roller))
                .collect::<Result<Vec<_>, _>>()?;
            call(function, &values)
        }
    }
}

fn call(function: &str, args: &[f64]) -> Result<f64, FormulaError> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(FormulaError::Arity {
            function: function.to_owned(),
            expected: "1",
            found: args.len(),
        }),
    };
    match function {
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "abs" => unary(f64::abs),
        "trunc" => unary(f64::trunc),
        "min" | "max" => {
            let pick: fn(f64, f64) -> f64 = if function == "min" { f64::min } else { f64::max };
            args.iter()
                .copied()
                .reduce(pick)
                .ok_or_else(|| FormulaError::Arity {
                    function: function.to_owned(),
                    expected: "at least 1",
                    found: 0,
                })
        }
        other => Err(FormulaError::UnknownFunction(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::FixedRoller;

    fn props() -> PropertyTree {
        PropertyTree::new()
            .set("details.level", 5_i64)
            .set("abilities.str.mod", 4_i64)
            .set("traits.small", true)
            .set("name", "Valeros")
            .set("items.longsword.runes.potency", 1_i64)
    }

    fn num(text: &str) -> Result<f64, ResolveError> {
        let props = props();
        let roller = FixedRoller::new(3);
        Resolver::new(&props, &roller)
            .with_item("longsword")
            .number(&ValueSource::from_text(text))
    }

    #[test]
    fn literal_and_alias() {
        assert_eq!(num("7"), Ok(7.0));
        assert_eq!(num("@abilities.str.mod"), Ok(4.0));
        assert_eq!(num("@actor.abilities.str.mod"), Ok(4.0));
        assert_eq!(num("@traits.small"), Ok(1.0));
    }

    #[test]
    fn absent_alias_is_zero() {
        assert_eq!(num("@abilities.dex.mod"), Ok(0.0));
        assert_eq!(num("@abilities.dex.mod + 2"), Ok(2.0));
    }

    #[test]
    fn item_scoped_alias() {
        assert_eq!(num("@item.runes.potency"), Ok(1.0));
        assert_eq!(num("@item.runes.potency + @details.level"), Ok(6.0));
    }

    #[test]
    fn item_alias_without_item_is_absent() {
        let props = props();
        let roller = FixedRoller::new(1);
        let source = ValueSource::from_text("@item.runes.potency");
        assert_eq!(Resolver::new(&props, &roller).number(&source), Ok(0.0));
    }

    #[test]
    fn string_alias_is_not_numeric() {
        assert!(matches!(num("@name"), Err(ResolveError::NotNumeric(_))));
        assert!(matches!(num("@name + 1"), Err(ResolveError::NotNumeric(_))));
    }

    #[test]
    fn boolean_literal_is_not_numeric() {
        let props = props();
        let roller = FixedRoller::new(1);
        let r = Resolver::new(&props, &roller);
        assert!(r.number(&ValueSource::literal(true)).is_err());
        assert_eq!(r.value(&ValueSource::literal(true)), Ok(Value::Bool(true)));
    }

    #[test]
    fn arithmetic_and_functions() {
        assert_eq!(num("1 + 2 * 3"), Ok(7.0));
        assert_eq!(num("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(num("-@abilities.str.mod"), Ok(-4.0));
        assert_eq!(num("floor(@details.level / 2)"), Ok(2.0));
        assert_eq!(num("ceil(@details.level / 2)"), Ok(3.0));
        assert_eq!(num("max(1, @details.level - 10)"), Ok(1.0));
        assert_eq!(num("min(3, 1, 2)"), Ok(1.0));
        assert_eq!(num("abs(-2)"), Ok(2.0));
        assert_eq!(num("trunc(-2.7)"), Ok(-2.0));
    }

    #[test]
    fn dice_use_the_roller() {
        assert_eq!(num("2d6"), Ok(6.0));
        assert_eq!(num("d20 + 1"), Ok(4.0));
        assert_eq!(num("(@details.level)d4"), Ok(15.0));
    }

    #[test]
    fn formula_failures() {
        assert!(matches!(
            num("1 / 0"),
            Err(ResolveError::Formula {
                source: FormulaError::DivisionByZero,
                ..
            })
        ));
        assert!(matches!(
            num("1 +"),
            Err(ResolveError::Formula {
                source: FormulaError::Syntax { .. },
                ..
            })
        ));
        assert!(matches!(
            num("sqrt(4)"),
            Err(ResolveError::Formula {
                source: FormulaError::UnknownFunction(_),
                ..
            })
        ));
        assert!(matches!(
            num("floor(1, 2)"),
            Err(ResolveError::Formula {
                source: FormulaError::Arity { .. },
                ..
            })
        ));
        assert!(matches!(
            num("(-1)d6"),
            Err(ResolveError::Formula {
                source: FormulaError::InvalidDice(_),
                ..
            })
        ));
        assert!(matches!(
            num("1d0"),
            Err(ResolveError::Formula {
                source: FormulaError::InvalidDice(_),
                ..
            })
        ));
    }

    #[test]
    fn value_keeps_types_and_collapses_integral_floats() {
        let props = props();
        let roller = FixedRoller::new(1);
        let r = Resolver::new(&props, &roller);
        assert_eq!(r.value(&ValueSource::Alias("name".into())), Ok(Value::from("Valeros")));
        assert_eq!(r.value(&ValueSource::Alias("nope".into())), Ok(Value::Int(0)));
        assert_eq!(r.value(&ValueSource::from_text("@details.level * 2")), Ok(Value::Int(10)));
        assert_eq!(r.value(&ValueSource::from_text("@details.level / 2")), Ok(Value::Float(2.5)));
    }

    #[test]
    fn truncation_toward_zero() {
        assert_eq!(truncate(2.9), Some(2));
        assert_eq!(truncate(-2.9), Some(-2));
        assert_eq!(truncate(1e20), None);
        assert_eq!(truncate(-1e20), None);
        assert_eq!(truncate(f64::NAN), None);
    }

    #[test]
    fn integer_is_exact_and_range_checked() {
        let props = props();
        let roller = FixedRoller::new(1);
        let r = Resolver::new(&props, &roller);
        assert_eq!(r.integer(&ValueSource::literal(i64::MAX)), Ok(i64::MAX));
        assert_eq!(r.integer(&ValueSource::literal(9_007_199_254_740_993_i64)), Ok(9_007_199_254_740_993));
        assert_eq!(r.integer(&ValueSource::from_text("@details.level / 2")), Ok(2));
        assert!(matches!(
            r.integer(&ValueSource::from_text("100000000000000000000 * 1")),
            Err(ResolveError::OutOfRange(_))
        ));
        assert!(matches!(r.integer(&ValueSource::literal(1e19)), Err(ResolveError::OutOfRange(_))));
    }
}
