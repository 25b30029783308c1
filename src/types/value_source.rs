use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use super::Value;

/// A declared value that stays unresolved until its rule element runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// A literal number (or boolean, for property writes).
    Literal(Value),
    /// A property path in the draft, declared as `@path.to.property`.
    /// Stored without the leading `@`.
    Alias(String),
    /// An arithmetic/dice formula, possibly containing `@path` aliases.
    Formula(String),
}

impl ValueSource {
    /// Interpret a declared JSON value.
    ///
    /// # Errors
    ///
    /// Returns a description when the JSON is neither a number, a boolean,
    /// nor a string.
    pub fn from_json(json: &Json) -> Result<Self, String> {
        match json {
            Json::Number(n) => Ok(ValueSource::Literal(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| format!("bad number {n}"))?),
            })),
            Json::Bool(b) => Ok(ValueSource::Literal(Value::Bool(*b))),
            Json::String(s) => Ok(Self::from_text(s)),
            other => Err(format!("expected a number or formula, found {other}")),
        }
    }

    /// Interpret a declared string: a pure `@path` is an alias, a plain
    /// number is a literal, anything else is a formula.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if let Some(path) = text.strip_prefix('@')
            && is_property_path(path)
        {
            return ValueSource::Alias(path.to_owned());
        }
        if let Ok(i) = text.parse::<i64>() {
            return ValueSource::Literal(Value::Int(i));
        }
        if let Ok(f) = text.parse::<f64>()
            && f.is_finite()
        {
            return ValueSource::Literal(Value::Float(f));
        }
        ValueSource::Formula(text.to_owned())
    }

    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueSource::Literal(value.into())
    }
}

/// Whether `path` is a dot-separated property path (`a.b_c.d-e`).
pub(crate) fn is_property_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

impl From<i64> for ValueSource {
    fn from(v: i64) -> Self {
        ValueSource::Literal(Value::Int(v))
    }
}

impl From<&str> for ValueSource {
    fn from(v: &str) -> Self {
        ValueSource::from_text(v)
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal(v) => write!(f, "{v}"),
            ValueSource::Alias(path) => write!(f, "@{path}"),
            ValueSource::Formula(formula) => write!(f, "{formula}"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueSource::Literal(v) => v.serialize(serializer),
            ValueSource::Alias(path) => serializer.serialize_str(&format!("@{path}")),
            ValueSource::Formula(formula) => serializer.serialize_str(formula),
        }
    }
}

impl<'de> Deserialize<'de> for ValueSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        ValueSource::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_are_literals() {
        assert_eq!(
            ValueSource::from_json(&json!(2)).unwrap(),
            ValueSource::Literal(Value::Int(2))
        );
        assert_eq!(
            ValueSource::from_json(&json!(-1.5)).unwrap(),
            ValueSource::Literal(Value::Float(-1.5))
        );
        assert_eq!(ValueSource::from_text(" 3 "), ValueSource::Literal(Value::Int(3)));
    }

    #[test]
    fn pure_alias() {
        assert_eq!(
            ValueSource::from_text("@abilities.str.mod"),
            ValueSource::Alias("abilities.str.mod".into())
        );
    }

    #[test]
    fn alias_inside_arithmetic_is_formula() {
        assert_eq!(
            ValueSource::from_text("@details.level + 2"),
            ValueSource::Formula("@details.level + 2".into())
        );
        assert_eq!(
            ValueSource::from_text("1d6"),
            ValueSource::Formula("1d6".into())
        );
    }

    #[test]
    fn non_scalar_is_rejected() {
        assert!(ValueSource::from_json(&json!({"a": 1})).is_err());
        assert!(ValueSource::from_json(&json!(null)).is_err());
    }

    #[test]
    fn property_path_shape() {
        assert!(is_property_path("a.b_c.d-e"));
        assert!(!is_property_path("a..b"));
        assert!(!is_property_path("a + b"));
        assert!(!is_property_path(""));
    }

    #[test]
    fn serde_round_trip() {
        for source in [
            ValueSource::literal(2_i64),
            ValueSource::Alias("details.level".into()),
            ValueSource::Formula("max(1, @details.level / 2)".into()),
        ] {
            let json = serde_json::to_value(&source).unwrap();
            let back: ValueSource = serde_json::from_value(json).unwrap();
            assert_eq!(back, source);
        }
    }
}
