use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dice::{DiceRoller, ThreadRngRoller};

/// Engine configuration, loadable from JSON.
///
/// ```
/// use ruleforge::Settings;
///
/// let settings = Settings::from_json(r#"{"defaultPriority": 50}"#).unwrap();
/// assert_eq!(settings.default_priority, 50);
/// assert_eq!(settings.check_die, "1d20");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Priority given to rule elements that do not declare one.
    pub default_priority: i32,
    /// Dice expression rolled by checks before the modifier total is added.
    pub check_die: String,
    /// Roll options present at the start of every preparation pass.
    pub base_roll_options: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_priority: 100,
            check_die: "1d20".to_owned(),
            base_roll_options: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Json`](crate::RulesError::Json) on malformed JSON.
    pub fn from_json(input: &str) -> Result<Self, crate::RulesError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Read settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`](crate::RulesError) on I/O or JSON failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RulesError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }
}

/// Immutable inputs threaded through a preparation pass and through checks:
/// settings, localized labels, and the dice subsystem.
///
/// Cheap to clone and shareable across threads.
#[derive(Clone)]
pub struct EvaluationContext {
    settings: Settings,
    labels: BTreeMap<String, String>,
    roller: Arc<dyn DiceRoller>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            labels: BTreeMap::new(),
            roller: Arc::new(ThreadRngRoller),
        }
    }
}

impl EvaluationContext {
    /// Default settings, no labels, thread-RNG dice.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_roller(mut self, roller: impl DiceRoller + 'static) -> Self {
        self.roller = Arc::new(roller);
        self
    }

    /// Register a localized label for a label key.
    #[must_use]
    pub fn with_label(mut self, key: &str, text: &str) -> Self {
        self.labels.insert(key.to_owned(), text.to_owned());
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn roller(&self) -> &dyn DiceRoller {
        self.roller.as_ref()
    }

    /// Localized text for `key`, or `key` itself when none is registered.
    #[must_use]
    pub fn localize<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels.get(key).map_or(key, String::as_str)
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("settings", &self.settings)
            .field("labels", &self.labels.len())
            .finish_non_exhaustive()
    }
}
