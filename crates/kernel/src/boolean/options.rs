use serde::{Deserialize, Serialize};

use super::error::BooleanError;

/// Caller-supplied settings for one Boolean operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanOptions {
    /// Extra tolerance added on top of the entity tolerances.
    pub fuzzy_value: f64,
    /// Promote every recoverable diagnostic to a hard error.
    pub strict: bool,
    /// Fan work out on a rayon pool; `false` runs every stage inline.
    pub parallel: bool,
    /// Worker count; `None` uses the rayon default.
    pub max_threads: Option<usize>,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            fuzzy_value: 0.0,
            strict: false,
            parallel: true,
            max_threads: None,
        }
    }
}

impl BooleanOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_fuzzy_value(mut self, fuzzy_value: f64) -> Self {
        self.fuzzy_value = fuzzy_value;
        self
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<(), BooleanError> {
        if !self.fuzzy_value.is_finite() || self.fuzzy_value < 0.0 {
            return Err(BooleanError::InvalidOptions(format!(
                "fuzzy_value must be finite and non-negative, got {}",
                self.fuzzy_value
            )));
        }
        if self.max_threads == Some(0) {
            return Err(BooleanError::InvalidOptions("max_threads must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse and validate options from JSON; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, BooleanError> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| BooleanError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Tolerance used for every comparison in one operation.
    pub fn operation_tolerance(&self, max_entity_tolerance: f64) -> f64 {
        (self.fuzzy_value + max_entity_tolerance).max(crate::default_tolerance().coincidence)
    }
}
