//! Engine settings loaded from the environment.

use std::time::Duration;

use exam_core::scoring::ScoringRules;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Timing, question selection and scoring knobs for the session engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub autosave_interval: Duration,
    pub shuffle_questions: bool,
    pub scoring: ScoringRules,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(30),
            shuffle_questions: false,
            scoring: ScoringRules::default(),
        }
    }
}

impl EngineSettings {
    /// Load settings from `EXAM_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    /// Same as [`EngineSettings::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(value) = lookup("EXAM_TICK_MILLIS") {
            let millis = parse_u64("EXAM_TICK_MILLIS", value)?;
            settings.tick_interval = Duration::from_millis(millis.max(1));
        }
        if let Some(value) = lookup("EXAM_AUTOSAVE_SECS") {
            let secs = parse_u64("EXAM_AUTOSAVE_SECS", value.clone())?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "EXAM_AUTOSAVE_SECS",
                    value,
                });
            }
            settings.autosave_interval = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("EXAM_SHUFFLE") {
            settings.shuffle_questions = parse_bool(&value);
        }
        if let Some(value) = lookup("EXAM_STRENGTH_PCT") {
            settings.scoring.strength_pct = parse_pct("EXAM_STRENGTH_PCT", value)?;
        }
        if let Some(value) = lookup("EXAM_WEAKNESS_PCT") {
            settings.scoring.weakness_pct = parse_pct("EXAM_WEAKNESS_PCT", value)?;
        }

        if settings.scoring.weakness_pct > settings.scoring.strength_pct {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_WEAKNESS_PCT",
                value: settings.scoring.weakness_pct.to_string(),
            });
        }

        Ok(settings)
    }
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_pct(field: &'static str, value: String) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(pct) if (0.0..=100.0).contains(&pct) => Ok(pct),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
