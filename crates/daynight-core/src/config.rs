//! Configuration loading and typed config structures for the scheduler.
//!
//! The persisted configuration lives in `daynight-config.yaml`. Loading
//! runs a fixed pipeline:
//!
//! 1. Parse the YAML into a raw document.
//! 2. Upgrade older schema versions (see [`crate::migrate`]).
//! 3. Clamp out-of-range numbers to their nearest valid value.
//! 4. Deserialize into [`SchedulerConfig`], filling gaps with defaults.
//! 5. Check cross-field hazards (both auto-skips enabled).
//!
//! Nothing in steps 2, 3, or 5 is fatal. Each produces a
//! [`ConfigWarning`] the caller is expected to log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};

use crate::migrate::{self, CURRENT_SCHEMA_VERSION};

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("failed to access config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse or render YAML content.
    #[error("failed to process config YAML: {source}")]
    Yaml {
        /// The underlying YAML error.
        source: serde_yml::Error,
    },

    /// The document cannot be upgraded to the current schema.
    #[error("config migration failed: {reason}")]
    Migration {
        /// Why the migration failed.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// A non-fatal finding produced while loading configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// The document was upgraded from an older schema version.
    Migrated {
        /// Version before the step.
        from: u32,
        /// Version after the step.
        to: u32,
    },
    /// A value was outside its valid range and was clamped.
    Clamped {
        /// Dotted path of the field, e.g. `phase.day_length_minutes`.
        field: String,
        /// The persisted value.
        original: f64,
        /// The value actually used.
        clamped: f64,
    },
    /// Both auto-skip flags are set; day skipping is suppressed and the
    /// world stays in day.
    ConflictingAutoSkip,
}

impl core::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Migrated { from, to } => {
                write!(f, "old configuration detected, migrated schema v{from} to v{to}")
            }
            Self::Clamped {
                field,
                original,
                clamped,
            } => write!(f, "{field} = {original} is out of range, using {clamped}"),
            Self::ConflictingAutoSkip => f.write_str(
                "auto_skip_day and auto_skip_night are both enabled; night is skipped and day is never skipped",
            ),
        }
    }
}

/// A configuration together with the warnings raised while loading it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// The usable configuration.
    pub config: SchedulerConfig,
    /// Findings the caller should log.
    pub warnings: Vec<ConfigWarning>,
}

impl LoadedConfig {
    /// Whether loading changed the document (and it should be saved back).
    pub fn needs_save(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::Migrated { .. } | ConfigWarning::Clamped { .. }))
    }
}

/// Top-level scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Schema version of the document this config was read from.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Phase lengths and auto-skip policy.
    #[serde(default)]
    pub phase: PhaseConfig,

    /// Vote-to-skip settings.
    #[serde(default)]
    pub vote: VoteConfig,

    /// Authorization levels required by commands.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Freeze-time settings.
    #[serde(default)]
    pub freeze: FreezeConfig,

    /// Driver loop settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            phase: PhaseConfig::default(),
            vote: VoteConfig::default(),
            auth: AuthConfig::default(),
            freeze: FreezeConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse, migrate, clamp, and validate configuration from YAML.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the content is not valid YAML or
    /// does not fit the schema, and [`ConfigError::Migration`] if the
    /// schema version cannot be upgraded.
    pub fn parse(yaml: &str) -> Result<LoadedConfig, ConfigError> {
        let raw: Value = serde_yml::from_str(yaml)?;
        let mut doc = match raw {
            Value::Mapping(mapping) => mapping,
            Value::Null => {
                let mut fresh = Mapping::new();
                fresh.insert(
                    Value::from("schema_version"),
                    Value::from(u64::from(CURRENT_SCHEMA_VERSION)),
                );
                fresh
            }
            other => {
                return Err(ConfigError::Migration {
                    reason: format!("config root must be a mapping, got {other:?}"),
                });
            }
        };

        let mut warnings = migrate::migrate(&mut doc)?;
        warnings.extend(clamp_numbers(&mut doc));

        let config: Self = serde_yml::from_value(Value::Mapping(doc))?;
        warnings.extend(config.validate());
        Ok(LoadedConfig { config, warnings })
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, plus every
    /// error [`parse`](Self::parse) can return.
    pub fn from_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Render this configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Cross-field checks that cannot be expressed as a clamp.
    pub const fn validate(&self) -> Option<ConfigWarning> {
        if self.phase.auto_skip_day && self.phase.auto_skip_night {
            Some(ConfigWarning::ConflictingAutoSkip)
        } else {
            None
        }
    }
}

/// Phase lengths and auto-skip policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Real minutes a day lasts. At least 1.
    #[serde(default = "default_phase_length")]
    pub day_length_minutes: u32,

    /// Real minutes a night lasts. At least 1.
    #[serde(default = "default_phase_length")]
    pub night_length_minutes: u32,

    /// Jump straight from sunrise to sunset.
    #[serde(default)]
    pub auto_skip_day: bool,

    /// Jump straight from sunset to the next sunrise.
    #[serde(default)]
    pub auto_skip_night: bool,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            day_length_minutes: default_phase_length(),
            night_length_minutes: default_phase_length(),
            auto_skip_day: false,
            auto_skip_night: false,
        }
    }
}

/// Vote-to-skip configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteConfig {
    /// Whether players may vote to skip the night.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds a voter must wait between accepted votes. 0 disables it.
    #[serde(default = "default_vote_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Seconds a vote stays open after sunset.
    #[serde(default = "default_vote_duration_seconds")]
    pub duration_seconds: u64,

    /// Percentage of eligible voters needed for quorum (1-100).
    #[serde(default = "default_required_percent")]
    pub required_percent: u32,

    /// Forget voter cooldowns whenever a vote session ends.
    #[serde(default)]
    pub reset_cooldowns_on_session_end: bool,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_seconds: default_vote_cooldown_seconds(),
            duration_seconds: default_vote_duration_seconds(),
            required_percent: default_required_percent(),
            reset_cooldowns_on_session_end: false,
        }
    }
}

/// Authorization levels (0 = player, 1 = moderator, 2 = owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Level needed for length and override commands.
    #[serde(default = "default_commands_level")]
    pub commands_level: u8,

    /// Level needed to freeze or unfreeze time.
    #[serde(default = "default_freeze_level")]
    pub freeze_level: u8,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            commands_level: default_commands_level(),
            freeze_level: default_freeze_level(),
        }
    }
}

/// Freeze-time configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreezeConfig {
    /// Freeze time as soon as the scheduler starts.
    #[serde(default)]
    pub on_load: bool,

    /// Hour the sky is pinned to while frozen.
    #[serde(default = "default_freeze_hour")]
    pub hour: f64,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            on_load: false,
            hour: default_freeze_hour(),
        }
    }
}

/// Driver loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Milliseconds between scheduler ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Milliseconds between start attempts while the clock is unavailable.
    #[serde(default = "default_clock_retry_interval_ms")]
    pub clock_retry_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            clock_retry_interval_ms: default_clock_retry_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log every auto-skipped phase.
    #[serde(default = "default_true")]
    pub log_auto_skip: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_auto_skip: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Clamping
// ---------------------------------------------------------------------------

/// Inclusive `(section, key, min, max)` bounds for numeric fields.
const NUMERIC_BOUNDS: [(&str, &str, f64, f64); 10] = [
    ("phase", "day_length_minutes", 1.0, 10_080.0),
    ("phase", "night_length_minutes", 1.0, 10_080.0),
    ("vote", "cooldown_seconds", 0.0, 86_400.0),
    ("vote", "duration_seconds", 1.0, 86_400.0),
    ("vote", "required_percent", 1.0, 100.0),
    ("auth", "commands_level", 0.0, 2.0),
    ("auth", "freeze_level", 0.0, 2.0),
    ("freeze", "hour", 0.0, 23.999),
    ("engine", "tick_interval_ms", 100.0, 3_600_000.0),
    ("engine", "clock_retry_interval_ms", 100.0, 3_600_000.0),
];

/// Clamp every known numeric field into its valid range, in place.
fn clamp_numbers(doc: &mut Mapping) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    for (section, key, min, max) in NUMERIC_BOUNDS {
        let Some(Value::Mapping(fields)) = doc.get_mut(section) else {
            continue;
        };
        let Some(value) = fields.get_mut(key) else {
            continue;
        };
        let Some(original) = value.as_f64() else {
            continue;
        };
        let clamped = original.clamp(min, max);
        if clamped.total_cmp(&original).is_eq() {
            continue;
        }
        *value = if is_whole(min) && is_whole(max) {
            Value::from(float_to_u64(clamped))
        } else {
            Value::from(clamped)
        };
        warnings.push(ConfigWarning::Clamped {
            field: format!("{section}.{key}"),
            original,
            clamped,
        });
    }
    warnings
}

/// Whether a bound describes an integer field.
fn is_whole(bound: f64) -> bool {
    bound.fract().abs() < f64::EPSILON
}

/// Convert an already clamped, non-negative whole number to `u64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_u64(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Persistent storage for the scheduler configuration.
pub trait ConfigStore: Send {
    /// Load the stored configuration, creating defaults if none exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the stored document cannot be read.
    fn load(&mut self) -> Result<LoadedConfig, ConfigError>;

    /// Persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document cannot be written.
    fn save(&mut self, config: &SchedulerConfig) -> Result<(), ConfigError>;
}

/// A [`ConfigStore`] backed by a YAML file.
#[derive(Debug, Clone)]
pub struct YamlFileStore {
    /// Location of the YAML document.
    path: PathBuf,
}

impl YamlFileStore {
    /// Create a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for YamlFileStore {
    fn load(&mut self) -> Result<LoadedConfig, ConfigError> {
        if !self.path.exists() {
            let config = SchedulerConfig::default();
            self.save(&config)?;
            return Ok(LoadedConfig {
                config,
                warnings: Vec::new(),
            });
        }
        let loaded = SchedulerConfig::from_file(&self.path)?;
        if loaded.needs_save() {
            self.save(&loaded.config)?;
        }
        Ok(loaded)
    }

    fn save(&mut self, config: &SchedulerConfig) -> Result<(), ConfigError> {
        std::fs::write(&self.path, config.to_yaml()?)?;
        Ok(())
    }
}

/// An in-memory [`ConfigStore`], for tests and embedding hosts that keep
/// configuration elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// The last saved document, if any.
    document: Option<String>,
    /// Number of successful saves.
    saves: u32,
}

impl MemoryStore {
    /// Create a store pre-loaded with a YAML document.
    pub fn with_document(yaml: impl Into<String>) -> Self {
        Self {
            document: Some(yaml.into()),
            saves: 0,
        }
    }

    /// The last saved document.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Number of saves performed.
    pub const fn saves(&self) -> u32 {
        self.saves
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Result<LoadedConfig, ConfigError> {
        match &self.document {
            Some(yaml) => SchedulerConfig::parse(yaml),
            None => Ok(LoadedConfig {
                config: SchedulerConfig::default(),
                warnings: Vec::new(),
            }),
        }
    }

    fn save(&mut self, config: &SchedulerConfig) -> Result<(), ConfigError> {
        self.document = Some(config.to_yaml()?);
        self.saves = self.saves.saturating_add(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

const fn default_phase_length() -> u32 {
    30
}

const fn default_vote_cooldown_seconds() -> u64 {
    300
}

const fn default_vote_duration_seconds() -> u64 {
    120
}

const fn default_required_percent() -> u32 {
    50
}

const fn default_commands_level() -> u8 {
    1
}

const fn default_freeze_level() -> u8 {
    2
}

const fn default_freeze_hour() -> f64 {
    12.0
}

const fn default_tick_interval_ms() -> u64 {
    10_000
}

const fn default_clock_retry_interval_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
