//! Schema migration for persisted scheduler configuration.
//!
//! Configuration files carry a `schema_version`. Older files are upgraded
//! in place, one version gap at a time and in strictly ascending order,
//! before the typed config is deserialized. A missing version means the
//! original flat layout (v1).
//!
//! | From | To | Change |
//! |------|----|--------|
//! | 1 | 2 | Flat keys grouped into `phase`, `auth`, `freeze`, `logging` |
//! | 2 | 3 | `vote` section added (disabled for upgraded files) |

use serde_yml::{Mapping, Value};

use crate::config::{ConfigError, ConfigWarning};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Key holding the schema version at the document root.
const VERSION_KEY: &str = "schema_version";

/// One upgrade step, turning a document at `from` into `from + 1`.
type Upgrade = fn(&mut Mapping);

/// Upgrade steps indexed by their source version.
const UPGRADES: [(u32, Upgrade); 2] = [(1, upgrade_v1_to_v2), (2, upgrade_v2_to_v3)];

/// Read the schema version of a raw document.
///
/// # Errors
///
/// Returns [`ConfigError::Migration`] if the version field is present but
/// not a non-negative integer.
pub fn schema_version(doc: &Mapping) -> Result<u32, ConfigError> {
    match doc.get(VERSION_KEY) {
        None | Some(Value::Null) => Ok(1),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ConfigError::Migration {
                reason: format!("{VERSION_KEY} must be a non-negative integer, got {value:?}"),
            }),
    }
}

/// Upgrade a raw document to [`CURRENT_SCHEMA_VERSION`].
///
/// Returns one [`ConfigWarning::Migrated`] per applied step. A document
/// already at the current version is left untouched.
///
/// # Errors
///
/// Returns [`ConfigError::Migration`] if the document was written by a
/// newer build, or carries an unreadable version.
pub fn migrate(doc: &mut Mapping) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut version = schema_version(doc)?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(ConfigError::Migration {
            reason: format!(
                "config schema version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            ),
        });
    }
    if version == 0 {
        return Err(ConfigError::Migration {
            reason: "config schema version 0 does not exist".to_owned(),
        });
    }

    let mut warnings = Vec::new();
    for (from, upgrade) in UPGRADES {
        if from != version {
            continue;
        }
        upgrade(doc);
        let to = from.saturating_add(1);
        doc.insert(Value::from(VERSION_KEY), Value::from(u64::from(to)));
        warnings.push(ConfigWarning::Migrated { from, to });
        version = to;
    }
    Ok(warnings)
}

/// v1 to v2: group the flat plugin keys into sections.
fn upgrade_v1_to_v2(doc: &mut Mapping) {
    let moves: [(&str, &str, &str); 9] = [
        ("day_length", "phase", "day_length_minutes"),
        ("night_length", "phase", "night_length_minutes"),
        ("auto_skip_day", "phase", "auto_skip_day"),
        ("auto_skip_night", "phase", "auto_skip_night"),
        ("auth_level_cmds", "auth", "commands_level"),
        ("auth_level_freeze", "auth", "freeze_level"),
        ("freeze_time_on_load", "freeze", "on_load"),
        ("time_to_freeze", "freeze", "hour"),
        ("log_auto_skip_console", "logging", "log_auto_skip"),
    ];
    for (old_key, section, new_key) in moves {
        let Some(value) = doc.remove(old_key) else {
            continue;
        };
        if let Some(target) = section_mut(doc, section) {
            target.insert(Value::from(new_key), value);
        }
    }
}

/// v2 to v3: introduce vote-to-skip, off for configs written before it existed.
fn upgrade_v2_to_v3(doc: &mut Mapping) {
    if let Some(vote) = section_mut(doc, "vote") {
        if vote.get("enabled").is_none() {
            vote.insert(Value::from("enabled"), Value::Bool(false));
        }
    }
}

/// Fetch (or create) a nested mapping under `key`.
///
/// A non-mapping value at `key` is replaced.
pub(crate) fn section_mut<'a>(doc: &'a mut Mapping, key: &str) -> Option<&'a mut Mapping> {
    if !matches!(doc.get(key), Some(Value::Mapping(_))) {
        doc.insert(Value::from(key), Value::Mapping(Mapping::new()));
    }
    doc.get_mut(key).and_then(Value::as_mapping_mut)
}
