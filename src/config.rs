//! # Stage: Experiment Configuration
//!
//! ## Responsibility
//! Per-controller settings (save key and check timing) and a TOML file format
//! that lists them for several experiments:
//!
//! ```toml
//! [experiments.ButtonColorTest]
//! check_timing = "every_time"
//! save_key = "ButtonColorTestPattern"
//! ```
//!
//! Both fields are optional. `check_timing` defaults to `once`, `save_key` to
//! `<name>Pattern`.
//!
//! ## NOT Responsible For
//! - Decision functions (supplied in code by the host)
//! - Storing resolved patterns (see [`crate::store`])

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pattern::CheckTiming;

/// Suffix appended to an experiment name to form its default save key.
pub const SAVE_KEY_SUFFIX: &str = "Pattern";

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Settings for one [`ExperimentController`](crate::controller::ExperimentController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Store key under which a `Once` pattern is persisted. Shared by every
    /// instance of the same experiment type.
    pub save_key: String,
    pub check_timing: CheckTiming,
}

impl ControllerConfig {
    pub fn new(save_key: impl Into<String>, check_timing: CheckTiming) -> Self {
        Self { save_key: save_key.into(), check_timing }
    }

    /// Derive the save key from the unqualified name of `T`, e.g.
    /// `my_app::ButtonColorTest` → `"ButtonColorTestPattern"`.
    pub fn for_type<T: ?Sized>(check_timing: CheckTiming) -> Self {
        Self::new(default_save_key(short_type_name::<T>()), check_timing)
    }
}

fn default_save_key(name: &str) -> String {
    format!("{}{}", name, SAVE_KEY_SUFFIX)
}

/// `std::any::type_name` without the module path or generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ---------------------------------------------------------------------------
// ExperimentsConfig — TOML file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ExperimentEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    save_key: Option<String>,
    #[serde(default)]
    check_timing: CheckTiming,
}

/// A set of named experiment settings loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentsConfig {
    #[serde(default)]
    experiments: BTreeMap<String, ExperimentEntry>,
}

impl ExperimentsConfig {
    /// Parse from a TOML string.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML or unknown timing values,
    /// [`ConfigError::EmptySaveKey`] when a section sets `save_key = ""`.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ExperimentsConfig = toml::from_str(s)?;
        for (name, entry) in &config.experiments {
            if entry.save_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                return Err(ConfigError::EmptySaveKey(name.clone()));
            }
        }
        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), experiments = config.experiments.len(), "loaded experiments config");
        Ok(config)
    }

    /// Settings for experiment `name`. Unknown names get the defaults.
    pub fn controller_config(&self, name: &str) -> ControllerConfig {
        match self.experiments.get(name) {
            Some(entry) => ControllerConfig::new(
                entry.save_key.clone().unwrap_or_else(|| default_save_key(name)),
                entry.check_timing,
            ),
            None => ControllerConfig::new(default_save_key(name), CheckTiming::default()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.experiments.contains_key(name)
    }

    /// Configured experiment names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[allow(dead_code)]
    struct ButtonColorTest;

    mod nested {
        #[allow(dead_code)]
        pub struct Generic<T>(pub T);
    }

    #[test]
    fn test_for_type_uses_short_name() {
        let c = ControllerConfig::for_type::<ButtonColorTest>(CheckTiming::Once);
        assert_eq!(c.save_key, "ButtonColorTestPattern");
        assert_eq!(c.check_timing, CheckTiming::Once);
    }

    #[test]
    fn test_for_type_strips_generics_and_path() {
        let c = ControllerConfig::for_type::<nested::Generic<u8>>(CheckTiming::EveryTime);
        assert_eq!(c.save_key, "GenericPattern");
    }

    #[test]
    fn test_parse_full_entry() {
        let cfg = ExperimentsConfig::from_toml_str(
            r#"
            [experiments.ButtonColorTest]
            check_timing = "every_time"
            save_key = "button_color"
            "#,
        )
        .unwrap();
        let c = cfg.controller_config("ButtonColorTest");
        assert_eq!(c.save_key, "button_color");
        assert_eq!(c.check_timing, CheckTiming::EveryTime);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let cfg = ExperimentsConfig::from_toml_str("[experiments.Onboarding]\n").unwrap();
        let c = cfg.controller_config("Onboarding");
        assert_eq!(c.save_key, "OnboardingPattern");
        assert_eq!(c.check_timing, CheckTiming::Once);
    }

    #[test]
    fn test_unknown_experiment_gets_defaults() {
        let cfg = ExperimentsConfig::default();
        assert!(!cfg.contains("Nope"));
        assert_eq!(cfg.controller_config("Nope").save_key, "NopePattern");
    }

    #[test]
    fn test_empty_document_is_valid() {
        let cfg = ExperimentsConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.names().count(), 0);
    }

    #[test]
    fn test_bad_timing_is_parse_error() {
        let err = ExperimentsConfig::from_toml_str(
            "[experiments.X]\ncheck_timing = \"sometimes\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "err={:?}", err);
    }

    #[test]
    fn test_empty_save_key_rejected() {
        let err = ExperimentsConfig::from_toml_str("[experiments.X]\nsave_key = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptySaveKey(ref n) if n == "X"));
    }

    #[test]
    fn test_names_sorted() {
        let cfg = ExperimentsConfig::from_toml_str("[experiments.b]\n[experiments.a]\n").unwrap();
        assert_eq!(cfg.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[experiments.Checkout]\ncheck_timing = \"once\"").unwrap();
        let cfg = ExperimentsConfig::load(file.path()).unwrap();
        assert!(cfg.contains("Checkout"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ExperimentsConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
