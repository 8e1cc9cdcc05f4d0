//! Key/value configuration blobs and the generator's resource defaults.
//!
//! `Configuration` is the opaque bag that travels with plans, job graphs and
//! task configs. `GeneratorConfig` holds the defaults that the compiler stamps
//! into every resource assignment of one compilation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Integer(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

/// Ordered key/value map. BTreeMap keeps iteration (and therefore hashing)
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, ConfigValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_integer(&self, key: &str, default: i64) -> i64 {
        match self.entries.get(key) {
            Some(ConfigValue::Integer(v)) => *v,
            Some(ConfigValue::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.entries.get(key) {
            Some(ConfigValue::Float(v)) => *v,
            Some(ConfigValue::Integer(v)) => *v as f64,
            Some(ConfigValue::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.entries.get(key) {
            Some(ConfigValue::Bool(v)) => *v,
            Some(ConfigValue::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ConfigValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Copy every entry of `other` into `self`, overwriting existing keys.
    pub fn merge_from(&mut self, other: &Configuration) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    /// Copy every entry of `other` into `self` with `prefix` prepended to the key.
    pub fn merge_prefixed(&mut self, prefix: &str, other: &Configuration) {
        for (k, v) in &other.entries {
            self.entries.insert(format!("{prefix}{k}"), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .keys()
            .filter(move |k| k.starts_with(prefix))
            .map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key for the maximum number of spill files merged at once.
pub const SPILLING_MAX_FAN_KEY: &str = "jobgen.spilling.max-fan";
/// Key for the memory fill fraction that triggers sort spilling.
pub const SORT_SPILLING_THRESHOLD_KEY: &str = "jobgen.spilling.sort-threshold";

pub const DEFAULT_SPILLING_MAX_FAN: u32 = 128;
pub const DEFAULT_SORT_SPILLING_THRESHOLD: f32 = 0.8;

/// Resource defaults applied uniformly to every assignment in one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Maximum fan-in of a merge before spilling.
    pub spilling_max_fan: u32,

    /// Fraction of the memory budget that may fill before a sorter spills.
    pub sort_spilling_threshold: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            spilling_max_fan: DEFAULT_SPILLING_MAX_FAN,
            sort_spilling_threshold: DEFAULT_SORT_SPILLING_THRESHOLD,
        }
    }
}

impl GeneratorConfig {
    /// Read the defaults out of a configuration, falling back to the hard
    /// defaults for missing or unparsable keys.
    pub fn from_configuration(config: &Configuration) -> Self {
        let max_fan = config.get_integer(SPILLING_MAX_FAN_KEY, DEFAULT_SPILLING_MAX_FAN as i64);
        let threshold = config.get_float(
            SORT_SPILLING_THRESHOLD_KEY,
            DEFAULT_SORT_SPILLING_THRESHOLD as f64,
        );
        Self {
            spilling_max_fan: u32::try_from(max_fan).unwrap_or(DEFAULT_SPILLING_MAX_FAN),
            sort_spilling_threshold: threshold as f32,
        }
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `JOBGEN_SPILLING_MAX_FAN`: max merge fan-in
    /// - `JOBGEN_SORT_SPILLING_THRESHOLD`: spill threshold fraction
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("JOBGEN_SPILLING_MAX_FAN") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.spilling_max_fan = v;
            }
        }

        if let Ok(s) = std::env::var("JOBGEN_SORT_SPILLING_THRESHOLD") {
            if let Ok(v) = s.parse::<f32>() {
                cfg.sort_spilling_threshold = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.spilling_max_fan < 2 {
            return Err(Error::Config(format!(
                "spilling max fan must be at least 2, got {}",
                self.spilling_max_fan
            )));
        }
        if !(self.sort_spilling_threshold > 0.0 && self.sort_spilling_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "sort spilling threshold must be in (0, 1], got {}",
                self.sort_spilling_threshold
            )));
        }
        Ok(())
    }
}
