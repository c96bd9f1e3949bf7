//! The persisted preference record.
//!
//! A single [`Configuration`] exists per background process.  It is built
//! from hard-coded defaults, hydrated from durable storage once, and then
//! mutated one field at a time through the store proxy in `rua-background`.
//!
//! # Record shape
//!
//! The whole record is stored under one storage key ([`STORAGE_KEY`]) as a
//! JSON object:
//!
//! ```json
//! {
//!   "extension_settings_v2": {
//!     "enabled": false,
//!     "useragent": null,
//!     "renew_enabled": true,
//!     "renew_interval": 600000,
//!     "renew_onstartup": true,
//!     "sync": false,
//!     "custom_useragent": { "enabled": false, "value": null, "list": [] },
//!     "javascript_protection_enabled": true,
//!     "generator_types": ["chrome_win", "chrome_mac", "..."],
//!     "exceptions_list": ["chrome://*"]
//!   }
//! }
//! ```
//!
//! # Merge rules
//!
//! Stored records may be partial (written by an older version) or carry a
//! field with the wrong type (hand-edited, corrupted).  [`Configuration::merge_record`]
//! therefore applies the record *field by field*: every recognised field with
//! a valid value overwrites the current one, everything else is skipped and
//! the current value survives.  A partial record can never wipe out defaults.
//!
//! Records written by older versions keep the custom user-agent settings in
//! three flat keys (`custom_useragent_enabled`, `custom_useragent_value`,
//! `custom_useragent_list`).  They are folded into the nested
//! `custom_useragent` object and win over it when both are present.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::merge::deep_merge;

/// Storage key under which the whole configuration record is persisted.
pub const STORAGE_KEY: &str = "extension_settings_v2";

/// Key of the legacy nested fragment imported once on first load.
pub const LEGACY_FRAGMENT_KEY: &str = "data";

/// Flat legacy keys and the `custom_useragent` member each one maps to.
const CUSTOM_USERAGENT_FLAT_KEYS: [(&str, &str); 3] = [
    ("custom_useragent_enabled", "enabled"),
    ("custom_useragent_value", "value"),
    ("custom_useragent_list", "list"),
];

/// Default auto-renew period: ten minutes.
pub const DEFAULT_RENEW_INTERVAL_MS: u64 = 10 * 60 * 1000;

/// Error type for field-level operations on the configuration.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    /// The name does not correspond to any persisted field.
    #[error("unknown setting field: {0}")]
    UnknownField(String),

    /// The value could not be converted to the field's type, or violates a
    /// field constraint.
    #[error("invalid value for setting {field}: {reason}")]
    InvalidValue { field: SettingField, reason: String },
}

// ── Generator types ───────────────────────────────────────────────────────────

/// Template families the user-agent provider may pick from.
///
/// Serialized as snake_case tags (`"chrome_win"`, `"firefox_linux"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorType {
    ChromeWin,
    ChromeMac,
    ChromeLinux,
    ChromeAndroid,
    FirefoxWin,
    FirefoxMac,
    FirefoxLinux,
    FirefoxAndroid,
    EdgeWin,
    SafariMac,
    SafariIphone,
}

impl GeneratorType {
    /// Every known tag, in declaration order.
    pub const ALL: [GeneratorType; 11] = [
        GeneratorType::ChromeWin,
        GeneratorType::ChromeMac,
        GeneratorType::ChromeLinux,
        GeneratorType::ChromeAndroid,
        GeneratorType::FirefoxWin,
        GeneratorType::FirefoxMac,
        GeneratorType::FirefoxLinux,
        GeneratorType::FirefoxAndroid,
        GeneratorType::EdgeWin,
        GeneratorType::SafariMac,
        GeneratorType::SafariIphone,
    ];

    /// Returns the wire tag for this generator type.
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorType::ChromeWin => "chrome_win",
            GeneratorType::ChromeMac => "chrome_mac",
            GeneratorType::ChromeLinux => "chrome_linux",
            GeneratorType::ChromeAndroid => "chrome_android",
            GeneratorType::FirefoxWin => "firefox_win",
            GeneratorType::FirefoxMac => "firefox_mac",
            GeneratorType::FirefoxLinux => "firefox_linux",
            GeneratorType::FirefoxAndroid => "firefox_android",
            GeneratorType::EdgeWin => "edge_win",
            GeneratorType::SafariMac => "safari_mac",
            GeneratorType::SafariIphone => "safari_iphone",
        }
    }

    /// The desktop Chrome and Firefox families enabled on a fresh install.
    pub fn defaults() -> BTreeSet<GeneratorType> {
        [
            GeneratorType::ChromeWin,
            GeneratorType::ChromeMac,
            GeneratorType::ChromeLinux,
            GeneratorType::FirefoxWin,
            GeneratorType::FirefoxMac,
            GeneratorType::FirefoxLinux,
        ]
        .into_iter()
        .collect()
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeneratorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown generator type: {s}"))
    }
}

// ── Field names ───────────────────────────────────────────────────────────────

/// Identifies one persisted field of [`Configuration`].
///
/// Field names cross the message boundary as strings (observers receive
/// them, the store proxy accepts them), so every variant has a stable wire
/// name returned by [`SettingField::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    Enabled,
    Useragent,
    RenewEnabled,
    RenewInterval,
    RenewOnStartup,
    Sync,
    CustomUseragent,
    JavascriptProtectionEnabled,
    GeneratorTypes,
    ExceptionsList,
}

impl SettingField {
    /// Every persisted field, in record order.
    pub const ALL: [SettingField; 10] = [
        SettingField::Enabled,
        SettingField::Useragent,
        SettingField::RenewEnabled,
        SettingField::RenewInterval,
        SettingField::RenewOnStartup,
        SettingField::Sync,
        SettingField::CustomUseragent,
        SettingField::JavascriptProtectionEnabled,
        SettingField::GeneratorTypes,
        SettingField::ExceptionsList,
    ];

    /// Returns the persisted key of this field.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingField::Enabled => "enabled",
            SettingField::Useragent => "useragent",
            SettingField::RenewEnabled => "renew_enabled",
            SettingField::RenewInterval => "renew_interval",
            SettingField::RenewOnStartup => "renew_onstartup",
            SettingField::Sync => "sync",
            SettingField::CustomUseragent => "custom_useragent",
            SettingField::JavascriptProtectionEnabled => "javascript_protection_enabled",
            SettingField::GeneratorTypes => "generator_types",
            SettingField::ExceptionsList => "exceptions_list",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingField {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownField(s.to_string()))
    }
}

// ── Configuration record ──────────────────────────────────────────────────────

/// Settings for the "custom user-agent" mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomUserAgent {
    /// When `true`, renew uses `value` or `list` instead of the generator.
    pub enabled: bool,
    /// A fixed user-agent string.  Takes precedence over `list`.
    pub value: Option<String>,
    /// Candidate strings; renew picks one at random.
    pub list: Vec<String>,
}

/// The single persisted preference record.
///
/// Every field has a default, so the record is always fully defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Whether spoofing is active at all.
    pub enabled: bool,
    /// The currently active spoofed user-agent.
    pub useragent: Option<String>,
    /// Whether the periodic renew timer runs.
    pub renew_enabled: bool,
    /// Renew period in milliseconds.  Always greater than zero.
    #[serde(rename = "renew_interval")]
    pub renew_interval_ms: u64,
    /// Renew once when the background process starts.
    #[serde(rename = "renew_onstartup")]
    pub renew_on_startup: bool,
    /// Selects the synchronized backend instead of local storage.
    #[serde(rename = "sync")]
    pub sync_enabled: bool,
    pub custom_useragent: CustomUserAgent,
    /// Also override `navigator.userAgent` inside pages.
    pub javascript_protection_enabled: bool,
    pub generator_types: BTreeSet<GeneratorType>,
    /// URL glob patterns for which spoofing is suspended.
    #[serde(rename = "exceptions_list")]
    pub exception_patterns: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: false,
            useragent: None,
            renew_enabled: true,
            renew_interval_ms: DEFAULT_RENEW_INTERVAL_MS,
            renew_on_startup: true,
            sync_enabled: false,
            custom_useragent: CustomUserAgent::default(),
            javascript_protection_enabled: true,
            generator_types: GeneratorType::defaults(),
            exception_patterns: vec!["chrome://*".to_string()],
        }
    }
}

impl Configuration {
    /// Returns the current value of `field` as JSON.
    pub fn get(&self, field: SettingField) -> Value {
        match field {
            SettingField::Enabled => Value::Bool(self.enabled),
            SettingField::Useragent => self
                .useragent
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            SettingField::RenewEnabled => Value::Bool(self.renew_enabled),
            SettingField::RenewInterval => Value::from(self.renew_interval_ms),
            SettingField::RenewOnStartup => Value::Bool(self.renew_on_startup),
            SettingField::Sync => Value::Bool(self.sync_enabled),
            SettingField::CustomUseragent => json!({
                "enabled": self.custom_useragent.enabled,
                "value": self.custom_useragent.value,
                "list": self.custom_useragent.list,
            }),
            SettingField::JavascriptProtectionEnabled => {
                Value::Bool(self.javascript_protection_enabled)
            }
            SettingField::GeneratorTypes => Value::Array(
                self.generator_types
                    .iter()
                    .map(|t| Value::String(t.as_str().to_string()))
                    .collect(),
            ),
            SettingField::ExceptionsList => Value::Array(
                self.exception_patterns
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        }
    }

    /// Validates `value` and assigns it to `field`.
    ///
    /// Returns `true` when the stored value actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] when `value` does not have the
    /// field's type, or when `renew_interval` is zero.  The record is left
    /// untouched on error.
    pub fn apply(&mut self, field: SettingField, value: Value) -> Result<bool, SettingsError> {
        let before = self.get(field);
        match field {
            SettingField::Enabled => self.enabled = decode(field, value)?,
            SettingField::Useragent => self.useragent = decode(field, value)?,
            SettingField::RenewEnabled => self.renew_enabled = decode(field, value)?,
            SettingField::RenewInterval => {
                let ms: u64 = decode(field, value)?;
                if ms == 0 {
                    return Err(SettingsError::InvalidValue {
                        field,
                        reason: "interval must be greater than zero".to_string(),
                    });
                }
                self.renew_interval_ms = ms;
            }
            SettingField::RenewOnStartup => self.renew_on_startup = decode(field, value)?,
            SettingField::Sync => self.sync_enabled = decode(field, value)?,
            SettingField::CustomUseragent => self.custom_useragent = decode(field, value)?,
            SettingField::JavascriptProtectionEnabled => {
                self.javascript_protection_enabled = decode(field, value)?
            }
            SettingField::GeneratorTypes => self.generator_types = decode(field, value)?,
            SettingField::ExceptionsList => self.exception_patterns = decode(field, value)?,
        }
        Ok(self.get(field) != before)
    }

    /// Applies a stored (possibly partial) record field by field.
    ///
    /// Unknown keys are ignored.  Fields whose value fails validation are
    /// skipped with a warning so the current value survives.  Returns the
    /// fields whose value changed.
    pub fn merge_record(&mut self, record: &Map<String, Value>) -> Vec<SettingField> {
        let mut changed = Vec::new();
        for (key, value) in record {
            if CUSTOM_USERAGENT_FLAT_KEYS.iter().any(|(flat, _)| flat == key) {
                continue;
            }
            let field = match key.parse::<SettingField>() {
                Ok(field) => field,
                Err(_) => {
                    debug!("ignoring unknown stored setting \"{key}\"");
                    continue;
                }
            };
            match self.apply(field, value.clone()) {
                Ok(true) => changed.push(field),
                Ok(false) => {}
                Err(e) => warn!("skipping stored setting: {e}"),
            }
        }
        if self.merge_flat_custom_useragent(record) && !changed.contains(&SettingField::CustomUseragent) {
            changed.push(SettingField::CustomUseragent);
        }
        changed
    }

    /// Applies the flat `custom_useragent_*` keys of `record`, if any.
    ///
    /// Returns `true` when the custom user-agent settings changed.
    fn merge_flat_custom_useragent(&mut self, record: &Map<String, Value>) -> bool {
        let patch: Map<String, Value> = CUSTOM_USERAGENT_FLAT_KEYS
            .iter()
            .filter_map(|(flat, member)| {
                record.get(*flat).map(|value| (member.to_string(), value.clone()))
            })
            .collect();
        if patch.is_empty() {
            return false;
        }
        let mut custom = self.get(SettingField::CustomUseragent);
        deep_merge(&mut custom, &Value::Object(patch));
        match self.apply(SettingField::CustomUseragent, custom) {
            Ok(changed) => changed,
            Err(e) => {
                warn!("skipping stored flat custom user-agent keys: {e}");
                false
            }
        }
    }

    /// Serializes the whole record as a JSON object keyed by persisted names.
    pub fn to_record(&self) -> Map<String, Value> {
        SettingField::ALL
            .into_iter()
            .map(|field| (field.as_str().to_string(), self.get(field)))
            .collect()
    }

    /// Returns a copy of this record with a nested fragment deep-merged in.
    ///
    /// Objects merge recursively; arrays and scalars in the fragment replace
    /// the current value wholesale.  The merged result is then applied field
    /// by field, so invalid parts of the fragment are skipped.
    pub fn merged_with(&self, fragment: &Value) -> Configuration {
        let mut combined = Value::Object(self.to_record());
        deep_merge(&mut combined, fragment);

        let mut merged = self.clone();
        if let Value::Object(record) = combined {
            merged.merge_record(&record);
        }
        merged
    }

    /// Fields whose value differs between `self` and `other`.
    pub fn diff(&self, other: &Configuration) -> Vec<SettingField> {
        SettingField::ALL
            .into_iter()
            .filter(|&field| self.get(field) != other.get(field))
            .collect()
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    field: SettingField,
    value: Value,
) -> Result<T, SettingsError> {
    serde_json::from_value(value).map_err(|e| SettingsError::InvalidValue {
        field,
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
