use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_UPDATE_ON_TYPE_DELAY_MS: i64 = 1_000;
pub const DEFAULT_DOUBLE_CLICK_THRESHOLD_MS: i64 = 400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateOn {
    #[default]
    OnSave,
    OnType,
}

impl UpdateOn {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOn::OnSave => "onSave",
            UpdateOn::OnType => "onType",
        }
    }
}

impl fmt::Display for UpdateOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateOn {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "onsave" | "save" => Ok(UpdateOn::OnSave),
            "ontype" | "type" => Ok(UpdateOn::OnType),
            other => Err(format!("Unknown update mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewConfig {
    pub update_on: UpdateOn,
    /// Milliseconds; negative values behave as zero.
    pub update_on_type_delay: i64,
    /// Milliseconds; negative values behave as zero.
    pub double_click_threshold: i64,
    pub supported_languages: Vec<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            update_on: UpdateOn::OnSave,
            update_on_type_delay: DEFAULT_UPDATE_ON_TYPE_DELAY_MS,
            double_click_threshold: DEFAULT_DOUBLE_CLICK_THRESHOLD_MS,
            supported_languages: vec![
                "javascript".to_string(),
                "javascriptreact".to_string(),
                "typescript".to_string(),
                "typescriptreact".to_string(),
            ],
        }
    }
}

/// Partial update applied at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_on: Option<UpdateOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_on_type_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_click_threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_languages: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn clamp_millis(value: i64) -> Duration {
    Duration::from_millis(value.max(0) as u64)
}

impl ViewConfig {
    pub fn debounce_delay(&self) -> Duration {
        clamp_millis(self.update_on_type_delay)
    }

    pub fn double_click_window(&self) -> Duration {
        clamp_millis(self.double_click_threshold)
    }

    pub fn supports_language(&self, language_id: &str) -> bool {
        self.supported_languages
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(language_id))
    }

    pub fn apply(&mut self, patch: ViewConfigPatch) {
        if let Some(update_on) = patch.update_on {
            self.update_on = update_on;
        }
        if let Some(delay) = patch.update_on_type_delay {
            self.update_on_type_delay = delay;
        }
        if let Some(threshold) = patch.double_click_threshold {
            self.double_click_threshold = threshold;
        }
        if let Some(languages) = patch.supported_languages {
            self.supported_languages = languages;
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Missing files yield the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn negative_durations_clamp_to_zero() {
        let config = ViewConfig {
            update_on_type_delay: -20,
            double_click_threshold: -1,
            ..ViewConfig::default()
        };
        assert_eq!(config.debounce_delay(), Duration::ZERO);
        assert_eq!(config.double_click_window(), Duration::ZERO);
    }

    #[test]
    fn toml_uses_host_setting_names_and_keeps_defaults() {
        let config = ViewConfig::from_toml_str(
            r#"
updateOn = "onType"
updateOnTypeDelay = 300
"#,
        )
        .expect("parse config");
        assert_eq!(config.update_on, UpdateOn::OnType);
        assert_eq!(config.debounce_delay(), Duration::from_millis(300));
        assert_eq!(
            config.double_click_threshold,
            DEFAULT_DOUBLE_CLICK_THRESHOLD_MS
        );
        assert!(config.supports_language("TypeScript"));
        assert!(!config.supports_language("rust"));
    }

    #[test]
    fn load_reads_file_and_tolerates_missing_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");
        assert_eq!(
            ViewConfig::load(&missing).expect("missing ok"),
            ViewConfig::default()
        );

        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).expect("create");
        writeln!(file, "doubleClickThreshold = 250").expect("write");
        let config = ViewConfig::load(&path).expect("load");
        assert_eq!(config.double_click_window(), Duration::from_millis(250));

        fs::write(&path, "updateOn = 12").expect("rewrite");
        assert!(matches!(ViewConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut config = ViewConfig::default();
        config.apply(ViewConfigPatch {
            update_on: Some(UpdateOn::OnType),
            ..ViewConfigPatch::default()
        });
        assert_eq!(config.update_on, UpdateOn::OnType);
        assert_eq!(config.update_on_type_delay, DEFAULT_UPDATE_ON_TYPE_DELAY_MS);
    }

    #[test]
    fn update_mode_parses_cli_spellings() {
        assert_eq!("on-type".parse::<UpdateOn>(), Ok(UpdateOn::OnType));
        assert_eq!("onSave".parse::<UpdateOn>(), Ok(UpdateOn::OnSave));
        assert!("later".parse::<UpdateOn>().is_err());
    }
}
