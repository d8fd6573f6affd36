use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};
use testlens_core::config::{UpdateOn, ViewConfig, ViewConfigPatch};

/// Flag values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub update_on: Option<UpdateOn>,
    pub update_on_type_delay: Option<i64>,
    pub double_click_threshold: Option<i64>,
}

impl Overrides {
    fn into_patch(self) -> ViewConfigPatch {
        ViewConfigPatch {
            update_on: self.update_on,
            update_on_type_delay: self.update_on_type_delay,
            double_click_threshold: self.double_click_threshold,
            supported_languages: None,
        }
    }
}

pub fn load_view_config(flag: Option<&Path>, overrides: Overrides) -> anyhow::Result<ViewConfig> {
    let path = match flag {
        Some(path) => path.to_path_buf(),
        None => config_path(|key| env::var(key).ok()),
    };
    let mut config = ViewConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.apply(overrides.into_patch());
    Ok(config)
}

pub fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(path) = var("TESTLENS_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let config_dir = match var("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config"),
    };
    config_dir.join("testlens/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_path_variable_wins() {
        let path = config_path(env_of(&[
            ("TESTLENS_CONFIG_PATH", "/etc/testlens.toml"),
            ("XDG_CONFIG_HOME", "/xdg"),
        ]));
        assert_eq!(path, PathBuf::from("/etc/testlens.toml"));
    }

    #[test]
    fn falls_back_to_xdg_then_home() {
        assert_eq!(
            config_path(env_of(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/dev")])),
            PathBuf::from("/xdg/testlens/config.toml")
        );
        assert_eq!(
            config_path(env_of(&[("XDG_CONFIG_HOME", " "), ("HOME", "/home/dev")])),
            PathBuf::from("/home/dev/.config/testlens/config.toml")
        );
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "updateOn = \"onType\"\nupdateOnTypeDelay = 750").expect("write");

        let config = load_view_config(
            Some(file.path()),
            Overrides {
                update_on_type_delay: Some(200),
                ..Overrides::default()
            },
        )
        .expect("config");

        assert_eq!(config.update_on, UpdateOn::OnType);
        assert_eq!(config.update_on_type_delay, 200);
        assert_eq!(config.double_click_threshold, 400);
    }

    #[test]
    fn broken_file_is_reported_with_its_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "updateOn = [").expect("write");

        let err = load_view_config(Some(file.path()), Overrides::default()).expect_err("invalid");
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }
}
