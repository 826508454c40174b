//! Engine configuration
//!
//! Loaded from TOML. Resolution order for the file:
//! 1. `CONVERGE_CONFIG` environment variable (`~` and `$VARS` expanded)
//! 2. `<platform config dir>/converge/config.toml`
//!
//! A missing file means defaults. `CONVERGE_WHY_RUN` overrides `why_run`
//! after the file is read.
//!
//! ```toml
//! why_run = true
//!
//! [shell_out]
//! locale = "C.UTF-8"
//! environment = { PATH = "/usr/sbin:/usr/bin:/sbin:/bin" }
//! ```

use crate::error::ConvergeError;
use crate::shell_out::ShellOutConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable for the config file path
pub const ENV_CONFIG: &str = "CONVERGE_CONFIG";

/// Environment variable overriding why-run mode
pub const ENV_WHY_RUN: &str = "CONVERGE_WHY_RUN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Report what would change without changing it
    #[serde(default)]
    pub why_run: bool,

    #[serde(default)]
    pub shell_out: ShellOutConfig,
}

impl Config {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| ConvergeError::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, falling back to defaults, then apply env overrides
    pub fn load_default() -> Result<Self> {
        let mut config = match default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            Some(path) => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        if let Some(value) = std::env::var_os(ENV_WHY_RUN) {
            let value = value.to_string_lossy();
            config.why_run = parse_flag(&value).with_context(|| {
                format!("{ENV_WHY_RUN} must be a boolean, got '{value}'")
            })?;
            log::debug!("why_run = {} from {}", config.why_run, ENV_WHY_RUN);
        }

        Ok(config)
    }
}

/// Path of the config file that `load_default` reads
pub fn default_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let expanded = shellexpand::full(&path)
            .map(|p| p.into_owned())
            .unwrap_or(path);
        return Some(PathBuf::from(expanded));
    }

    dirs::config_dir().map(|dir| dir.join("converge").join("config.toml"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, PoisonError};
    use tempfile::NamedTempFile;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    /// Run `f` with each variable set (`Some`) or removed (`None`), then restore them
    #[allow(unsafe_code)]
    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved: Vec<_> = vars
            .iter()
            .map(|(key, _)| (*key, std::env::var_os(key)))
            .collect();

        for (key, value) in vars {
            // SAFETY: every test touching these variables holds ENV_LOCK
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in saved {
            // SAFETY: as above
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
        result
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.why_run);
        assert_eq!(config.shell_out.locale, "C");
        assert!(config.shell_out.environment.is_empty());
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
why_run = true

[shell_out]
locale = "C.UTF-8"
environment = { PATH = "/usr/bin:/bin" }
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert!(config.why_run);
        assert_eq!(config.shell_out.locale, "C.UTF-8");
        assert_eq!(
            config.shell_out.environment.get("PATH").map(String::as_str),
            Some("/usr/bin:/bin")
        );
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let file = write_config("[shell_out]\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file() {
        let file = write_config("why_run = \"sometimes\"");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvergeError>(),
            Some(ConvergeError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_load_default_reads_config_env() {
        let file = write_config("why_run = true\n[shell_out]\nlocale = \"C.UTF-8\"\n");
        let path = file.path().to_str().unwrap();

        let config = with_env(&[(ENV_CONFIG, Some(path)), (ENV_WHY_RUN, None)], || {
            Config::load_default().unwrap()
        });

        assert!(config.why_run);
        assert_eq!(config.shell_out.locale, "C.UTF-8");
    }

    #[test]
    fn test_config_env_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        let path = with_env(
            &[
                ("CONVERGE_TEST_CONFIG_DIR", Some(dir_str)),
                (ENV_CONFIG, Some("$CONVERGE_TEST_CONFIG_DIR/config.toml")),
            ],
            default_path,
        );
        assert_eq!(path, Some(dir.path().join("config.toml")));

        if let Some(home) = dirs::home_dir() {
            let path = with_env(&[(ENV_CONFIG, Some("~/converge.toml"))], default_path);
            assert_eq!(path, Some(home.join("converge.toml")));
        }
    }

    #[test]
    fn test_default_path_uses_platform_config_dir() {
        let path = with_env(&[(ENV_CONFIG, None)], default_path);
        let expected = dirs::config_dir().map(|dir| dir.join("converge").join("config.toml"));
        assert_eq!(path, expected);
    }

    #[test]
    fn test_load_default_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");

        let config = with_env(
            &[(ENV_CONFIG, absent.to_str()), (ENV_WHY_RUN, None)],
            || Config::load_default().unwrap(),
        );

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_why_run_env_overrides_file() {
        let file = write_config("why_run = false\n");
        let path = file.path().to_str().unwrap();

        let config = with_env(
            &[(ENV_CONFIG, Some(path)), (ENV_WHY_RUN, Some("yes"))],
            || Config::load_default().unwrap(),
        );

        assert!(config.why_run);
    }

    #[test]
    fn test_why_run_env_must_be_boolean() {
        let file = write_config("why_run = false\n");
        let path = file.path().to_str().unwrap();

        let err = with_env(
            &[(ENV_CONFIG, Some(path)), (ENV_WHY_RUN, Some("maybe"))],
            || Config::load_default().unwrap_err(),
        );

        assert!(err.to_string().contains("CONVERGE_WHY_RUN must be a boolean"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("on"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
