//! Settings for the litedb command line.
//!
//! Settings are read from `litedb.toml` in the working directory when it
//! exists, or from the file given with `--config`. Every field is optional:
//!
//! ```toml
//! driver = "sqlite"
//! init_query = "PRAGMA foreign_keys = ON"
//! require_exists = false
//! builtin_functions = true
//! backup_step = 1024
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::db::{DEFAULT_DRIVER, Options, backup};

/// Default settings file name.
pub const DEFAULT_FILE: &str = "litedb.toml";

/// Backup steps above this many pages hold the source lock for long.
const LARGE_BACKUP_STEP: i32 = 1 << 16;

/// Result of settings validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Driver and backup settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Name the driver configuration is installed under.
    pub driver: String,
    /// SQL run on every new connection.
    pub init_query: Option<String>,
    /// Refuse to open database files that do not exist.
    pub require_exists: bool,
    /// Install `iptoa`, `atoip` and `polygon`.
    pub builtin_functions: bool,
    /// Pages copied per backup step.
    pub backup_step: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            init_query: None,
            require_exists: false,
            builtin_functions: true,
            backup_step: backup::DEFAULT_STEP,
        }
    }
}

impl Settings {
    /// Load `litedb.toml` from the current directory, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_FILE).exists() {
            Self::load_from(DEFAULT_FILE)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - A field has the wrong type or is unknown
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Validate settings.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver name is empty or the backup step is
    /// not positive.
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.driver.trim().is_empty() {
            errors.push("driver cannot be empty".to_string());
        }

        if self.backup_step <= 0 {
            errors.push(format!(
                "backup_step must be positive (got: {})\n  \
                 Default: {}",
                self.backup_step,
                backup::DEFAULT_STEP
            ));
        } else if self.backup_step > LARGE_BACKUP_STEP {
            warnings.push(format!(
                "backup_step {} is very high (> {LARGE_BACKUP_STEP})\n  \
                 Each step holds the source database lock until it completes",
                self.backup_step
            ));
        }

        if let Some(query) = &self.init_query
            && query.trim().is_empty()
        {
            warnings.push("init_query is empty and will be ignored".to_string());
        }

        let customized =
            self.init_query.is_some() || self.require_exists || !self.builtin_functions;
        if self.driver == DEFAULT_DRIVER && customized {
            warnings.push(format!(
                "custom settings under the default driver name '{DEFAULT_DRIVER}'\n  \
                 Only the first configuration installed under a name is used; \
                 set `driver` to a name of its own"
            ));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }

    /// Database options for these settings.
    pub fn options(&self) -> Options {
        let mut options = Options::new()
            .with_driver(&self.driver)
            .with_exists(self.require_exists);
        if !self.builtin_functions {
            options = options.without_builtins();
        }
        if let Some(query) = &self.init_query {
            options = options.with_query(query);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.driver, "sqlite");
        assert_eq!(settings.backup_step, 1024);
        assert!(settings.builtin_functions);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
driver = "fk"
init_query = "PRAGMA foreign_keys = ON"
require_exists = true
builtin_functions = false
backup_step = 64
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.driver, "fk");
        assert_eq!(settings.init_query.as_deref(), Some("PRAGMA foreign_keys = ON"));
        assert!(settings.require_exists);
        assert!(!settings.builtin_functions);
        assert_eq!(settings.backup_step, 64);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(toml::from_str::<Settings>("drvier = \"x\"").is_err());
    }

    #[test]
    fn test_validate_defaults() {
        let result = Settings::default().validate().unwrap();
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_validate_empty_driver() {
        let settings = Settings {
            driver: " ".to_string(),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("driver cannot be empty"));
    }

    #[test]
    fn test_validate_backup_step() {
        let zero = Settings {
            backup_step: 0,
            ..Settings::default()
        };
        assert!(zero.validate().unwrap_err().to_string().contains("backup_step"));

        let huge = Settings {
            backup_step: 1 << 20,
            ..Settings::default()
        };
        let result = huge.validate().unwrap();
        assert!(result.warnings[0].contains("very high"));
    }

    #[test]
    fn test_validate_custom_default_driver_warns() {
        let settings = Settings {
            init_query: Some("PRAGMA foreign_keys = ON".to_string()),
            ..Settings::default()
        };
        let result = settings.validate().unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("default driver"));

        let named = Settings {
            driver: "fk".to_string(),
            ..settings
        };
        assert!(!named.validate().unwrap().has_warnings());
    }

    #[test]
    fn test_options_follow_settings() {
        let settings = Settings {
            driver: "plain".to_string(),
            init_query: Some("PRAGMA foreign_keys = ON".to_string()),
            require_exists: true,
            builtin_functions: false,
            backup_step: 8,
        };
        let options = settings.options();
        assert_eq!(options.driver_name(), "plain");
        assert!(options.config().require_exists);
        assert!(options.config().functions.is_empty());
        assert_eq!(
            options.config().init_query.as_deref(),
            Some("PRAGMA foreign_keys = ON")
        );
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("litedb.toml");
        std::fs::write(&path, "backup_step = 16\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.backup_step, 16);
        assert_eq!(settings.driver, "sqlite");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "backup_step = \"many\"\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
