//! Configuration parsing and validation for fieldcheckd
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Service paths and session lifecycle tunables
//! - Seed users, schools, and weekly schedule slots
//! - Validation that reports every problem at once

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let settings = parse_config(&content)?;
    tracing::debug!(
        path = %path.display(),
        users = settings.users.len(),
        schools = settings.schools.len(),
        schedules = settings.schedules.len(),
        "Configuration loaded"
    );
    Ok(settings)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcheck_api::Role;
    use std::io::Write;

    const EXAMPLE: &str = r#"
        config_version = 1

        [service]
        socket_path = "/tmp/fieldcheck-test/fieldcheckd.sock"

        [sessions]
        auto_checkout_hours = 10

        [[users]]
        id = "u-prov"
        display_name = "Pat"
        email = "pat@example.org"
        role = "provider"

        [[users]]
        id = "u-admin"
        display_name = "Dana"
        role = "administrator"

        [[schools]]
        id = "s-1"
        name = "Lincoln Elementary"
        latitude = 40.7128
        longitude = -74.0060

        [[schedules]]
        id = "sch-1"
        provider_id = "u-prov"
        school_id = "s-1"
        day = "monday"
        start = "09:00"
        end = "17:00"
        effective_from = "2025-01-01T00:00:00Z"
    "#;

    #[test]
    fn parse_full_config() {
        let settings = parse_config(EXAMPLE).unwrap();
        assert_eq!(settings.users.len(), 2);
        assert_eq!(settings.users[1].role, Role::Administrator);
        assert_eq!(settings.schools[0].check_in_radius_meters, None);
        assert_eq!(settings.schedules.len(), 1);
        assert!(settings.schedules[0].is_active);
        assert_eq!(settings.sessions.auto_checkout_hours, 10);
        assert_eq!(
            settings.service.socket_path,
            Path::new("/tmp/fieldcheck-test/fieldcheckd.sock")
        );
    }

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert!(settings.users.is_empty());
        assert_eq!(settings.sessions.notes_max_length, 1000);
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_config_with_all_errors() {
        let bad = EXAMPLE
            .replace("latitude = 40.7128", "latitude = 140.0")
            .replace("end = \"17:00\"", "end = \"08:00\"");

        match parse_config(&bad) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn huge_session_tunables_fail_validation() {
        for sessions in [
            "auto_checkout_hours = 4000000000",
            "sweep_interval_minutes = 9000000000000000000",
        ] {
            let config = format!("config_version = 1\n\n[sessions]\n{sessions}\n");
            match parse_config(&config) {
                Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 1),
                other => panic!("expected validation failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.schools[0].name, "Lincoln Elementary");

        let missing = file.path().with_extension("missing");
        assert!(matches!(load_config(missing), Err(ConfigError::ReadError(_))));
    }
}
