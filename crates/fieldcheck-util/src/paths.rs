//! Default paths for fieldcheck components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/fieldcheck/config.toml` or `~/.config/fieldcheck/config.toml`
//! - Socket: `$XDG_RUNTIME_DIR/fieldcheck/fieldcheckd.sock` or `/tmp/fieldcheck-$USER/fieldcheckd.sock`
//! - Data: `$XDG_DATA_HOME/fieldcheck` or `~/.local/share/fieldcheck`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const FIELDCHECK_SOCKET_ENV: &str = "FIELDCHECK_SOCKET";

/// Environment variable for overriding the data directory
pub const FIELDCHECK_DATA_DIR_ENV: &str = "FIELDCHECK_DATA_DIR";

const SOCKET_FILENAME: &str = "fieldcheckd.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "fieldcheck";

/// Resolve `$XDG_<name>` or fall back to `$HOME/<fallback>`, then `/tmp`
fn xdg_dir(var: &str, home_fallback: &[&str], last_resort: &str) -> PathBuf {
    if let Ok(dir) = std::env::var(var) {
        return PathBuf::from(dir).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        let mut path = PathBuf::from(home);
        path.extend(home_fallback);
        return path.join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(last_resort)
}

/// Default socket path.
///
/// Order of precedence:
/// 1. `$FIELDCHECK_SOCKET`
/// 2. `$XDG_RUNTIME_DIR/fieldcheck/fieldcheckd.sock`
/// 3. `/tmp/fieldcheck-$USER/fieldcheckd.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(FIELDCHECK_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path ignoring `$FIELDCHECK_SOCKET`, for config defaults where the
/// override is applied separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Default data directory (holds the session database).
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(FIELDCHECK_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

pub fn data_dir_without_env() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"], "data")
}

pub fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"], "config").join(CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_names_the_daemon() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("fieldcheck"));
        assert!(path.to_string_lossy().ends_with("fieldcheckd.sock"));
    }

    #[test]
    fn data_dir_is_app_scoped() {
        assert!(data_dir_without_env().to_string_lossy().contains("fieldcheck"));
    }

    #[test]
    fn config_path_is_a_toml_file() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), "config.toml");
        assert!(path.to_string_lossy().contains("fieldcheck"));
    }
}
