//! Process configuration read from the environment at startup.

use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "ATTENDD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ATTENDD_LOG_DIR";
pub const ENV_WORKSPACE: &str = "ATTENDD_WORKSPACE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    /// Values that were rejected and replaced by defaults, reported once logging is up.
    pub warnings: Vec<String>,
}

impl DaemonConfig {
    pub fn from_env() -> DaemonConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> DaemonConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let log_level = match lookup(ENV_LOG_LEVEL) {
            Some(raw) if !raw.trim().is_empty() => match normalize_level(&raw) {
                Some(level) => level,
                None => {
                    warnings.push(format!("{ENV_LOG_LEVEL}: unsupported level `{}`", raw.trim()));
                    default_log_level()
                }
            },
            _ => default_log_level(),
        };

        let log_dir = match non_empty(lookup(ENV_LOG_DIR)) {
            Some(raw) => {
                let p = PathBuf::from(&raw);
                if p.is_absolute() {
                    Some(p)
                } else {
                    warnings.push(format!("{ENV_LOG_DIR}: `{raw}` is not absolute, logging to stderr"));
                    None
                }
            }
            None => None,
        };

        let workspace = non_empty(lookup(ENV_WORKSPACE)).map(PathBuf::from);

        DaemonConfig {
            log_level,
            log_dir,
            workspace,
            warnings,
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}
