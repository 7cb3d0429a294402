//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use textgen_core::DEFAULT_MODEL_PATH;

/// Runtime configuration for textgen-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://textgen.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Model used when neither the request nor the role profile names one.
    pub default_model_path: String,

    /// Keep loaded models in memory between requests.
    pub cache_models: bool,

    /// Fail generations that run longer than this. `None` waits forever.
    pub generation_timeout: Option<Duration>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Comma-separated list of allowed CORS origins. `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Number of chat records shown on the index page.
    pub history_limit: u32,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("TEXTGEN_BIND", "0.0.0.0:8000"),
            database_url: env_or("TEXTGEN_DATABASE_URL", "sqlite://textgen.db?mode=rwc"),
            log_level: env_or("TEXTGEN_LOG", "info"),
            log_json: env_flag("TEXTGEN_LOG_JSON", false),
            default_model_path: env_or("TEXTGEN_DEFAULT_MODEL_PATH", DEFAULT_MODEL_PATH),
            cache_models: env_flag("TEXTGEN_CACHE_MODELS", true),
            generation_timeout: std::env::var("TEXTGEN_GENERATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            enable_swagger: env_flag("TEXTGEN_ENABLE_SWAGGER", true),
            cors_allowed_origins: std::env::var("TEXTGEN_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            history_limit: parse_env("TEXTGEN_HISTORY_LIMIT", 100),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_owned(),
            database_url: "sqlite://textgen.db?mode=rwc".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            default_model_path: DEFAULT_MODEL_PATH.to_owned(),
            cache_models: true,
            generation_timeout: None,
            enable_swagger: true,
            cors_allowed_origins: None,
            history_limit: 100,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_address, "0.0.0.0:8000");
        assert_eq!(cfg.default_model_path, DEFAULT_MODEL_PATH);
        assert!(cfg.cache_models);
        assert!(cfg.generation_timeout.is_none());
        assert_eq!(cfg.history_limit, 100);
    }
}
