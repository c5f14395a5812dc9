use crate::app_config::{AppConfig, BrowserSettings, Credentials, Environment};
use crate::ConfigError;

const DEFAULT_BASE_URL: &str = "https://2-biz.spysystem.dk";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty values count as unset; `.env` templates often ship `SPY_USER=`.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match optional(var).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes") => Ok(true),
            Some("0" | "false" | "no") => Ok(false),
            Some(other) => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let env = parse_environment(&or_default("STYLESYNC_ENV", "development"))?;

    let base_url = or_default("STYLESYNC_BASE_URL", DEFAULT_BASE_URL);
    let parsed_base =
        url::Url::parse(&base_url).map_err(|e| invalid("STYLESYNC_BASE_URL", e.to_string()))?;
    if !matches!(parsed_base.scheme(), "http" | "https") {
        return Err(invalid(
            "STYLESYNC_BASE_URL",
            format!("unsupported scheme \"{}\"", parsed_base.scheme()),
        ));
    }
    let base_url = base_url.trim_end_matches('/').to_string();

    let credentials = match (optional("SPY_USER"), optional("SPY_PASS")) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };

    let bind_addr = or_default("STYLESYNC_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("STYLESYNC_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("STYLESYNC_LOG_LEVEL", "info");

    let browser = BrowserSettings {
        headless: parse_bool("STYLESYNC_BROWSER_HEADLESS", true)?,
        executable: optional("STYLESYNC_BROWSER_EXECUTABLE").map(PathBuf::from),
        remote_url: optional("STYLESYNC_BROWSER_REMOTE_URL"),
        user_agent: or_default("STYLESYNC_USER_AGENT", DEFAULT_USER_AGENT),
        navigation_timeout_secs: parse_u64("STYLESYNC_NAVIGATION_TIMEOUT_SECS", "60")?,
    };

    let login_settle_timeout_secs = parse_u64("STYLESYNC_LOGIN_SETTLE_TIMEOUT_SECS", "30")?;

    let api_keys = or_default("STYLESYNC_API_KEYS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let max_browsers = match parse_u64("STYLESYNC_MAX_BROWSERS", "2")? {
        0 => return Err(invalid("STYLESYNC_MAX_BROWSERS", "must be at least 1".to_string())),
        n => usize::try_from(n).map_err(|e| invalid("STYLESYNC_MAX_BROWSERS", e.to_string()))?,
    };

    Ok(AppConfig {
        env,
        base_url,
        credentials,
        bind_addr,
        log_level,
        browser,
        login_settle_timeout_secs,
        api_keys,
        max_browsers,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "STYLESYNC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
