use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Back-office login. Read once at job start, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// How the job's browser context is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Explicit Chrome/Chromium binary; auto-detected when `None`.
    pub executable: Option<PathBuf>,
    /// DevTools endpoint of an already running browser (`http://host:9222`).
    pub remote_url: Option<String>,
    pub user_agent: String,
    pub navigation_timeout_secs: u64,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    /// Origin of the back office, e.g. `https://2-biz.spysystem.dk`.
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub browser: BrowserSettings,
    /// Upper bound for "submit + settle" after the login form is posted.
    pub login_settle_timeout_secs: u64,
    pub api_keys: Vec<String>,
    /// Jobs allowed to hold a browser at the same time.
    pub max_browsers: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("browser", &self.browser)
            .field("login_settle_timeout_secs", &self.login_settle_timeout_secs)
            .field(
                "api_keys",
                &format_args!("[{} redacted]", self.api_keys.len()),
            )
            .field("max_browsers", &self.max_browsers)
            .finish()
    }
}
