// Process configuration for the bot service and CLI
// Every value comes from the environment with a usable default

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PREFIX: &str = ";";
pub const DEFAULT_BACKEND_URL: &str = "https://wandbox.org/api/compile.json";
pub const DEFAULT_COMPILER_LIST_URL: &str = "https://wandbox.org/api/list.json";
pub const DEFAULT_COMPILERS_FILE: &str = "config/compilers.json";
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub prefix: String,
    pub token: String,
    pub backend_url: String,
    pub compiler_list_url: String,
    pub compilers_file: PathBuf,
    pub dataset_base_url: Option<String>,
    pub dataset_redis_url: Option<String>,
    pub compile_log_url: Option<String>,
    pub loading_emote: Option<String>,
    pub bridge_url: String,
    pub bind_addr: String,
    pub fetch_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on remote calls per invocation, initial attempt included
    pub max_fix_attempts: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            token: String::new(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            compiler_list_url: DEFAULT_COMPILER_LIST_URL.to_string(),
            compilers_file: PathBuf::from(DEFAULT_COMPILERS_FILE),
            dataset_base_url: None,
            dataset_redis_url: None,
            compile_log_url: None,
            loading_emote: None,
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            fetch_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_fix_attempts: 4,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            prefix: get("COMMAND_PREFIX").unwrap_or(defaults.prefix),
            token: get("BOT_TOKEN").unwrap_or(defaults.token),
            backend_url: get("COMPILE_BACKEND_URL").unwrap_or(defaults.backend_url),
            compiler_list_url: get("COMPILER_LIST_URL").unwrap_or(defaults.compiler_list_url),
            compilers_file: get("COMPILERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.compilers_file),
            dataset_base_url: get("DATASET_BASE_URL"),
            dataset_redis_url: get("DATASET_REDIS_URL"),
            compile_log_url: get("COMPILE_LOG_URL"),
            loading_emote: get("LOADING_EMOTE"),
            bridge_url: get("PLATFORM_BRIDGE_URL").unwrap_or(defaults.bridge_url),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            fetch_timeout: get("FETCH_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            request_timeout: get("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_fix_attempts: get("MAX_FIX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_fix_attempts),
        }
    }
}
