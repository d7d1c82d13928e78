use serde::Deserialize;

pub(crate) const MAX_CONTEXT_RADIUS: usize = 200;
pub(crate) const MAX_EXPLAIN_TOKENS: u32 = 8192;
pub(crate) const MAX_EXPLAIN_TIMEOUT_SECS: u64 = 600;

/// Flattened application configuration; the on-disk form is sectioned (see
/// `tables.rs`).
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_csv_path")]
    pub csv_path: String,
    #[serde(default = "crate::config::defaults::default_output_paths")]
    pub output_paths: Vec<String>,
    #[serde(default = "crate::config::defaults::default_asset_root")]
    pub asset_root: String,
    #[serde(default = "crate::config::defaults::default_explain_base_url")]
    pub explain_base_url: String,
    #[serde(default = "crate::config::defaults::default_explain_model")]
    pub explain_model: String,
    #[serde(default = "crate::config::defaults::default_explain_api_version")]
    pub explain_api_version: String,
    #[serde(default = "crate::config::defaults::default_explain_max_tokens")]
    pub explain_max_tokens: u32,
    #[serde(default = "crate::config::defaults::default_explain_temperature")]
    pub explain_temperature: f32,
    #[serde(default = "crate::config::defaults::default_explain_timeout_secs")]
    pub explain_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_context_radius")]
    pub context_radius: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            csv_path: crate::config::defaults::default_csv_path(),
            output_paths: crate::config::defaults::default_output_paths(),
            asset_root: crate::config::defaults::default_asset_root(),
            explain_base_url: crate::config::defaults::default_explain_base_url(),
            explain_model: crate::config::defaults::default_explain_model(),
            explain_api_version: crate::config::defaults::default_explain_api_version(),
            explain_max_tokens: crate::config::defaults::default_explain_max_tokens(),
            explain_temperature: crate::config::defaults::default_explain_temperature(),
            explain_timeout_secs: crate::config::defaults::default_explain_timeout_secs(),
            context_radius: crate::config::defaults::default_context_radius(),
            api_key: None,
            log_level: crate::config::defaults::default_log_level(),
            cache_dir: crate::config::defaults::default_cache_dir(),
        }
    }
}

impl AppConfig {
    /// Keep numeric settings inside usable bounds regardless of source.
    pub fn clamp(&mut self) {
        self.context_radius = self.context_radius.min(MAX_CONTEXT_RADIUS);
        self.explain_max_tokens = self.explain_max_tokens.clamp(1, MAX_EXPLAIN_TOKENS);
        self.explain_temperature = if self.explain_temperature.is_finite() {
            self.explain_temperature.clamp(0.0, 1.0)
        } else {
            crate::config::defaults::default_explain_temperature()
        };
        self.explain_timeout_secs = self
            .explain_timeout_secs
            .clamp(1, MAX_EXPLAIN_TIMEOUT_SECS);
        if self.output_paths.is_empty() {
            self.output_paths = crate::config::defaults::default_output_paths();
        }
        if let Some(key) = self.api_key.as_mut() {
            *key = key.trim().to_string();
        }
        if self.api_key.as_deref() == Some("") {
            self.api_key = None;
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
