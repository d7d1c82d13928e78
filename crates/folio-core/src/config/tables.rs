use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    data: DataConfig,
    #[serde(default)]
    explain: ExplainConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    cache: CacheConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            csv_path: tables.data.csv_path,
            output_paths: tables.data.output_paths,
            asset_root: tables.data.asset_root,
            explain_base_url: tables.explain.base_url,
            explain_model: tables.explain.model,
            explain_api_version: tables.explain.api_version,
            explain_max_tokens: tables.explain.max_tokens,
            explain_temperature: tables.explain.temperature,
            explain_timeout_secs: tables.explain.timeout_secs,
            context_radius: tables.explain.context_radius,
            api_key: tables.explain.api_key,
            log_level: tables.logging.log_level,
            cache_dir: tables.cache.cache_dir,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            data: DataConfig {
                csv_path: config.csv_path.clone(),
                output_paths: config.output_paths.clone(),
                asset_root: config.asset_root.clone(),
            },
            explain: ExplainConfig {
                base_url: config.explain_base_url.clone(),
                model: config.explain_model.clone(),
                api_version: config.explain_api_version.clone(),
                max_tokens: config.explain_max_tokens,
                temperature: config.explain_temperature,
                timeout_secs: config.explain_timeout_secs,
                context_radius: config.context_radius,
                // Credentials are never written back to disk.
                api_key: None,
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            cache: CacheConfig {
                cache_dir: config.cache_dir.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct DataConfig {
    #[serde(default = "defaults::default_csv_path")]
    csv_path: String,
    #[serde(default = "defaults::default_output_paths")]
    output_paths: Vec<String>,
    #[serde(default = "defaults::default_asset_root")]
    asset_root: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            csv_path: defaults::default_csv_path(),
            output_paths: defaults::default_output_paths(),
            asset_root: defaults::default_asset_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ExplainConfig {
    #[serde(default = "defaults::default_explain_base_url")]
    base_url: String,
    #[serde(default = "defaults::default_explain_model")]
    model: String,
    #[serde(default = "defaults::default_explain_api_version")]
    api_version: String,
    #[serde(default = "defaults::default_explain_max_tokens")]
    max_tokens: u32,
    #[serde(default = "defaults::default_explain_temperature")]
    temperature: f32,
    #[serde(default = "defaults::default_explain_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "defaults::default_context_radius")]
    context_radius: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        ExplainConfig {
            base_url: defaults::default_explain_base_url(),
            model: defaults::default_explain_model(),
            api_version: defaults::default_explain_api_version(),
            max_tokens: defaults::default_explain_max_tokens(),
            temperature: defaults::default_explain_temperature(),
            timeout_secs: defaults::default_explain_timeout_secs(),
            context_radius: defaults::default_context_radius(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct CacheConfig {
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cache_dir: defaults::default_cache_dir(),
        }
    }
}
