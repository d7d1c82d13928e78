/// Location of the JSON artifact relative to the deployed asset root.
pub const CORPUS_ASSET_PATH: &str = "data/plays.json";

pub(crate) fn default_csv_path() -> String {
    "shakespeare_plays.csv".to_string()
}

pub(crate) fn default_output_paths() -> Vec<String> {
    vec![
        "data/plays.json".to_string(),
        "public/data/plays.json".to_string(),
    ]
}

pub(crate) fn default_asset_root() -> String {
    "public".to_string()
}

pub(crate) fn default_explain_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

pub(crate) fn default_explain_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

pub(crate) fn default_explain_api_version() -> String {
    "2023-06-01".to_string()
}

pub(crate) fn default_explain_max_tokens() -> u32 {
    800
}

pub(crate) fn default_explain_temperature() -> f32 {
    0.6
}

pub(crate) fn default_explain_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_context_radius() -> usize {
    crate::context_window::DEFAULT_CONTEXT_RADIUS
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}
