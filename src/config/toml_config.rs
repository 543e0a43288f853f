use crate::domain::model::{DeletePolicy, DEFAULT_PAGE_LIMIT};
use crate::utils::error::{Result, StoreError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 500;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub local: LocalConfig,
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// 未指定時 local 為 hard、remote 為 soft
    pub delete_policy: Option<DeletePolicy>,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            delete_policy: None,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// 省略時使用記憶體儲存
    pub data_dir: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default)]
    pub seed_defaults: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            key_prefix: default_key_prefix(),
            seed_defaults: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_page_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn default_batch_chunk_size() -> usize {
    DEFAULT_BATCH_CHUNK_SIZE
}

fn default_key_prefix() -> String {
    crate::adapters::local::DEFAULT_KEY_PREFIX.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| StoreError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUPABASE_KEY})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| StoreError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.store.delete_policy.unwrap_or(match self.store.backend {
            BackendKind::Local => DeletePolicy::Hard,
            BackendKind::Remote => DeletePolicy::Soft,
        })
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(
            self.remote
                .as_ref()
                .map(|r| r.timeout_seconds)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number(
            "store.default_page_limit",
            self.store.default_page_limit,
            1,
        )?;
        validation::validate_positive_number(
            "store.batch_chunk_size",
            self.store.batch_chunk_size,
            1,
        )?;

        if let Some(data_dir) = &self.local.data_dir {
            validation::validate_path("local.data_dir", data_dir)?;
        }
        validation::validate_non_empty_string("local.key_prefix", &self.local.key_prefix)?;

        match (&self.store.backend, &self.remote) {
            (BackendKind::Remote, None) => {
                return Err(StoreError::MissingConfigError {
                    field: "remote".to_string(),
                })
            }
            (_, Some(remote)) => {
                validation::validate_url("remote.endpoint", &remote.endpoint)?;
                if remote.api_key.is_empty() || remote.api_key.contains("${") {
                    return Err(StoreError::MissingConfigError {
                        field: "remote.api_key".to_string(),
                    });
                }
                validation::validate_range(
                    "remote.timeout_seconds",
                    remote.timeout_seconds as usize,
                    1,
                    600,
                )?;
            }
            (BackendKind::Local, None) => {}
        }

        if let Some(level) = &self.logging.level {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level.to_lowercase().as_str()) {
                return Err(StoreError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
