#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::model::{CameraFacing, MsiPlesseyChecksum, ScannerSettings, SymbologySet};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.nutritionix.com/v1_1/search";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// The three keys the app cannot start without.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub scanner_license_key: String,
    pub nutrition_app_id: String,
    pub nutrition_app_key: String,
}

// 金鑰不得出現在日誌
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("scanner_license_key", &"<redacted>")
            .field("nutrition_app_id", &self.nutrition_app_id)
            .field("nutrition_app_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub symbologies: Option<Vec<crate::domain::model::Symbology>>,
    #[serde(default)]
    pub camera_facing: CameraFacing,
    #[serde(default)]
    pub msi_plessey_checksum: MsiPlesseyChecksum,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigError {
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| AppError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        let symbologies = self
            .scanner
            .symbologies
            .clone()
            .and_then(SymbologySet::new)
            .unwrap_or_default();

        ScannerSettings {
            symbologies,
            camera_facing: self.scanner.camera_facing,
            msi_plessey_checksum: self.scanner.msi_plessey_checksum,
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_credential(
            "credentials.scanner_license_key",
            &self.credentials.scanner_license_key,
        )?;
        validation::validate_credential(
            "credentials.nutrition_app_id",
            &self.credentials.nutrition_app_id,
        )?;
        validation::validate_credential(
            "credentials.nutrition_app_key",
            &self.credentials.nutrition_app_key,
        )?;

        validation::validate_url("lookup.endpoint", &self.lookup.endpoint)?;
        validation::validate_positive_number("lookup.timeout_ms", self.lookup.timeout_ms, 1)?;

        if let Some(symbologies) = &self.scanner.symbologies {
            if symbologies.is_empty() {
                return Err(AppError::InvalidConfigValueError {
                    field: "scanner.symbologies".to_string(),
                    value: "[]".to_string(),
                    reason: "At least one symbology must be enabled".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Reads and validates the configuration document. Called once at startup.
pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let config = AppConfig::from_file(&path)?;
    config.validate()?;
    tracing::debug!(
        "Loaded configuration from {} (endpoint: {}, timeout: {}ms)",
        path.as_ref().display(),
        config.lookup.endpoint,
        config.lookup.timeout_ms
    );
    Ok(config)
}

/// 替換環境變數 (例如 ${NUTRITION_APP_KEY})；未設定的變數保留原樣
fn substitute_env_vars(content: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
    });

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}
