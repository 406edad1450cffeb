use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Camera permission denied: {message}")]
    PermissionError { message: String },

    #[error("Scan session is {actual}, expected {expected}")]
    SessionStateError { expected: String, actual: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Permission,
    Session,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ConfigError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AppError::PermissionError { .. } => ErrorCategory::Permission,
            AppError::SessionStateError { .. } => ErrorCategory::Session,
            AppError::IoError(_) | AppError::HttpClientError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 沒有有效憑證就無法啟動
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Permission => ErrorSeverity::Medium,
            ErrorCategory::Session => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::High,
        }
    }

    /// 是否可由使用者手動重試（不會自動重試）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Permission | ErrorCategory::Session
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AppError::ConfigError { .. } => {
                "Check that the config file exists and is valid TOML".to_string()
            }
            AppError::MissingConfigError { field } => {
                format!("Add '{}' to the config file or set its environment variable", field)
            }
            AppError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the config file", field)
            }
            AppError::PermissionError { .. } => {
                "Grant access to the scanner device and try scanning again".to_string()
            }
            AppError::SessionStateError { .. } => {
                "End the current scan session before starting a new one".to_string()
            }
            AppError::IoError(_) => "Check file permissions and paths".to_string(),
            AppError::HttpClientError(_) => {
                "Check the TLS setup of this machine".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Permission => {
                "The scanner could not be opened because access was denied".to_string()
            }
            ErrorCategory::Session => format!("Scanner is busy: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
