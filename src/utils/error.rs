use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Write conflict: {message}")]
    Conflict { message: String },

    #[error("Backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Invalid resource path: {path}")]
    InvalidPath { path: String },

    #[error("Unknown table: {name}")]
    UnknownTable { name: String },

    #[error("Unsupported method: {method}")]
    UnsupportedMethod { method: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Backend,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StoreError {
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// 對應到回應信封的 HTTP 狀態碼
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound { .. } => 404,
            StoreError::BadRequest { .. }
            | StoreError::SerializationError(_)
            | StoreError::CsvError(_)
            | StoreError::InvalidPath { .. }
            | StoreError::UnknownTable { .. }
            | StoreError::UnsupportedMethod { .. } => 400,
            _ => 500,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound { .. }
            | StoreError::BadRequest { .. }
            | StoreError::InvalidPath { .. }
            | StoreError::UnknownTable { .. }
            | StoreError::UnsupportedMethod { .. } => ErrorCategory::Request,
            StoreError::Conflict { .. }
            | StoreError::BackendUnavailable { .. }
            | StoreError::ApiError(_)
            | StoreError::IoError(_) => ErrorCategory::Backend,
            StoreError::CsvError(_) | StoreError::SerializationError(_) => ErrorCategory::Data,
            StoreError::ConfigError { .. }
            | StoreError::InvalidConfigValueError { .. }
            | StoreError::MissingConfigError { .. }
            | StoreError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Backend => match self {
                StoreError::Conflict { .. } => ErrorSeverity::Medium,
                _ => ErrorSeverity::Critical,
            },
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "Check the record id, it may have been deleted",
            StoreError::BadRequest { .. } | StoreError::SerializationError(_) => {
                "Make sure the request body is a JSON object"
            }
            StoreError::Conflict { .. } => "Use a different id or update the existing record",
            StoreError::BackendUnavailable { .. } | StoreError::ApiError(_) => {
                "Check the network connection and the remote endpoint settings"
            }
            StoreError::InvalidPath { .. } | StoreError::UnknownTable { .. } => {
                "Use a path of the form tables/<table> or tables/<table>/<id>"
            }
            StoreError::UnsupportedMethod { .. } => "Use one of GET, POST, PUT, PATCH, DELETE",
            StoreError::CsvError(_) => "Check that the file is UTF-8 CSV with a header row",
            StoreError::IoError(_) => "Check file permissions and free disk space",
            StoreError::ConfigError { .. }
            | StoreError::InvalidConfigValueError { .. }
            | StoreError::MissingConfigError { .. }
            | StoreError::ConfigValidationError { .. } => {
                "Review the configuration file and environment variables"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            StoreError::NotFound { table, id } => {
                format!("レコードが見つかりません ({}/{})", table, id)
            }
            StoreError::BadRequest { message } => format!("不正なリクエスト: {}", message),
            StoreError::SerializationError(_) => "不正なJSONデータ".to_string(),
            StoreError::Conflict { message } => format!("書き込みが競合しました: {}", message),
            StoreError::BackendUnavailable { .. } | StoreError::ApiError(_) => {
                "データベースに接続できません".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(StoreError::not_found("students", "x").status_code(), 404);
        assert_eq!(StoreError::bad_request("bad").status_code(), 400);
        assert_eq!(
            StoreError::Conflict {
                message: "dup".to_string()
            }
            .status_code(),
            500
        );
        assert_eq!(StoreError::backend("down").status_code(), 500);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(StoreError::backend("down").severity() > StoreError::bad_request("x").severity());
        assert_eq!(
            StoreError::MissingConfigError {
                field: "remote.endpoint".to_string()
            }
            .severity(),
            ErrorSeverity::Critical
        );
    }
}
