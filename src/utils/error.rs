use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid SDK key: {reason}")]
    InvalidSdkKey { reason: String },

    #[error("Flag client is not initialized")]
    ClientNotInitialized,

    #[error("Flag client has been disposed")]
    ClientDisposed,

    #[error("Flag service responded with status {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("Evaluation of '{flag_key}' failed: {message}")]
    EvaluationError { flag_key: String, message: String },

    #[error("User generation failed: {message}")]
    GenerationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    FlagService,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SimError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SimError::ConfigError { .. }
            | SimError::ConfigValidationError { .. }
            | SimError::InvalidConfigValueError { .. }
            | SimError::MissingConfigError { .. }
            | SimError::UrlError(_) => ErrorCategory::Configuration,
            SimError::HttpError(_) => ErrorCategory::Network,
            SimError::InvalidSdkKey { .. }
            | SimError::ClientNotInitialized
            | SimError::ClientDisposed
            | SimError::ServiceError { .. }
            | SimError::EvaluationError { .. } => ErrorCategory::FlagService,
            SimError::SerializationError(_) | SimError::GenerationError { .. } => {
                ErrorCategory::Data
            }
            SimError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單一使用者評估失敗不影響整批
            SimError::EvaluationError { .. } => ErrorSeverity::Low,
            SimError::HttpError(_) | SimError::ServiceError { .. } => ErrorSeverity::Medium,
            SimError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SimError::HttpError(_) => "Could not reach the flag service".to_string(),
            SimError::InvalidSdkKey { .. } => {
                "The SDK key was rejected or has no feature flags".to_string()
            }
            SimError::ClientNotInitialized => {
                "Connect with an SDK key before choosing a feature flag".to_string()
            }
            SimError::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            SimError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags and the startup config file",
            ErrorCategory::Network => "Verify the base URL and that the flag service is running",
            ErrorCategory::FlagService => "Double-check the SDK key and that the config contains flags",
            ErrorCategory::Data => "Make sure every candidate list in the startup config is non-empty",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sdk_key_is_flag_service_error() {
        let err = SimError::InvalidSdkKey {
            reason: "no flags".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::FlagService);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.to_string().contains("no flags"));
    }

    #[test]
    fn test_evaluation_error_is_low_severity() {
        let err = SimError::EvaluationError {
            flag_key: "beta".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_missing_config_friendly_message() {
        let err = SimError::MissingConfigError {
            field: "sdk_key".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Missing required setting: sdk_key");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
