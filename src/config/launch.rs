use crate::utils::error::{Result, SimError};
use crate::utils::validation::{validate_url, Validate};
use serde::Serialize;
use url::Url;

/// Parameters the simulator is launched with, either from flags or from the
/// query string of a shared demo link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchParams {
    pub sdk_key: Option<String>,
    pub base_url: Option<String>,
    pub flag_key: Option<String>,
    /// Shown next to the flag key, never fetched.
    pub flag_url: Option<String>,
    pub environment: Option<String>,
    pub config_name: Option<String>,
    pub hide_controls: bool,
    pub user_count: Option<usize>,
}

impl LaunchParams {
    pub fn from_url(launch_url: &str) -> Result<Self> {
        let url = Url::parse(launch_url)?;
        let mut params = Self::default();

        for (name, value) in url.query_pairs() {
            let value = value.trim().to_string();
            match &*name {
                // apiKey 是舊版連結使用的名稱
                "sdkKey" | "apiKey" => params.sdk_key = non_empty(value),
                "baseUrl" => params.base_url = non_empty(value),
                "featureFlagKey" => params.flag_key = non_empty(value),
                "featureFlagUrl" => params.flag_url = non_empty(value),
                "environmentName" => params.environment = non_empty(value),
                "configName" => params.config_name = non_empty(value),
                "hideControls" => params.hide_controls = is_truthy(&value),
                "userCount" => {
                    if !value.is_empty() {
                        params.user_count = Some(value.parse().map_err(|_| {
                            SimError::InvalidConfigValueError {
                                field: "userCount".to_string(),
                                value: value.clone(),
                                reason: "Expected a non-negative integer".to_string(),
                            }
                        })?);
                    }
                }
                other => tracing::debug!("Ignoring unknown launch parameter '{}'", other),
            }
        }

        Ok(params)
    }

    /// Values set in `overrides` win.
    pub fn overlay(self, overrides: LaunchParams) -> Self {
        Self {
            sdk_key: overrides.sdk_key.or(self.sdk_key),
            base_url: overrides.base_url.or(self.base_url),
            flag_key: overrides.flag_key.or(self.flag_key),
            flag_url: overrides.flag_url.or(self.flag_url),
            environment: overrides.environment.or(self.environment),
            config_name: overrides.config_name.or(self.config_name),
            hide_controls: overrides.hide_controls || self.hide_controls,
            user_count: overrides.user_count.or(self.user_count),
        }
    }
}

impl Validate for LaunchParams {
    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            validate_url("base_url", base_url)?;
        }
        if let Some(flag_url) = &self.flag_url {
            validate_url("flag_url", flag_url)?;
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parses `key=true|false` as used by `--offline-flag`.
pub fn parse_flag_assignment(raw: &str) -> Result<(String, bool)> {
    let invalid = |reason: &str| SimError::InvalidConfigValueError {
        field: "offline_flag".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let (key, value) = raw.split_once('=').ok_or_else(|| invalid("Expected key=true|false"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid("Flag key cannot be empty"));
    }
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => true,
        "false" | "off" | "0" => false,
        _ => return Err(invalid("Value must be true or false")),
    };

    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_reads_all_parameters() {
        let params = LaunchParams::from_url(
            "https://demo.example.com/?sdkKey=abc%2F123&baseUrl=http://localhost:8787\
             &featureFlagKey=beta&featureFlagUrl=https://app.example.com/flags/beta\
             &environmentName=Production&configName=Main&hideControls=true&userCount=25",
        )
        .unwrap();

        assert_eq!(params.sdk_key.as_deref(), Some("abc/123"));
        assert_eq!(params.base_url.as_deref(), Some("http://localhost:8787"));
        assert_eq!(params.flag_key.as_deref(), Some("beta"));
        assert_eq!(params.environment.as_deref(), Some("Production"));
        assert_eq!(params.config_name.as_deref(), Some("Main"));
        assert!(params.hide_controls);
        assert_eq!(params.user_count, Some(25));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_legacy_api_key_alias() {
        let params = LaunchParams::from_url("https://demo.example.com/?apiKey=legacy").unwrap();
        assert_eq!(params.sdk_key.as_deref(), Some("legacy"));
        assert!(!params.hide_controls);
    }

    #[test]
    fn test_invalid_user_count_rejected() {
        let result = LaunchParams::from_url("https://demo.example.com/?userCount=many");
        assert!(matches!(result, Err(SimError::InvalidConfigValueError { .. })));
    }

    #[test]
    fn test_overlay_prefers_overrides() {
        let from_url = LaunchParams {
            sdk_key: Some("url-key".into()),
            flag_key: Some("url-flag".into()),
            user_count: Some(5),
            ..Default::default()
        };
        let from_flags = LaunchParams {
            sdk_key: Some("cli-key".into()),
            ..Default::default()
        };

        let merged = from_url.overlay(from_flags);
        assert_eq!(merged.sdk_key.as_deref(), Some("cli-key"));
        assert_eq!(merged.flag_key.as_deref(), Some("url-flag"));
        assert_eq!(merged.user_count, Some(5));
    }

    #[test]
    fn test_invalid_base_url_fails_validation() {
        let params = LaunchParams {
            base_url: Some("ftp://flags".into()),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_parse_flag_assignment() {
        assert_eq!(parse_flag_assignment("beta=true").unwrap(), ("beta".to_string(), true));
        assert_eq!(parse_flag_assignment(" beta = OFF ").unwrap(), ("beta".to_string(), false));
        assert!(parse_flag_assignment("beta").is_err());
        assert!(parse_flag_assignment("=true").is_err());
        assert!(parse_flag_assignment("beta=maybe").is_err());
    }
}
