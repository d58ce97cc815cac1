use crate::core::generator::MAX_USERS;
use crate::domain::model::StartupData;
use crate::utils::error::{Result, SimError};
use crate::utils::validation::{
    validate_non_empty_list, validate_non_empty_string, validate_range, Validate,
};
use regex::Regex;
use std::path::Path;

/// Loads the simulated population description from a TOML file.
///
/// ```toml
/// countries = ["US", "UK", "HU"]
/// subscription_types = ["Free", "Pro"]
/// tenants = ["Acme"]
///
/// [[domains]]
/// email_domain = "dog.com"
/// user_count = 10
/// ```
pub fn load_startup_file<P: AsRef<Path>>(path: P) -> Result<StartupData> {
    let content = std::fs::read_to_string(&path).map_err(SimError::IoError)?;
    parse_startup_str(&content)
}

pub fn parse_startup_str(content: &str) -> Result<StartupData> {
    let processed = substitute_env_vars(content)?;

    toml::from_str(&processed).map_err(|e| SimError::ConfigValidationError {
        field: "toml_parsing".to_string(),
        message: format!("TOML parsing error: {}", e),
    })
}

/// 替換環境變數 (例如 ${TENANT_NAME})
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SimError::ConfigError {
        message: format!("invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

impl Validate for StartupData {
    fn validate(&self) -> Result<()> {
        for domain in &self.domains {
            validate_non_empty_string("domains.email_domain", &domain.email_domain)?;
        }

        validate_range("domains.user_count", self.total_users(), 0, MAX_USERS)?;

        // 沒有使用者時候選清單可以為空
        if self.total_users() > 0 {
            validate_non_empty_list("countries", &self.countries)?;
            validate_non_empty_list("subscription_types", &self.subscription_types)?;
            validate_non_empty_list("tenants", &self.tenants)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STARTUP: &str = r#"
countries = ["US", "HU"]
subscription_types = ["Free", "Pro", "Enterprise"]
tenants = ["Acme"]

[[domains]]
email_domain = "dog.com"
user_count = 3

[[domains]]
email_domain = "ex.com"
user_count = 7
"#;

    #[test]
    fn test_parse_startup_config() {
        let startup = parse_startup_str(STARTUP).unwrap();
        assert_eq!(startup.domains.len(), 2);
        assert_eq!(startup.total_users(), 10);
        assert_eq!(startup.subscription_types.len(), 3);
        assert!(startup.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FLAG_SIM_TEST_TENANT", "Umbrella");

        let content = r#"
countries = ["US"]
subscription_types = ["Free"]
tenants = ["${FLAG_SIM_TEST_TENANT}"]

[[domains]]
email_domain = "dog.com"
user_count = 1
"#;
        let startup = parse_startup_str(content).unwrap();
        assert_eq!(startup.tenants, vec!["Umbrella"]);

        std::env::remove_var("FLAG_SIM_TEST_TENANT");
    }

    #[test]
    fn test_empty_candidates_rejected_when_users_configured() {
        let content = r#"
countries = []
subscription_types = ["Free"]
tenants = ["Acme"]

[[domains]]
email_domain = "dog.com"
user_count = 2
"#;
        let startup = parse_startup_str(content).unwrap();
        assert!(startup.validate().is_err());
    }

    #[test]
    fn test_empty_population_is_valid() {
        let startup = parse_startup_str("").unwrap();
        assert_eq!(startup.total_users(), 0);
        assert!(startup.validate().is_ok());
    }

    #[test]
    fn test_population_above_cap_is_invalid() {
        let content = format!(
            "countries = [\"US\"]\nsubscription_types = [\"Free\"]\ntenants = [\"Acme\"]\n\n\
             [[domains]]\nemail_domain = \"dog.com\"\nuser_count = {}\n",
            MAX_USERS + 1
        );
        let startup = parse_startup_str(&content).unwrap();
        assert!(matches!(
            startup.validate(),
            Err(SimError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        let result = parse_startup_str("countries = [");
        assert!(matches!(result, Err(SimError::ConfigValidationError { .. })));
    }

    #[test]
    fn test_startup_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(STARTUP.as_bytes()).unwrap();

        let startup = load_startup_file(temp_file.path()).unwrap();
        assert_eq!(startup.countries, vec!["US", "HU"]);
    }
}
