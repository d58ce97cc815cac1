use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub email_domain: String,
    pub user_count: usize,
}

impl DomainSpec {
    pub fn new(email_domain: impl Into<String>, user_count: usize) -> Self {
        Self {
            email_domain: email_domain.into(),
            user_count,
        }
    }
}

/// 模擬使用者的來源設定：網域、國家、方案與租戶
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupData {
    #[serde(default)]
    pub domains: Vec<DomainSpec>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub subscription_types: Vec<String>,
    #[serde(default)]
    pub tenants: Vec<String>,
}

impl StartupData {
    pub fn total_users(&self) -> usize {
        self.domains
            .iter()
            .fold(0usize, |acc, d| acc.saturating_add(d.user_count))
    }
}

impl Default for StartupData {
    fn default() -> Self {
        Self {
            domains: vec![
                DomainSpec::new("dog.com", 10),
                DomainSpec::new("danger.com", 10),
                DomainSpec::new("ex.com", 100),
            ],
            countries: vec!["US".into(), "UK".into(), "HU".into()],
            subscription_types: vec!["Free".into(), "Pro".into()],
            tenants: vec!["Acme".into(), "Globex".into(), "Initech".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAttributes {
    pub subscription_type: String,
    pub tenant: String,
}

/// The attribute bag handed to the flag evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub identifier: String,
    pub email: String,
    pub country: String,
    pub custom: CustomAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticUser {
    pub user: UserContext,
    pub feature_enabled: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Last evaluation of the current batch failed; `feature_enabled` is the
    /// value from before it.
    #[serde(default)]
    pub evaluation_failed: bool,
}

impl SyntheticUser {
    pub fn new(user: UserContext) -> Self {
        Self {
            user,
            feature_enabled: false,
            evaluated_at: None,
            evaluation_failed: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.evaluated_at.is_none() && !self.evaluation_failed
    }
}

/// Running counters for the current evaluation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationTally {
    pub enabled: usize,
    pub disabled: usize,
    pub failed: usize,
    pub pending: usize,
}
