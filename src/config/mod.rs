pub mod launch;
pub mod startup;

use crate::config::launch::LaunchParams;
use crate::domain::model::DomainSpec;

#[cfg(feature = "cli")]
use crate::{
    config::launch::parse_flag_assignment,
    core::generator::MAX_USERS,
    core::session::SessionSettings,
    domain::model::StartupData,
    utils::error::Result,
    utils::validation::{
        validate_non_empty_string, validate_positive_number, validate_range,
        validate_required_field, Validate,
    },
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::time::Duration;

/// SDK key used for the in-memory flag table when running offline.
pub const OFFLINE_SDK_KEY: &str = "offline";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "flag-simulator")]
#[command(about = "Simulate a population of users evaluating a feature flag")]
pub struct CliConfig {
    /// Demo link whose query string carries the launch parameters
    #[arg(long)]
    pub launch_url: Option<String>,

    #[arg(long, env = "FLAG_SIM_SDK_KEY")]
    pub sdk_key: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub flag_key: Option<String>,

    #[arg(long)]
    pub flag_url: Option<String>,

    #[arg(long)]
    pub environment: Option<String>,

    #[arg(long)]
    pub config_name: Option<String>,

    #[arg(long, help = "Hide the settings header in the report")]
    pub hide_controls: bool,

    /// Extra users generated on top of the startup config
    #[arg(long)]
    pub user_count: Option<usize>,

    #[arg(long, default_value = "example.com")]
    pub extra_domain: String,

    /// TOML file describing domains, countries, tiers and tenants
    #[arg(long)]
    pub startup_config: Option<String>,

    #[arg(long, default_value = "1")]
    pub poll_interval_secs: u64,

    #[arg(long, default_value = "800")]
    pub max_delay_ms: u64,

    #[arg(long, help = "Seed for reproducible users and delays")]
    pub seed: Option<u64>,

    #[arg(long, help = "Keep running and re-evaluate on config changes")]
    pub watch: bool,

    #[arg(long, help = "Print the report as JSON")]
    pub json: bool,

    /// Run without a flag service, e.g. --offline-flag beta=true
    #[arg(long = "offline-flag")]
    pub offline_flags: Vec<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn is_offline(&self) -> bool {
        !self.offline_flags.is_empty()
    }

    /// Launch URL parameters overlaid with explicit flags.
    pub fn launch_params(&self) -> Result<LaunchParams> {
        let from_url = match &self.launch_url {
            Some(url) => LaunchParams::from_url(url)?,
            None => LaunchParams::default(),
        };

        let mut params = from_url.overlay(LaunchParams {
            sdk_key: self.sdk_key.clone(),
            base_url: self.base_url.clone(),
            flag_key: self.flag_key.clone(),
            flag_url: self.flag_url.clone(),
            environment: self.environment.clone(),
            config_name: self.config_name.clone(),
            hide_controls: self.hide_controls,
            user_count: self.user_count,
        });

        if self.is_offline() && params.sdk_key.is_none() {
            params.sdk_key = Some(OFFLINE_SDK_KEY.to_string());
        }
        Ok(params)
    }

    pub fn offline_flags(&self) -> Result<Vec<(String, bool)>> {
        self.offline_flags
            .iter()
            .map(|raw| parse_flag_assignment(raw))
            .collect()
    }

    pub fn session_settings(&self, params: &LaunchParams) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            base_url: params.base_url.clone(),
            requested_flag_key: params.flag_key.clone(),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn startup_data(&self) -> Result<StartupData> {
        let startup = match &self.startup_config {
            Some(path) => {
                tracing::info!("📁 Loading startup config from: {}", path);
                startup::load_startup_file(path)?
            }
            None => StartupData::default(),
        };
        startup.validate()?;
        Ok(startup)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let params = self.launch_params()?;
        params.validate()?;

        let sdk_key = validate_required_field("sdk_key", &params.sdk_key)?;
        validate_non_empty_string("sdk_key", sdk_key)?;

        validate_range("poll_interval_secs", self.poll_interval_secs, 1, 3600)?;
        validate_positive_number("max_delay_ms", self.max_delay_ms, 1)?;
        if let Some(user_count) = params.user_count {
            validate_range("user_count", user_count, 0, MAX_USERS)?;
            validate_non_empty_string("extra_domain", &self.extra_domain)?;
        }

        self.offline_flags()?;
        Ok(())
    }
}

/// The ad hoc population requested through `userCount`, if any.
pub fn extra_domain(params: &LaunchParams, domain: &str) -> Option<DomainSpec> {
    params
        .user_count
        .filter(|count| *count > 0)
        .map(|count| DomainSpec::new(domain, count))
}
