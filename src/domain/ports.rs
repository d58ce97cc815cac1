use crate::domain::model::UserContext;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Fired by a client whenever its underlying flag configuration changes.
pub type ConfigChangedHook = Arc<dyn Fn() + Send + Sync>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub sdk_key: String,
    pub poll_interval: Duration,
    pub base_url: Option<String>,
}

impl ClientOptions {
    pub fn new(sdk_key: impl Into<String>) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            base_url: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

/// External flag-evaluation client. Polling, caching and rule matching live
/// behind this trait.
#[async_trait]
pub trait FlagClient: Send + Sync {
    async fn get_all_keys(&self) -> Result<Vec<String>>;

    async fn get_value(
        &self,
        flag_key: &str,
        default_value: bool,
        user: &UserContext,
    ) -> Result<bool>;

    /// Stops background polling. A disposed client never fires its hook again.
    async fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

pub trait FlagClientFactory: Send + Sync {
    fn create(
        &self,
        options: ClientOptions,
        on_config_changed: ConfigChangedHook,
    ) -> Result<Arc<dyn FlagClient>>;
}
