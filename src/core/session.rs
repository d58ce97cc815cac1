use crate::core::board::{BoardSnapshot, UserBoard};
use crate::core::fanout::{FanOut, FanOutHandle, FanOutReport, DEFAULT_MAX_DELAY};
use crate::core::generator::UserGenerator;
use crate::core::random::{RandomSource, StdRandom};
use crate::domain::model::{DomainSpec, StartupData};
use crate::domain::ports::{
    ClientOptions, ConfigChangedHook, FlagClient, FlagClientFactory, DEFAULT_POLL_INTERVAL,
};
use crate::utils::error::{Result, SimError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_FLAG_KEY: &str = "isAwesomeFeatureEnabled";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub base_url: Option<String>,
    pub requested_flag_key: Option<String>,
    pub max_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            base_url: None,
            requested_flag_key: None,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Owns the flag client, the known keys and the simulated population.
///
/// The client handle is held exclusively here. Replacing it disposes the
/// previous one in the same call, and config-change events are tagged with
/// the epoch of the client that raised them.
pub struct Session<F: FlagClientFactory> {
    factory: F,
    settings: SessionSettings,
    startup: StartupData,
    generator: UserGenerator,
    fan_out: FanOut,
    board: Arc<UserBoard>,

    client: Option<Arc<dyn FlagClient>>,
    epoch: u64,
    /// Bumped on every `create`, including attempts that fail.
    epochs_issued: u64,
    known_keys: Vec<String>,
    flag_key: String,
    flag_key_confirmed: bool,
    pending: Option<FanOutHandle>,

    events_tx: mpsc::UnboundedSender<u64>,
    events_rx: mpsc::UnboundedReceiver<u64>,
}

impl<F: FlagClientFactory> Session<F> {
    pub fn new(factory: F, settings: SessionSettings, startup: StartupData) -> Self {
        Self::with_random(factory, settings, startup, Arc::new(StdRandom::from_entropy()))
    }

    pub fn with_random(
        factory: F,
        settings: SessionSettings,
        startup: StartupData,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let flag_key = settings
            .requested_flag_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FLAG_KEY.to_string());

        Self {
            factory,
            generator: UserGenerator::new(random.clone()),
            fan_out: FanOut::new(random, settings.max_delay),
            settings,
            startup,
            board: Arc::new(UserBoard::new()),
            client: None,
            epoch: 0,
            epochs_issued: 0,
            known_keys: Vec::new(),
            flag_key,
            flag_key_confirmed: false,
            pending: None,
            events_tx,
            events_rx,
        }
    }

    /// Connects with `sdk_key` and returns the flag keys it exposes.
    pub async fn initialize_client(&mut self, sdk_key: &str) -> Result<&[String]> {
        let sdk_key = sdk_key.trim();
        if sdk_key.is_empty() {
            return Err(SimError::InvalidSdkKey {
                reason: "SDK key is required".to_string(),
            });
        }

        self.epochs_issued += 1;
        let epoch = self.epochs_issued;
        let tx = self.events_tx.clone();
        let hook: ConfigChangedHook = Arc::new(move || {
            // 接收端關閉代表 session 已結束
            let _ = tx.send(epoch);
        });

        let options = ClientOptions::new(sdk_key)
            .with_poll_interval(self.settings.poll_interval)
            .with_base_url(self.settings.base_url.clone());

        tracing::info!("🔌 Creating flag client (poll every {:?})", options.poll_interval);
        let client = self.factory.create(options, hook)?;

        let keys = match client.get_all_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                client.dispose().await;
                return Err(e);
            }
        };

        if keys.is_empty() {
            tracing::warn!("❌ SDK key resolved to a config without flags");
            client.dispose().await;
            return Err(SimError::InvalidSdkKey {
                reason: "no feature flags found for this SDK key".to_string(),
            });
        }

        if let Some(previous) = self.client.replace(client) {
            tracing::debug!("Disposing previous flag client (epoch {})", self.epoch);
            previous.dispose().await;
        }
        self.epoch = epoch;
        self.known_keys = keys;
        self.flag_key_confirmed = false;
        self.pending = None;
        self.flag_key = self.resolve_flag_key(&self.flag_key);

        tracing::info!(
            "✅ Flag client ready with {} flags, selected '{}'",
            self.known_keys.len(),
            self.flag_key
        );
        Ok(self.known_keys.as_slice())
    }

    /// Confirms the flag to evaluate and starts a fan-out.
    pub fn confirm_flag_key(&mut self, flag_key: &str) -> Result<&str> {
        if self.client.is_none() {
            return Err(SimError::ClientNotInitialized);
        }
        if flag_key.trim().is_empty() {
            return Err(SimError::InvalidConfigValueError {
                field: "flag_key".to_string(),
                value: flag_key.to_string(),
                reason: "Flag key is required".to_string(),
            });
        }

        self.flag_key = self.resolve_flag_key(flag_key.trim());
        self.flag_key_confirmed = true;
        self.handle_feature_flags();
        Ok(&self.flag_key)
    }

    /// Regenerates the population, replacing the previous one in a single swap.
    pub fn regenerate_users(&mut self, extra: Option<&DomainSpec>) -> Result<usize> {
        let users = self.generator.generate(&self.startup, extra)?;
        let count = users.len();
        self.board.replace(users);
        tracing::info!("👥 Generated {} simulated users", count);

        self.handle_feature_flags();
        Ok(count)
    }

    /// Dispatches a fan-out for the confirmed flag. Returns `false` when no
    /// flag has been confirmed yet.
    pub fn handle_feature_flags(&mut self) -> bool {
        if !self.flag_key_confirmed {
            return false;
        }
        let Some(client) = self.client.clone() else {
            return false;
        };

        let handle = self
            .fan_out
            .dispatch(client, &self.flag_key, self.board.clone());
        self.pending = Some(handle);
        true
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let client = self.client.clone().ok_or(SimError::ClientNotInitialized)?;
        self.known_keys = client.get_all_keys().await?;
        tracing::debug!("Refreshed flag keys: {:?}", self.known_keys);
        Ok(())
    }

    pub async fn next_config_change(&mut self) -> Option<u64> {
        self.events_rx.recv().await
    }

    /// Returns `false` when the event came from a replaced client.
    pub async fn handle_config_change(&mut self, epoch: u64) -> Result<bool> {
        if self.client.is_none() || epoch != self.epoch {
            tracing::debug!("Ignoring config change from stale client epoch {}", epoch);
            return Ok(false);
        }

        tracing::info!("🔄 Flag configuration changed, re-evaluating");
        if let Err(e) = self.refresh().await {
            tracing::warn!("⚠️ Could not refresh flag keys: {}", e);
        }
        self.handle_feature_flags();
        Ok(true)
    }

    /// Waits for the in-flight fan-out, if any.
    pub async fn settle(&mut self) -> Option<FanOutReport> {
        let handle = self.pending.take()?;
        let report = handle.wait().await;
        tracing::debug!("Fan-out settled: {:?}", report);
        Some(report)
    }

    pub async fn shutdown(&mut self) {
        self.pending = None;
        self.flag_key_confirmed = false;
        if let Some(client) = self.client.take() {
            client.dispose().await;
            tracing::info!("👋 Flag client disposed");
        }
    }

    fn resolve_flag_key(&self, requested: &str) -> String {
        if self.known_keys.iter().any(|k| k == requested) {
            return requested.to_string();
        }
        match self.known_keys.first() {
            Some(first) => {
                tracing::info!("Flag '{}' not found, falling back to '{}'", requested, first);
                first.clone()
            }
            None => requested.to_string(),
        }
    }

    pub fn known_keys(&self) -> &[String] {
        &self.known_keys
    }

    pub fn flag_key(&self) -> &str {
        &self.flag_key
    }

    pub fn is_flag_key_confirmed(&self) -> bool {
        self.flag_key_confirmed
    }

    pub fn is_client_initialized(&self) -> bool {
        self.client.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn startup(&self) -> &StartupData {
        &self.startup
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.board.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::UserContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FixedClient {
        keys: Vec<String>,
        disposed: AtomicBool,
    }

    #[async_trait]
    impl FlagClient for FixedClient {
        async fn get_all_keys(&self) -> Result<Vec<String>> {
            Ok(self.keys.clone())
        }

        async fn get_value(&self, _: &str, _: bool, _: &UserContext) -> Result<bool> {
            Ok(true)
        }

        async fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
        }

        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct FixedFactory {
        keys: Vec<String>,
        /// Next client comes up with no flags.
        empty_next: AtomicBool,
        created: Mutex<Vec<Arc<FixedClient>>>,
        hooks: Mutex<Vec<ConfigChangedHook>>,
    }

    impl FlagClientFactory for FixedFactory {
        fn create(&self, _: ClientOptions, hook: ConfigChangedHook) -> Result<Arc<dyn FlagClient>> {
            let keys = if self.empty_next.swap(false, Ordering::SeqCst) {
                Vec::new()
            } else {
                self.keys.clone()
            };
            let client = Arc::new(FixedClient {
                keys,
                disposed: AtomicBool::new(false),
            });
            self.created.lock().unwrap().push(client.clone());
            self.hooks.lock().unwrap().push(hook);
            Ok(client)
        }
    }

    fn session(keys: &[&str]) -> Session<FixedFactory> {
        let factory = FixedFactory {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        };
        let settings = SessionSettings {
            max_delay: Duration::from_millis(5),
            ..SessionSettings::default()
        };
        Session::with_random(
            factory,
            settings,
            StartupData::default(),
            Arc::new(StdRandom::seeded(11)),
        )
    }

    #[tokio::test]
    async fn test_blank_sdk_key_creates_no_client() {
        let mut session = session(&["beta"]);
        let result = session.initialize_client("   ").await;
        assert!(matches!(result, Err(SimError::InvalidSdkKey { .. })));
        assert!(session.factory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_keys_tears_client_down() {
        let mut session = session(&[]);
        let result = session.initialize_client("sdk-key").await;
        assert!(matches!(result, Err(SimError::InvalidSdkKey { .. })));
        assert!(!session.is_client_initialized());
        assert!(session.factory.created.lock().unwrap()[0].is_disposed());
    }

    #[tokio::test]
    async fn test_unknown_flag_key_falls_back_to_first() {
        let mut session = session(&["beta", "gamma"]);
        session.initialize_client("sdk-key").await.unwrap();
        assert_eq!(session.flag_key(), "beta");

        let confirmed = session.confirm_flag_key("missing").unwrap().to_string();
        assert_eq!(confirmed, "beta");
    }

    #[tokio::test]
    async fn test_fan_out_is_noop_before_confirmation() {
        let mut session = session(&["beta"]);
        session.initialize_client("sdk-key").await.unwrap();
        session.regenerate_users(None).unwrap();

        assert!(!session.handle_feature_flags());
        assert!(session.settle().await.is_none());
    }

    #[tokio::test]
    async fn test_confirm_requires_client() {
        let mut session = session(&["beta"]);
        assert!(matches!(
            session.confirm_flag_key("beta"),
            Err(SimError::ClientNotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_all_users_enabled_after_settle() {
        let mut session = session(&["beta"]);
        session.initialize_client("sdk-key").await.unwrap();
        session.regenerate_users(None).unwrap();
        session.confirm_flag_key("beta").unwrap();

        let report = session.settle().await.unwrap();
        assert_eq!(report.applied, 120);

        let snapshot = session.snapshot();
        assert!(snapshot.users.iter().all(|u| u.feature_enabled));
        assert_eq!(snapshot.tally.enabled, 120);
    }

    #[tokio::test]
    async fn test_replacing_client_disposes_previous() {
        let mut session = session(&["beta"]);
        session.initialize_client("first").await.unwrap();
        session.initialize_client("second").await.unwrap();

        let created = session.factory.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert!(created[0].is_disposed());
        assert!(!created[1].is_disposed());
        assert_eq!(session.epoch(), 2);
    }

    #[tokio::test]
    async fn test_stale_epoch_change_is_ignored() {
        let mut session = session(&["beta"]);
        session.initialize_client("first").await.unwrap();
        session.initialize_client("second").await.unwrap();

        assert!(!session.handle_config_change(1).await.unwrap());
        assert!(session.handle_config_change(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_event_from_failed_client_is_not_current() {
        let mut session = session(&["beta"]);
        session.factory.empty_next.store(true, Ordering::SeqCst);
        assert!(session.initialize_client("empty").await.is_err());

        // 失敗的 client 在被釋放前已經送出事件
        let failed_hook = session.factory.hooks.lock().unwrap()[0].clone();
        failed_hook();

        session.initialize_client("sdk-key").await.unwrap();
        let current_hook = session.factory.hooks.lock().unwrap()[1].clone();
        assert_ne!(session.epoch(), 1);

        let queued = session.next_config_change().await.unwrap();
        assert!(!session.handle_config_change(queued).await.unwrap());

        current_hook();
        let fresh = session.next_config_change().await.unwrap();
        assert!(session.handle_config_change(fresh).await.unwrap());
    }
}
