use crate::domain::model::UserContext;
use crate::domain::ports::{ClientOptions, ConfigChangedHook, FlagClient, FlagClientFactory};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

type FlagTable = BTreeMap<String, bool>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Flag client backed by an in-process table shared with its factory.
pub struct InMemoryFlagClient {
    sdk_key: String,
    flags: Arc<RwLock<FlagTable>>,
    on_config_changed: ConfigChangedHook,
    disposed: AtomicBool,
}

impl InMemoryFlagClient {
    pub fn sdk_key(&self) -> &str {
        &self.sdk_key
    }

    fn notify(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        (self.on_config_changed)();
        true
    }
}

#[async_trait]
impl FlagClient for InMemoryFlagClient {
    async fn get_all_keys(&self) -> Result<Vec<String>> {
        let flags = self.flags.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(flags.keys().cloned().collect())
    }

    async fn get_value(
        &self,
        flag_key: &str,
        default_value: bool,
        _user: &UserContext,
    ) -> Result<bool> {
        let flags = self.flags.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(flags.get(flag_key).copied().unwrap_or(default_value))
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Registry {
    tables: HashMap<String, Arc<RwLock<FlagTable>>>,
    clients: Vec<Arc<InMemoryFlagClient>>,
}

/// Factory for offline runs and tests. Unknown SDK keys get an empty table,
/// which the session treats as an invalid key.
#[derive(Clone, Default)]
pub struct InMemoryClientFactory {
    registry: Arc<Mutex<Registry>>,
}

impl InMemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags<I, K>(sdk_key: &str, flags: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        let factory = Self::new();
        for (key, value) in flags {
            factory.insert(sdk_key, key, value);
        }
        factory
    }

    fn table(&self, sdk_key: &str) -> Arc<RwLock<FlagTable>> {
        lock(&self.registry)
            .tables
            .entry(sdk_key.to_string())
            .or_default()
            .clone()
    }

    fn insert(&self, sdk_key: &str, flag_key: impl Into<String>, value: bool) {
        let table = self.table(sdk_key);
        let mut flags = table.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        flags.insert(flag_key.into(), value);
    }

    /// Changes a flag and notifies every live client of that SDK key.
    /// Returns how many hooks fired.
    pub fn set_flag(&self, sdk_key: &str, flag_key: impl Into<String>, value: bool) -> usize {
        self.insert(sdk_key, flag_key, value);

        let clients: Vec<_> = lock(&self.registry)
            .clients
            .iter()
            .filter(|c| c.sdk_key == sdk_key)
            .cloned()
            .collect();
        clients.iter().filter(|c| c.notify()).count()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.registry).clients.len()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry)
            .clients
            .iter()
            .filter(|c| !c.is_disposed())
            .count()
    }
}

impl FlagClientFactory for InMemoryClientFactory {
    fn create(
        &self,
        options: ClientOptions,
        on_config_changed: ConfigChangedHook,
    ) -> Result<Arc<dyn FlagClient>> {
        let client = Arc::new(InMemoryFlagClient {
            flags: self.table(&options.sdk_key),
            sdk_key: options.sdk_key,
            on_config_changed,
            disposed: AtomicBool::new(false),
        });
        lock(&self.registry).clients.push(client.clone());
        Ok(client)
    }
}
