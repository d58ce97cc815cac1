use crate::domain::model::UserContext;
use crate::domain::ports::{ClientOptions, ConfigChangedHook, FlagClient, FlagClientFactory};
use crate::utils::error::{Result, SimError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct FlagsDocument {
    pub version: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateRequest<'a> {
    flag_key: &'a str,
    default_value: bool,
    user: &'a UserContext,
}

#[derive(Debug, Deserialize)]
struct EvaluateResponse {
    value: bool,
}

/// 與遠端評估服務共用的狀態，輪詢任務與 client 各持一份
struct Shared {
    http: Client,
    flags_url: String,
    evaluate_url: String,
    last_version: Mutex<Option<String>>,
    disposed: AtomicBool,
}

impl Shared {
    /// `None` means the service does not know the SDK key.
    async fn fetch_flags(&self) -> Result<Option<FlagsDocument>> {
        let response = self.http.get(&self.flags_url).send().await?;
        let status = response.status();
        tracing::debug!("Flags response status: {}", status);

        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SimError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response.json::<FlagsDocument>().await?))
    }

    /// Records `version` and reports whether it differs from a previously
    /// seen one. The first observation never counts as a change.
    fn observe_version(&self, version: &str) -> bool {
        let mut last = self
            .last_version
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = last.as_deref().is_some_and(|previous| previous != version);
        *last = Some(version.to_string());
        changed
    }
}

pub struct HttpFlagClient {
    shared: Arc<Shared>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl HttpFlagClient {
    pub fn new(options: ClientOptions, on_config_changed: ConfigChangedHook) -> Result<Self> {
        let base_url = options
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let root = url::Url::parse(&format!("{}/", base_url))?;
        let flags_url = endpoint(&root, &options.sdk_key, "flags")?;
        let evaluate_url = endpoint(&root, &options.sdk_key, "evaluate")?;

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let shared = Arc::new(Shared {
            http,
            flags_url: flags_url.to_string(),
            evaluate_url: evaluate_url.to_string(),
            last_version: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let poller = tokio::spawn(poll_loop(
            shared.clone(),
            options.poll_interval,
            on_config_changed,
        ));

        Ok(Self {
            shared,
            poller: Mutex::new(Some(poller)),
        })
    }
}

/// `{root}/v1/{sdk_key}/{leaf}`. The key is pushed as a single segment so
/// `/`, `?` and `#` in it get percent-encoded.
fn endpoint(root: &url::Url, sdk_key: &str, leaf: &str) -> Result<url::Url> {
    let mut url = root.clone();
    url.path_segments_mut()
        .map_err(|_| SimError::ConfigError {
            message: format!("base URL '{}' cannot carry a path", root),
        })?
        .pop_if_empty()
        .push("v1")
        .push(sdk_key)
        .push(leaf);
    Ok(url)
}

async fn poll_loop(shared: Arc<Shared>, every: Duration, on_config_changed: ConfigChangedHook) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if shared.disposed.load(Ordering::SeqCst) {
            break;
        }

        match shared.fetch_flags().await {
            Ok(Some(document)) => {
                if shared.observe_version(&document.version)
                    && !shared.disposed.load(Ordering::SeqCst)
                {
                    tracing::debug!("Flag config version changed to {}", document.version);
                    on_config_changed();
                }
            }
            Ok(None) => tracing::debug!("Poll: SDK key unknown to flag service"),
            Err(e) => tracing::warn!("⚠️ Flag config poll failed: {}", e),
        }
    }
}

#[async_trait]
impl FlagClient for HttpFlagClient {
    async fn get_all_keys(&self) -> Result<Vec<String>> {
        if self.is_disposed() {
            return Err(SimError::ClientDisposed);
        }

        match self.shared.fetch_flags().await? {
            Some(document) => {
                self.shared.observe_version(&document.version);
                Ok(document.keys)
            }
            None => {
                tracing::warn!("❌ Flag service does not recognise the SDK key");
                Ok(Vec::new())
            }
        }
    }

    async fn get_value(
        &self,
        flag_key: &str,
        default_value: bool,
        user: &UserContext,
    ) -> Result<bool> {
        if self.is_disposed() {
            return Err(SimError::ClientDisposed);
        }

        let body = EvaluateRequest {
            flag_key,
            default_value,
            user,
        };
        let response = self
            .shared
            .http
            .post(&self.shared.evaluate_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SimError::EvaluationError {
                flag_key: flag_key.to_string(),
                message: format!("flag service responded with {}", status),
            });
        }

        let evaluated: EvaluateResponse = response.json().await?;
        Ok(evaluated.value)
    }

    async fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(poller) = poller {
            poller.abort();
        }
    }

    fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for HttpFlagClient {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(poller) = poller.take() {
                poller.abort();
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn new() -> Self {
        Self
    }
}

impl FlagClientFactory for HttpClientFactory {
    fn create(
        &self,
        options: ClientOptions,
        on_config_changed: ConfigChangedHook,
    ) -> Result<Arc<dyn FlagClient>> {
        Ok(Arc::new(HttpFlagClient::new(options, on_config_changed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared {
            http: Client::new(),
            flags_url: "http://localhost/v1/key/flags".to_string(),
            evaluate_url: "http://localhost/v1/key/evaluate".to_string(),
            last_version: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_first_version_is_not_a_change() {
        let shared = shared();
        assert!(!shared.observe_version("v1"));
        assert!(!shared.observe_version("v1"));
        assert!(shared.observe_version("v2"));
    }

    #[test]
    fn test_endpoint_encodes_sdk_key_as_one_segment() {
        let root = url::Url::parse("http://localhost:8787/").unwrap();
        assert_eq!(
            endpoint(&root, "abc/123", "flags").unwrap().as_str(),
            "http://localhost:8787/v1/abc%2F123/flags"
        );
        assert_eq!(
            endpoint(&root, "key?x#y", "evaluate").unwrap().as_str(),
            "http://localhost:8787/v1/key%3Fx%23y/evaluate"
        );

        let nested = url::Url::parse("http://localhost:8787/api/").unwrap();
        assert_eq!(
            endpoint(&nested, "sdk-key", "flags").unwrap().as_str(),
            "http://localhost:8787/api/v1/sdk-key/flags"
        );
    }

    #[test]
    fn test_evaluate_request_shape() {
        let user = UserContext {
            identifier: "id".to_string(),
            email: "a@dog.com".to_string(),
            country: "US".to_string(),
            custom: crate::domain::model::CustomAttributes {
                subscription_type: "Free".to_string(),
                tenant: "Acme".to_string(),
            },
        };
        let body = serde_json::to_value(EvaluateRequest {
            flag_key: "beta",
            default_value: false,
            user: &user,
        })
        .unwrap();

        assert_eq!(body["flagKey"], "beta");
        assert_eq!(body["defaultValue"], false);
        assert_eq!(body["user"]["email"], "a@dog.com");
    }
}
