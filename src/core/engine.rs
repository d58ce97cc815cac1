use crate::core::board::BoardSnapshot;
use crate::core::fanout::FanOutReport;
use crate::core::session::Session;
use crate::domain::model::DomainSpec;
use crate::domain::ports::FlagClientFactory;
use crate::utils::error::Result;

pub struct SimulationEngine<F: FlagClientFactory> {
    session: Session<F>,
    sdk_key: String,
    extra: Option<DomainSpec>,
}

impl<F: FlagClientFactory> SimulationEngine<F> {
    pub fn new(session: Session<F>, sdk_key: impl Into<String>, extra: Option<DomainSpec>) -> Self {
        Self {
            session,
            sdk_key: sdk_key.into(),
            extra,
        }
    }

    pub fn session(&self) -> &Session<F> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<F> {
        &mut self.session
    }

    /// Connect, generate, confirm the flag and wait for every evaluation.
    pub async fn run_once(&mut self) -> Result<BoardSnapshot> {
        tracing::info!("🚀 Starting flag simulation");

        let keys = self.session.initialize_client(&self.sdk_key).await?;
        tracing::info!("🔑 Available flags: {}", keys.join(", "));

        self.session.regenerate_users(self.extra.as_ref())?;

        let requested = self.session.flag_key().to_string();
        let flag_key = self.session.confirm_flag_key(&requested)?;
        tracing::info!("🎯 Evaluating feature flag '{}'", flag_key);

        if let Some(report) = self.session.settle().await {
            log_report(&report);
        }
        Ok(self.session.snapshot())
    }

    /// Runs once, then re-evaluates on every config change until ctrl-c.
    pub async fn watch<R>(&mut self, mut on_snapshot: R) -> Result<()>
    where
        R: FnMut(&Session<F>, &BoardSnapshot),
    {
        let snapshot = self.run_once().await?;
        on_snapshot(&self.session, &snapshot);
        tracing::info!("👀 Watching for flag changes, press Ctrl-C to stop");

        loop {
            tokio::select! {
                change = self.session.next_config_change() => {
                    let Some(epoch) = change else { break };
                    if self.session.handle_config_change(epoch).await? {
                        if let Some(report) = self.session.settle().await {
                            log_report(&report);
                        }
                        on_snapshot(&self.session, &self.session.snapshot());
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("🛑 Interrupted, shutting down");
                    break;
                }
            }
        }

        self.session.shutdown().await;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        self.session.shutdown().await;
    }
}

fn log_report(report: &FanOutReport) {
    tracing::info!(
        "📊 Batch {} - applied: {}, failed: {}, stale: {}",
        report.generation,
        report.applied,
        report.failed,
        report.stale
    );
}
