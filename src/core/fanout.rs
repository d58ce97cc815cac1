use crate::core::board::UserBoard;
use crate::core::random::RandomSource;
use crate::domain::ports::FlagClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Failed,
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub generation: u64,
    pub applied: usize,
    pub failed: usize,
    pub stale: usize,
}

/// One evaluation batch in flight.
pub struct FanOutHandle {
    generation: u64,
    tasks: JoinSet<Outcome>,
}

impl FanOutHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn wait(mut self) -> FanOutReport {
        let mut report = FanOutReport {
            generation: self.generation,
            ..FanOutReport::default()
        };

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Stale) => report.stale += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Evaluation task did not finish: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Evaluates one flag for every user on the board, each call after its own
/// random delay so completions spread over a visible window.
pub struct FanOut {
    random: Arc<dyn RandomSource>,
    max_delay: Duration,
}

impl FanOut {
    pub fn new(random: Arc<dyn RandomSource>, max_delay: Duration) -> Self {
        Self { random, max_delay }
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn dispatch(
        &self,
        client: Arc<dyn FlagClient>,
        flag_key: &str,
        board: Arc<UserBoard>,
    ) -> FanOutHandle {
        let (generation, users) = board.begin_batch();
        let max_delay_ms = self.max_delay.as_millis().max(1) as u64;
        let mut tasks = JoinSet::new();

        tracing::info!(
            "🚦 Evaluating '{}' for {} users (batch {})",
            flag_key,
            users.len(),
            generation
        );

        for (index, synthetic) in users.into_iter().enumerate() {
            let delay = Duration::from_millis(self.random.below(max_delay_ms));
            let client = client.clone();
            let board = board.clone();
            let flag_key = flag_key.to_string();

            tasks.spawn(async move {
                tokio::time::sleep(delay).await;

                match client.get_value(&flag_key, false, &synthetic.user).await {
                    Ok(value) => {
                        if board.apply(generation, index, value) {
                            Outcome::Applied
                        } else {
                            tracing::debug!(
                                "Discarding stale result for {} (batch {})",
                                synthetic.user.email,
                                generation
                            );
                            Outcome::Stale
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Evaluation of '{}' failed for {}: {}",
                            flag_key,
                            synthetic.user.email,
                            e
                        );
                        if board.record_failure(generation, index) {
                            Outcome::Failed
                        } else {
                            Outcome::Stale
                        }
                    }
                }
            });
        }

        FanOutHandle { generation, tasks }
    }
}
