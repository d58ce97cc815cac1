use crate::domain::model::{EvaluationTally, SyntheticUser};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub generation: u64,
    pub users: Vec<SyntheticUser>,
    pub tally: EvaluationTally,
}

#[derive(Debug, Default)]
struct BoardState {
    generation: u64,
    users: Vec<SyntheticUser>,
    tally: EvaluationTally,
}

/// Owner of the live user list.
///
/// Every list replacement and every evaluation batch bumps the generation.
/// Writes tagged with an older generation are dropped, so a slow evaluation
/// from a superseded batch can never land in the current list.
#[derive(Debug, Default)]
pub struct UserBoard {
    state: Mutex<BoardState>,
}

impl UserBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn replace(&self, users: Vec<SyntheticUser>) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.tally = EvaluationTally {
            pending: users.len(),
            ..EvaluationTally::default()
        };
        state.users = users;
        state.generation
    }

    /// Starts a new evaluation batch over the current list.
    pub fn begin_batch(&self) -> (u64, Vec<SyntheticUser>) {
        let mut state = self.lock();
        state.generation += 1;
        for user in state.users.iter_mut() {
            user.evaluated_at = None;
            user.evaluation_failed = false;
        }
        state.tally = EvaluationTally {
            pending: state.users.len(),
            ..EvaluationTally::default()
        };
        (state.generation, state.users.clone())
    }

    pub fn apply(&self, generation: u64, index: usize, value: bool) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.generation != generation {
            return false;
        }
        let Some(user) = state.users.get_mut(index) else {
            return false;
        };

        let first_result = user.is_pending();
        user.feature_enabled = value;
        user.evaluated_at = Some(Utc::now());
        user.evaluation_failed = false;

        if first_result {
            state.tally.pending = state.tally.pending.saturating_sub(1);
        }
        if value {
            state.tally.enabled += 1;
        } else {
            state.tally.disabled += 1;
        }
        true
    }

    /// Counts a failed evaluation; the user keeps its previous value and is
    /// marked failed instead of pending.
    pub fn record_failure(&self, generation: u64, index: usize) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.generation != generation {
            return false;
        }
        let Some(user) = state.users.get_mut(index) else {
            return false;
        };

        if user.is_pending() {
            state.tally.pending = state.tally.pending.saturating_sub(1);
        }
        user.evaluation_failed = true;
        state.tally.failed += 1;
        true
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn len(&self) -> usize {
        self.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.lock();
        BoardSnapshot {
            generation: state.generation,
            users: state.users.clone(),
            tally: state.tally,
        }
    }
}
