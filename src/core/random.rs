use fake::faker::name::raw::Name;
use fake::locales::EN;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use uuid::Builder;

/// Pluggable source of randomness for user generation and evaluation jitter.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, upper)`. `upper` must be non-zero.
    fn below(&self, upper: u64) -> u64;

    /// Fresh UUID v4 string.
    fn identifier(&self) -> String;

    /// "First Last" style display name.
    fn name(&self) -> String;
}

pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // 中毒的鎖不影響亂數狀態，直接沿用
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn below(&self, upper: u64) -> u64 {
        self.with_rng(|rng| rng.gen_range(0..upper))
    }

    fn identifier(&self) -> String {
        let bytes: [u8; 16] = self.with_rng(|rng| rng.gen());
        Builder::from_random_bytes(bytes).into_uuid().to_string()
    }

    fn name(&self) -> String {
        self.with_rng(|rng| Name(EN).fake_with_rng(rng))
    }
}

pub fn pick<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = random.below(items.len() as u64) as usize;
    items.get(index)
}
