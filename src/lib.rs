pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{http_client::HttpClientFactory, memory_client::InMemoryClientFactory};
pub use crate::core::{
    board::{BoardSnapshot, UserBoard},
    engine::SimulationEngine,
    fanout::{FanOut, FanOutReport},
    generator::UserGenerator,
    random::{RandomSource, StdRandom},
    session::{Session, SessionSettings},
};
pub use crate::utils::error::{Result, SimError};
