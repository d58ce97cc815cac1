pub mod board;
pub mod engine;
pub mod fanout;
pub mod generator;
pub mod random;
pub mod session;

pub use crate::domain::model::{DomainSpec, StartupData, SyntheticUser, UserContext};
pub use crate::domain::ports::{ClientOptions, ConfigChangedHook, FlagClient, FlagClientFactory};
pub use crate::utils::error::Result;
