//! Consent core library: domain types, local state storage, configuration.
//!
//! - [`types`]: [`ConsentStatus`], [`ConsentRecord`], [`ConsentTransmission`]
//! - [`store`]: the [`ConsentStore`] contract, file and memory stores
//! - [`config`]: `~/.consent/config.yaml`
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, StoreError};
pub use store::{ConsentStore, JsonFileStore, MemoryStore};
pub use types::{ConsentRecord, ConsentStatus, ConsentTransmission, WireStatus};
