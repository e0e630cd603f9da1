//! Composition root: the single place a [`ConsentCoordinator`] is built.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use consent_core::{config, paths, Config, JsonFileStore};
use consent_sync::{ConsentCoordinator, SyncError, SyncOutcome};

pub struct AppContext {
    pub home: PathBuf,
    pub config: Config,
    pub coordinator: ConsentCoordinator,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let home = home()?;
        let config = config::load_at(&home).context("failed to load ~/.consent/config.yaml")?;
        let store = Arc::new(JsonFileStore::at(&home));
        let coordinator = ConsentCoordinator::from_config(&config, store);
        Ok(Self {
            home,
            config,
            coordinator,
        })
    }
}

pub fn home() -> Result<PathBuf> {
    Ok(paths::home()?)
}

/// One-line, human-readable description of a finished sync.
pub fn describe(result: &Result<SyncOutcome, SyncError>) -> String {
    match result {
        Ok(SyncOutcome::Synced) => "acknowledged by the consent endpoint".to_string(),
        Ok(SyncOutcome::Superseded) => {
            "superseded by a newer decision; that decision is synced separately".to_string()
        }
        Ok(SyncOutcome::UpToDate) => "already in sync".to_string(),
        Err(err) => format!("not synced: {err}"),
    }
}
