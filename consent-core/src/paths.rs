//! On-disk layout under the user's home directory.
//!
//! ```text
//! ~/.consent/
//!   config.yaml   (optional; defaults apply when absent)
//!   state.json    (mode 0600, written atomically)
//! ```

use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const CONSENT_DIR: &str = ".consent";
pub const STATE_FILE: &str = "state.json";
pub const CONFIG_FILE: &str = "config.yaml";

pub fn consent_root(home: &Path) -> PathBuf {
    home.join(CONSENT_DIR)
}

pub fn state_path(home: &Path) -> PathBuf {
    consent_root(home).join(STATE_FILE)
}

pub fn config_path(home: &Path) -> PathBuf {
    consent_root(home).join(CONFIG_FILE)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}
