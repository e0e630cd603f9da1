//! Device identifier providers.
//!
//! The identifier is sent alongside every consent record so the remote side
//! can attribute it to a device. [`MachineIdProvider`] hashes the platform
//! machine id so the raw value never leaves the device.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use consent_core::Config;

use crate::error::IdentifierError;

/// Yields a stable per-device identifier.
#[async_trait]
pub trait DeviceIdProvider: Send + Sync {
    async fn fetch(&self) -> Result<String, IdentifierError>;
}

/// A configured, fixed identifier.
#[derive(Debug, Clone)]
pub struct FixedIdProvider(pub String);

#[async_trait]
impl DeviceIdProvider for FixedIdProvider {
    async fn fetch(&self) -> Result<String, IdentifierError> {
        let id = self.0.trim();
        if id.is_empty() {
            return Err(IdentifierError::InvalidState(
                "configured device id is empty".to_string(),
            ));
        }
        Ok(id.to_string())
    }
}

/// SHA-256 of the platform machine-id file.
#[derive(Debug, Clone)]
pub struct MachineIdProvider {
    path: PathBuf,
}

impl MachineIdProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DeviceIdProvider for MachineIdProvider {
    async fn fetch(&self) -> Result<String, IdentifierError> {
        let path = self.path.clone();
        // File reads block; keep them off the async workers.
        let read = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path))
            .await
            .map_err(|e| IdentifierError::InvalidState(format!("identifier task failed: {e}")))?;

        let raw = match read {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(IdentifierError::PlatformUnavailable(format!(
                    "{} does not exist",
                    self.path.display()
                )))
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(IdentifierError::PlatformNeedsUserAction(format!(
                    "permission denied reading {}",
                    self.path.display()
                )))
            }
            Err(err) => {
                return Err(IdentifierError::PlatformUnavailable(format!(
                    "{}: {err}",
                    self.path.display()
                )))
            }
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentifierError::InvalidState(format!(
                "{} is empty",
                self.path.display()
            )));
        }
        Ok(hash_identifier(raw))
    }
}

/// Pick the provider the config asks for: a fixed id wins over the machine id.
pub fn provider_from_config(config: &Config) -> Box<dyn DeviceIdProvider> {
    match config.device_id.as_deref() {
        Some(id) => Box::new(FixedIdProvider(id.to_string())),
        None => Box::new(MachineIdProvider::new(&config.machine_id_path)),
    }
}

fn hash_identifier(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn machine_id_is_hashed_and_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine-id");
        std::fs::write(&path, "0123456789abcdef\n").unwrap();

        let provider = MachineIdProvider::new(&path);
        let first = provider.fetch().await.unwrap();
        let second = provider.fetch().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, "0123456789abcdef");
    }

    #[tokio::test]
    async fn missing_machine_id_is_platform_unavailable() {
        let dir = TempDir::new().unwrap();
        let provider = MachineIdProvider::new(dir.path().join("nope"));
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, IdentifierError::PlatformUnavailable(_)), "got: {err}");
    }

    #[tokio::test]
    async fn blank_machine_id_is_invalid_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine-id");
        std::fs::write(&path, "  \n").unwrap();
        let err = MachineIdProvider::new(&path).fetch().await.unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidState(_)), "got: {err}");
    }

    #[tokio::test]
    async fn fixed_id_wins_in_config() {
        let config = Config {
            device_id: Some("test_id".into()),
            ..Config::default()
        };
        assert_eq!(provider_from_config(&config).fetch().await.unwrap(), "test_id");
    }

    #[tokio::test]
    async fn empty_fixed_id_rejected() {
        let err = FixedIdProvider(" ".into()).fetch().await.unwrap_err();
        assert!(matches!(err, IdentifierError::InvalidState(_)));
    }
}
