//! `consent init [--endpoint <url>] [--device-id <id>] [--force]`

use anyhow::{Context, Result};
use clap::Args;

use consent_core::{config, Config};

use super::context::home;

/// Write the consent configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Consent collection endpoint (http:// or https://).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Fixed device identifier; by default a hash of the machine id is sent.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Application name shown in the consent prompt.
    #[arg(long)]
    pub app_name: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let mut config = Config::default();
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(app_name) = self.app_name {
            config.app_name = app_name;
        }
        config.device_id = self.device_id;

        let path = config::save_at(&home, &config, self.force)
            .context("failed to write consent config")?;

        println!("✓ Wrote {}", path.display());
        println!("  Endpoint: {}", config.endpoint);
        Ok(())
    }
}
