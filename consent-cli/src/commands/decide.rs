//! `consent accept` / `consent deny`

use anyhow::{Context, Result};
use colored::Colorize;

use consent_core::ConsentStatus;

use super::context::{describe, AppContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Deny,
}

impl From<Decision> for ConsentStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Accept => ConsentStatus::Accepted,
            Decision::Deny => ConsentStatus::Denied,
        }
    }
}

/// Store the decision, send it, and fail the process if the endpoint did not
/// acknowledge it. The local record is kept either way.
pub async fn run(decision: Decision) -> Result<()> {
    let ctx = AppContext::load()?;
    let status = ConsentStatus::from(decision);

    let task = ctx
        .coordinator
        .set_status(status)
        .context("failed to record consent decision")?;
    println!("✓ Consent {status} (saved locally)");

    let result = task.wait().await;
    match &result {
        Ok(_) => println!("  {}", describe(&result).green()),
        Err(_) => {
            println!("  {}", describe(&result).yellow());
            println!("  Run `consent sync` to retry.");
        }
    }
    result?;
    Ok(())
}
