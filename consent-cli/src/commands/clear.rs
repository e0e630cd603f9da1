//! `consent clear`: forget the stored decision.

use anyhow::{Context, Result};

use super::context::AppContext;

pub fn run() -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.coordinator
        .clear()
        .context("failed to clear consent state")?;
    println!("✓ Consent state cleared");
    Ok(())
}
