//! `consent status`: stored decision and sync visibility.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use consent_core::{ConsentRecord, ConsentStatus};

use super::context::AppContext;

/// Arguments for `consent status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let ctx = AppContext::load()?;
        let record = ctx.coordinator.record();
        if self.json {
            return print_json(&record, &ctx.config.endpoint);
        }
        print_table(&record, &ctx.config.endpoint);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    status: String,
    updated_at_ms: i64,
    updated_at: Option<String>,
    remotely_synced: bool,
    revision: u64,
    endpoint: &'a str,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn print_json(record: &ConsentRecord, endpoint: &str) -> Result<()> {
    let payload = StatusJson {
        status: record.status.to_string(),
        updated_at_ms: record.updated_at_ms,
        updated_at: record.updated_at().map(|t| t.to_rfc3339()),
        remotely_synced: record.remotely_synced,
        revision: record.revision,
        endpoint,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(record: &ConsentRecord, endpoint: &str) {
    println!("Consent v{}", env!("CARGO_PKG_VERSION"));

    let updated = match record.updated_at() {
        Some(at) => format!("{} ({} ago)", at.to_rfc3339(), format_datetime_age(at)),
        None => "never".to_string(),
    };
    let rows = vec![
        StatusTableRow {
            field: "status",
            value: status_label(record.status),
        },
        StatusTableRow {
            field: "updated",
            value: updated,
        },
        StatusTableRow {
            field: "synced",
            value: sync_label(record),
        },
        StatusTableRow {
            field: "endpoint",
            value: endpoint.to_string(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !record.status.is_defined() {
        println!("Run 'consent start' to record a decision.");
    } else if !record.remotely_synced {
        println!("Run 'consent sync' to send it to the endpoint.");
    }
}

fn status_label(status: ConsentStatus) -> String {
    match status {
        ConsentStatus::Undefined => "UNDEFINED".bright_black().bold().to_string(),
        ConsentStatus::Accepted => "ACCEPTED".green().bold().to_string(),
        ConsentStatus::Denied => "DENIED".red().bold().to_string(),
    }
}

fn sync_label(record: &ConsentRecord) -> String {
    match (record.status.is_defined(), record.remotely_synced) {
        (false, _) => "nothing to send".bright_black().to_string(),
        (true, true) => "yes".green().to_string(),
        (true, false) => "pending".yellow().to_string(),
    }
}

/// Age of a timestamp, coarsest unit only.
fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
