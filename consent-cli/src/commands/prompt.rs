//! `consent prompt` and the terminal implementation of the consent prompt.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use consent_core::ConsentStatus;
use consent_sync::{PresentationTrigger, PromptRequest};

use super::context::{describe, AppContext};

/// Asks on stdin/stdout. Anything other than accept/deny dismisses the prompt.
pub struct TerminalPrompt;

impl PresentationTrigger for TerminalPrompt {
    fn prompt(&self, request: &PromptRequest) -> Option<ConsentStatus> {
        println!("{}", request.title.bold());
        println!("{}", request.message);
        print!("[a]ccept / [d]eny (Enter to decide later): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return None;
        }
        parse_answer(&line)
    }
}

fn parse_answer(line: &str) -> Option<ConsentStatus> {
    match line.trim().to_ascii_lowercase().as_str() {
        "a" | "accept" | "y" | "yes" => Some(ConsentStatus::Accepted),
        "d" | "deny" | "n" | "no" => Some(ConsentStatus::Denied),
        _ => None,
    }
}

/// Show the consent prompt now.
#[derive(Args, Debug)]
pub struct PromptArgs {
    /// Replace the configured prompt title.
    #[arg(long)]
    pub title: Option<String>,

    /// Replace the configured prompt message.
    #[arg(long)]
    pub message: Option<String>,
}

impl PromptArgs {
    pub async fn run(self) -> Result<()> {
        let ctx = AppContext::load()?;
        let task = ctx
            .coordinator
            .show_prompt(&TerminalPrompt, self.title.as_deref(), self.message.as_deref())
            .context("failed to record consent decision")?;

        let Some(task) = task else {
            println!("No decision recorded.");
            return Ok(());
        };
        let result = task.wait().await;
        println!("✓ Consent {}: {}", ctx.coordinator.status(), describe(&result));
        if result.is_err() {
            println!("  {}", "Run `consent sync` to retry.".bright_black());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_case_insensitive() {
        assert_eq!(parse_answer("A\n"), Some(ConsentStatus::Accepted));
        assert_eq!(parse_answer(" deny "), Some(ConsentStatus::Denied));
        assert_eq!(parse_answer("YES"), Some(ConsentStatus::Accepted));
    }

    #[test]
    fn anything_else_dismisses() {
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("\n"), None);
        assert_eq!(parse_answer("maybe"), None);
    }
}
