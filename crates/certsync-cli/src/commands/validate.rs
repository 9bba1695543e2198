use std::path::PathBuf;

use anyhow::Context;
use certsync_core::{CertificateEntry, ConfigurationDocument};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Configuration document to check
    #[arg(long)]
    pub file: PathBuf,
}

/// Per-entry outcome of resolving a document
pub struct ValidationReport {
    pub valid: Vec<CertificateEntry>,
    pub invalid: Vec<(String, String)>,
}

pub fn validate_document(text: &str) -> anyhow::Result<ValidationReport> {
    let document = ConfigurationDocument::parse(text)?;
    let mut report = ValidationReport {
        valid: Vec::new(),
        invalid: Vec::new(),
    };
    for (id, resolved) in document.resolve_all() {
        match resolved {
            Ok(entry) => report.valid.push(entry),
            Err(e) => report.invalid.push((id, e.to_string())),
        }
    }
    Ok(report)
}

impl ValidateCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let report = validate_document(&text)?;

        for entry in &report.valid {
            println!(
                "{} {} [{}] {} via {}{}",
                "✓".bright_green(),
                entry.id.bold(),
                entry.domains.join(", "),
                if entry.enabled { "enabled" } else { "disabled" },
                entry.directory_url(),
                entry
                    .store_handle
                    .as_deref()
                    .map(|h| format!(" -> {}", h))
                    .unwrap_or_default()
            );
        }
        for (id, reason) in &report.invalid {
            println!("{} {} {}", "✗".bright_red(), id.bold(), reason);
        }

        if report.invalid.is_empty() {
            println!("{} entries valid", report.valid.len());
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} of {} entries are invalid",
                report.invalid.len(),
                report.invalid.len() + report.valid.len()
            ))
        }
    }
}
