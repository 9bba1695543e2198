//! Locating the files produced by a successful `certonly`
//!
//! The tool normally writes to `live/<lineage>`, but may report a different directory or
//! suffix the lineage with `-0001` style counters. Strategies are tried in order and the
//! first one naming an existing directory wins.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::errors::IssuerError;

pub const CERT_FILE: &str = "cert.pem";
pub const CHAIN_FILE: &str = "chain.pem";
pub const FULLCHAIN_FILE: &str = "fullchain.pem";
pub const PRIVKEY_FILE: &str = "privkey.pem";

/// Paths of the four PEM artifacts of one lineage, all verified to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePaths {
    pub directory: PathBuf,
    pub cert_path: PathBuf,
    pub chain_path: PathBuf,
    pub full_chain_path: PathBuf,
    pub private_key_path: PathBuf,
}

impl CertificatePaths {
    fn in_directory(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            cert_path: directory.join(CERT_FILE),
            chain_path: directory.join(CHAIN_FILE),
            full_chain_path: directory.join(FULLCHAIN_FILE),
            private_key_path: directory.join(PRIVKEY_FILE),
        }
    }

    /// (backup file name, path) pairs in a fixed order
    pub fn files(&self) -> [(&'static str, &Path); 4] {
        [
            (CERT_FILE, self.cert_path.as_path()),
            (CHAIN_FILE, self.chain_path.as_path()),
            (FULLCHAIN_FILE, self.full_chain_path.as_path()),
            (PRIVKEY_FILE, self.private_key_path.as_path()),
        ]
    }
}

/// Everything a strategy may look at
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub lineage_name: String,
    pub live_dir: PathBuf,
    /// Names of the subdirectories of `live_dir`
    pub live_entries: Vec<String>,
    /// Combined stdout/stderr of the tool
    pub output: String,
}

pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn candidate(&self, ctx: &ResolutionContext) -> Option<PathBuf>;
}

/// Directory of the first "... saved at: <path>" line
pub struct SavedAtStrategy;

impl ResolveStrategy for SavedAtStrategy {
    fn name(&self) -> &'static str {
        "saved-at"
    }

    fn candidate(&self, ctx: &ResolutionContext) -> Option<PathBuf> {
        static SAVED_AT: OnceLock<Regex> = OnceLock::new();
        let re = SAVED_AT.get_or_init(|| {
            Regex::new(r"(?im)saved at:\s*(\S+)").expect("static regex is valid")
        });

        re.captures_iter(&ctx.output)
            .filter_map(|c| c.get(1))
            .map(|m| PathBuf::from(m.as_str()))
            .find_map(|file| file.parent().map(Path::to_path_buf))
    }
}

/// `live/<lineage>` exactly
pub struct LineageDirStrategy;

impl ResolveStrategy for LineageDirStrategy {
    fn name(&self) -> &'static str {
        "lineage-dir"
    }

    fn candidate(&self, ctx: &ResolutionContext) -> Option<PathBuf> {
        ctx.live_entries
            .iter()
            .any(|e| e == &ctx.lineage_name)
            .then(|| ctx.live_dir.join(&ctx.lineage_name))
    }
}

/// Highest-numbered `<lineage>-N`, with the unnumbered directory ranked lowest
pub struct HighestSuffixStrategy;

impl HighestSuffixStrategy {
    fn suffix_index(lineage: &str, entry: &str) -> Option<i64> {
        if entry == lineage {
            return Some(-1);
        }
        let rest = entry.strip_prefix(lineage)?.strip_prefix('-')?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse::<i64>().ok()
    }
}

impl ResolveStrategy for HighestSuffixStrategy {
    fn name(&self) -> &'static str {
        "highest-suffix"
    }

    fn candidate(&self, ctx: &ResolutionContext) -> Option<PathBuf> {
        ctx.live_entries
            .iter()
            .filter_map(|entry| {
                Self::suffix_index(&ctx.lineage_name, entry).map(|index| (index, entry))
            })
            .max_by_key(|(index, _)| *index)
            .map(|(_, entry)| ctx.live_dir.join(entry))
    }
}

pub struct OutputResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl Default for OutputResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SavedAtStrategy),
            Box::new(LineageDirStrategy),
            Box::new(HighestSuffixStrategy),
        ])
    }
}

impl OutputResolver {
    pub fn new(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the context from the live directory and the tool's output
    pub async fn context(
        lineage_name: &str,
        live_dir: &Path,
        output: &str,
    ) -> Result<ResolutionContext, IssuerError> {
        let mut live_entries = Vec::new();
        match fs::read_dir(live_dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| IssuerError::io(live_dir, e))?
                {
                    if is_dir(&entry.path()).await {
                        live_entries.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IssuerError::io(live_dir, e)),
        }
        live_entries.sort();

        Ok(ResolutionContext {
            lineage_name: lineage_name.to_string(),
            live_dir: live_dir.to_path_buf(),
            live_entries,
            output: output.to_string(),
        })
    }

    pub async fn resolve(&self, ctx: &ResolutionContext) -> Result<CertificatePaths, IssuerError> {
        for strategy in &self.strategies {
            let Some(directory) = strategy.candidate(ctx) else {
                continue;
            };
            if !is_dir(&directory).await {
                debug!(
                    "Strategy {} proposed {} which does not exist",
                    strategy.name(),
                    directory.display()
                );
                continue;
            }

            info!(
                "Resolved certificate output for {} via {}: {}",
                ctx.lineage_name,
                strategy.name(),
                directory.display()
            );
            let paths = CertificatePaths::in_directory(&directory);
            for (name, path) in paths.files() {
                if fs::metadata(path).await.is_err() {
                    return Err(IssuerError::OutputResolution(format!(
                        "{} missing in {}",
                        name,
                        directory.display()
                    )));
                }
            }
            return Ok(paths);
        }

        Err(IssuerError::OutputResolution(format!(
            "no output directory found for lineage {} under {}",
            ctx.lineage_name,
            ctx.live_dir.display()
        )))
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
