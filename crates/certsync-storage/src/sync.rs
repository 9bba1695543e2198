//! Bidirectional sync between a local working tree and an object store prefix

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::StorageError;
use crate::object_store::ObjectStore;

/// Object under a synced prefix recording symbolic links, which objects cannot represent
pub const SYMLINK_MANIFEST: &str = ".symlinks.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SymlinkManifest {
    /// Relative link path -> link target, exactly as read from the filesystem
    links: BTreeMap<String, String>,
}

/// What a pull or push moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub files: usize,
    pub links: usize,
    pub bytes: u64,
    /// Push found no local directory
    pub skipped: bool,
}

pub struct StateSync {
    store: Arc<dyn ObjectStore>,
}

impl StateSync {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Download every object under `remote_prefix` into `local_dir`, preserving relative paths
    pub async fn pull(
        &self,
        remote_prefix: &str,
        local_dir: &Path,
    ) -> Result<SyncReport, StorageError> {
        let prefix = dir_prefix(remote_prefix);
        let keys = self.store.list_keys(&prefix).await?;

        fs::create_dir_all(local_dir)
            .await
            .map_err(|e| StorageError::io(local_dir, e))?;

        let mut report = SyncReport::default();
        let mut manifest: Option<SymlinkManifest> = None;

        for key in keys {
            let Some(relative) = key.strip_prefix(&prefix) else {
                continue;
            };
            if relative.is_empty() || relative.ends_with('/') {
                continue;
            }
            let Some(target) = safe_join(local_dir, relative) else {
                warn!("Skipping object with unsafe key: {}", key);
                continue;
            };

            let Some(body) = self.store.get(&key).await? else {
                debug!("Object {} disappeared between list and get", key);
                continue;
            };

            if relative == SYMLINK_MANIFEST {
                manifest = Some(serde_json::from_slice(&body).map_err(|e| {
                    StorageError::InvalidContent {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?);
                continue;
            }

            write_file(&target, &body).await?;
            report.files += 1;
            report.bytes += body.len() as u64;
        }

        if let Some(manifest) = manifest {
            for (relative, link_target) in manifest.links {
                let Some(link_path) = safe_join(local_dir, &relative) else {
                    warn!("Skipping symlink with unsafe path: {}", relative);
                    continue;
                };
                create_symlink(&link_path, &link_target).await?;
                report.links += 1;
            }
        }

        info!(
            "Pulled {} files and {} links ({} bytes) from {} into {}",
            report.files,
            report.links,
            report.bytes,
            prefix,
            local_dir.display()
        );
        Ok(report)
    }

    /// Upload every file under `local_dir` beneath `remote_prefix`
    pub async fn push(
        &self,
        local_dir: &Path,
        remote_prefix: &str,
    ) -> Result<SyncReport, StorageError> {
        if fs::metadata(local_dir).await.is_err() {
            info!(
                "Local directory {} does not exist, nothing to push",
                local_dir.display()
            );
            return Ok(SyncReport {
                skipped: true,
                ..Default::default()
            });
        }

        let prefix = dir_prefix(remote_prefix);
        let mut report = SyncReport::default();
        let mut manifest = SymlinkManifest::default();
        let mut pending = vec![local_dir.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io(&path, e))?;
                let relative = relative_key(local_dir, &path);

                if file_type.is_symlink() {
                    let link_target = fs::read_link(&path)
                        .await
                        .map_err(|e| StorageError::io(&path, e))?;
                    manifest
                        .links
                        .insert(relative, link_target.to_string_lossy().into_owned());
                    report.links += 1;
                } else if file_type.is_dir() {
                    pending.push(path);
                } else {
                    let body = fs::read(&path)
                        .await
                        .map_err(|e| StorageError::io(&path, e))?;
                    let key = format!("{}{}", prefix, relative);
                    report.bytes += body.len() as u64;
                    self.store
                        .put(&key, body, Some(guess_content_type(&key)))
                        .await?;
                    report.files += 1;
                }
            }
        }

        // Always written so that links removed locally do not resurrect on the next pull
        let manifest_body = serde_json::to_vec_pretty(&manifest).map_err(|e| {
            StorageError::InvalidContent {
                key: format!("{}{}", prefix, SYMLINK_MANIFEST),
                reason: e.to_string(),
            }
        })?;
        self.store
            .put(
                &format!("{}{}", prefix, SYMLINK_MANIFEST),
                manifest_body,
                Some("application/json"),
            )
            .await?;

        info!(
            "Pushed {} files and {} links ({} bytes) from {} to {}",
            report.files,
            report.links,
            report.bytes,
            local_dir.display(),
            prefix
        );
        Ok(report)
    }

    /// UTF-8 content of a single object, `None` if absent
    pub async fn fetch_text(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.store.get(key).await? {
            Some(body) => String::from_utf8(body)
                .map(Some)
                .map_err(|e| StorageError::InvalidContent {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub async fn put_text(&self, key: &str, content: &str) -> Result<(), StorageError> {
        self.store
            .put(key, content.as_bytes().to_vec(), Some(guess_content_type(key)))
            .await
    }

    pub async fn put_bytes(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.store.put(key, body, Some(guess_content_type(key))).await
    }
}

fn dir_prefix(remote_prefix: &str) -> String {
    let trimmed = remote_prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Join an object-relative path onto `base`, refusing anything that escapes it
fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() {
            continue;
        }
        let component = Path::new(segment).components().next()?;
        match component {
            Component::Normal(part) if Path::new(segment).components().count() == 1 => {
                joined.push(part)
            }
            _ => return None,
        }
    }
    (joined != base).then_some(joined)
}

fn relative_key(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn write_file(target: &Path, body: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    remove_existing_link(target).await?;
    fs::write(target, body)
        .await
        .map_err(|e| StorageError::io(target, e))
}

/// A stale symlink at a file path would otherwise redirect the write into its target
async fn remove_existing_link(path: &Path) -> Result<(), StorageError> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(path)
            .await
            .map_err(|e| StorageError::io(path, e)),
        _ => Ok(()),
    }
}

#[cfg(unix)]
async fn create_symlink(link_path: &Path, link_target: &str) -> Result<(), StorageError> {
    if let Some(parent) = link_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    if fs::symlink_metadata(link_path).await.is_ok() {
        fs::remove_file(link_path)
            .await
            .map_err(|e| StorageError::io(link_path, e))?;
    }
    fs::symlink(link_target, link_path)
        .await
        .map_err(|e| StorageError::io(link_path, e))
}

#[cfg(not(unix))]
async fn create_symlink(link_path: &Path, link_target: &str) -> Result<(), StorageError> {
    warn!(
        "Symlinks are not supported on this platform, skipping {} -> {}",
        link_path.display(),
        link_target
    );
    Ok(())
}

fn guess_content_type(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("json") => "application/json",
        Some("pem") => "application/x-pem-file",
        Some("conf") | Some("txt") | Some("log") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
