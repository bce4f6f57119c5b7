//! Obsidian vault on local disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use inbox_core::limits::MAX_FILENAME_CONFLICTS;
use inbox_core::sanitize_folder;
use tokio::fs::OpenOptions;
use uuid::Uuid;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::VaultConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::note::{note_file_stem, render_note, NoteDraft};

const FOLDER_SCAN_DEPTH: usize = 3;

/// Where notes and attachments are persisted.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Folder paths relative to the store root, sorted.
    async fn existing_folders(&self) -> ConnectorResult<Vec<String>>;

    /// Save an attachment; returns its store-relative path for embedding.
    async fn save_attachment(&self, data: Bytes, file_name: &str) -> ConnectorResult<String>;

    /// Write the note; returns its store-relative path.
    async fn write_note(&self, draft: &NoteDraft) -> ConnectorResult<String>;

    /// Delete a file previously returned by this store. Missing is not an error.
    async fn remove(&self, path: &str) -> ConnectorResult<()>;

    /// Whether notes can currently be written.
    async fn ping(&self) -> ConnectorResult<()> {
        Ok(())
    }
}

/// Writes markdown notes into an Obsidian vault.
#[derive(Debug, Clone)]
pub struct VaultNoteStore {
    config: VaultConfig,
}

impl VaultNoteStore {
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// Whether the vault root is an existing directory.
    pub async fn check(&self) -> bool {
        tokio::fs::metadata(&self.config.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Vault-relative folder for a note.
    fn note_folder(&self, draft: &NoteDraft) -> String {
        let incoming = self.config.incoming_folder.trim_matches('/');
        if !self.config.use_suggested_folder {
            return incoming.to_string();
        }
        let suggested = sanitize_folder(&draft.analysis.suggested_folder);
        if incoming.is_empty() {
            suggested
        } else {
            format!("{}/{}", incoming, suggested)
        }
    }
}

fn persistence(context: &str, err: std::io::Error) -> ConnectorError {
    ConnectorError::Persistence(format!("{}: {}", context, err))
}

/// Temporary file removed when dropped, including when the writing
/// future is cancelled mid-write.
struct StagedFile {
    path: PathBuf,
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staged file");
            }
        }
    }
}

async fn stage_file(dir: &Path, contents: &[u8]) -> ConnectorResult<StagedFile> {
    let staged = StagedFile {
        path: dir.join(format!(".{}.partial", Uuid::new_v4())),
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged.path)
        .await
        .map_err(|e| persistence("open file", e))?;
    file.write_all(contents)
        .await
        .map_err(|e| persistence("write file", e))?;
    file.sync_all()
        .await
        .map_err(|e| persistence("sync file", e))?;
    Ok(staged)
}

/// Create `<dir>/<stem><ext>`, or `<stem>-N<ext>` when taken.
///
/// Contents are written to a hidden staged file first and published with a
/// hard link, which fails if the name exists. A failed or cancelled write
/// never leaves a partial file under a visible name.
async fn create_unique(
    dir: &Path,
    stem: &str,
    extension: &str,
    contents: &[u8],
) -> ConnectorResult<String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| persistence("create folder", e))?;

    let staged = stage_file(dir, contents).await?;

    for attempt in 0..=MAX_FILENAME_CONFLICTS {
        let name = if attempt == 0 {
            format!("{}{}", stem, extension)
        } else {
            format!("{}-{}{}", stem, attempt, extension)
        };

        match tokio::fs::hard_link(&staged.path, dir.join(&name)).await {
            Ok(()) => {
                if attempt > 0 {
                    debug!(file = %name, "Resolved filename conflict");
                }
                return Ok(name);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(persistence("publish file", e)),
        }
    }

    Err(ConnectorError::Persistence(format!(
        "could not resolve filename conflict for {} after {} attempts",
        stem, MAX_FILENAME_CONFLICTS
    )))
}

fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}

fn scan_folders(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, prefix: &str, depth: usize, out: &mut Vec<String>) {
        if depth > FOLDER_SCAN_DEPTH {
            return;
        }
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            walk(&entry.path(), &relative, depth + 1, out);
            out.push(relative);
        }
    }

    let mut folders = Vec::new();
    walk(root, "", 1, &mut folders);
    folders.sort();
    folders
}

#[async_trait]
impl NoteStore for VaultNoteStore {
    async fn existing_folders(&self) -> ConnectorResult<Vec<String>> {
        let root: PathBuf = self.config.path.clone();
        let folders = tokio::task::spawn_blocking(move || scan_folders(&root))
            .await
            .map_err(|e| ConnectorError::Persistence(format!("folder scan: {}", e)))?;
        debug!(count = folders.len(), "Scanned vault folders");
        Ok(folders)
    }

    async fn save_attachment(&self, data: Bytes, file_name: &str) -> ConnectorResult<String> {
        let media = self.config.media_folder.trim_matches('/');
        let (stem, extension) = split_file_name(file_name);
        let name = create_unique(&self.config.path.join(media), stem, extension, &data).await?;

        let relative = format!("{}/{}", media, name);
        info!(path = %relative, bytes = data.len(), "Attachment saved");
        Ok(relative)
    }

    async fn write_note(&self, draft: &NoteDraft) -> ConnectorResult<String> {
        if let Err(e) = self.ping().await {
            warn!(vault = %self.config.path.display(), "Vault path missing");
            return Err(e);
        }

        let folder = self.note_folder(draft);
        let stem = note_file_stem(&draft.title, draft.created, self.config.filename_strategy);
        let contents = render_note(draft, &self.config);
        let name = create_unique(&self.config.path.join(&folder), &stem, ".md", contents.as_bytes())
            .await?;

        let relative = format!("{}/{}", folder, name);
        info!(path = %relative, "Note saved");
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> ConnectorResult<()> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(ConnectorError::Persistence(format!(
                "refusing to remove path outside the vault: {}",
                path
            )));
        }

        match tokio::fs::remove_file(self.config.path.join(relative)).await {
            Ok(()) => {
                info!(path = %path, "Vault file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("remove file", e)),
        }
    }

    async fn ping(&self) -> ConnectorResult<()> {
        if self.check().await {
            Ok(())
        } else {
            Err(ConnectorError::Persistence(format!(
                "vault path does not exist: {}",
                self.config.path.display()
            )))
        }
    }
}
