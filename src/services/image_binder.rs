//! Matching uploaded files to variants and persisting them.
//!
//! Single submissions hand out files by position; bulk rows name the files
//! they need. Either way a file is written to disk before its image record is
//! inserted, and an [`ImageBatch`] remembers what it wrote so a failed unit of
//! work can take its files back.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{
    config::MediaConfig,
    database::CatalogTx,
    error::{AppError, Result},
    services::variant_validator::VariantLocator,
    utils::multipart::UploadedFile,
};

#[derive(Debug, Clone)]
pub struct MediaStorage {
    upload_dir: PathBuf,
    error_dir: PathBuf,
    upload_url_prefix: String,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
}

impl MediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            upload_dir: config.upload_dir(),
            error_dir: config.error_dir(),
            upload_url_prefix: config.upload_url_prefix(),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.error_dir).await?;
        Ok(())
    }

    /// Both media directories exist and can be listed.
    pub async fn check_ready(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.error_dir] {
            let metadata = tokio::fs::metadata(dir).await?;
            if !metadata.is_dir() {
                return Err(AppError::InternalError(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn error_dir(&self) -> &Path {
        &self.error_dir
    }

    pub async fn save_upload(&self, file: &UploadedFile) -> Result<StoredFile> {
        let name = storage_name(&file.file_name);
        let path = self.upload_dir.join(&name);
        tokio::fs::write(&path, &file.data).await?;

        Ok(StoredFile {
            path,
            url: format!("{}/{}", self.upload_url_prefix, name),
        })
    }

    /// Writes an import error report and returns where it landed.
    pub async fn write_error_report(&self, contents: &[u8]) -> Result<PathBuf> {
        let short_id = Uuid::new_v4().simple().to_string();
        let path = self.error_dir.join(format!("errors_{}.csv", &short_id[..6]));
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url
            .strip_prefix(&self.upload_url_prefix)?
            .strip_prefix('/')?;
        if name.is_empty() || name.contains(['/', '\\']) {
            return None;
        }
        Some(self.upload_dir.join(name))
    }

    /// Deletes the files behind image URLs whose records are gone.
    pub async fn remove_urls(&self, urls: &[String]) {
        for url in urls {
            if let Some(path) = self.path_for_url(url) {
                remove_quietly(&path).await;
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// `<8 hex>_<cleaned original name>`.
pub fn storage_name(original: &str) -> String {
    let short_id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", &short_id[..8], clean_file_name(original))
}

pub fn clean_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = base.trim().replace(' ', "_").to_lowercase();
    match cleaned.as_str() {
        "" | "." | ".." => "upload".to_string(),
        _ => cleaned,
    }
}

/// Files handed out in upload order.
pub struct PositionalImages<'a> {
    files: &'a [UploadedFile],
    cursor: usize,
}

impl<'a> PositionalImages<'a> {
    pub fn new(files: &'a [UploadedFile]) -> Self {
        Self { files, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.cursor
    }

    pub fn take(&mut self, count: u32, at: VariantLocator) -> Result<&'a [UploadedFile]> {
        let count = count as usize;
        let remaining = self.remaining();
        if remaining < count {
            return Err(AppError::ImageCountMismatch(format!(
                "Not enough images provided for {}. Expected {} images, but received {}.",
                at, count, remaining
            )));
        }

        let taken = &self.files[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(taken)
    }

    /// Every uploaded file must belong to some variant.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(AppError::ImageCountMismatch(format!(
                "Too many images provided. {} uploaded image(s) were not claimed by any variant.",
                extra
            ))),
        }
    }
}

/// Splits `files` between variants by their declared counts, failing before
/// anything is written if the totals do not match exactly.
pub fn assign_positional<'a>(
    files: &'a [UploadedFile],
    counts: &[u32],
) -> Result<Vec<&'a [UploadedFile]>> {
    let mut cursor = PositionalImages::new(files);
    let assigned = counts
        .iter()
        .enumerate()
        .map(|(idx, count)| cursor.take(*count, VariantLocator::Index(idx)))
        .collect::<Result<Vec<_>>>()?;
    cursor.finish()?;
    Ok(assigned)
}

/// Uploaded files looked up by their original file name.
pub struct NamedImages<'a> {
    by_name: HashMap<&'a str, &'a UploadedFile>,
}

impl<'a> NamedImages<'a> {
    pub fn new(files: &'a [UploadedFile]) -> Self {
        let by_name = files
            .iter()
            .map(|file| (file.file_name.as_str(), file))
            .collect();
        Self { by_name }
    }

    pub fn resolve(&self, names: &[String]) -> Result<Vec<&'a UploadedFile>> {
        names
            .iter()
            .map(|name| {
                self.by_name
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| AppError::ImageNotFound(name.clone()))
            })
            .collect()
    }
}

/// Comma separated list from a CSV cell, blanks dropped.
pub fn split_file_names(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Files written during one unit of work.
pub struct ImageBatch<'s> {
    storage: &'s MediaStorage,
    written: Vec<PathBuf>,
}

impl<'s> ImageBatch<'s> {
    pub fn new(storage: &'s MediaStorage) -> Self {
        Self {
            storage,
            written: Vec::new(),
        }
    }

    /// Stores each file and registers it as an image of `variant_id`.
    pub async fn bind(
        &mut self,
        tx: &mut dyn CatalogTx,
        variant_id: i32,
        files: &[&UploadedFile],
    ) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            let stored = self.storage.save_upload(file).await?;
            self.written.push(stored.path);
            tx.insert_image(variant_id, &stored.url).await?;
            urls.push(stored.url);
        }
        Ok(urls)
    }

    /// Commits `tx` and keeps the written files when `outcome` is `Ok`;
    /// otherwise rolls back and removes them.
    pub async fn settle<T: Send>(self, tx: Box<dyn CatalogTx>, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.discard().await;
                    Err(e)
                }
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback failed: {}", rollback_err);
                }
                self.discard().await;
                Err(e)
            }
        }
    }

    pub async fn discard(self) {
        for path in &self.written {
            remove_quietly(path).await;
        }
    }
}
