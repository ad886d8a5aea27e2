//! Cover image storage
//!
//! Covers are plain files under the upload directory, served statically under
//! the configured public prefix. Deletion is advisory: it never fails
//! observably, so callers can use it for cleanup without masking the error
//! they are already handling.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};

use crate::{
    config::UploadConfig,
    error::{AppError, AppResult},
};

/// Accepted cover extensions, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Lower-cased extension of `filename` if it is on the allow-list
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Persist an upload and return its public reference
    async fn save(&self, bytes: &[u8], original_filename: &str) -> AppResult<String>;

    /// Best-effort removal of the file behind `reference`
    async fn delete(&self, reference: &str);
}

/// Filesystem-backed cover store
pub struct LocalCoverStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalCoverStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.path),
            public_prefix: config.url_prefix(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a reference to a path inside the storage root.
    /// Only the final component is used, so a reference can never escape the root.
    pub fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let name = Path::new(reference).file_name()?;
        Some(self.root.join(name))
    }

    fn unique_name(ext: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("cover_{}_{:08x}.{}", nanos, rand::random::<u32>(), ext)
    }
}

/// Write `bytes` to the freshly created file at `path`.
/// A failed write removes the file so no partial cover is left on disk.
async fn write_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    let result: std::io::Result<()> = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    if let Err(e) = result {
        if let Err(rm) = fs::remove_file(path).await {
            tracing::warn!("Failed to remove partial cover {}: {}", path.display(), rm);
        }
        return Err(AppError::Storage(format!(
            "cannot write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

#[async_trait]
impl CoverStore for LocalCoverStore {
    async fn save(&self, bytes: &[u8], original_filename: &str) -> AppResult<String> {
        let ext = allowed_extension(original_filename).ok_or_else(|| {
            AppError::UnsupportedMediaType(
                "Invalid file type. Only JPG, JPEG, PNG files are allowed".to_string(),
            )
        })?;

        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!("cannot create {}: {}", self.root.display(), e))
        })?;

        let file_name = Self::unique_name(&ext);
        let path = self.root.join(&file_name);

        // create_new: a name collision fails instead of clobbering another upload
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::Storage(format!("cannot create {}: {}", path.display(), e)))?;
        write_or_discard(&path, file, bytes).await?;

        tracing::debug!("Stored cover {} ({} bytes)", file_name, bytes.len());
        Ok(format!("{}/{}", self.public_prefix, file_name))
    }

    async fn delete(&self, reference: &str) {
        let Some(path) = self.path_for(reference) else {
            return;
        };

        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed cover {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cover {} already gone", path.display())
            }
            Err(e) => tracing::warn!("Failed to remove cover {}: {}", path.display(), e),
        }
    }
}
