//! Remote drive item exposed through the backup filesystem traits.
//!
//! One [`RemoteEntry`] type serves both files and directories because the
//! role is only known from the item's metadata at runtime. Calls that only
//! make sense for the other role fail with `NotADirectory` / `IsADirectory`
//! before the store is contacted.

use crate::core::filesystem::DriveFileSystem;
use crate::domain::model::{ChunkUploadError, HashAlgorithm, RemoteItem};
use crate::domain::ports::{
    ByteStream, DirectoryInfo, FileInfo, FileSystemInfo, HashProvider, RemoteStore, UploadRequest,
};
use crate::utils::cancel::cancellable;
use crate::utils::error::{DriveError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Retries allowed per chunk; the fourth failure of a chunk is final.
pub const MAX_CHUNK_RETRIES: u32 = 3;

fn retry_chunk_below_limit(event: &ChunkUploadError<'_>) -> bool {
    event.attempt_count < MAX_CHUNK_RETRIES
}

/// Read-only view over one item snapshot.
///
/// The entry never writes back to the item; after a remote change, query
/// again to get a fresh entry.
pub struct RemoteEntry<S: RemoteStore> {
    file_system: Arc<DriveFileSystem<S>>,
    item: RemoteItem,
}

impl<S: RemoteStore> RemoteEntry<S> {
    pub fn new(file_system: Arc<DriveFileSystem<S>>, item: RemoteItem) -> Self {
        Self { file_system, item }
    }

    /// Fallible constructor for call sites where either part may be missing.
    pub fn from_parts(
        file_system: Option<Arc<DriveFileSystem<S>>>,
        item: Option<RemoteItem>,
    ) -> Result<Self> {
        let file_system = file_system.ok_or_else(|| DriveError::invalid_argument("file_system"))?;
        let item = item.ok_or_else(|| DriveError::invalid_argument("item"))?;
        Ok(Self::new(file_system, item))
    }

    pub fn file_system(&self) -> &Arc<DriveFileSystem<S>> {
        &self.file_system
    }

    pub fn item(&self) -> &RemoteItem {
        &self.item
    }

    fn store(&self) -> &S {
        self.file_system.store()
    }

    fn wrap(&self, item: RemoteItem) -> Self {
        Self::new(Arc::clone(&self.file_system), item)
    }

    fn ensure_directory(&self) -> Result<()> {
        if self.is_directory() {
            Ok(())
        } else {
            Err(DriveError::NotADirectory {
                path: self.full_name(),
            })
        }
    }
}

impl<S: RemoteStore> Clone for RemoteEntry<S> {
    fn clone(&self) -> Self {
        self.wrap(self.item.clone())
    }
}

impl<S: RemoteStore> fmt::Debug for RemoteEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEntry")
            .field("full_name", &self.full_name())
            .field("is_directory", &self.is_directory())
            .finish()
    }
}

#[async_trait]
impl<S: RemoteStore> FileSystemInfo for RemoteEntry<S> {
    fn name(&self) -> &str {
        &self.item.name
    }

    fn is_directory(&self) -> bool {
        self.item.is_folder()
    }

    fn creation_time_utc(&self) -> DateTime<Utc> {
        self.item.created_date_time
    }

    fn last_write_time_utc(&self) -> DateTime<Utc> {
        self.item.last_modified_date_time
    }

    fn full_name(&self) -> String {
        // a parent reference without a path still contributes the separator
        match &self.item.parent_reference {
            Some(parent) => format!(
                "{}/{}",
                parent.path.as_deref().unwrap_or(""),
                self.item.name
            ),
            None => self.item.name.clone(),
        }
    }

    async fn delete(&self, ct: &CancellationToken) -> Result<()> {
        tracing::debug!("Deleting '{}'", self.full_name());
        cancellable(ct, self.store().delete(&self.item, ct)).await
    }
}

#[async_trait]
impl<S: RemoteStore> DirectoryInfo for RemoteEntry<S> {
    type Entry = RemoteEntry<S>;

    async fn get_items(&self, ct: &CancellationToken) -> Result<Vec<Self::Entry>> {
        self.ensure_directory()?;
        let children = cancellable(ct, self.store().list_children(&self.item, ct)).await?;
        Ok(children.into_iter().map(|item| self.wrap(item)).collect())
    }

    async fn create_file(
        &self,
        name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        length: u64,
        ct: &CancellationToken,
    ) -> Result<Self::Entry> {
        self.ensure_directory()?;

        let request = UploadRequest {
            name,
            content,
            length,
            chunk_size: self.file_system.upload_chunk_size(),
            on_chunk_error: &retry_chunk_below_limit,
        };
        let item = cancellable(ct, self.store().upload_file(&self.item, request, ct)).await?;

        tracing::info!(
            "⬆️ Uploaded '{}' ({} bytes) into '{}'",
            item.name,
            item.size,
            self.full_name()
        );
        Ok(self.wrap(item))
    }

    async fn create_directory(&self, name: &str, ct: &CancellationToken) -> Result<Self::Entry> {
        self.ensure_directory()?;
        let item = cancellable(ct, self.store().create_folder(&self.item, name, ct)).await?;
        Ok(self.wrap(item))
    }
}

#[async_trait]
impl<S: RemoteStore> FileInfo for RemoteEntry<S> {
    fn length(&self) -> u64 {
        self.item.size
    }

    async fn open_read(&self, ct: &CancellationToken) -> Result<ByteStream> {
        if self.is_directory() {
            return Err(DriveError::IsADirectory {
                path: self.full_name(),
            });
        }

        match cancellable(ct, self.store().download(&self.item, ct)).await {
            Err(DriveError::ContentNotAvailable) => {
                tracing::debug!("'{}' has no content, reading as empty", self.full_name());
                Ok(Box::pin(tokio::io::empty()) as ByteStream)
            }
            other => other,
        }
    }
}

impl<S: RemoteStore> HashProvider for RemoteEntry<S> {
    fn get_hash(&self, algorithm_name: &str) -> Option<Vec<u8>> {
        let algorithm = HashAlgorithm::from_name(algorithm_name)?;
        let encoded = self.item.hash(algorithm)?;

        match STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed {} hash on '{}': {}",
                    algorithm.name(),
                    self.full_name(),
                    e
                );
                None
            }
        }
    }
}
