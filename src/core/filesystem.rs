use crate::core::entry::RemoteEntry;
use crate::domain::ports::{ConfigProvider, RemoteStore};
use crate::utils::cancel::cancellable;
use crate::utils::error::{DriveError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default upload chunk size: 10 MiB, a multiple of the 320 KiB granularity
/// the drive requires for upload sessions.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 32 * 320 * 1024;

/// Owning context for [`RemoteEntry`] values.
///
/// Holds the store handle and the upload chunk size. Entries keep an `Arc`
/// to it, so build it once and share it.
pub struct DriveFileSystem<S: RemoteStore> {
    store: S,
    upload_chunk_size: usize,
}

impl<S: RemoteStore> DriveFileSystem<S> {
    pub fn new(store: S, upload_chunk_size: usize) -> Self {
        Self {
            store,
            upload_chunk_size,
        }
    }

    pub fn from_config<C: ConfigProvider>(store: S, config: &C) -> Self {
        Self::new(store, config.upload_chunk_size())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn upload_chunk_size(&self) -> usize {
        self.upload_chunk_size
    }

    pub async fn root(self: &Arc<Self>, ct: &CancellationToken) -> Result<RemoteEntry<S>> {
        self.get_item("/", ct)
            .await?
            .ok_or_else(|| DriveError::UnexpectedResponse {
                message: "the drive did not return a root folder".to_string(),
            })
    }

    /// Resolve a drive-relative path. `Ok(None)` when nothing is there.
    pub async fn get_item(
        self: &Arc<Self>,
        path: &str,
        ct: &CancellationToken,
    ) -> Result<Option<RemoteEntry<S>>> {
        let item = cancellable(ct, self.store.get_item(path, ct)).await?;
        Ok(item.map(|item| RemoteEntry::new(Arc::clone(self), item)))
    }
}

impl<S: RemoteStore> std::fmt::Debug for DriveFileSystem<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveFileSystem")
            .field("upload_chunk_size", &self.upload_chunk_size)
            .finish_non_exhaustive()
    }
}
