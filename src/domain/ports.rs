use crate::domain::model::{ChunkUploadError, RemoteItem};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Readable content of a remote file.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Decides whether a failed chunk is sent again.
pub type OnChunkError = dyn Fn(&ChunkUploadError<'_>) -> bool + Send + Sync;

pub struct UploadRequest<'a> {
    pub name: &'a str,
    pub content: &'a mut (dyn AsyncRead + Send + Unpin),
    pub length: u64,
    pub chunk_size: usize,
    pub on_chunk_error: &'a OnChunkError,
}

/// Client side of the remote drive.
///
/// Implementations must surface a content-less item on download as
/// `DriveError::ContentNotAvailable` and must return `DriveError::Cancelled`
/// once `ct` fires.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up an item by drive-relative path; `""` and `"/"` are the root.
    /// Returns `Ok(None)` when nothing exists at `path`.
    async fn get_item(&self, path: &str, ct: &CancellationToken) -> Result<Option<RemoteItem>>;

    async fn list_children(
        &self,
        item: &RemoteItem,
        ct: &CancellationToken,
    ) -> Result<Vec<RemoteItem>>;

    async fn delete(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<()>;

    async fn download(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<ByteStream>;

    async fn upload_file(
        &self,
        parent: &RemoteItem,
        request: UploadRequest<'_>,
        ct: &CancellationToken,
    ) -> Result<RemoteItem>;

    async fn create_folder(
        &self,
        parent: &RemoteItem,
        name: &str,
        ct: &CancellationToken,
    ) -> Result<RemoteItem>;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base(&self) -> &str;
    fn access_token(&self) -> &str;
    fn upload_chunk_size(&self) -> usize;
    fn request_timeout(&self) -> Duration;
}

/// Descriptor shared by files and directories.
#[async_trait]
pub trait FileSystemInfo: Send + Sync {
    fn name(&self) -> &str;
    fn is_directory(&self) -> bool;
    fn creation_time_utc(&self) -> DateTime<Utc>;
    fn last_write_time_utc(&self) -> DateTime<Utc>;
    fn full_name(&self) -> String;

    async fn delete(&self, ct: &CancellationToken) -> Result<()>;
}

#[async_trait]
pub trait DirectoryInfo: FileSystemInfo {
    type Entry: FileSystemInfo;

    async fn get_items(&self, ct: &CancellationToken) -> Result<Vec<Self::Entry>>;

    async fn create_file(
        &self,
        name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        length: u64,
        ct: &CancellationToken,
    ) -> Result<Self::Entry>;

    async fn create_directory(&self, name: &str, ct: &CancellationToken) -> Result<Self::Entry>;
}

#[async_trait]
pub trait FileInfo: FileSystemInfo {
    fn length(&self) -> u64;

    async fn open_read(&self, ct: &CancellationToken) -> Result<ByteStream>;
}

pub trait HashProvider {
    /// Raw hash bytes for `algorithm_name`, or `None` when unknown here.
    fn get_hash(&self, algorithm_name: &str) -> Option<Vec<u8>>;
}
