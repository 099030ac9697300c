use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file or folder as returned by the remote drive.
///
/// Field names follow the Graph `driveItem` resource so responses can be
/// deserialized directly. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub created_date_time: DateTime<Utc>,
    pub last_modified_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_reference: Option<ItemReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Hashes>,
}

/// Content hashes in their transport (base64) encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc32_hash: Option<String>,
}

impl Hashes {
    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&str> {
        match algorithm {
            HashAlgorithm::Sha1 => self.sha1_hash.as_deref(),
            HashAlgorithm::Crc32 => self.crc32_hash.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RemoteItem {
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            size,
            created_date_time: now,
            last_modified_date_time: now,
            folder: None,
            file: Some(FileFacet::default()),
            parent_reference: None,
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            size: 0,
            created_date_time: now,
            last_modified_date_time: now,
            folder: Some(FolderFacet::default()),
            file: None,
            parent_reference: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>, path: impl Into<String>) -> Self {
        self.parent_reference = Some(ItemReference {
            id: Some(parent_id.into()),
            drive_id: None,
            path: Some(path.into()),
        });
        self
    }

    pub fn with_hashes(mut self, hashes: Hashes) -> Self {
        self.file.get_or_insert_with(FileFacet::default).hashes = Some(hashes);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    /// Path of the containing folder, when the drive reported one.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent_reference.as_ref()?.path.as_deref()
    }

    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.file.as_ref()?.hashes.as_ref()?.get(algorithm)
    }
}

/// Hash algorithms the drive reports for file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Crc32,
}

impl HashAlgorithm {
    pub const SHA1: &'static str = "SHA1";
    pub const CRC32: &'static str = "CRC32";

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => Self::SHA1,
            HashAlgorithm::Crc32 => Self::CRC32,
        }
    }

    /// Case-insensitive lookup of a well-known algorithm name.
    pub fn from_name(name: &str) -> Option<Self> {
        [HashAlgorithm::Sha1, HashAlgorithm::Crc32]
            .into_iter()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(name))
    }
}

/// Byte range of one chunk inside an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: u64,
    pub length: u64,
    pub total: u64,
}

impl ChunkRange {
    /// Inclusive index of the last byte, as used by `Content-Range`.
    pub fn end(&self) -> u64 {
        self.offset + self.length - 1
    }

    pub fn is_last(&self) -> bool {
        self.offset + self.length >= self.total
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.offset, self.end(), self.total)
    }
}

/// Passed to the chunk-retry callback after a chunk transfer fails.
#[derive(Debug)]
pub struct ChunkUploadError<'a> {
    pub range: ChunkRange,
    /// Retries already made for this chunk; 0 on the first failure.
    pub attempt_count: u32,
    pub error: &'a crate::utils::error::DriveError,
}
