pub mod entry;
pub mod filesystem;

pub use crate::domain::model::{HashAlgorithm, RemoteItem};
pub use crate::domain::ports::{
    ConfigProvider, DirectoryInfo, FileInfo, FileSystemInfo, HashProvider, RemoteStore,
};
pub use crate::utils::error::Result;
pub use entry::RemoteEntry;
pub use filesystem::DriveFileSystem;
