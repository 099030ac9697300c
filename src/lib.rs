pub mod config;
pub mod core;
pub mod domain;
pub mod store;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::ListArgs;

pub use config::DriveConfig;
pub use crate::core::{DriveFileSystem, RemoteEntry};
pub use domain::model::{HashAlgorithm, RemoteItem};
pub use domain::ports::{
    ByteStream, ConfigProvider, DirectoryInfo, FileInfo, FileSystemInfo, HashProvider,
    RemoteStore,
};
pub use store::{GraphClient, MemoryStore};
pub use utils::error::{DriveError, Result};
