pub mod toml_config;

pub use toml_config::DriveConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "drive-ls")]
#[command(about = "List a remote drive folder with sizes and content hashes")]
pub struct ListArgs {
    /// TOML file with a [drive] section; falls back to DRIVE_* environment variables
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value = "/")]
    pub path: String,

    #[arg(long, default_value = "SHA1")]
    pub algorithm: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ListArgs {
    pub fn load_config(&self) -> crate::utils::error::Result<DriveConfig> {
        match &self.config {
            Some(path) => DriveConfig::from_file(path),
            None => DriveConfig::from_env(),
        }
    }
}
