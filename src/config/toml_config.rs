use crate::core::filesystem::DEFAULT_UPLOAD_CHUNK_SIZE;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{DriveError, Result};
use crate::utils::validation::{
    validate_multiple_of, validate_non_empty_string, validate_positive_number, validate_range,
    validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 120;

/// Upload session chunks must be a multiple of this size.
pub const CHUNK_GRANULARITY: usize = 320 * 1024;
pub const MAX_UPLOAD_CHUNK_SIZE: usize = 60 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub drive: DriveSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSection {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: usize,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_upload_chunk_size() -> usize {
    DEFAULT_UPLOAD_CHUNK_SIZE
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: String::new(),
            upload_chunk_size: default_upload_chunk_size(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl DriveConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DriveError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DriveError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 從環境變數建立配置；DRIVE_ACCESS_TOKEN 為必填，其餘欄位使用預設值
    pub fn from_env() -> Result<Self> {
        let mut drive = DriveSection::default();

        if let Ok(api_base) = std::env::var("DRIVE_API_BASE") {
            drive.api_base = api_base;
        }
        let token = std::env::var("DRIVE_ACCESS_TOKEN").ok();
        drive.access_token = validate_required_field("DRIVE_ACCESS_TOKEN", &token)?.clone();
        if let Ok(raw) = std::env::var("DRIVE_UPLOAD_CHUNK_SIZE") {
            drive.upload_chunk_size = parse_env_number("DRIVE_UPLOAD_CHUNK_SIZE", &raw)?;
        }
        if let Ok(raw) = std::env::var("DRIVE_REQUEST_TIMEOUT_SECONDS") {
            drive.request_timeout_seconds =
                parse_env_number("DRIVE_REQUEST_TIMEOUT_SECONDS", &raw)?;
        }

        Ok(Self { drive })
    }

    /// 替換環境變數 (例如 ${DRIVE_ACCESS_TOKEN})，未定義的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DriveError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

fn parse_env_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DriveError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "Value must be a non-negative integer".to_string(),
        })
}

impl ConfigProvider for DriveConfig {
    fn api_base(&self) -> &str {
        &self.drive.api_base
    }

    fn access_token(&self) -> &str {
        &self.drive.access_token
    }

    fn upload_chunk_size(&self) -> usize {
        self.drive.upload_chunk_size
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.drive.request_timeout_seconds)
    }
}

impl Validate for DriveConfig {
    fn validate(&self) -> Result<()> {
        validate_url("drive.api_base", &self.drive.api_base)?;
        validate_non_empty_string("drive.access_token", &self.drive.access_token)?;

        validate_positive_number("drive.upload_chunk_size", self.drive.upload_chunk_size, 1)?;
        validate_multiple_of(
            "drive.upload_chunk_size",
            self.drive.upload_chunk_size,
            CHUNK_GRANULARITY,
        )?;
        validate_range(
            "drive.upload_chunk_size",
            self.drive.upload_chunk_size,
            CHUNK_GRANULARITY,
            MAX_UPLOAD_CHUNK_SIZE,
        )?;

        validate_range(
            "drive.request_timeout_seconds",
            self.drive.request_timeout_seconds,
            1,
            3600,
        )?;

        Ok(())
    }
}
