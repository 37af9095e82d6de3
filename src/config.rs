// Configuration: a small JSON document (`config.json`) read once per run.
// Only `user_token` is required; everything else has a default so a
// minimal `{"user_token": "..."}` file is enough to get going.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "QINIU_UPLOAD_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_BUCKET: &str = "chat68";
pub const DEFAULT_TOKEN_URL: &str = "https://chat-go.jwzhd.com/v1/misc/qiniu-token";
pub const DEFAULT_HOST_QUERY_URL: &str = "https://api.qiniu.com/v4/query";
pub const DEFAULT_UPLOAD_HOST: &str = "upload-z2.qiniup.com";
pub const DEFAULT_WEBP_QUALITY: u8 = 95;

/// Shape of `config.json`. Unknown fields are ignored.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub user_token: String,
    #[serde(default = "default_enable_webp")]
    pub enable_webp: bool,
    #[serde(default = "default_webp_quality")]
    pub webp_quality: u32,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_token_url")]
    pub qiniu_token_url: String,
    #[serde(default = "default_host_query_url")]
    pub host_query_url: String,
    #[serde(default = "default_upload_host")]
    pub default_upload_host: String,
}

fn default_enable_webp() -> bool {
    true
}

fn default_webp_quality() -> u32 {
    DEFAULT_WEBP_QUALITY as u32
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.into()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.into()
}

fn default_host_query_url() -> String {
    DEFAULT_HOST_QUERY_URL.into()
}

fn default_upload_host() -> String {
    DEFAULT_UPLOAD_HOST.into()
}

impl Config {
    /// Parse and validate a config document.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut cfg: Config = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid {}: {}", CONFIG_FILE_NAME, e)))?;
        cfg.user_token = cfg.user_token.trim().to_string();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.user_token.is_empty() {
            return Err(Error::config(format!(
                "user_token in {} is empty",
                CONFIG_FILE_NAME
            )));
        }
        if self.webp_quality > 100 {
            return Err(Error::config(format!(
                "webp_quality must be between 0 and 100, got {}",
                self.webp_quality
            )));
        }
        if self.bucket.trim().is_empty() {
            return Err(Error::config("bucket must not be empty"));
        }
        Ok(())
    }

    pub fn webp_quality(&self) -> u8 {
        self.webp_quality.min(100) as u8
    }
}

/// Locate the config file: explicit flag, then `QINIU_UPLOAD_CONFIG`, then
/// `config.json` beside the executable, in the working directory, and in the
/// per-user config directory. Returns the first candidate that exists.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let candidates = candidate_paths();
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            Error::config(format!(
                "{} not found (tried: {})",
                CONFIG_FILE_NAME,
                tried.join(", ")
            ))
        })
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        out.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(dir) = std::env::current_dir() {
        out.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = dirs::config_dir() {
        out.push(dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_gets_defaults() {
        let cfg = Config::from_json(r#"{"user_token": "  abc  "}"#).unwrap();
        assert_eq!(cfg.user_token, "abc");
        assert!(cfg.enable_webp);
        assert_eq!(cfg.webp_quality(), 95);
        assert_eq!(cfg.bucket, DEFAULT_BUCKET);
        assert_eq!(cfg.qiniu_token_url, DEFAULT_TOKEN_URL);
        assert_eq!(cfg.host_query_url, DEFAULT_HOST_QUERY_URL);
        assert_eq!(cfg.default_upload_host, DEFAULT_UPLOAD_HOST);
    }

    #[test]
    fn empty_user_token_is_rejected() {
        let err = Config::from_json(r#"{"user_token": "   "}"#).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn missing_user_token_is_rejected() {
        let err = Config::from_json(r#"{"enable_webp": false}"#).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let err = Config::from_json(r#"{"user_token": "t", "webp_quality": 101}"#).unwrap_err();
        assert!(err.to_string().contains("webp_quality"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{user_token:").unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn explicit_path_wins() {
        let p = Path::new("/tmp/some-config.json");
        assert_eq!(locate(Some(p)).unwrap(), p);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here/config.json")).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(err.to_string().contains("/definitely/not/here"));
    }
}
