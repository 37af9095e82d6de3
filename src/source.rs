// Source reader: turns a local path or an `http(s)://` URL into raw bytes
// plus a display name and an optional declared mime type.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Raw input as read from disk or the network.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub bytes: Vec<u8>,
    pub name: String,
    pub declared_mime: Option<String>,
}

pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Read `path_or_url` fully into memory. No size limit is applied.
pub fn read_source(client: &Client, path_or_url: &str, timeout: Duration) -> Result<ImageSource> {
    if is_url(path_or_url) {
        download(client, path_or_url, timeout)
    } else {
        read_local(Path::new(path_or_url))
    }
}

fn download(client: &Client, raw_url: &str, timeout: Duration) -> Result<ImageSource> {
    let url = Url::parse(raw_url)
        .map_err(|e| Error::fetch(format!("invalid url {}: {}", raw_url, e)))?;

    tracing::debug!(%url, "downloading source image");
    let res = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .map_err(|e| Error::fetch(format!("download failed: {}", e)))?;

    let status = res.status();
    if !status.is_success() {
        let txt = res.text().unwrap_or_default();
        return Err(Error::fetch(format!(
            "download failed: {} {}",
            status.as_u16(),
            txt
        )));
    }

    let declared_mime = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_mime_params);
    let bytes = res
        .bytes()
        .map_err(|e| Error::fetch(format!("read response body: {}", e)))?
        .to_vec();

    Ok(ImageSource {
        bytes,
        name: name_from_url(&url),
        declared_mime,
    })
}

fn read_local(path: &Path) -> Result<ImageSource> {
    if !path.exists() {
        return Err(Error::NotFound {
            path: path.display().to_string(),
        });
    }
    let bytes = std::fs::read(path)
        .map_err(|e| Error::fetch(format!("failed to read file {}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let declared_mime = mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string);
    tracing::debug!(path = %path.display(), size = bytes.len(), "read local source");

    Ok(ImageSource {
        bytes,
        name,
        declared_mime,
    })
}

/// `image/png; charset=binary` -> `image/png`
fn strip_mime_params(value: &str) -> Option<String> {
    let base = value.split(';').next().unwrap_or(value).trim();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

fn name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("image")
        .to_string()
}
