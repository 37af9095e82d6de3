// One upload, start to finish: read, transcode, key, token, host, upload.
// Strictly sequential; the first error aborts and later steps never run.

use crate::api::{QiniuClient, UploadResult};
use crate::config::Config;
use crate::error::Result;
use crate::key::storage_key;
use crate::source::read_source;
use crate::transcode::{prepare_payload, TranscodeOptions};

/// Per-run settings taken from the config document.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub user_token: String,
    pub bucket: String,
    pub transcode: TranscodeOptions,
}

impl UploadOptions {
    pub fn from_config(cfg: &Config) -> Self {
        UploadOptions {
            user_token: cfg.user_token.clone(),
            bucket: cfg.bucket.clone(),
            transcode: TranscodeOptions {
                enable_webp: cfg.enable_webp,
                quality: cfg.webp_quality(),
            },
        }
    }
}

pub fn upload_image(
    client: &QiniuClient,
    path_or_url: &str,
    opts: &UploadOptions,
) -> Result<UploadResult> {
    let source = read_source(client.http(), path_or_url, client.timeouts().fetch)?;
    tracing::info!(
        name = %source.name,
        size = source.bytes.len(),
        mime = source.declared_mime.as_deref().unwrap_or("-"),
        "source loaded"
    );

    let payload = prepare_payload(source, &opts.transcode)?;
    let key = storage_key(&payload.bytes, &payload.extension);
    tracing::info!(%key, mime = %payload.mime_type, size = payload.bytes.len(), "payload ready");

    let upload_token = client.fetch_upload_token(&opts.user_token)?;
    let host = client.resolve_upload_host(&upload_token, &opts.bucket);
    tracing::info!(%host, bucket = %opts.bucket, "upload host resolved");

    let result = client.upload(payload, &key, &upload_token, &host)?;
    tracing::info!(key = %result.key, hash = %result.hash, fsize = result.fsize, "upload complete");
    Ok(result)
}
