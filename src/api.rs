// API client module: a small blocking HTTP client for the three remote
// calls of an upload: fetch an upload token, ask the storage service which
// ingestion host serves the bucket, and POST the multipart form there.
// Every request is a single attempt with its own timeout.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transcode::UploadPayload;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const TOKEN_SERVICE: &str = "qiniu-token";
const UPLOAD_SERVICE: &str = "qiniu-upload";
const UPLOAD_USER_AGENT: &str = "QiniuDart";

/// Remote endpoints. `default_upload_host` is what host resolution falls
/// back to whenever the query service is unusable.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub host_query_url: String,
    pub default_upload_host: String,
}

impl Endpoints {
    pub fn from_config(cfg: &Config) -> Self {
        Endpoints {
            token_url: cfg.qiniu_token_url.clone(),
            host_query_url: cfg.host_query_url.clone(),
            default_upload_host: cfg.default_upload_host.clone(),
        }
    }
}

/// Per-call timeouts. Uploads get minutes, everything else tens of seconds.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub fetch: Duration,
    pub token: Duration,
    pub host_query: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            fetch: Duration::from_secs(60),
            token: Duration::from_secs(30),
            host_query: Duration::from_secs(30),
            upload: Duration::from_secs(300),
        }
    }
}

/// What the storage service reported for a stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub key: String,
    pub hash: String,
    pub fsize: i64,
    pub raw: Value,
}

/// Blocking client holding one connection pool for the whole run.
#[derive(Clone)]
pub struct QiniuClient {
    client: Client,
    endpoints: Endpoints,
    timeouts: Timeouts,
}

impl QiniuClient {
    pub fn new(endpoints: Endpoints, timeouts: Timeouts) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(QiniuClient {
            client,
            endpoints,
            timeouts,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(Endpoints::from_config(cfg), Timeouts::default())
    }

    /// Underlying HTTP client, shared with the source reader.
    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchange the user's auth token for a short-lived upload token.
    pub fn fetch_upload_token(&self, user_token: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(user_token).map_err(|_| {
            Error::config("user_token contains characters not allowed in an HTTP header")
        })?;
        headers.insert("token", token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let res = self
            .client
            .get(&self.endpoints.token_url)
            .headers(headers)
            .timeout(self.timeouts.token)
            .send()
            .map_err(|e| Error::Network {
                service: TOKEN_SERVICE,
                message: e.to_string(),
            })?;

        let txt = checked_text(res, TOKEN_SERVICE, |status, body| Error::Upstream {
            service: TOKEN_SERVICE,
            status,
            body,
        })?;
        parse_token_response(&txt)
    }

    /// Find the ingestion host for `bucket`. Never fails: anything going
    /// wrong yields the configured default host.
    pub fn resolve_upload_host(&self, upload_token: &str, bucket: &str) -> String {
        match self.query_upload_host(upload_token, bucket) {
            Ok(Some(host)) => host,
            Ok(None) => {
                tracing::warn!(bucket, "host query returned no upload domain, using default host");
                self.endpoints.default_upload_host.clone()
            }
            Err(e) => {
                tracing::warn!(error = %e, "host query failed, using default host");
                self.endpoints.default_upload_host.clone()
            }
        }
    }

    fn query_upload_host(&self, upload_token: &str, bucket: &str) -> Result<Option<String>> {
        let url = host_query_url(&self.endpoints.host_query_url, access_key(upload_token), bucket);
        tracing::debug!(%url, "querying upload host");

        let res = self
            .client
            .get(&url)
            .timeout(self.timeouts.host_query)
            .send()
            .map_err(|e| Error::Network {
                service: "qiniu-query",
                message: e.to_string(),
            })?;
        let txt = checked_text(res, "qiniu-query", |status, body| Error::Upstream {
            service: "qiniu-query",
            status,
            body,
        })?;
        let parsed: HostQueryResponse = serde_json::from_str(&txt)
            .map_err(|e| Error::protocol(format!("parse host query json: {}", e)))?;
        Ok(parsed.first_up_domain())
    }

    /// POST the payload as a multipart form to `host`. The bytes move into
    /// the request body.
    pub fn upload(
        &self,
        payload: UploadPayload,
        key: &str,
        upload_token: &str,
        host: &str,
    ) -> Result<UploadResult> {
        let url = upload_url(host);
        let UploadPayload {
            bytes, mime_type, ..
        } = payload;
        let size = bytes.len();

        let part = multipart::Part::bytes(bytes)
            .file_name(key.to_string())
            .mime_str(&mime_type)
            .map_err(|e| Error::input(format!("invalid mime type {}: {}", mime_type, e)))?;
        let form = multipart::Form::new()
            .text("token", upload_token.to_string())
            .text("key", key.to_string())
            .part("file", part);

        tracing::debug!(%url, key, size, "uploading");
        let res = self
            .client
            .post(&url)
            .header(USER_AGENT, UPLOAD_USER_AGENT)
            .header(ACCEPT_ENCODING, "gzip")
            .timeout(self.timeouts.upload)
            .multipart(form)
            .send()
            .map_err(|e| Error::Network {
                service: UPLOAD_SERVICE,
                message: format!("{} (url={})", e, url),
            })?;

        let txt = checked_text(res, UPLOAD_SERVICE, |status, body| Error::Upload { status, body })?;
        parse_upload_response(&txt)
    }
}

/// Read the body, or turn a non-2xx response into the caller's error.
/// A body that cannot be read on a 2xx is a transport failure.
fn checked_text(
    res: Response,
    service: &'static str,
    on_status: impl FnOnce(u16, String) -> Error,
) -> Result<String> {
    let status = res.status();
    if !status.is_success() {
        let txt = res.text().unwrap_or_default();
        return Err(on_status(status.as_u16(), txt));
    }
    res.text().map_err(|e| Error::Network {
        service,
        message: format!("read response body: {}", e),
    })
}

/// The part of an upload token before the first `:`.
pub fn access_key(upload_token: &str) -> &str {
    upload_token.split(':').next().unwrap_or("")
}

fn host_query_url(base: &str, ak: &str, bucket: &str) -> String {
    format!(
        "{}?ak={}&bucket={}",
        base,
        urlencoding::encode(ak),
        urlencoding::encode(bucket)
    )
}

/// `https://<host>/`, unless the host already names its own scheme.
pub fn upload_url(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/", host.trim_end_matches('/'))
    } else {
        format!("https://{}/", host.trim_end_matches('/'))
    }
}

/// `{ "code": 1, "data": { "token": "..." } }`
pub fn parse_token_response(txt: &str) -> Result<String> {
    let payload: Value = serde_json::from_str(txt)
        .map_err(|e| Error::protocol(format!("parse {} json: {}", TOKEN_SERVICE, e)))?;

    let code = match payload.get("code") {
        None | Some(Value::Null) => 0,
        Some(v) => coerce_int(v).ok_or_else(|| {
            Error::protocol(format!("{} api error: non-integer code in {}", TOKEN_SERVICE, txt))
        })?,
    };
    if code != 1 {
        return Err(Error::protocol(format!("{} api error: {}", TOKEN_SERVICE, txt)));
    }

    payload
        .get("data")
        .and_then(|d| d.get("token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::protocol(format!("{} missing token: {}", TOKEN_SERVICE, txt)))
}

/// Any 2xx body that is JSON is accepted; absent fields take their defaults.
pub fn parse_upload_response(txt: &str) -> Result<UploadResult> {
    let raw: Value = serde_json::from_str(txt)
        .map_err(|e| Error::protocol(format!("parse upload response json: {} ({})", e, txt)))?;

    Ok(UploadResult {
        key: field_string(&raw, "key"),
        hash: field_string(&raw, "hash"),
        fsize: raw.get("fsize").and_then(coerce_int).unwrap_or(0),
        raw,
    })
}

fn field_string(v: &Value, name: &str) -> String {
    match v.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Integer view of a JSON scalar: numbers, numeric strings and booleans.
fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

#[derive(Deserialize, Debug, Default)]
struct HostQueryResponse {
    #[serde(default)]
    hosts: Vec<HostEntry>,
}

#[derive(Deserialize, Debug, Default)]
struct HostEntry {
    #[serde(default)]
    up: UpDomains,
}

#[derive(Deserialize, Debug, Default)]
struct UpDomains {
    #[serde(default)]
    domains: Vec<String>,
}

impl HostQueryResponse {
    fn first_up_domain(&self) -> Option<String> {
        self.hosts
            .first()
            .and_then(|h| h.up.domains.first())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }
}
