// Library root
// -----------
// Uploads one image to Qiniu object storage per run. The binary (`main.rs`)
// only parses flags, loads the config and hands over to `ui`.
//
// Module responsibilities:
// - `source`: reads the raw bytes from a local path or an http(s) URL.
// - `transcode`: optional lossy WebP re-encode (alpha flattened on white).
// - `key`: md5-based storage key of the bytes being uploaded.
// - `api`: blocking HTTP client for token fetch, host query and upload.
// - `pipeline`: the linear chain of the steps above.
// - `config`, `error`: the config document and the error taxonomy.
// - `ui`: prompt, spinner and report rendering.
pub mod api;
pub mod config;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod source;
pub mod transcode;
pub mod ui;

pub use api::{QiniuClient, UploadResult};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{upload_image, UploadOptions};
