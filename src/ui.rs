// UI layer: asks for the image location with `dialoguer`, shows a spinner
// while the pipeline runs, and renders the outcome for the terminal.

use crate::api::{QiniuClient, UploadResult};
use crate::error::{Error, Result};
use crate::pipeline::{upload_image, UploadOptions};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Ask for a local path or URL. Empty input is an error.
pub fn prompt_source() -> Result<String> {
    let answer: String = Input::new()
        .with_prompt("Image path or URL")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| Error::input(format!("cannot read input: {}", e)))?;
    validate_source(&answer)
}

pub fn validate_source(raw: &str) -> Result<String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::input("no image path or URL given"));
    }
    Ok(s.to_string())
}

/// Run the upload for `source` (prompting when absent) behind a spinner.
pub fn run(client: &QiniuClient, source: Option<String>, opts: &UploadOptions) -> Result<UploadResult> {
    let source = match source {
        Some(s) => validate_source(&s)?,
        None => prompt_source()?,
    };

    // Draws on stderr, so stdout carries only the report.
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Uploading...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = upload_image(client, &source, opts);
    spinner.finish_and_clear();
    outcome
}

pub fn render_report(result: &UploadResult) -> String {
    let pretty = serde_json::to_string_pretty(&result.raw).unwrap_or_else(|_| result.raw.to_string());
    format!(
        "Upload succeeded\nkey: {}\nhash: {}\nfsize: {}\nresponse_json:\n{}",
        result.key, result.hash, result.fsize, pretty
    )
}

/// Single diagnostic line; multi-line response bodies are folded.
pub fn render_failure(err: &Error) -> String {
    let msg = err.to_string().replace(['\r', '\n'], " ");
    format!("Upload failed: {}: {}", err.kind(), msg.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_source_is_input_error() {
        assert_eq!(validate_source("   \n").unwrap_err().kind(), "InputError");
        assert_eq!(validate_source(" ./a.png \n").unwrap(), "./a.png");
    }

    #[test]
    fn report_keeps_non_ascii() {
        let result = UploadResult {
            key: "d41d8cd98f00b204e9800998ecf8427e.webp".into(),
            hash: "FhX".into(),
            fsize: 42,
            raw: json!({"key": "d41d8cd98f00b204e9800998ecf8427e.webp", "note": "上传成功"}),
        };
        let out = render_report(&result);
        assert!(out.starts_with("Upload succeeded\nkey: d41d8cd98f00b204e9800998ecf8427e.webp\n"));
        assert!(out.contains("fsize: 42"));
        assert!(out.contains("上传成功"));
        assert!(out.contains("\n  \"note\""));
    }

    #[test]
    fn failure_is_one_line() {
        let err = Error::Upload {
            status: 403,
            body: "forbidden".into(),
        };
        let line = render_failure(&err);
        assert_eq!(line, "Upload failed: UploadError: upload failed: 403 forbidden");
    }

    #[test]
    fn failure_folds_multiline_bodies() {
        let err = Error::Upload {
            status: 500,
            body: "line one\nline two\n".into(),
        };
        let line = render_failure(&err);
        assert!(!line.contains('\n'));
        assert!(line.ends_with("line one line two"));
    }
}
