// Transcoder: turns source bytes into the payload that actually gets
// uploaded, either a lossy WebP re-encode or the original bytes untouched.

use crate::error::{Error, Result};
use crate::source::ImageSource;
use image::{DynamicImage, RgbImage};
use std::path::Path;

pub const WEBP_MIME: &str = "image/webp";
pub const WEBP_EXT: &str = "webp";
pub const FALLBACK_MIME: &str = "application/octet-stream";
pub const FALLBACK_EXT: &str = "bin";

/// libwebp's slowest / best-compression method.
const WEBP_METHOD: i32 = 6;

/// Bytes ready for upload plus how to label them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TranscodeOptions {
    pub enable_webp: bool,
    /// 0-100
    pub quality: u8,
}

/// Pick the transcoded or pass-through payload for `source`.
pub fn prepare_payload(source: ImageSource, opts: &TranscodeOptions) -> Result<UploadPayload> {
    if !opts.enable_webp {
        tracing::debug!("webp disabled, uploading original bytes");
        return Ok(passthrough(source));
    }
    let bytes = to_webp(&source.bytes, opts.quality)?;
    tracing::debug!(
        before = source.bytes.len(),
        after = bytes.len(),
        quality = opts.quality,
        "transcoded to webp"
    );
    Ok(UploadPayload {
        bytes,
        mime_type: WEBP_MIME.to_string(),
        extension: WEBP_EXT.to_string(),
    })
}

/// Keep the original bytes; derive mime and extension from what we know.
pub fn passthrough(source: ImageSource) -> UploadPayload {
    let mime_type = source
        .declared_mime
        .unwrap_or_else(|| FALLBACK_MIME.to_string());
    let extension = Path::new(&source.name)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| extension_for_mime(&mime_type));

    UploadPayload {
        bytes: source.bytes,
        mime_type,
        extension,
    }
}

/// Conventional extension for mime types that list several; mime_guess
/// orders them alphabetically (`image/jpeg` would become `jfif`).
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    (FALLBACK_MIME, FALLBACK_EXT),
    ("image/jpeg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/tiff", "tiff"),
    ("image/svg+xml", "svg"),
    ("image/x-icon", "ico"),
    ("image/vnd.microsoft.icon", "ico"),
    ("image/heic", "heic"),
    ("image/heif", "heif"),
];

fn extension_for_mime(mime: &str) -> String {
    let mime = mime.trim().to_ascii_lowercase();
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(m, _)| *m == mime) {
        return ext.to_string();
    }
    mime_guess::get_mime_extensions_str(&mime)
        .and_then(|exts| exts.first().copied())
        .unwrap_or(FALLBACK_EXT)
        .to_string()
}

/// Decode any supported image and re-encode it as lossy WebP.
pub fn to_webp(input: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(input).map_err(|e| Error::Decode {
        message: e.to_string(),
    })?;
    let rgb = flatten_to_rgb(img);
    encode_webp(&rgb, quality)
}

/// Drop alpha by compositing over opaque white; other modes just convert.
pub fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    })
}

fn over_white(c: u8, a: u8) -> u8 {
    let (c, a) = (c as u32, a as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

fn encode_webp(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let (w, h) = rgb.dimensions();
    let mut config = webp::WebPConfig::new().map_err(|_| Error::Encode {
        message: "libwebp config init failed".into(),
    })?;
    config.lossless = 0;
    config.quality = quality as f32;
    config.method = WEBP_METHOD;

    let encoder = webp::Encoder::from_rgb(rgb.as_raw(), w, h);
    let mem = encoder.encode_advanced(&config).map_err(|e| Error::Encode {
        message: format!("{:?}", e),
    })?;
    Ok(mem.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn source(bytes: Vec<u8>, name: &str, mime: Option<&str>) -> ImageSource {
        ImageSource {
            bytes,
            name: name.into(),
            declared_mime: mime.map(str::to_string),
        }
    }

    #[test]
    fn transparent_pixel_becomes_white() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 1, Rgba([0, 0, 0, 128]));

        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(img));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
        assert_eq!(rgb.get_pixel(1, 1).0, [127, 127, 127]);
    }

    #[test]
    fn grayscale_is_expanded_to_rgb() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 1, image::Luma([42])));
        let rgb = flatten_to_rgb(img);
        assert_eq!(rgb.get_pixel(2, 0).0, [42, 42, 42]);
    }

    #[test]
    fn webp_output_has_no_alpha() {
        let mut img = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 0]));
        img.put_pixel(8, 8, Rgba([200, 0, 0, 255]));
        let out = to_webp(&png_bytes(DynamicImage::ImageRgba8(img)), 90).unwrap();

        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
        let decoded = image::load_from_memory_with_format(&out, ImageFormat::WebP).unwrap();
        assert!(!decoded.color().has_alpha());
        let corner = decoded.to_rgb8().get_pixel(0, 0).0;
        assert!(corner.iter().all(|c| *c >= 245), "corner was {:?}", corner);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = to_webp(b"definitely not an image", 80).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
    }

    #[test]
    fn enabled_always_labels_as_webp() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3])));
        let opts = TranscodeOptions {
            enable_webp: true,
            quality: 75,
        };
        let p = prepare_payload(source(png_bytes(img), "x.png", Some("image/png")), &opts).unwrap();
        assert_eq!(p.mime_type, WEBP_MIME);
        assert_eq!(p.extension, WEBP_EXT);
    }

    #[test]
    fn disabled_keeps_bytes_verbatim() {
        let opts = TranscodeOptions {
            enable_webp: false,
            quality: 75,
        };
        let p = prepare_payload(source(b"raw".to_vec(), "pic.JPG", Some("image/jpeg")), &opts).unwrap();
        assert_eq!(p.bytes, b"raw");
        assert_eq!(p.mime_type, "image/jpeg");
        assert_eq!(p.extension, "JPG");
    }

    #[test]
    fn passthrough_guesses_extension_from_mime() {
        let p = passthrough(source(vec![1], "download", Some("image/png")));
        assert_eq!(p.extension, "png");
    }

    #[test]
    fn passthrough_prefers_conventional_extensions() {
        for (mime, ext) in [
            ("image/jpeg", "jpg"),
            ("image/tiff", "tiff"),
            ("image/svg+xml", "svg"),
            ("image/gif", "gif"),
            ("image/webp", "webp"),
            ("image/bmp", "bmp"),
            ("IMAGE/JPEG", "jpg"),
        ] {
            let p = passthrough(source(vec![1], "download", Some(mime)));
            assert_eq!(p.extension, ext, "extension for {}", mime);
            assert_eq!(p.mime_type, mime);
        }
    }

    #[test]
    fn passthrough_key_for_extensionless_jpeg_url() {
        let p = passthrough(source(b"jpeg bytes".to_vec(), "image", Some("image/jpeg")));
        let key = crate::key::storage_key(&p.bytes, &p.extension);
        assert!(key.ends_with(".jpg"), "key was {}", key);
    }

    #[test]
    fn passthrough_falls_back_to_bin() {
        let p = passthrough(source(vec![1], "download", None));
        assert_eq!(p.mime_type, FALLBACK_MIME);
        assert_eq!(p.extension, FALLBACK_EXT);
    }
}
