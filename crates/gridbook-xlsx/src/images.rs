//! Raster payloads: workbook media ⇄ `data:image/...;base64,` strings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;

use crate::error::{Result, XlsxError};
use crate::path::extension;

/// Mime type of a media part: JPEG for `.jpg`/`.jpeg` (or JPEG magic bytes on an unknown
/// extension), PNG otherwise.
pub(crate) fn media_mime(part_name: &str, bytes: &[u8]) -> &'static str {
    match extension(part_name).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            _ => "image/png",
        },
    }
}

pub(crate) fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// A decoded image ready to be stored as a media part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EmbeddedImage {
    pub bytes: Vec<u8>,
    /// File extension of the media part (`png`, `jpeg`).
    pub extension: &'static str,
}

impl EmbeddedImage {
    /// Decode a `data:image/<fmt>;base64,<payload>` string. The payload must be a PNG or JPEG.
    pub(crate) fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| XlsxError::Invalid("image payload is not a data url".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| XlsxError::Invalid("data url has no payload".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(XlsxError::Invalid(format!(
                "unsupported data url encoding `{header}`"
            )));
        }
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|err| XlsxError::Invalid(format!("invalid base64 image payload: {err}")))?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let extension = match image::guess_format(&bytes)? {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            other => {
                return Err(XlsxError::Invalid(format!(
                    "unsupported image format {other:?}"
                )))
            }
        };
        Ok(Self { bytes, extension })
    }

    pub(crate) fn content_type(&self) -> &'static str {
        match self.extension {
            "jpeg" => "image/jpeg",
            _ => "image/png",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF";

    #[test]
    fn mime_follows_extension_then_magic() {
        assert_eq!(media_mime("xl/media/image1.JPG", PNG_MAGIC), "image/jpeg");
        assert_eq!(media_mime("xl/media/image1.png", JPEG_MAGIC), "image/png");
        assert_eq!(media_mime("xl/media/image1.bin", JPEG_MAGIC), "image/jpeg");
        assert_eq!(media_mime("xl/media/image1.emf", b"junk"), "image/png");
    }

    #[test]
    fn data_urls_decode_to_sniffed_formats() {
        let url = to_data_url("image/png", PNG_MAGIC);
        assert!(url.starts_with("data:image/png;base64,"));
        let image = EmbeddedImage::from_data_url(&url).unwrap();
        assert_eq!(image.bytes, PNG_MAGIC);
        assert_eq!(image.extension, "png");

        let jpeg = EmbeddedImage::from_data_url(&to_data_url("image/jpeg", JPEG_MAGIC)).unwrap();
        assert_eq!(jpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(EmbeddedImage::from_data_url("hello").is_err());
        assert!(EmbeddedImage::from_data_url("data:image/png;base64,@@@").is_err());
        assert!(EmbeddedImage::from_data_url("data:image/png,plain").is_err());
        assert!(EmbeddedImage::from_data_url(&to_data_url("image/png", b"not an image")).is_err());
    }
}
