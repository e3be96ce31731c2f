//! Decode dispatcher.
//!
//! Sniffs the real format from the byte content (never the filename),
//! decodes natively when a compiled-in decoder exists, and otherwise
//! dispatches to the named operation of a [`DecodeDelegate`] for the
//! recognized alternate formats. Underlying failures are normalized into a
//! small user-facing vocabulary; the raw error only reaches the log.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageError, ImageFormat};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::pixel::PixelData;

pub const MSG_UNSUPPORTED_OR_CORRUPT: &str = "formato no admitido o archivo corrupto.";
pub const MSG_DECODE_FAILED: &str = "Error al decodificar la imagen.";

/// Formats the host can hand off to out-of-process codecs, one named
/// operation per format family.
#[async_trait]
pub trait DecodeDelegate: Send + Sync {
    async fn avif_decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData>;
    async fn webp_decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData>;
    async fn jxl_decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData>;
    async fn wp2_decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData>;
    async fn qoi_decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData>;
}

/// Delegate for hosts without any out-of-process codec: every delegated
/// format fails as unsupported.
pub struct UnsupportedDelegate;

#[async_trait]
impl DecodeDelegate for UnsupportedDelegate {
    async fn avif_decode(&self, _token: &CancellationToken, _bytes: &Bytes) -> Result<PixelData> {
        Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()))
    }

    async fn webp_decode(&self, _token: &CancellationToken, _bytes: &Bytes) -> Result<PixelData> {
        Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()))
    }

    async fn jxl_decode(&self, _token: &CancellationToken, _bytes: &Bytes) -> Result<PixelData> {
        Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()))
    }

    async fn wp2_decode(&self, _token: &CancellationToken, _bytes: &Bytes) -> Result<PixelData> {
        Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()))
    }

    async fn qoi_decode(&self, _token: &CancellationToken, _bytes: &Bytes) -> Result<PixelData> {
        Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()))
    }
}

/// Sniffs the MIME type from magic bytes. Returns `None` for anything that
/// is not a recognized image container.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && (&bytes[8..12] == b"avif" || &bytes[8..12] == b"avis") {
        return Some("image/avif");
    }
    if bytes.starts_with(&[0xFF, 0x0A])
        || bytes.starts_with(&[
            0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
        ])
    {
        return Some("image/jxl");
    }
    if bytes.starts_with(b"qoif") {
        return Some("image/qoi");
    }
    if bytes.starts_with(&[0xF4, 0xFF, 0x6F]) {
        return Some("image/webp2");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

/// Whether a compiled-in `image` decoder exists for this MIME type.
pub fn can_decode_natively(mime: &str) -> bool {
    matches!(
        mime,
        "image/jpeg" | "image/png" | "image/gif" | "image/webp" | "image/bmp"
    )
}

fn decode_native(mime: &str, bytes: &[u8]) -> Result<PixelData> {
    let format = ImageFormat::from_mime_type(mime).ok_or_else(|| {
        PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string())
    })?;
    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        warn!(error = %e, "native decode failed");
        PipelineError::Decode(map_image_error(&e).to_string())
    })?;
    Ok(PixelData::from_image(image))
}

/// Known technical signatures become the unsupported/corrupt message; every
/// other failure gets the generic one.
fn map_image_error(error: &ImageError) -> &'static str {
    match error {
        ImageError::Decoding(_) | ImageError::Unsupported(_) => MSG_UNSUPPORTED_OR_CORRUPT,
        _ => MSG_DECODE_FAILED,
    }
}

fn normalize_delegate_failure(message: &str) -> &'static str {
    if message == MSG_UNSUPPORTED_OR_CORRUPT
        || message.contains("The source image could not be decoded")
        || (message.contains("decode") && message.contains("image"))
    {
        MSG_UNSUPPORTED_OR_CORRUPT
    } else {
        MSG_DECODE_FAILED
    }
}

pub struct DecodeDispatcher {
    delegate: Arc<dyn DecodeDelegate>,
}

impl DecodeDispatcher {
    pub fn new(delegate: Arc<dyn DecodeDelegate>) -> Self {
        Self { delegate }
    }

    /// Raw bytes to pixel data. Observes the token before the sniff and
    /// before the decode call; a triggered token resolves to the
    /// cancellation outcome, not a decode error.
    pub async fn decode(&self, token: &CancellationToken, bytes: &Bytes) -> Result<PixelData> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mime = sniff_mime_type(bytes);

        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let Some(mime) = mime else {
            return Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()));
        };

        if can_decode_natively(mime) {
            return decode_native(mime, bytes);
        }

        let delegated = match mime {
            "image/avif" => self.delegate.avif_decode(token, bytes).await,
            "image/webp" => self.delegate.webp_decode(token, bytes).await,
            "image/jxl" => self.delegate.jxl_decode(token, bytes).await,
            "image/webp2" => self.delegate.wp2_decode(token, bytes).await,
            "image/qoi" => self.delegate.qoi_decode(token, bytes).await,
            _ => {
                return Err(PipelineError::Decode(MSG_UNSUPPORTED_OR_CORRUPT.to_string()));
            }
        };

        delegated.map_err(|e| {
            if e.is_cancelled() {
                return e;
            }
            warn!(mime, error = %e, "delegated decode failed");
            PipelineError::Decode(normalize_delegate_failure(&e.to_string()).to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::io::Cursor;

    fn png_bytes() -> Bytes {
        let img = DynamicImage::new_rgba8(4, 4);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(
            sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some("image/jpeg")
        );
        assert_eq!(sniff_mime_type(&png_bytes()), Some("image/png"));
        assert_eq!(sniff_mime_type(b"GIF89a_________"), Some("image/gif"));
        assert_eq!(sniff_mime_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(
            sniff_mime_type(b"\x00\x00\x00\x20ftypavif\x00\x00\x00\x00"),
            Some("image/avif")
        );
        assert_eq!(sniff_mime_type(&[0xFF, 0x0A, 0x00]), Some("image/jxl"));
        assert_eq!(sniff_mime_type(b"qoif\x00\x00\x00\x04"), Some("image/qoi"));
        assert_eq!(sniff_mime_type(b"BM\x00\x00"), Some("image/bmp"));
    }

    #[test]
    fn test_sniff_unknown_and_empty() {
        assert_eq!(sniff_mime_type(b""), None);
        assert_eq!(sniff_mime_type(b"<svg xmlns="), None);
        assert_eq!(sniff_mime_type(b"not an image at all"), None);
    }

    #[test]
    fn test_native_capability_query() {
        assert!(can_decode_natively("image/jpeg"));
        assert!(can_decode_natively("image/png"));
        assert!(can_decode_natively("image/webp"));
        assert!(!can_decode_natively("image/avif"));
        assert!(!can_decode_natively("image/jxl"));
        assert!(!can_decode_natively("image/qoi"));
    }

    #[test]
    fn test_normalize_delegate_failure() {
        assert_eq!(
            normalize_delegate_failure("The source image could not be decoded"),
            MSG_UNSUPPORTED_OR_CORRUPT
        );
        assert_eq!(
            normalize_delegate_failure("failed to decode image stream"),
            MSG_UNSUPPORTED_OR_CORRUPT
        );
        assert_eq!(
            normalize_delegate_failure("worker crashed with signal 11"),
            MSG_DECODE_FAILED
        );
    }

    #[tokio::test]
    async fn test_decode_native_png() {
        let dispatcher = DecodeDispatcher::new(Arc::new(UnsupportedDelegate));
        let token = CancellationToken::new();
        let pixels = dispatcher.decode(&token, &png_bytes()).await.unwrap();
        assert_eq!((pixels.width(), pixels.height()), (4, 4));
    }

    #[tokio::test]
    async fn test_decode_truncated_png_is_normalized() {
        let dispatcher = DecodeDispatcher::new(Arc::new(UnsupportedDelegate));
        let token = CancellationToken::new();
        // Valid signature, garbage body: a supported MIME type that cannot
        // actually be decoded.
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 16]);

        let err = dispatcher
            .decode(&token, &Bytes::from(bytes))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_UNSUPPORTED_OR_CORRUPT);
    }

    #[tokio::test]
    async fn test_decode_unrecognized_bytes() {
        let dispatcher = DecodeDispatcher::new(Arc::new(UnsupportedDelegate));
        let token = CancellationToken::new();
        let err = dispatcher
            .decode(&token, &Bytes::from_static(b"plain text"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_UNSUPPORTED_OR_CORRUPT);
    }

    #[tokio::test]
    async fn test_decode_delegated_format_without_delegate() {
        let dispatcher = DecodeDispatcher::new(Arc::new(UnsupportedDelegate));
        let token = CancellationToken::new();
        let err = dispatcher
            .decode(&token, &Bytes::from_static(b"qoif\x00\x00\x00\x04rest"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_UNSUPPORTED_OR_CORRUPT);
    }

    #[tokio::test]
    async fn test_decode_observes_cancellation() {
        let dispatcher = DecodeDispatcher::new(Arc::new(UnsupportedDelegate));
        let token = CancellationToken::new();
        token.cancel();
        let err = dispatcher.decode(&token, &png_bytes()).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
