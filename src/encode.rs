//! Encode dispatcher.
//!
//! Resolves the codec registry entry for the current selection, runs the
//! codec and normalizes whatever it produced into one payload
//! representation, then derives the output filename from the original name
//! and the registry extension.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::pixel::PixelData;
use crate::registry::{encode_pixels, EncoderSelection};

/// One encoded output: payload, its MIME type and the derived filename.
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    pub payload: Bytes,
    pub mime_type: &'static str,
    pub filename: String,
}

/// Strips the last extension (if any) and appends the encoder's canonical
/// one: `photo.jpeg` -> `photo.webp`, `archive.tar.gz` -> `archive.tar.webp`,
/// `noext` -> `noext.webp`.
pub fn derive_output_filename(original_name: &str, extension: &str) -> String {
    let stem = match original_name.rfind('.') {
        // A leading dot is a hidden-file name, not an extension separator.
        Some(0) | None => original_name,
        Some(idx) => &original_name[..idx],
    };
    format!("{}.{}", stem, extension)
}

pub struct EncodeDispatcher;

impl EncodeDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Pixel data to encoded payload. Observes the token before resolving
    /// the registry entry and before invoking the codec.
    pub async fn encode(
        &self,
        token: &CancellationToken,
        pixels: &PixelData,
        selection: &EncoderSelection,
        original_name: &str,
    ) -> Result<EncodedOutput> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let encoder = selection.encoder();
        let options = *selection.options();
        let filename = derive_output_filename(original_name, encoder.extension());

        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Codecs run on the blocking pool so an expensive encode does not
        // stall the cooperative scheduler; the await is this dispatcher's
        // suspension point.
        let pixels = pixels.clone();
        let encoded = tokio::task::spawn_blocking(move || encode_pixels(&pixels, &options))
            .await
            .map_err(|e| PipelineError::Encode(e.to_string()))??;

        Ok(EncodedOutput {
            payload: Bytes::from(encoded),
            mime_type: encoder.mime_type(),
            filename,
        })
    }
}

impl Default for EncodeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
