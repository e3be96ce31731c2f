//! Shared helpers for the integration tests.

use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tokio_util::sync::CancellationToken;

use img_press::{Notifier, NotifyOptions, SourceFile};

/// A real, decodable JPEG declared with its true MIME type.
pub fn jpeg_file(name: &str) -> SourceFile {
    let img = DynamicImage::new_rgb8(16, 16);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    SourceFile::new(name, "image/jpeg", Bytes::from(buf.into_inner()))
}

/// A real, decodable PNG declared with its true MIME type.
pub fn png_file(name: &str) -> SourceFile {
    let img = DynamicImage::new_rgba8(16, 16);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    SourceFile::new(name, "image/png", Bytes::from(buf.into_inner()))
}

/// Valid PNG signature followed by garbage: a supported MIME type whose
/// content cannot be decoded.
pub fn corrupt_png_file(name: &str) -> SourceFile {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 32]);
    SourceFile::new(name, "image/png", Bytes::from(bytes))
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_of(&self, message: &str) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == message)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, _options: NotifyOptions) -> Option<String> {
        self.messages.lock().unwrap().push(message.to_string());
        None
    }
}

/// Cancels the shared token as soon as the first notification arrives;
/// gives the tests a deterministic mid-run cancellation point.
pub struct CancelOnFirstNotify {
    pub token: CancellationToken,
    pub inner: RecordingNotifier,
}

#[async_trait]
impl Notifier for CancelOnFirstNotify {
    async fn notify(&self, message: &str, options: NotifyOptions) -> Option<String> {
        self.token.cancel();
        self.inner.notify(message, options).await
    }
}
