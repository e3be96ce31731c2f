//! Per-file pipeline records.
//!
//! A [`BatchItem`] is the mutable record the orchestrator drives through the
//! pipeline. Its state is a closed enum: the encoded payload exists only in
//! `Completed`, the error message only in `Error`, so the two can never
//! coexist and neither survives a transition out of its state. All mutation
//! goes through the transition methods.

use bytes::Bytes;

use crate::links::OutputHandle;

/// One submitted file: its name, the MIME type it was declared with, and the
/// raw bytes. The declared type feeds upload-policy validation; decoding
/// sniffs the real format from the bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Plain status discriminant for observers (file lists, summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug)]
pub enum ItemState {
    Pending,
    Processing,
    Completed {
        payload: Bytes,
        encoded_size: u64,
        output: OutputHandle,
    },
    Error {
        message: String,
    },
}

#[derive(Debug)]
pub struct BatchItem {
    source: SourceFile,
    original_size: u64,
    state: ItemState,
}

impl BatchItem {
    pub fn new(source: SourceFile) -> Self {
        let original_size = source.size();
        Self {
            source,
            original_size,
            state: ItemState::Pending,
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Size of the submitted file, fixed at creation.
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn status(&self) -> ItemStatus {
        match self.state {
            ItemState::Pending => ItemStatus::Pending,
            ItemState::Processing => ItemStatus::Processing,
            ItemState::Completed { .. } => ItemStatus::Completed,
            ItemState::Error { .. } => ItemStatus::Error,
        }
    }

    pub fn encoded_payload(&self) -> Option<&Bytes> {
        match &self.state {
            ItemState::Completed { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn encoded_size(&self) -> Option<u64> {
        match &self.state {
            ItemState::Completed { encoded_size, .. } => Some(*encoded_size),
            _ => None,
        }
    }

    pub fn output_filename(&self) -> Option<&str> {
        match &self.state {
            ItemState::Completed { output, .. } => Some(output.filename()),
            _ => None,
        }
    }

    pub fn download_url(&self) -> Option<&str> {
        match &self.state {
            ItemState::Completed { output, .. } => Some(output.url()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Back to `Pending`, discarding any prior payload, error or download
    /// link (the link is revoked as the old state drops).
    pub fn reset(&mut self) {
        self.state = ItemState::Pending;
    }

    /// Enters `Processing`, clearing a prior error or completed output.
    pub fn begin_processing(&mut self) {
        self.state = ItemState::Processing;
    }

    pub fn complete(&mut self, payload: Bytes, output: OutputHandle) {
        let encoded_size = payload.len() as u64;
        self.state = ItemState::Completed {
            payload,
            encoded_size,
            output,
        };
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = ItemState::Error {
            message: message.into(),
        };
    }
}

/// Aggregate totals over a set of items, as shown by the host's summary
/// panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_original_size: u64,
    pub total_encoded_size: u64,
    pub completed_count: usize,
    pub total_count: usize,
}

impl BatchSummary {
    pub fn of(items: &[BatchItem]) -> Self {
        Self {
            total_original_size: items.iter().map(|i| i.original_size()).sum(),
            total_encoded_size: items.iter().filter_map(|i| i.encoded_size()).sum(),
            completed_count: items
                .iter()
                .filter(|i| i.status() == ItemStatus::Completed)
                .count(),
            total_count: items.len(),
        }
    }
}

/// Format a byte count in human-readable form (e.g. "1.5 KB", "2.3 MB").
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::MemoryLinkStore;
    use std::sync::Arc;

    fn item(bytes: &'static [u8]) -> BatchItem {
        BatchItem::new(SourceFile::new(
            "test.jpg",
            "image/jpeg",
            Bytes::from_static(bytes),
        ))
    }

    #[test]
    fn test_original_size_fixed_at_creation() {
        let it = item(b"12345");
        assert_eq!(it.original_size(), 5);
        assert_eq!(it.status(), ItemStatus::Pending);
    }

    #[test]
    fn test_payload_and_error_never_coexist() {
        let store = Arc::new(MemoryLinkStore::new());
        let mut it = item(b"12345");

        let payload = Bytes::from_static(b"abc");
        let output = OutputHandle::create(store.clone(), "test.jpg".to_string(), &payload);
        it.complete(payload, output);
        assert_eq!(it.status(), ItemStatus::Completed);
        assert_eq!(it.encoded_size(), Some(3));
        assert!(it.error().is_none());

        it.fail("boom");
        assert_eq!(it.status(), ItemStatus::Error);
        assert!(it.encoded_payload().is_none());
        assert_eq!(it.error(), Some("boom"));
    }

    #[test]
    fn test_reset_revokes_download_link() {
        let store = Arc::new(MemoryLinkStore::new());
        let mut it = item(b"12345");

        let payload = Bytes::from_static(b"abc");
        let output = OutputHandle::create(store.clone(), "test.jpg".to_string(), &payload);
        it.complete(payload, output);
        assert_eq!(store.live_links(), 1);

        it.reset();
        assert_eq!(store.live_links(), 0);
        assert_eq!(it.status(), ItemStatus::Pending);
    }

    #[test]
    fn test_begin_processing_clears_error() {
        let mut it = item(b"12345");
        it.fail("boom");
        it.begin_processing();
        assert_eq!(it.status(), ItemStatus::Processing);
        assert!(it.error().is_none());
    }

    #[test]
    fn test_batch_summary() {
        let store = Arc::new(MemoryLinkStore::new());
        let mut a = item(b"1234567890");
        let b = item(b"12345");

        let payload = Bytes::from_static(b"abc");
        let output = OutputHandle::create(store, "a.jpg".to_string(), &payload);
        a.complete(payload, output);

        let summary = BatchSummary::of(&[a, b]);
        assert_eq!(summary.total_original_size, 15);
        assert_eq!(summary.total_encoded_size, 3);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.total_count, 2);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
    }
}
