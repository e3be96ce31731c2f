//! Archive builder: bundles every completed output into one ZIP.

use std::io::{Cursor, Write};

use bytes::Bytes;
use chrono::Utc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PipelineError, Result};
use crate::item::BatchItem;

/// A finished archive: the suggested download filename and the ZIP bytes.
#[derive(Debug, Clone)]
pub struct ArchiveBundle {
    pub filename: String,
    pub bytes: Bytes,
    entry_count: usize,
}

impl ArchiveBundle {
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

/// Builds a ZIP of all completed items, entry names equal to the output
/// filenames, flat (no directories). Returns `None` when nothing completed:
/// the empty-result condition, never a zero-entry archive. Any failure while
/// writing an entry aborts the whole build; partial archives are not
/// delivered.
pub fn build_archive(items: &[BatchItem], prefix: &str) -> Result<Option<ArchiveBundle>> {
    let completed: Vec<(&str, &Bytes)> = items
        .iter()
        .filter_map(|item| Some((item.output_filename()?, item.encoded_payload()?)))
        .collect();

    if completed.is_empty() {
        return Ok(None);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (filename, payload) in &completed {
        writer
            .start_file(*filename, options)
            .map_err(|e| PipelineError::Archive(e.to_string()))?;
        writer
            .write_all(payload)
            .map_err(|e| PipelineError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| PipelineError::Archive(e.to_string()))?;

    let filename = format!("{}-{}.zip", prefix, Utc::now().format("%Y-%m-%d"));

    Ok(Some(ArchiveBundle {
        filename,
        bytes: Bytes::from(cursor.into_inner()),
        entry_count: completed.len(),
    }))
}
