//! Batch image compression pipeline.
//!
//! A host UI submits a set of [`SourceFile`]s; the [`BatchRunner`] drives
//! each one through upload-policy validation, content-sniffed decoding and
//! re-encoding with the selected codec, tracking per-file state and
//! aggregate progress, and the archive builder bundles every completed
//! output into one ZIP download. Processing is strictly sequential and
//! cooperatively cancellable through a shared token.

pub mod archive;
pub mod batch;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod item;
pub mod links;
pub mod pixel;
pub mod registry;
pub mod validation;

pub use archive::{build_archive, ArchiveBundle};
pub use batch::{BatchRun, BatchRunner, LogNotifier, Notifier, NotifyOptions};
pub use config::UploadPolicy;
pub use decode::{
    can_decode_natively, sniff_mime_type, DecodeDelegate, DecodeDispatcher, UnsupportedDelegate,
};
pub use encode::{derive_output_filename, EncodeDispatcher, EncodedOutput};
pub use error::{PipelineError, Result};
pub use item::{format_file_size, BatchItem, BatchSummary, ItemStatus, SourceFile};
pub use links::{DownloadLinkStore, MemoryLinkStore, OutputHandle};
pub use pixel::PixelData;
pub use registry::{
    AvifOptions, EncoderOptions, EncoderSelection, EncoderType, JpegOptions, PngOptions,
    WebPOptions,
};
pub use validation::{filter_valid_files, validate_file, ValidationOutcome};
