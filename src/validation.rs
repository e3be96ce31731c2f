//! Upload-policy validation: declared MIME type against the allow-list,
//! size against the configured ceiling. Runs before any decode attempt.

use crate::config::UploadPolicy;
use crate::item::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid { reason: String },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

pub fn validate_file(file: &SourceFile, policy: &UploadPolicy) -> ValidationOutcome {
    if !policy.allows_mime(&file.mime_type) {
        return ValidationOutcome::Invalid {
            reason: format!("Formato no admitido: {}", file.mime_type),
        };
    }

    if file.size() > policy.max_upload_bytes {
        return ValidationOutcome::Invalid {
            reason: format!(
                "Archivo demasiado grande (máx. {})",
                policy.max_upload_human()
            ),
        };
    }

    ValidationOutcome::Valid
}

/// Partitions a set of files into accepted ones and `(file, reason)`
/// rejections. Used by the host's ingestion path before a batch is created.
pub fn filter_valid_files(
    files: Vec<SourceFile>,
    policy: &UploadPolicy,
) -> (Vec<SourceFile>, Vec<(SourceFile, String)>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for file in files {
        match validate_file(&file, policy) {
            ValidationOutcome::Valid => accepted.push(file),
            ValidationOutcome::Invalid { reason } => rejected.push((file, reason)),
        }
    }

    (accepted, rejected)
}
