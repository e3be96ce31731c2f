//! Upload-policy configuration.
//!
//! The allow-list and size ceiling come from the environment
//! (`ALLOWED_UPLOAD_MIMES`, `MAX_UPLOAD_BYTES`) with the same defaults the
//! host application ships with. Hosts that manage configuration themselves
//! can construct an [`UploadPolicy`] directly.

pub const DEFAULT_ALLOWED_MIMES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/avif",
    "image/jxl",
    "image/qoi",
];

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_mimes: Vec<String>,
    pub max_upload_bytes: u64,
}

impl UploadPolicy {
    pub fn new(allowed_mimes: Vec<String>, max_upload_bytes: u64) -> Self {
        Self {
            allowed_mimes,
            max_upload_bytes,
        }
    }

    /// Reads `ALLOWED_UPLOAD_MIMES` (comma-separated) and `MAX_UPLOAD_BYTES`
    /// from the environment, falling back to the defaults for anything
    /// missing or unparseable.
    pub fn from_env() -> Self {
        let allowed_mimes = std::env::var("ALLOWED_UPLOAD_MIMES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_MIMES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            allowed_mimes,
            max_upload_bytes,
        }
    }

    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mimes.iter().any(|m| m == mime)
    }

    /// Human-readable ceiling, e.g. "20 MB", for validation messages.
    pub fn max_upload_human(&self) -> String {
        let mib = (self.max_upload_bytes as f64 / (1024.0 * 1024.0)).round() as u64;
        format!("{} MB", mib)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mimes: DEFAULT_ALLOWED_MIMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
