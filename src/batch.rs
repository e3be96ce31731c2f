//! Pipeline orchestrator.
//!
//! Drives a batch of [`BatchItem`]s through validate -> decode -> encode,
//! strictly one item at a time. Per-item failures are recorded on the item
//! and never abort the batch; the only thing that stops the loop early is
//! the cancellation token. One token is shared by a whole run and by any
//! retries issued afterwards (see DESIGN.md on the retry-after-cancel
//! behavior).

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::{self, ArchiveBundle};
use crate::config::UploadPolicy;
use crate::decode::{DecodeDelegate, DecodeDispatcher};
use crate::encode::EncodeDispatcher;
use crate::error::Result;
use crate::item::BatchItem;
use crate::links::{DownloadLinkStore, OutputHandle};
use crate::registry::EncoderSelection;
use crate::validation::{validate_file, ValidationOutcome};

const ARCHIVE_PREFIX: &str = "img-press";

#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub timeout_ms: Option<u64>,
    pub actions: Vec<String>,
}

/// Status/error/completion messages for the host UI. Not part of the
/// pipeline's correctness; the orchestrator ignores the returned action id.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, options: NotifyOptions) -> Option<String>;
}

/// Routes notifications to the log. The default for headless hosts.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str, _options: NotifyOptions) -> Option<String> {
        info!("{message}");
        None
    }
}

/// Aggregate state of one orchestrator invocation, mutated only by the
/// orchestrator and read by observers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchRun {
    is_running: bool,
    progress_percent: f64,
}

impl BatchRun {
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// 0..=100, non-decreasing within one run.
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }
}

pub struct BatchRunner {
    policy: UploadPolicy,
    decoder: DecodeDispatcher,
    encoder: EncodeDispatcher,
    links: Arc<dyn DownloadLinkStore>,
    notifier: Arc<dyn Notifier>,
    run: BatchRun,
}

impl BatchRunner {
    pub fn new(
        policy: UploadPolicy,
        delegate: Arc<dyn DecodeDelegate>,
        links: Arc<dyn DownloadLinkStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            policy,
            decoder: DecodeDispatcher::new(delegate),
            encoder: EncodeDispatcher::new(),
            links,
            notifier,
            run: BatchRun::default(),
        }
    }

    pub fn run_state(&self) -> &BatchRun {
        &self.run
    }

    /// Processes every item in input order. Items are reset to pending
    /// first; each then ends completed or error, unless the token fires, in
    /// which case the loop stops before the next item and the remaining
    /// items stay pending. Emits one batch-complete notification unless the
    /// token was already cancelled on entry.
    pub async fn run_all(
        &mut self,
        items: &mut [BatchItem],
        selection: &EncoderSelection,
        token: &CancellationToken,
    ) {
        if token.is_cancelled() {
            self.run.is_running = false;
            return;
        }

        for item in items.iter_mut() {
            item.reset();
        }
        self.run.is_running = true;
        self.run.progress_percent = 0.0;

        let total = items.len();
        for (index, item) in items.iter_mut().enumerate() {
            if token.is_cancelled() {
                debug!("batch run cancelled before item {index}");
                break;
            }

            if let ValidationOutcome::Invalid { reason } =
                validate_file(item.source(), &self.policy)
            {
                let name = item.source().name.clone();
                item.fail(reason.clone());
                self.notifier
                    .notify(&format!("{name}: {reason}"), NotifyOptions::default())
                    .await;
                self.run.progress_percent = (index + 1) as f64 / total as f64 * 100.0;
                continue;
            }

            match self.process_item(token, item, selection).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    // No error is recorded for a cancelled in-flight item;
                    // it goes back to pending and the loop ends.
                    item.reset();
                    break;
                }
                Err(e) => {
                    let name = item.source().name.clone();
                    let message = e.to_string();
                    item.fail(message.clone());
                    self.notifier
                        .notify(
                            &format!("Error optimizando {name}: {message}"),
                            NotifyOptions::default(),
                        )
                        .await;
                }
            }

            self.run.progress_percent = (index + 1) as f64 / total as f64 * 100.0;
        }

        self.run.is_running = false;
        self.notifier
            .notify(
                "Optimización por lote completada",
                NotifyOptions {
                    timeout_ms: Some(3000),
                    actions: vec!["CERRAR".to_string()],
                },
            )
            .await;
    }

    /// Re-runs one item with the same shared token. Leaves every other
    /// item and the run's progress untouched. A token already cancelled at
    /// entry makes this a no-op.
    pub async fn retry(
        &mut self,
        item: &mut BatchItem,
        selection: &EncoderSelection,
        token: &CancellationToken,
    ) {
        if token.is_cancelled() {
            return;
        }

        item.begin_processing();

        if let ValidationOutcome::Invalid { reason } = validate_file(item.source(), &self.policy) {
            let name = item.source().name.clone();
            item.fail(reason.clone());
            self.notifier
                .notify(&format!("{name}: {reason}"), NotifyOptions::default())
                .await;
            return;
        }

        match self.process_item(token, item, selection).await {
            Ok(()) => {
                self.notifier
                    .notify(
                        "Archivo optimizado correctamente",
                        NotifyOptions {
                            timeout_ms: Some(2000),
                            actions: Vec::new(),
                        },
                    )
                    .await;
            }
            Err(e) if e.is_cancelled() => {
                item.reset();
            }
            Err(e) => {
                let name = item.source().name.clone();
                let message = e.to_string();
                item.fail(message.clone());
                self.notifier
                    .notify(
                        &format!("Error optimizando {name}: {message}"),
                        NotifyOptions::default(),
                    )
                    .await;
            }
        }
    }

    /// Bundles all completed outputs and emits the download / zero-result
    /// notification. `Ok(None)` is the empty-result condition.
    pub async fn build_archive(&self, items: &[BatchItem]) -> Result<Option<ArchiveBundle>> {
        match archive::build_archive(items, ARCHIVE_PREFIX) {
            Ok(None) => {
                self.notifier
                    .notify(
                        "Sin archivos procesados para descargar",
                        NotifyOptions::default(),
                    )
                    .await;
                Ok(None)
            }
            Ok(Some(bundle)) => {
                self.notifier
                    .notify(
                        &format!("Descargando {} imágenes en ZIP", bundle.entry_count()),
                        NotifyOptions {
                            timeout_ms: Some(3000),
                            actions: Vec::new(),
                        },
                    )
                    .await;
                Ok(Some(bundle))
            }
            Err(e) => {
                self.notifier
                    .notify("Error al crear archivo ZIP", NotifyOptions::default())
                    .await;
                Err(e)
            }
        }
    }

    /// Steps (c)-(e) for one item: processing -> decode -> encode ->
    /// completed with a fresh download link. Leaves the item in
    /// `Processing` on failure; the caller decides between error and reset.
    async fn process_item(
        &self,
        token: &CancellationToken,
        item: &mut BatchItem,
        selection: &EncoderSelection,
    ) -> Result<()> {
        item.begin_processing();

        let pixels = self.decoder.decode(token, &item.source().bytes).await?;
        let output = self
            .encoder
            .encode(token, &pixels, selection, &item.source().name)
            .await?;

        let handle = OutputHandle::create(self.links.clone(), output.filename, &output.payload);
        item.complete(output.payload, handle);
        Ok(())
    }
}
