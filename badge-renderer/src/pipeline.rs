//! Serialized asynchronous export.
//!
//! Rendering is CPU bound, so each job runs on the blocking pool. Only one
//! job runs at a time; further requests wait their turn on an async mutex.
//! The blocking worker owns the lock until it finishes, even if the caller
//! stops waiting. The current [`JobState`] is published on a watch channel
//! for progress UIs.

use std::sync::Arc;

use badge_core::{Project, Side, VariableValues};
use tokio::sync::{watch, Mutex};

use crate::error::{RenderError, RenderResult};
use crate::export::{BatchReport, CancelFlag, CardExporter, ExportOutput};

/// Lifecycle of the most recent export job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// A job is in flight.
    Exporting,
    /// The last job finished.
    Success,
    /// The last job failed with this message.
    Failed(String),
}

/// Async front end over a [`CardExporter`].
#[derive(Debug)]
pub struct ExportPipeline {
    exporter: Arc<CardExporter>,
    gate: Arc<Mutex<()>>,
    state: watch::Sender<JobState>,
}

impl ExportPipeline {
    /// Wrap an exporter.
    #[must_use]
    pub fn new(exporter: CardExporter) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            exporter: Arc::new(exporter),
            gate: Arc::new(Mutex::new(())),
            state,
        }
    }

    /// The wrapped exporter.
    #[must_use]
    pub fn exporter(&self) -> &CardExporter {
        &self.exporter
    }

    /// State of the most recent job.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Watch job state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Whether a job currently holds the export gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    async fn run<T, F>(&self, job: &'static str, f: F) -> RenderResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CardExporter) -> RenderResult<T> + Send + 'static,
    {
        if self.is_busy() {
            tracing::debug!(job, "Export queued behind a running job");
        }
        let guard = Arc::clone(&self.gate).lock_owned().await;
        self.state.send_replace(JobState::Exporting);
        tracing::info!(job, "Export started");

        let exporter = Arc::clone(&self.exporter);
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            f(&exporter)
        })
        .await
        .map_err(|e| RenderError::Join(e.to_string()))
        .and_then(|r| r);

        match &result {
            Ok(_) => {
                tracing::info!(job, "Export succeeded");
                self.state.send_replace(JobState::Success);
            }
            Err(err) => {
                tracing::warn!(job, error = %err, "Export failed");
                self.state.send_replace(JobState::Failed(err.to_string()));
            }
        }
        result
    }

    /// Export one side to PNG.
    ///
    /// # Errors
    ///
    /// Returns the export error.
    pub async fn export_png(
        &self,
        project: Arc<Project>,
        side: Side,
        values: Option<VariableValues>,
    ) -> RenderResult<ExportOutput> {
        self.run("png", move |exporter| {
            exporter.export_png(&project, side, values.as_ref())
        })
        .await
    }

    /// Export one side to a single-page PDF.
    ///
    /// # Errors
    ///
    /// Returns the export error.
    pub async fn export_pdf(
        &self,
        project: Arc<Project>,
        side: Side,
        values: Option<VariableValues>,
    ) -> RenderResult<ExportOutput> {
        self.run("pdf", move |exporter| {
            exporter.export_pdf(&project, side, values.as_ref())
        })
        .await
    }

    /// Export both sides to a two-page PDF.
    ///
    /// # Errors
    ///
    /// Returns the export error.
    pub async fn export_duplex_pdf(
        &self,
        project: Arc<Project>,
        values: Option<VariableValues>,
    ) -> RenderResult<ExportOutput> {
        self.run("duplex", move |exporter| {
            exporter.export_duplex_pdf(&project, values.as_ref())
        })
        .await
    }

    /// Export a batch of records to one PDF.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Cancelled`] when `cancel` stopped the batch,
    /// otherwise the export error. Individual skipped records are reported
    /// in the returned [`BatchReport`].
    pub async fn export_batch(
        &self,
        project: Arc<Project>,
        records: Vec<VariableValues>,
        duplex: bool,
        cancel: CancelFlag,
    ) -> RenderResult<BatchReport> {
        self.run("batch", move |exporter| {
            let report = exporter.export_batch(&project, &records, duplex, &cancel)?;
            if report.cancelled {
                Err(RenderError::Cancelled)
            } else {
                Ok(report)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::export::ExportConfig;

    fn pipeline() -> ExportPipeline {
        ExportPipeline::new(CardExporter::new(ExportConfig {
            dpi: Some(72.0),
            load_system_fonts: false,
            ..ExportConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let pipeline = pipeline();
        assert_eq!(pipeline.state(), JobState::Idle);
        let mut rx = pipeline.subscribe();

        let project = Arc::new(Project::cr80("Pipeline"));
        let out = pipeline
            .export_png(project, Side::Recto, None)
            .await
            .expect("png");
        assert_eq!(&out.bytes[1..4], b"PNG");
        assert_eq!(pipeline.state(), JobState::Success);
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), JobState::Success);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_failure_is_published() {
        let pipeline = pipeline();
        let mut project = Project::cr80("Broken");
        project.dimensions.width = -5.0;
        let result = pipeline.export_pdf(Arc::new(project), Side::Recto, None).await;
        assert!(result.is_err());
        assert!(matches!(pipeline.state(), JobState::Failed(_)));
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_serialized() {
        let pipeline = pipeline();
        let project = Arc::new(Project::cr80("Queue"));
        let (a, b) = tokio::join!(
            pipeline.export_png(Arc::clone(&project), Side::Recto, None),
            pipeline.export_pdf(Arc::clone(&project), Side::Verso, None),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(pipeline.state(), JobState::Success);
    }

    #[tokio::test]
    async fn test_queued_job_waits_for_gate() {
        let pipeline = Arc::new(pipeline());
        let held = Arc::clone(&pipeline.gate).lock_owned().await;
        assert!(pipeline.is_busy());

        let task = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move {
                pipeline
                    .export_png(Arc::new(Project::cr80("Waiting")), Side::Recto, None)
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert!(!task.is_finished());
        assert_eq!(pipeline.state(), JobState::Idle);

        drop(held);
        let out = task.await.expect("join").expect("png");
        assert_eq!(&out.bytes[1..4], b"PNG");
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_abandoned_job_keeps_gate_until_done() {
        let pipeline = pipeline();
        let (release, wait) = std::sync::mpsc::channel::<()>();
        let job = pipeline.run("hold", move |_| {
            let _ = wait.recv();
            Ok(())
        });
        let abandoned = tokio::time::timeout(Duration::from_millis(50), job).await;
        assert!(abandoned.is_err());
        assert!(pipeline.is_busy());

        release.send(()).expect("worker alive");
        tokio::time::timeout(Duration::from_secs(5), async {
            while pipeline.is_busy() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker released the gate");
    }

    #[tokio::test]
    async fn test_cancelled_batch_fails() {
        let pipeline = pipeline();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = pipeline
            .export_batch(
                Arc::new(Project::cr80("Batch")),
                vec![VariableValues::new()],
                false,
                cancel,
            )
            .await;
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(
            pipeline.state(),
            JobState::Failed(RenderError::Cancelled.to_string())
        );
    }
}
