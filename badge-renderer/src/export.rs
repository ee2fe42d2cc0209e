//! Card export to PNG and physical-size PDF.
//!
//! Renders a card side through the SVG scene adapter and the resvg/tiny-skia
//! rasterization pipeline. Output pixel size is derived from the project's
//! millimetre dimensions, its print resolution and the export multiplier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use badge_core::units::{clamp_dpi, raster_size, within_raster_budget, MAX_RASTER_PIXELS};
use badge_core::variables::{render_for_export, render_preview};
use badge_core::{Design, Project, RecordError, Side, VariableValues};
use thiserror::Error;
use crate::error::{RenderError, RenderResult};
use crate::pdf::PdfWriter;
use crate::scene::{build_scene, BackgroundMode, RenderDiagnostic, SceneOptions};

/// Configuration for card export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Resolution override; the project's own dpi when `None`.
    pub dpi: Option<f64>,
    /// Scale factor on top of the resolution (e.g. 2.0 for supersampled proofs).
    pub multiplier: f64,
    /// Background handling.
    pub background: BackgroundMode,
    /// Reject single exports whose values miss a required variable instead of
    /// printing a visible marker.
    pub strict_variables: bool,
    /// Load the host's installed fonts for text rendering.
    pub load_system_fonts: bool,
    /// PDF document title; the project name when empty.
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dpi: None,
            multiplier: 1.0,
            background: BackgroundMode::Design,
            strict_variables: true,
            load_system_fonts: true,
            title: String::new(),
        }
    }
}

/// Encoded output plus any placeholders drawn along the way.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Render problems that did not abort the export.
    pub diagnostics: Vec<RenderDiagnostic>,
}

/// A rendered side.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Premultiplied RGBA pixels.
    pub pixmap: tiny_skia::Pixmap,
    /// Render problems that did not abort the render.
    pub diagnostics: Vec<RenderDiagnostic>,
}

/// Why a batch record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFailure {
    /// The record's values were rejected.
    #[error(transparent)]
    Rejected(#[from] RecordError),

    /// The personalized card could not be drawn.
    #[error("{0}")]
    Render(String),
}

/// A personalization record that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Zero-based record index.
    pub index: usize,
    /// Why it was skipped.
    pub error: RecordFailure,
}

/// Outcome of a batch export.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Combined PDF; `None` when no record succeeded or the batch was cancelled.
    pub pdf: Option<Vec<u8>>,
    /// Pages written.
    pub pages: usize,
    /// Records rendered successfully.
    pub succeeded: usize,
    /// Records skipped, in input order.
    pub failures: Vec<BatchFailure>,
    /// Whether cancellation stopped the batch early.
    pub cancelled: bool,
    /// Placeholders drawn across all successful records.
    pub diagnostics: Vec<RenderDiagnostic>,
}

impl BatchReport {
    /// Human readable summary listing every failed record.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} record(s) exported on {} page(s), {} failed{}",
            self.succeeded,
            self.pages,
            self.failures.len(),
            if self.cancelled { ", cancelled" } else { "" },
        )];
        lines.extend(
            self.failures
                .iter()
                .map(|f| format!("record {}: {}", f.index + 1, f.error)),
        );
        lines.join("\n")
    }
}

/// Cooperative cancellation shared between a caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Renders card projects to image and document formats.
#[derive(Clone)]
pub struct CardExporter {
    config: ExportConfig,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for CardExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardExporter")
            .field("config", &self.config)
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl CardExporter {
    /// Create a new exporter with the given configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        if config.load_system_fonts {
            fontdb.load_system_fonts();
            tracing::debug!("Loaded {} font faces", fontdb.len());
        }
        Self {
            config,
            fontdb: Arc::new(fontdb),
        }
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Output size in pixels for one side of `project`.
    #[must_use]
    pub fn output_dimensions(&self, project: &Project) -> (u32, u32) {
        raster_size(&project.dimensions, self.export_dpi(project), self.config.multiplier)
    }

    /// Output size, refusing rasters larger than [`MAX_RASTER_PIXELS`].
    fn checked_dimensions(&self, project: &Project) -> RenderResult<(u32, u32)> {
        let (width, height) = self.output_dimensions(project);
        if within_raster_budget(width, height) {
            Ok((width, height))
        } else {
            Err(RenderError::Export(format!(
                "{width}x{height} px exceeds the {MAX_RASTER_PIXELS} pixel raster limit"
            )))
        }
    }

    fn export_dpi(&self, project: &Project) -> f64 {
        clamp_dpi(self.config.dpi.unwrap_or(project.dimensions.dpi))
    }

    fn title<'a>(&'a self, project: &'a Project) -> &'a str {
        if self.config.title.is_empty() {
            &project.name
        } else {
            &self.config.title
        }
    }

    /// The design to draw for a single (non-batch) export.
    ///
    /// Without values tokens are drawn as written. With values, strict mode
    /// rejects missing required variables and lenient mode shows markers.
    fn personalize(
        &self,
        project: &Project,
        side: Side,
        values: Option<&VariableValues>,
    ) -> RenderResult<Design> {
        match values {
            None => Ok(project.design(side).clone()),
            Some(values) if self.config.strict_variables => {
                Ok(render_for_export(project, side, values)?)
            }
            Some(values) => Ok(render_preview(project, side, values).design),
        }
    }

    /// Build the SVG document for one side.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid project or a rejected record.
    pub fn render_svg(
        &self,
        project: &Project,
        side: Side,
        values: Option<&VariableValues>,
    ) -> RenderResult<crate::scene::Scene> {
        project.validate()?;
        let design = self.personalize(project, side, values)?;
        Ok(self.scene(project, side, &design))
    }

    fn scene(&self, project: &Project, side: Side, design: &Design) -> crate::scene::Scene {
        let (pixel_width, pixel_height) = self.output_dimensions(project);
        build_scene(
            project,
            side,
            design,
            &SceneOptions {
                pixel_width,
                pixel_height,
                background: &self.config.background,
            },
        )
    }

    /// Render one side to pixels.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid project, a rejected record, an output
    /// size over [`MAX_RASTER_PIXELS`] or a rasterization failure. Failing elements do not error; they become
    /// placeholders listed in [`Raster::diagnostics`].
    pub fn rasterize(
        &self,
        project: &Project,
        side: Side,
        values: Option<&VariableValues>,
    ) -> RenderResult<Raster> {
        project.validate()?;
        self.checked_dimensions(project)?;
        let design = self.personalize(project, side, values)?;
        self.rasterize_design(project, side, &design)
    }

    fn rasterize_design(&self, project: &Project, side: Side, design: &Design) -> RenderResult<Raster> {
        let scene = self.scene(project, side, design);
        let pixmap = self.rasterize_svg(&scene.svg, self.checked_dimensions(project)?)?;
        Ok(Raster {
            pixmap,
            diagnostics: scene.diagnostics,
        })
    }

    /// Rasterize an SVG string to a tiny-skia Pixmap of exactly `size` pixels.
    #[allow(clippy::cast_precision_loss)]
    fn rasterize_svg(&self, svg: &str, size: (u32, u32)) -> RenderResult<tiny_skia::Pixmap> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_str(svg, &opt)
            .map_err(|e| RenderError::Export(format!("SVG parsing failed: {e}")))?;

        let (px_w, px_h) = size;
        let mut pixmap = tiny_skia::Pixmap::new(px_w, px_h)
            .ok_or_else(|| RenderError::Export("Failed to create pixmap".to_string()))?;

        let tree_size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            px_w as f32 / tree_size.width(),
            px_h as f32 / tree_size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        Ok(pixmap)
    }

    /// Export one side to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or encoding fails.
    pub fn export_png(
        &self,
        project: &Project,
        side: Side,
        values: Option<&VariableValues>,
    ) -> RenderResult<ExportOutput> {
        let raster = self.rasterize(project, side, values)?;
        let bytes = raster
            .pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
        tracing::info!(%side, bytes = bytes.len(), "PNG export finished");
        Ok(ExportOutput {
            bytes,
            diagnostics: raster.diagnostics,
        })
    }

    /// Export one side as a single-page PDF at the card's physical size.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or PDF generation fails.
    pub fn export_pdf(
        &self,
        project: &Project,
        side: Side,
        values: Option<&VariableValues>,
    ) -> RenderResult<ExportOutput> {
        self.export_sides(project, &[side], values)
    }

    /// Export recto then verso as a two-page PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or PDF generation fails.
    pub fn export_duplex_pdf(
        &self,
        project: &Project,
        values: Option<&VariableValues>,
    ) -> RenderResult<ExportOutput> {
        self.export_sides(project, &Side::BOTH, values)
    }

    fn export_sides(
        &self,
        project: &Project,
        sides: &[Side],
        values: Option<&VariableValues>,
    ) -> RenderResult<ExportOutput> {
        let dims = &project.dimensions;
        let mut writer = PdfWriter::new(self.title(project), dims.width, dims.height);
        let mut diagnostics = Vec::new();
        for side in sides {
            let raster = self.rasterize(project, *side, values)?;
            writer.add_page(&raster.pixmap)?;
            diagnostics.extend(raster.diagnostics);
        }
        let pages = writer.pages();
        let bytes = writer
            .finish()?
            .ok_or_else(|| RenderError::Pdf("no pages to write".to_string()))?;
        tracing::info!(pages, bytes = bytes.len(), "PDF export finished");
        Ok(ExportOutput { bytes, diagnostics })
    }

    /// Export one PDF page per record (two per record when `duplex`).
    ///
    /// Records whose values are rejected or whose card cannot be drawn are
    /// skipped and listed in [`BatchReport::failures`]; the remaining records
    /// still print. The cancel flag is checked before every record.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid project, an output size over
    /// [`MAX_RASTER_PIXELS`], or when PDF assembly fails.
    pub fn export_batch(
        &self,
        project: &Project,
        records: &[VariableValues],
        duplex: bool,
        cancel: &CancelFlag,
    ) -> RenderResult<BatchReport> {
        project.validate()?;
        self.checked_dimensions(project)?;
        let sides: &[Side] = if duplex { &Side::BOTH } else { &[Side::Recto] };
        let dims = &project.dimensions;
        let mut writer = PdfWriter::new(self.title(project), dims.width, dims.height);
        let mut report = BatchReport::default();

        for (index, values) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(index, "Batch export cancelled");
                report.cancelled = true;
                break;
            }

            // Draw every side first so a record never prints half.
            let rasters = match self.personalize_record(project, sides, values) {
                Ok(rasters) => rasters,
                Err(error) => {
                    tracing::warn!(index, %error, "Skipping batch record");
                    report.failures.push(BatchFailure { index, error });
                    continue;
                }
            };

            for raster in rasters {
                writer.add_page(&raster.pixmap)?;
                report.diagnostics.extend(raster.diagnostics);
            }
            report.succeeded += 1;
        }

        report.pages = writer.pages();
        if !report.cancelled {
            report.pdf = writer.finish()?;
        }
        tracing::info!(
            records = records.len(),
            succeeded = report.succeeded,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "Batch export finished"
        );
        Ok(report)
    }

    /// Substitute and rasterize every side of one batch record.
    fn personalize_record(
        &self,
        project: &Project,
        sides: &[Side],
        values: &VariableValues,
    ) -> Result<Vec<Raster>, RecordFailure> {
        let designs = sides
            .iter()
            .map(|side| render_for_export(project, *side, values).map(|d| (*side, d)))
            .collect::<Result<Vec<_>, _>>()?;
        designs
            .iter()
            .map(|(side, design)| {
                self.rasterize_design(project, *side, design)
                    .map_err(|e| RecordFailure::Render(e.to_string()))
            })
            .collect()
    }
}
