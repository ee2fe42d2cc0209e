//! # Badge Forge Renderer
//!
//! Print output for card projects: each side is turned into an SVG scene in
//! millimetre user units, rasterized with resvg/tiny-skia at the export
//! resolution, then encoded as PNG or placed on physical-size PDF pages.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Project +    │──▶│ Scene (SVG)  │──▶│ Pixmap       │──▶│ PNG / PDF    │
//! │ record       │   │ mm viewBox   │   │ tiny-skia    │   │ duplex/batch │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Elements that fail to render (unreadable images, unencodable symbols)
//! are drawn as placeholders and reported as [`RenderDiagnostic`]s instead
//! of aborting the export.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod image;
mod pdf;
pub mod pipeline;
pub mod scene;
pub mod symbol;

pub use error::{RenderError, RenderResult};
pub use export::{
    BatchFailure, BatchReport, CancelFlag, CardExporter, ExportConfig, ExportOutput, Raster,
    RecordFailure,
};
pub use pipeline::{ExportPipeline, JobState};
pub use scene::{BackgroundMode, RenderDiagnostic, Scene};
