//! Renderer error types.

use badge_core::{CardError, RecordError};
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering and export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An image source could not be read or decoded.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// A QR code or barcode payload cannot be encoded.
    #[error("Symbol encoding failed: {0}")]
    Symbol(String),

    /// Rasterization or image encoding failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// PDF assembly failed.
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    /// A personalization record cannot be printed.
    #[error("Record rejected: {0}")]
    Record(#[from] RecordError),

    /// The project itself is invalid.
    #[error(transparent)]
    Core(#[from] CardError),

    /// The job was cancelled before it finished.
    #[error("Export cancelled")]
    Cancelled,

    /// The blocking worker task failed.
    #[error("Export worker failed: {0}")]
    Join(String),
}
