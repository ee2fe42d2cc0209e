//! # Badge Forge Core
//!
//! Document logic for two-sided ID cards and badges.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 badge-core                  │
//! ├─────────────────────────────────────────────┤
//! │  DocumentModel   │  TransformEngine         │
//! │  - Project       │  - Tool state            │
//! │  - History       │  - Selection, snapping   │
//! │  - Variables     │  - Move / resize / rotate│
//! ├─────────────────────────────────────────────┤
//! │  Units           │  Substitution            │
//! │  - mm / px       │  - {token} preview       │
//! │  - zoom, dpi     │  - per-record export     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All geometry is stored in millimetres. Rendering lives in
//! `badge-renderer`, which only ever reads [`Project`] snapshots.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod history;
pub mod model;
pub mod selection;
pub mod units;
pub mod variables;

pub use config::{EditorConfig, SnapSettings};
pub use document::{
    Background, Design, Dimensions, Project, SecurityFeatures, Side, Variable, VariableType,
    ZOrder, CR80_HEIGHT_MM, CR80_WIDTH_MM,
};
pub use element::{
    CropRect, Element, ElementId, ElementKind, Rect, Symbology, TextAlign, Transform,
};
pub use error::{CardError, CardResult};
pub use history::History;
pub use model::DocumentModel;
pub use selection::{Handle, Tool, TransformEngine};
pub use units::Viewport;
pub use variables::{Preview, PreviewWarning, RecordError, VariableValues};

/// Badge core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
