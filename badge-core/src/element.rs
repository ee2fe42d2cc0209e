//! Card elements - the building blocks of each card side.
//!
//! Elements are plain serializable data. All geometry is in document
//! millimetres with the origin at the top-left trim corner; rotation is in
//! degrees, clockwise, around the element's own centre.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CardError, CardResult};

/// Unique identifier for an element.
///
/// Freshly created elements get a UUID v4; identifiers supplied by the host in
/// project JSON are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Horizontal text alignment inside a text element's box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centred.
    Center,
    /// Flush right.
    Right,
}

/// Barcode symbologies supported for printing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    /// Code 128, character set B.
    #[default]
    Code128,
    /// Code 39.
    Code39,
    /// EAN-13 (12 data digits, checksum computed).
    Ean13,
}

/// Normalised crop rectangle over an image source, each field in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    /// Left edge as a fraction of the source width.
    pub x: f64,
    /// Top edge as a fraction of the source height.
    pub y: f64,
    /// Width as a fraction of the source width.
    pub width: f64,
    /// Height as a fraction of the source height.
    pub height: f64,
}

impl CropRect {
    fn validate(&self) -> CardResult<()> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !(in_unit(self.x) && in_unit(self.y) && in_unit(self.width) && in_unit(self.height))
            || self.width <= 0.0
            || self.height <= 0.0
            || self.x + self.width > 1.0 + f64::EPSILON
            || self.y + self.height > 1.0 + f64::EPSILON
        {
            return Err(CardError::validation(format!(
                "crop rectangle {self:?} must lie within the unit square"
            )));
        }
        Ok(())
    }
}

/// The type of content an element contains.
///
/// Serialized with an inline `type` discriminator so elements read as flat
/// JSON objects (`{"id": .., "type": "text", "x": .., "content": ..}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ElementKind {
    /// A text label, possibly carrying `{variable}` tokens.
    Text {
        /// Text content.
        content: String,
        /// Font family name.
        #[serde(default = "default_font_family")]
        font_family: String,
        /// Font size in points.
        font_size: f64,
        /// Text color as hex.
        #[serde(default = "default_ink")]
        color: String,
        /// Horizontal alignment.
        #[serde(default)]
        align: TextAlign,
        /// Bold weight.
        #[serde(default)]
        bold: bool,
    },

    /// A raster picture (data URI or local file path).
    Image {
        /// Image source.
        src: String,
        /// Optional crop of the source.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crop: Option<CropRect>,
    },

    /// A QR code whose payload may carry `{variable}` tokens.
    Qrcode {
        /// Encoded payload.
        data: String,
        /// Module color as hex.
        #[serde(default = "default_ink")]
        color: String,
    },

    /// A linear barcode whose payload may carry `{variable}` tokens.
    Barcode {
        /// Encoded payload.
        data: String,
        /// Symbology.
        #[serde(default)]
        symbology: Symbology,
        /// Bar color as hex.
        #[serde(default = "default_ink")]
        color: String,
    },

    /// A filled/stroked rectangle.
    Rectangle {
        /// Fill color as hex (`none` for no fill).
        fill: String,
        /// Stroke color as hex (`none` for no stroke).
        stroke: String,
        /// Stroke width in mm.
        stroke_width: f64,
        /// Corner radius in mm.
        #[serde(default)]
        corner_radius: f64,
    },

    /// An ellipse inscribed in the element box.
    Circle {
        /// Fill color as hex.
        fill: String,
        /// Stroke color as hex.
        stroke: String,
        /// Stroke width in mm.
        stroke_width: f64,
    },

    /// A straight line to `(x2, y2)` whose box spans both end points.
    Line {
        /// End point X in mm.
        x2: f64,
        /// End point Y in mm.
        y2: f64,
        /// Stroke color as hex.
        stroke: String,
        /// Stroke width in mm.
        stroke_width: f64,
    },
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_ink() -> String {
    "#000000".to_string()
}

impl ElementKind {
    /// The serialized `type` tag of this kind.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Qrcode { .. } => "qrcode",
            Self::Barcode { .. } => "barcode",
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Line { .. } => "line",
        }
    }

    /// The field that accepts `{variable}` tokens, if this kind has one.
    #[must_use]
    pub fn bindable_text(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => Some(content),
            Self::Qrcode { data, .. } | Self::Barcode { data, .. } => Some(data),
            Self::Image { .. } | Self::Rectangle { .. } | Self::Circle { .. } | Self::Line { .. } => {
                None
            }
        }
    }

    /// Mutable access to the token-bearing field.
    pub fn bindable_text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Text { content, .. } => Some(content),
            Self::Qrcode { data, .. } | Self::Barcode { data, .. } => Some(data),
            Self::Image { .. } | Self::Rectangle { .. } | Self::Circle { .. } | Self::Line { .. } => {
                None
            }
        }
    }
}

/// Axis-aligned rectangle in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// Position, size and layering of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    /// X position (mm from left trim edge).
    pub x: f64,
    /// Y position (mm from top trim edge).
    pub y: f64,
    /// Width in mm.
    pub width: f64,
    /// Height in mm.
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Z-index for layering.
    #[serde(default)]
    pub z_index: i32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 20.0,
            height: 10.0,
            rotation: 0.0,
            z_index: 0,
        }
    }
}

impl Transform {
    /// Transform with the given box and no rotation.
    #[must_use]
    pub fn at(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Self::default()
        }
    }
}

/// A card element with content and transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Unique identifier.
    pub id: ElementId,
    /// Position and size.
    #[serde(flatten)]
    pub transform: Transform,
    /// Locked elements ignore every request except visibility and unlock.
    #[serde(default)]
    pub locked: bool,
    /// Hidden elements are kept but neither rendered nor hit-tested.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Element content type.
    #[serde(flatten)]
    pub kind: ElementKind,
}

const fn default_visible() -> bool {
    true
}

impl Element {
    /// Create a new element with the given kind.
    #[must_use]
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            transform: Transform::default(),
            locked: false,
            visible: true,
            kind,
        }
    }

    /// Set the transform.
    ///
    /// For lines the transform origin is the start point and the end point
    /// comes from the kind; the box is refitted around both.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        if let ElementKind::Line { x2, y2, .. } = self.kind {
            self.set_line_points((transform.x, transform.y), (x2, y2));
        }
        self
    }

    /// Set whether the element is locked.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Unrotated bounding box.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let t = &self.transform;
        Rect::new(t.x, t.y, t.width, t.height)
    }

    /// Move by a delta in mm.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transform.x += dx;
        self.transform.y += dy;
        if let ElementKind::Line { x2, y2, .. } = &mut self.kind {
            *x2 += dx;
            *y2 += dy;
        }
    }

    /// Start and end points of a line.
    ///
    /// The box always spans both points, so the start is the box corner
    /// opposite the end. Returns `None` for other kinds.
    #[must_use]
    pub fn line_points(&self) -> Option<((f64, f64), (f64, f64))> {
        let ElementKind::Line { x2, y2, .. } = self.kind else {
            return None;
        };
        let t = &self.transform;
        let opposite = |end: f64, start: f64, len: f64| {
            if (end - start).abs() < (end - (start + len)).abs() {
                start + len
            } else {
                start
            }
        };
        Some((
            (opposite(x2, t.x, t.width), opposite(y2, t.y, t.height)),
            (x2, y2),
        ))
    }

    /// Place a line between two points and fit its box around them.
    ///
    /// Does nothing for other kinds.
    pub fn set_line_points(&mut self, start: (f64, f64), end: (f64, f64)) {
        if let ElementKind::Line { x2, y2, .. } = &mut self.kind {
            *x2 = end.0;
            *y2 = end.1;
            self.transform.x = start.0.min(end.0);
            self.transform.y = start.1.min(end.1);
            self.transform.width = (end.0 - start.0).abs();
            self.transform.height = (end.1 - start.1).abs();
        }
    }

    /// Replace the bounding box.
    ///
    /// Line end points are remapped from the old box onto the new one so the
    /// line keeps its direction.
    pub fn set_bounds(&mut self, rect: Rect) {
        let old = self.bounds();
        if let Some((start, end)) = self.line_points() {
            // A zero-length axis sends the start to the near edge and the end to the far one.
            let remap = |v: f64, from: (f64, f64), to: (f64, f64), far: bool| {
                if from.1.abs() >= f64::EPSILON {
                    to.0 + (v - from.0) / from.1 * to.1
                } else if far {
                    to.0 + to.1
                } else {
                    to.0
                }
            };
            let map = |(x, y): (f64, f64), far: bool| {
                (
                    remap(x, (old.x, old.width), (rect.x, rect.width), far),
                    remap(y, (old.y, old.height), (rect.y, rect.height), far),
                )
            };
            self.set_line_points(map(start, false), map(end, true));
            return;
        }
        self.transform.x = rect.x;
        self.transform.y = rect.y;
        self.transform.width = rect.width;
        self.transform.height = rect.height;
    }

    /// Check if a point (in document mm) is within this element, honouring rotation.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = self.bounds().center();
        let theta = -self.transform.rotation.to_radians();
        let (sin, cos) = theta.sin_cos();
        let lx = (x - cx).mul_add(cos, -(y - cy) * sin) + cx;
        let ly = (x - cx).mul_add(sin, (y - cy) * cos) + cy;
        let t = &self.transform;
        lx >= t.x && lx <= t.x + t.width && ly >= t.y && ly <= t.y + t.height
    }

    /// Check element-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for non-finite geometry, negative
    /// sizes, non-positive font sizes, negative stroke widths or a crop
    /// rectangle outside the unit square.
    pub fn validate(&self) -> CardResult<()> {
        let t = &self.transform;
        let geometry = [t.x, t.y, t.width, t.height, t.rotation];
        if geometry.iter().any(|v| !v.is_finite()) {
            return Err(CardError::validation(format!(
                "element {} has non-finite geometry",
                self.id
            )));
        }
        if t.width < 0.0 || t.height < 0.0 {
            return Err(CardError::validation(format!(
                "element {} has a negative size",
                self.id
            )));
        }
        match &self.kind {
            ElementKind::Text { font_size, .. } if !(font_size.is_finite() && *font_size > 0.0) => {
                Err(CardError::validation(format!(
                    "element {} needs a positive font size",
                    self.id
                )))
            }
            ElementKind::Image { crop: Some(crop), .. } => crop.validate(),
            ElementKind::Rectangle { stroke_width, .. }
            | ElementKind::Circle { stroke_width, .. }
            | ElementKind::Line { stroke_width, .. }
                if !(stroke_width.is_finite() && *stroke_width >= 0.0) =>
            {
                Err(CardError::validation(format!(
                    "element {} has an invalid stroke width",
                    self.id
                )))
            }
            _ => Ok(()),
        }
    }
}
