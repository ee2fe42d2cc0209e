//! Project documents: card dimensions, the two printed sides and their variables.
//!
//! [`Project`] is also the canonical persisted representation handed to and
//! received from the host application.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::variables::is_identifier;
use crate::{CardError, CardResult, Element, ElementId};

/// CR80 card width in millimetres.
pub const CR80_WIDTH_MM: f64 = 85.6;

/// CR80 card height in millimetres.
pub const CR80_HEIGHT_MM: f64 = 53.98;

/// Default print resolution for new projects.
pub const DEFAULT_DPI: f64 = 300.0;

/// Which face of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Front.
    Recto,
    /// Back.
    Verso,
}

impl Side {
    /// Both sides in print order.
    pub const BOTH: [Self; 2] = [Self::Recto, Self::Verso];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recto => f.write_str("recto"),
            Self::Verso => f.write_str("verso"),
        }
    }
}

/// Physical card size and print resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in mm.
    pub width: f64,
    /// Height in mm.
    pub height: f64,
    /// Print resolution in dots per inch.
    pub dpi: f64,
}

impl Dimensions {
    /// CR80 at the default print resolution.
    #[must_use]
    pub const fn cr80() -> Self {
        Self {
            width: CR80_WIDTH_MM,
            height: CR80_HEIGHT_MM,
            dpi: DEFAULT_DPI,
        }
    }

    /// Whether the card is wider than tall.
    #[must_use]
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Largest allowed bleed or safe-area margin.
    #[must_use]
    pub fn max_margin(&self) -> f64 {
        self.width.min(self.height) / 2.0
    }

    /// Check that every value is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] otherwise.
    pub fn validate(&self) -> CardResult<()> {
        for (label, value) in [("width", self.width), ("height", self.height), ("dpi", self.dpi)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CardError::validation(format!(
                    "dimension {label} must be > 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::cr80()
    }
}

/// Side background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Background {
    /// Solid color as hex.
    Color(String),
    /// Image source covering the whole side.
    Image(String),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color("#ffffff".to_string())
    }
}

/// Mutually ordered z-order operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    /// Move above every other element.
    BringToFront,
    /// Move below every other element.
    SendToBack,
    /// Swap with the element directly above.
    StepForward,
    /// Swap with the element directly below.
    StepBackward,
}

/// Content of one card side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    /// Elements, kept sorted by z-index.
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Background fill.
    #[serde(default)]
    pub background: Background,
    /// Bleed margin beyond the trim edge, in mm.
    #[serde(default)]
    pub bleed: f64,
    /// Safe-area inset from the trim edge, in mm.
    #[serde(default)]
    pub safe_area: f64,
}

impl Design {
    /// Get an element by ID.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    /// Get a mutable reference to an element by ID.
    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }

    /// Elements in paint order (lowest z-index first).
    pub fn paint_order(&self) -> impl Iterator<Item = &Element> {
        let mut sorted: Vec<_> = self.elements.iter().collect();
        sorted.sort_by_key(|e| e.transform.z_index);
        sorted.into_iter()
    }

    /// Next z-index on top of the stack.
    #[must_use]
    pub fn top_z_index(&self) -> i32 {
        self.elements
            .iter()
            .map(|e| e.transform.z_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Find the topmost visible element at the given document coordinates.
    #[must_use]
    pub fn element_at(&self, x: f64, y: f64) -> Option<&ElementId> {
        self.elements
            .iter()
            .filter(|e| e.visible && e.contains_point(x, y))
            .max_by_key(|e| e.transform.z_index)
            .map(|e| &e.id)
    }

    /// Rewrite z-indices to `0..n`, preserving relative order, and sort.
    pub fn normalize_z_order(&mut self) {
        self.elements.sort_by_key(|e| e.transform.z_index);
        for (index, element) in self.elements.iter_mut().enumerate() {
            element.transform.z_index = i32::try_from(index).unwrap_or(i32::MAX);
        }
    }

    /// Apply a z-order operation to one element and renormalize.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] if the element does not exist.
    pub fn reorder(&mut self, id: &ElementId, op: ZOrder) -> CardResult<()> {
        self.normalize_z_order();
        let from = self
            .elements
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| CardError::NotFound(format!("element {id}")))?;
        if self.elements[from].locked {
            return Ok(());
        }
        let last = self.elements.len() - 1;
        let to = match op {
            ZOrder::BringToFront => last,
            ZOrder::SendToBack => 0,
            ZOrder::StepForward => (from + 1).min(last),
            ZOrder::StepBackward => from.saturating_sub(1),
        };
        let element = self.elements.remove(from);
        self.elements.insert(to, element);
        for (index, element) in self.elements.iter_mut().enumerate() {
            element.transform.z_index = i32::try_from(index).unwrap_or(i32::MAX);
        }
        Ok(())
    }

    /// Check the z-index sequence is exactly `0..n`.
    #[must_use]
    pub fn has_contiguous_z_order(&self) -> bool {
        let mut indices: Vec<_> = self.elements.iter().map(|e| e.transform.z_index).collect();
        indices.sort_unstable();
        indices
            .iter()
            .enumerate()
            .all(|(i, z)| i32::try_from(i).is_ok_and(|i| i == *z))
    }

    /// Check side-level invariants against the card dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for out-of-range margins, duplicate
    /// element IDs or invalid elements.
    pub fn validate(&self, dimensions: &Dimensions) -> CardResult<()> {
        let max = dimensions.max_margin();
        for (label, value) in [("bleed", self.bleed), ("safeArea", self.safe_area)] {
            if !(value.is_finite() && (0.0..=max).contains(&value)) {
                return Err(CardError::validation(format!(
                    "{label} must be within 0..={max}, got {value}"
                )));
            }
        }
        let mut seen = HashSet::new();
        for element in &self.elements {
            if !seen.insert(&element.id) {
                return Err(CardError::validation(format!(
                    "duplicate element id {}",
                    element.id
                )));
            }
            element.validate()?;
        }
        Ok(())
    }
}

/// Value type of a personalization variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Free text.
    #[default]
    Text,
    /// Email address.
    Email,
    /// Numeric value.
    Number,
    /// Calendar date.
    Date,
    /// QR payload.
    Qrcode,
    /// Barcode payload.
    Barcode,
    /// Image source.
    Image,
}

/// A personalization field bound through `{name}` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Identifier.
    pub id: String,
    /// Token name.
    pub name: String,
    /// Value type.
    #[serde(rename = "type", default)]
    pub kind: VariableType,
    /// Fallback when a record supplies no value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Whether export fails without a value.
    #[serde(default)]
    pub required: bool,
}

impl Variable {
    /// Create a variable with a generated id.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: VariableType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            default_value: None,
            required: false,
        }
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Mark the variable as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Security features requested for printing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityFeatures {
    /// Holographic overlay patch.
    pub hologram: bool,
    /// Diagonal translucent watermark.
    pub watermark: bool,
    /// Microtext band.
    pub microtext: bool,
    /// Signed QR payloads (print-process flag).
    pub qr_secure: bool,
    /// UV ink layer (print-process flag).
    pub uv_ink: bool,
}

/// A complete two-sided card project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Template the project was created from.
    #[serde(default)]
    pub template: String,
    /// Card size and resolution.
    pub dimensions: Dimensions,
    /// Front side.
    #[serde(default)]
    pub recto: Design,
    /// Back side.
    #[serde(default)]
    pub verso: Design,
    /// Personalization variables.
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Security features.
    #[serde(default)]
    pub security: SecurityFeatures,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last persisted save.
    pub updated_at: DateTime<Utc>,
    /// Monotonic save counter.
    #[serde(default)]
    pub version: u64,
}

impl Project {
    /// Create a blank project with the given dimensions.
    #[must_use]
    pub fn blank(name: impl Into<String>, dimensions: Dimensions) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            template: "blank".to_string(),
            dimensions,
            recto: Design::default(),
            verso: Design::default(),
            variables: Vec::new(),
            security: SecurityFeatures::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Create a blank CR80 card project.
    #[must_use]
    pub fn cr80(name: impl Into<String>) -> Self {
        let mut project = Self::blank(name, Dimensions::cr80());
        project.template = "cr80".to_string();
        project
    }

    /// Borrow one side.
    #[must_use]
    pub fn design(&self, side: Side) -> &Design {
        match side {
            Side::Recto => &self.recto,
            Side::Verso => &self.verso,
        }
    }

    /// Mutably borrow one side.
    pub fn design_mut(&mut self, side: Side) -> &mut Design {
        match side {
            Side::Recto => &mut self.recto,
            Side::Verso => &mut self.verso,
        }
    }

    /// Look up a variable by token name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Check every project invariant.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] describing the first violation.
    pub fn validate(&self) -> CardResult<()> {
        self.dimensions.validate()?;
        self.recto.validate(&self.dimensions)?;
        self.verso.validate(&self.dimensions)?;
        let mut names = HashSet::new();
        for variable in &self.variables {
            if !is_identifier(&variable.name) {
                return Err(CardError::validation(format!(
                    "variable name {:?} is not a valid identifier",
                    variable.name
                )));
            }
            if !names.insert(variable.name.as_str()) {
                return Err(CardError::validation(format!(
                    "duplicate variable name {:?}",
                    variable.name
                )));
            }
        }
        Ok(())
    }

    /// Serialize the project to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CardResult<String> {
        serde_json::to_string_pretty(self).map_err(CardError::Serialization)
    }

    /// Deserialize and validate a project from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Serialization`] for malformed JSON and
    /// [`CardError::Validation`] when the document breaks an invariant. No
    /// repair is attempted.
    pub fn from_json(json: &str) -> CardResult<Self> {
        let project: Self = serde_json::from_str(json)?;
        project.validate()?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementKind, Transform};

    fn rect(z: i32) -> Element {
        Element::new(ElementKind::Rectangle {
            fill: "#ff0000".to_string(),
            stroke: "none".to_string(),
            stroke_width: 0.0,
            corner_radius: 0.0,
        })
        .with_transform(Transform {
            z_index: z,
            ..Transform::at(0.0, 0.0, 10.0, 10.0)
        })
    }

    #[test]
    fn test_reorder_renormalizes() {
        let mut design = Design::default();
        design.elements = vec![rect(4), rect(9), rect(-2)];
        let bottom = design.elements[2].id.clone();

        design
            .reorder(&bottom, ZOrder::BringToFront)
            .expect("reorder");

        assert!(design.has_contiguous_z_order());
        assert_eq!(design.element(&bottom).map(|e| e.transform.z_index), Some(2));
    }

    #[test]
    fn test_reorder_unknown_id() {
        let mut design = Design::default();
        design.elements = vec![rect(0)];
        let result = design.reorder(&ElementId::from("ghost"), ZOrder::SendToBack);
        assert!(matches!(result, Err(CardError::NotFound(_))));
    }

    #[test]
    fn test_locked_element_is_not_reordered() {
        let mut design = Design::default();
        design.elements = vec![rect(0).with_locked(true), rect(1)];
        let locked = design.elements[0].id.clone();
        design
            .reorder(&locked, ZOrder::BringToFront)
            .expect("reorder");
        assert_eq!(design.element(&locked).map(|e| e.transform.z_index), Some(0));
    }

    #[test]
    fn test_margin_validation() {
        let dims = Dimensions::cr80();
        let design = Design {
            bleed: 30.0,
            ..Design::default()
        };
        assert!(design.validate(&dims).is_err());

        let design = Design {
            bleed: -1.0,
            ..Design::default()
        };
        assert!(design.validate(&dims).is_err());

        let design = Design {
            bleed: 3.0,
            safe_area: 3.0,
            ..Design::default()
        };
        assert!(design.validate(&dims).is_ok());
    }

    #[test]
    fn test_project_rejects_duplicate_variables() {
        let mut project = Project::cr80("Staff");
        project.variables.push(Variable::new("name", VariableType::Text));
        project.variables.push(Variable::new("name", VariableType::Email));
        assert!(matches!(project.validate(), Err(CardError::Validation(_))));
    }

    #[test]
    fn test_background_json_shape() {
        let json = serde_json::to_value(Background::Color("#003366".into())).expect("json");
        assert_eq!(json, serde_json::json!({"type": "color", "value": "#003366"}));
    }

    #[test]
    fn test_from_json_rejects_zero_dimensions() {
        let mut project = Project::cr80("Bad");
        project.dimensions.dpi = 0.0;
        let json = serde_json::to_string(&project).expect("json");
        assert!(matches!(
            Project::from_json(&json),
            Err(CardError::Validation(_))
        ));
    }
}
