//! Tool state, selection and direct-manipulation transforms.
//!
//! The [`TransformEngine`] holds only session UI state (active tool, selected
//! ids, viewport). Every change it makes to the document goes through the
//! [`DocumentModel`], so moves, resizes and rotations land in history like any
//! other edit.

use serde::{Deserialize, Serialize};

use crate::config::SnapSettings;
use crate::document::ZOrder;
use crate::element::CropRect;
use crate::model::DocumentModel;
use crate::units::Viewport;
use crate::{CardError, CardResult, Design, Dimensions, ElementId, ElementKind, Rect, Side};

/// Smallest width or height a resize can produce, in mm.
pub const MIN_ELEMENT_SIZE_MM: f64 = 0.1;

/// Editor tools. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Select and manipulate.
    #[default]
    Pointer,
    /// Place text.
    Text,
    /// Draw rectangles.
    Rectangle,
    /// Draw ellipses.
    Circle,
    /// Place pictures.
    Image,
    /// Place QR codes.
    Qrcode,
    /// Place barcodes.
    Barcode,
    /// Draw lines.
    Line,
    /// Crop the selected picture.
    Crop,
    /// Lock and unlock elements.
    Lock,
    /// Security feature panel.
    Security,
    /// Layer panel.
    Layers,
    /// Move only.
    Move,
    /// Rotate only.
    Rotate,
}

impl Tool {
    /// Whether clicking selects elements with this tool.
    #[must_use]
    pub fn can_select(self) -> bool {
        matches!(
            self,
            Self::Pointer | Self::Move | Self::Rotate | Self::Layers | Self::Crop | Self::Lock
        )
    }

    fn can_move(self) -> bool {
        matches!(self, Self::Pointer | Self::Move)
    }

    fn can_resize(self) -> bool {
        matches!(self, Self::Pointer | Self::Move)
    }

    fn can_rotate(self) -> bool {
        matches!(self, Self::Pointer | Self::Rotate)
    }

    fn can_reorder(self) -> bool {
        matches!(self, Self::Pointer | Self::Layers | Self::Move | Self::Rotate)
    }

    fn can_lock(self) -> bool {
        matches!(self, Self::Pointer | Self::Lock | Self::Layers)
    }

    fn require(self, allowed: bool, operation: &str) -> CardResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(CardError::InvalidOperation(format!(
                "{operation} is not available with the {self:?} tool"
            )))
        }
    }
}

/// Resize handles on the selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handle {
    /// Top-left corner.
    TopLeft,
    /// Top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Right edge.
    Right,
    /// Bottom-right corner.
    BottomRight,
    /// Bottom edge.
    Bottom,
    /// Bottom-left corner.
    BottomLeft,
    /// Left edge.
    Left,
}

impl Handle {
    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }

    fn is_corner(self) -> bool {
        (self.moves_left() || self.moves_right()) && (self.moves_top() || self.moves_bottom())
    }
}

/// New box for dragging `handle` by `(dx, dy)` mm.
///
/// The opposite edge (or corner) stays fixed. With `keep_aspect` the box keeps
/// its width/height ratio; edge handles then grow symmetrically around the
/// centre of the other axis. Neither side drops below [`MIN_ELEMENT_SIZE_MM`]
/// on an axis the handle affects.
#[must_use]
pub fn resize_rect(rect: Rect, handle: Handle, dx: f64, dy: f64, keep_aspect: bool) -> Rect {
    let horizontal = handle.moves_left() || handle.moves_right();
    let vertical = handle.moves_top() || handle.moves_bottom();

    let mut width = rect.width;
    let mut height = rect.height;
    if handle.moves_left() {
        width -= dx;
    } else if handle.moves_right() {
        width += dx;
    }
    if handle.moves_top() {
        height -= dy;
    } else if handle.moves_bottom() {
        height += dy;
    }

    if horizontal {
        width = width.max(MIN_ELEMENT_SIZE_MM);
    }
    if vertical {
        height = height.max(MIN_ELEMENT_SIZE_MM);
    }

    if keep_aspect && rect.width > 0.0 && rect.height > 0.0 {
        let ratio = rect.width / rect.height;
        let follow_width = if handle.is_corner() {
            (width / rect.width - 1.0).abs() >= (height / rect.height - 1.0).abs()
        } else {
            horizontal
        };
        if follow_width {
            height = width / ratio;
        } else {
            width = height * ratio;
        }
        let shortest = width.min(height);
        if shortest < MIN_ELEMENT_SIZE_MM {
            let grow = MIN_ELEMENT_SIZE_MM / shortest;
            width *= grow;
            height *= grow;
        }
    }

    let (cx, cy) = rect.center();
    let x = if handle.moves_left() {
        rect.right() - width
    } else if horizontal || !keep_aspect {
        rect.x
    } else {
        cx - width / 2.0
    };
    let y = if handle.moves_top() {
        rect.bottom() - height
    } else if vertical || !keep_aspect {
        rect.y
    } else {
        cy - height / 2.0
    };
    Rect::new(x, y, width, height)
}

/// Snap boundaries for one side of a card.
fn snap_targets(dimensions: &Dimensions, design: &Design, snap: &SnapSettings) -> (Vec<f64>, Vec<f64>) {
    let (w, h) = (dimensions.width, dimensions.height);
    let mut xs = vec![0.0, w / 2.0, w];
    let mut ys = vec![0.0, h / 2.0, h];
    if snap.snap_to_bleed && design.bleed > 0.0 {
        xs.extend([-design.bleed, w + design.bleed]);
        ys.extend([-design.bleed, h + design.bleed]);
    }
    if snap.snap_to_safe_area && design.safe_area > 0.0 {
        xs.extend([design.safe_area, w - design.safe_area]);
        ys.extend([design.safe_area, h - design.safe_area]);
    }
    xs.extend(&snap.vertical_guides);
    ys.extend(&snap.horizontal_guides);
    (xs, ys)
}

/// Correction to apply so the closest of `edges` lands on a target.
///
/// Grid lines count as targets when `grid > 0`. Returns `None` when nothing
/// lies within `tolerance`.
fn snap_axis(edges: &[f64], targets: &[f64], grid: f64, tolerance: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |correction: f64| {
        if correction.abs() <= tolerance && best.map_or(true, |b| correction.abs() < b.abs()) {
            best = Some(correction);
        }
    };
    for &edge in edges {
        for target in targets {
            consider(target - edge);
        }
        if grid > 0.0 {
            consider((edge / grid).round() * grid - edge);
        }
    }
    best
}

/// Tool, selection and viewport of one editing surface.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    tool: Tool,
    side: Side,
    selection: Vec<ElementId>,
    viewport: Viewport,
}

impl TransformEngine {
    /// Create an engine showing the recto with the pointer tool.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            tool: Tool::Pointer,
            side: Side::Recto,
            selection: Vec::new(),
            viewport,
        }
    }

    /// Create an engine matching a document's configured screen resolution.
    #[must_use]
    pub fn for_document(doc: &DocumentModel) -> Self {
        Self::new(Viewport::new(crate::units::DEFAULT_ZOOM, doc.config().screen_dpi))
    }

    /// Active tool.
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools. The selection survives the switch.
    pub fn select_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            tracing::debug!("Tool changed: {:?} -> {:?}", self.tool, tool);
            self.tool = tool;
        }
    }

    /// Side being edited.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Switch the edited side, dropping the selection.
    pub fn set_side(&mut self, side: Side) {
        if self.side != side {
            self.side = side;
            self.selection.clear();
        }
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Set the zoom (clamped).
    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.set_zoom(zoom);
    }

    /// Selected element ids in selection order.
    #[must_use]
    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    /// Select elements, replacing the selection unless `additive`.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the tool cannot select and
    /// [`CardError::NotFound`] for unknown ids; the selection is unchanged in
    /// both cases.
    pub fn select(&mut self, doc: &DocumentModel, ids: &[ElementId], additive: bool) -> CardResult<()> {
        self.tool.require(self.tool.can_select(), "select")?;
        let design = doc.design(self.side);
        if let Some(missing) = ids.iter().find(|id| design.element(id).is_none()) {
            return Err(CardError::NotFound(format!("element {missing} on {}", self.side)));
        }
        if !additive {
            self.selection.clear();
        }
        for id in ids {
            if !self.selection.contains(id) {
                self.selection.push(id.clone());
            }
        }
        Ok(())
    }

    /// Select the topmost visible element under a screen point.
    ///
    /// Clicking empty space clears a non-additive selection.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the tool cannot select.
    pub fn select_at(
        &mut self,
        doc: &DocumentModel,
        screen_x: f64,
        screen_y: f64,
        additive: bool,
    ) -> CardResult<Option<ElementId>> {
        self.tool.require(self.tool.can_select(), "select")?;
        let x = self.viewport.to_document(screen_x);
        let y = self.viewport.to_document(screen_y);
        let hit = doc.design(self.side).element_at(x, y).cloned();
        match &hit {
            Some(id) => self.select(doc, std::slice::from_ref(id), additive)?,
            None if !additive => self.selection.clear(),
            None => {}
        }
        Ok(hit)
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Union of the selected elements' boxes.
    #[must_use]
    pub fn selection_bounds(&self, doc: &DocumentModel) -> Option<Rect> {
        let design = doc.design(self.side);
        self.selection
            .iter()
            .filter_map(|id| design.element(id))
            .map(crate::Element::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Selected elements that accept transforms.
    fn unlocked(&self, design: &Design) -> Vec<ElementId> {
        self.selection
            .iter()
            .filter(|id| design.element(id).is_some_and(|e| !e.locked))
            .cloned()
            .collect()
    }

    fn bounds_of(design: &Design, ids: &[ElementId]) -> Option<Rect> {
        ids.iter()
            .filter_map(|id| design.element(id))
            .map(crate::Element::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Translate every selected unlocked element by `(dx, dy)` mm.
    ///
    /// With `snap` the delta is corrected so the nearest selection edge or
    /// centre lands on a grid line, guide, trim edge, bleed or safe-area
    /// boundary within the configured screen tolerance. Returns the applied
    /// delta.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot move.
    pub fn move_by(
        &mut self,
        doc: &mut DocumentModel,
        dx: f64,
        dy: f64,
        snap: bool,
    ) -> CardResult<(f64, f64)> {
        self.tool.require(self.tool.can_move(), "move")?;
        let design = doc.design(self.side);
        let targets = self.unlocked(design);
        let Some(bounds) = Self::bounds_of(design, &targets) else {
            return Ok((0.0, 0.0));
        };

        let (mut dx, mut dy) = (dx, dy);
        let settings = &doc.config().snap;
        if snap && settings.enabled {
            let tolerance = self.viewport.to_document(settings.tolerance_px);
            let (xs, ys) = snap_targets(&doc.project().dimensions, design, settings);
            let moved = Rect::new(bounds.x + dx, bounds.y + dy, bounds.width, bounds.height);
            let x_edges = [moved.x, moved.center().0, moved.right()];
            let y_edges = [moved.y, moved.center().1, moved.bottom()];
            dx += snap_axis(&x_edges, &xs, settings.grid_mm, tolerance).unwrap_or(0.0);
            dy += snap_axis(&y_edges, &ys, settings.grid_mm, tolerance).unwrap_or(0.0);
        }

        doc.mutate_design(self.side, "move", |design| {
            for id in &targets {
                if let Some(element) = design.element_mut(id) {
                    element.translate(dx, dy);
                }
            }
            Ok(())
        })?;
        Ok((dx, dy))
    }

    /// Drag a resize handle of the selection box by `(dx, dy)` mm.
    ///
    /// Elements are scaled with the box, keeping their relative layout. With
    /// `snap` the dragged edges are pulled onto the same targets as
    /// [`move_by`](Self::move_by) uses.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot resize.
    pub fn resize(
        &mut self,
        doc: &mut DocumentModel,
        handle: Handle,
        dx: f64,
        dy: f64,
        keep_aspect: bool,
        snap: bool,
    ) -> CardResult<()> {
        self.tool.require(self.tool.can_resize(), "resize")?;
        let design = doc.design(self.side);
        let targets = self.unlocked(design);
        let Some(old) = Self::bounds_of(design, &targets) else {
            return Ok(());
        };

        let (mut dx, mut dy) = (dx, dy);
        let settings = &doc.config().snap;
        if snap && settings.enabled {
            let tolerance = self.viewport.to_document(settings.tolerance_px);
            let (xs, ys) = snap_targets(&doc.project().dimensions, design, settings);
            let dragged_x = if handle.moves_left() {
                Some(old.x + dx)
            } else if handle.moves_right() {
                Some(old.right() + dx)
            } else {
                None
            };
            let dragged_y = if handle.moves_top() {
                Some(old.y + dy)
            } else if handle.moves_bottom() {
                Some(old.bottom() + dy)
            } else {
                None
            };
            if let Some(edge) = dragged_x {
                dx += snap_axis(&[edge], &xs, settings.grid_mm, tolerance).unwrap_or(0.0);
            }
            if let Some(edge) = dragged_y {
                dy += snap_axis(&[edge], &ys, settings.grid_mm, tolerance).unwrap_or(0.0);
            }
        }

        let new = resize_rect(old, handle, dx, dy, keep_aspect);
        let scale_x = if old.width > 0.0 { new.width / old.width } else { 1.0 };
        let scale_y = if old.height > 0.0 { new.height / old.height } else { 1.0 };

        doc.mutate_design(self.side, "resize", |design| {
            for id in &targets {
                if let Some(element) = design.element_mut(id) {
                    let b = element.bounds();
                    let width = if old.width > 0.0 { b.width * scale_x } else { new.width };
                    let height = if old.height > 0.0 { b.height * scale_y } else { new.height };
                    element.set_bounds(Rect::new(
                        new.x + (b.x - old.x) * scale_x,
                        new.y + (b.y - old.y) * scale_y,
                        width,
                        height,
                    ));
                }
            }
            Ok(())
        })
    }

    /// Rotate each selected unlocked element about its own centre.
    ///
    /// Resulting angles are normalised to `[0, 360)`.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot rotate.
    pub fn rotate(&mut self, doc: &mut DocumentModel, degrees: f64) -> CardResult<()> {
        self.tool.require(self.tool.can_rotate(), "rotate")?;
        if !degrees.is_finite() {
            return Err(CardError::validation(format!("rotation must be finite, got {degrees}")));
        }
        let targets = self.unlocked(doc.design(self.side));
        doc.mutate_design(self.side, "rotate", |design| {
            for id in &targets {
                if let Some(element) = design.element_mut(id) {
                    element.transform.rotation =
                        (element.transform.rotation + degrees).rem_euclid(360.0);
                }
            }
            Ok(())
        })
    }

    fn reorder_selection(&mut self, doc: &mut DocumentModel, op: ZOrder) -> CardResult<()> {
        self.tool.require(self.tool.can_reorder(), "reorder")?;
        let design = doc.design(self.side);
        let mut ordered: Vec<_> = self
            .unlocked(design)
            .into_iter()
            .filter_map(|id| design.element(&id).map(|e| (e.transform.z_index, id)))
            .collect();
        ordered.sort_by_key(|(z, _)| *z);
        // Order of application keeps the group's own stacking intact.
        if matches!(op, ZOrder::StepForward | ZOrder::SendToBack) {
            ordered.reverse();
        }
        doc.mutate_design(self.side, "reorder", |design| {
            for (_, id) in &ordered {
                design.reorder(id, op)?;
            }
            Ok(())
        })
    }

    /// Raise the selection above every other element.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot reorder.
    pub fn bring_to_front(&mut self, doc: &mut DocumentModel) -> CardResult<()> {
        self.reorder_selection(doc, ZOrder::BringToFront)
    }

    /// Lower the selection below every other element.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot reorder.
    pub fn send_to_back(&mut self, doc: &mut DocumentModel) -> CardResult<()> {
        self.reorder_selection(doc, ZOrder::SendToBack)
    }

    /// Raise the selection one step.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot reorder.
    pub fn step_forward(&mut self, doc: &mut DocumentModel) -> CardResult<()> {
        self.reorder_selection(doc, ZOrder::StepForward)
    }

    /// Lower the selection one step.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot reorder.
    pub fn step_backward(&mut self, doc: &mut DocumentModel) -> CardResult<()> {
        self.reorder_selection(doc, ZOrder::StepBackward)
    }

    /// Lock or unlock every selected element.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] when the active tool cannot lock.
    pub fn set_selection_locked(&mut self, doc: &mut DocumentModel, locked: bool) -> CardResult<()> {
        self.tool.require(self.tool.can_lock(), "lock")?;
        let ids = self.selection.clone();
        doc.mutate_design(self.side, "lock", |design| {
            for id in &ids {
                if let Some(element) = design.element_mut(id) {
                    element.locked = locked;
                }
            }
            Ok(())
        })
    }

    /// Set or clear the crop of the single selected image.
    ///
    /// # Errors
    ///
    /// [`CardError::InvalidOperation`] unless the crop tool is active and
    /// exactly one image is selected; [`CardError::Validation`] for a crop
    /// outside the unit square.
    pub fn set_crop(&mut self, doc: &mut DocumentModel, crop: Option<CropRect>) -> CardResult<()> {
        self.tool.require(self.tool == Tool::Crop, "crop")?;
        let [id] = self.selection.as_slice() else {
            return Err(CardError::InvalidOperation(
                "crop needs exactly one selected image".to_string(),
            ));
        };
        let id = id.clone();
        doc.mutate_design(self.side, "crop", |design| {
            let element = design
                .element_mut(&id)
                .ok_or_else(|| CardError::NotFound(format!("element {id}")))?;
            if element.locked {
                return Ok(());
            }
            match &mut element.kind {
                ElementKind::Image { crop: slot, .. } => {
                    *slot = crop;
                    Ok(())
                }
                other => Err(CardError::InvalidOperation(format!(
                    "cannot crop a {} element",
                    other.type_name()
                ))),
            }
        })
    }
}
