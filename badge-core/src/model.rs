//! The editing session: one project, its history and every mutation on it.
//!
//! All changes go through [`DocumentModel`]. Each successful operation that
//! alters the project records exactly one history snapshot; a failing
//! operation restores the previous state and records nothing.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::config::EditorConfig;
use crate::document::{Background, SecurityFeatures, ZOrder};
use crate::history::History;
use crate::variables::initialize_project_variables;
use crate::{
    CardError, CardResult, Design, Dimensions, Element, ElementId, ElementKind, Project, Side,
    Transform, Variable,
};

/// Element fields a patch may never touch.
const IMMUTABLE_FIELDS: [&str; 3] = ["id", "type", "zIndex"];

/// Element fields a locked element still accepts.
const LOCK_EXEMPT_FIELDS: [&str; 2] = ["locked", "visible"];

/// Owns a project for one editing session.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    project: Project,
    history: History,
    config: EditorConfig,
}

impl DocumentModel {
    /// Start a session on an existing project.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the project breaks an invariant.
    pub fn new(mut project: Project, config: EditorConfig) -> CardResult<Self> {
        project.validate()?;
        for side in Side::BOTH {
            project.design_mut(side).normalize_z_order();
        }
        Ok(Self {
            history: History::with_depth(config.history_depth),
            project,
            config,
        })
    }

    /// Start a session from persisted project JSON.
    ///
    /// # Errors
    ///
    /// Fails without repair on malformed JSON or an invalid document.
    pub fn load(json: &str, config: EditorConfig) -> CardResult<Self> {
        let project = Project::from_json(json)?;
        tracing::debug!("Loaded project {} (version {})", project.id, project.version);
        Self::new(project, config)
    }

    /// Bump the version, stamp the save time and return the project JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn save(&mut self) -> CardResult<String> {
        self.project.version += 1;
        self.project.updated_at = Utc::now();
        tracing::debug!("Saving project {} as version {}", self.project.id, self.project.version);
        self.project.to_json()
    }

    /// Immutable copy of the current project for export jobs.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Project> {
        Arc::new(self.project.clone())
    }

    /// The current project.
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// One side of the current project.
    #[must_use]
    pub fn design(&self, side: Side) -> &Design {
        self.project.design(side)
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Undo/redo state.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run a change transactionally.
    ///
    /// The project is restored if `f` fails or leaves an invalid document.
    fn mutate<R>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Project) -> CardResult<R>,
    ) -> CardResult<R> {
        let before = self.project.clone();
        let result = f(&mut self.project).and_then(|value| {
            self.project.validate()?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                if self.project != before {
                    tracing::debug!(operation, "Document changed");
                    self.history.record(before);
                }
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(operation, error = %err, "Document change rejected");
                self.project = before;
                Err(err)
            }
        }
    }

    /// Run a change on one side.
    pub(crate) fn mutate_design<R>(
        &mut self,
        side: Side,
        operation: &str,
        f: impl FnOnce(&mut Design) -> CardResult<R>,
    ) -> CardResult<R> {
        self.mutate(operation, |project| f(project.design_mut(side)))
    }

    // --- elements ---

    /// Create an element on top of the z-order and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the element is invalid.
    pub fn create_element(
        &mut self,
        side: Side,
        kind: ElementKind,
        transform: Transform,
    ) -> CardResult<ElementId> {
        self.insert_element(side, Element::new(kind).with_transform(transform))
    }

    /// Insert a fully built element on top of the z-order.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for an invalid element or a clashing id.
    pub fn insert_element(&mut self, side: Side, mut element: Element) -> CardResult<ElementId> {
        let id = element.id.clone();
        self.mutate_design(side, "create_element", |design| {
            design.normalize_z_order();
            element.transform.z_index = design.top_z_index();
            design.elements.push(element);
            Ok(())
        })?;
        Ok(id)
    }

    /// Apply a JSON merge patch to an element's serialized form.
    ///
    /// Locked elements only take the `locked` and `visible` fields of the
    /// patch; everything else is dropped.
    ///
    /// # Errors
    ///
    /// [`CardError::NotFound`] for an unknown element, [`CardError::Validation`]
    /// when the patch is not an object, touches `id`/`type`/`zIndex`, or
    /// produces an invalid element.
    pub fn update_element(&mut self, side: Side, id: &ElementId, patch: &Value) -> CardResult<()> {
        let Value::Object(fields) = patch else {
            return Err(CardError::validation("element patch must be a JSON object"));
        };
        if let Some(field) = IMMUTABLE_FIELDS.iter().find(|f| fields.contains_key(**f)) {
            return Err(CardError::validation(format!("field {field} cannot be patched")));
        }
        self.mutate_design(side, "update_element", |design| {
            let element = find_mut(design, side, id)?;
            let mut fields = fields.clone();
            if element.locked {
                fields.retain(|key, _| LOCK_EXEMPT_FIELDS.contains(&key.as_str()));
            }
            let mut current = serde_json::to_value(&*element)?;
            let patch = Value::Object(fields);
            merge_patch(&mut current, &patch);
            let mut updated: Element = serde_json::from_value(current)
                .map_err(|e| CardError::validation(format!("invalid patch: {e}")))?;
            updated.validate()?;
            refit_line(&mut updated, element, &patch);
            *element = updated;
            Ok(())
        })
    }

    /// Remove an element and return it.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown element.
    pub fn remove_element(&mut self, side: Side, id: &ElementId) -> CardResult<Element> {
        self.mutate_design(side, "remove_element", |design| {
            let index = design
                .elements
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| not_found(side, id))?;
            let removed = design.elements.remove(index);
            design.normalize_z_order();
            Ok(removed)
        })
    }

    /// Clone an element under a new id, offset and placed on top.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown element.
    pub fn duplicate(&mut self, side: Side, id: &ElementId) -> CardResult<ElementId> {
        let offset = self.config.duplicate_offset_mm;
        self.mutate_design(side, "duplicate", |design| {
            let mut copy = find_mut(design, side, id)?.clone();
            copy.id = ElementId::new();
            copy.translate(offset, offset);
            design.normalize_z_order();
            copy.transform.z_index = design.top_z_index();
            let new_id = copy.id.clone();
            design.elements.push(copy);
            Ok(new_id)
        })
    }

    /// Show or hide an element. Allowed on locked elements.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown element.
    pub fn set_visibility(&mut self, side: Side, id: &ElementId, visible: bool) -> CardResult<()> {
        self.mutate_design(side, "set_visibility", |design| {
            find_mut(design, side, id)?.visible = visible;
            Ok(())
        })
    }

    /// Lock or unlock an element.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown element.
    pub fn set_locked(&mut self, side: Side, id: &ElementId, locked: bool) -> CardResult<()> {
        self.mutate_design(side, "set_locked", |design| {
            find_mut(design, side, id)?.locked = locked;
            Ok(())
        })
    }

    /// Change the stacking position of one element.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown element.
    pub fn reorder(&mut self, side: Side, id: &ElementId, op: ZOrder) -> CardResult<()> {
        self.mutate_design(side, "reorder", |design| design.reorder(id, op))
    }

    // --- project-level settings ---

    /// Change the card size and resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for non-positive values or when an
    /// existing bleed/safe area would no longer fit.
    pub fn set_dimensions(&mut self, dimensions: Dimensions) -> CardResult<()> {
        self.mutate("set_dimensions", |project| {
            project.dimensions = dimensions;
            Ok(())
        })
    }

    /// Replace a side's background.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like every other mutation.
    pub fn set_background(&mut self, side: Side, background: Background) -> CardResult<()> {
        self.mutate_design(side, "set_background", |design| {
            design.background = background;
            Ok(())
        })
    }

    /// Set a side's bleed margin in mm.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] outside `0..=min(width, height) / 2`.
    pub fn set_bleed(&mut self, side: Side, mm: f64) -> CardResult<()> {
        self.mutate_design(side, "set_bleed", |design| {
            design.bleed = mm;
            Ok(())
        })
    }

    /// Set a side's safe-area inset in mm.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] outside `0..=min(width, height) / 2`.
    pub fn set_safe_area(&mut self, side: Side, mm: f64) -> CardResult<()> {
        self.mutate_design(side, "set_safe_area", |design| {
            design.safe_area = mm;
            Ok(())
        })
    }

    /// Replace the security feature flags.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like every other mutation.
    pub fn set_security(&mut self, security: SecurityFeatures) -> CardResult<()> {
        self.mutate("set_security", |project| {
            project.security = security;
            Ok(())
        })
    }

    // --- variables ---

    /// Add a variable.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for a bad or duplicate name.
    pub fn add_variable(&mut self, variable: Variable) -> CardResult<()> {
        self.mutate("add_variable", |project| {
            project.variables.push(variable);
            Ok(())
        })
    }

    /// Replace the variable currently named `name`.
    ///
    /// # Errors
    ///
    /// [`CardError::NotFound`] if no such variable exists,
    /// [`CardError::Validation`] if the replacement breaks naming rules.
    pub fn update_variable(&mut self, name: &str, variable: Variable) -> CardResult<()> {
        self.mutate("update_variable", |project| {
            let slot = project
                .variables
                .iter_mut()
                .find(|v| v.name == name)
                .ok_or_else(|| CardError::NotFound(format!("variable {name}")))?;
            *slot = variable;
            Ok(())
        })
    }

    /// Remove a variable by name.
    ///
    /// Tokens referencing it stay in the design and render as unknown tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] if no such variable exists.
    pub fn remove_variable(&mut self, name: &str) -> CardResult<Variable> {
        self.mutate("remove_variable", |project| {
            let index = project
                .variables
                .iter()
                .position(|v| v.name == name)
                .ok_or_else(|| CardError::NotFound(format!("variable {name}")))?;
            Ok(project.variables.remove(index))
        })
    }

    /// Seed the default variable set when the project has none.
    ///
    /// Returns whether anything was added.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the seeded names are valid identifiers.
    pub fn initialize_project_variables(&mut self) -> CardResult<bool> {
        self.mutate("initialize_project_variables", |project| {
            Ok(initialize_project_variables(project))
        })
    }

    // --- history ---

    /// Open a continuous gesture; edits until [`Self::commit_gesture`] undo as one step.
    pub fn begin_gesture(&mut self) -> bool {
        self.history.begin_gesture(&self.project)
    }

    /// Close the open gesture. Returns whether a snapshot was recorded.
    pub fn commit_gesture(&mut self) -> bool {
        self.history.commit_gesture(&self.project)
    }

    /// Abort the open gesture and restore the state it started from.
    ///
    /// Returns whether a gesture was open.
    pub fn cancel_gesture(&mut self) -> bool {
        match self.history.cancel_gesture() {
            Some(start) => {
                self.restore(start);
                true
            }
            None => false,
        }
    }

    /// Step back one snapshot. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.commit_gesture();
        match self.history.undo(self.project.clone()) {
            Some(previous) => {
                self.restore(previous);
                tracing::debug!("Undo ({} steps left)", self.history.undo_depth());
                true
            }
            None => false,
        }
    }

    /// Step forward one snapshot. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.commit_gesture();
        match self.history.redo(self.project.clone()) {
            Some(next) => {
                self.restore(next);
                tracing::debug!("Redo ({} steps left)", self.history.redo_depth());
                true
            }
            None => false,
        }
    }

    /// Replace the content with a snapshot, keeping the save bookkeeping.
    fn restore(&mut self, mut snapshot: Project) {
        snapshot.version = self.project.version;
        snapshot.created_at = self.project.created_at;
        snapshot.updated_at = self.project.updated_at;
        self.project = snapshot;
    }
}

fn not_found(side: Side, id: &ElementId) -> CardError {
    CardError::NotFound(format!("element {id} on {side}"))
}

fn find_mut<'a>(design: &'a mut Design, side: Side, id: &ElementId) -> CardResult<&'a mut Element> {
    design.element_mut(id).ok_or_else(|| not_found(side, id))
}

/// Keep a patched line's box spanning both of its end points.
///
/// Box fields move or rescale the line as a whole; `x2`/`y2` move only the
/// end point.
fn refit_line(updated: &mut Element, before: &Element, patch: &Value) {
    let ElementKind::Line { x2, y2, .. } = updated.kind else {
        return;
    };
    let mut placed = before.clone();
    placed.set_bounds(updated.bounds());
    let Some((start, (mut end_x, mut end_y))) = placed.line_points() else {
        return;
    };
    if patch.get("x2").is_some() {
        end_x = x2;
    }
    if patch.get("y2").is_some() {
        end_y = y2;
    }
    updated.set_line_points(start, (end_x, end_y));
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_fields) = target {
        for (key, value) in patch_fields {
            if value.is_null() {
                target_fields.remove(key);
            } else {
                merge_patch(
                    target_fields.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rect;
    use serde_json::json;

    fn model() -> DocumentModel {
        DocumentModel::new(Project::cr80("Test"), EditorConfig::default()).expect("valid project")
    }

    fn label(content: &str) -> ElementKind {
        ElementKind::Text {
            content: content.to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 10.0,
            color: "#000000".to_string(),
            align: crate::TextAlign::Left,
            bold: false,
        }
    }

    #[test]
    fn test_create_places_on_top() {
        let mut doc = model();
        let a = doc
            .create_element(Side::Recto, label("a"), Transform::at(1.0, 1.0, 10.0, 5.0))
            .expect("create");
        let b = doc
            .create_element(Side::Recto, label("b"), Transform::at(1.0, 1.0, 10.0, 5.0))
            .expect("create");
        let design = doc.design(Side::Recto);
        assert_eq!(design.element(&a).map(|e| e.transform.z_index), Some(0));
        assert_eq!(design.element(&b).map(|e| e.transform.z_index), Some(1));
        assert_eq!(doc.history().undo_depth(), 2);
    }

    #[test]
    fn test_update_merges_patch() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("Hi"), Transform::default())
            .expect("create");
        doc.update_element(Side::Recto, &id, &json!({"content": "Bye", "x": 7.5}))
            .expect("update");
        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert_eq!(element.kind.bindable_text(), Some("Bye"));
        assert!((element.transform.x - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_rejects_immutable_fields() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("Hi"), Transform::default())
            .expect("create");
        for patch in [json!({"type": "circle"}), json!({"zIndex": 5}), json!({"id": "x"})] {
            assert!(matches!(
                doc.update_element(Side::Recto, &id, &patch),
                Err(CardError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_invalid_update_leaves_state_unchanged() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("Hi"), Transform::default())
            .expect("create");
        let before = doc.project().clone();
        let depth = doc.history().undo_depth();

        let result = doc.update_element(Side::Recto, &id, &json!({"fontSize": -3}));
        assert!(matches!(result, Err(CardError::Validation(_))));
        assert_eq!(doc.project(), &before);
        assert_eq!(doc.history().undo_depth(), depth);
    }

    #[test]
    fn test_locked_element_ignores_content_patch() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("Fixed"), Transform::default())
            .expect("create");
        doc.set_locked(Side::Recto, &id, true).expect("lock");
        let depth = doc.history().undo_depth();

        doc.update_element(Side::Recto, &id, &json!({"content": "Changed", "x": 40}))
            .expect("no-op");
        assert_eq!(doc.history().undo_depth(), depth);

        doc.update_element(Side::Recto, &id, &json!({"visible": false}))
            .expect("visibility allowed");
        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert!(!element.visible);
        assert_eq!(element.kind.bindable_text(), Some("Fixed"));
    }

    #[test]
    fn test_unknown_element_is_not_found() {
        let mut doc = model();
        let ghost = ElementId::from("ghost");
        assert!(doc.remove_element(Side::Verso, &ghost).unwrap_err().is_not_found());
        assert!(doc.duplicate(Side::Verso, &ghost).unwrap_err().is_not_found());
        assert!(!doc.history().can_undo());
    }

    #[test]
    fn test_duplicate_offsets_and_stacks() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Verso, label("x"), Transform::at(10.0, 10.0, 5.0, 5.0))
            .expect("create");
        let copy = doc.duplicate(Side::Verso, &id).expect("duplicate");
        let design = doc.design(Side::Verso);
        let copy = design.element(&copy).expect("copy exists");
        assert_ne!(copy.id, id);
        assert!((copy.transform.x - 12.0).abs() < 1e-9);
        assert_eq!(copy.transform.z_index, 1);
    }

    #[test]
    fn test_remove_renormalizes() {
        let mut doc = model();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                doc.create_element(Side::Recto, label(&i.to_string()), Transform::default())
                    .expect("create")
            })
            .collect();
        doc.remove_element(Side::Recto, &ids[0]).expect("remove");
        assert!(doc.design(Side::Recto).has_contiguous_z_order());
    }

    #[test]
    fn test_noop_mutation_records_nothing() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("x"), Transform::default())
            .expect("create");
        let depth = doc.history().undo_depth();
        doc.set_visibility(Side::Recto, &id, true).expect("visible already");
        assert_eq!(doc.history().undo_depth(), depth);
    }

    #[test]
    fn test_undo_redo_keeps_version() {
        let mut doc = model();
        doc.create_element(Side::Recto, label("x"), Transform::default())
            .expect("create");
        doc.save().expect("save");
        assert_eq!(doc.project().version, 1);

        assert!(doc.undo());
        assert!(doc.design(Side::Recto).elements.is_empty());
        assert_eq!(doc.project().version, 1);
        assert!(doc.redo());
        assert_eq!(doc.design(Side::Recto).elements.len(), 1);
    }

    #[test]
    fn test_cancel_gesture_restores() {
        let mut doc = model();
        let id = doc
            .create_element(Side::Recto, label("x"), Transform::at(0.0, 0.0, 5.0, 5.0))
            .expect("create");
        assert!(doc.begin_gesture());
        doc.update_element(Side::Recto, &id, &json!({"x": 20})).expect("move");
        assert!(doc.cancel_gesture());
        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert!(element.transform.x.abs() < f64::EPSILON);
        assert_eq!(doc.history().undo_depth(), 1);
    }

    #[test]
    fn test_bleed_outside_range_rejected() {
        let mut doc = model();
        assert!(doc.set_bleed(Side::Recto, 40.0).is_err());
        doc.set_bleed(Side::Recto, 3.0).expect("bleed");
        assert!((doc.design(Side::Recto).bleed - 3.0).abs() < f64::EPSILON);
        // Shrinking the card below twice the bleed is refused.
        let tiny = Dimensions {
            width: 5.0,
            height: 5.0,
            dpi: 300.0,
        };
        assert!(doc.set_dimensions(tiny).is_err());
    }

    #[test]
    fn test_variable_management() {
        let mut doc = model();
        assert!(doc.initialize_project_variables().expect("seed"));
        assert!(!doc.initialize_project_variables().expect("seed twice"));

        let duplicate = Variable::new("name", crate::VariableType::Text);
        assert!(doc.add_variable(duplicate).is_err());
        assert!(doc.add_variable(Variable::new("bad name", crate::VariableType::Text)).is_err());

        doc.update_variable("company", Variable::new("employer", crate::VariableType::Text))
            .expect("rename");
        assert!(doc.project().variable("employer").is_some());
        assert!(doc.remove_variable("company").unwrap_err().is_not_found());
    }

    fn line_from(doc: &mut DocumentModel, start: (f64, f64), end: (f64, f64)) -> ElementId {
        doc.create_element(
            Side::Recto,
            ElementKind::Line {
                x2: end.0,
                y2: end.1,
                stroke: "#000000".to_string(),
                stroke_width: 0.5,
            },
            Transform::at(start.0, start.1, 0.0, 0.0),
        )
        .expect("create")
    }

    #[test]
    fn test_line_patch_refits_box() {
        let mut doc = model();
        let id = line_from(&mut doc, (5.0, 5.0), (15.0, 5.0));
        doc.update_element(Side::Recto, &id, &json!({"x2": 35.0, "y2": 25.0}))
            .expect("update");
        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert!((element.transform.width - 30.0).abs() < 1e-9);
        assert!((element.transform.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_end_before_start_refits_box() {
        let mut doc = model();
        let id = line_from(&mut doc, (10.0, 8.0), (30.0, 8.0));
        doc.update_element(Side::Recto, &id, &json!({"x2": 0.0}))
            .expect("update");

        let design = doc.design(Side::Recto);
        let element = design.element(&id).expect("exists");
        assert_eq!(element.bounds(), Rect::new(0.0, 8.0, 10.0, 0.0));
        assert_eq!(element.line_points(), Some(((10.0, 8.0), (0.0, 8.0))));
        assert_eq!(design.element_at(5.0, 8.0), Some(&id));
    }

    #[test]
    fn test_line_position_patch_moves_both_points() {
        let mut doc = model();
        let id = line_from(&mut doc, (10.0, 8.0), (30.0, 18.0));
        doc.update_element(Side::Recto, &id, &json!({"x": 20.0}))
            .expect("update");

        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert_eq!(element.line_points(), Some(((20.0, 8.0), (40.0, 18.0))));
        assert_eq!(element.bounds(), Rect::new(20.0, 8.0, 20.0, 10.0));
    }

    #[test]
    fn test_created_line_keeps_its_end_point() {
        let mut doc = model();
        let id = line_from(&mut doc, (40.0, 5.0), (12.0, 30.0));
        let element = doc.design(Side::Recto).element(&id).expect("exists");
        assert_eq!(element.line_points(), Some(((40.0, 5.0), (12.0, 30.0))));
        assert_eq!(element.bounds(), Rect::new(12.0, 5.0, 28.0, 25.0));
    }
}
