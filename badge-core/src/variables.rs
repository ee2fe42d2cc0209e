//! `{token}` substitution for personalized previews and print runs.
//!
//! Tokens are `{identifier}` with `identifier` matching
//! `[A-Za-z_][A-Za-z0-9_]*`. They are recognised in text content and in
//! QR/barcode payloads. A token whose identifier names no project variable is
//! left in the output exactly as written.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Design, ElementId, Project, Side, Variable, VariableType};

/// Values for one personalization record, keyed by variable name.
pub type VariableValues = HashMap<String, String>;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid token regex"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Marker rendered in previews where a required value is missing.
#[must_use]
pub fn missing_marker(name: &str) -> String {
    format!("[\u{26a0} {name}]")
}

/// Whether `name` is a valid token identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Identifiers referenced by `{token}`s in `text`, in order of appearance.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    TOKEN
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Why a personalization record cannot be printed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Required variables had neither a value nor a default.
    #[error("missing required variable(s): {}", names.join(", "))]
    MissingRequired {
        /// Variable names, sorted.
        names: Vec<String>,
    },

    /// A value does not fit its variable type.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Human readable reason.
        reason: String,
    },
}

/// A non-fatal problem found while building a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewWarning {
    /// Element carrying the token.
    pub element_id: ElementId,
    /// Variable name.
    pub variable: String,
    /// What is wrong.
    pub message: String,
}

/// A substituted side ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// The side with every resolvable token replaced.
    pub design: Design,
    /// Problems to surface next to the preview.
    pub warnings: Vec<PreviewWarning>,
}

/// Seed the default variable set (name, email, qr, company).
///
/// Only acts on a project with no variables at all; returns whether anything
/// was added.
pub fn initialize_project_variables(project: &mut Project) -> bool {
    if !project.variables.is_empty() {
        return false;
    }
    project.variables = vec![
        Variable::new("name", VariableType::Text).required(),
        Variable::new("email", VariableType::Email),
        Variable::new("qr", VariableType::Qrcode),
        Variable::new("company", VariableType::Text),
    ];
    tracing::debug!(project = %project.id, "seeded default variables");
    true
}

/// Token identifiers referenced on one side, deduplicated and sorted.
#[must_use]
pub fn referenced_variables(project: &Project, side: Side) -> BTreeSet<String> {
    project
        .design(side)
        .elements
        .iter()
        .filter_map(|e| e.kind.bindable_text())
        .flat_map(tokens)
        .map(str::to_string)
        .collect()
}

/// Outcome of resolving one token.
enum Resolution {
    Value(String),
    Missing,
}

fn resolve(variable: &Variable, values: &VariableValues) -> Resolution {
    let supplied = values.get(&variable.name).filter(|v| !v.is_empty());
    if let Some(value) = supplied {
        return Resolution::Value(value.clone());
    }
    match variable.default_value.as_deref() {
        Some(default) if !default.is_empty() => Resolution::Value(default.to_string()),
        _ if variable.required => Resolution::Missing,
        _ => Resolution::Value(String::new()),
    }
}

fn check_type(variable: &Variable, value: &str) -> Result<(), String> {
    match variable.kind {
        VariableType::Number if !value.is_empty() && value.trim().parse::<f64>().is_err() => {
            Err(format!("{value:?} is not a number"))
        }
        VariableType::Email if !value.is_empty() => match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(format!("{value:?} is not an email address")),
        },
        _ => Ok(()),
    }
}

/// Problem collected while substituting one text.
enum Issue {
    Missing(String),
    Invalid { name: String, reason: String },
}

/// Replace every token in a single pass; replaced text is not re-scanned.
fn substitute(
    text: &str,
    variables: &[Variable],
    values: &VariableValues,
    preview: bool,
    issues: &mut Vec<Issue>,
) -> String {
    TOKEN
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            let Some(variable) = variables.iter().find(|v| v.name == name) else {
                return caps[0].to_string();
            };
            match resolve(variable, values) {
                Resolution::Value(value) => {
                    if let Err(reason) = check_type(variable, &value) {
                        issues.push(Issue::Invalid {
                            name: name.to_string(),
                            reason,
                        });
                    }
                    value
                }
                Resolution::Missing => {
                    issues.push(Issue::Missing(name.to_string()));
                    if preview {
                        missing_marker(name)
                    } else {
                        String::new()
                    }
                }
            }
        })
        .into_owned()
}

/// Substitute a single string against the project's variables.
///
/// Missing required values are rendered with [`missing_marker`]; this never
/// fails.
#[must_use]
pub fn substitute_text(project: &Project, text: &str, values: &VariableValues) -> String {
    let mut issues = Vec::new();
    substitute(text, &project.variables, values, true, &mut issues)
}

/// Build a preview of one side with `values` substituted.
///
/// Missing required values show a visible marker and produce a warning;
/// the preview itself always succeeds.
#[must_use]
pub fn render_preview(project: &Project, side: Side, values: &VariableValues) -> Preview {
    let mut design = project.design(side).clone();
    let mut warnings = Vec::new();
    for element in &mut design.elements {
        let Some(text) = element.kind.bindable_text_mut() else {
            continue;
        };
        let mut issues = Vec::new();
        *text = substitute(text, &project.variables, values, true, &mut issues);
        warnings.extend(issues.into_iter().map(|issue| match issue {
            Issue::Missing(name) => PreviewWarning {
                element_id: element.id.clone(),
                message: format!("required variable {name} has no value"),
                variable: name,
            },
            Issue::Invalid { name, reason } => PreviewWarning {
                element_id: element.id.clone(),
                variable: name,
                message: reason,
            },
        }));
    }
    Preview { design, warnings }
}

/// Build the print version of one side with `values` substituted.
///
/// Hidden elements are not printed, so their tokens are left as they are
/// and never fail the record.
///
/// # Errors
///
/// Returns [`RecordError::MissingRequired`] listing every required variable
/// referenced on this side that has neither a value nor a default, or
/// [`RecordError::InvalidValue`] for the first value that does not fit its
/// type.
pub fn render_for_export(
    project: &Project,
    side: Side,
    values: &VariableValues,
) -> Result<Design, RecordError> {
    let mut design = project.design(side).clone();
    let mut issues = Vec::new();
    for element in design.elements.iter_mut().filter(|e| e.visible) {
        if let Some(text) = element.kind.bindable_text_mut() {
            *text = substitute(text, &project.variables, values, false, &mut issues);
        }
    }

    let missing: BTreeSet<String> = issues
        .iter()
        .filter_map(|issue| match issue {
            Issue::Missing(name) => Some(name.clone()),
            Issue::Invalid { .. } => None,
        })
        .collect();
    if !missing.is_empty() {
        return Err(RecordError::MissingRequired {
            names: missing.into_iter().collect(),
        });
    }
    if let Some(Issue::Invalid { name, reason }) = issues
        .into_iter()
        .find(|issue| matches!(issue, Issue::Invalid { .. }))
    {
        return Err(RecordError::InvalidValue { name, reason });
    }
    Ok(design)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Element, ElementKind, TextAlign};

    fn text(content: &str) -> Element {
        Element::new(ElementKind::Text {
            content: content.to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 8.0,
            color: "#000".to_string(),
            align: TextAlign::Left,
            bold: false,
        })
    }

    fn project_with(content: &str) -> Project {
        let mut project = Project::cr80("Badge");
        project.variables = vec![
            Variable::new("firstName", VariableType::Text).required(),
            Variable::new("title", VariableType::Text).with_default("Guest"),
            Variable::new("badgeNo", VariableType::Number),
        ];
        project.recto.elements.push(text(content));
        project
    }

    fn values(pairs: &[(&str, &str)]) -> VariableValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn content_of(design: &Design) -> &str {
        design.elements[0].kind.bindable_text().unwrap_or_default()
    }

    #[test]
    fn test_tokens_grammar() {
        let found: Vec<_> = tokens("{a} {_b1} {1x} {with space} {ok_2}").collect();
        assert_eq!(found, vec!["a", "_b1", "ok_2"]);
        assert!(is_identifier("firstName"));
        assert!(!is_identifier("9lives"));
    }

    #[test]
    fn test_value_then_default() {
        let project = project_with("{firstName} - {title}");
        let design = render_for_export(&project, Side::Recto, &values(&[("firstName", "Jean")]))
            .expect("export");
        assert_eq!(content_of(&design), "Jean - Guest");
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let project = project_with("{firstName}");
        let vals = values(&[("firstName", "Jean")]);
        let once = substitute_text(&project, "{firstName}", &vals);
        let twice = substitute_text(&project, &once, &vals);
        assert_eq!(once, "Jean");
        assert_eq!(twice, "Jean");
    }

    #[test]
    fn test_unknown_token_passes_through() {
        let project = project_with("Hi {unknownVar}, {title}!");
        let design = render_for_export(&project, Side::Recto, &values(&[("unknownVar", "x")]))
            .expect("no required variable referenced");
        assert_eq!(content_of(&design), "Hi {unknownVar}, Guest!");
    }

    #[test]
    fn test_preview_marks_missing_required() {
        let project = project_with("Name: {firstName}");
        let preview = render_preview(&project, Side::Recto, &VariableValues::new());
        assert_eq!(
            content_of(&preview.design),
            format!("Name: {}", missing_marker("firstName"))
        );
        assert_eq!(preview.warnings.len(), 1);
        assert_eq!(preview.warnings[0].variable, "firstName");
    }

    #[test]
    fn test_export_missing_required_is_fatal() {
        let project = project_with("{firstName} {title}");
        let err = render_for_export(&project, Side::Recto, &values(&[("firstName", "")]))
            .expect_err("missing");
        assert_eq!(
            err,
            RecordError::MissingRequired {
                names: vec!["firstName".to_string()]
            }
        );
    }

    #[test]
    fn test_hidden_element_does_not_fail_export() {
        let mut project = project_with("{title}");
        let mut hidden = text("{firstName}");
        hidden.visible = false;
        project.recto.elements.push(hidden);

        let design = render_for_export(&project, Side::Recto, &VariableValues::new())
            .expect("hidden token is not required");
        assert_eq!(content_of(&design), "Guest");
        assert_eq!(design.elements[1].kind.bindable_text(), Some("{firstName}"));
    }

    #[test]
    fn test_number_type_checked() {
        let project = project_with("#{badgeNo}");
        let err = render_for_export(&project, Side::Recto, &values(&[("badgeNo", "12a")]))
            .expect_err("invalid");
        assert!(matches!(err, RecordError::InvalidValue { ref name, .. } if name == "badgeNo"));

        let preview = render_preview(&project, Side::Recto, &values(&[("badgeNo", "12a")]));
        assert_eq!(content_of(&preview.design), "#12a");
        assert_eq!(preview.warnings.len(), 1);
    }

    #[test]
    fn test_initialize_only_when_empty() {
        let mut project = Project::cr80("Fresh");
        assert!(initialize_project_variables(&mut project));
        let names: Vec<_> = project.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["name", "email", "qr", "company"]);

        assert!(!initialize_project_variables(&mut project));
        assert_eq!(project.variables.len(), 4);
    }

    #[test]
    fn test_referenced_variables() {
        let mut project = project_with("{firstName} {title} {firstName}");
        project.recto.elements.push(Element::new(ElementKind::Qrcode {
            data: "https://example.org/{badgeNo}".to_string(),
            color: "#000".to_string(),
        }));
        let refs: Vec<_> = referenced_variables(&project, Side::Recto)
            .into_iter()
            .collect();
        assert_eq!(refs, vec!["badgeNo", "firstName", "title"]);
    }
}
