//! Integration tests for card export (badge-renderer).
//!
//! Covers physical sizing, duplex output, batch personalization with failing
//! records, cancellation, placeholders for unreadable content and the async
//! pipeline.

use std::sync::Arc;

use badge_core::{
    Background, Element, ElementKind, Project, RecordError, Side, TextAlign, Transform,
    Variable, VariableType, VariableValues,
};
use badge_renderer::{
    BackgroundMode, CancelFlag, CardExporter, ExportConfig, ExportPipeline, JobState,
    RecordFailure, RenderError,
};

fn exporter_at(dpi: f64) -> CardExporter {
    CardExporter::new(ExportConfig {
        dpi: Some(dpi),
        load_system_fonts: false,
        ..ExportConfig::default()
    })
}

fn two_tone_project() -> Project {
    let mut project = Project::cr80("Duplex");
    project.recto.background = Background::Color("#ff0000".to_string());
    project.verso.background = Background::Color("#0000ff".to_string());
    project
}

fn name_badge() -> Project {
    let mut project = Project::cr80("Conference");
    project
        .variables
        .push(Variable::new("name", VariableType::Text).required());
    project.recto.elements.push(
        Element::new(ElementKind::Text {
            content: "{name}".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 10.0,
            color: "#000000".to_string(),
            align: TextAlign::Left,
            bold: true,
        })
        .with_transform(Transform::at(5.0, 5.0, 60.0, 8.0)),
    );
    project
}

fn record(name: &str) -> VariableValues {
    let mut values = VariableValues::new();
    values.insert("name".to_string(), name.to_string());
    values
}

/// Count page objects (`/Type /Page`, not `/Type /Pages`).
fn count_pdf_pages(pdf: &[u8]) -> usize {
    let mut count = 0;
    let mut rest = pdf;
    while let Some(pos) = find(rest, b"/Type") {
        let mut after = &rest[pos + 5..];
        while after.first().is_some_and(u8::is_ascii_whitespace) {
            after = &after[1..];
        }
        if after.starts_with(b"/Page") && after.get(5) != Some(&b's') {
            count += 1;
        }
        rest = &rest[pos + 5..];
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ==========================================================================
// Physical sizing
// ==========================================================================

#[test]
fn test_cr80_png_at_300_dpi_doubled() {
    let mut project = Project::cr80("Size");
    project
        .variables
        .push(Variable::new("firstName", VariableType::Text).required());
    project.recto.elements.push(
        Element::new(ElementKind::Text {
            content: "Hello {firstName}".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 12.0,
            color: "#000000".to_string(),
            align: TextAlign::Left,
            bold: false,
        })
        .with_transform(Transform::at(5.0, 5.0, 60.0, 8.0)),
    );
    let mut values = VariableValues::new();
    values.insert("firstName".to_string(), "Ada".to_string());

    let exporter = CardExporter::new(ExportConfig {
        dpi: Some(300.0),
        multiplier: 2.0,
        load_system_fonts: false,
        ..ExportConfig::default()
    });
    let output = exporter
        .export_png(&project, Side::Recto, Some(&values))
        .expect("png");
    assert!(output.diagnostics.is_empty());

    let decoded = image::load_from_memory(&output.bytes).expect("decode png");
    assert_eq!((decoded.width(), decoded.height()), (2022, 1275));
}

#[test]
fn test_project_dpi_used_without_override() {
    let mut project = Project::cr80("Draft");
    project.dimensions.dpi = 150.0;
    let exporter = CardExporter::new(ExportConfig {
        load_system_fonts: false,
        ..ExportConfig::default()
    });
    assert_eq!(exporter.output_dimensions(&project), (506, 319));
}

#[test]
fn test_single_side_pdf() {
    let output = exporter_at(72.0)
        .export_pdf(&two_tone_project(), Side::Verso, None)
        .expect("pdf");
    assert!(output.bytes.starts_with(b"%PDF-"));
    assert_eq!(count_pdf_pages(&output.bytes), 1);
}

// ==========================================================================
// Duplex
// ==========================================================================

#[test]
fn test_duplex_sides_differ() {
    let project = two_tone_project();
    let exporter = exporter_at(72.0);

    let recto = exporter.rasterize(&project, Side::Recto, None).expect("recto");
    let verso = exporter.rasterize(&project, Side::Verso, None).expect("verso");
    assert_ne!(recto.pixmap.data(), verso.pixmap.data());

    let r = recto.pixmap.pixel(5, 5).expect("pixel");
    let v = verso.pixmap.pixel(5, 5).expect("pixel");
    assert_eq!((r.red(), r.blue()), (255, 0));
    assert_eq!((v.red(), v.blue()), (0, 255));
}

#[test]
fn test_duplex_pdf_has_two_pages() {
    let output = exporter_at(72.0)
        .export_duplex_pdf(&two_tone_project(), None)
        .expect("duplex");
    assert!(output.bytes.starts_with(b"%PDF-"));
    assert_eq!(count_pdf_pages(&output.bytes), 2);
}

// ==========================================================================
// Batch
// ==========================================================================

#[test]
fn test_batch_skips_failing_record() {
    let project = name_badge();
    let records = vec![
        record("Ada"),
        record("Grace"),
        VariableValues::new(),
        record("Edsger"),
        record("Barbara"),
    ];

    let report = exporter_at(72.0)
        .export_batch(&project, &records, false, &CancelFlag::new())
        .expect("batch");

    assert_eq!(report.pages, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert!(!report.cancelled);
    let pdf = report.pdf.as_deref().expect("pdf");
    assert_eq!(count_pdf_pages(pdf), 4);
    assert!(report.summary().contains("record 3: missing required variable(s): name"));
}

#[test]
fn test_control_characters_in_values_do_not_abort_batch() {
    let records = vec![
        record("Ada"),
        record("Gr\u{1}ace"),
        record("Edsger\u{c}"),
        record("Barbara"),
        record("Alan"),
    ];
    let report = exporter_at(72.0)
        .export_batch(&name_badge(), &records, false, &CancelFlag::new())
        .expect("batch");
    assert_eq!(report.pages, 5);
    assert!(report.failures.is_empty());
    assert!(report.pdf.is_some());
}

#[test]
fn test_rejected_record_reports_reason() {
    let report = exporter_at(72.0)
        .export_batch(
            &name_badge(),
            &[record("Ada"), VariableValues::new()],
            false,
            &CancelFlag::new(),
        )
        .expect("batch");
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        RecordFailure::Rejected(RecordError::MissingRequired { .. })
    ));
}

#[test]
fn test_duplex_batch_prints_both_sides_per_record() {
    let report = exporter_at(72.0)
        .export_batch(
            &name_badge(),
            &[record("Ada"), record("Grace")],
            true,
            &CancelFlag::new(),
        )
        .expect("batch");
    assert_eq!(report.pages, 4);
    assert!(report.failures.is_empty());
}

#[test]
fn test_batch_with_no_successful_record_has_no_pdf() {
    let report = exporter_at(72.0)
        .export_batch(
            &name_badge(),
            &[VariableValues::new(), VariableValues::new()],
            false,
            &CancelFlag::new(),
        )
        .expect("batch");
    assert!(report.pdf.is_none());
    assert_eq!(report.failures.len(), 2);
}

#[test]
fn test_cancelled_batch_stops_early() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = exporter_at(72.0)
        .export_batch(&name_badge(), &[record("Ada"), record("Grace")], false, &cancel)
        .expect("batch");
    assert!(report.cancelled);
    assert_eq!(report.pages, 0);
    assert!(report.pdf.is_none());
}

// ==========================================================================
// Placeholders
// ==========================================================================

#[test]
fn test_unreachable_image_becomes_placeholder() {
    let mut project = Project::cr80("Photo");
    let photo = Element::new(ElementKind::Image {
        src: "http://127.0.0.1:9/photo.png".to_string(),
        crop: None,
    })
    .with_transform(Transform::at(5.0, 5.0, 25.0, 30.0));
    let photo_id = photo.id.clone();
    project.recto.elements.push(photo);

    let output = exporter_at(72.0)
        .export_png(&project, Side::Recto, None)
        .expect("export still succeeds");

    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].element_id, Some(photo_id));
    assert_eq!(output.diagnostics[0].side, Side::Recto);

    let json = serde_json::to_value(&output.diagnostics[0]).expect("json");
    assert_eq!(json["side"], "recto");
    assert!(json["elementId"].is_string());
}

#[test]
fn test_solid_background_override() {
    let exporter = CardExporter::new(ExportConfig {
        dpi: Some(72.0),
        background: BackgroundMode::Solid("#00ff00".to_string()),
        load_system_fonts: false,
        ..ExportConfig::default()
    });
    let raster = exporter
        .rasterize(&two_tone_project(), Side::Recto, None)
        .expect("raster");
    let px = raster.pixmap.pixel(1, 1).expect("pixel");
    assert_eq!((px.red(), px.green(), px.blue()), (0, 255, 0));
}

// ==========================================================================
// Async pipeline
// ==========================================================================

#[tokio::test]
async fn test_pipeline_batch() {
    let pipeline = ExportPipeline::new(exporter_at(72.0));
    let report = pipeline
        .export_batch(
            Arc::new(name_badge()),
            vec![record("Ada"), VariableValues::new()],
            false,
            CancelFlag::new(),
        )
        .await
        .expect("batch");
    assert_eq!(report.pages, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(pipeline.state(), JobState::Success);
}

#[tokio::test]
async fn test_pipeline_strict_single_export_error() {
    let pipeline = ExportPipeline::new(exporter_at(72.0));
    let result = pipeline
        .export_duplex_pdf(Arc::new(name_badge()), Some(VariableValues::new()))
        .await;
    assert!(matches!(result, Err(RenderError::Record(_))));
    assert!(matches!(pipeline.state(), JobState::Failed(_)));

    let ok = pipeline
        .export_duplex_pdf(Arc::new(name_badge()), Some(record("Ada")))
        .await
        .expect("duplex");
    assert_eq!(count_pdf_pages(&ok.bytes), 2);
    assert_eq!(pipeline.state(), JobState::Success);
}
