//! SVG scene adapter.
//!
//! Projects one card side onto a self-contained SVG document whose user units
//! are millimetres. The scene is rebuilt from project data on every render and
//! owns no state of its own. Elements that cannot be drawn (unreadable
//! picture, unencodable symbol) are replaced by a placeholder and reported as
//! [`RenderDiagnostic`]s instead of failing the whole side.

use std::fmt::Write;

use badge_core::units::pt_to_mm;
use badge_core::{Background, Design, Element, ElementId, ElementKind, Project, Side, TextAlign};
use serde::Serialize;

use crate::error::RenderResult;
use crate::image::prepare_image;
use crate::symbol::{encode_barcode, encode_qr};

/// What fills the card behind the elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackgroundMode {
    /// Nothing; uncovered pixels stay transparent.
    Transparent,
    /// The side's own background color or image.
    #[default]
    Design,
    /// A fixed color, overriding the design background.
    Solid(String),
}

/// A non-fatal problem met while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDiagnostic {
    /// Side being rendered.
    pub side: Side,
    /// Element that was replaced by a placeholder; `None` for the background.
    pub element_id: Option<ElementId>,
    /// What went wrong.
    pub message: String,
}

/// Output size and background of a scene.
#[derive(Debug, Clone)]
pub struct SceneOptions<'a> {
    /// Output width in pixels.
    pub pixel_width: u32,
    /// Output height in pixels.
    pub pixel_height: u32,
    /// Background handling.
    pub background: &'a BackgroundMode,
}

/// A built SVG document plus everything that had to be substituted.
#[derive(Debug, Clone)]
pub struct Scene {
    /// SVG markup.
    pub svg: String,
    /// Placeholders drawn in place of failing content.
    pub diagnostics: Vec<RenderDiagnostic>,
}

const PLACEHOLDER_INK: &str = "#d32f2f";
const HOLOGRAM_STOPS: [&str; 4] = ["#ff6ec7", "#7afcff", "#feff9c", "#b28dff"];
/// Microtext size in points.
const MICROTEXT_PT: f64 = 0.6;
const LINE_HEIGHT: f64 = 1.2;

/// Build the SVG for one side of `project`, drawing the elements of `design`.
///
/// `design` is usually the side itself or its personalized copy.
#[must_use]
pub fn build_scene(
    project: &Project,
    side: Side,
    design: &Design,
    options: &SceneOptions<'_>,
) -> Scene {
    let dims = &project.dimensions;
    let (w, h) = (dims.width, dims.height);
    let px_per_mm = f64::from(options.pixel_width) / w;
    let mut diagnostics = Vec::new();

    let mut svg = String::with_capacity(8192);
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {w} {h}\" preserveAspectRatio=\"none\">",
        options.pixel_width, options.pixel_height,
    );

    match options.background {
        BackgroundMode::Transparent => {}
        BackgroundMode::Solid(color) => fill_rect(&mut svg, w, h, color),
        BackgroundMode::Design => match &design.background {
            Background::Color(color) => fill_rect(&mut svg, w, h, color),
            Background::Image(src) => {
                match prepare_image(src, None, options.pixel_width, options.pixel_height) {
                    Ok(uri) => {
                        let _ = write!(
                            svg,
                            "<image x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"xMidYMid slice\" xlink:href=\"{}\"/>",
                            escape_xml(&uri),
                        );
                    }
                    Err(err) => {
                        tracing::warn!(%side, error = %err, "Background image failed");
                        diagnostics.push(RenderDiagnostic {
                            side,
                            element_id: None,
                            message: err.to_string(),
                        });
                        fill_rect(&mut svg, w, h, "#ffffff");
                    }
                }
            }
        },
    }

    for element in design.paint_order().filter(|e| e.visible) {
        let body = element_svg(element, px_per_mm).unwrap_or_else(|err| {
            tracing::warn!(%side, element = %element.id, error = %err, "Element replaced by placeholder");
            diagnostics.push(RenderDiagnostic {
                side,
                element_id: Some(element.id.clone()),
                message: err.to_string(),
            });
            placeholder_svg(element)
        });
        let tf = &element.transform;
        if tf.rotation.abs() < f64::EPSILON {
            svg.push_str(&body);
        } else {
            let (cx, cy) = element.bounds().center();
            let _ = write!(
                svg,
                "<g transform=\"rotate({} {cx} {cy})\">{body}</g>",
                tf.rotation,
            );
        }
    }

    security_svg(&mut svg, project);

    svg.push_str("</svg>");
    Scene { svg, diagnostics }
}

fn fill_rect(svg: &mut String, w: f64, h: f64, color: &str) {
    let _ = write!(
        svg,
        "<rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" fill=\"{}\"/>",
        escape_xml(color),
    );
}

/// Stroke attributes, suppressed for zero widths.
fn stroke_attrs(stroke: &str, stroke_width: f64) -> String {
    if stroke_width > 0.0 {
        format!(
            "stroke=\"{}\" stroke-width=\"{stroke_width}\"",
            escape_xml(stroke)
        )
    } else {
        "stroke=\"none\"".to_string()
    }
}

/// Render a single element in document millimetres.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn element_svg(element: &Element, px_per_mm: f64) -> RenderResult<String> {
    let tf = &element.transform;
    let (x, y, w, h) = (tf.x, tf.y, tf.width, tf.height);
    let mut svg = String::new();

    match &element.kind {
        ElementKind::Text {
            content,
            font_family,
            font_size,
            color,
            align,
            bold,
        } => {
            let size = pt_to_mm(*font_size);
            let (anchor, ax) = match align {
                TextAlign::Left => ("start", x),
                TextAlign::Center => ("middle", x + w / 2.0),
                TextAlign::Right => ("end", x + w),
            };
            let weight = if *bold { "bold" } else { "normal" };
            let _ = write!(
                svg,
                "<text x=\"{ax}\" y=\"{}\" font-family=\"{}, sans-serif\" font-size=\"{size}\" font-weight=\"{weight}\" fill=\"{}\" text-anchor=\"{anchor}\">",
                y + size,
                escape_xml(font_family),
                escape_xml(color),
            );
            for (index, line) in content.split('\n').enumerate() {
                let dy = if index == 0 { 0.0 } else { size * LINE_HEIGHT };
                let _ = write!(svg, "<tspan x=\"{ax}\" dy=\"{dy}\">{}</tspan>", escape_xml(line));
            }
            svg.push_str("</text>");
        }

        ElementKind::Image { src, crop } => {
            let max_w = (w * px_per_mm).ceil().max(1.0) as u32;
            let max_h = (h * px_per_mm).ceil().max(1.0) as u32;
            let uri = prepare_image(src, crop.as_ref(), max_w, max_h)?;
            let _ = write!(
                svg,
                "<image x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"none\" xlink:href=\"{}\"/>",
                escape_xml(&uri),
            );
        }

        ElementKind::Qrcode { data, color } => {
            let matrix = encode_qr(data)?;
            #[allow(clippy::cast_precision_loss)]
            let module = w.min(h) / matrix.width as f64;
            #[allow(clippy::cast_precision_loss)]
            let side = module * matrix.width as f64;
            let ox = x + (w - side) / 2.0;
            let oy = y + (h - side) / 2.0;
            let mut path = String::new();
            for row in 0..matrix.width {
                for col in 0..matrix.width {
                    if matrix.is_dark(col, row) {
                        #[allow(clippy::cast_precision_loss)]
                        let (mx, my) = (ox + col as f64 * module, oy + row as f64 * module);
                        let _ = write!(path, "M{mx},{my}h{module}v{module}h-{module}z");
                    }
                }
            }
            let _ = write!(
                svg,
                "<path d=\"{path}\" fill=\"{}\" shape-rendering=\"crispEdges\"/>",
                escape_xml(color),
            );
        }

        ElementKind::Barcode {
            data,
            symbology,
            color,
        } => {
            let modules = encode_barcode(data, *symbology)?;
            #[allow(clippy::cast_precision_loss)]
            let module = w / modules.len() as f64;
            let ink = escape_xml(color);
            let mut start = None;
            // Trailing 0 closes a bar that runs to the end.
            for (i, bit) in modules.iter().chain(std::iter::once(&0)).enumerate() {
                match (bit, start) {
                    (1, None) => start = Some(i),
                    (0, Some(s)) => {
                        #[allow(clippy::cast_precision_loss)]
                        let (bx, bw) = (x + s as f64 * module, (i - s) as f64 * module);
                        let _ = write!(
                            svg,
                            "<rect x=\"{bx}\" y=\"{y}\" width=\"{bw}\" height=\"{h}\" fill=\"{ink}\"/>",
                        );
                        start = None;
                    }
                    _ => {}
                }
            }
        }

        ElementKind::Rectangle {
            fill,
            stroke,
            stroke_width,
            corner_radius,
        } => {
            let r = corner_radius.clamp(0.0, w.min(h) / 2.0);
            let _ = write!(
                svg,
                "<rect x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" rx=\"{r}\" ry=\"{r}\" fill=\"{}\" {}/>",
                escape_xml(fill),
                stroke_attrs(stroke, *stroke_width),
            );
        }

        ElementKind::Circle {
            fill,
            stroke,
            stroke_width,
        } => {
            let _ = write!(
                svg,
                "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"{}\" {}/>",
                x + w / 2.0,
                y + h / 2.0,
                w / 2.0,
                h / 2.0,
                escape_xml(fill),
                stroke_attrs(stroke, *stroke_width),
            );
        }

        ElementKind::Line {
            stroke,
            stroke_width,
            ..
        } => {
            if let Some(((x1, y1), (x2, y2))) = element.line_points() {
                let _ = write!(
                    svg,
                    "<line x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\" stroke-linecap=\"round\" {}/>",
                    stroke_attrs(stroke, *stroke_width),
                );
            }
        }
    }

    Ok(svg)
}

/// Hatched box marking content that could not be drawn.
fn placeholder_svg(element: &Element) -> String {
    let b = element.bounds();
    let stroke = (b.width.min(b.height) * 0.02).clamp(0.1, 0.5);
    format!(
        "<g><rect x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" fill=\"#f3f3f3\" stroke=\"{PLACEHOLDER_INK}\" stroke-width=\"{stroke}\" stroke-dasharray=\"{dash} {dash}\"/><path d=\"M{x},{y}L{r},{btm}M{r},{y}L{x},{btm}\" stroke=\"{PLACEHOLDER_INK}\" stroke-width=\"{stroke}\"/></g>",
        x = b.x,
        y = b.y,
        w = b.width,
        h = b.height,
        r = b.right(),
        btm = b.bottom(),
        dash = stroke * 4.0,
    )
}

/// Visible security overlays. `qrSecure` and `uvInk` only affect the print
/// process and draw nothing.
fn security_svg(svg: &mut String, project: &Project) {
    let security = &project.security;
    let (w, h) = (project.dimensions.width, project.dimensions.height);

    if security.hologram {
        let r = w.min(h) * 0.14;
        let (cx, cy) = (w - r * 1.4, r * 1.4);
        svg.push_str("<defs><linearGradient id=\"hologram\" x1=\"0\" y1=\"0\" x2=\"1\" y2=\"1\">");
        for (i, stop) in HOLOGRAM_STOPS.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let offset = i as f64 / (HOLOGRAM_STOPS.len() - 1) as f64;
            let _ = write!(svg, "<stop offset=\"{offset}\" stop-color=\"{stop}\"/>");
        }
        let _ = write!(
            svg,
            "</linearGradient></defs><circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"url(#hologram)\" fill-opacity=\"0.35\"/>",
        );
    }

    if security.watermark && !project.name.is_empty() {
        let size = h * 0.12;
        let (cx, cy) = (w / 2.0, h / 2.0);
        let _ = write!(
            svg,
            "<text x=\"{cx}\" y=\"{cy}\" font-family=\"sans-serif\" font-size=\"{size}\" font-weight=\"bold\" fill=\"#000000\" fill-opacity=\"0.08\" text-anchor=\"middle\" dominant-baseline=\"central\" transform=\"rotate(-30 {cx} {cy})\">{}</text>",
            escape_xml(&project.name),
        );
    }

    if security.microtext {
        let size = pt_to_mm(MICROTEXT_PT);
        let unit = format!("{} \u{2022} ", project.name.to_uppercase());
        #[allow(clippy::cast_precision_loss)]
        let unit_width = size * 0.55 * unit.chars().count().max(1) as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let repeats = ((w / unit_width).ceil() as usize + 1).min(2000);
        let band = unit.repeat(repeats);
        let _ = write!(
            svg,
            "<text x=\"0\" y=\"{}\" font-family=\"sans-serif\" font-size=\"{size}\" fill=\"#333333\">{}</text>",
            h - size * 2.0,
            escape_xml(&band),
        );
    }
}

/// Escape markup characters and drop characters XML 1.0 cannot carry.
fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {}
            c => out.push(c),
        }
    }
    out
}
