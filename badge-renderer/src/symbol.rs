//! QR code and linear barcode encoding.
//!
//! Symbols are encoded to plain module patterns here; the scene adapter turns
//! them into vector shapes sized to the element box.

use badge_core::Symbology;
use barcoders::sym::code128::Code128;
use barcoders::sym::code39::Code39;
use barcoders::sym::ean13::EAN13;
use qrcode::{Color, QrCode};

use crate::error::{RenderError, RenderResult};

/// Code 128 character set B selector understood by the encoder.
const CODE128_SET_B: char = '\u{181}';

/// Square module matrix of a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    /// Modules per side.
    pub width: usize,
    /// Row-major dark flags, `width * width` long.
    pub dark: Vec<bool>,
}

impl QrMatrix {
    /// Whether the module at column `x`, row `y` is dark.
    #[must_use]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.dark.get(y * self.width + x).copied().unwrap_or(false)
    }
}

/// Encode a QR payload.
///
/// # Errors
///
/// Returns [`RenderError::Symbol`] for an empty or oversized payload.
pub fn encode_qr(data: &str) -> RenderResult<QrMatrix> {
    if data.is_empty() {
        return Err(RenderError::Symbol("QR payload is empty".to_string()));
    }
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| RenderError::Symbol(format!("QR encoding failed: {e}")))?;
    let width = code.width();
    let dark = code
        .to_colors()
        .into_iter()
        .map(|color| color == Color::Dark)
        .collect();
    Ok(QrMatrix { width, dark })
}

/// Encode a barcode payload as a sequence of 1 (bar) and 0 (space) modules.
///
/// # Errors
///
/// Returns [`RenderError::Symbol`] when the payload is empty or contains
/// characters the symbology cannot represent.
pub fn encode_barcode(data: &str, symbology: Symbology) -> RenderResult<Vec<u8>> {
    if data.is_empty() {
        return Err(RenderError::Symbol("barcode payload is empty".to_string()));
    }
    let invalid = |e: barcoders::error::Error| {
        RenderError::Symbol(format!("{symbology:?} cannot encode {data:?}: {e}"))
    };
    match symbology {
        Symbology::Code128 => {
            let payload = format!("{CODE128_SET_B}{data}");
            Ok(Code128::new(payload.as_str()).map_err(invalid)?.encode())
        }
        Symbology::Code39 => {
            let payload = data.to_ascii_uppercase();
            Ok(Code39::new(payload.as_str()).map_err(invalid)?.encode())
        }
        Symbology::Ean13 => {
            let digits = ean13_digits(data)?;
            Ok(EAN13::new(digits.as_str()).map_err(invalid)?.encode())
        }
    }
}

/// Reduce an EAN-13 payload to its 12 data digits, checking a supplied check digit.
fn ean13_digits(data: &str) -> RenderResult<String> {
    if !data.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RenderError::Symbol(format!("EAN-13 needs digits only, got {data:?}")));
    }
    match data.len() {
        12 => Ok(data.to_string()),
        13 => {
            let (body, check) = data.split_at(12);
            let expected = ean13_check_digit(body);
            if check.bytes().next().map(|b| b - b'0') == Some(expected) {
                Ok(body.to_string())
            } else {
                Err(RenderError::Symbol(format!(
                    "EAN-13 check digit of {data} should be {expected}"
                )))
            }
        }
        n => Err(RenderError::Symbol(format!(
            "EAN-13 needs 12 or 13 digits, got {n}"
        ))),
    }
}

fn ean13_check_digit(body: &str) -> u8 {
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    // Always < 10.
    u8::try_from((10 - sum % 10) % 10).unwrap_or(0)
}
