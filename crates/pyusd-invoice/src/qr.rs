//! QR rendering of the JSON invoice payload.
//!
//! The QR carries exactly [`encode_json`] output, so whatever a payer's
//! scanner reads back goes straight into [`crate::codec::decode`].

use qrcode::render::unicode::Dense1x2;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

use crate::codec::encode_json;
use crate::Invoice;

/// An invoice's QR symbol together with the text it encodes.
pub struct InvoiceQr {
    payload: String,
    code: QrCode,
}

impl InvoiceQr {
    /// Encode at error-correction level M. Fails with `DataTooLong` when the
    /// note makes the payload exceed QR capacity.
    pub fn new(invoice: &Invoice) -> Result<Self, QrError> {
        let payload = encode_json(invoice);
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
        Ok(Self { payload, code })
    }

    /// The scanned text.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Modules per side, quiet zone excluded.
    pub fn width(&self) -> usize {
        self.code.width()
    }

    /// Half-block rendering for a terminal, light on dark, with quiet zone.
    pub fn render_terminal(&self) -> String {
        self.code
            .render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .quiet_zone(true)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::InvoiceGenerator;

    const MERCHANT: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn test_payload_decodes_to_same_invoice() {
        let invoice = InvoiceGenerator::new()
            .with_expiry(1_900_000_000)
            .generate(MERCHANT, "12.5", "table 4")
            .unwrap();
        let qr = InvoiceQr::new(&invoice).unwrap();

        assert_eq!(qr.payload(), encode_json(&invoice));
        assert_eq!(decode(qr.payload()).unwrap(), invoice);
    }

    #[test]
    fn test_render_terminal() {
        let invoice = InvoiceGenerator::new()
            .generate(MERCHANT, "1", "")
            .unwrap();
        let qr = InvoiceQr::new(&invoice).unwrap();
        let rendered = qr.render_terminal();

        // Two module rows per line, quiet zone included.
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines.len() > qr.width() / 2);
        let columns = lines[0].chars().count();
        assert!(columns > qr.width());
        assert!(lines.iter().all(|l| l.chars().count() == columns));
    }

    #[test]
    fn test_oversized_note_is_rejected() {
        let invoice = InvoiceGenerator::new()
            .generate(MERCHANT, "1", &"x".repeat(4_000))
            .unwrap();
        assert!(matches!(
            InvoiceQr::new(&invoice),
            Err(QrError::DataTooLong)
        ));
    }
}
