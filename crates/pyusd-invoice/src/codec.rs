//! Invoice transport encodings.
//!
//! Two forms are produced for every invoice:
//!
//! - **JSON** ([`encode_json`]) carries every field and is the only form
//!   [`decode`] accepts.
//! - **Token-transfer URI** ([`PaymentUri`]) for generic wallet scanners:
//!   `ethereum:<token>/transfer?address=<merchant>&uint256=<amountWei>&chain_id=<chainId>`.
//!   It drops `invoiceId`, `note`, `expiresAt` and `version`, so a payment made
//!   from it is a plain transfer that the router never sees. Nothing in this
//!   crate parses it back into an [`Invoice`].

use std::fmt;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::invoice::parse_address;
use crate::{Invoice, InvoiceError, PROTOCOL_VERSION, URI_SCHEME};

/// Both transport encodings of one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInvoice {
    pub json: String,
    pub uri: PaymentUri,
}

/// Payment-routing data only; see the module docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUri {
    pub scheme: String,
    pub token: Address,
    pub merchant: Address,
    pub amount_wei: String,
    pub chain_id: u64,
}

impl PaymentUri {
    pub fn from_invoice(invoice: &Invoice, scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            token: invoice.token,
            merchant: invoice.merchant,
            amount_wei: invoice.amount_wei.clone(),
            chain_id: invoice.chain_id,
        }
    }
}

impl fmt::Display for PaymentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/transfer?address={}&uint256={}&chain_id={}",
            self.scheme,
            self.token.to_checksum(None),
            self.merchant.to_checksum(None),
            self.amount_wei,
            self.chain_id
        )
    }
}

/// JSON wire shape. Addresses and the id stay strings here so that each
/// field can fail with its own error kind.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInvoice {
    version: String,
    chain_id: u64,
    token: String,
    merchant: String,
    amount: String,
    amount_wei: String,
    invoice_id: String,
    #[serde(default)]
    note: String,
    #[serde(default)]
    expires_at: u64,
}

impl From<&Invoice> for RawInvoice {
    fn from(invoice: &Invoice) -> Self {
        Self {
            version: invoice.version.clone(),
            chain_id: invoice.chain_id,
            token: invoice.token.to_checksum(None),
            merchant: invoice.merchant.to_checksum(None),
            amount: invoice.amount.clone(),
            amount_wei: invoice.amount_wei.clone(),
            invoice_id: alloy::hex::encode_prefixed(invoice.invoice_id),
            note: invoice.note.clone(),
            expires_at: invoice.expires_at,
        }
    }
}

/// Encode an invoice into both transport forms.
pub fn encode(invoice: &Invoice) -> EncodedInvoice {
    EncodedInvoice {
        json: encode_json(invoice),
        uri: PaymentUri::from_invoice(invoice, URI_SCHEME),
    }
}

/// Full-fidelity JSON encoding (QR payload / clipboard text).
///
/// Keys follow the wire struct's declaration order, starting with `version`.
pub fn encode_json(invoice: &Invoice) -> String {
    serde_json::to_string(&RawInvoice::from(invoice)).unwrap_or_default()
}

/// The URI form with the default `ethereum` scheme.
pub fn encode_uri(invoice: &Invoice) -> String {
    PaymentUri::from_invoice(invoice, URI_SCHEME).to_string()
}

/// Decode scanned or pasted JSON text, expecting the current protocol version.
pub fn decode(text: &str) -> Result<Invoice, InvoiceError> {
    decode_versioned(text, PROTOCOL_VERSION)
}

/// Decode JSON text, expecting `version` to equal `expected_version`.
///
/// Structural checks only; semantic checks (amount, expiry) belong to
/// [`crate::validate`].
pub fn decode_versioned(text: &str, expected_version: &str) -> Result<Invoice, InvoiceError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| InvoiceError::MalformedPayload(format!("not valid JSON: {e}")))?;

    let Value::Object(fields) = &value else {
        return Err(InvoiceError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    match fields.get("version") {
        Some(Value::String(version)) if version == expected_version => {}
        Some(Value::String(version)) => {
            return Err(InvoiceError::UnsupportedVersion(format!(
                "'{version}' (expected '{expected_version}')"
            )))
        }
        Some(other) => {
            return Err(InvoiceError::UnsupportedVersion(format!(
                "{other} (expected '{expected_version}')"
            )))
        }
        None => {
            return Err(InvoiceError::UnsupportedVersion(format!(
                "missing (expected '{expected_version}')"
            )))
        }
    }

    let merchant = match fields.get("merchant") {
        Some(Value::String(s)) => parse_address(s)?,
        Some(_) => {
            return Err(InvoiceError::InvalidAddress(
                "merchant is not a string".to_string(),
            ))
        }
        None => {
            return Err(InvoiceError::InvalidAddress(
                "merchant is missing".to_string(),
            ))
        }
    };

    let raw: RawInvoice = serde_json::from_value(value)
        .map_err(|e| InvoiceError::MalformedPayload(e.to_string()))?;

    let token = parse_address(&raw.token)?;
    let invoice_id: B256 = raw.invoice_id.parse().map_err(|_| {
        InvoiceError::MalformedPayload(format!(
            "invoiceId '{}' is not a 32-byte hex string",
            raw.invoice_id
        ))
    })?;

    Ok(Invoice {
        version: raw.version,
        chain_id: raw.chain_id,
        token,
        merchant,
        amount: raw.amount,
        amount_wei: raw.amount_wei,
        invoice_id,
        note: raw.note,
        expires_at: raw.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_ROUTER, DEFAULT_TOKEN, SEPOLIA_CHAIN_ID};

    fn sample() -> Invoice {
        Invoice {
            version: PROTOCOL_VERSION.to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            token: DEFAULT_TOKEN,
            merchant: DEFAULT_ROUTER,
            amount: "12.5".to_string(),
            amount_wei: "12500000".to_string(),
            invoice_id: B256::repeat_byte(0xab),
            note: "table 4".to_string(),
            expires_at: 1_900_000_000,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let invoice = sample();
        assert_eq!(decode(&encode_json(&invoice)).unwrap(), invoice);
    }

    #[test]
    fn test_json_field_names() {
        let json: Value = serde_json::from_str(&encode_json(&sample())).unwrap();
        for key in [
            "version",
            "chainId",
            "token",
            "merchant",
            "amount",
            "amountWei",
            "invoiceId",
            "note",
            "expiresAt",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["chainId"], 11_155_111);
        assert_eq!(json["amountWei"], "12500000");
    }

    #[test]
    fn test_json_keys_in_wire_order() {
        let text = encode_json(&sample());
        assert!(text.starts_with("{\"version\":\"pyusd-invoice-1\",\"chainId\":"));

        let positions: Vec<usize> = [
            "\"version\"",
            "\"chainId\"",
            "\"token\"",
            "\"merchant\"",
            "\"amount\"",
            "\"amountWei\"",
            "\"invoiceId\"",
            "\"note\"",
            "\"expiresAt\"",
        ]
        .iter()
        .map(|key| text.find(key).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn test_uri_form_drops_invoice_fields() {
        let uri = encode_uri(&sample());
        assert_eq!(
            uri,
            format!(
                "ethereum:{}/transfer?address={}&uint256=12500000&chain_id=11155111",
                DEFAULT_TOKEN.to_checksum(None),
                DEFAULT_ROUTER.to_checksum(None)
            )
        );
        assert!(!uri.contains("abab"));
        assert!(!uri.contains("table"));
    }

    #[test]
    fn test_decoder_does_not_accept_uri_form() {
        let uri = encode_uri(&sample());
        assert!(matches!(
            decode(&uri),
            Err(InvoiceError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_trims_scanner_whitespace() {
        let text = format!("\n  {}  \r\n", encode_json(&sample()));
        assert_eq!(decode(&text).unwrap(), sample());
    }

    #[test]
    fn test_decode_specific_errors() {
        assert!(matches!(
            decode("not json"),
            Err(InvoiceError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode("[1, 2]"),
            Err(InvoiceError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode("{}"),
            Err(InvoiceError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode(r#"{"version":"other"}"#),
            Err(InvoiceError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode(r#"{"version":1}"#),
            Err(InvoiceError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_decode_bad_merchant() {
        let mut json: Value = serde_json::from_str(&encode_json(&sample())).unwrap();
        json["merchant"] = Value::String("0x1234".to_string());
        assert!(matches!(
            decode(&json.to_string()),
            Err(InvoiceError::InvalidAddress(_))
        ));

        json.as_object_mut().unwrap().remove("merchant");
        assert!(matches!(
            decode(&json.to_string()),
            Err(InvoiceError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_decode_bad_token() {
        let mut json: Value = serde_json::from_str(&encode_json(&sample())).unwrap();
        json["token"] = Value::String("PYUSD".to_string());
        assert!(matches!(
            decode(&json.to_string()),
            Err(InvoiceError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_decode_missing_fields_is_malformed() {
        let json = format!(
            r#"{{"version":"{PROTOCOL_VERSION}","merchant":"{}"}}"#,
            DEFAULT_ROUTER.to_checksum(None)
        );
        assert!(matches!(
            decode(&json),
            Err(InvoiceError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_uuid_invoice_id_is_malformed() {
        // Ids must be bytes32 for the router; a bare UUID string is not.
        let mut json: Value = serde_json::from_str(&encode_json(&sample())).unwrap();
        json["invoiceId"] = Value::String("0b7e1f7c-7f0e-4b53-9c43-5c1d1e0f4a11".to_string());
        assert!(matches!(
            decode(&json.to_string()),
            Err(InvoiceError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_defaults_optional_fields() {
        let mut json: Value = serde_json::from_str(&encode_json(&sample())).unwrap();
        let fields = json.as_object_mut().unwrap();
        fields.remove("note");
        fields.remove("expiresAt");
        let invoice = decode(&json.to_string()).unwrap();
        assert_eq!(invoice.note, "");
        assert_eq!(invoice.expires_at, 0);
    }
}
