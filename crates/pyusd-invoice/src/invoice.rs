use alloy::primitives::{Address, B256, U256};

use crate::amount::parse_atomic;
use crate::InvoiceError;

/// A merchant-authored payment request.
///
/// Built by [`crate::InvoiceGenerator`] or [`crate::codec::decode`]; treat it
/// as a value, never patch fields in place after it has been encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Wire format revision, e.g. `pyusd-invoice-1`.
    pub version: String,
    pub chain_id: u64,
    pub token: Address,
    pub merchant: Address,
    /// Merchant-facing decimal amount, e.g. `"12.5"`.
    pub amount: String,
    /// `amount` scaled to atomic token units, e.g. `"12500000"`.
    pub amount_wei: String,
    pub invoice_id: B256,
    /// Free text. Never used for settlement decisions.
    pub note: String,
    /// Unix seconds; `0` disables the expiry check.
    pub expires_at: u64,
}

impl Invoice {
    /// The transfer amount in atomic units.
    pub fn atomic_amount(&self) -> Result<U256, InvoiceError> {
        parse_atomic(&self.amount_wei).map_err(|e| InvoiceError::InvalidAmount(e.to_string()))
    }

    pub fn has_expiry(&self) -> bool {
        self.expires_at != 0
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.has_expiry() && now >= self.expires_at
    }
}

/// Generate a fresh invoice id: 16 random bytes (UUIDv4) right-padded to bytes32.
pub fn new_invoice_id() -> B256 {
    let mut id = B256::ZERO;
    id[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    id
}

/// Parse a `0x`-prefixed 20-byte hex address.
///
/// All-lowercase and all-uppercase input is accepted as-is. Mixed-case input
/// must carry a valid EIP-55 checksum, so a single mistyped character in a
/// checksummed address is caught before any funds move.
pub fn parse_address(input: &str) -> Result<Address, InvoiceError> {
    let invalid = |why: &str| InvoiceError::InvalidAddress(format!("'{input}' {why}"));

    let hex = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| invalid("is missing the 0x prefix"))?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("is not 20 bytes of hex"));
    }

    let address: Address = hex.parse().map_err(|_| invalid("is not 20 bytes of hex"))?;

    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *hex {
        return Err(invalid("has an invalid checksum"));
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip_case_of_first_letter(s: &str) -> String {
        let mut flipped = false;
        s.chars()
            .enumerate()
            .map(|(i, c)| {
                if !flipped && i >= 2 && c.is_ascii_alphabetic() {
                    flipped = true;
                    if c.is_ascii_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                } else {
                    c
                }
            })
            .collect()
    }

    #[test]
    fn test_parse_lowercase_address() {
        let addr = parse_address("0xbeda19e852341961789ef4d684098f80f155dcc7").unwrap();
        assert_eq!(addr, crate::DEFAULT_ROUTER);
    }

    #[test]
    fn test_parse_checksummed_address() {
        let checksummed = crate::DEFAULT_ROUTER.to_checksum(None);
        assert_eq!(parse_address(&checksummed).unwrap(), crate::DEFAULT_ROUTER);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let checksummed = crate::DEFAULT_ROUTER.to_checksum(None);
        let tampered = flip_case_of_first_letter(&checksummed);
        assert_ne!(tampered, checksummed);
        assert!(matches!(
            parse_address(&tampered),
            Err(InvoiceError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "0x",
            "beda19e852341961789ef4d684098f80f155dcc7",
            "0xbeda19e852341961789ef4d684098f80f155dc",
            "0xbeda19e852341961789ef4d684098f80f155dcc700",
            "0xzzda19e852341961789ef4d684098f80f155dcc7",
            "merchant.eth",
        ] {
            assert!(parse_address(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_invoice_ids_are_unique_and_padded() {
        let a = new_invoice_id();
        let b = new_invoice_id();
        assert_ne!(a, b);
        assert_eq!(&a[16..], &[0u8; 16]);
    }
}
