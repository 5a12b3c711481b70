use alloy::primitives::Address;

use crate::amount::{parse_atomic, parse_units};
use crate::{Invoice, InvoiceError, ProtocolConfig};

/// Validate an invoice against the default protocol configuration.
pub fn validate(invoice: &Invoice, now: u64) -> Result<(), InvoiceError> {
    validate_for(invoice, now, &ProtocolConfig::default())
}

/// Semantic invoice checks, in order, stopping at the first failure:
///
/// 1. `version` matches the configured protocol version
/// 2. `merchant` then `token` are non-zero addresses
/// 3. `amountWei` is a non-negative integer that equals `amount` scaled to
///    the token's decimals
/// 4. `expiresAt` is `0` or strictly after `now`
///
/// Pure: the same `(invoice, now)` always gives the same result. Run it when
/// an invoice is accepted and again right before paying, since time moves on
/// between the two.
pub fn validate_for(
    invoice: &Invoice,
    now: u64,
    config: &ProtocolConfig,
) -> Result<(), InvoiceError> {
    if invoice.version != config.version {
        return Err(InvoiceError::UnsupportedVersion(format!(
            "'{}' (expected '{}')",
            invoice.version, config.version
        )));
    }

    if invoice.merchant == Address::ZERO {
        return Err(InvoiceError::InvalidAddress(
            "merchant cannot be the zero address".to_string(),
        ));
    }
    if invoice.token == Address::ZERO {
        return Err(InvoiceError::InvalidAddress(
            "token cannot be the zero address".to_string(),
        ));
    }

    let atomic = parse_atomic(&invoice.amount_wei)
        .map_err(|e| InvoiceError::InvalidAmount(format!("amountWei: {e}")))?;
    let scaled = parse_units(&invoice.amount, config.token_decimals)
        .map_err(|e| InvoiceError::InvalidAmount(format!("amount: {e}")))?;
    if atomic != scaled {
        return Err(InvoiceError::InvalidAmount(format!(
            "amountWei {} does not match amount {} at {} decimals",
            invoice.amount_wei, invoice.amount, config.token_decimals
        )));
    }

    if invoice.is_expired(now) {
        return Err(InvoiceError::Expired {
            expires_at: invoice.expires_at,
            now,
        });
    }

    Ok(())
}
