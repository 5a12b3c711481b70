use crate::amount::{parse_units, AmountError};
use crate::invoice::{new_invoice_id, parse_address};
use crate::{Invoice, InvoiceError, ProtocolConfig};

/// Merchant-side invoice factory.
///
/// Stamps the deployment constants from its [`ProtocolConfig`] into every
/// invoice. `expiresAt` is `0` (no expiry) unless set with
/// [`with_expiry`](Self::with_expiry) or [`with_ttl`](Self::with_ttl).
#[derive(Debug, Clone, Default)]
pub struct InvoiceGenerator {
    config: ProtocolConfig,
    expires_at: u64,
}

impl InvoiceGenerator {
    /// Sepolia PYUSD defaults, no expiry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol_config(config: ProtocolConfig) -> Self {
        Self {
            config,
            expires_at: 0,
        }
    }

    /// Expire invoices at an absolute unix timestamp (`0` = never).
    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Expire invoices `ttl_secs` after `now`.
    pub fn with_ttl(self, ttl_secs: u64, now: u64) -> Self {
        self.with_expiry(now.saturating_add(ttl_secs))
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Build a new invoice.
    ///
    /// Fails with `InvalidInput` when `merchant` is empty or `amount` is not a
    /// positive decimal with at most `token_decimals` places, and with
    /// `InvalidAddress` when `merchant` is not a valid address.
    pub fn generate(
        &self,
        merchant: &str,
        amount: &str,
        note: &str,
    ) -> Result<Invoice, InvoiceError> {
        let merchant = merchant.trim();
        if merchant.is_empty() {
            return Err(InvoiceError::InvalidInput(
                "merchant address is required".to_string(),
            ));
        }
        let merchant = parse_address(merchant)?;

        let amount = amount.trim();
        let atomic = parse_units(amount, self.config.token_decimals).map_err(|e| match e {
            AmountError::Empty => InvoiceError::InvalidInput("amount is required".to_string()),
            other => InvoiceError::InvalidInput(other.to_string()),
        })?;
        if atomic.is_zero() {
            return Err(InvoiceError::InvalidInput(format!(
                "amount must be positive, got '{amount}'"
            )));
        }

        let invoice = Invoice {
            version: self.config.version.clone(),
            chain_id: self.config.chain_id,
            token: self.config.token,
            merchant,
            amount: amount.to_string(),
            amount_wei: atomic.to_string(),
            invoice_id: new_invoice_id(),
            note: note.to_string(),
            expires_at: self.expires_at,
        };

        tracing::info!(
            merchant = %invoice.merchant,
            amount_wei = %invoice.amount_wei,
            invoice_id = %invoice.invoice_id,
            expires_at = invoice.expires_at,
            "invoice generated"
        );

        Ok(invoice)
    }
}
