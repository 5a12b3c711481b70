//! Merchant ledger built from the router's `PaymentReceived` logs.
//!
//! Read-only: nothing here writes to the chain or feeds back into
//! settlement. Logs are filtered by the merchant's indexed topic, so the
//! ledger only ever shows payments to that merchant.

use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use serde::Serialize;
use thiserror::Error;

use crate::amount::format_units;
use crate::{PaymentRouter, ProtocolConfig, DEFAULT_LOOKBACK_BLOCKS};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("undecodable PaymentReceived log: {0}")]
    Decode(String),
}

/// One settled invoice as seen on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub invoice_id: B256,
    pub merchant: Address,
    pub payer: Address,
    pub token: Address,
    pub amount: U256,
    /// Block timestamp recorded by the router, unix seconds.
    pub timestamp: u64,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

impl PaymentRecord {
    pub fn from_log(log: &Log) -> Result<Self, LedgerError> {
        let decoded = log
            .log_decode::<PaymentRouter::PaymentReceived>()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        let event = decoded.inner.data;
        Ok(Self {
            invoice_id: event.invoiceId,
            merchant: event.merchant,
            payer: event.payer,
            token: event.token,
            amount: event.amount,
            timestamp: event.timestamp.saturating_to(),
            transaction_hash: log.transaction_hash,
            block_number: log.block_number,
        })
    }

    pub fn display_amount(&self, decimals: u32) -> String {
        format_units(self.amount, decimals)
    }
}

/// Polls the router for a merchant's payments.
///
/// [`history`](Self::history) loads the lookback window; each
/// [`poll`](Self::poll) afterwards returns only payments in blocks mined since
/// the previous call.
pub struct Reconciler<P> {
    provider: P,
    router: Address,
    merchant: Address,
    lookback: u64,
    next_block: Option<u64>,
}

impl<P: Provider> Reconciler<P> {
    pub fn new(provider: P, router: Address, merchant: Address) -> Self {
        Self {
            provider,
            router,
            merchant,
            lookback: DEFAULT_LOOKBACK_BLOCKS,
            next_block: None,
        }
    }

    /// Number of most recent blocks [`history`](Self::history) scans.
    pub fn with_lookback(mut self, blocks: u64) -> Self {
        self.lookback = blocks.max(1);
        self
    }

    pub fn merchant(&self) -> Address {
        self.merchant
    }

    /// Payments in the last `lookback` blocks, oldest first. Resets the cursor.
    pub async fn history(&mut self) -> Result<Vec<PaymentRecord>, LedgerError> {
        let latest = self.latest_block().await?;
        let from = latest.saturating_sub(self.lookback - 1);
        let records = self.fetch(from, latest).await?;
        self.next_block = Some(latest + 1);
        tracing::info!(
            merchant = %self.merchant,
            from,
            to = latest,
            payments = records.len(),
            "ledger history loaded"
        );
        Ok(records)
    }

    /// Payments mined since the last call. Falls back to
    /// [`history`](Self::history) on first use.
    pub async fn poll(&mut self) -> Result<Vec<PaymentRecord>, LedgerError> {
        let Some(from) = self.next_block else {
            return self.history().await;
        };
        let latest = self.latest_block().await?;
        if latest < from {
            return Ok(Vec::new());
        }
        let records = self.fetch(from, latest).await?;
        self.next_block = Some(latest + 1);
        if !records.is_empty() {
            tracing::info!(merchant = %self.merchant, new = records.len(), "new payments");
        }
        Ok(records)
    }

    fn filter(&self, from: u64, to: u64) -> Filter {
        payment_filter(self.router, self.merchant)
            .from_block(from)
            .to_block(to)
    }

    async fn latest_block(&self) -> Result<u64, LedgerError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_blockNumber failed: {e}")))
    }

    async fn fetch(&self, from: u64, to: u64) -> Result<Vec<PaymentRecord>, LedgerError> {
        let logs = self
            .provider
            .get_logs(&self.filter(from, to))
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_getLogs failed: {e}")))?;

        Ok(logs
            .iter()
            .filter_map(|log| match PaymentRecord::from_log(log) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(tx = ?log.transaction_hash, error = %e, "skipping log");
                    None
                }
            })
            .collect())
    }
}

/// `PaymentReceived` logs from `router` whose indexed merchant is `merchant`.
pub fn payment_filter(router: Address, merchant: Address) -> Filter {
    Filter::new()
        .address(router)
        .event_signature(PaymentRouter::PaymentReceived::SIGNATURE_HASH)
        .topic2(merchant.into_word())
}

/// `0x1234...abcd`
pub fn abbreviate(hex: &str) -> String {
    if hex.len() <= 10 {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..6], &hex[hex.len() - 4..])
}

/// UTC rendering of a router timestamp; falls back to the raw seconds when
/// chrono cannot represent it.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Plain-text ledger table.
pub fn render_table(records: &[PaymentRecord], config: &ProtocolConfig) -> String {
    if records.is_empty() {
        return "No payments received yet for this merchant.\n".to_string();
    }

    let mut out = format!(
        "{:<24} {:<14} {:<14} {:>16}  {}\n",
        "Timestamp", "Invoice ID", "Payer", "Amount (PYUSD)", "Tx"
    );
    for record in records {
        let when = format_timestamp(record.timestamp);
        let tx = record
            .transaction_hash
            .map(|tx| config.tx_url(&tx))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<24} {:<14} {:<14} {:>16}  {}\n",
            when,
            abbreviate(&alloy::hex::encode_prefixed(record.invoice_id)),
            abbreviate(&record.payer.to_checksum(None)),
            record.display_amount(config.token_decimals),
            tx
        ));
    }
    out
}
