use std::env;
use std::time::Duration;

use alloy::primitives::Address;
use url::Url;

use crate::invoice::parse_address;
use crate::{ProtocolConfig, DEFAULT_LOOKBACK_BLOCKS, RPC_URL};

const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Runtime settings for the invoice binaries, read from the environment.
#[derive(Clone)]
pub struct InvoiceConfig {
    /// JSON-RPC endpoint
    pub rpc_url: Url,
    /// Deployment the invoices are issued for and settled on
    pub protocol: ProtocolConfig,
    /// Blocks required before a transaction counts as confirmed
    pub confirmations: u64,
    /// Give up watching a transaction after this long (None = wait forever)
    pub confirmation_timeout: Option<Duration>,
    /// Ledger history window in blocks
    pub lookback_blocks: u64,
    /// Ledger polling interval (None = print history once and exit)
    pub ledger_poll: Option<Duration>,
    /// Merchant receiving payments
    pub merchant: Option<Address>,
    /// Lifetime of generated invoices (None = never expire)
    pub invoice_ttl_secs: Option<u64>,
    /// Payer signing key
    pub private_key: Option<String>,
}

impl std::fmt::Debug for InvoiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("protocol", &self.protocol)
            .field("confirmations", &self.confirmations)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("lookback_blocks", &self.lookback_blocks)
            .field("ledger_poll", &self.ledger_poll)
            .field("merchant", &self.merchant)
            .field("invoice_ttl_secs", &self.invoice_ttl_secs)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl InvoiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url_str = get("RPC_URL").unwrap_or_else(|| RPC_URL.to_string());
        let rpc_url = Url::parse(&rpc_url_str).map_err(|_| ConfigError::InvalidUrl(rpc_url_str))?;

        let mut protocol = ProtocolConfig::default();
        if let Some(chain_id) = number(&get, "CHAIN_ID")? {
            protocol.chain_id = chain_id;
        }
        if let Some(token) = address(&get, "TOKEN_ADDRESS")? {
            protocol.token = token;
        }
        if let Some(router) = address(&get, "ROUTER_ADDRESS")? {
            protocol.router = router;
        }
        if let Some(explorer) = get("EXPLORER_URL") {
            Url::parse(&explorer).map_err(|_| ConfigError::InvalidUrl(explorer.clone()))?;
            protocol.explorer_base = explorer;
        }

        let confirmations = number(&get, "CONFIRMATIONS")?
            .unwrap_or(DEFAULT_CONFIRMATIONS)
            .max(1);
        let confirmation_timeout =
            number(&get, "CONFIRMATION_TIMEOUT_SECS")?.map(Duration::from_secs);
        let lookback_blocks = number(&get, "LOOKBACK_BLOCKS")?
            .unwrap_or(DEFAULT_LOOKBACK_BLOCKS)
            .max(1);
        let ledger_poll = number(&get, "LEDGER_POLL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let merchant = address(&get, "MERCHANT_ADDRESS")?;
        let invoice_ttl_secs = number(&get, "INVOICE_TTL_SECS")?.filter(|secs| *secs > 0);
        let private_key = get("EVM_PRIVATE_KEY");

        Ok(Self {
            rpc_url,
            protocol,
            confirmations,
            confirmation_timeout,
            lookback_blocks,
            ledger_poll,
            merchant,
            invoice_ttl_secs,
            private_key,
        })
    }

    pub fn require_merchant(&self) -> Result<Address, ConfigError> {
        self.merchant
            .ok_or(ConfigError::MissingRequired("MERCHANT_ADDRESS"))
    }

    pub fn require_private_key(&self) -> Result<&str, ConfigError> {
        self.private_key
            .as_deref()
            .ok_or(ConfigError::MissingRequired("EVM_PRIVATE_KEY"))
    }
}

fn number(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
        })
        .transpose()
}

fn address(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Address>, ConfigError> {
    get(key)
        .map(|raw| parse_address(raw.trim()).map_err(|_| ConfigError::InvalidAddress(raw)))
        .transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid number for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
