use alloy::primitives::{address, Address};

/// Wire format revision carried in every invoice's `version` field.
pub const PROTOCOL_VERSION: &str = "pyusd-invoice-1";

/// Sepolia chain ID.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// PYUSD token on Sepolia.
pub const DEFAULT_TOKEN: Address = address!("CaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9");

/// PaymentRouter deployment on Sepolia.
pub const DEFAULT_ROUTER: Address = address!("BEdA19E852341961789eF4d684098f80f155dCc7");

/// PYUSD has 6 decimal places.
pub const TOKEN_DECIMALS: u32 = 6;

/// Scheme prefix for the token-transfer URI form.
pub const URI_SCHEME: &str = "ethereum";

/// Default public RPC endpoint for Sepolia.
pub const RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Block explorer base URL.
pub const EXPLORER_BASE: &str = "https://sepolia.etherscan.io";

/// How far back the ledger looks for `PaymentReceived` events by default.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 10_000;

/// Deployment constants stamped into every generated invoice and used by the
/// payer side to route settlement. Decouples the codec, generator and
/// settlement machine from the compile-time Sepolia defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub version: String,
    pub chain_id: u64,
    pub token: Address,
    pub router: Address,
    pub token_decimals: u32,
    pub uri_scheme: String,
    pub explorer_base: String,
}

impl Default for ProtocolConfig {
    /// Defaults to the Sepolia PYUSD deployment.
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            token: DEFAULT_TOKEN,
            router: DEFAULT_ROUTER,
            token_decimals: TOKEN_DECIMALS,
            uri_scheme: URI_SCHEME.to_string(),
            explorer_base: EXPLORER_BASE.to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx: &impl std::fmt::Display) -> String {
        format!("{}/tx/{tx}", self.explorer_base.trim_end_matches('/'))
    }
}
