//! Serverless PYUSD invoices.
//!
//! A merchant generates an invoice and shows it as a QR code or copyable
//! text; a payer scans it and settles on-chain in two transactions: an ERC-20
//! `approve` for the router, then the router's `pay`, which forwards the funds
//! and emits `PaymentReceived`.
//!
//! # Components
//!
//! - **Generator** ([`InvoiceGenerator`]): merchant side, builds invoices
//! - **Codec** ([`codec`]): JSON and token-transfer URI encodings
//! - **Validator** ([`validate`]): semantic checks before accepting or paying
//! - **Settlement** ([`PaymentAttempt`], [`Settler`]): approve → confirm → pay → confirm
//! - **Ledger** ([`ledger::Reconciler`]): merchant's read-only view of `PaymentReceived` logs
//!
//! # Quick example (payer)
//!
//! ```no_run
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use invoice::{AlloyChain, PayerSession, Settler};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let account = signer.address();
//! let provider = ProviderBuilder::new()
//!     .wallet(alloy::network::EthereumWallet::from(signer))
//!     .connect_http(invoice::RPC_URL.parse().unwrap());
//!
//! let mut session = PayerSession::new();
//! session.scan("{\"version\":\"pyusd-invoice-1\", ...}", invoice::unix_now()).unwrap();
//!
//! let settler = Settler::new(AlloyChain::new(provider).with_account(account));
//! let wallet = settler.chain().wallet_context().await.unwrap();
//! let outcome = settler
//!     .settle_session(&mut session, &wallet, invoice::unix_now())
//!     .await
//!     .unwrap();
//! # }
//! ```

// Invoice protocol
pub mod amount;
pub mod codec;
pub mod constants;
pub mod error;
pub mod generator;
pub mod invoice;
pub mod validation;

// Settlement
pub mod chain;
pub mod session;
pub mod settlement;
pub mod settler;

// Merchant ledger and runtime configuration
pub mod config;
pub mod ledger;

#[cfg(feature = "qr")]
pub mod qr;

use alloy::sol;

// ERC-20 surface used by the payer: the allowance grant plus reads for
// reporting a leftover allowance.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
    }
}

// Payment router: pulls `amount` from the payer under the allowance and
// forwards it to the merchant, rejecting reused invoice ids.
sol! {
    #[sol(rpc)]
    interface PaymentRouter {
        event PaymentReceived(
            bytes32 indexed invoiceId,
            address indexed merchant,
            address indexed payer,
            address token,
            uint256 amount,
            uint256 timestamp
        );

        function pay(
            address token,
            address merchant,
            uint256 amount,
            bytes32 invoiceId,
            uint256 expiresAt
        ) external;
    }
}

// Re-exports
pub use constants::*;
pub use error::{InvoiceError, SettlementError};
pub use generator::InvoiceGenerator;
pub use invoice::Invoice;
pub use validation::{validate, validate_for};

pub use chain::AlloyChain;
pub use session::PayerSession;
pub use settlement::{
    ChainFailure, Command, Failure, FailureKind, Outcome, PaymentAttempt, Phase, Step, TxEvent,
    WalletContext,
};
pub use settler::{SettlementChain, Settler};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
