use alloy::primitives::TxHash;
use thiserror::Error;

use crate::settlement::{Phase, Step};

/// Errors from decoding, validating or generating an invoice.
///
/// The `Display` text is the reason shown to the user. None of these leave
/// an invoice accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("malformed invoice payload: {0}")]
    MalformedPayload(String),

    #[error("unsupported invoice version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invoice expired at {expires_at} (now {now})")]
    Expired { expires_at: u64, now: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors that stop a settlement from starting or reject an event.
///
/// These never move an attempt into its `Error` phase; on-chain failures do
/// that and are reported through [`crate::settlement::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("wrong network: invoice is for chain {expected}, wallet is on chain {connected}")]
    WrongNetwork { expected: u64, connected: u64 },

    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("a payment is already in progress ({0})")]
    AlreadyInProgress(Phase),

    #[error("payment attempt already finished ({0}); start a new attempt to retry")]
    AttemptFinished(Phase),

    #[error("unexpected {step} event in phase {phase}")]
    UnexpectedEvent { phase: Phase, step: Step },

    #[error("confirmation for {got} does not match the submitted transaction {expected}")]
    TxMismatch { expected: TxHash, got: TxHash },

    #[error("no invoice loaded")]
    NoInvoice,

    #[error(transparent)]
    Invoice(#[from] InvoiceError),
}

impl SettlementError {
    /// Chain the wallet should be switched to, if that would resolve the error.
    pub fn switch_to(&self) -> Option<u64> {
        match self {
            SettlementError::WrongNetwork { expected, .. } => Some(*expected),
            _ => None,
        }
    }
}
