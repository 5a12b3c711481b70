//! Payer-side settlement state machine.
//!
//! ```text
//! Idle -> Approving -> AwaitingApproveConfirmation -> Paying -> AwaitingPayConfirmation -> Success
//!            \                    \                      \                \
//!             +--------------------+----------------------+----------------+--> Error
//! ```
//!
//! The machine does no I/O. [`PaymentAttempt::begin`] and
//! [`PaymentAttempt::handle`] return the next [`Command`] for a driver to
//! execute, and the driver reports back with [`TxEvent`]s tagged by
//! [`Step`]. The pay command is only produced after the approve transaction
//! has been reported `Confirmed`: the router's `transferFrom` reverts without
//! the allowance, so submission alone is never enough.
//!
//! See [`crate::settler::Settler`] for the async driver.

use std::fmt;

use alloy::primitives::{Address, TxHash, B256, U256};
use thiserror::Error;

use crate::validation::validate_for;
use crate::{Invoice, ProtocolConfig, SettlementError};

/// Where a [`PaymentAttempt`] is in the approve-then-pay sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Approving,
    AwaitingApproveConfirmation,
    Paying,
    AwaitingPayConfirmation,
    Success,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Error)
    }

    /// The transaction this phase belongs to, if any.
    pub fn step(self) -> Option<Step> {
        match self {
            Phase::Approving | Phase::AwaitingApproveConfirmation => Some(Step::Approve),
            Phase::Paying | Phase::AwaitingPayConfirmation => Some(Step::Pay),
            Phase::Idle | Phase::Success | Phase::Error => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Approving => "approving",
            Phase::AwaitingApproveConfirmation => "awaiting approve confirmation",
            Phase::Paying => "paying",
            Phase::AwaitingPayConfirmation => "awaiting pay confirmation",
            Phase::Success => "success",
            Phase::Error => "error",
        })
    }
}

/// One of the two on-chain transactions of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// `approve(router, amount)` on the token.
    Approve,
    /// `pay(token, merchant, amount, invoiceId, expiresAt)` on the router.
    Pay,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Approve => "approve",
            Step::Pay => "pay",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The wallet holder declined to sign.
    UserRejected,
    /// The transaction never reached the network (RPC error, bad nonce, gas).
    SubmissionFailed,
    /// The transaction was submitted but reverted or could not be watched.
    ConfirmationFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::UserRejected => "rejected by user",
            FailureKind::SubmissionFailed => "submission failed",
            FailureKind::ConfirmationFailed => "confirmation failed",
        })
    }
}

/// A failure reported by the chain collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {reason}")]
pub struct ChainFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl ChainFailure {
    pub fn user_rejected(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::UserRejected,
            reason: reason.into(),
        }
    }

    pub fn submission(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SubmissionFailed,
            reason: reason.into(),
        }
    }

    pub fn confirmation(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ConfirmationFailed,
            reason: reason.into(),
        }
    }
}

/// Why an attempt ended in [`Phase::Error`], and where.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} {kind} while {phase}: {reason}")]
pub struct Failure {
    /// Phase the attempt was in when the failure arrived.
    pub phase: Phase,
    pub step: Step,
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    /// Whether a token allowance for the router may still be live.
    ///
    /// True once the approval confirmed. The allowance is not revoked
    /// automatically; the payer has to be told.
    pub fn allowance_outstanding(&self) -> bool {
        self.step == Step::Pay
    }
}

/// Completion report for the transaction of the current [`Step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    /// Accepted by the wallet/RPC; the hash identifies the transaction.
    Submitted(TxHash),
    /// Mined successfully.
    Confirmed(TxHash),
    /// Submission or confirmation failed. `tx` is `None` when nothing was sent.
    Failed {
        tx: Option<TxHash>,
        failure: ChainFailure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveCall {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayCall {
    pub router: Address,
    pub token: Address,
    pub merchant: Address,
    pub amount: U256,
    pub invoice_id: B256,
    pub expires_at: U256,
}

/// Work the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SubmitApprove(ApproveCall),
    AwaitConfirmation { step: Step, tx: TxHash },
    SubmitPay(PayCall),
}

/// Connected wallet, as observed by the caller at the moment of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletContext {
    pub account: Option<Address>,
    pub chain_id: u64,
}

impl WalletContext {
    pub fn connected(account: Address, chain_id: u64) -> Self {
        Self {
            account: Some(account),
            chain_id,
        }
    }

    pub fn disconnected(chain_id: u64) -> Self {
        Self {
            account: None,
            chain_id,
        }
    }
}

/// Terminal result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pay transaction hash: proof of payment.
    Paid(TxHash),
    Failed(Failure),
}

/// One payer's attempt to settle one invoice.
///
/// Single use: once it reaches `Success` or `Error` it stays there, and
/// [`retry`](Self::retry) builds a fresh attempt for the same invoice.
#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    invoice: Invoice,
    config: ProtocolConfig,
    phase: Phase,
    amount: U256,
    payer: Option<Address>,
    approve_tx: Option<TxHash>,
    pay_tx: Option<TxHash>,
    failure: Option<Failure>,
}

impl PaymentAttempt {
    /// New attempt routed through the default Sepolia router.
    pub fn new(invoice: Invoice) -> Self {
        Self::with_protocol_config(invoice, ProtocolConfig::default())
    }

    pub fn with_protocol_config(invoice: Invoice, config: ProtocolConfig) -> Self {
        Self {
            invoice,
            config,
            phase: Phase::Idle,
            amount: U256::ZERO,
            payer: None,
            approve_tx: None,
            pay_tx: None,
            failure: None,
        }
    }

    /// A fresh `Idle` attempt for the same invoice and configuration.
    pub fn retry(&self) -> Self {
        Self::with_protocol_config(self.invoice.clone(), self.config.clone())
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn payer(&self) -> Option<Address> {
        self.payer
    }

    pub fn approve_tx(&self) -> Option<TxHash> {
        self.approve_tx
    }

    pub fn pay_tx(&self) -> Option<TxHash> {
        self.pay_tx
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether the router may hold a live allowance from this attempt that
    /// was not spent by a confirmed `pay`.
    pub fn allowance_outstanding(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(Failure::allowance_outstanding)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Success => self.pay_tx.map(Outcome::Paid),
            Phase::Error => self.failure.clone().map(Outcome::Failed),
            _ => None,
        }
    }

    /// Start settlement: `Idle -> Approving`.
    ///
    /// Re-validates the invoice at `now`, then requires a connected wallet on
    /// the invoice's chain. On `WrongNetwork` the attempt stays `Idle`; the
    /// caller should offer a network switch (see
    /// [`SettlementError::switch_to`]) and call again with the new context.
    /// Calling this anywhere but `Idle` is rejected and changes nothing.
    pub fn begin(&mut self, wallet: &WalletContext, now: u64) -> Result<Command, SettlementError> {
        match self.phase {
            Phase::Idle => {}
            phase if phase.is_terminal() => return Err(SettlementError::AttemptFinished(phase)),
            phase => {
                tracing::warn!(
                    invoice_id = %self.invoice.invoice_id,
                    phase = %phase,
                    "pay requested while a settlement is in flight; ignoring"
                );
                return Err(SettlementError::AlreadyInProgress(phase));
            }
        }

        validate_for(&self.invoice, now, &self.config)?;

        let payer = wallet.account.ok_or(SettlementError::WalletNotConnected)?;

        if wallet.chain_id != self.invoice.chain_id {
            tracing::warn!(
                expected = self.invoice.chain_id,
                connected = wallet.chain_id,
                "wallet on wrong network"
            );
            return Err(SettlementError::WrongNetwork {
                expected: self.invoice.chain_id,
                connected: wallet.chain_id,
            });
        }

        self.amount = self.invoice.atomic_amount()?;
        self.payer = Some(payer);
        self.phase = Phase::Approving;

        tracing::info!(
            invoice_id = %self.invoice.invoice_id,
            payer = %payer,
            merchant = %self.invoice.merchant,
            amount = %self.amount,
            "settlement started"
        );

        Ok(Command::SubmitApprove(ApproveCall {
            token: self.invoice.token,
            spender: self.config.router,
            amount: self.amount,
        }))
    }

    /// Feed a completion event for `step` into the machine.
    ///
    /// Returns the next command, or `None` once the attempt is terminal.
    /// Events for a step other than the current one, and confirmations for a
    /// transaction other than the one submitted, are rejected without
    /// changing the phase.
    pub fn handle(
        &mut self,
        step: Step,
        event: TxEvent,
    ) -> Result<Option<Command>, SettlementError> {
        let phase = self.phase;
        if phase.step() != Some(step) {
            tracing::warn!(phase = %phase, step = %step, "out-of-order settlement event rejected");
            return Err(SettlementError::UnexpectedEvent { phase, step });
        }

        match (phase, event) {
            (Phase::Approving, TxEvent::Submitted(tx)) => {
                self.approve_tx = Some(tx);
                self.phase = Phase::AwaitingApproveConfirmation;
                tracing::info!(tx = %tx, "approve submitted");
                Ok(Some(Command::AwaitConfirmation {
                    step: Step::Approve,
                    tx,
                }))
            }
            (Phase::AwaitingApproveConfirmation, TxEvent::Confirmed(tx)) => {
                Self::expect_tx(self.approve_tx, tx)?;
                self.phase = Phase::Paying;
                tracing::info!(tx = %tx, "approve confirmed");
                Ok(Some(Command::SubmitPay(self.pay_call())))
            }
            (Phase::Paying, TxEvent::Submitted(tx)) => {
                self.pay_tx = Some(tx);
                self.phase = Phase::AwaitingPayConfirmation;
                tracing::info!(tx = %tx, "pay submitted");
                Ok(Some(Command::AwaitConfirmation {
                    step: Step::Pay,
                    tx,
                }))
            }
            (Phase::AwaitingPayConfirmation, TxEvent::Confirmed(tx)) => {
                Self::expect_tx(self.pay_tx, tx)?;
                self.phase = Phase::Success;
                tracing::info!(
                    invoice_id = %self.invoice.invoice_id,
                    tx = %tx,
                    "invoice paid"
                );
                Ok(None)
            }
            (_, TxEvent::Failed { tx, failure }) => {
                if let (Some(got), Some(expected)) = (tx, self.current_tx()) {
                    Self::expect_tx(Some(expected), got)?;
                }
                let failure = Failure {
                    phase,
                    step,
                    kind: failure.kind,
                    reason: failure.reason,
                };
                tracing::warn!(
                    invoice_id = %self.invoice.invoice_id,
                    phase = %phase,
                    kind = %failure.kind,
                    reason = %failure.reason,
                    allowance_outstanding = failure.allowance_outstanding(),
                    "settlement failed"
                );
                self.failure = Some(failure);
                self.phase = Phase::Error;
                Ok(None)
            }
            (phase, _) => {
                tracing::warn!(phase = %phase, step = %step, "out-of-order settlement event rejected");
                Err(SettlementError::UnexpectedEvent { phase, step })
            }
        }
    }

    fn current_tx(&self) -> Option<TxHash> {
        match self.phase {
            Phase::AwaitingApproveConfirmation => self.approve_tx,
            Phase::AwaitingPayConfirmation => self.pay_tx,
            _ => None,
        }
    }

    fn expect_tx(expected: Option<TxHash>, got: TxHash) -> Result<(), SettlementError> {
        match expected {
            Some(expected) if expected != got => {
                Err(SettlementError::TxMismatch { expected, got })
            }
            _ => Ok(()),
        }
    }

    fn pay_call(&self) -> PayCall {
        PayCall {
            router: self.config.router,
            token: self.invoice.token,
            merchant: self.invoice.merchant,
            amount: self.amount,
            invoice_id: self.invoice.invoice_id,
            expires_at: U256::from(self.invoice.expires_at),
        }
    }
}
