//! Async driver for [`PaymentAttempt`].
//!
//! - [`SettlementChain`]: the wallet/chain collaborator. It submits the two
//!   transactions and watches them until they confirm
//! - [`Settler`]: runs the command/event loop for one attempt
//!
//! See [`crate::chain::AlloyChain`] for the alloy-backed implementation.

use alloy::primitives::TxHash;

use crate::session::PayerSession;
use crate::settlement::{
    ApproveCall, ChainFailure, Command, Outcome, PayCall, PaymentAttempt, Step, TxEvent,
    WalletContext,
};
use crate::SettlementError;

/// Wallet and chain operations the settlement needs.
///
/// Implementations decide their own confirmation policy (block depth,
/// timeout). The driver tolerates a `wait_for_confirmation` that never
/// resolves; dropping the settle future is the only way to stop waiting.
pub trait SettlementChain: Send + Sync {
    /// Send `approve(spender, amount)` to the token. Resolves on submission.
    fn submit_approve(
        &self,
        call: &ApproveCall,
    ) -> impl std::future::Future<Output = Result<TxHash, ChainFailure>> + Send;

    /// Send `pay(...)` to the router. Resolves on submission.
    fn submit_pay(
        &self,
        call: &PayCall,
    ) -> impl std::future::Future<Output = Result<TxHash, ChainFailure>> + Send;

    /// Resolve once `tx` is mined successfully; fail if it reverts.
    fn wait_for_confirmation(
        &self,
        tx: TxHash,
    ) -> impl std::future::Future<Output = Result<(), ChainFailure>> + Send;

    /// Ask the wallet to switch to `chain_id`.
    fn switch_network(
        &self,
        chain_id: u64,
    ) -> impl std::future::Future<Output = Result<(), ChainFailure>> + Send;
}

/// Drives a [`PaymentAttempt`] to a terminal phase against a [`SettlementChain`].
pub struct Settler<C> {
    chain: C,
}

impl<C: SettlementChain> Settler<C> {
    pub fn new(chain: C) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Run the attempt until it succeeds or fails.
    ///
    /// Errors that prevent starting (wrong network, expired invoice, attempt
    /// already running) are returned as `Err` and leave the attempt `Idle`
    /// or untouched. On `WrongNetwork` a network switch is requested before
    /// returning; the caller re-reads the wallet context and calls again.
    /// Chain failures end in `Ok(Outcome::Failed(..))`.
    pub async fn settle(
        &self,
        attempt: &mut PaymentAttempt,
        wallet: &WalletContext,
        now: u64,
    ) -> Result<Outcome, SettlementError> {
        let first = match attempt.begin(wallet, now) {
            Ok(command) => command,
            Err(err) => {
                if let Some(chain_id) = err.switch_to() {
                    if let Err(e) = self.chain.switch_network(chain_id).await {
                        tracing::warn!(chain_id, error = %e, "network switch request failed");
                    }
                }
                return Err(err);
            }
        };

        let mut next = Some(first);
        while let Some(command) = next {
            next = self.execute(attempt, command).await?;
        }

        attempt
            .outcome()
            .ok_or(SettlementError::AlreadyInProgress(attempt.phase()))
    }

    /// [`settle`](Self::settle) the session's current attempt.
    pub async fn settle_session(
        &self,
        session: &mut PayerSession,
        wallet: &WalletContext,
        now: u64,
    ) -> Result<Outcome, SettlementError> {
        let attempt = session.attempt_mut().ok_or(SettlementError::NoInvoice)?;
        self.settle(attempt, wallet, now).await
    }

    async fn execute(
        &self,
        attempt: &mut PaymentAttempt,
        command: Command,
    ) -> Result<Option<Command>, SettlementError> {
        match command {
            Command::SubmitApprove(call) => {
                let event = submitted(self.chain.submit_approve(&call).await);
                attempt.handle(Step::Approve, event)
            }
            Command::SubmitPay(call) => {
                let event = submitted(self.chain.submit_pay(&call).await);
                attempt.handle(Step::Pay, event)
            }
            Command::AwaitConfirmation { step, tx } => {
                let event = match self.chain.wait_for_confirmation(tx).await {
                    Ok(()) => TxEvent::Confirmed(tx),
                    Err(failure) => TxEvent::Failed {
                        tx: Some(tx),
                        failure,
                    },
                };
                attempt.handle(step, event)
            }
        }
    }
}

fn submitted(result: Result<TxHash, ChainFailure>) -> TxEvent {
    match result {
        Ok(tx) => TxEvent::Submitted(tx),
        Err(failure) => TxEvent::Failed { tx: None, failure },
    }
}
