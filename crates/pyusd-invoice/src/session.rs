use crate::codec::decode_versioned;
use crate::settlement::{Command, PaymentAttempt, WalletContext};
use crate::validation::validate_for;
use crate::{Invoice, InvoiceError, Phase, ProtocolConfig, SettlementError};

/// A payer's screen: at most one loaded invoice and one attempt to pay it.
///
/// Scanning replaces whatever was loaded before, including an attempt that
/// is still waiting on the chain; that transaction's fate is then no longer
/// observed here.
#[derive(Debug, Default)]
pub struct PayerSession {
    config: ProtocolConfig,
    attempt: Option<PaymentAttempt>,
}

impl PayerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol_config(config: ProtocolConfig) -> Self {
        Self {
            config,
            attempt: None,
        }
    }

    /// Load scanned or pasted text: decode, then validate at `now`.
    ///
    /// On error nothing is loaded; the `Display` of the error is the reason
    /// to show.
    pub fn scan(&mut self, text: &str, now: u64) -> Result<&Invoice, InvoiceError> {
        self.discard();
        let invoice = decode_versioned(text, &self.config.version)?;
        validate_for(&invoice, now, &self.config)?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            merchant = %invoice.merchant,
            amount = %invoice.amount,
            "invoice accepted"
        );

        let attempt = self.attempt.insert(PaymentAttempt::with_protocol_config(
            invoice,
            self.config.clone(),
        ));
        Ok(attempt.invoice())
    }

    pub fn invoice(&self) -> Option<&Invoice> {
        self.attempt.as_ref().map(PaymentAttempt::invoice)
    }

    pub fn attempt(&self) -> Option<&PaymentAttempt> {
        self.attempt.as_ref()
    }

    pub fn attempt_mut(&mut self) -> Option<&mut PaymentAttempt> {
        self.attempt.as_mut()
    }

    /// Payer pressed "pay". Rejected unless the attempt is `Idle`.
    pub fn pay(&mut self, wallet: &WalletContext, now: u64) -> Result<Command, SettlementError> {
        self.attempt
            .as_mut()
            .ok_or(SettlementError::NoInvoice)?
            .begin(wallet, now)
    }

    /// Replace a finished attempt with a fresh one for the same invoice.
    pub fn retry(&mut self) -> Result<&PaymentAttempt, SettlementError> {
        let current = self.attempt.as_ref().ok_or(SettlementError::NoInvoice)?;
        if !current.is_terminal() {
            return Err(SettlementError::AlreadyInProgress(current.phase()));
        }
        let fresh = current.retry();
        Ok(self.attempt.insert(fresh))
    }

    /// Stop waiting on an in-flight attempt and start over with the same
    /// invoice.
    ///
    /// Call after dropping the settle future. Transactions already submitted
    /// are not cancelled on-chain; their fate is just no longer observed. An
    /// `Idle` attempt is returned unchanged.
    pub fn cancel(&mut self) -> Result<&PaymentAttempt, SettlementError> {
        let current = self.attempt.as_ref().ok_or(SettlementError::NoInvoice)?;
        match current.phase() {
            Phase::Idle => {}
            phase if phase.is_terminal() => return Err(SettlementError::AttemptFinished(phase)),
            phase => {
                tracing::warn!(
                    invoice_id = %current.invoice().invoice_id,
                    phase = %phase,
                    approve_tx = ?current.approve_tx(),
                    pay_tx = ?current.pay_tx(),
                    "payment attempt cancelled; submitted transactions are no longer observed"
                );
                let fresh = current.retry();
                self.attempt = Some(fresh);
            }
        }
        self.attempt.as_ref().ok_or(SettlementError::NoInvoice)
    }

    /// Drop the loaded invoice and any attempt in flight.
    pub fn discard(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            if !attempt.is_terminal() && attempt.phase() != Phase::Idle {
                tracing::info!(
                    invoice_id = %attempt.invoice().invoice_id,
                    phase = %attempt.phase(),
                    "discarding in-flight payment attempt"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_json;
    use crate::settlement::{ChainFailure, Step, TxEvent};
    use crate::{InvoiceGenerator, SEPOLIA_CHAIN_ID};
    use alloy::primitives::{Address, TxHash};

    const NOW: u64 = 1_750_000_000;

    fn invoice_text() -> String {
        let invoice = InvoiceGenerator::new()
            .generate("0x00000000000000000000000000000000000000aa", "5", "")
            .unwrap();
        encode_json(&invoice)
    }

    fn wallet() -> WalletContext {
        WalletContext::connected(Address::repeat_byte(0x22), SEPOLIA_CHAIN_ID)
    }

    #[test]
    fn test_scan_error_leaves_nothing_loaded() {
        let mut session = PayerSession::new();
        session.scan(&invoice_text(), NOW).unwrap();
        assert!(session.invoice().is_some());

        let err = session.scan("not json", NOW).unwrap_err();
        assert!(matches!(err, InvoiceError::MalformedPayload(_)));
        assert!(session.invoice().is_none());
        assert_eq!(session.pay(&wallet(), NOW), Err(SettlementError::NoInvoice));
    }

    #[test]
    fn test_scan_rejects_expired_invoice() {
        let invoice = InvoiceGenerator::new()
            .with_expiry(NOW - 1)
            .generate("0x00000000000000000000000000000000000000aa", "5", "")
            .unwrap();
        let mut session = PayerSession::new();
        assert!(matches!(
            session.scan(&encode_json(&invoice), NOW),
            Err(InvoiceError::Expired { .. })
        ));
        assert!(session.invoice().is_none());
    }

    #[test]
    fn test_double_pay_is_rejected() {
        let mut session = PayerSession::new();
        session.scan(&invoice_text(), NOW).unwrap();
        session.pay(&wallet(), NOW).unwrap();
        session
            .attempt_mut()
            .unwrap()
            .handle(Step::Approve, TxEvent::Submitted(TxHash::repeat_byte(1)))
            .unwrap();

        assert_eq!(
            session.pay(&wallet(), NOW),
            Err(SettlementError::AlreadyInProgress(
                Phase::AwaitingApproveConfirmation
            ))
        );
        assert_eq!(
            session.attempt().unwrap().approve_tx(),
            Some(TxHash::repeat_byte(1))
        );
    }

    #[test]
    fn test_retry_only_after_terminal() {
        let mut session = PayerSession::new();
        session.scan(&invoice_text(), NOW).unwrap();
        session.pay(&wallet(), NOW).unwrap();
        assert!(matches!(
            session.retry(),
            Err(SettlementError::AlreadyInProgress(Phase::Approving))
        ));

        session
            .attempt_mut()
            .unwrap()
            .handle(
                Step::Approve,
                TxEvent::Failed {
                    tx: None,
                    failure: ChainFailure::user_rejected("no"),
                },
            )
            .unwrap();
        let id = session.invoice().unwrap().invoice_id;

        let fresh = session.retry().unwrap();
        assert_eq!(fresh.phase(), Phase::Idle);
        assert_eq!(fresh.invoice().invoice_id, id);
        assert!(session.pay(&wallet(), NOW).is_ok());
    }

    #[test]
    fn test_cancel_keeps_invoice_and_resets_attempt() {
        let mut session = PayerSession::new();
        session.scan(&invoice_text(), NOW).unwrap();
        let id = session.invoice().unwrap().invoice_id;
        session.pay(&wallet(), NOW).unwrap();
        session
            .attempt_mut()
            .unwrap()
            .handle(Step::Approve, TxEvent::Submitted(TxHash::repeat_byte(1)))
            .unwrap();

        let fresh = session.cancel().unwrap();
        assert_eq!(fresh.phase(), Phase::Idle);
        assert_eq!(fresh.approve_tx(), None);
        assert_eq!(fresh.invoice().invoice_id, id);
        assert!(session.pay(&wallet(), NOW).is_ok());
    }

    #[test]
    fn test_cancel_idle_and_finished_attempts() {
        let mut session = PayerSession::new();
        assert_eq!(session.cancel().unwrap_err(), SettlementError::NoInvoice);

        session.scan(&invoice_text(), NOW).unwrap();
        assert_eq!(session.cancel().unwrap().phase(), Phase::Idle);

        session.pay(&wallet(), NOW).unwrap();
        session
            .attempt_mut()
            .unwrap()
            .handle(
                Step::Approve,
                TxEvent::Failed {
                    tx: None,
                    failure: ChainFailure::submission("nonce too low"),
                },
            )
            .unwrap();
        assert_eq!(
            session.cancel().unwrap_err(),
            SettlementError::AttemptFinished(Phase::Error)
        );
        assert_eq!(session.attempt().unwrap().phase(), Phase::Error);
    }

    #[test]
    fn test_new_scan_discards_attempt() {
        let mut session = PayerSession::new();
        session.scan(&invoice_text(), NOW).unwrap();
        session.pay(&wallet(), NOW).unwrap();

        let other = invoice_text();
        session.scan(&other, NOW).unwrap();
        assert_eq!(session.attempt().unwrap().phase(), Phase::Idle);
    }
}
