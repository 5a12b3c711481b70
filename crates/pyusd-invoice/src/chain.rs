use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{PendingTransactionBuilder, Provider};

use crate::settlement::{ApproveCall, ChainFailure, PayCall, WalletContext};
use crate::settler::SettlementChain;
use crate::{PaymentRouter, IERC20};

/// EIP-1193 "user rejected the request".
const USER_REJECTED_CODE: i64 = 4001;

/// [`SettlementChain`] over an alloy provider with a signing wallet attached.
pub struct AlloyChain<P> {
    provider: P,
    account: Option<Address>,
    confirmations: u64,
    confirmation_timeout: Option<Duration>,
}

impl<P> AlloyChain<P> {
    /// One confirmation, no timeout, no known account.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            account: None,
            confirmations: 1,
            confirmation_timeout: None,
        }
    }

    /// The address the provider's wallet signs with.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    /// Blocks required on top of the including block before a transaction
    /// counts as confirmed.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Stop watching a transaction after `timeout`. `None` waits forever.
    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider> AlloyChain<P> {
    /// Current wallet context: the configured account and the provider's chain.
    pub async fn wallet_context(&self) -> Result<WalletContext, ChainFailure> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ChainFailure::submission(format!("eth_chainId failed: {e}")))?;
        Ok(WalletContext {
            account: self.account,
            chain_id,
        })
    }

    /// Allowance `owner` has granted `spender` on `token`.
    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainFailure> {
        let contract = IERC20::new(token, &self.provider);
        contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| ChainFailure::submission(format!("allowance failed: {e}")))
    }

    /// Token balance of `owner`.
    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainFailure> {
        let contract = IERC20::new(token, &self.provider);
        contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainFailure::submission(format!("balanceOf failed: {e}")))
    }
}

impl<P> SettlementChain for AlloyChain<P>
where
    P: Provider + Send + Sync,
{
    async fn submit_approve(&self, call: &ApproveCall) -> Result<TxHash, ChainFailure> {
        let contract = IERC20::new(call.token, &self.provider);
        let pending = contract
            .approve(call.spender, call.amount)
            .send()
            .await
            .map_err(|e| send_failure("approve", e))?;

        let tx = *pending.tx_hash();
        tracing::info!(
            tx = %tx,
            token = %call.token,
            spender = %call.spender,
            amount = %call.amount,
            "approve sent"
        );
        Ok(tx)
    }

    async fn submit_pay(&self, call: &PayCall) -> Result<TxHash, ChainFailure> {
        let router = PaymentRouter::new(call.router, &self.provider);
        let pending = router
            .pay(
                call.token,
                call.merchant,
                call.amount,
                call.invoice_id,
                call.expires_at,
            )
            .send()
            .await
            .map_err(|e| send_failure("pay", e))?;

        let tx = *pending.tx_hash();
        tracing::info!(
            tx = %tx,
            router = %call.router,
            merchant = %call.merchant,
            invoice_id = %call.invoice_id,
            "pay sent"
        );
        Ok(tx)
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<(), ChainFailure> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx)
            .with_required_confirmations(self.confirmations)
            .with_timeout(self.confirmation_timeout)
            .get_receipt()
            .await
            .map_err(|e| ChainFailure::confirmation(format!("receipt for {tx} failed: {e}")))?;

        if !receipt.status() {
            return Err(ChainFailure::confirmation(format!("transaction {tx} reverted")));
        }

        tracing::debug!(tx = %tx, block = ?receipt.block_number, "transaction confirmed");
        Ok(())
    }

    async fn switch_network(&self, chain_id: u64) -> Result<(), ChainFailure> {
        let params = [serde_json::json!({ "chainId": format!("0x{chain_id:x}") })];
        self.provider
            .raw_request::<_, serde_json::Value>("wallet_switchEthereumChain".into(), params)
            .await
            .map(|_| ())
            .map_err(|e| ChainFailure::submission(format!("network switch failed: {e}")))
    }
}

/// Classify a failed `send()`: wallet refusals become `UserRejected`,
/// everything else is a submission failure.
fn send_failure(op: &str, err: alloy::contract::Error) -> ChainFailure {
    if let alloy::contract::Error::TransportError(transport) = &err {
        if let Some(resp) = transport.as_error_resp() {
            if resp.code == USER_REJECTED_CODE {
                return ChainFailure::user_rejected(format!("{op} rejected: {}", resp.message));
            }
        }
    }
    ChainFailure::submission(format!("{op} send failed: {err}"))
}
