//! Payer side: settle an invoice read from a file argument or stdin.
//!
//! Usage: `invoice-pay [invoice.json]`
//!
//! Signs with `EVM_PRIVATE_KEY` against `RPC_URL`.

use std::io::Read;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice::amount::format_units;
use invoice::config::InvoiceConfig;
use invoice::{AlloyChain, Outcome, PayerSession, SettlementError, Settler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let config = InvoiceConfig::from_env()?;
    let signer: PrivateKeySigner = config.require_private_key()?.parse()?;
    let payer = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(config.rpc_url.clone());

    let chain = AlloyChain::new(provider)
        .with_account(payer)
        .with_confirmations(config.confirmations)
        .with_confirmation_timeout(config.confirmation_timeout);
    let settler = Settler::new(chain);

    let mut session = PayerSession::with_protocol_config(config.protocol.clone());
    let now = invoice::unix_now();
    let invoice = session.scan(&text, now)?;
    println!(
        "Paying {} PYUSD to {} (invoice {})",
        invoice.amount, invoice.merchant, invoice.invoice_id
    );
    if !invoice.note.is_empty() {
        println!("Note: {}", invoice.note);
    }

    let wallet = settler.chain().wallet_context().await?;
    let outcome = match settler.settle_session(&mut session, &wallet, now).await {
        Ok(outcome) => outcome,
        Err(SettlementError::WrongNetwork { expected, connected }) => {
            eprintln!(
                "RPC endpoint serves chain {connected}; this invoice must be paid on chain {expected}"
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    match outcome {
        Outcome::Paid(tx) => {
            println!("Paid: {}", config.protocol.tx_url(&tx));
            Ok(())
        }
        Outcome::Failed(failure) => {
            eprintln!("Payment failed: {failure}");
            if failure.allowance_outstanding() {
                let allowance = settler
                    .chain()
                    .allowance(config.protocol.token, payer, config.protocol.router)
                    .await;
                match allowance {
                    Ok(value) => eprintln!(
                        "Warning: the router still holds an allowance of {} PYUSD from {payer}",
                        format_units(value, config.protocol.token_decimals)
                    ),
                    Err(e) => eprintln!(
                        "Warning: the approval was confirmed, so the router may still hold an allowance ({e})"
                    ),
                }
            }
            std::process::exit(1);
        }
    }
}
