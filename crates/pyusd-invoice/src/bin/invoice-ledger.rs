//! Merchant side: list `PaymentReceived` events for `MERCHANT_ADDRESS`.
//!
//! Prints the last `LOOKBACK_BLOCKS` of history. With `LEDGER_POLL_SECS`
//! set, keeps polling and prints new payments as they arrive.

use alloy::providers::ProviderBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice::config::InvoiceConfig;
use invoice::ledger::{render_table, Reconciler};

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

    let config = InvoiceConfig::from_env()?;
    let merchant = config.require_merchant()?;

    let provider = ProviderBuilder::new().connect_http(config.rpc_url.clone());
    let mut reconciler = Reconciler::new(provider, config.protocol.router, merchant)
        .with_lookback(config.lookback_blocks);

    let history = reconciler.history().await?;
    print!("{}", render_table(&history, &config.protocol));

    let Some(every) = config.ledger_poll else {
        return Ok(());
    };

    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match reconciler.poll().await {
                    Ok(records) if !records.is_empty() => {
                        print!("{}", render_table(&records, &config.protocol));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "ledger poll failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}
