//! Merchant side: generate an invoice and print it as a terminal QR code,
//! followed by the JSON payload and the token-transfer URI.
//!
//! Usage: `invoice-new <amount> [note...]`
//!
//! The merchant comes from `MERCHANT_ADDRESS`; `INVOICE_TTL_SECS` sets an
//! expiry relative to now.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice::codec::{encode_json, PaymentUri};
use invoice::config::InvoiceConfig;
use invoice::qr::InvoiceQr;
use invoice::InvoiceGenerator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(amount) = args.next() else {
        eprintln!("usage: invoice-new <amount> [note...]");
        std::process::exit(2);
    };
    let note = args.collect::<Vec<_>>().join(" ");

    let config = InvoiceConfig::from_env()?;
    let merchant = config.require_merchant()?;

    let mut generator = InvoiceGenerator::with_protocol_config(config.protocol.clone());
    if let Some(ttl) = config.invoice_ttl_secs {
        generator = generator.with_ttl(ttl, invoice::unix_now());
    }

    let invoice = generator.generate(&merchant.to_checksum(None), &amount, &note)?;
    let uri = PaymentUri::from_invoice(&invoice, &config.protocol.uri_scheme);

    match InvoiceQr::new(&invoice) {
        Ok(qr) => println!("{}", qr.render_terminal()),
        Err(e) => tracing::warn!(error = %e, "invoice too large for a QR code; share the JSON instead"),
    }
    println!("{}", encode_json(&invoice));
    println!();
    println!("{uri}");
    Ok(())
}
