//! Sprechfunk Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und laesst die
//! Empfangs-Loop bis zum Ctrl+C-Signal laufen.

use anyhow::Result;
use sprechfunk_relay::{RelayConfig, RelayServer};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("SPRECHFUNK_RELAY_CONFIG").unwrap_or_else(|_| "relay.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = RelayConfig::laden(&config_pfad)?;

    // Logging initialisieren
    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Sprechfunk Relay wird initialisiert"
    );

    // Bind-Fehler beenden den Prozess mit Exit-Code != 0
    let server = RelayServer::binden(config).await?;
    tracing::info!(addr = %server.lokale_adresse()?, "Relay bereit, Ctrl+C beendet");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    server.run(shutdown_rx).await;
    tracing::info!("Relay sauber beendet");
    Ok(())
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
fn logging_initialisieren(level: &str, format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
