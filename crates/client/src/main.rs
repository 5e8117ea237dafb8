//! Sprechfunk Client – Demo-Einstiegspunkt
//!
//! Verbindet sich mit einem Relay, tritt einer Sitzung bei und laeuft
//! bis Enter gedrueckt wird. Ereignisse der Gegenstellen werden ueber
//! das Logging ausgegeben.

use anyhow::Result;
use sprechfunk_client::{RelayAdresse, StartOptions, VoipClient};
use sprechfunk_core::config::EngineConfig;
use uuid::Uuid;

fn main() -> Result<()> {
    logging_initialisieren();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Aufruf: {} <relay-ip> <relay-port> <session-id> [anzeigename]",
            args[0]
        );
        std::process::exit(2);
    }

    let options = StartOptions {
        relay_server: RelayAdresse {
            ip: args[1].clone(),
            port: args[2].parse()?,
        },
        session_id: args[3].clone(),
        my_user_info_json: serde_json::json!({
            "user_id": Uuid::new_v4().to_string(),
            "name": args.get(4).cloned().unwrap_or_else(|| "anonym".into()),
        })
        .to_string(),
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let drucker = std::thread::spawn(move || {
        for event in rx {
            tracing::info!(typ = event.typ(), daten = event.daten(), "Ereignis");
        }
    });

    let mut client = VoipClient::neu(EngineConfig::default());
    client.start(
        options,
        Box::new(move |event| {
            let _ = tx.send(event);
        }),
    )?;

    println!("Sitzung laeuft. Enter beendet.");
    let mut zeile = String::new();
    let _ = std::io::stdin().read_line(&mut zeile);

    client.stop();
    let _ = drucker.join();
    Ok(())
}

/// Initialisiert tracing-subscriber mit RUST_LOG oder Standard-Level
fn logging_initialisieren() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}
