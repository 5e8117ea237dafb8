//! Netzwerk-Threads des Clients
//!
//! Zwei langlebige Threads auf einem gemeinsamen, unverbundenen
//! UDP-Socket:
//!
//! - **Sender**: entnimmt Pakete aus der ausgehenden Engine-Queue,
//!   stellt den vorberechneten 25-Byte-Audio-Kopf voran und sendet an
//!   das Relay. Zwischen den Iterationen schlaeft er kurz – die feste
//!   Pause begrenzt die CPU-Last, ohne spuerbare Latenz, weil der
//!   Produzent ohnehin im Frame-Takt liefert.
//! - **Empfaenger**: blockierendes `recv_from`, validiert Absender,
//!   Laenge und Magic-Token, und verteilt nach Pakettyp: Audio in die
//!   eingehende Engine-Queue, Control-JSON als Notification an die
//!   Host-Bruecke. Alles andere wird stillschweigend verworfen.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::bridge::HostBridge;
use sprechfunk_audio::engine::EngineHandle;
use sprechfunk_audio::queue::Packet;
use sprechfunk_core::event::ClientEvent;
use sprechfunk_protocol::wire::{DatagramHeader, PacketKind, FULL_HEADER_LEN, MAX_DATAGRAM_LEN};

/// Pause der Sende-Schleife zwischen zwei Poll-Iterationen
pub(crate) const SENDE_PAUSE_MS: u64 = 10;

/// Gemeinsamer Zustand der beiden Netzwerk-Threads
pub(crate) struct NetzShared {
    /// Laeuft der Client? Wird von `stop()` per CAS geloescht
    pub is_running: AtomicBool,
    /// Unverbundener UDP-Socket (geteilt von Sender und Empfaenger)
    pub socket: UdpSocket,
    /// Konfigurierter Relay-Endpunkt
    pub server_endpunkt: SocketAddr,
    /// Vorberechneter Audio-Paketkopf (Session-ID, Token, Typ)
    pub audio_header: [u8; FULL_HEADER_LEN],
}

impl NetzShared {
    fn laeuft(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

/// Sende-Schleife: Engine-Queue -> Relay
pub(crate) fn sender_schleife(shared: Arc<NetzShared>, engine: EngineHandle) {
    let mut sende_puffer: Vec<u8> = Vec::with_capacity(MAX_DATAGRAM_LEN);

    while shared.laeuft() {
        if let Some(paket) = engine.next_outgoing_packet() {
            sende_puffer.clear();
            sende_puffer.extend_from_slice(&shared.audio_header);
            sende_puffer.extend_from_slice(&paket.daten);

            if let Err(e) = shared.socket.send_to(&sende_puffer, shared.server_endpunkt) {
                if shared.laeuft() {
                    warn!(fehler = %e, "send_to fehlgeschlagen");
                }
            } else {
                trace!(bytes = sende_puffer.len(), "Audio-Paket gesendet");
            }
        }
        std::thread::sleep(Duration::from_millis(SENDE_PAUSE_MS));
    }
    debug!("Sender-Thread beendet");
}

/// Empfangs-Schleife: Relay -> Engine-Queue / Host-Bruecke
pub(crate) fn empfaenger_schleife(
    shared: Arc<NetzShared>,
    engine: EngineHandle,
    bridge: HostBridge,
) {
    let mut empfangs_puffer = [0u8; MAX_DATAGRAM_LEN];

    while shared.laeuft() {
        let (laenge, absender) = match shared.socket.recv_from(&mut empfangs_puffer) {
            Ok(x) => x,
            Err(e) => {
                // Geschlossener Socket beim Shutdown ist der erwartete Ausgang
                if shared.laeuft() {
                    error!(fehler = %e, "recv_from fehlgeschlagen, Empfaenger beendet sich");
                    bridge.melden(ClientEvent::Error(format!("Empfang fehlgeschlagen: {}", e)));
                }
                break;
            }
        };

        // Nur Datagramme vom konfigurierten Relay (Relay-only-Topologie)
        if absender != shared.server_endpunkt {
            continue;
        }

        let (header, nutzdaten) = match DatagramHeader::parse(&empfangs_puffer[..laenge]) {
            Ok(x) => x,
            Err(e) => {
                trace!(fehler = %e, "Ungueltiges Datagramm verworfen");
                continue;
            }
        };

        match header.kind {
            PacketKind::AudioOpus => {
                engine.submit_incoming_packet(Packet::aus_slice(nutzdaten));
            }
            PacketKind::ControlJson => match std::str::from_utf8(nutzdaten) {
                Ok(json) => bridge.melden(ClientEvent::Notification(json.to_string())),
                Err(_) => debug!("Control-Nutzdaten kein UTF-8, verworfen"),
            },
        }
    }
    debug!("Empfaenger-Thread beendet");
}
