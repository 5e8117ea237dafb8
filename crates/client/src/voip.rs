//! VoipClient – Lebenszyklus der Client-Seite
//!
//! Bindet Audio-Engine, UDP-Socket und die beiden Netzwerk-Threads
//! zusammen. Der Host steuert den Client ueber `start(options, sink)`
//! und `stop()`; alles weitere (Ereignisse, Fehler) kommt asynchron
//! ueber die Host-Bruecke zurueck.

use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

use crate::bridge::{EventSink, HostBridge};
use crate::netz::{self, NetzShared};
use sprechfunk_audio::engine::AudioEngine;
use sprechfunk_core::config::EngineConfig;
use sprechfunk_core::error::{Result, SprechfunkError};
use sprechfunk_core::event::ClientEvent;
use sprechfunk_protocol::wire::{encode_datagram, DatagramHeader, PacketKind, SessionId};

// ---------------------------------------------------------------------------
// Start-Optionen (Host-Vertrag)
// ---------------------------------------------------------------------------

/// Adresse des Relay-Servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAdresse {
    /// IP oder Hostname
    pub ip: String,
    /// UDP-Port
    pub port: u16,
}

/// Optionen fuer `VoipClient::start`
///
/// Die Feldnamen entsprechen dem Host-Vertrag und bleiben deshalb
/// englisch serialisiert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Relay-Server-Endpunkt
    pub relay_server: RelayAdresse,
    /// Sitzungskennung (maximal 16 UTF-8-Bytes, laengere werden gekuerzt)
    pub session_id: String,
    /// Benutzer-Info als JSON – wird unveraendert als Registrierung
    /// an das Relay geschickt und dort an die Peers verteilt
    pub my_user_info_json: String,
}

// ---------------------------------------------------------------------------
// VoipClient
// ---------------------------------------------------------------------------

/// Laufender Netzwerk-Zustand zwischen `start()` und `stop()`
struct Laufzeit {
    shared: Arc<NetzShared>,
    bridge: HostBridge,
    sender: JoinHandle<()>,
    empfaenger: JoinHandle<()>,
}

impl Laufzeit {
    /// Weckt den im `recv_from` blockierten Empfaenger auf
    ///
    /// Ein Datagramm an die eigene lokale Adresse; der Empfaenger sieht
    /// danach das geloeschte Lauf-Flag und beendet sich.
    fn aufwecken(&self) {
        if let Ok(lokal) = self.shared.socket.local_addr() {
            if let Ok(wecker) = UdpSocket::bind(("127.0.0.1", 0)) {
                let _ = wecker.send_to(&[0u8], ("127.0.0.1", lokal.port()));
            }
        }
    }
}

/// VoIP-Client
///
/// Lebenszyklus: erstellt (idle) -> `start()` -> laufend -> `stop()`
/// (idempotent, auch vom Drop aufgerufen). Nach einem fehlgeschlagenen
/// `start()` bleibt der Client wiederverwendbar.
pub struct VoipClient {
    engine: AudioEngine,
    laufzeit: Option<Laufzeit>,
}

impl VoipClient {
    /// Erstellt einen Client mit der gegebenen Engine-Konfiguration
    pub fn neu(config: EngineConfig) -> Self {
        Self {
            engine: AudioEngine::neu(config),
            laufzeit: None,
        }
    }

    /// Prueft ob der Client laeuft
    pub fn is_running(&self) -> bool {
        self.laufzeit
            .as_ref()
            .map(|l| l.shared.is_running.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Startet die Sitzung
    ///
    /// Reihenfolge: Adresse aufloesen, Socket oeffnen, Engine starten,
    /// Registrierungs-Datagramm senden, Netzwerk-Threads starten.
    /// Schlaegt ein Schritt fehl, wird der bereits aufgebaute Zustand
    /// vollstaendig zurueckgerollt.
    pub fn start(&mut self, options: StartOptions, sink: EventSink) -> Result<()> {
        if self.is_running() {
            return Err(SprechfunkError::LaeuftBereits);
        }

        // Erste IPv4-Adresse des Relays (IPv6 ist bewusst aussen vor)
        let ziel = format!("{}:{}", options.relay_server.ip, options.relay_server.port);
        let server_endpunkt = ziel
            .to_socket_addrs()
            .map_err(|e| SprechfunkError::AdressAufloesung(format!("{}: {}", ziel, e)))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                SprechfunkError::AdressAufloesung(format!("Keine IPv4-Adresse fuer {}", ziel))
            })?;

        let socket = UdpSocket::bind(("0.0.0.0", 0))?;

        let session_id = SessionId::aus_str(&options.session_id);
        let audio_header = DatagramHeader::neu(session_id, PacketKind::AudioOpus).encode();
        let bridge = HostBridge::neu(sink);

        self.engine
            .start()
            .map_err(|e| SprechfunkError::Audio(e.to_string()))?;

        // Registrierung vor den Audio-Threads: ein Control-JSON-Datagramm
        // registriert den Endpunkt im Relay und informiert die Peers
        let registrierung = encode_datagram(
            &DatagramHeader::neu(session_id, PacketKind::ControlJson),
            options.my_user_info_json.as_bytes(),
        );
        if let Err(e) = socket.send_to(&registrierung, server_endpunkt) {
            self.engine.stop();
            return Err(e.into());
        }

        let shared = Arc::new(NetzShared {
            is_running: AtomicBool::new(true),
            socket,
            server_endpunkt,
            audio_header,
        });

        let sender = {
            let shared = Arc::clone(&shared);
            let handle = self.engine.handle();
            std::thread::Builder::new()
                .name("sprechfunk-sender".into())
                .spawn(move || netz::sender_schleife(shared, handle))
        };
        let sender = match sender {
            Ok(h) => h,
            Err(e) => {
                shared.is_running.store(false, Ordering::SeqCst);
                self.engine.stop();
                return Err(e.into());
            }
        };

        let empfaenger = {
            let shared = Arc::clone(&shared);
            let handle = self.engine.handle();
            let bridge = bridge.clone();
            std::thread::Builder::new()
                .name("sprechfunk-empfaenger".into())
                .spawn(move || netz::empfaenger_schleife(shared, handle, bridge))
        };
        let empfaenger = match empfaenger {
            Ok(h) => h,
            Err(e) => {
                shared.is_running.store(false, Ordering::SeqCst);
                self.engine.stop();
                let _ = sender.join();
                return Err(e.into());
            }
        };

        info!(relay = %server_endpunkt, session = %session_id, "Client gestartet");
        self.laufzeit = Some(Laufzeit {
            shared,
            bridge,
            sender,
            empfaenger,
        });
        Ok(())
    }

    /// Stoppt die Sitzung
    ///
    /// Reihenfolge: Lauf-Flag per CAS loeschen, Engine stoppen (keine
    /// weiteren Callbacks), Empfaenger aufwecken, beide Threads joinen,
    /// genau ein `stopped`-Ereignis melden und die Bruecke freigeben.
    /// Idempotent; weitere Aufrufe sind No-Ops.
    pub fn stop(&mut self) {
        let Some(laufzeit) = self.laufzeit.take() else {
            return;
        };
        if laufzeit
            .shared
            .is_running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.engine.stop();
        laufzeit.aufwecken();
        let _ = laufzeit.sender.join();
        let _ = laufzeit.empfaenger.join();

        laufzeit
            .bridge
            .melden(ClientEvent::Stopped("Sitzung beendet".into()));
        laufzeit.bridge.freigeben();
        debug!("Client gestoppt");
    }
}

impl Drop for VoipClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
