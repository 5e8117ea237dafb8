//! Sitzungstabelle
//!
//! In-Memory-Zustand aller aktiven Sitzungen. Gehoert exklusiv der
//! Empfangs-Loop (Single-Thread-Entwurf) und braucht deshalb keine
//! Synchronisation.
//!
//! Zustandsautomat einer Sitzung:
//! `abwesend -> aktiv` beim ersten gueltigen Paket, jedes weitere Paket
//! frischt `last_seen` auf, `aktiv -> abwesend` wenn der Reaper sie
//! nach Ablauf des Timeouts entfernt.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;

use sprechfunk_protocol::wire::SessionId;

/// Eine aktive Sitzung
///
/// Invariante: eine gespeicherte Sitzung hat immer mindestens einen
/// Teilnehmer, und `last_seen` faellt nie zurueck.
struct Session {
    /// Teilnehmer, indexiert nach textuellem "ip:port"-Schluessel
    teilnehmer: BTreeMap<String, SocketAddr>,
    /// Zeitpunkt des letzten gueltigen Pakets
    last_seen: Instant,
}

/// Textueller Identitaetsschluessel eines Endpunkts
fn endpunkt_schluessel(addr: &SocketAddr) -> String {
    format!("{}:{}", addr.ip(), addr.port())
}

/// Tabelle aller aktiven Sitzungen
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
}

impl SessionTable {
    /// Erstellt eine leere Tabelle
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert den Absender in seiner Sitzung und liefert die Peers
    ///
    /// Legt die Sitzung beim ersten Paket an, frischt `last_seen` auf
    /// und traegt den Absender idempotent ein. Zurueck kommen alle
    /// Teilnehmer deren Schluessel sich vom Absender unterscheidet.
    pub fn registrieren_und_peers(
        &mut self,
        session_id: SessionId,
        absender: SocketAddr,
    ) -> Vec<SocketAddr> {
        let schluessel = endpunkt_schluessel(&absender);
        let session = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| Session {
                teilnehmer: BTreeMap::new(),
                last_seen: Instant::now(),
            });

        session.last_seen = Instant::now();
        session
            .teilnehmer
            .entry(schluessel.clone())
            .or_insert(absender);

        session
            .teilnehmer
            .iter()
            .filter(|(k, _)| **k != schluessel)
            .map(|(_, addr)| *addr)
            .collect()
    }

    /// Entfernt Sitzungen ohne Paket seit `timeout`
    ///
    /// Gibt die Anzahl der entfernten Sitzungen zurueck.
    pub fn aufraeumen(&mut self, timeout: Duration) -> usize {
        let vorher = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_seen.elapsed() <= timeout);
        let entfernt = vorher - self.sessions.len();
        if entfernt > 0 {
            debug!(entfernt, aktiv = self.sessions.len(), "Sitzungen aufgeraeumt");
        }
        entfernt
    }

    /// Anzahl der aktiven Sitzungen
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Prueft ob die Tabelle leer ist
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Anzahl der Teilnehmer einer Sitzung (0 wenn unbekannt)
    pub fn teilnehmer_anzahl(&self, session_id: &SessionId) -> usize {
        self.sessions
            .get(session_id)
            .map(|s| s.teilnehmer.len())
            .unwrap_or(0)
    }
}
