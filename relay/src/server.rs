//! UDP-Relay-Server
//!
//! Eine einzelne Empfangs-Loop auf einem gebundenen UDP-Socket:
//! validieren, Absender registrieren, Datagramm unveraendert an alle
//! anderen Teilnehmer der Sitzung weiterreichen. Ein Thread plus ein
//! Socket halten die Sitzungstabelle lock-frei und geben Paketankunft
//! und Aufraeumen eine einzige, wohldefinierte Reihenfolge.
//!
//! Der Reaper laeuft alle `cleanup_paket_intervall` Pakete mit – die
//! Aufraeumkosten haengen damit am Verkehr und brauchen keinen eigenen
//! Timer-Thread.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{error, info, trace, warn};

use crate::config::RelayConfig;
use crate::session::SessionTable;
use sprechfunk_protocol::wire::{
    SessionId, HEADER_LEN, MAGIC_TOKEN, MAX_DATAGRAM_LEN, SESSION_ID_LEN,
};

/// Laufende Zaehler der Empfangs-Loop
#[derive(Debug, Default, Clone)]
struct RelayStatistik {
    empfangen: u64,
    weitergeleitet: u64,
    verworfen: u64,
}

/// Sitzungsmultiplexender UDP-Verteiler
pub struct RelayServer {
    config: RelayConfig,
    socket: UdpSocket,
    sessions: SessionTable,
    paket_zaehler: u32,
    statistik: RelayStatistik,
}

impl RelayServer {
    /// Bindet den UDP-Socket und erstellt den Server
    pub async fn binden(config: RelayConfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(config.bind_adresse()).await?;
        info!(addr = %config.bind_adresse(), "Relay-Socket gebunden");

        Ok(Self {
            config,
            socket,
            sessions: SessionTable::neu(),
            paket_zaehler: 0,
            statistik: RelayStatistik::default(),
        })
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Startet die Empfangs-Loop (blockiert bis zum Shutdown-Signal)
    pub async fn run(mut self, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
        // Wiederverwendeter Empfangspuffer, kein Heap pro Paket
        let mut buf = [0u8; MAX_DATAGRAM_LEN];

        info!("Relay-Empfangs-Loop gestartet");

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((laenge, absender)) => {
                            self.paket_zaehler += 1;
                            if self.paket_zaehler >= self.config.sitzungen.cleanup_paket_intervall {
                                self.sitzungen_aufraeumen();
                                self.paket_zaehler = 0;
                            }
                            self.datagramm_verarbeiten(&buf[..laenge], absender).await;
                        }
                        Err(e) => {
                            error!(fehler = %e, "recv_from fehlgeschlagen");
                            // Kurze Pause gegen Busy-Loop bei persistentem Fehler
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                }

                _ = &mut shutdown_rx => {
                    info!("Relay: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        info!(
            empfangen = self.statistik.empfangen,
            weitergeleitet = self.statistik.weitergeleitet,
            verworfen = self.statistik.verworfen,
            "Relay-Empfangs-Loop beendet"
        );
    }

    /// Verarbeitet ein eingehendes Datagramm (Hot Path, early return)
    async fn datagramm_verarbeiten(&mut self, datagramm: &[u8], absender: SocketAddr) {
        self.statistik.empfangen += 1;

        // Groesse und Token pruefen; das Typ-Byte interessiert das Relay
        // nicht – es leitet Audio und Control gleichermassen weiter
        if datagramm.len() <= HEADER_LEN {
            self.statistik.verworfen += 1;
            return;
        }
        if datagramm[SESSION_ID_LEN..HEADER_LEN] != MAGIC_TOKEN {
            self.statistik.verworfen += 1;
            trace!(absender = %absender, "Magic-Token ungueltig, Datagramm verworfen");
            return;
        }

        // Session-ID verbatim, inklusive eventueller Null-Auffuellung
        let session_id = SessionId::aus_bytes(datagramm);
        let peers = self.sessions.registrieren_und_peers(session_id, absender);

        for peer in &peers {
            match self.socket.send_to(datagramm, peer).await {
                Ok(_) => self.statistik.weitergeleitet += 1,
                Err(e) => warn!(fehler = %e, ziel = %peer, "send_to fehlgeschlagen"),
            }
        }

        trace!(
            session = %session_id,
            absender = %absender,
            bytes = datagramm.len(),
            empfaenger = peers.len(),
            "Datagramm weitergeleitet"
        );
    }

    /// Entfernt Sitzungen die laenger als das Timeout still waren
    fn sitzungen_aufraeumen(&mut self) {
        let timeout = Duration::from_secs(self.config.sitzungen.timeout_s);
        let entfernt = self.sessions.aufraeumen(timeout);
        if entfernt > 0 {
            info!(
                entfernt,
                aktiv = self.sessions.len(),
                empfangen = self.statistik.empfangen,
                weitergeleitet = self.statistik.weitergeleitet,
                verworfen = self.statistik.verworfen,
                "Inaktive Sitzungen entfernt"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sprechfunk_protocol::wire::{encode_datagram, DatagramHeader, PacketKind};
    use tokio::time::timeout;

    const KURZ: Duration = Duration::from_millis(300);

    fn test_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = 0; // OS waehlt
        config
    }

    async fn test_server(
        config: RelayConfig,
    ) -> (SocketAddr, tokio::sync::oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let server = RelayServer::binden(config)
            .await
            .expect("Server muss binden koennen");
        let addr = server.lokale_adresse().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(server.run(shutdown_rx));
        (addr, shutdown_tx, task)
    }

    fn audio_datagramm(session: &str, nutzdaten: &[u8]) -> Vec<u8> {
        encode_datagram(
            &DatagramHeader::neu(SessionId::aus_str(session), PacketKind::AudioOpus),
            nutzdaten,
        )
    }

    #[tokio::test]
    async fn binden_auf_port_null() {
        let (addr, shutdown_tx, task) = test_server(test_config()).await;
        assert_ne!(addr.port(), 0, "OS muss einen Port zuweisen");
        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn fan_out_byte_identisch() {
        let (relay_addr, shutdown_tx, task) = test_server(test_config()).await;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // Beide registrieren sich durch ihr erstes Paket
        let paket_a = audio_datagramm("roomA", &[0xA1, 0xA2, 0xA3]);
        a.send_to(&paket_a, relay_addr).await.unwrap();

        let paket_b = audio_datagramm("roomA", &[0xB1]);
        b.send_to(&paket_b, relay_addr).await.unwrap();

        // B war beim ersten Paket von A noch unbekannt; A bekommt B's Paket
        let mut puffer = [0u8; MAX_DATAGRAM_LEN];
        let (laenge, von) = timeout(KURZ, a.recv_from(&mut puffer))
            .await
            .expect("A muss B's Paket erhalten")
            .unwrap();
        assert_eq!(von, relay_addr);
        assert_eq!(&puffer[..laenge], &paket_b[..], "Weiterleitung byte-identisch");

        // Jetzt kennt das Relay beide: A's naechstes Paket erreicht B
        let paket_a2 = audio_datagramm("roomA", &[0xA9; 100]);
        a.send_to(&paket_a2, relay_addr).await.unwrap();
        let (laenge, _) = timeout(KURZ, b.recv_from(&mut puffer))
            .await
            .expect("B muss A's Paket erhalten")
            .unwrap();
        assert_eq!(&puffer[..laenge], &paket_a2[..]);

        // Kein Echo an den Absender
        assert!(timeout(KURZ, b.recv_from(&mut puffer)).await.is_err());

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn sitzungen_sind_getrennt() {
        let (relay_addr, shutdown_tx, task) = test_server(test_config()).await;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        a.send_to(&audio_datagramm("roomA", &[1]), relay_addr)
            .await
            .unwrap();
        b.send_to(&audio_datagramm("roomB", &[2]), relay_addr)
            .await
            .unwrap();
        a.send_to(&audio_datagramm("roomA", &[3]), relay_addr)
            .await
            .unwrap();

        // B ist in einer anderen Sitzung und darf nichts erhalten
        let mut puffer = [0u8; MAX_DATAGRAM_LEN];
        assert!(timeout(KURZ, b.recv_from(&mut puffer)).await.is_err());

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn falsches_token_wird_verworfen() {
        let (relay_addr, shutdown_tx, task) = test_server(test_config()).await;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // A und B registrieren sich gueltig
        a.send_to(&audio_datagramm("roomA", &[1]), relay_addr)
            .await
            .unwrap();
        b.send_to(&audio_datagramm("roomA", &[2]), relay_addr)
            .await
            .unwrap();
        let mut puffer = [0u8; MAX_DATAGRAM_LEN];
        let _ = timeout(KURZ, a.recv_from(&mut puffer)).await.unwrap();

        // 1500-Byte-Datagramm mit genulltem Token: niemand erhaelt etwas
        let mut kaputt = vec![0u8; MAX_DATAGRAM_LEN];
        kaputt[..SESSION_ID_LEN].copy_from_slice(SessionId::aus_str("roomA").bytes());
        b.send_to(&kaputt, relay_addr).await.unwrap();
        assert!(timeout(KURZ, a.recv_from(&mut puffer)).await.is_err());

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn kopflange_datagramme_abgelehnt() {
        let (relay_addr, shutdown_tx, task) = test_server(test_config()).await;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        a.send_to(&audio_datagramm("roomA", &[1]), relay_addr)
            .await
            .unwrap();

        // Exakt 24 Bytes (Session-ID + Token, kein Typ-Byte): verworfen,
        // B landet nicht in der Sitzung
        let mut nur_kopf = vec![0u8; HEADER_LEN];
        nur_kopf[..SESSION_ID_LEN].copy_from_slice(SessionId::aus_str("roomA").bytes());
        nur_kopf[SESSION_ID_LEN..HEADER_LEN].copy_from_slice(&MAGIC_TOKEN);
        b.send_to(&nur_kopf, relay_addr).await.unwrap();

        a.send_to(&audio_datagramm("roomA", &[2]), relay_addr)
            .await
            .unwrap();
        let mut puffer = [0u8; MAX_DATAGRAM_LEN];
        assert!(
            timeout(KURZ, b.recv_from(&mut puffer)).await.is_err(),
            "Kopflanges Datagramm darf nicht registrieren"
        );

        // 25 Bytes (Kopf + Typ, keine Nutzdaten) ist fuer das Relay
        // bereits gueltig und registriert den Absender
        let mut mit_typ = nur_kopf.clone();
        mit_typ.push(0x01);
        b.send_to(&mit_typ, relay_addr).await.unwrap();
        let (laenge, _) = timeout(KURZ, a.recv_from(&mut puffer))
            .await
            .expect("25-Byte-Datagramm muss weitergeleitet werden")
            .unwrap();
        assert_eq!(&puffer[..laenge], &mit_typ[..]);

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn reaper_entfernt_stille_sitzung() {
        let mut config = test_config();
        config.sitzungen.timeout_s = 0; // jede Pause zaehlt als inaktiv
        config.sitzungen.cleanup_paket_intervall = 2;
        let (relay_addr, shutdown_tx, task) = test_server(config).await;

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // A registriert sich, dann Funkstille
        a.send_to(&audio_datagramm("roomA", &[1]), relay_addr)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // B's Paket ist das zweite: der Reaper laeuft vorher und
        // entfernt die verwaiste Sitzung mitsamt A
        b.send_to(&audio_datagramm("roomA", &[2]), relay_addr)
            .await
            .unwrap();
        let mut puffer = [0u8; MAX_DATAGRAM_LEN];
        assert!(
            timeout(KURZ, a.recv_from(&mut puffer)).await.is_err(),
            "A wurde mit der Sitzung entfernt und darf nichts erhalten"
        );

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_beendet_die_loop() {
        let (_, shutdown_tx, task) = test_server(test_config()).await;
        let _ = shutdown_tx.send(());
        timeout(Duration::from_secs(2), task)
            .await
            .expect("Loop muss auf das Signal reagieren")
            .unwrap();
    }
}
