//! UDP-Wire-Format
//!
//! Jedes Datagramm zwischen Client und Relay traegt denselben Kopf.
//! Direkte Byte-Serialisierung, kein serde (Performance-kritisch).
//!
//! ## Paketformat (Kopf = 25 Bytes)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0      16   Session-ID (rechts mit 0x00 aufgefuellt)
//! 16       8   Magic-Token DE AD BE EF CA FE BA BE
//! 24       1   PacketKind (0x01 = Audio-Opus, 0x02 = Control-JSON)
//! 25+      N   Nutzdaten
//! ```
//!
//! Das Token ist ein Plausibilitaetsfilter gegen fremde Datagramme,
//! keine Authentifizierung.

use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Laenge der Session-ID in Bytes
pub const SESSION_ID_LEN: usize = 16;

/// Laenge des Magic-Tokens in Bytes
pub const TOKEN_LEN: usize = 8;

/// Session-ID + Token (ohne Pakettyp)
pub const HEADER_LEN: usize = SESSION_ID_LEN + TOKEN_LEN;

/// Vollstaendiger Kopf inklusive Pakettyp-Byte
pub const FULL_HEADER_LEN: usize = HEADER_LEN + 1;

/// Maximale Datagramm-Groesse (vermeidet IPv4-Fragmentierung)
pub const MAX_DATAGRAM_LEN: usize = 1500;

/// Maximale Nutzdaten-Laenge eines Audio-Paketes (Opus-Obergrenze)
pub const MAX_NUTZDATEN_LAENGE: usize = 1276;

/// Statisches 8-Byte-Token zur Verwerfung offensichtlich fremder Pakete
pub const MAGIC_TOKEN: [u8; TOKEN_LEN] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE];

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// 16-Byte-Sitzungskennung
///
/// Kuerzere Kennungen werden rechts mit Nullbytes aufgefuellt, laengere
/// abgeschnitten. Der Vergleich erfolgt byteweise inklusive Auffuellung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub [u8; SESSION_ID_LEN]);

impl SessionId {
    /// Erstellt eine Session-ID aus einem UTF-8-String (mit Auffuellung)
    pub fn aus_str(id: &str) -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        let quelle = id.as_bytes();
        let n = quelle.len().min(SESSION_ID_LEN);
        bytes[..n].copy_from_slice(&quelle[..n]);
        Self(bytes)
    }

    /// Liest eine Session-ID verbatim aus den ersten 16 Bytes eines Puffers
    ///
    /// Der Aufrufer muss die Mindestlaenge bereits geprueft haben.
    pub fn aus_bytes(buf: &[u8]) -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        bytes.copy_from_slice(&buf[..SESSION_ID_LEN]);
        Self(bytes)
    }

    /// Gibt die rohen Bytes zurueck
    pub fn bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Druckbarer Praefix bis zum ersten Nullbyte, Rest als Hex
        let ende = self.0.iter().position(|&b| b == 0).unwrap_or(SESSION_ID_LEN);
        match std::str::from_utf8(&self.0[..ende]) {
            Ok(s) if !s.is_empty() => write!(f, "{}", s),
            _ => {
                for b in &self.0 {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PacketKind
// ---------------------------------------------------------------------------

/// Art des Paketes (Byte an Offset 24)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// Komprimierter Opus-Audio-Frame
    AudioOpus = 0x01,
    /// UTF-8 JSON-Steuernachricht (fuer das Relay opak)
    ControlJson = 0x02,
}

impl PacketKind {
    /// Konvertiert ein Byte in einen `PacketKind`
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::AudioOpus),
            0x02 => Some(Self::ControlJson),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DatagramHeader
// ---------------------------------------------------------------------------

/// Vollstaendiger 25-Byte-Paketkopf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Sitzungskennung (verbatim, inklusive Auffuellung)
    pub session_id: SessionId,
    /// Pakettyp
    pub kind: PacketKind,
}

impl DatagramHeader {
    /// Erstellt einen neuen Kopf
    pub fn neu(session_id: SessionId, kind: PacketKind) -> Self {
        Self { session_id, kind }
    }

    /// Serialisiert den Kopf in ein 25-Byte-Array
    pub fn encode(&self) -> [u8; FULL_HEADER_LEN] {
        let mut buf = [0u8; FULL_HEADER_LEN];
        buf[..SESSION_ID_LEN].copy_from_slice(&self.session_id.0);
        buf[SESSION_ID_LEN..HEADER_LEN].copy_from_slice(&MAGIC_TOKEN);
        buf[HEADER_LEN] = self.kind as u8;
        buf
    }

    /// Parst und validiert ein Datagramm, gibt Kopf und Nutzdaten zurueck
    ///
    /// # Fehler
    /// - `InvalidData` wenn das Datagramm nicht laenger als der Kopf ist
    /// - `InvalidData` bei falschem Magic-Token oder unbekanntem Pakettyp
    pub fn parse(datagramm: &[u8]) -> io::Result<(Self, &[u8])> {
        if datagramm.len() <= FULL_HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Datagramm zu kurz: {} Bytes (mindestens {} erwartet)",
                    datagramm.len(),
                    FULL_HEADER_LEN + 1
                ),
            ));
        }

        if datagramm[SESSION_ID_LEN..HEADER_LEN] != MAGIC_TOKEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Magic-Token stimmt nicht ueberein",
            ));
        }

        let kind = PacketKind::from_u8(datagramm[HEADER_LEN]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unbekannter Pakettyp: {:#04x}", datagramm[HEADER_LEN]),
            )
        })?;

        Ok((
            Self {
                session_id: SessionId::aus_bytes(datagramm),
                kind,
            },
            &datagramm[FULL_HEADER_LEN..],
        ))
    }
}

/// Baut ein vollstaendiges Datagramm aus Kopf und Nutzdaten
///
/// Fuer Registrierung und Tests; der Sende-Hot-Path des Clients schreibt
/// stattdessen in einen wiederverwendeten Puffer.
pub fn encode_datagram(header: &DatagramHeader, nutzdaten: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FULL_HEADER_LEN + nutzdaten.len());
    buf.put_slice(&header.encode());
    buf.put_slice(nutzdaten);
    buf.to_vec()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_auffuellung() {
        let id = SessionId::aus_str("roomA");
        assert_eq!(&id.0[..5], b"roomA");
        assert!(id.0[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn session_id_abschneiden() {
        let id = SessionId::aus_str("eine-viel-zu-lange-kennung");
        assert_eq!(&id.0[..], &b"eine-viel-zu-lang"[..SESSION_ID_LEN]);
    }

    #[test]
    fn session_id_exakt_16_bytes() {
        let id = SessionId::aus_str("0123456789abcdef");
        assert_eq!(id.0, *b"0123456789abcdef");
    }

    #[test]
    fn session_id_anzeige() {
        assert_eq!(SessionId::aus_str("roomA").to_string(), "roomA");
    }

    #[test]
    fn header_encode_layout() {
        let header = DatagramHeader::neu(SessionId::aus_str("roomA"), PacketKind::AudioOpus);
        let bytes = header.encode();
        assert_eq!(bytes.len(), FULL_HEADER_LEN);
        assert_eq!(&bytes[..5], b"roomA");
        assert!(bytes[5..SESSION_ID_LEN].iter().all(|&b| b == 0));
        assert_eq!(&bytes[SESSION_ID_LEN..HEADER_LEN], &MAGIC_TOKEN);
        assert_eq!(bytes[HEADER_LEN], 0x01);
    }

    #[test]
    fn header_round_trip() {
        let header = DatagramHeader::neu(SessionId::aus_str("konferenz-7"), PacketKind::ControlJson);
        let datagramm = encode_datagram(&header, b"{\"user\":\"anna\"}");
        let (geparst, nutzdaten) = DatagramHeader::parse(&datagramm).expect("Parse muss gelingen");
        assert_eq!(geparst, header);
        assert_eq!(nutzdaten, b"{\"user\":\"anna\"}");
    }

    #[test]
    fn round_trip_maximale_nutzdaten() {
        let header = DatagramHeader::neu(SessionId::aus_str("x"), PacketKind::AudioOpus);
        let nutzdaten = vec![0xAB; MAX_DATAGRAM_LEN - FULL_HEADER_LEN];
        let datagramm = encode_datagram(&header, &nutzdaten);
        assert_eq!(datagramm.len(), MAX_DATAGRAM_LEN);
        let (_, zurueck) = DatagramHeader::parse(&datagramm).unwrap();
        assert_eq!(zurueck, &nutzdaten[..]);
    }

    #[test]
    fn ein_byte_nutzdaten_akzeptiert() {
        let header = DatagramHeader::neu(SessionId::aus_str("x"), PacketKind::AudioOpus);
        let datagramm = encode_datagram(&header, &[0x42]);
        assert_eq!(datagramm.len(), FULL_HEADER_LEN + 1);
        let (_, nutzdaten) = DatagramHeader::parse(&datagramm).unwrap();
        assert_eq!(nutzdaten, &[0x42]);
    }

    #[test]
    fn leere_nutzdaten_abgelehnt() {
        let header = DatagramHeader::neu(SessionId::aus_str("x"), PacketKind::AudioOpus);
        let datagramm = encode_datagram(&header, &[]);
        assert!(DatagramHeader::parse(&datagramm).is_err());
    }

    #[test]
    fn falsches_token_abgelehnt() {
        let header = DatagramHeader::neu(SessionId::aus_str("x"), PacketKind::AudioOpus);
        let mut datagramm = encode_datagram(&header, &[1, 2, 3]);
        datagramm[SESSION_ID_LEN] = 0x00;
        assert!(DatagramHeader::parse(&datagramm).is_err());
    }

    #[test]
    fn unbekannter_pakettyp_abgelehnt() {
        let header = DatagramHeader::neu(SessionId::aus_str("x"), PacketKind::AudioOpus);
        let mut datagramm = encode_datagram(&header, &[1, 2, 3]);
        datagramm[HEADER_LEN] = 0x7F;
        assert!(DatagramHeader::parse(&datagramm).is_err());
    }

    #[test]
    fn pakettyp_from_u8() {
        assert_eq!(PacketKind::from_u8(0x01), Some(PacketKind::AudioOpus));
        assert_eq!(PacketKind::from_u8(0x02), Some(PacketKind::ControlJson));
        assert_eq!(PacketKind::from_u8(0x00), None);
        assert_eq!(PacketKind::from_u8(0xFF), None);
    }

    #[test]
    fn nutzdaten_obergrenze_passt_ins_datagramm() {
        assert!(FULL_HEADER_LEN + MAX_NUTZDATEN_LAENGE <= MAX_DATAGRAM_LEN);
    }
}
