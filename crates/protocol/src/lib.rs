//! sprechfunk-protocol – Wire-Format des UDP-Protokolls
//!
//! Definiert den 25-Byte-Paketkopf (Session-ID, Magic-Token, Pakettyp)
//! den Client und Relay in beiden Richtungen verwenden.

pub mod wire;

pub use wire::{
    encode_datagram, DatagramHeader, PacketKind, SessionId, FULL_HEADER_LEN, HEADER_LEN,
    MAGIC_TOKEN, MAX_DATAGRAM_LEN, MAX_NUTZDATEN_LAENGE, SESSION_ID_LEN, TOKEN_LEN,
};
