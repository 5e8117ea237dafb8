//! sprechfunk-client – VoIP-Client
//!
//! Verbindet die Audio-Engine mit dem Relay: zwei Netzwerk-Threads
//! (Sender und Empfaenger) auf einem unverbundenen UDP-Socket, dazu die
//! Host-Bruecke fuer asynchrone Ereignisse an den einbettenden Host.

pub mod bridge;
mod netz;
pub mod voip;

pub use bridge::{EventSink, HostBridge};
pub use voip::{RelayAdresse, StartOptions, VoipClient};
