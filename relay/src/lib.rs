//! sprechfunk-relay – Bibliotheks-Root
//!
//! Der Relay-Server leitet Datagramme zwischen den Teilnehmern einer
//! Sitzung weiter, ohne die Nutzdaten zu interpretieren. Die
//! Mitgliedschaft entsteht lazy aus dem Verkehr selbst: wer ein
//! gueltiges Paket schickt, ist drin; wer lange schweigt, fliegt mit
//! der ganzen Sitzung raus.

pub mod config;
pub mod server;
pub mod session;

pub use config::RelayConfig;
pub use server::RelayServer;
pub use session::SessionTable;
