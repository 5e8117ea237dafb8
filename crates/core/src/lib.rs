//! sprechfunk-core – Gemeinsame Typen, Konfiguration und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Sprechfunk-Crates gemeinsam genutzt werden.

pub mod config;
pub mod error;
pub mod event;

// Re-Exporte fuer bequemen Zugriff
pub use config::EngineConfig;
pub use error::{Result, SprechfunkError};
pub use event::ClientEvent;
