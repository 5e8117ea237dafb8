//! Host-Ereignisse
//!
//! Ereignisse die der Client asynchron an den einbettenden Host meldet.
//! Die serde-Form entspricht exakt dem Host-Vertrag `{type, data}`.

use serde::{Deserialize, Serialize};

/// Ereignis vom Client an den Host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Weitergeleitete Control-JSON-Nachricht eines Peers
    Notification(String),
    /// Fataler Netzwerkfehler (Empfaenger-Thread beendet sich)
    Error(String),
    /// Sitzung beendet (genau einmal pro Stop)
    Stopped(String),
}

impl ClientEvent {
    /// Gibt den Ereignistyp als Host-String zurueck
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::Error(_) => "error",
            Self::Stopped(_) => "stopped",
        }
    }

    /// Gibt die Nutzdaten des Ereignisses zurueck
    pub fn daten(&self) -> &str {
        match self {
            Self::Notification(d) | Self::Error(d) | Self::Stopped(d) => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serde_form_entspricht_host_vertrag() {
        let event = ClientEvent::Notification("{\"user\":\"anna\"}".into());
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["data"], "{\"user\":\"anna\"}");
    }

    #[test]
    fn event_typ_und_daten() {
        let event = ClientEvent::Stopped("Sitzung beendet".into());
        assert_eq!(event.typ(), "stopped");
        assert_eq!(event.daten(), "Sitzung beendet");
    }

    #[test]
    fn event_round_trip() {
        let event = ClientEvent::Error("recv fehlgeschlagen".into());
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, zurueck);
    }
}
