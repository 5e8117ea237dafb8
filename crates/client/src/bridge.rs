//! Host-Bruecke
//!
//! Thread-sicherer Sammelpunkt fuer Ereignisse an den einbettenden
//! Host. Die Auslieferung ist aus Sicht des meldenden Threads synchron
//! und durch den inneren Mutex serialisiert – Ereignisse kommen in der
//! Reihenfolge ihrer Meldung an. Nach `freigeben()` werden weitere
//! Meldungen verworfen.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

use sprechfunk_core::event::ClientEvent;

/// Callback des Hosts fuer Client-Ereignisse
pub type EventSink = Box<dyn Fn(ClientEvent) + Send + Sync>;

/// Bruecke zwischen Worker-Threads und Host
///
/// Klonbar (innerer Arc); alle Klone teilen denselben Sink.
#[derive(Clone)]
pub struct HostBridge {
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl HostBridge {
    /// Erstellt eine neue Bruecke mit dem gegebenen Sink
    pub fn neu(sink: EventSink) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(sink))),
        }
    }

    /// Meldet ein Ereignis an den Host
    ///
    /// Blockiert bis der Host-Callback zurueckkehrt. Nach `freigeben()`
    /// ein No-Op.
    pub fn melden(&self, event: ClientEvent) {
        let sink = self.sink.lock();
        match sink.as_ref() {
            Some(callback) => callback(event),
            None => trace!(typ = event.typ(), "Ereignis nach Freigabe verworfen"),
        }
    }

    /// Gibt den Sink frei; weitere Ereignisse werden verworfen
    pub fn freigeben(&self) {
        self.sink.lock().take();
    }

    /// Prueft ob die Bruecke bereits freigegeben wurde
    pub fn ist_freigegeben(&self) -> bool {
        self.sink.lock().is_none()
    }
}
