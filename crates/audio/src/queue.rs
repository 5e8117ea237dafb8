//! Thread-sichere Paket-Queue
//!
//! Unbegrenzte FIFO-Queue zwischen dem Audio-Callback und den
//! Netzwerk-Threads. `push` blockiert nie – das ist Absicht: die Queue
//! tauscht unbegrenztes Wachstum gegen einen garantiert nicht
//! blockierenden Echtzeit-Callback. Im stationaeren Betrieb laufen
//! Produzent und Konsument mit derselben Paketrate, die Tiefe bleibt
//! also O(1).

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Ein komprimiertes Audio-Paket
///
/// Opake Opus-Bytes (1..=1276). Der Besitz ist eindeutig: vom Encoder
/// erzeugt, genau einmal vom Sender oder Decoder konsumiert. Pakete
/// wandern per Move zwischen Threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Komprimierte Nutzdaten
    pub daten: Vec<u8>,
}

impl Packet {
    /// Kopiert komprimierte Bytes aus einem (Stack-)Puffer in ein Paket
    pub fn aus_slice(bytes: &[u8]) -> Self {
        Self {
            daten: bytes.to_vec(),
        }
    }

    /// Laenge der Nutzdaten in Bytes
    pub fn laenge(&self) -> usize {
        self.daten.len()
    }
}

/// Mutex-geschuetzte FIFO-Queue fuer Pakete
///
/// Ein Produzent, ein Konsument. Die Mutex-Haltezeiten sind O(µs) –
/// kurz genug fuer den Audio-Callback.
#[derive(Debug, Default)]
pub struct PacketQueue {
    queue: Mutex<VecDeque<Packet>>,
}

impl PacketQueue {
    /// Erstellt eine neue leere Queue
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt ein Paket hinten an – blockiert nie, schlaegt nie fehl
    pub fn push(&self, paket: Packet) {
        self.queue.lock().push_back(paket);
    }

    /// Entnimmt das vorderste Paket, falls vorhanden (nicht blockierend)
    pub fn try_pop(&self) -> Option<Packet> {
        self.queue.lock().pop_front()
    }

    /// Aktuelle Anzahl der Pakete
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Prueft ob die Queue leer ist
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Verwirft alle Pakete (Teil von `stop()`)
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}
