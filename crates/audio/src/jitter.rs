//! Jitter-Buffer mit Wasserstand-Politik
//!
//! Begrenzte FIFO komprimierter Pakete, die Netzwerk-Jitter gegen
//! Latenz eintauscht. Wird ausschliesslich vom Playback-Callback
//! verwendet und braucht daher keine Synchronisation.
//!
//! ## Politik
//! - `push`: bei vollem Puffer wird das aelteste Paket verworfen, dann
//!   angehaengt. So wird bei einem Burst das abgestandenste Audio
//!   abgeworfen und die Ende-zu-Ende-Latenz bleibt nahe am Ziel.
//! - `pop`: liefert erst ein Paket, wenn der Fuellstand das Ziel
//!   erreicht hat (Pre-Roll). Nach einem Underrun pausiert die Ausgabe
//!   also, bis der Puffer wieder aufgefuellt ist – die asymmetrischen
//!   Wasserstaende (Ziel, Maximum) bilden eine Hysterese, die staendiges
//!   Pendeln zwischen leer und einem einzelnen Paket verhindert.
//!
//! Pakete tragen keine Sequenznummern; der Puffer behandelt sie als
//! austauschbar und kann Verluste weder erkennen noch melden. Bei
//! Unterschreitung des Ziels dekodiert der Aufrufer mit Null-Paket
//! (Packet Loss Concealment).

use crate::queue::Packet;
use std::collections::VecDeque;

/// Statistiken des Jitter-Buffers (Snapshot)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterStatistik {
    /// Anzahl aufgenommener Pakete gesamt
    pub empfangen: u64,
    /// Anzahl bei Ueberlauf verworfener Pakete
    pub verworfen: u64,
    /// Anzahl entnommener Pakete
    pub abgespielt: u64,
    /// Anzahl Entnahmeversuche unterhalb des Ziel-Fuellstands
    pub underruns: u64,
}

/// Begrenzter Paket-Puffer mit Pre-Roll-Wasserstand
pub struct JitterBuffer {
    puffer: VecDeque<Packet>,
    ziel: usize,
    max: usize,
    statistik: JitterStatistik,
}

impl JitterBuffer {
    /// Erstellt einen Jitter-Buffer mit Ziel- und Maximal-Fuellstand
    ///
    /// Das Ziel wird auf mindestens 1 angehoben, das Maximum nie unter
    /// das Ziel gesenkt.
    pub fn neu(ziel_pakete: usize, max_pakete: usize) -> Self {
        let ziel = ziel_pakete.max(1);
        Self {
            puffer: VecDeque::with_capacity(ziel.max(max_pakete)),
            ziel,
            max: max_pakete.max(ziel),
            statistik: JitterStatistik::default(),
        }
    }

    /// Nimmt ein Paket auf; bei vollem Puffer wird das aelteste verworfen
    pub fn push(&mut self, paket: Packet) {
        if self.puffer.len() >= self.max {
            self.puffer.pop_front();
            self.statistik.verworfen += 1;
        }
        self.puffer.push_back(paket);
        self.statistik.empfangen += 1;
    }

    /// Entnimmt das aelteste Paket, sofern der Ziel-Fuellstand erreicht ist
    pub fn pop(&mut self) -> Option<Packet> {
        if self.puffer.len() >= self.ziel {
            self.statistik.abgespielt += 1;
            self.puffer.pop_front()
        } else {
            self.statistik.underruns += 1;
            None
        }
    }

    /// Aktueller Fuellstand in Paketen
    pub fn len(&self) -> usize {
        self.puffer.len()
    }

    /// Prueft ob der Puffer leer ist
    pub fn is_empty(&self) -> bool {
        self.puffer.is_empty()
    }

    /// Verwirft alle Pakete
    pub fn clear(&mut self) {
        self.puffer.clear();
    }

    /// Gibt die aktuellen Statistiken zurueck
    pub fn statistik(&self) -> &JitterStatistik {
        &self.statistik
    }
}
