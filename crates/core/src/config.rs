//! Engine-Konfiguration
//!
//! Alle Parameter der Client-Audio-Pipeline. Die Konfiguration ist nach
//! der Konstruktion unveraenderlich; abgeleitete Groessen (Samples pro
//! Callback, Jitter-Wasserstaende in Paketen) werden hier berechnet.
//!
//! PCM ist durchgehend i16 – das ist das native Opus-Eingabeformat und
//! vermeidet eine Float-Konvertierung auf dem Hot Path.

use serde::{Deserialize, Serialize};

/// Maximale Groesse eines komprimierten Opus-Paketes in Bytes
pub const MAX_OPUS_PAKET_BYTES: usize = 1276;

/// Maximale Frame-Groesse in Samples die Opus verarbeiten kann (120ms bei 48kHz)
pub const MAX_OPUS_FRAME_SAMPLES: usize = 5760;

/// Von Opus unterstuetzte Abtastraten
const OPUS_ABTASTRATEN: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Konfiguration der Audio-Engine
///
/// Standardwerte: 48 kHz Mono, 20ms-Frames, 48 kbit/s, Jitter-Ziel 60ms
/// bei maximal 200ms Pufferung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Abtastrate in Hz (muss eine Opus-Rate sein)
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub channels: u16,
    /// Frame-Dauer in Millisekunden
    pub frame_duration_ms: u32,
    /// Ziel-Bitrate des Opus-Encoders in bit/s
    pub opus_bitrate_bps: u32,
    /// Ziel-Fuellstand des Jitter-Buffers in Millisekunden
    pub jitter_target_ms: u32,
    /// Maximaler Fuellstand des Jitter-Buffers in Millisekunden
    pub jitter_max_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            frame_duration_ms: 20,
            opus_bitrate_bps: 48000,
            jitter_target_ms: 60,
            jitter_max_ms: 200,
        }
    }
}

/// Rechnet Millisekunden in Paketanzahl um (mindestens 1)
fn ms_zu_paketen(ms: u32, frame_duration_ms: u32) -> usize {
    (ms / frame_duration_ms.max(1)).max(1) as usize
}

impl EngineConfig {
    /// Anzahl der PCM-Samples pro Callback-Frame (pro Kanal)
    pub fn frames_per_callback(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }

    /// Ziel-Fuellstand des Jitter-Buffers in Paketen
    pub fn target_packets(&self) -> usize {
        ms_zu_paketen(self.jitter_target_ms, self.frame_duration_ms)
    }

    /// Maximaler Fuellstand des Jitter-Buffers in Paketen (nie unter dem Ziel)
    pub fn max_packets(&self) -> usize {
        self.target_packets()
            .max(ms_zu_paketen(self.jitter_max_ms, self.frame_duration_ms))
    }

    /// Validiert die Konfiguration
    ///
    /// Prueft die Opus-Grenzen (Abtastrate, Bitrate, Frame-Groesse) und
    /// dass die abgeleiteten Jitter-Wasserstaende konsistent sind.
    pub fn validieren(&self) -> Result<(), String> {
        if !OPUS_ABTASTRATEN.contains(&self.sample_rate) {
            return Err(format!(
                "Abtastrate {} Hz wird von Opus nicht unterstuetzt",
                self.sample_rate
            ));
        }
        if self.channels != 1 && self.channels != 2 {
            return Err(format!(
                "Kanalanzahl muss 1 oder 2 sein (war: {})",
                self.channels
            ));
        }
        if self.frame_duration_ms == 0 {
            return Err("Frame-Dauer darf nicht 0 sein".into());
        }
        let frames = self.frames_per_callback();
        if frames == 0 || frames > MAX_OPUS_FRAME_SAMPLES {
            return Err(format!(
                "Frame-Groesse {} Samples ausserhalb des Opus-Bereichs (1..={})",
                frames, MAX_OPUS_FRAME_SAMPLES
            ));
        }
        if self.opus_bitrate_bps < 6_000 || self.opus_bitrate_bps > 510_000 {
            return Err(format!(
                "Bitrate muss zwischen 6000 und 510000 bit/s liegen (war: {})",
                self.opus_bitrate_bps
            ));
        }
        if self.jitter_target_ms == 0 {
            return Err("Jitter-Ziel darf nicht 0 sein".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let config = EngineConfig::default();
        assert!(config.validieren().is_ok());
        assert_eq!(config.frames_per_callback(), 960);
        assert_eq!(config.target_packets(), 3);
        assert_eq!(config.max_packets(), 10);
    }

    #[test]
    fn wasserstaende_nie_unter_eins() {
        let config = EngineConfig {
            jitter_target_ms: 5, // kleiner als eine Frame-Dauer
            ..Default::default()
        };
        assert_eq!(config.target_packets(), 1);
        assert!(config.max_packets() >= config.target_packets());
    }

    #[test]
    fn max_nie_unter_ziel() {
        let config = EngineConfig {
            jitter_target_ms: 100,
            jitter_max_ms: 40, // kleiner als das Ziel
            ..Default::default()
        };
        assert_eq!(config.target_packets(), 5);
        assert_eq!(config.max_packets(), 5);
    }

    #[test]
    fn ungueltige_abtastrate() {
        let config = EngineConfig {
            sample_rate: 44100,
            ..Default::default()
        };
        assert!(config.validieren().is_err());
    }

    #[test]
    fn ungueltige_kanalanzahl() {
        let config = EngineConfig {
            channels: 3,
            ..Default::default()
        };
        assert!(config.validieren().is_err());
    }

    #[test]
    fn frame_dauer_null_abgelehnt() {
        let config = EngineConfig {
            frame_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validieren().is_err());
    }

    #[test]
    fn bitrate_grenzen() {
        let zu_niedrig = EngineConfig {
            opus_bitrate_bps: 1000,
            ..Default::default()
        };
        assert!(zu_niedrig.validieren().is_err());

        let zu_hoch = EngineConfig {
            opus_bitrate_bps: 600_000,
            ..Default::default()
        };
        assert!(zu_hoch.validieren().is_err());
    }

    #[test]
    fn frame_groesse_obergrenze() {
        // 120ms bei 48kHz = 5760 Samples ist noch erlaubt
        let grenzfall = EngineConfig {
            frame_duration_ms: 120,
            ..Default::default()
        };
        assert!(grenzfall.validieren().is_ok());

        let zu_gross = EngineConfig {
            frame_duration_ms: 140,
            ..Default::default()
        };
        assert!(zu_gross.validieren().is_err());
    }

    #[test]
    fn stereo_frame_groesse_pro_kanal() {
        let config = EngineConfig {
            channels: 2,
            ..Default::default()
        };
        // frames_per_callback zaehlt pro Kanal, nicht interleaved
        assert_eq!(config.frames_per_callback(), 960);
        assert!(config.validieren().is_ok());
    }

    #[test]
    fn config_ist_serde_kompatibel() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let zurueck: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, zurueck);
    }
}
