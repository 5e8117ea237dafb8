//! Opus Encoder/Decoder Wrapper
//!
//! Kapselt audiopus hinter einer i16-PCM-API ohne Allokationen auf dem
//! Hot Path: Encoder und Decoder schreiben in vom Aufrufer gestellte
//! Puffer. Konfiguriert wird ueber `EngineConfig` (VoIP-Profil).

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use tracing::debug;

use crate::error::{AudioError, AudioResult};
use sprechfunk_core::config::EngineConfig;

/// Opus-Encoder: kodiert i16-PCM zu komprimierten Bytes
pub struct OpusEncoder {
    encoder: Encoder,
    frame_size: usize,
    channels: usize,
}

impl OpusEncoder {
    /// Erstellt einen Encoder im VoIP-Profil mit der konfigurierten Bitrate
    pub fn neu(config: &EngineConfig) -> AudioResult<Self> {
        config.validieren().map_err(AudioError::Konfiguration)?;

        let mut encoder = Encoder::new(
            rate_zu_audiopus(config.sample_rate)?,
            channels_zu_audiopus(config.channels),
            Application::Voip,
        )
        .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(Bitrate::BitsPerSecond(config.opus_bitrate_bps as i32))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_size = config.frames_per_callback();
        debug!(
            bitrate_bps = config.opus_bitrate_bps,
            frame_size, "OpusEncoder erstellt"
        );

        Ok(Self {
            encoder,
            frame_size,
            channels: config.channels as usize,
        })
    }

    /// Kodiert einen PCM-Frame in den Zielpuffer
    ///
    /// Die Eingabe muss exakt `frame_size() * Kanaele` Samples lang sein.
    /// Gibt die Anzahl der geschriebenen Bytes zurueck.
    pub fn encode_into(&mut self, pcm: &[i16], ziel: &mut [u8]) -> AudioResult<usize> {
        if pcm.len() != self.frame_size * self.channels {
            return Err(AudioError::Konfiguration(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                self.frame_size * self.channels,
                pcm.len()
            )));
        }

        self.encoder
            .encode(pcm, ziel)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))
    }

    /// Erwartete Frame-Groesse in Samples pro Kanal
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Opus-Decoder: dekodiert komprimierte Bytes zu i16-PCM
pub struct OpusDecoder {
    decoder: Decoder,
    frame_size: usize,
    channels: usize,
}

impl OpusDecoder {
    /// Erstellt einen Decoder fuer die konfigurierte Rate und Kanalanzahl
    pub fn neu(config: &EngineConfig) -> AudioResult<Self> {
        let decoder = Decoder::new(
            rate_zu_audiopus(config.sample_rate)?,
            channels_zu_audiopus(config.channels),
        )
        .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_size = config.frames_per_callback();
        debug!(frame_size, "OpusDecoder erstellt");

        Ok(Self {
            decoder,
            frame_size,
            channels: config.channels as usize,
        })
    }

    /// Dekodiert ein Paket in den Zielpuffer
    ///
    /// `None` fordert Packet Loss Concealment an: der Decoder
    /// synthetisiert einen Ersatz-Frame aus seinem Zustand. Gibt die
    /// Anzahl der dekodierten Samples pro Kanal zurueck; der Aufrufer
    /// vergleicht sie mit `frame_size()` und greift bei Abweichung auf
    /// Stille zurueck.
    pub fn decode_into(&mut self, paket: Option<&[u8]>, ziel: &mut [i16]) -> AudioResult<usize> {
        self.decoder
            .decode(paket, ziel, false)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))
    }

    /// Erwartete Frame-Groesse in Samples pro Kanal
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Kanalanzahl des Decoders
    pub fn channels(&self) -> usize {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn rate_zu_audiopus(rate: u32) -> AudioResult<SampleRate> {
    match rate {
        8000 => Ok(SampleRate::Hz8000),
        12000 => Ok(SampleRate::Hz12000),
        16000 => Ok(SampleRate::Hz16000),
        24000 => Ok(SampleRate::Hz24000),
        48000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::Konfiguration(format!(
            "Abtastrate {} Hz wird von Opus nicht unterstuetzt",
            andere
        ))),
    }
}

fn channels_zu_audiopus(channels: u16) -> Channels {
    match channels {
        2 => Channels::Stereo,
        _ => Channels::Mono,
    }
}
