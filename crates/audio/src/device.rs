//! Audio-Geraete-Auswahl
//!
//! Die Engine arbeitet auf den Standard-Geraeten des cpal-Hosts.
//! Hier liegt die Format-Verhandlung: gewuenscht ist i16, Geraete die
//! nur f32 liefern werden im Callback konvertiert.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use tracing::debug;

use crate::error::{AudioError, AudioResult};
use sprechfunk_core::config::EngineConfig;

/// Gibt das Standard-Eingabegeraet zurueck
pub fn standard_eingabegeraet() -> AudioResult<Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or(AudioError::KeinStandardEingabegeraet)
}

/// Gibt das Standard-Ausgabegeraet zurueck
pub fn standard_ausgabegeraet() -> AudioResult<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::KeinStandardAusgabegeraet)
}

/// Baut die cpal-Stream-Konfiguration mit der berechneten Periodenlaenge
pub fn stream_config(config: &EngineConfig) -> StreamConfig {
    StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config.frames_per_callback() as u32),
    }
}

/// Ermittelt das Sample-Format fuer den Eingabe-Stream
///
/// Sucht eine unterstuetzte Konfiguration die Abtastrate und Kanalanzahl
/// abdeckt; ohne Treffer wird f32 angenommen (cpal-Standard).
pub fn eingabe_sample_format(device: &Device, config: &EngineConfig) -> AudioResult<SampleFormat> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate
                && c.max_sample_rate().0 >= config.sample_rate
                && c.channels() >= config.channels
        });

    let format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);
    debug!(?format, "Eingabe-Sample-Format gewaehlt");
    Ok(format)
}

/// Ermittelt das Sample-Format fuer den Ausgabe-Stream
pub fn ausgabe_sample_format(device: &Device, config: &EngineConfig) -> AudioResult<SampleFormat> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate
                && c.max_sample_rate().0 >= config.sample_rate
                && c.channels() >= config.channels
        });

    let format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);
    debug!(?format, "Ausgabe-Sample-Format gewaehlt");
    Ok(format)
}
