//! AudioEngine – Echtzeit-Kern der Client-Pipeline
//!
//! Die Engine verbindet Geraet, Codec, Paket-Queues und Jitter-Buffer.
//! cpal stellt getrennte Eingabe- und Ausgabe-Streams bereit; deren
//! Callbacks laufen auf hochprioren Threads, die cpal besitzt, und
//! muessen innerhalb einer Frame-Periode zurueckkehren:
//!
//! - **Capture-Callback**: PCM-Samples sammeln, pro vollem Frame mit
//!   Opus kodieren, Paket in die ausgehende Queue legen.
//! - **Playback-Callback**: eingehende Queue in den Jitter-Buffer
//!   entleeren, ein Paket entnehmen und dekodieren – oder bei
//!   Unterschreitung des Wasserstands Concealment dekodieren.
//!
//! Alle Fehler innerhalb der Callbacks werden geschluckt (Frame
//! verwerfen bzw. Stille ausgeben); der Echtzeit-Vertrag geht vor.
//! Geraete-Fehler meldet cpal ueber die `err_fn` der Streams.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::codec::{OpusDecoder, OpusEncoder};
use crate::device;
use crate::error::{AudioError, AudioResult};
use crate::jitter::JitterBuffer;
use crate::queue::{Packet, PacketQueue};
use sprechfunk_core::config::{EngineConfig, MAX_OPUS_PAKET_BYTES};

// ---------------------------------------------------------------------------
// Geteilter Zustand
// ---------------------------------------------------------------------------

/// Zustand den Callbacks und Netzwerk-Threads gemeinsam nutzen
struct EngineShared {
    /// Laeuft die Engine? CAS bei Uebergaengen, relaxed auf dem Hot Path
    is_running: AtomicBool,
    /// Audio-Callback -> Sender-Thread
    ausgehend: PacketQueue,
    /// Empfaenger-Thread -> Audio-Callback
    eingehend: PacketQueue,
}

/// Leichtgewichtiges, klonbares Handle auf die Engine-Queues
///
/// Die Netzwerk-Threads halten nur dieses Handle, nicht die Engine
/// selbst – die cpal-Streams sind an den Thread des Besitzers gebunden.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    /// Prueft den Laufzustand (relaxed – Hot Path)
    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Relaxed)
    }

    /// Legt ein empfangenes Paket in die eingehende Queue
    pub fn submit_incoming_packet(&self, paket: Packet) {
        self.shared.eingehend.push(paket);
    }

    /// Entnimmt das naechste ausgehende Paket, falls vorhanden
    pub fn next_outgoing_packet(&self) -> Option<Packet> {
        self.shared.ausgehend.try_pop()
    }

    /// Legt ein kodiertes Paket in die ausgehende Queue
    /// (Produzentenseite des Capture-Callbacks)
    pub fn submit_outgoing_packet(&self, paket: Packet) {
        self.shared.ausgehend.push(paket);
    }

    /// Entnimmt das naechste eingehende Paket, falls vorhanden
    /// (Konsumentenseite des Playback-Callbacks)
    pub fn next_incoming_packet(&self) -> Option<Packet> {
        self.shared.eingehend.try_pop()
    }

    /// Aktuelle Tiefe der eingehenden Queue
    pub fn incoming_len(&self) -> usize {
        self.shared.eingehend.len()
    }

    /// Aktuelle Tiefe der ausgehenden Queue
    pub fn outgoing_len(&self) -> usize {
        self.shared.ausgehend.len()
    }
}

// ---------------------------------------------------------------------------
// Capture-Seite
// ---------------------------------------------------------------------------

/// Zustand des Capture-Callbacks
///
/// Sammelt Geraete-Samples im Staging-Puffer und kodiert pro vollem
/// Frame. Der komprimierte Zwischenpuffer ist fest dimensioniert; auf
/// dem Hot Path wird nur fuer das fertige Paket selbst kopiert.
struct CaptureState {
    handle: EngineHandle,
    encoder: OpusEncoder,
    /// Unvollstaendige Frames zwischen zwei Callbacks (vorbelegt)
    staging: Vec<i16>,
    /// Interleaved-Samples pro Frame
    frame_len: usize,
    komprimiert: [u8; MAX_OPUS_PAKET_BYTES],
}

impl CaptureState {
    fn neu(handle: EngineHandle, encoder: OpusEncoder, config: &EngineConfig) -> Self {
        let frame_len = config.frames_per_callback() * config.channels as usize;
        Self {
            handle,
            encoder,
            staging: Vec::with_capacity(frame_len * 4),
            frame_len,
            komprimiert: [0u8; MAX_OPUS_PAKET_BYTES],
        }
    }

    /// Verarbeitet einen Block Geraete-Samples
    fn verarbeiten(&mut self, eingabe: &[i16]) {
        self.staging.extend_from_slice(eingabe);

        let mut offset = 0;
        while self.staging.len() - offset >= self.frame_len {
            let frame = &self.staging[offset..offset + self.frame_len];
            match self.encoder.encode_into(frame, &mut self.komprimiert) {
                Ok(n) if n > 0 => {
                    self.handle
                        .submit_outgoing_packet(Packet::aus_slice(&self.komprimiert[..n]));
                }
                // Leeres Ergebnis oder Encoder-Fehler: Frame verwerfen
                Ok(_) => {}
                Err(_) => {}
            }
            offset += self.frame_len;
        }
        self.staging.drain(..offset);
    }
}

// ---------------------------------------------------------------------------
// Playback-Seite
// ---------------------------------------------------------------------------

/// Zustand des Playback-Callbacks
///
/// Der Jitter-Buffer lebt ausschliesslich hier und braucht deshalb
/// keine Synchronisation.
struct PlaybackState {
    handle: EngineHandle,
    decoder: OpusDecoder,
    jitter: JitterBuffer,
    /// Dekodier-Ziel fuer genau einen Frame (interleaved, vorbelegt)
    frame_puffer: Vec<i16>,
    /// Dekodierte Samples die nicht mehr in die letzte Periode passten
    rest: Vec<i16>,
    frames_per_callback: usize,
    frame_len: usize,
}

impl PlaybackState {
    fn neu(handle: EngineHandle, decoder: OpusDecoder, config: &EngineConfig) -> Self {
        let frames = config.frames_per_callback();
        let frame_len = frames * config.channels as usize;
        Self {
            handle,
            decoder,
            jitter: JitterBuffer::neu(config.target_packets(), config.max_packets()),
            frame_puffer: vec![0i16; frame_len],
            rest: Vec::with_capacity(frame_len),
            frames_per_callback: frames,
            frame_len,
        }
    }

    /// Fuellt eine Ausgabe-Periode mit dekodiertem Audio
    fn fuellen(&mut self, ziel: &mut [i16]) {
        // 1. Alle sofort verfuegbaren Pakete in den Jitter-Buffer
        //    uebernehmen – die Queue-Tiefe ist das einzige Burst-Signal
        //    das der Callback sieht.
        while let Some(paket) = self.handle.next_incoming_packet() {
            self.jitter.push(paket);
        }

        // 2. Reste des letzten Frames zuerst ausgeben
        let uebernommen = self.rest.len().min(ziel.len());
        ziel[..uebernommen].copy_from_slice(&self.rest[..uebernommen]);
        self.rest.drain(..uebernommen);
        let mut pos = uebernommen;

        // 3. Frameweise dekodieren bis die Periode voll ist
        while pos < ziel.len() {
            let ergebnis = match self.jitter.pop() {
                Some(paket) => self
                    .decoder
                    .decode_into(Some(&paket.daten), &mut self.frame_puffer),
                // Unterhalb des Wasserstands: Concealment anfordern
                None => self.decoder.decode_into(None, &mut self.frame_puffer),
            };

            match ergebnis {
                Ok(n) if n == self.frames_per_callback => {}
                // Falsche Frame-Laenge oder Decoder-Fehler: Stille
                _ => self.frame_puffer.fill(0),
            }

            let kopieren = (ziel.len() - pos).min(self.frame_len);
            ziel[pos..pos + kopieren].copy_from_slice(&self.frame_puffer[..kopieren]);
            self.rest.extend_from_slice(&self.frame_puffer[kopieren..self.frame_len]);
            pos += kopieren;
        }
    }
}

// ---------------------------------------------------------------------------
// AudioEngine
// ---------------------------------------------------------------------------

/// Haelt die laufenden cpal-Streams am Leben
struct EngineStreams {
    _eingabe: Stream,
    _ausgabe: Stream,
}

/// Echtzeit-Audio-Engine
///
/// Lebenszyklus: erstellt (idle) -> `start()` (Geraete, Codecs und
/// Streams werden aufgebaut) -> `stop()` (Streams abgebrochen, Codecs
/// freigegeben, alle Puffer geleert). `stop()` ist idempotent und wird
/// auch vom Drop aufgerufen. Nach einem fehlgeschlagenen `start()` ist
/// die Engine wiederverwendbar – Teilzustand wird vollstaendig
/// zurueckgerollt.
pub struct AudioEngine {
    config: EngineConfig,
    shared: Arc<EngineShared>,
    streams: Option<EngineStreams>,
}

impl AudioEngine {
    /// Erstellt eine neue Engine im Leerlauf
    pub fn neu(config: EngineConfig) -> Self {
        Self {
            config,
            shared: Arc::new(EngineShared {
                is_running: AtomicBool::new(false),
                ausgehend: PacketQueue::neu(),
                eingehend: PacketQueue::neu(),
            }),
            streams: None,
        }
    }

    /// Gibt die Konfiguration zurueck
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gibt ein klonbares Handle fuer die Netzwerk-Threads zurueck
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Prueft den Laufzustand
    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Relaxed)
    }

    /// Startet die Engine
    ///
    /// Baut Codecs und beide Streams auf den Standard-Geraeten auf und
    /// startet sie. Schlaegt ein Schritt fehl, wird bereits aufgebauter
    /// Zustand verworfen und der Fehler zurueckgegeben.
    pub fn start(&mut self) -> AudioResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.config.validieren().map_err(AudioError::Konfiguration)?;

        let encoder = OpusEncoder::neu(&self.config)?;
        let decoder = OpusDecoder::neu(&self.config)?;

        let eingabe_geraet = device::standard_eingabegeraet()?;
        let ausgabe_geraet = device::standard_ausgabegeraet()?;

        let eingabe = baue_eingabe_stream(
            &eingabe_geraet,
            &self.config,
            CaptureState::neu(self.handle(), encoder, &self.config),
        )?;
        let ausgabe = baue_ausgabe_stream(
            &ausgabe_geraet,
            &self.config,
            PlaybackState::neu(self.handle(), decoder, &self.config),
        )?;

        eingabe
            .play()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
        ausgabe
            .play()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        self.streams = Some(EngineStreams {
            _eingabe: eingabe,
            _ausgabe: ausgabe,
        });
        self.shared.is_running.store(true, Ordering::SeqCst);

        info!(
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            frames = self.config.frames_per_callback(),
            "Audio-Engine gestartet"
        );
        Ok(())
    }

    /// Stoppt die Engine
    ///
    /// Abbruch statt Ausklingen: die Streams werden sofort verworfen,
    /// damit kein weiterer Callback mit dem Teardown um den Zustand
    /// konkurriert. Danach werden beide Queues geleert; der
    /// Jitter-Buffer verschwindet mit dem Playback-Stream.
    pub fn stop(&mut self) {
        if self
            .shared
            .is_running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.streams = None;
        self.shared.ausgehend.clear();
        self.shared.eingehend.clear();
        debug!("Audio-Engine gestoppt");
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Stream-Aufbau
// ---------------------------------------------------------------------------

fn float_zu_i16(s: f32) -> i16 {
    (s * 32767.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn baue_eingabe_stream(
    geraet: &Device,
    config: &EngineConfig,
    mut state: CaptureState,
) -> AudioResult<Stream> {
    let stream_config = device::stream_config(config);
    let err_fn = |err| error!("Eingabe-Stream-Fehler: {}", err);

    let stream = match device::eingabe_sample_format(geraet, config)? {
        SampleFormat::I16 => geraet
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if !state.handle.is_running() {
                        return;
                    }
                    state.verarbeiten(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::F32 => {
            let mut konvertiert: Vec<i16> = Vec::with_capacity(state.frame_len * 4);
            geraet
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !state.handle.is_running() {
                            return;
                        }
                        konvertiert.clear();
                        konvertiert.extend(data.iter().map(|&s| float_zu_i16(s)));
                        state.verarbeiten(&konvertiert);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        andere => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Eingabe-Sample-Format: {:?}",
                andere
            )))
        }
    };

    Ok(stream)
}

fn baue_ausgabe_stream(
    geraet: &Device,
    config: &EngineConfig,
    mut state: PlaybackState,
) -> AudioResult<Stream> {
    let stream_config = device::stream_config(config);
    let err_fn = |err| error!("Ausgabe-Stream-Fehler: {}", err);

    let stream = match device::ausgabe_sample_format(geraet, config)? {
        SampleFormat::I16 => geraet
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    if !state.handle.is_running() {
                        data.fill(0);
                        return;
                    }
                    state.fuellen(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::F32 => {
            let mut zwischenpuffer: Vec<i16> = Vec::with_capacity(state.frame_len * 4);
            geraet
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if !state.handle.is_running() {
                            data.fill(0.0);
                            return;
                        }
                        zwischenpuffer.resize(data.len(), 0);
                        state.fuellen(&mut zwischenpuffer);
                        for (ziel, &s) in data.iter_mut().zip(zwischenpuffer.iter()) {
                            *ziel = s as f32 / 32768.0;
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        andere => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Ausgabe-Sample-Format: {:?}",
                andere
            )))
        }
    };

    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sinus_frame(samples: usize) -> Vec<i16> {
        (0..samples)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect()
    }

    fn test_engine() -> AudioEngine {
        AudioEngine::neu(EngineConfig::default())
    }

    #[test]
    fn handle_verbindet_queues() {
        let engine = test_engine();
        let handle = engine.handle();

        handle.submit_incoming_packet(Packet::aus_slice(&[1, 2, 3]));
        assert_eq!(engine.shared.eingehend.len(), 1);

        engine.shared.ausgehend.push(Packet::aus_slice(&[4, 5]));
        assert_eq!(handle.next_outgoing_packet().unwrap().daten, vec![4, 5]);
        assert!(handle.next_outgoing_packet().is_none());
    }

    #[test]
    fn stop_ohne_start_ist_harmlos() {
        let mut engine = test_engine();
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_leert_queues() {
        let mut engine = test_engine();
        engine.shared.is_running.store(true, Ordering::SeqCst);
        engine.handle().submit_incoming_packet(Packet::aus_slice(&[1]));
        engine.shared.ausgehend.push(Packet::aus_slice(&[2]));

        engine.stop();
        assert!(engine.shared.eingehend.is_empty());
        assert!(engine.shared.ausgehend.is_empty());
        assert!(!engine.is_running());
    }

    #[test]
    fn capture_state_kodiert_volle_frames() {
        let config = EngineConfig::default();
        let engine = AudioEngine::neu(config.clone());
        let mut state = CaptureState::neu(
            engine.handle(),
            OpusEncoder::neu(&config).unwrap(),
            &config,
        );

        state.verarbeiten(&sinus_frame(960));
        assert_eq!(engine.shared.ausgehend.len(), 1);

        let paket = engine.handle().next_outgoing_packet().unwrap();
        assert!(paket.laenge() > 0);
        assert!(paket.laenge() <= MAX_OPUS_PAKET_BYTES);
    }

    #[test]
    fn capture_state_buendelt_teilstuecke() {
        let config = EngineConfig::default();
        let engine = AudioEngine::neu(config.clone());
        let mut state = CaptureState::neu(
            engine.handle(),
            OpusEncoder::neu(&config).unwrap(),
            &config,
        );

        // Zwei halbe Perioden ergeben erst zusammen einen Frame
        let halb = sinus_frame(480);
        state.verarbeiten(&halb);
        assert!(engine.shared.ausgehend.is_empty());

        state.verarbeiten(&halb);
        assert_eq!(engine.shared.ausgehend.len(), 1);
    }

    #[test]
    fn playback_state_pre_roll_dann_dekodieren() {
        let config = EngineConfig::default(); // Ziel: 3 Pakete
        let engine = AudioEngine::neu(config.clone());
        let handle = engine.handle();

        let mut enc = OpusEncoder::neu(&config).unwrap();
        let mut komprimiert = [0u8; MAX_OPUS_PAKET_BYTES];
        let pcm = sinus_frame(960);

        let mut state = PlaybackState::neu(
            handle.clone(),
            OpusDecoder::neu(&config).unwrap(),
            &config,
        );

        // Nur 2 Pakete: unterhalb des Wasserstands -> Concealment,
        // beide bleiben im Jitter-Buffer liegen
        for _ in 0..2 {
            let n = enc.encode_into(&pcm, &mut komprimiert).unwrap();
            handle.submit_incoming_packet(Packet::aus_slice(&komprimiert[..n]));
        }
        let mut ausgabe = vec![0i16; 960];
        state.fuellen(&mut ausgabe);
        assert_eq!(state.jitter.len(), 2);
        assert_eq!(state.jitter.statistik().underruns, 1);

        // Drittes Paket erreicht das Ziel: jetzt wird abgespielt
        let n = enc.encode_into(&pcm, &mut komprimiert).unwrap();
        handle.submit_incoming_packet(Packet::aus_slice(&komprimiert[..n]));
        state.fuellen(&mut ausgabe);
        assert_eq!(state.jitter.len(), 2);
        assert_eq!(state.jitter.statistik().abgespielt, 1);
    }

    #[test]
    fn playback_state_leerer_start_liefert_volle_periode() {
        let config = EngineConfig::default();
        let engine = AudioEngine::neu(config.clone());
        let mut state = PlaybackState::neu(
            engine.handle(),
            OpusDecoder::neu(&config).unwrap(),
            &config,
        );

        // Kein einziges Paket: Concealment/Stille, aber die Periode
        // wird vollstaendig gefuellt und nichts panict
        let mut ausgabe = vec![0x55i16; 960];
        state.fuellen(&mut ausgabe);
    }

    #[test]
    fn playback_state_teilperioden_mit_rest() {
        let config = EngineConfig {
            jitter_target_ms: 20, // Ziel: 1 Paket, sofortige Durchleitung
            ..Default::default()
        };
        let engine = AudioEngine::neu(config.clone());
        let handle = engine.handle();

        let mut enc = OpusEncoder::neu(&config).unwrap();
        let mut komprimiert = [0u8; MAX_OPUS_PAKET_BYTES];
        let n = enc.encode_into(&sinus_frame(960), &mut komprimiert).unwrap();
        handle.submit_incoming_packet(Packet::aus_slice(&komprimiert[..n]));

        let mut state = PlaybackState::neu(
            handle,
            OpusDecoder::neu(&config).unwrap(),
            &config,
        );

        // Halbe Periode: ein Frame wird dekodiert, die Haelfte bleibt als Rest
        let mut ausgabe = vec![0i16; 480];
        state.fuellen(&mut ausgabe);
        assert_eq!(state.rest.len(), 480);
        assert_eq!(state.jitter.statistik().abgespielt, 1);

        // Zweite halbe Periode kommt komplett aus dem Rest
        state.fuellen(&mut ausgabe);
        assert!(state.rest.is_empty());
        assert_eq!(state.jitter.statistik().abgespielt, 1);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn engine_start_stop_mit_hardware() {
        let mut engine = test_engine();
        engine.start().expect("Start sollte mit Hardware gelingen");
        assert!(engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
        // Nach Stop erneut startbar
        engine.start().expect("Neustart sollte gelingen");
        engine.stop();
    }
}
