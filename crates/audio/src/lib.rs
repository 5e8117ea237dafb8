//! sprechfunk-audio – Client Audio Engine
//!
//! Vollstaendige Echtzeit-Audio-Pipeline fuer Sprechfunk:
//! - Mikrofon-Capture und Lautsprecher-Playback via cpal
//! - Opus Encoding/Decoding (i16-PCM, VoIP-Profil)
//! - Jitter-Buffer mit Wasserstand-Politik
//! - Thread-sichere Paket-Queues zwischen Callback und Netzwerk-Threads

pub mod codec;
pub mod device;
pub mod engine;
pub mod error;
pub mod jitter;
pub mod queue;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{OpusDecoder, OpusEncoder};
pub use engine::{AudioEngine, EngineHandle};
pub use error::{AudioError, AudioResult};
pub use jitter::{JitterBuffer, JitterStatistik};
pub use queue::{Packet, PacketQueue};
