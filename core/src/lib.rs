//! Narrowband digital-radio message codec
//!
//! Converts short structured messages (call signs, grid locators, signal
//! reports) into fixed-duration 8-tone audio frames and recovers them from
//! received audio, down to very low signal-to-noise ratios. The receive side
//! runs a spectrogram, a 2-D time/frequency synchronization search over the
//! embedded Costas pattern, soft-decision LDPC decoding and a checksum gate.

pub mod crc;
pub mod decoder;
pub mod demod;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod fsk;
pub mod message;
pub mod packing;
pub mod symbols;
pub mod sync;
pub mod waterfall;

pub use decoder::{DecodedMessage, Decoder};
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use message::Message;
pub use packing::{pack, unpack};

// Protocol constants. These are wire-level and must not be tuned.
pub const SAMPLE_RATE: usize = 12_000;
pub const SYMBOL_PERIOD: f32 = 0.160; // seconds
pub const SYMBOL_SAMPLES: usize = 1920; // SAMPLE_RATE * SYMBOL_PERIOD

/// Tone spacing in Hz; tone `t` sits at `base_freq + t * TONE_SPACING_HZ`.
pub const TONE_SPACING_HZ: f32 = 6.25;
pub const NUM_TONES: usize = 8;

/// A transmission occupies a fixed 15-second slot regardless of content.
pub const SLOT_SECONDS: f32 = 15.0;
pub const SLOT_SAMPLES: usize = 180_000; // SAMPLE_RATE * SLOT_SECONDS

// Bit budget: 77 payload bits + 14 checksum bits + 83 parity bits.
pub const PAYLOAD_BITS: usize = 77;
pub const PAYLOAD_BYTES: usize = 10;
pub const CRC_BITS: usize = 14;
pub const MESSAGE_BITS: usize = PAYLOAD_BITS + CRC_BITS; // 91
pub const CODEWORD_BITS: usize = 174;
