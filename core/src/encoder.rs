//! Transmit pipeline: message text to a slot-length audio frame.

use crate::crc;
use crate::error::Result;
use crate::fec::Ldpc;
use crate::fsk::ToneModulator;
use crate::packing;
use crate::symbols::tones_for_codeword;
use crate::{CRC_BITS, MESSAGE_BITS, PAYLOAD_BITS, PAYLOAD_BYTES};

/// Message encoder: pack, checksum, FEC, symbol mapping, synthesis.
pub struct Encoder {
    ldpc: Ldpc,
    modulator: ToneModulator,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            ldpc: Ldpc::new(),
            modulator: ToneModulator::new(),
        }
    }

    /// Encode message text into a full 15-second sample buffer with the
    /// lowest tone at `base_freq` Hz.
    pub fn encode(&self, text: &str, base_freq: f32) -> Result<Vec<f32>> {
        let payload = packing::pack(text)?;
        let checksum = crc::checksum(&payload);
        let systematic = systematic_bits(&payload, checksum);
        let codeword = self.ldpc.encode(&systematic);
        let tones = tones_for_codeword(&codeword);
        self.modulator.synthesize(&tones, base_freq)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Spread payload and checksum into the 91 systematic bit slots.
pub(crate) fn systematic_bits(
    payload: &[u8; PAYLOAD_BYTES],
    checksum: u16,
) -> [u8; MESSAGE_BITS] {
    let mut bits = [0u8; MESSAGE_BITS];
    for (i, bit) in bits[..PAYLOAD_BITS].iter_mut().enumerate() {
        *bit = (payload[i / 8] >> (7 - i % 8)) & 1;
    }
    for (k, bit) in bits[PAYLOAD_BITS..].iter_mut().enumerate() {
        *bit = ((checksum >> (CRC_BITS - 1 - k)) & 1) as u8;
    }
    bits
}
