//! Receive pipeline: audio capture to validated messages.
//!
//! A `Decoder` owns its working state: the candidate arena sized at
//! construction time, the soft-bit buffer and the FEC scratch space.
//! Instances are independent; nothing is shared or global. Each candidate
//! runs demodulation, FEC decoding, checksum verification and unpacking,
//! and any per-candidate failure just moves the search on to the next
//! candidate.

use log::{debug, trace};

use crate::crc;
use crate::demod;
use crate::error::{CodecError, Result};
use crate::fec::{Ldpc, LdpcScratch, DEFAULT_MAX_ITERATIONS};
use crate::packing;
use crate::sync::{self, Candidate};
use crate::waterfall::SpectrumAnalyzer;
use crate::{CODEWORD_BITS, CRC_BITS, PAYLOAD_BITS, PAYLOAD_BYTES};

/// Upper bound on the candidate budget a decoder will allocate for.
pub const MAX_CANDIDATE_BUDGET: usize = 4096;

/// A validated message with its estimated offsets and SNR.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub text: String,
    pub snr_db: f32,
    pub time_offset_secs: f32,
    pub freq_offset_hz: f32,
}

/// Working buffers, allocated once and reused across decode calls.
struct WorkingState {
    candidates: Vec<Candidate>,
    llr: [f32; CODEWORD_BITS],
    ldpc_scratch: LdpcScratch,
}

pub struct Decoder {
    analyzer: SpectrumAnalyzer,
    ldpc: Ldpc,
    max_candidates: usize,
    max_iterations: usize,
    state: Option<WorkingState>,
}

impl Decoder {
    /// Allocate a decoder with working buffers for `max_candidates`
    /// synchronization candidates per call.
    pub fn new(max_candidates: usize) -> Result<Self> {
        if max_candidates == 0 || max_candidates > MAX_CANDIDATE_BUDGET {
            return Err(CodecError::ResourceExhausted);
        }
        let ldpc = Ldpc::new();
        let state = WorkingState {
            candidates: Vec::with_capacity(max_candidates),
            llr: [0.0; CODEWORD_BITS],
            ldpc_scratch: ldpc.scratch(),
        };
        Ok(Self {
            analyzer: SpectrumAnalyzer::new(),
            ldpc,
            max_candidates,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            state: Some(state),
        })
    }

    /// Decode every validated message out of a mono 12 kHz capture.
    ///
    /// Returns the messages best-first (by SNR). A capture with no
    /// decodable signal yields an empty list, not an error.
    pub fn decode(&mut self, samples: &[f32]) -> Result<Vec<DecodedMessage>> {
        let state = self.state.as_mut().ok_or(CodecError::NotInitialized)?;
        if samples.len() < crate::SYMBOL_SAMPLES {
            return Ok(Vec::new());
        }

        let wf = self.analyzer.transform(samples)?;
        sync::find_candidates_into(&wf, self.max_candidates, &mut state.candidates);
        debug!("sync search ranked {} candidates", state.candidates.len());

        let mut results: Vec<DecodedMessage> = Vec::new();
        for candidate in &state.candidates {
            let Some(snr_db) = demod::extract_soft_bits(&wf, candidate, &mut state.llr) else {
                continue;
            };
            let codeword =
                match self
                    .ldpc
                    .decode(&state.llr, self.max_iterations, &mut state.ldpc_scratch)
                {
                    Ok(cw) => cw,
                    Err(_) => continue,
                };

            let (payload, checksum) = split_codeword(&codeword);
            if !crc::verify(&payload, checksum) {
                trace!(
                    "checksum mismatch at col {} bin {}",
                    candidate.time_col,
                    candidate.freq_bin
                );
                continue;
            }
            let Ok(text) = packing::unpack(&payload) else {
                continue;
            };

            let decoded = DecodedMessage {
                text,
                snr_db,
                time_offset_secs: candidate.time_offset_secs(),
                freq_offset_hz: candidate.freq_offset_hz(),
            };
            debug!(
                "decoded '{}' at {:+.2} s / {:.1} Hz, {:.1} dB",
                decoded.text, decoded.time_offset_secs, decoded.freq_offset_hz, decoded.snr_db
            );
            merge(&mut results, decoded);
        }

        // Order does not depend on candidate completion order: the merged
        // set is re-ranked as a whole.
        results.sort_by(|a, b| {
            b.snr_db
                .partial_cmp(&a.snr_db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.time_offset_secs
                        .partial_cmp(&b.time_offset_secs)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        Ok(results)
    }

    /// Drop the working buffers. Further `decode` calls fail with
    /// `NotInitialized`; calling this twice is a no-op.
    pub fn release(&mut self) {
        self.state = None;
    }
}

/// Split a codeword's systematic part back into payload bytes and checksum.
fn split_codeword(codeword: &[u8; CODEWORD_BITS]) -> ([u8; PAYLOAD_BYTES], u16) {
    let mut payload = [0u8; PAYLOAD_BYTES];
    for i in 0..PAYLOAD_BITS {
        if codeword[i] != 0 {
            payload[i / 8] |= 1 << (7 - i % 8);
        }
    }
    let mut checksum: u16 = 0;
    for k in 0..CRC_BITS {
        checksum = (checksum << 1) | codeword[PAYLOAD_BITS + k] as u16;
    }
    (payload, checksum)
}

/// Keep one entry per message text, preferring the better SNR.
fn merge(results: &mut Vec<DecodedMessage>, decoded: DecodedMessage) {
    if let Some(existing) = results.iter_mut().find(|m| m.text == decoded.text) {
        if decoded.snr_db > existing.snr_db {
            *existing = decoded;
        }
    } else {
        results.push(decoded);
    }
}
