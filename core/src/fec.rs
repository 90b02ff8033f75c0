//! Systematic (174,91) low-density parity-check code.
//!
//! The codeword is the 91 systematic bits (payload plus checksum) followed
//! by 83 parity bits. Every systematic bit participates in exactly three of
//! the 83 parity checks; the parity bits form an accumulator chain, so check
//! `c` reads as `p[c] = p[c-1] XOR (sparse subset of systematic bits)` and
//! encoding is a single forward pass.
//!
//! Decoding is normalized min-sum belief propagation over the same sparse
//! structure: hard decisions are tested against the full syndrome every
//! iteration and the decoder exits as soon as all checks are satisfied.

use log::trace;

use crate::error::{CodecError, Result};
use crate::{CODEWORD_BITS, MESSAGE_BITS};

/// Number of parity checks (and parity bits).
pub const NUM_CHECKS: usize = CODEWORD_BITS - MESSAGE_BITS; // 83

/// Default iteration budget for belief propagation.
pub const DEFAULT_MAX_ITERATIONS: usize = 30;

/// Check-to-bit messages are attenuated to compensate the min-sum
/// overestimate of extrinsic confidence.
const MIN_SUM_SCALE: f32 = 0.75;

/// Message magnitudes are clipped to keep saturated-confidence regions
/// numerically tame.
const LLR_CLAMP: f32 = 20.0;

/// Sparse parity-check structure shared by the encoder and decoder.
pub struct Ldpc {
    /// Systematic bit columns of each check row.
    check_systematic: Vec<Vec<usize>>,
    /// Edge ids of each check row (systematic and parity columns).
    check_edges: Vec<Vec<usize>>,
    /// Edge ids incident to each codeword bit.
    bit_edges: Vec<Vec<usize>>,
    /// Bit index on the far end of each edge.
    edge_bit: Vec<usize>,
    num_edges: usize,
}

/// Reusable working buffers for one decode attempt.
pub struct LdpcScratch {
    channel: [f32; CODEWORD_BITS],
    bit_to_check: Vec<f32>,
    check_to_bit: Vec<f32>,
    posterior: [f32; CODEWORD_BITS],
    hard: [u8; CODEWORD_BITS],
}

impl Ldpc {
    pub fn new() -> Self {
        // Deterministic placement: three distinct check rows per systematic
        // column, spread by three coprime strides, collisions resolved by
        // linear probing.
        let mut check_systematic = vec![Vec::new(); NUM_CHECKS];
        for j in 0..MESSAGE_BITS {
            let mut rows = [
                (3 * j) % NUM_CHECKS,
                (7 * j + 29) % NUM_CHECKS,
                (22 * j + 61) % NUM_CHECKS,
            ];
            while rows[1] == rows[0] {
                rows[1] = (rows[1] + 1) % NUM_CHECKS;
            }
            while rows[2] == rows[0] || rows[2] == rows[1] {
                rows[2] = (rows[2] + 1) % NUM_CHECKS;
            }
            for r in rows {
                check_systematic[r].push(j);
            }
        }
        for row in check_systematic.iter_mut() {
            row.sort_unstable();
        }

        // Full adjacency including the accumulator chain.
        let mut check_edges = vec![Vec::new(); NUM_CHECKS];
        let mut bit_edges = vec![Vec::new(); CODEWORD_BITS];
        let mut edge_bit = Vec::new();
        for c in 0..NUM_CHECKS {
            let mut bits: Vec<usize> = check_systematic[c].clone();
            if c > 0 {
                bits.push(MESSAGE_BITS + c - 1);
            }
            bits.push(MESSAGE_BITS + c);
            for bit in bits {
                let edge = edge_bit.len();
                edge_bit.push(bit);
                check_edges[c].push(edge);
                bit_edges[bit].push(edge);
            }
        }

        let num_edges = edge_bit.len();
        Self {
            check_systematic,
            check_edges,
            bit_edges,
            edge_bit,
            num_edges,
        }
    }

    pub fn scratch(&self) -> LdpcScratch {
        LdpcScratch {
            channel: [0.0; CODEWORD_BITS],
            bit_to_check: vec![0.0; self.num_edges],
            check_to_bit: vec![0.0; self.num_edges],
            posterior: [0.0; CODEWORD_BITS],
            hard: [0; CODEWORD_BITS],
        }
    }

    /// Append 83 parity bits to the systematic bits. Bits are 0/1 values.
    pub fn encode(&self, systematic: &[u8; MESSAGE_BITS]) -> [u8; CODEWORD_BITS] {
        let mut codeword = [0u8; CODEWORD_BITS];
        codeword[..MESSAGE_BITS].copy_from_slice(systematic);
        let mut acc = 0u8;
        for c in 0..NUM_CHECKS {
            for &j in &self.check_systematic[c] {
                acc ^= systematic[j];
            }
            codeword[MESSAGE_BITS + c] = acc;
        }
        codeword
    }

    /// Whether all parity checks are satisfied.
    pub fn syndrome_ok(&self, bits: &[u8; CODEWORD_BITS]) -> bool {
        for c in 0..NUM_CHECKS {
            let mut parity = 0u8;
            for &e in &self.check_edges[c] {
                parity ^= bits[self.edge_bit[e]];
            }
            if parity != 0 {
                return false;
            }
        }
        true
    }

    /// Belief-propagation decode of 174 soft bits.
    ///
    /// `llr` convention: positive values mean the bit is more likely 1.
    /// Internally messages are passed as log(P0/P1), so the channel values
    /// are negated on entry.
    pub fn decode(
        &self,
        llr: &[f32; CODEWORD_BITS],
        max_iterations: usize,
        scratch: &mut LdpcScratch,
    ) -> Result<[u8; CODEWORD_BITS]> {
        for (c, &l) in scratch.channel.iter_mut().zip(llr.iter()) {
            *c = (-l).clamp(-LLR_CLAMP, LLR_CLAMP);
        }
        scratch.check_to_bit.iter_mut().for_each(|m| *m = 0.0);

        for iteration in 0..=max_iterations {
            // Posterior and hard decision; iteration 0 tests the channel
            // values alone so a clean codeword converges immediately.
            for n in 0..CODEWORD_BITS {
                let mut post = scratch.channel[n];
                for &e in &self.bit_edges[n] {
                    post += scratch.check_to_bit[e];
                }
                scratch.posterior[n] = post;
                scratch.hard[n] = (post < 0.0) as u8;
            }
            if self.syndrome_ok(&scratch.hard) {
                trace!("ldpc converged after {} iterations", iteration);
                return Ok(scratch.hard);
            }
            if iteration == max_iterations {
                break;
            }

            // Bit-to-check: extrinsic posterior.
            for n in 0..CODEWORD_BITS {
                for &e in &self.bit_edges[n] {
                    let v = scratch.posterior[n] - scratch.check_to_bit[e];
                    scratch.bit_to_check[e] = v.clamp(-LLR_CLAMP, LLR_CLAMP);
                }
            }

            // Check-to-bit: normalized min-sum.
            for c in 0..NUM_CHECKS {
                let edges = &self.check_edges[c];
                let mut sign_product = 1.0f32;
                let mut min1 = f32::INFINITY;
                let mut min2 = f32::INFINITY;
                let mut min_edge = usize::MAX;
                for &e in edges {
                    let v = scratch.bit_to_check[e];
                    if v < 0.0 {
                        sign_product = -sign_product;
                    }
                    let mag = v.abs();
                    if mag < min1 {
                        min2 = min1;
                        min1 = mag;
                        min_edge = e;
                    } else if mag < min2 {
                        min2 = mag;
                    }
                }
                for &e in edges {
                    let v = scratch.bit_to_check[e];
                    let others_sign = if v < 0.0 { -sign_product } else { sign_product };
                    let others_mag = if e == min_edge { min2 } else { min1 };
                    scratch.check_to_bit[e] =
                        (MIN_SUM_SCALE * others_sign * others_mag).clamp(-LLR_CLAMP, LLR_CLAMP);
                }
            }
        }

        Err(CodecError::FecDecodeFailure)
    }
}

impl Default for Ldpc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_systematic(rng: &mut StdRng) -> [u8; MESSAGE_BITS] {
        let mut bits = [0u8; MESSAGE_BITS];
        for b in bits.iter_mut() {
            *b = rng.gen_range(0..2);
        }
        bits
    }

    fn llrs_for(codeword: &[u8; CODEWORD_BITS], confidence: f32) -> [f32; CODEWORD_BITS] {
        let mut llr = [0.0f32; CODEWORD_BITS];
        for (l, &b) in llr.iter_mut().zip(codeword.iter()) {
            *l = if b == 1 { confidence } else { -confidence };
        }
        llr
    }

    #[test]
    fn test_every_systematic_bit_in_three_checks() {
        let ldpc = Ldpc::new();
        let mut counts = [0usize; MESSAGE_BITS];
        for row in &ldpc.check_systematic {
            for &j in row {
                counts[j] += 1;
            }
        }
        assert!(counts.iter().all(|&c| c == 3));
    }

    #[test]
    fn test_encode_satisfies_all_checks() {
        let ldpc = Ldpc::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let cw = ldpc.encode(&random_systematic(&mut rng));
            assert!(ldpc.syndrome_ok(&cw));
        }
    }

    #[test]
    fn test_systematic_bits_pass_through() {
        let ldpc = Ldpc::new();
        let mut rng = StdRng::seed_from_u64(8);
        let systematic = random_systematic(&mut rng);
        let cw = ldpc.encode(&systematic);
        assert_eq!(&cw[..MESSAGE_BITS], &systematic[..]);
    }

    #[test]
    fn test_clean_llrs_decode_without_iterating() {
        let ldpc = Ldpc::new();
        let mut scratch = ldpc.scratch();
        let mut rng = StdRng::seed_from_u64(9);
        let cw = ldpc.encode(&random_systematic(&mut rng));
        let llr = llrs_for(&cw, 4.8);
        let decoded = ldpc.decode(&llr, 0, &mut scratch).unwrap();
        assert_eq!(decoded, cw);
    }

    #[test]
    fn test_small_error_patterns_corrected() {
        let ldpc = Ldpc::new();
        let mut scratch = ldpc.scratch();
        let mut rng = StdRng::seed_from_u64(10);

        let mut successes = 0;
        const TRIALS: usize = 40;
        for _ in 0..TRIALS {
            let cw = ldpc.encode(&random_systematic(&mut rng));
            let mut llr = llrs_for(&cw, 4.8);
            // Flip three scattered bits by inverting their soft evidence.
            for _ in 0..3 {
                let pos = rng.gen_range(0..CODEWORD_BITS);
                llr[pos] = -llr[pos];
            }
            if let Ok(decoded) = ldpc.decode(&llr, DEFAULT_MAX_ITERATIONS, &mut scratch) {
                assert_eq!(decoded, cw, "converged to a different codeword");
                successes += 1;
            }
        }
        assert!(
            successes * 10 >= TRIALS * 9,
            "only {}/{} corrupted codewords recovered",
            successes,
            TRIALS
        );
    }

    #[test]
    fn test_heavy_corruption_fails_instead_of_guessing() {
        let ldpc = Ldpc::new();
        let mut scratch = ldpc.scratch();
        let mut rng = StdRng::seed_from_u64(11);
        let cw = ldpc.encode(&random_systematic(&mut rng));
        let mut llr = llrs_for(&cw, 4.8);
        for pos in 0..CODEWORD_BITS {
            if rng.gen_bool(0.4) {
                llr[pos] = -llr[pos];
            }
        }
        match ldpc.decode(&llr, DEFAULT_MAX_ITERATIONS, &mut scratch) {
            Err(CodecError::FecDecodeFailure) => {}
            Ok(decoded) => {
                // Convergence this deep in the noise is implausible but not
                // impossible; it must at least be a valid codeword.
                assert!(ldpc.syndrome_ok(&decoded));
            }
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_zero_budget_rejects_corrupted_input() {
        let ldpc = Ldpc::new();
        let mut scratch = ldpc.scratch();
        let mut rng = StdRng::seed_from_u64(12);
        let cw = ldpc.encode(&random_systematic(&mut rng));
        let mut llr = llrs_for(&cw, 4.8);
        llr[17] = -llr[17];
        assert_eq!(
            ldpc.decode(&llr, 0, &mut scratch),
            Err(CodecError::FecDecodeFailure)
        );
    }
}
