//! Soft-bit extraction at a candidate offset.
//!
//! For each of the 58 data symbols the eight tone cells are read from the
//! waterfall; each of the three Gray-coded bits gets the log-domain
//! contrast between the best tone that sets it and the best tone that
//! clears it. The 174 values are normalized to a fixed variance for the
//! FEC decoder, and the symbol-level tone contrast doubles as the SNR
//! estimate for the candidate.

use crate::symbols::{data_symbol_position, GRAY_MAP, NUM_DATA_SYMBOLS};
use crate::sync::Candidate;
use crate::waterfall::{Waterfall, BINS_PER_TONE, COLS_PER_SYMBOL};
use crate::{CODEWORD_BITS, NUM_TONES};

/// Variance the normalized soft bits are scaled to.
const LLR_TARGET_VARIANCE: f32 = 24.0;

/// Correction from per-bin contrast to the conventional 2.5 kHz noise
/// reporting bandwidth: 10 log10(2500 / 6.25).
const SNR_BANDWIDTH_DB: f32 = 26.0;

const SNR_FLOOR_DB: f32 = -30.0;
const SNR_CEIL_DB: f32 = 30.0;

/// Fill `llr` with the 174 soft bits for `candidate` and return the SNR
/// estimate. Returns `None` when the candidate's data symbols run past the
/// edge of the waterfall.
pub fn extract_soft_bits(
    wf: &Waterfall,
    candidate: &Candidate,
    llr: &mut [f32; CODEWORD_BITS],
) -> Option<f32> {
    let mut contrast_acc = 0.0f32;

    for d in 0..NUM_DATA_SYMBOLS {
        let col = candidate.time_col + COLS_PER_SYMBOL * data_symbol_position(d);
        if col >= wf.num_cols {
            return None;
        }

        // s2[v] is the magnitude of the tone that carries 3-bit group v.
        let mut s2 = [0.0f32; NUM_TONES];
        for (v, slot) in s2.iter_mut().enumerate() {
            let tone = GRAY_MAP[v] as usize;
            *slot = wf.mag(col, candidate.freq_bin + BINS_PER_TONE * tone);
        }

        llr[3 * d] = max4(s2[4], s2[5], s2[6], s2[7]) - max4(s2[0], s2[1], s2[2], s2[3]);
        llr[3 * d + 1] = max4(s2[2], s2[3], s2[6], s2[7]) - max4(s2[0], s2[1], s2[4], s2[5]);
        llr[3 * d + 2] = max4(s2[1], s2[3], s2[5], s2[7]) - max4(s2[0], s2[2], s2[4], s2[6]);

        let best = s2.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(x));
        let rest: f32 = s2.iter().sum::<f32>() - best;
        contrast_acc += best - rest / (NUM_TONES - 1) as f32;
    }

    normalize(llr);

    let contrast = contrast_acc / NUM_DATA_SYMBOLS as f32;
    Some((contrast - SNR_BANDWIDTH_DB).clamp(SNR_FLOOR_DB, SNR_CEIL_DB))
}

#[inline]
fn max4(a: f32, b: f32, c: f32, d: f32) -> f32 {
    a.max(b).max(c.max(d))
}

/// Scale the soft bits to a fixed variance so the FEC decoder sees a
/// consistent confidence range regardless of signal level.
fn normalize(llr: &mut [f32; CODEWORD_BITS]) {
    let n = CODEWORD_BITS as f32;
    let sum: f32 = llr.iter().sum();
    let sum_sq: f32 = llr.iter().map(|&x| x * x).sum();
    let variance = (sum_sq - sum * sum / n) / n;
    if variance > 1e-6 {
        let scale = (LLR_TARGET_VARIANCE / variance).sqrt();
        for x in llr.iter_mut() {
            *x *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::tones_for_codeword;
    use crate::waterfall::Waterfall;

    const FLOOR_DB: f32 = -90.0;
    const SIGNAL_DB: f32 = -20.0;

    /// Paint a full frame (sync and data symbols) onto a synthetic
    /// waterfall at offset (t0, f0).
    fn paint_frame(wf: &mut Waterfall, t0: usize, f0: usize, tones: &[u8]) {
        for (sym, &tone) in tones.iter().enumerate() {
            let col = t0 + COLS_PER_SYMBOL * sym;
            wf.set_mag(col, f0 + BINS_PER_TONE * tone as usize, SIGNAL_DB);
        }
    }

    #[test]
    fn test_soft_bits_match_codeword_signs() {
        let mut codeword = [0u8; CODEWORD_BITS];
        for (i, b) in codeword.iter_mut().enumerate() {
            *b = ((i * 5 + 1) % 3 == 0) as u8;
        }
        let tones = tones_for_codeword(&codeword);

        let mut wf = Waterfall::flat(170, 200, FLOOR_DB);
        paint_frame(&mut wf, 6, 80, &tones);

        let candidate = Candidate {
            time_col: 6,
            freq_bin: 80,
            score: 50.0,
        };
        let mut llr = [0.0f32; CODEWORD_BITS];
        let snr = extract_soft_bits(&wf, &candidate, &mut llr).unwrap();

        for (i, (&soft, &bit)) in llr.iter().zip(codeword.iter()).enumerate() {
            assert!(
                (soft > 0.0) == (bit == 1),
                "soft bit {} has sign {} for data bit {}",
                i,
                soft,
                bit
            );
        }
        // Clean synthetic frame: full contrast, pinned at the ceiling.
        assert!(snr > 20.0);
    }

    #[test]
    fn test_candidate_past_capture_edge_is_rejected() {
        let wf = Waterfall::flat(40, 200, FLOOR_DB);
        let candidate = Candidate {
            time_col: 0,
            freq_bin: 80,
            score: 10.0,
        };
        let mut llr = [0.0f32; CODEWORD_BITS];
        assert!(extract_soft_bits(&wf, &candidate, &mut llr).is_none());
    }

    #[test]
    fn test_normalization_fixes_scale() {
        let mut a = [0.0f32; CODEWORD_BITS];
        let mut b = [0.0f32; CODEWORD_BITS];
        for i in 0..CODEWORD_BITS {
            let v = if i % 2 == 0 { 3.0 } else { -5.0 };
            a[i] = v;
            b[i] = v * 17.0;
        }
        normalize(&mut a);
        normalize(&mut b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-3, "scale-dependent normalization");
        }
    }
}
