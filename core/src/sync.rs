//! Time/frequency synchronization search.
//!
//! Correlates the known Costas pattern against the waterfall over every
//! (column, fine-bin) offset in the search window. The score of an offset
//! is the mean contrast, over the 21 sync symbols, between the cell the
//! pattern predicts and the other seven tone cells of the same column.
//! Candidates are ranked by score, ties broken by smaller time then smaller
//! frequency, and the list is capped at the caller's budget.

use crate::symbols::{COSTAS_PATTERN, COSTAS_POSITIONS};
use crate::waterfall::{Waterfall, BINS_PER_TONE, COLS_PER_SYMBOL, COL_PERIOD_SECS, FINE_BIN_HZ};
use crate::NUM_TONES;

/// Search band for the base frequency.
pub const MIN_FREQ_HZ: f32 = 200.0;
pub const MAX_FREQ_HZ: f32 = 3000.0;

/// Minimum mean sync contrast (dB) for an offset to become a candidate.
pub const MIN_SYNC_SCORE: f32 = 2.0;

/// Minimum number of in-bounds sync cells for a score to count; offsets
/// hanging this far off the end of the capture are ignored.
const MIN_SYNC_CELLS: usize = 14;

/// A candidate signal location on the search grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub time_col: usize,
    pub freq_bin: usize,
    pub score: f32,
}

impl Candidate {
    /// Time offset of the frame start relative to the capture start.
    pub fn time_offset_secs(&self) -> f32 {
        self.time_col as f32 * COL_PERIOD_SECS
    }

    /// Base frequency this candidate implies.
    pub fn freq_offset_hz(&self) -> f32 {
        self.freq_bin as f32 * FINE_BIN_HZ
    }
}

/// Rank candidates above the score threshold into `out`, which is treated
/// as a bounded arena: at most `max_candidates` survive, best first.
pub fn find_candidates_into(wf: &Waterfall, max_candidates: usize, out: &mut Vec<Candidate>) {
    out.clear();
    if max_candidates == 0 {
        return;
    }

    let min_bin = (MIN_FREQ_HZ / FINE_BIN_HZ) as usize;
    let top_tone_span = (NUM_TONES - 1) * BINS_PER_TONE;
    let max_bin = ((MAX_FREQ_HZ / FINE_BIN_HZ) as usize).min(wf.num_bins - 1 - top_tone_span);

    for time_col in 0..wf.num_cols {
        for freq_bin in min_bin..=max_bin {
            if let Some(score) = sync_score(wf, time_col, freq_bin) {
                if score >= MIN_SYNC_SCORE {
                    insert_bounded(
                        out,
                        max_candidates,
                        Candidate {
                            time_col,
                            freq_bin,
                            score,
                        },
                    );
                }
            }
        }
    }
}

/// Convenience wrapper returning a fresh list.
pub fn find_candidates(wf: &Waterfall, max_candidates: usize) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(max_candidates);
    find_candidates_into(wf, max_candidates, &mut out);
    out
}

/// Mean sync contrast at one grid offset, or `None` when too few sync
/// cells are inside the capture.
fn sync_score(wf: &Waterfall, time_col: usize, freq_bin: usize) -> Option<f32> {
    let mut acc = 0.0f32;
    let mut cells = 0usize;

    for &block in &COSTAS_POSITIONS {
        for (k, &tone) in COSTAS_PATTERN.iter().enumerate() {
            let col = time_col + COLS_PER_SYMBOL * (block + k);
            if col >= wf.num_cols {
                continue;
            }
            let expected = wf.mag(col, freq_bin + BINS_PER_TONE * tone as usize);
            let mut others = 0.0f32;
            for t in 0..NUM_TONES as u8 {
                if t != tone {
                    others += wf.mag(col, freq_bin + BINS_PER_TONE * t as usize);
                }
            }
            acc += expected - others / (NUM_TONES - 1) as f32;
            cells += 1;
        }
    }

    if cells >= MIN_SYNC_CELLS {
        Some(acc / cells as f32)
    } else {
        None
    }
}

/// True when `a` outranks `b`.
fn outranks(a: &Candidate, b: &Candidate) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    (a.time_col, a.freq_bin) < (b.time_col, b.freq_bin)
}

fn insert_bounded(list: &mut Vec<Candidate>, cap: usize, cand: Candidate) {
    let pos = list.partition_point(|c| outranks(c, &cand));
    if pos >= cap {
        return;
    }
    list.insert(pos, cand);
    list.truncate(cap);
}
