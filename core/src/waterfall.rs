//! Sliding-window spectral transform: raw audio to a time/frequency
//! magnitude grid.
//!
//! Window length matches the symbol duration and the hop is half a symbol,
//! so a symbol boundary always lands exactly on a column. The FFT is
//! zero-padded to twice the window, giving bins of half the tone spacing;
//! tone `t` of a signal whose base frequency sits on bin `b0` peaks at fine
//! bin `b0 + 2 t`.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{CodecError, Result};
use crate::{SAMPLE_RATE, SYMBOL_SAMPLES};

/// Analysis window length in samples (one symbol).
pub const WINDOW_SAMPLES: usize = SYMBOL_SAMPLES;

/// Hop between consecutive columns (half a symbol).
pub const HOP_SAMPLES: usize = SYMBOL_SAMPLES / 2;

/// Zero-padded FFT length.
pub const FFT_SIZE: usize = 2 * SYMBOL_SAMPLES;

/// Spacing of the fine frequency bins.
pub const FINE_BIN_HZ: f32 = SAMPLE_RATE as f32 / FFT_SIZE as f32; // 3.125

/// Fine bins per tone step.
pub const BINS_PER_TONE: usize = 2;

/// Columns per symbol period.
pub const COLS_PER_SYMBOL: usize = 2;

/// Seconds between consecutive columns.
pub const COL_PERIOD_SECS: f32 = HOP_SAMPLES as f32 / SAMPLE_RATE as f32; // 0.08

/// Time/frequency magnitude grid, cell values in dB.
pub struct Waterfall {
    pub num_cols: usize,
    pub num_bins: usize,
    pub(crate) mag_db: Vec<f32>,
}

impl Waterfall {
    /// Magnitude in dB at (time column, fine frequency bin).
    #[inline]
    pub fn mag(&self, col: usize, bin: usize) -> f32 {
        debug_assert!(col < self.num_cols && bin < self.num_bins);
        self.mag_db[col * self.num_bins + bin]
    }

    /// A uniform grid, used by receive-path tests to build synthetic
    /// scenes.
    #[cfg(test)]
    pub(crate) fn flat(num_cols: usize, num_bins: usize, floor_db: f32) -> Self {
        Self {
            num_cols,
            num_bins,
            mag_db: vec![floor_db; num_cols * num_bins],
        }
    }

    #[cfg(test)]
    pub(crate) fn set_mag(&mut self, col: usize, bin: usize, value_db: f32) {
        self.mag_db[col * self.num_bins + bin] = value_db;
    }
}

/// STFT engine with a planned FFT and reusable buffers.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: hann_window(WINDOW_SAMPLES),
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
        }
    }

    /// Transform an audio buffer into its waterfall. Needs at least one
    /// full analysis window of samples.
    pub fn transform(&mut self, samples: &[f32]) -> Result<Waterfall> {
        if samples.len() < WINDOW_SAMPLES {
            return Err(CodecError::InvalidInputSize);
        }
        let num_cols = (samples.len() - WINDOW_SAMPLES) / HOP_SAMPLES + 1;
        let num_bins = FFT_SIZE / 2;
        let mut mag_db = Vec::with_capacity(num_cols * num_bins);

        for col in 0..num_cols {
            let start = col * HOP_SAMPLES;
            for (i, slot) in self.buffer.iter_mut().enumerate() {
                let v = if i < WINDOW_SAMPLES {
                    samples[start + i] * self.window[i]
                } else {
                    0.0
                };
                *slot = Complex::new(v, 0.0);
            }
            self.fft
                .process_with_scratch(&mut self.buffer, &mut self.scratch);
            for bin in 0..num_bins {
                let power = self.buffer[bin].norm_sqr();
                mag_db.push(10.0 * power.max(1e-12).log10());
            }
        }

        Ok(Waterfall {
            num_cols,
            num_bins,
            mag_db,
        })
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..len)
        .map(|i| {
            let x = (PI * i as f32 / len as f32).sin();
            x * x
        })
        .collect()
}
