//! Channel-symbol layout: codeword bits onto the 79-symbol frame.
//!
//! Three fixed 7-symbol Costas blocks bracket and split the 58 data symbols;
//! each data symbol carries three codeword bits, Gray-coded onto one of the
//! eight tones.

use crate::CODEWORD_BITS;

pub const NUM_SYMBOLS: usize = 79;
pub const NUM_DATA_SYMBOLS: usize = 58;
pub const COSTAS_LENGTH: usize = 7;

/// The Costas synchronization pattern, known to both ends of the link.
pub const COSTAS_PATTERN: [u8; COSTAS_LENGTH] = [3, 1, 4, 0, 6, 5, 2];

/// Start positions of the three Costas blocks within the frame.
pub const COSTAS_POSITIONS: [usize; 3] = [0, 36, 72];

/// Gray map from a 3-bit group to its tone number.
pub const GRAY_MAP: [u8; 8] = [0, 1, 3, 2, 5, 6, 4, 7];

/// Frame position of data symbol `d` (0..58): the data symbols sit between
/// the Costas blocks, 29 on each side.
pub fn data_symbol_position(d: usize) -> usize {
    debug_assert!(d < NUM_DATA_SYMBOLS);
    if d < 29 {
        7 + d
    } else {
        43 + (d - 29)
    }
}

/// Map a codeword onto the 79 tone numbers of a frame.
pub fn tones_for_codeword(codeword: &[u8; CODEWORD_BITS]) -> [u8; NUM_SYMBOLS] {
    let mut tones = [0u8; NUM_SYMBOLS];
    for &start in &COSTAS_POSITIONS {
        tones[start..start + COSTAS_LENGTH].copy_from_slice(&COSTAS_PATTERN);
    }
    for d in 0..NUM_DATA_SYMBOLS {
        let group = (codeword[3 * d] << 2) | (codeword[3 * d + 1] << 1) | codeword[3 * d + 2];
        tones[data_symbol_position(d)] = GRAY_MAP[group as usize];
    }
    tones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_map_is_a_permutation() {
        let mut seen = [false; 8];
        for &t in &GRAY_MAP {
            assert!(!seen[t as usize]);
            seen[t as usize] = true;
        }
    }

    #[test]
    fn test_adjacent_tones_differ_in_one_bit() {
        // Neighboring tones decode to 3-bit groups one bit apart, which is
        // the point of the Gray coding.
        for t in 0..7u8 {
            let g1 = GRAY_MAP.iter().position(|&x| x == t).unwrap();
            let g2 = GRAY_MAP.iter().position(|&x| x == t + 1).unwrap();
            assert_eq!(
                ((g1 ^ g2) as u32).count_ones(),
                1,
                "tones {} and {}",
                t,
                t + 1
            );
        }
    }

    #[test]
    fn test_sync_blocks_at_fixed_positions() {
        let codeword = [0u8; CODEWORD_BITS];
        let tones = tones_for_codeword(&codeword);
        for &start in &COSTAS_POSITIONS {
            assert_eq!(&tones[start..start + COSTAS_LENGTH], &COSTAS_PATTERN);
        }
    }

    #[test]
    fn test_data_symbol_positions_avoid_sync() {
        let mut used = [false; NUM_SYMBOLS];
        for &start in &COSTAS_POSITIONS {
            for k in 0..COSTAS_LENGTH {
                used[start + k] = true;
            }
        }
        for d in 0..NUM_DATA_SYMBOLS {
            let pos = data_symbol_position(d);
            assert!(!used[pos], "data symbol {} collides with sync", d);
            used[pos] = true;
        }
        assert!(used.iter().all(|&u| u), "frame has unused positions");
    }

    #[test]
    fn test_all_ones_codeword_uses_top_gray_tone() {
        let codeword = [1u8; CODEWORD_BITS];
        let tones = tones_for_codeword(&codeword);
        assert_eq!(tones[data_symbol_position(0)], GRAY_MAP[7]);
        assert_eq!(tones[data_symbol_position(57)], GRAY_MAP[7]);
    }
}
