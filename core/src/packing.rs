//! Bit-level payload packing: [`Message`] values to and from the 77-bit
//! payload, externally carried as 10 bytes MSB-first with the final 3 bits
//! zero.
//!
//! Field layouts (bit counts):
//! - standard exchange, tags 1 and 2: `c28 p1 c28 p1 R1 g15 i3`
//! - free text, tag 0 subtype 0:      `f71 n3 i3`
//! - telemetry, tag 0 subtype 5:      `t71 n3 i3`

use crate::error::{CodecError, Result};
use crate::message::{
    aligned_callsign, CallField, Exchange, Message, PortableSuffix, FREE_TEXT_CHARSET,
    MAX_FREE_TEXT_CHARS, NONSTD_CALL_CHARSET, TELEMETRY_DIGITS,
};
use crate::{PAYLOAD_BITS, PAYLOAD_BYTES};

/// Values 0..NTOKENS of a call field are special tokens (DE/QRZ/CQ and the
/// directed-CQ forms); the next MAX22 values are hashed callsigns; the rest
/// are positional standard callsigns.
const NTOKENS: u32 = 2_063_592;
const MAX22: u32 = 4_194_304;

/// Directed-CQ letter modifiers start above the three-digit numeric block.
const CQ_LETTER_BASE: u32 = 3 + 1000;
const CQ_LETTER_SPAN: u32 = 531_441; // 27^4

/// Grid-square values; anything above encodes blanks, acks and reports.
const MAX_GRID4: u16 = 32_400;

/// Report field offset: `g15 = MAX_GRID4 + 35 + dB`.
const REPORT_OFFSET: i16 = 35;

const CALL_CHARSET_FIRST: &[u8] = b" 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CALL_CHARSET_SECOND: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CALL_CHARSET_TAIL: &[u8] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Multiplier of the 22-bit callsign hash.
const HASH_MULTIPLIER: u64 = 47_055_833_459;

const FREE_TEXT_RADIX: u128 = 42;

/// Pack message text into a 10-byte payload.
pub fn pack(text: &str) -> Result<[u8; PAYLOAD_BYTES]> {
    pack_message(&Message::parse(text)?)
}

/// Unpack a 10-byte payload into canonical message text.
pub fn unpack(payload: &[u8]) -> Result<String> {
    let bytes: &[u8; PAYLOAD_BYTES] = payload
        .try_into()
        .map_err(|_| CodecError::InvalidPayloadLength)?;
    Ok(unpack_message(bytes)?.to_string())
}

/// Pack a parsed message into its payload bits.
pub fn pack_message(msg: &Message) -> Result<[u8; PAYLOAD_BYTES]> {
    let mut w = BitWriter::new();
    match msg {
        Message::FreeText(text) => {
            w.put_wide(pack_free_text(text)?, 71);
            w.put(0, 3); // subtype
            w.put(0, 3); // tag
        }
        Message::Telemetry(hex) => {
            w.put_wide(pack_telemetry(hex)?, 71);
            w.put(5, 3);
            w.put(0, 3);
        }
        Message::Standard {
            dest,
            src,
            exchange,
        } => {
            let tag = standard_tag(dest, src)?;
            let (c28a, pa) = pack_call_field(dest)?;
            let (c28b, pb) = pack_call_field(src)?;
            let (r1, g15) = pack_exchange(exchange)?;
            w.put(c28a, 28);
            w.put(pa, 1);
            w.put(c28b, 28);
            w.put(pb, 1);
            w.put(r1, 1);
            w.put(g15, 15);
            w.put(tag, 3);
        }
    }
    Ok(w.into_bytes())
}

/// Unpack payload bits into a message.
pub fn unpack_message(payload: &[u8; PAYLOAD_BYTES]) -> Result<Message> {
    let tag = read_field(payload, 74, 3) as u8;
    let mut r = BitReader::new(payload);
    match tag {
        0 => {
            let value = r.take_wide(71);
            match r.take(3) {
                0 => Ok(Message::FreeText(unpack_free_text(value)?)),
                5 => Ok(Message::Telemetry(format!("{:018X}", value))),
                _ => Err(CodecError::InvalidMessageFormat),
            }
        }
        1 | 2 => {
            let c28a = r.take(28);
            let pa = r.take(1);
            let c28b = r.take(28);
            let pb = r.take(1);
            let r1 = r.take(1);
            let g15 = r.take(15) as u16;
            let dest = unpack_call_field(c28a, pa != 0, tag)?;
            let src = unpack_call_field(c28b, pb != 0, tag)?;
            let exchange = unpack_exchange(r1 != 0, g15)?;
            Ok(Message::Standard {
                dest,
                src,
                exchange,
            })
        }
        _ => Err(CodecError::InvalidMessageFormat),
    }
}

fn standard_tag(dest: &CallField, src: &CallField) -> Result<u32> {
    let mut rover = false;
    let mut portable = false;
    for field in [dest, src] {
        if let CallField::Standard { suffix, .. } = field {
            match suffix {
                Some(PortableSuffix::Rover) => rover = true,
                Some(PortableSuffix::Portable) => portable = true,
                None => {}
            }
        }
    }
    match (rover, portable) {
        // The tag selects the suffix meaning for both calls, so they
        // cannot mix within one message.
        (true, true) => Err(CodecError::InvalidMessageFormat),
        (_, true) => Ok(2),
        _ => Ok(1),
    }
}

fn pack_call_field(field: &CallField) -> Result<(u32, u32)> {
    let c28 = match field {
        CallField::De => 0,
        CallField::Qrz => 1,
        CallField::Cq => 2,
        CallField::CqNumeric(n) => 3 + *n as u32,
        CallField::CqDirected(letters) => CQ_LETTER_BASE + cq_letters_value(letters)?,
        CallField::Standard { sign, .. } => NTOKENS + MAX22 + pack_standard_call(sign)?,
        CallField::Hashed { sign: Some(sign) } => NTOKENS + hash22(sign),
        // A hash received without its text cannot be sent again.
        CallField::Hashed { sign: None } => return Err(CodecError::InvalidMessageFormat),
    };
    let suffix_bit = match field {
        CallField::Standard {
            suffix: Some(_), ..
        } => 1,
        _ => 0,
    };
    Ok((c28, suffix_bit))
}

fn unpack_call_field(c28: u32, suffix_bit: bool, tag: u8) -> Result<CallField> {
    if c28 < 3 {
        return Ok(match c28 {
            0 => CallField::De,
            1 => CallField::Qrz,
            _ => CallField::Cq,
        });
    }
    if c28 < CQ_LETTER_BASE {
        return Ok(CallField::CqNumeric((c28 - 3) as u16));
    }
    if c28 < CQ_LETTER_BASE + CQ_LETTER_SPAN {
        return Ok(CallField::CqDirected(cq_letters_text(c28 - CQ_LETTER_BASE)?));
    }
    if c28 < NTOKENS {
        // Token gap this packer never produces.
        return Err(CodecError::InvalidMessageFormat);
    }
    if c28 < NTOKENS + MAX22 {
        return Ok(CallField::Hashed { sign: None });
    }
    let sign = unpack_standard_call(c28 - NTOKENS - MAX22)?;
    let suffix = if suffix_bit {
        Some(if tag == 2 {
            PortableSuffix::Portable
        } else {
            PortableSuffix::Rover
        })
    } else {
        None
    };
    Ok(CallField::Standard { sign, suffix })
}

fn cq_letters_value(letters: &str) -> Result<u32> {
    let b = letters.as_bytes();
    if b.is_empty() || b.len() > 4 || !b.iter().all(|c| c.is_ascii_uppercase()) {
        return Err(CodecError::InvalidMessageFormat);
    }
    // Left-pad to four base-27 digits; space is zero, letters are 1..=26.
    let mut v: u32 = 0;
    for i in 0..4 {
        let digit = if i < 4 - b.len() {
            0
        } else {
            (b[i - (4 - b.len())] - b'A' + 1) as u32
        };
        v = v * 27 + digit;
    }
    Ok(v)
}

fn cq_letters_text(mut v: u32) -> Result<String> {
    let mut chars = [b' '; 4];
    for slot in chars.iter_mut().rev() {
        let digit = (v % 27) as u8;
        v /= 27;
        *slot = if digit == 0 { b' ' } else { b'A' + digit - 1 };
    }
    if v != 0 {
        return Err(CodecError::InvalidMessageFormat);
    }
    let text: String = chars
        .iter()
        .filter(|&&c| c != b' ')
        .map(|&c| c as char)
        .collect();
    if text.is_empty() {
        return Err(CodecError::InvalidMessageFormat);
    }
    Ok(text)
}

fn pack_standard_call(sign: &str) -> Result<u32> {
    let a = aligned_callsign(sign).ok_or(CodecError::InvalidMessageFormat)?;
    let idx = |set: &[u8], c: u8| -> Result<u32> {
        set.iter()
            .position(|&x| x == c)
            .map(|p| p as u32)
            .ok_or(CodecError::InvalidMessageFormat)
    };
    let mut n = idx(CALL_CHARSET_FIRST, a[0])?;
    n = n * 36 + idx(CALL_CHARSET_SECOND, a[1])?;
    n = n * 10 + (a[2] - b'0') as u32;
    for &c in &a[3..] {
        n = n * 27 + idx(CALL_CHARSET_TAIL, c)?;
    }
    Ok(n)
}

fn unpack_standard_call(mut n: u32) -> Result<String> {
    let mut a = [b' '; 6];
    for slot in a[3..].iter_mut().rev() {
        *slot = CALL_CHARSET_TAIL[(n % 27) as usize];
        n /= 27;
    }
    a[2] = b'0' + (n % 10) as u8;
    n /= 10;
    a[1] = CALL_CHARSET_SECOND[(n % 36) as usize];
    n /= 36;
    if n >= CALL_CHARSET_FIRST.len() as u32 {
        return Err(CodecError::InvalidMessageFormat);
    }
    a[0] = CALL_CHARSET_FIRST[n as usize];

    let sign: String = a
        .iter()
        .filter(|&&c| c != b' ')
        .map(|&c| c as char)
        .collect();
    if sign.len() < 2 {
        return Err(CodecError::InvalidMessageFormat);
    }
    Ok(sign)
}

/// 22-bit multiplicative hash of a nonstandard callsign.
fn hash22(sign: &str) -> u32 {
    let mut n: u64 = 0;
    for i in 0..11 {
        let c = sign.as_bytes().get(i).copied().unwrap_or(b' ');
        let idx = NONSTD_CALL_CHARSET
            .iter()
            .position(|&x| x == c)
            .unwrap_or(0) as u64;
        n = n * 38 + idx;
    }
    ((n.wrapping_mul(HASH_MULTIPLIER)) >> 42) as u32 & (MAX22 - 1)
}

fn pack_exchange(exchange: &Exchange) -> Result<(u32, u32)> {
    Ok(match exchange {
        Exchange::None => (0, MAX_GRID4 as u32 + 1),
        Exchange::Rrr => (0, MAX_GRID4 as u32 + 2),
        Exchange::Rr73 => (0, MAX_GRID4 as u32 + 3),
        Exchange::Signoff => (0, MAX_GRID4 as u32 + 4),
        Exchange::Grid { rogered, locator } => {
            let b = locator.as_bytes();
            if b.len() != 4
                || !(b'A'..=b'R').contains(&b[0])
                || !(b'A'..=b'R').contains(&b[1])
                || !b[2].is_ascii_digit()
                || !b[3].is_ascii_digit()
            {
                return Err(CodecError::InvalidMessageFormat);
            }
            let mut g = (b[0] - b'A') as u32;
            g = g * 18 + (b[1] - b'A') as u32;
            g = g * 10 + (b[2] - b'0') as u32;
            g = g * 10 + (b[3] - b'0') as u32;
            (*rogered as u32, g)
        }
        Exchange::Report { rogered, db } => {
            if !(-30..=99).contains(db) {
                return Err(CodecError::InvalidMessageFormat);
            }
            (
                *rogered as u32,
                MAX_GRID4 as u32 + (REPORT_OFFSET + db) as u32,
            )
        }
    })
}

fn unpack_exchange(rogered: bool, g15: u16) -> Result<Exchange> {
    if g15 < MAX_GRID4 {
        let mut g = g15 as u32;
        let d2 = (g % 10) as u8;
        g /= 10;
        let d1 = (g % 10) as u8;
        g /= 10;
        let b = (g % 18) as u8;
        g /= 18;
        let locator = format!(
            "{}{}{}{}",
            (b'A' + g as u8) as char,
            (b'A' + b) as char,
            (b'0' + d1) as char,
            (b'0' + d2) as char
        );
        return Ok(Exchange::Grid { rogered, locator });
    }
    match g15 - MAX_GRID4 {
        1 => Ok(Exchange::None),
        2 => Ok(Exchange::Rrr),
        3 => Ok(Exchange::Rr73),
        4 => Ok(Exchange::Signoff),
        irpt => {
            let db = irpt as i16 - REPORT_OFFSET;
            if (-30..=99).contains(&db) {
                Ok(Exchange::Report { rogered, db })
            } else {
                Err(CodecError::InvalidMessageFormat)
            }
        }
    }
}

fn pack_free_text(text: &str) -> Result<u128> {
    if text.len() > MAX_FREE_TEXT_CHARS {
        return Err(CodecError::InvalidMessageFormat);
    }
    let mut v: u128 = 0;
    for i in 0..MAX_FREE_TEXT_CHARS {
        let c = text.as_bytes().get(i).copied().unwrap_or(b' ');
        let idx = FREE_TEXT_CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or(CodecError::InvalidMessageFormat)?;
        v = v * FREE_TEXT_RADIX + idx as u128;
    }
    Ok(v)
}

fn unpack_free_text(mut v: u128) -> Result<String> {
    let mut chars = [b' '; MAX_FREE_TEXT_CHARS];
    for slot in chars.iter_mut().rev() {
        *slot = FREE_TEXT_CHARSET[(v % FREE_TEXT_RADIX) as usize];
        v /= FREE_TEXT_RADIX;
    }
    if v != 0 {
        return Err(CodecError::InvalidMessageFormat);
    }
    let text: String = chars.iter().map(|&c| c as char).collect();
    Ok(text.trim().to_string())
}

fn pack_telemetry(hex: &str) -> Result<u128> {
    if hex.len() != TELEMETRY_DIGITS {
        return Err(CodecError::InvalidMessageFormat);
    }
    let v = u128::from_str_radix(hex, 16).map_err(|_| CodecError::InvalidMessageFormat)?;
    if v >> 71 != 0 {
        return Err(CodecError::InvalidMessageFormat);
    }
    Ok(v)
}

/// Read `width` bits starting at `start`, MSB-first.
fn read_field(bytes: &[u8], start: usize, width: usize) -> u32 {
    let mut v = 0;
    for i in start..start + width {
        v = (v << 1) | ((bytes[i / 8] >> (7 - i % 8)) & 1) as u32;
    }
    v
}

struct BitWriter {
    bytes: [u8; PAYLOAD_BYTES],
    pos: usize,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: [0; PAYLOAD_BYTES],
            pos: 0,
        }
    }

    fn put(&mut self, value: u32, width: usize) {
        self.put_wide(value as u128, width);
    }

    fn put_wide(&mut self, value: u128, width: usize) {
        debug_assert!(self.pos + width <= PAYLOAD_BITS);
        for k in (0..width).rev() {
            if (value >> k) & 1 != 0 {
                self.bytes[self.pos / 8] |= 1 << (7 - self.pos % 8);
            }
            self.pos += 1;
        }
    }

    fn into_bytes(self) -> [u8; PAYLOAD_BYTES] {
        debug_assert_eq!(self.pos, PAYLOAD_BITS);
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8; PAYLOAD_BYTES],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8; PAYLOAD_BYTES]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, width: usize) -> u32 {
        self.take_wide(width) as u32
    }

    fn take_wide(&mut self, width: usize) -> u128 {
        let mut v: u128 = 0;
        for _ in 0..width {
            v = (v << 1) | ((self.bytes[self.pos / 8] >> (7 - self.pos % 8)) & 1) as u128;
            self.pos += 1;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) {
        let payload = pack(text).unwrap();
        assert_eq!(unpack(&payload).unwrap(), text, "payload round trip");
    }

    #[test]
    fn test_cq_grid_roundtrip_and_determinism() {
        let a = pack("CQ WA8Q DM43").unwrap();
        let b = pack("CQ WA8Q DM43").unwrap();
        assert_eq!(a, b, "packing must be reproducible");
        assert_eq!(unpack(&a).unwrap(), "CQ WA8Q DM43");
        // Final 3 bits of the 10th byte are padding and stay zero.
        assert_eq!(a[PAYLOAD_BYTES - 1] & 0x07, 0);
    }

    #[test]
    fn test_standard_exchange_roundtrips() {
        roundtrip("CQ K1ABC FN42");
        roundtrip("K1ABC WA8Q -15");
        roundtrip("WA8Q K1ABC R-07");
        roundtrip("K1ABC WA8Q +05");
        roundtrip("K1ABC WA8Q RRR");
        roundtrip("K1ABC WA8Q RR73");
        roundtrip("K1ABC WA8Q 73");
        roundtrip("K1ABC WA8Q R FN42");
        roundtrip("QRZ K1ABC FN42");
        roundtrip("DE K1ABC FN42");
        roundtrip("K1ABC WA8Q");
    }

    #[test]
    fn test_directed_cq_roundtrips() {
        roundtrip("CQ DX K1ABC FN42");
        roundtrip("CQ POTA K1ABC");
        roundtrip("CQ 042 K1ABC");
        roundtrip("CQ 999 K1ABC");
    }

    #[test]
    fn test_portable_suffix_roundtrips() {
        roundtrip("K1ABC/R WA8Q FN42");
        roundtrip("K1ABC/P WA8Q IO91");
        roundtrip("K1ABC/R WA8Q/R RR73");
    }

    #[test]
    fn test_mixed_suffixes_rejected() {
        assert_eq!(
            pack("K1ABC/R WA8Q/P FN42"),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_free_text_roundtrips() {
        roundtrip("TNX BOB 73 GL");
        roundtrip("HELLO");
        roundtrip("73 GL");
        roundtrip("?");
    }

    #[test]
    fn test_telemetry_roundtrip() {
        roundtrip("0123456789ABCDEF01");
        roundtrip("7FFFFFFFFFFFFFFFFF");
        roundtrip("000000000000000000");
    }

    #[test]
    fn test_hashed_call_packs_but_unpacks_opaque() {
        let payload = pack("PJ4/K1ABC WA8Q 73").unwrap();
        assert_eq!(unpack(&payload).unwrap(), "<...> WA8Q 73");
    }

    #[test]
    fn test_hash22_is_bounded_and_deterministic() {
        let h = hash22("PJ4/K1ABC");
        assert_eq!(h, hash22("PJ4/K1ABC"));
        assert!(h < MAX22);
        assert_ne!(h, hash22("KH1/KH7Z"));
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        assert_eq!(unpack(&[0u8; 9]), Err(CodecError::InvalidPayloadLength));
        assert_eq!(unpack(&[0u8; 11]), Err(CodecError::InvalidPayloadLength));
    }

    #[test]
    fn test_unpack_rejects_unassigned_tag() {
        // Tag 7 in the last three payload bits.
        let mut payload = [0u8; PAYLOAD_BYTES];
        payload[9] = 0b0011_1000;
        assert_eq!(
            unpack_message(&payload),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_unpack_rejects_unassigned_subtype() {
        // Tag 0 subtype 3 is not assigned.
        let mut payload = [0u8; PAYLOAD_BYTES];
        payload[9] = 0b1100_0000;
        assert_eq!(
            unpack_message(&payload),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_pack_rejects_oversized_text() {
        assert_eq!(
            pack("FOURTEEN CHARS"),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_distinct_messages_distinct_payloads() {
        let a = pack("CQ WA8Q DM43").unwrap();
        let b = pack("CQ WA8Q DM44").unwrap();
        let c = pack("CQ K1ABC DM43").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_standard_call_field_codec() {
        for sign in ["WA8Q", "K1ABC", "9A1A", "G4ABC", "N0Y"] {
            let n = pack_standard_call(sign).unwrap();
            assert_eq!(unpack_standard_call(n).unwrap(), sign, "codec for {}", sign);
        }
    }
}
