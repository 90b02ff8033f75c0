//! Message grammar: typed representation of the supported message kinds and
//! the mapping between them and canonical on-air text.
//!
//! Three kinds are supported, dispatched in priority order when parsing:
//! a standard two-call exchange (optionally a directed CQ, with a grid
//! square, signal report or acknowledgement token), an 18-digit telemetry
//! string, and 13-character free text. Bit-level packing of these kinds
//! lives in [`crate::packing`]; this module is purely textual.

use std::fmt;

use crate::error::{CodecError, Result};

/// Characters allowed in free-text messages, in packing order.
pub const FREE_TEXT_CHARSET: &[u8] = b" 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ+-./?";

/// Characters allowed in nonstandard (hashed) callsigns.
pub const NONSTD_CALL_CHARSET: &[u8] = b" 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ/";

/// Maximum free-text length; longer messages do not fit the 71-bit field.
pub const MAX_FREE_TEXT_CHARS: usize = 13;

/// Telemetry is always exactly 18 hex digits (71 bits, first digit <= 7).
pub const TELEMETRY_DIGITS: usize = 18;

const MAX_NONSTD_CALL_CHARS: usize = 11;

/// Portable-operation suffix carried by a standard callsign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortableSuffix {
    /// The `/R` suffix.
    Rover,
    /// The `/P` suffix.
    Portable,
}

/// One of the two 28-bit call fields of a standard exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallField {
    De,
    Qrz,
    Cq,
    /// Directed CQ with a three-digit modifier, e.g. `CQ 042`.
    CqNumeric(u16),
    /// Directed CQ with a 1-4 letter modifier, e.g. `CQ DX`.
    CqDirected(String),
    /// A standard-structure callsign, encoded positionally.
    Standard {
        sign: String,
        suffix: Option<PortableSuffix>,
    },
    /// A nonstandard callsign sent as a 22-bit hash. The text is known on
    /// the sending side only; a receiver without the sender's hash table
    /// renders it as `<...>`.
    Hashed { sign: Option<String> },
}

/// The 15-bit exchange field plus its acknowledgement bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    None,
    Grid { rogered: bool, locator: String },
    Report { rogered: bool, db: i16 },
    Rrr,
    Rr73,
    Signoff,
}

/// A message as a closed tagged variant; packing is an exhaustive match on
/// this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Standard {
        dest: CallField,
        src: CallField,
        exchange: Exchange,
    },
    FreeText(String),
    Telemetry(String),
}

impl Message {
    /// Parse canonical (or canonicalizable) message text. Input is trimmed
    /// and upper-cased first; grammars are tried in priority order and the
    /// first match wins.
    pub fn parse(text: &str) -> Result<Message> {
        let canon = text.trim().to_ascii_uppercase();
        if canon.is_empty() {
            return Err(CodecError::InvalidMessageFormat);
        }
        if let Some(msg) = parse_standard(&canon) {
            return Ok(msg);
        }
        if let Some(msg) = parse_telemetry(&canon) {
            return Ok(msg);
        }
        if is_free_text(&canon) {
            return Ok(Message::FreeText(canon));
        }
        Err(CodecError::InvalidMessageFormat)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Standard {
                dest,
                src,
                exchange,
            } => {
                write!(f, "{} {}", dest, src)?;
                match exchange {
                    Exchange::None => Ok(()),
                    Exchange::Grid { rogered, locator } => {
                        if *rogered {
                            write!(f, " R {}", locator)
                        } else {
                            write!(f, " {}", locator)
                        }
                    }
                    Exchange::Report { rogered, db } => {
                        if *rogered {
                            write!(f, " R{:+03}", db)
                        } else {
                            write!(f, " {:+03}", db)
                        }
                    }
                    Exchange::Rrr => write!(f, " RRR"),
                    Exchange::Rr73 => write!(f, " RR73"),
                    Exchange::Signoff => write!(f, " 73"),
                }
            }
            Message::FreeText(text) => f.write_str(text),
            Message::Telemetry(hex) => f.write_str(hex),
        }
    }
}

impl fmt::Display for CallField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallField::De => f.write_str("DE"),
            CallField::Qrz => f.write_str("QRZ"),
            CallField::Cq => f.write_str("CQ"),
            CallField::CqNumeric(n) => write!(f, "CQ {:03}", n),
            CallField::CqDirected(s) => write!(f, "CQ {}", s),
            CallField::Standard { sign, suffix } => {
                f.write_str(sign)?;
                match suffix {
                    Some(PortableSuffix::Rover) => f.write_str("/R"),
                    Some(PortableSuffix::Portable) => f.write_str("/P"),
                    None => Ok(()),
                }
            }
            CallField::Hashed { sign: Some(s) } => write!(f, "<{}>", s),
            CallField::Hashed { sign: None } => f.write_str("<...>"),
        }
    }
}

fn parse_standard(text: &str) -> Option<Message> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 2 || tokens.len() > 5 {
        return None;
    }

    let (dest, src_idx) = match tokens[0] {
        "CQ" => {
            // A directed CQ spends a second token on the modifier, so the
            // caller must still follow: `CQ DX K1ABC ...`. A token that
            // parses as a callsign is the caller, not a modifier.
            if tokens.len() >= 3 && parse_call_token(tokens[1]).is_none() {
                (parse_cq_modifier(tokens[1])?, 2)
            } else {
                (CallField::Cq, 1)
            }
        }
        "QRZ" => (CallField::Qrz, 1),
        "DE" => (CallField::De, 1),
        t => (parse_call_token(t)?, 1),
    };

    let src = parse_call_token(tokens.get(src_idx)?)?;
    let exchange = parse_exchange(&tokens[src_idx + 1..])?;
    Some(Message::Standard {
        dest,
        src,
        exchange,
    })
}

fn parse_cq_modifier(token: &str) -> Option<CallField> {
    if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
        return Some(CallField::CqNumeric(token.parse().ok()?));
    }
    if (1..=4).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_uppercase()) {
        return Some(CallField::CqDirected(token.to_string()));
    }
    None
}

/// Parse a token in a callsign position. Recognizes bracketed hashed calls,
/// standard callsigns with an optional `/R` or `/P` suffix, and compound
/// nonstandard callsigns (which go out as a hash).
fn parse_call_token(token: &str) -> Option<CallField> {
    if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        if is_nonstandard_call(inner) {
            return Some(CallField::Hashed {
                sign: Some(inner.to_string()),
            });
        }
        return None;
    }

    let (base, suffix) = if let Some(b) = token.strip_suffix("/R") {
        (b, Some(PortableSuffix::Rover))
    } else if let Some(b) = token.strip_suffix("/P") {
        (b, Some(PortableSuffix::Portable))
    } else {
        (token, None)
    };

    if is_standard_callsign(base) {
        return Some(CallField::Standard {
            sign: base.to_string(),
            suffix,
        });
    }
    if suffix.is_none() && is_nonstandard_call(token) {
        return Some(CallField::Hashed {
            sign: Some(token.to_string()),
        });
    }
    None
}

/// Whether `sign` fits the positional standard-callsign structure
/// (prefix character, alphanumeric, digit, up to three trailing letters).
pub fn is_standard_callsign(sign: &str) -> bool {
    aligned_callsign(sign).is_some()
}

/// Align a standard callsign into its six encoding positions, or `None` if
/// it does not fit the structure. The digit always lands in position 3.
pub(crate) fn aligned_callsign(sign: &str) -> Option<[u8; 6]> {
    let b = sign.as_bytes();
    if b.len() < 2 || b.len() > 6 {
        return None;
    }

    let mut a = [b' '; 6];
    if b.len() >= 3 && b[2].is_ascii_digit() {
        a[..b.len()].copy_from_slice(b);
    } else if b[1].is_ascii_digit() && b.len() <= 5 {
        a[1..1 + b.len()].copy_from_slice(b);
    } else {
        return None;
    }

    if !(a[0] == b' ' || a[0].is_ascii_digit() || a[0].is_ascii_uppercase()) {
        return None;
    }
    if !(a[1].is_ascii_digit() || a[1].is_ascii_uppercase()) {
        return None;
    }
    // Tail: letters, then only padding spaces.
    let mut in_padding = false;
    for &c in &a[3..] {
        match c {
            b' ' => in_padding = true,
            b'A'..=b'Z' if !in_padding => {}
            _ => return None,
        }
    }
    // All-digit tokens are modifiers or reports, never callsigns.
    if !a.iter().any(|c| c.is_ascii_uppercase()) {
        return None;
    }
    Some(a)
}

fn is_nonstandard_call(token: &str) -> bool {
    let len = token.len();
    if !(3..=MAX_NONSTD_CALL_CHARS).contains(&len) {
        return false;
    }
    if !token
        .bytes()
        .all(|b| b != b' ' && NONSTD_CALL_CHARSET.contains(&b))
    {
        return false;
    }
    let has_letter = token.bytes().any(|b| b.is_ascii_uppercase());
    let has_digit = token.bytes().any(|b| b.is_ascii_digit());
    // Plain words must not be mistaken for callsigns: require a compound
    // (slashed) form or an unusually long sign.
    let compound = token.contains('/') || len >= 7;
    has_letter && has_digit && compound && !token.starts_with('/') && !token.ends_with('/')
}

fn parse_exchange(rest: &[&str]) -> Option<Exchange> {
    match rest {
        [] => Some(Exchange::None),
        [token] => parse_exchange_token(token),
        ["R", grid] => Some(Exchange::Grid {
            rogered: true,
            locator: parse_grid(grid)?,
        }),
        _ => None,
    }
}

fn parse_exchange_token(token: &str) -> Option<Exchange> {
    match token {
        "RRR" => return Some(Exchange::Rrr),
        "RR73" => return Some(Exchange::Rr73),
        "73" => return Some(Exchange::Signoff),
        _ => {}
    }
    if let Some(locator) = parse_grid(token) {
        return Some(Exchange::Grid {
            rogered: false,
            locator,
        });
    }
    let (body, rogered) = match token.strip_prefix('R') {
        Some(b) if b.starts_with('+') || b.starts_with('-') => (b, true),
        _ => (token, false),
    };
    parse_report(body).map(|db| Exchange::Report { rogered, db })
}

fn parse_grid(token: &str) -> Option<String> {
    let b = token.as_bytes();
    if b.len() == 4
        && (b'A'..=b'R').contains(&b[0])
        && (b'A'..=b'R').contains(&b[1])
        && b[2].is_ascii_digit()
        && b[3].is_ascii_digit()
    {
        Some(token.to_string())
    } else {
        None
    }
}

fn parse_report(token: &str) -> Option<i16> {
    let b = token.as_bytes();
    if b.len() != 3 || (b[0] != b'+' && b[0] != b'-') {
        return None;
    }
    if !(b[1].is_ascii_digit() && b[2].is_ascii_digit()) {
        return None;
    }
    let db: i16 = token.parse().ok()?;
    // Lower bound fixed by the 15-bit field layout.
    if (-30..=99).contains(&db) {
        Some(db)
    } else {
        None
    }
}

fn parse_telemetry(text: &str) -> Option<Message> {
    let b = text.as_bytes();
    if b.len() != TELEMETRY_DIGITS {
        return None;
    }
    if !b.iter().all(|c| c.is_ascii_digit() || (b'A'..=b'F').contains(c)) {
        return None;
    }
    // 18 hex digits are 72 bits; the field holds 71, so the first digit
    // must leave the top bit clear.
    if b[0] > b'7' {
        return None;
    }
    Some(Message::Telemetry(text.to_string()))
}

fn is_free_text(text: &str) -> bool {
    text.len() <= MAX_FREE_TEXT_CHARS && text.bytes().all(|b| FREE_TEXT_CHARSET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) {
        let msg = Message::parse(text).unwrap();
        assert_eq!(msg.to_string(), text, "canonical rendering changed");
    }

    #[test]
    fn test_parse_cq_with_grid() {
        let msg = Message::parse("CQ WA8Q DM43").unwrap();
        assert_eq!(
            msg,
            Message::Standard {
                dest: CallField::Cq,
                src: CallField::Standard {
                    sign: "WA8Q".into(),
                    suffix: None
                },
                exchange: Exchange::Grid {
                    rogered: false,
                    locator: "DM43".into()
                },
            }
        );
        roundtrip("CQ WA8Q DM43");
    }

    #[test]
    fn test_parse_directed_cq() {
        let msg = Message::parse("CQ DX K1ABC FN42").unwrap();
        match msg {
            Message::Standard { dest, .. } => {
                assert_eq!(dest, CallField::CqDirected("DX".into()))
            }
            other => panic!("unexpected parse: {:?}", other),
        }
        roundtrip("CQ DX K1ABC FN42");
        roundtrip("CQ 042 K1ABC");
    }

    #[test]
    fn test_parse_reports_and_acks() {
        roundtrip("K1ABC WA8Q -15");
        roundtrip("WA8Q K1ABC R-07");
        roundtrip("K1ABC WA8Q +05");
        roundtrip("K1ABC WA8Q RRR");
        roundtrip("K1ABC WA8Q RR73");
        roundtrip("K1ABC WA8Q 73");
        roundtrip("K1ABC WA8Q R FN42");
    }

    #[test]
    fn test_parse_portable_suffixes() {
        let msg = Message::parse("K1ABC/R WA8Q FN42").unwrap();
        match &msg {
            Message::Standard { dest, .. } => assert_eq!(
                dest,
                &CallField::Standard {
                    sign: "K1ABC".into(),
                    suffix: Some(PortableSuffix::Rover)
                }
            ),
            other => panic!("unexpected parse: {:?}", other),
        }
        roundtrip("K1ABC/R WA8Q FN42");
        roundtrip("K1ABC/P WA8Q IO91");
    }

    #[test]
    fn test_compound_call_goes_hashed() {
        let msg = Message::parse("PJ4/K1ABC WA8Q 73").unwrap();
        match msg {
            Message::Standard { dest, .. } => assert_eq!(
                dest,
                CallField::Hashed {
                    sign: Some("PJ4/K1ABC".into())
                }
            ),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_rr73_is_not_a_grid() {
        let msg = Message::parse("K1ABC WA8Q RR73").unwrap();
        match msg {
            Message::Standard { exchange, .. } => assert_eq!(exchange, Exchange::Rr73),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_free_text_fallback() {
        assert_eq!(
            Message::parse("TNX BOB 73 GL").unwrap(),
            Message::FreeText("TNX BOB 73 GL".into())
        );
        // Lowercase input is canonicalized.
        assert_eq!(
            Message::parse("tnx bob").unwrap(),
            Message::FreeText("TNX BOB".into())
        );
    }

    #[test]
    fn test_free_text_too_long_rejected() {
        assert_eq!(
            Message::parse("THIS IS WAY TOO LONG"),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_free_text_bad_charset_rejected() {
        assert_eq!(
            Message::parse("HELLO ~~~"),
            Err(CodecError::InvalidMessageFormat)
        );
    }

    #[test]
    fn test_telemetry_requires_exactly_18_digits() {
        assert_eq!(
            Message::parse("0123456789ABCDEF01").unwrap(),
            Message::Telemetry("0123456789ABCDEF01".into())
        );
        // 17 hex digits are not telemetry (and too long for free text).
        assert!(Message::parse("0123456789ABCDEF0").is_err());
        // First digit above 7 would need a 72nd bit.
        assert!(Message::parse("8123456789ABCDEF01").is_err());
    }

    #[test]
    fn test_standard_callsign_alignment() {
        assert_eq!(aligned_callsign("WA8Q"), Some(*b"WA8Q  "));
        assert_eq!(aligned_callsign("K1ABC"), Some(*b" K1ABC"));
        assert_eq!(aligned_callsign("9A1A"), Some(*b"9A1A  "));
        assert_eq!(aligned_callsign("DX"), None);
        assert_eq!(aligned_callsign("TOOLONGCALL"), None);
    }

    #[test]
    fn test_empty_message_rejected() {
        assert_eq!(Message::parse("   "), Err(CodecError::InvalidMessageFormat));
    }
}
