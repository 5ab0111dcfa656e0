//! Binary wire formats that `tokio-postgres` only exposes through optional crates.
//!
//! `numeric`, `uuid` and `interval` are read and rendered as text here so the
//! driver can hand them back as `Value::Text` without pulling in a decimal or uuid
//! library.

use std::error::Error;
use std::fmt::Write;

use tokio_util::bytes::{BufMut, BytesMut};

type WireError = Box<dyn Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;
const NBASE: usize = 4;

fn read_pair(raw: &[u8], at: usize) -> Result<[u8; 2], WireError> {
    raw.get(at..at + 2)
        .and_then(|b| <[u8; 2]>::try_from(b).ok())
        .ok_or_else(|| "truncated numeric value".into())
}

fn read_i16(raw: &[u8], at: usize) -> Result<i16, WireError> {
    read_pair(raw, at).map(i16::from_be_bytes)
}

fn read_u16(raw: &[u8], at: usize) -> Result<u16, WireError> {
    read_pair(raw, at).map(u16::from_be_bytes)
}

/// Render a binary `numeric` as its canonical decimal string.
pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, WireError> {
    let ndigits = usize::try_from(read_i16(raw, 0)?)?;
    let weight = i32::from(read_i16(raw, 2)?);
    let sign = read_u16(raw, 4)?;
    let dscale = usize::from(read_u16(raw, 6)?);
    let digits = (0..ndigits)
        .map(|i| read_i16(raw, 8 + i * 2))
        .collect::<Result<Vec<_>, _>>()?;

    match sign {
        NUMERIC_NAN => return Ok("NaN".into()),
        NUMERIC_PINF => return Ok("Infinity".into()),
        NUMERIC_NINF => return Ok("-Infinity".into()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {other:#06x}").into()),
    }

    // Digit k carries weight (weight - k) in base 10000.
    let digit_at = |power: i32| -> i16 {
        usize::try_from(weight - power)
            .ok()
            .and_then(|k| digits.get(k).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for power in (0..=weight).rev() {
            if power == weight {
                write!(out, "{}", digit_at(power))?;
            } else {
                write!(out, "{:04}", digit_at(power))?;
            }
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + NBASE);
        let mut power = -1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", digit_at(power))?;
            power -= 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// Encode a decimal string (`-12.50`, `NaN`, `Infinity`) as a binary `numeric`.
pub(crate) fn encode_numeric(text: &str, out: &mut BytesMut) -> Result<(), WireError> {
    let text = text.trim();
    let special = match text {
        "NaN" | "nan" => Some(NUMERIC_NAN),
        "Infinity" | "inf" | "+inf" => Some(NUMERIC_PINF),
        "-Infinity" | "-inf" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        out.put_i16(0);
        out.put_i16(0);
        out.put_u16(sign);
        out.put_u16(0);
        return Ok(());
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(format!("`{text}` is not a decimal number").into());
    }

    let int_part = int_part.trim_start_matches('0');
    let dscale = u16::try_from(frac_part.len())?;

    let int_pad = (NBASE - int_part.len() % NBASE) % NBASE;
    let frac_pad = (NBASE - frac_part.len() % NBASE) % NBASE;
    let padded_int = format!("{}{int_part}", "0".repeat(int_pad));
    let padded_frac = format!("{frac_part}{}", "0".repeat(frac_pad));

    let int_groups = padded_int.len() / NBASE;
    let mut groups = padded_int
        .as_bytes()
        .chunks(NBASE)
        .chain(padded_frac.as_bytes().chunks(NBASE))
        .map(|chunk| {
            chunk
                .iter()
                .fold(0_i16, |acc, b| acc * 10 + i16::from(b - b'0'))
        })
        .collect::<Vec<_>>();
    let mut weight = i16::try_from(int_groups)? - 1;

    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= i16::try_from(leading)?;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    out.put_i16(i16::try_from(groups.len())?);
    out.put_i16(weight);
    out.put_u16(if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    });
    out.put_u16(dscale);
    for group in groups {
        out.put_i16(group);
    }
    Ok(())
}

/// Render a binary `uuid` in the hyphenated lowercase form.
pub(crate) fn decode_uuid(raw: &[u8]) -> Result<String, WireError> {
    if raw.len() != 16 {
        return Err(format!("uuid must be 16 bytes, got {}", raw.len()).into());
    }
    let mut out = String::with_capacity(36);
    for (i, byte) in raw.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        write!(out, "{byte:02x}")?;
    }
    Ok(out)
}

/// Parse `xxxxxxxx-xxxx-...` (hyphens and braces optional) into the 16 wire bytes.
pub(crate) fn encode_uuid(text: &str, out: &mut BytesMut) -> Result<(), WireError> {
    let hex: String = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if hex.len() != 32 || !hex.is_ascii() {
        return Err(format!("`{text}` is not a uuid").into());
    }
    for pair in hex.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair)?;
        out.put_u8(u8::from_str_radix(pair, 16)?);
    }
    Ok(())
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Render a binary `interval` the way the server's default output style does
/// (`1 year 2 mons 3 days 04:05:06.5`).
pub(crate) fn decode_interval(raw: &[u8]) -> Result<String, WireError> {
    let bytes: [u8; 16] = raw
        .try_into()
        .map_err(|_| format!("interval must be 16 bytes, got {}", raw.len()))?;
    let (micros, rest) = bytes.split_at(8);
    let (days, months) = rest.split_at(4);
    let micros = i64::from_be_bytes(micros.try_into()?);
    let days = i64::from(i32::from_be_bytes(days.try_into()?));
    let months = i64::from(i32::from_be_bytes(months.try_into()?));

    let mut parts = Vec::new();
    let (years, mons) = (months / 12, months % 12);
    if years != 0 {
        parts.push(plural(years, "year"));
    }
    if mons != 0 {
        parts.push(plural(mons, "mon"));
    }
    if days != 0 {
        parts.push(plural(days, "day"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let fraction = total % 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_bytes(ndigits: i16, weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_i16(ndigits);
        buf.put_i16(weight);
        buf.put_u16(sign);
        buf.put_u16(dscale);
        for d in digits {
            buf.put_i16(*d);
        }
        buf.to_vec()
    }

    #[test]
    fn numeric_decodes_server_layout() {
        // 12345.678 = [1][2345].[6780]
        let raw = numeric_bytes(3, 1, NUMERIC_POS, 3, &[1, 2345, 6780]);
        assert_eq!(decode_numeric(&raw).unwrap(), "12345.678");

        // -0.0012 = weight -1, one group 12, dscale 4
        let raw = numeric_bytes(1, -1, NUMERIC_NEG, 4, &[12]);
        assert_eq!(decode_numeric(&raw).unwrap(), "-0.0012");

        let raw = numeric_bytes(0, 0, NUMERIC_POS, 2, &[]);
        assert_eq!(decode_numeric(&raw).unwrap(), "0.00");

        let raw = numeric_bytes(1, 1, NUMERIC_POS, 0, &[1]);
        assert_eq!(decode_numeric(&raw).unwrap(), "10000");

        let raw = numeric_bytes(0, 0, NUMERIC_NAN, 0, &[]);
        assert_eq!(decode_numeric(&raw).unwrap(), "NaN");
    }

    #[test]
    fn numeric_encoding_matches_server_layout() {
        let mut buf = BytesMut::new();
        encode_numeric("12345.678", &mut buf).unwrap();
        assert_eq!(
            buf.to_vec(),
            numeric_bytes(3, 1, NUMERIC_POS, 3, &[1, 2345, 6780])
        );

        let mut buf = BytesMut::new();
        encode_numeric("-0.0012", &mut buf).unwrap();
        assert_eq!(buf.to_vec(), numeric_bytes(1, -1, NUMERIC_NEG, 4, &[12]));
        assert_eq!(decode_numeric(&buf).unwrap(), "-0.0012");

        let mut buf = BytesMut::new();
        encode_numeric("0", &mut buf).unwrap();
        assert_eq!(buf.to_vec(), numeric_bytes(0, 0, NUMERIC_POS, 0, &[]));

        let mut buf = BytesMut::new();
        assert!(encode_numeric("12a", &mut buf).is_err());
        assert!(encode_numeric(".", &mut buf).is_err());
    }

    #[test]
    fn uuid_text_form() {
        let raw: Vec<u8> = (0u8..16).collect();
        let text = decode_uuid(&raw).unwrap();
        assert_eq!(text, "00010203-0405-0607-0809-0a0b0c0d0e0f");

        let mut buf = BytesMut::new();
        encode_uuid("{00010203-0405-0607-0809-0A0B0C0D0E0F}", &mut buf).unwrap();
        assert_eq!(buf.to_vec(), raw);
        assert!(encode_uuid("not-a-uuid", &mut BytesMut::new()).is_err());
    }

    #[test]
    fn interval_text_form() {
        let mut buf = BytesMut::new();
        buf.put_i64(4 * 3_600_000_000 + 5 * 60_000_000 + 6_500_000);
        buf.put_i32(3);
        buf.put_i32(14);
        assert_eq!(
            decode_interval(&buf).unwrap(),
            "1 year 2 mons 3 days 04:05:06.5"
        );

        let mut buf = BytesMut::new();
        buf.put_i64(0);
        buf.put_i32(-1);
        buf.put_i32(0);
        assert_eq!(decode_interval(&buf).unwrap(), "-1 days");

        let zero = [0u8; 16];
        assert_eq!(decode_interval(&zero).unwrap(), "00:00:00");
    }
}
