use byteorder::{ByteOrder, LittleEndian};

use crate::err::{DecodeError, DecodeResult};

/// Split a UTF-16LE byte slice into code units.
pub(crate) fn utf16le_units(bytes: &[u8]) -> DecodeResult<Vec<u16>> {
    if !bytes.len().is_multiple_of(2) {
        return Err(DecodeError::OddUtf16Length { len: bytes.len() });
    }

    let mut units = vec![0_u16; bytes.len() / 2];
    LittleEndian::read_u16_into(bytes, &mut units);
    Ok(units)
}

/// Decode UTF-16 code units, keeping embedded NULs.
pub(crate) fn decode_utf16_units(units: &[u16]) -> DecodeResult<String> {
    // Fast path: pure ASCII converts without surrogate handling.
    if units.iter().all(|&c| c <= 0x7F) {
        return Ok(units.iter().map(|&c| char::from(c as u8)).collect());
    }

    String::from_utf16(units).map_err(|_| DecodeError::InvalidUtf16)
}

/// Decode a UTF-16LE byte slice, dropping every trailing NUL code unit.
pub(crate) fn decode_utf16le_trimmed(bytes: &[u8]) -> DecodeResult<String> {
    let units = utf16le_units(bytes)?;
    let end = units.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
    decode_utf16_units(&units[..end])
}

/// Encode `s` as UTF-16LE without a terminator.
pub(crate) fn encode_utf16le(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut out = vec![0_u8; units.len() * 2];
    LittleEndian::write_u16_into(&units, &mut out);
    out
}
