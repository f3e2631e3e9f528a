//! Decoding of the value encodings used by the certificate template cache.

use byteorder::{ByteOrder, LittleEndian};

use crate::err::{DecodeError, DecodeResult};
use crate::reg_parser::RegistryValue;
use crate::utils::{decode_utf16_units, decode_utf16le_trimmed, encode_utf16le, utf16le_units};

/// Number of 100ns FILETIME ticks in a second.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Coarsest first. Months are 30 days and years are 365 days.
const DURATION_UNITS: [(u64, &str); 6] = [
    (31_536_000, "year"),
    (2_592_000, "month"),
    (604_800, "week"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
];

/// Render a FILETIME interval (`ValidityPeriod`, `RenewalOverlap`) as a human duration,
/// e.g. `"1 year"`, `"6 weeks"`.
///
/// The value is an 8 byte little-endian signed count of 100ns ticks, negative by
/// convention. The coarsest unit that divides the interval evenly is used; intervals
/// that no unit divides fall back to whole hours.
pub fn filetime_interval_to_duration(bytes: &[u8]) -> DecodeResult<String> {
    if bytes.len() != 8 {
        return Err(DecodeError::InvalidFiletimeLength { len: bytes.len() });
    }

    let ticks = LittleEndian::read_i64(bytes).unsigned_abs();
    let seconds = ticks / TICKS_PER_SECOND;

    if seconds != 0 {
        for (unit_seconds, unit) in DURATION_UNITS {
            if seconds % unit_seconds == 0 {
                return Ok(pluralize(seconds / unit_seconds, unit));
            }
        }
    }

    Ok(pluralize(seconds / 3_600, "hour"))
}

fn pluralize(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Split a REG_MULTI_SZ payload into its strings.
///
/// Up to two trailing NUL code units (the last string's terminator and the list
/// terminator) are removed before splitting.
pub fn decode_multistring(bytes: &[u8]) -> DecodeResult<Vec<String>> {
    let units = utf16le_units(bytes)?;

    let mut end = units.len();
    for _ in 0..2 {
        if end > 0 && units[end - 1] == 0 {
            end -= 1;
        }
    }

    let units = &units[..end];
    if units.is_empty() {
        return Ok(vec![]);
    }

    units.split(|&c| c == 0).map(decode_utf16_units).collect()
}

/// Encode `strings` as a REG_MULTI_SZ payload.
///
/// `[""]` and `[]` share the payload `00 00 00 00`, which decodes to `[]`. Every
/// other sequence decodes back to itself.
pub fn encode_multistring<S: AsRef<str>>(strings: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        out.extend(encode_utf16le(s.as_ref()));
        out.extend_from_slice(&[0, 0]);
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Decode a single UTF-16LE string, dropping all trailing NULs.
pub fn decode_utf16_text(bytes: &[u8]) -> DecodeResult<String> {
    decode_utf16le_trimmed(bytes)
}

/// Known extended key usage / application policy OIDs.
static OID_NAMES: &[(&str, &str)] = &[
    ("1.3.6.1.4.1.311.76.6.1", "Windows Update"),
    ("1.3.6.1.4.1.311.10.3.11", "Key Recovery"),
    ("1.3.6.1.4.1.311.10.3.25", "Windows Third Party Application Component"),
    ("1.3.6.1.4.1.311.21.6", "Key Recovery Agent"),
    ("1.3.6.1.4.1.311.10.3.6", "Windows System Component Verification"),
    ("1.3.6.1.4.1.311.61.4.1", "Early Launch Antimalware Driver"),
    ("1.3.6.1.4.1.311.10.3.23", "Windows TCB Component"),
    ("1.3.6.1.4.1.311.61.1.1", "Kernel Mode Code Signing"),
    ("1.3.6.1.4.1.311.10.3.26", "Windows Software Extension Verification"),
    ("2.23.133.8.3", "Attestation Identity Key Certificate"),
    ("1.3.6.1.4.1.311.76.3.1", "Windows Store"),
    ("1.3.6.1.4.1.311.10.6.1", "Key Pack Licenses"),
    ("1.3.6.1.4.1.311.20.2.2", "Smart Card Logon"),
    ("1.3.6.1.5.2.3.5", "KDC Authentication"),
    ("1.3.6.1.5.5.7.3.7", "IP security use"),
    ("1.3.6.1.4.1.311.10.3.8", "Embedded Windows System Component Verification"),
    ("1.3.6.1.4.1.311.10.3.20", "Windows Kits Component"),
    ("1.3.6.1.5.5.7.3.6", "IP security tunnel termination"),
    ("1.3.6.1.4.1.311.10.3.5", "Windows Hardware Driver Verification"),
    ("1.3.6.1.5.5.8.2.2", "IP security IKE intermediate"),
    ("1.3.6.1.4.1.311.10.3.39", "Windows Hardware Driver Extended Verification"),
    ("1.3.6.1.4.1.311.10.6.2", "License Server Verification"),
    ("1.3.6.1.4.1.311.10.3.5.1", "Windows Hardware Driver Attested Verification"),
    ("1.3.6.1.4.1.311.76.5.1", "Dynamic Code Generator"),
    ("1.3.6.1.5.5.7.3.8", "Time Stamping"),
    ("1.3.6.1.4.1.311.10.3.4.1", "File Recovery"),
    ("1.3.6.1.4.1.311.2.6.1", "SpcRelaxedPEMarkerCheck"),
    ("2.23.133.8.1", "Endorsement Key Certificate"),
    ("1.3.6.1.4.1.311.2.6.2", "SpcEncryptedDigestRetryCount"),
    ("1.3.6.1.4.1.311.10.3.4", "Encrypting File System"),
    ("1.3.6.1.5.5.7.3.1", "Server Authentication"),
    ("1.3.6.1.4.1.311.61.5.1", "HAL Extension"),
    ("1.3.6.1.5.5.7.3.4", "Secure Email"),
    ("1.3.6.1.5.5.7.3.5", "IP security end system"),
    ("1.3.6.1.4.1.311.10.3.9", "Root List Signer"),
    ("1.3.6.1.4.1.311.10.3.30", "Disallowed List"),
    ("1.3.6.1.4.1.311.10.3.19", "Revoked List Signer"),
    ("1.3.6.1.4.1.311.10.3.21", "Windows RT Verification"),
    ("1.3.6.1.4.1.311.10.3.10", "Qualified Subordination"),
    ("1.3.6.1.4.1.311.10.3.12", "Document Signing"),
    ("1.3.6.1.4.1.311.10.3.24", "Protected Process Verification"),
    ("1.3.6.1.4.1.311.80.1", "Document Encryption"),
    ("1.3.6.1.4.1.311.10.3.22", "Protected Process Light Verification"),
    ("1.3.6.1.4.1.311.21.19", "Directory Service Email Replication"),
    ("1.3.6.1.4.1.311.21.5", "Private Key Archival"),
    ("1.3.6.1.4.1.311.10.5.1", "Digital Rights"),
    ("1.3.6.1.4.1.311.10.3.27", "Preview Build Signing"),
    ("1.3.6.1.4.1.311.20.2.1", "Certificate Request Agent"),
    ("2.23.133.8.2", "Platform Certificate"),
    ("1.3.6.1.4.1.311.20.1", "CTL Usage"),
    ("1.3.6.1.5.5.7.3.9", "OCSP Signing"),
    ("1.3.6.1.5.5.7.3.3", "Code Signing"),
    ("1.3.6.1.4.1.311.10.3.1", "Microsoft Trust List Signing"),
    ("1.3.6.1.4.1.311.10.3.2", "Microsoft Time Stamping"),
    ("1.3.6.1.4.1.311.76.8.1", "Microsoft Publisher"),
    ("1.3.6.1.5.5.7.3.2", "Client Authentication"),
    ("1.3.6.1.5.2.3.4", "PKINIT Client Authentication"),
    ("1.3.6.1.4.1.311.10.3.13", "Lifetime Signing"),
    ("2.5.29.37.0", "Any Purpose"),
    ("1.3.6.1.4.1.311.64.1.1", "Server Trust"),
    ("1.3.6.1.4.1.311.10.3.7", "OEM Windows System Component Verification"),
];

/// Friendly name of a well-known OID.
pub fn oid_name(oid: &str) -> Option<&'static str> {
    OID_NAMES
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|(_, name)| *name)
}

/// Replace known OIDs with their names. Unknown entries pass through unchanged.
pub fn resolve_oid_names<S: AsRef<str>>(oids: &[S]) -> Vec<String> {
    oids.iter()
        .map(|oid| {
            let oid = oid.as_ref();
            oid_name(oid).map_or_else(|| oid.to_string(), str::to_string)
        })
        .collect()
}

/// A REG_DWORD value.
pub fn value_u32(value: &RegistryValue) -> DecodeResult<u32> {
    match value {
        RegistryValue::Dword(v) => Ok(*v),
        other => Err(unexpected("REG_DWORD", other)),
    }
}

/// An integer stored either as a REG_DWORD or as decimal text.
pub fn value_integer(value: &RegistryValue) -> DecodeResult<u32> {
    match value {
        RegistryValue::Dword(v) => Ok(*v),
        RegistryValue::String(s) | RegistryValue::ExpandString(s) => {
            let text = s.trim();
            text.parse().map_err(|_| DecodeError::InvalidInteger {
                text: text.to_string(),
            })
        }
        other => Err(unexpected("integer", other)),
    }
}

/// The raw payload of a binary or multi-string value.
pub fn value_bytes(value: &RegistryValue) -> DecodeResult<&[u8]> {
    value
        .as_bytes()
        .ok_or_else(|| unexpected("REG_BINARY", value))
}

/// A single string, either stored as text or as a UTF-16LE payload.
pub fn value_text(value: &RegistryValue) -> DecodeResult<String> {
    match value {
        RegistryValue::String(s) | RegistryValue::ExpandString(s) => Ok(s.clone()),
        RegistryValue::MultiString(data) | RegistryValue::Binary { data, .. } => {
            decode_utf16_text(data)
        }
        other => Err(unexpected("REG_SZ", other)),
    }
}

/// A list of strings. A plain text value is a one element list.
pub fn value_strings(value: &RegistryValue) -> DecodeResult<Vec<String>> {
    match value {
        RegistryValue::MultiString(data) | RegistryValue::Binary { data, .. } => {
            decode_multistring(data)
        }
        RegistryValue::String(s) | RegistryValue::ExpandString(s) if s.is_empty() => Ok(vec![]),
        RegistryValue::String(s) | RegistryValue::ExpandString(s) => Ok(vec![s.clone()]),
        other => Err(unexpected("REG_MULTI_SZ", other)),
    }
}

fn unexpected(expected: &'static str, found: &RegistryValue) -> DecodeError {
    DecodeError::UnexpectedValueType {
        expected,
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interval(seconds: i64) -> [u8; 8] {
        (-seconds * TICKS_PER_SECOND as i64).to_le_bytes()
    }

    #[test]
    fn test_filetime_picks_coarsest_even_unit() {
        assert_eq!(filetime_interval_to_duration(&interval(31_536_000)).unwrap(), "1 year");
        assert_eq!(filetime_interval_to_duration(&interval(2 * 31_536_000)).unwrap(), "2 years");
        assert_eq!(filetime_interval_to_duration(&interval(6 * 604_800)).unwrap(), "6 weeks");
        assert_eq!(filetime_interval_to_duration(&interval(2_592_000)).unwrap(), "1 month");
        assert_eq!(filetime_interval_to_duration(&interval(3 * 86_400)).unwrap(), "3 days");
        assert_eq!(filetime_interval_to_duration(&interval(3_600)).unwrap(), "1 hour");
        assert_eq!(filetime_interval_to_duration(&interval(90 * 60)).unwrap(), "90 minutes");
    }

    #[test]
    fn test_filetime_real_export_bytes() {
        // ValidityPeriod of the built-in User template.
        let bytes = [0x00, 0x40, 0x39, 0x87, 0x2e, 0xe1, 0xfe, 0xff];
        assert_eq!(filetime_interval_to_duration(&bytes).unwrap(), "1 year");

        // RenewalOverlap of the built-in User template.
        let bytes = [0x00, 0x80, 0xa6, 0x0a, 0xff, 0xde, 0xff, 0xff];
        assert_eq!(filetime_interval_to_duration(&bytes).unwrap(), "6 weeks");
    }

    #[test]
    fn test_filetime_positive_and_uneven_intervals() {
        let positive = (3_600_i64 * TICKS_PER_SECOND as i64).to_le_bytes();
        assert_eq!(filetime_interval_to_duration(&positive).unwrap(), "1 hour");

        assert_eq!(filetime_interval_to_duration(&interval(7_201)).unwrap(), "2 hours");
        assert_eq!(filetime_interval_to_duration(&interval(59)).unwrap(), "0 hours");
        assert_eq!(filetime_interval_to_duration(&[0; 8]).unwrap(), "0 hours");
    }

    #[test]
    fn test_filetime_rejects_wrong_length() {
        assert_eq!(
            filetime_interval_to_duration(&[0; 4]),
            Err(DecodeError::InvalidFiletimeLength { len: 4 })
        );
    }

    #[test]
    fn test_multistring_inverse_of_encoder() {
        for strings in [
            vec!["Server Authentication"],
            vec!["1.3.6.1.5.5.7.3.2", "1.3.6.1.4.1.311.20.2.2", "1.3.6.1.5.5.7.3.2"],
            vec!["Zertifikatsanforderungs-Agent", "Größe"],
        ] {
            assert_eq!(decode_multistring(&encode_multistring(&strings)).unwrap(), strings);
        }
    }

    #[test]
    fn test_single_empty_string_decodes_as_empty_list() {
        let empty: [&str; 1] = [""];
        assert_eq!(encode_multistring(&empty), encode_multistring::<&str>(&[]));
        assert_eq!(
            decode_multistring(&encode_multistring(&empty)).unwrap(),
            Vec::<String>::new()
        );
        assert_eq!(
            decode_multistring(&encode_multistring(&["", "A"])).unwrap(),
            vec!["", "A"]
        );
        assert_eq!(
            decode_multistring(&encode_multistring(&["A", ""])).unwrap(),
            vec!["A", ""]
        );
    }

    #[test]
    fn test_multistring_edge_cases() {
        assert_eq!(decode_multistring(&[]).unwrap(), Vec::<String>::new());
        assert_eq!(decode_multistring(&[0, 0, 0, 0]).unwrap(), Vec::<String>::new());
        // Missing list terminator.
        assert_eq!(decode_multistring(b"A\x00\x00\x00").unwrap(), vec!["A"]);
        assert_eq!(
            decode_multistring(b"A\x00\x00"),
            Err(DecodeError::OddUtf16Length { len: 3 })
        );
    }

    #[test]
    fn test_oid_names_fall_back_to_identity() {
        let resolved = resolve_oid_names(&[
            "1.3.6.1.5.5.7.3.1",
            "1.2.3.4.5",
            "2.5.29.37.0",
            "1.3.6.1.5.5.7.3.1",
        ]);
        assert_eq!(
            resolved,
            vec!["Server Authentication", "1.2.3.4.5", "Any Purpose", "Server Authentication"]
        );
        assert_eq!(oid_name("1.3.6.1.5.2.3.4"), Some("PKINIT Client Authentication"));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(value_u32(&RegistryValue::Dword(7)).unwrap(), 7);
        assert_eq!(
            value_u32(&RegistryValue::String("7".into())),
            Err(DecodeError::UnexpectedValueType {
                expected: "REG_DWORD",
                found: "REG_SZ"
            })
        );

        assert_eq!(value_integer(&RegistryValue::String(" 2 ".into())).unwrap(), 2);
        assert_eq!(
            value_integer(&RegistryValue::String("two".into())),
            Err(DecodeError::InvalidInteger { text: "two".into() })
        );

        let oid = RegistryValue::MultiString(encode_multistring(&["1.2.3"]));
        assert_eq!(value_text(&oid).unwrap(), "1.2.3");
        assert_eq!(value_strings(&oid).unwrap(), vec!["1.2.3"]);
        assert_eq!(value_strings(&RegistryValue::String(String::new())).unwrap(), Vec::<String>::new());

        assert!(value_bytes(&RegistryValue::Qword(1)).is_err());
        assert_eq!(value_bytes(&RegistryValue::binary(vec![1, 2])).unwrap(), &[1, 2]);
    }
}
