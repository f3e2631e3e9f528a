//! Parser for the textual `.reg` export format produced by `regedit` / `reg export`.
//!
//! The grammar is line based:
//!
//! ```text
//! Windows Registry Editor Version 5.00
//!
//! ; comment
//! [HKEY_USERS\.DEFAULT\Software\Microsoft\Cryptography\CertificateTemplateCache\User]
//! "DisplayName"="User"
//! "msPKI-RA-Signature"=dword:00000000
//! "ExtKeyUsageSyntax"=hex(7):31,00,2e,00,33,00,2e,00,36,00,2e,00,31,00,2e,00,\
//!   35,00,2e,00,35,00,2e,00,37,00,2e,00,33,00,2e,00,34,00,00,00,00,00
//! @="default value"
//! ```
//!
//! Hex payloads may be split across physical lines with a trailing backslash.

use std::fmt;
use std::fs;
use std::path::Path;

use encoding::{DecoderTrap, Encoding, EncodingRef};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::{debug, trace};

use crate::err::{ParseError, ParseResult, RegCertError, Result};
use crate::utils::{decode_utf16_units, decode_utf16le_trimmed, encode_utf16le};

pub const REGEDIT5_HEADER: &str = "Windows Registry Editor Version 5.00";
pub const REGEDIT4_HEADER: &str = "REGEDIT4";

pub const REG_NONE: u32 = 0x0;
pub const REG_SZ: u32 = 0x1;
pub const REG_EXPAND_SZ: u32 = 0x2;
pub const REG_BINARY: u32 = 0x3;
pub const REG_DWORD: u32 = 0x4;
pub const REG_DWORD_BIG_ENDIAN: u32 = 0x5;
pub const REG_LINK: u32 = 0x6;
pub const REG_MULTI_SZ: u32 = 0x7;
pub const REG_RESOURCE_LIST: u32 = 0x8;
pub const REG_FULL_RESOURCE_DESCRIPTOR: u32 = 0x9;
pub const REG_RESOURCE_REQUIREMENTS_LIST: u32 = 0xA;
pub const REG_QWORD: u32 = 0xB;

/// Hex lines are wrapped once they grow past this many columns, like `regedit` does.
const HEX_LINE_WIDTH: usize = 76;

/// A typed registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    String(String),
    ExpandString(String),
    /// Raw UTF-16LE payload, NUL delimited. See [`crate::decode::decode_multistring`].
    MultiString(Vec<u8>),
    /// Raw bytes together with the registry type they were exported with.
    Binary { kind: u32, data: Vec<u8> },
    Dword(u32),
    Qword(u64),
}

impl RegistryValue {
    /// A plain `hex:` (REG_BINARY) value.
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        RegistryValue::Binary {
            kind: REG_BINARY,
            data: data.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RegistryValue::String(_) => "REG_SZ",
            RegistryValue::ExpandString(_) => "REG_EXPAND_SZ",
            RegistryValue::MultiString(_) => "REG_MULTI_SZ",
            RegistryValue::Binary { kind: REG_NONE, .. } => "REG_NONE",
            RegistryValue::Binary { .. } => "REG_BINARY",
            RegistryValue::Dword(_) => "REG_DWORD",
            RegistryValue::Qword(_) => "REG_QWORD",
        }
    }

    /// The raw payload of byte-carrying values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RegistryValue::MultiString(data) | RegistryValue::Binary { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Values of a single key, in export order. The unnamed default value (`@`) uses `""`.
pub type RegistryValues = IndexMap<String, RegistryValue>;

/// Ordered mapping of key path to its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryTree {
    keys: IndexMap<String, RegistryValues>,
}

impl RegistryTree {
    /// Parse already decoded export text.
    pub fn parse(text: &str) -> ParseResult<RegistryTree> {
        let mut tree = RegistryTree::default();
        let mut current: Option<String> = None;

        for (line_no, line) in logical_lines(text) {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let key = parse_key_line(line_no, line)?;
                trace!("line {}: opening key `{}`", line_no, key);
                match tree.keys.entry(key.clone()) {
                    Entry::Occupied(_) => {
                        debug!("line {}: key `{}` repeats, merging values", line_no, key)
                    }
                    Entry::Vacant(v) => {
                        v.insert(RegistryValues::new());
                    }
                }
                current = Some(key);
                continue;
            }

            if line == REGEDIT5_HEADER || line == REGEDIT4_HEADER {
                continue;
            }

            if line.starts_with('"') || line.starts_with('@') {
                let Some(key) = current.as_ref() else {
                    return Err(ParseError::ValueOutsideKey {
                        line: line_no,
                        text: line.to_owned(),
                    });
                };
                let (name, value) = parse_value_line(line_no, line)?;
                if let Some(values) = tree.keys.get_mut(key) {
                    values.insert(name, value);
                }
                continue;
            }

            return Err(ParseError::malformed(line_no, "line", line));
        }

        Ok(tree)
    }

    pub fn get(&self, path: &str) -> Option<&RegistryValues> {
        self.keys.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryValues)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys whose path starts with `prefix`, in export order.
    pub fn keys_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a RegistryValues)> + 'a {
        self.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn insert_key(&mut self, path: impl Into<String>, values: RegistryValues) {
        self.keys.entry(path.into()).or_default().extend(values);
    }

    /// Serialize back to `regedit` 5.00 export text.
    pub fn to_reg_string(&self) -> String {
        let mut out = String::new();
        out.push_str(REGEDIT5_HEADER);
        out.push_str("\r\n\r\n");

        for (path, values) in &self.keys {
            out.push('[');
            out.push_str(path);
            out.push_str("]\r\n");

            for (name, value) in values {
                if name.is_empty() {
                    out.push('@');
                } else {
                    write_quoted(&mut out, name);
                }
                out.push('=');
                write_value(&mut out, value);
                out.push_str("\r\n");
            }

            out.push_str("\r\n");
        }

        out
    }
}

#[derive(Clone)]
pub struct ParserSettings {
    /// Codec used for BOM-less exports which are not valid UTF-8 (`REGEDIT4` files).
    ansi_codec: EncodingRef,
}

impl fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("ansi_codec", &self.ansi_codec.name())
            .finish()
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            ansi_codec: encoding::all::WINDOWS_1252,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn ansi_codec(mut self, codec: EncodingRef) -> Self {
        self.ansi_codec = codec;
        self
    }
}

/// Parses a raw export buffer, taking care of the text encoding first.
pub struct RegistryExportParser {
    data: Vec<u8>,
    config: ParserSettings,
}

impl RegistryExportParser {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| RegCertError::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;

        Ok(RegistryExportParser::from_buffer(data))
    }

    pub fn from_buffer(data: Vec<u8>) -> Self {
        RegistryExportParser {
            data,
            config: ParserSettings::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    /// Detect the byte order mark (if any) and decode the export to text.
    pub fn decode_text(&self) -> ParseResult<String> {
        let data = self.data.as_slice();

        if let Some(rest) = data.strip_prefix(&[0xFF, 0xFE]) {
            trace!("detected UTF-16LE byte order mark");
            return decode_utf16_text(rest, u16::from_le_bytes, "UTF-16LE");
        }

        if let Some(rest) = data.strip_prefix(&[0xFE, 0xFF]) {
            trace!("detected UTF-16BE byte order mark");
            return decode_utf16_text(rest, u16::from_be_bytes, "UTF-16BE");
        }

        if let Some(rest) = data.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
            trace!("detected UTF-8 byte order mark");
            return String::from_utf8(rest.to_vec())
                .map_err(|_| ParseError::InvalidEncoding { encoding: "UTF-8" });
        }

        match std::str::from_utf8(data) {
            Ok(text) => Ok(text.to_owned()),
            Err(_) => {
                debug!(
                    "export is not UTF-8, falling back to `{}`",
                    self.config.ansi_codec.name()
                );
                self.config
                    .ansi_codec
                    .decode(data, DecoderTrap::Strict)
                    .map_err(|_| ParseError::InvalidEncoding { encoding: "ANSI" })
            }
        }
    }

    pub fn parse(&self) -> ParseResult<RegistryTree> {
        let text = self.decode_text()?;
        RegistryTree::parse(&text)
    }

    /// Read and parse the export at `path`.
    pub fn parse_file(
        path: impl AsRef<Path>,
        configuration: ParserSettings,
    ) -> Result<RegistryTree> {
        let path = path.as_ref();
        RegistryExportParser::from_path(path)?
            .with_configuration(configuration)
            .parse()
            .map_err(|source| RegCertError::Parse {
                source,
                path: path.to_path_buf(),
            })
    }
}

fn decode_utf16_text(
    bytes: &[u8],
    read_unit: fn([u8; 2]) -> u16,
    encoding: &'static str,
) -> ParseResult<String> {
    if !bytes.len().is_multiple_of(2) {
        return Err(ParseError::InvalidEncoding { encoding });
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| read_unit([c[0], c[1]]))
        .collect();

    decode_utf16_units(&units).map_err(|_| ParseError::InvalidEncoding { encoding })
}

/// Join continued physical lines. Yields the 1-based line number where each logical line starts.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, physical) in text.lines().enumerate() {
        let (start, mut logical) = match pending.take() {
            Some((start, mut acc)) => {
                acc.push_str(physical.trim_start());
                (start, acc)
            }
            None => (idx + 1, physical.trim_start_matches('\u{feff}').to_owned()),
        };

        let head = logical.trim_start();
        let is_value_line = !(head.starts_with('[') || head.starts_with(';'));
        let trimmed_len = logical.trim_end().len();

        if is_value_line && logical[..trimmed_len].ends_with('\\') {
            logical.truncate(trimmed_len - 1);
            pending = Some((start, logical));
        } else {
            out.push((start, logical));
        }
    }

    if let Some(last) = pending {
        out.push(last);
    }

    out
}

fn parse_key_line(line_no: usize, line: &str) -> ParseResult<String> {
    let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) else {
        return Err(ParseError::UnterminatedKey {
            line: line_no,
            text: line.to_owned(),
        });
    };

    if inner.is_empty() {
        return Err(ParseError::malformed(line_no, "key path", line));
    }

    if inner.starts_with('-') {
        return Err(ParseError::malformed(line_no, "key (deletions are not supported)", line));
    }

    Ok(inner.to_owned())
}

fn parse_value_line(line_no: usize, line: &str) -> ParseResult<(String, RegistryValue)> {
    let (name, rest) = if let Some(rest) = line.strip_prefix('@') {
        (String::new(), rest)
    } else {
        parse_quoted(&line[1..]).ok_or_else(|| ParseError::malformed(line_no, "value name", line))?
    };

    let Some(payload) = rest.trim_start().strip_prefix('=') else {
        return Err(ParseError::malformed(line_no, "value assignment", line));
    };

    let value = parse_payload(line_no, payload.trim())?;
    Ok((name, value))
}

/// `s` starts right after an opening quote. Returns the unescaped text and the rest of the line.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(escaped);
            }
            '"' => return Some((out, &s[idx + 1..])),
            _ => out.push(c),
        }
    }

    None
}

fn parse_payload(line_no: usize, payload: &str) -> ParseResult<RegistryValue> {
    if let Some(rest) = payload.strip_prefix('"') {
        return match parse_quoted(rest) {
            Some((text, tail)) if tail.trim().is_empty() => Ok(RegistryValue::String(text)),
            _ => Err(ParseError::malformed(line_no, "string value", payload)),
        };
    }

    if payload == "-" {
        return Err(ParseError::malformed(
            line_no,
            "value (deletions are not supported)",
            payload,
        ));
    }

    if let Some(digits) = payload.strip_prefix("dword:") {
        return parse_hex_integer(digits, 8)
            .map(|v| RegistryValue::Dword(v as u32))
            .ok_or_else(|| ParseError::malformed(line_no, "dword value", payload));
    }

    if let Some(digits) = payload.strip_prefix("qword:") {
        return parse_hex_integer(digits, 16)
            .map(RegistryValue::Qword)
            .ok_or_else(|| ParseError::malformed(line_no, "qword value", payload));
    }

    if let Some(bytes) = payload.strip_prefix("hex:") {
        let data = parse_hex_bytes(line_no, bytes)?;
        return Ok(RegistryValue::binary(data));
    }

    if let Some(rest) = payload.strip_prefix("hex(") {
        let Some((tag, bytes)) = rest.split_once("):") else {
            return Err(ParseError::malformed(line_no, "hex type tag", payload));
        };
        let kind = u32::from_str_radix(tag, 16).map_err(|_| ParseError::UnknownTypeTag {
            line: line_no,
            tag: tag.to_owned(),
        })?;
        let data = parse_hex_bytes(line_no, bytes)?;
        return typed_hex_value(line_no, kind, tag, data);
    }

    match payload.split_once(':') {
        Some((tag, _)) => Err(ParseError::UnknownTypeTag {
            line: line_no,
            tag: tag.to_owned(),
        }),
        None => Err(ParseError::malformed(line_no, "value", payload)),
    }
}

fn typed_hex_value(
    line_no: usize,
    kind: u32,
    tag: &str,
    data: Vec<u8>,
) -> ParseResult<RegistryValue> {
    match kind {
        REG_SZ | REG_EXPAND_SZ => {
            let text = decode_utf16le_trimmed(&data)
                .map_err(|_| ParseError::malformed(line_no, "UTF-16 string payload", tag))?;
            // Template cache exports tag expandable text `hex(1)` and plain text `hex(2)`.
            Ok(if kind == REG_EXPAND_SZ {
                RegistryValue::String(text)
            } else {
                RegistryValue::ExpandString(text)
            })
        }
        REG_DWORD => {
            let bytes: [u8; 4] = data
                .as_slice()
                .try_into()
                .map_err(|_| ParseError::malformed(line_no, "REG_DWORD payload", tag))?;
            Ok(RegistryValue::Dword(u32::from_le_bytes(bytes)))
        }
        REG_QWORD => {
            let bytes: [u8; 8] = data
                .as_slice()
                .try_into()
                .map_err(|_| ParseError::malformed(line_no, "REG_QWORD payload", tag))?;
            Ok(RegistryValue::Qword(u64::from_le_bytes(bytes)))
        }
        REG_MULTI_SZ => Ok(RegistryValue::MultiString(data)),
        REG_NONE
        | REG_BINARY
        | REG_DWORD_BIG_ENDIAN
        | REG_LINK
        | REG_RESOURCE_LIST
        | REG_FULL_RESOURCE_DESCRIPTOR
        | REG_RESOURCE_REQUIREMENTS_LIST => Ok(RegistryValue::Binary { kind, data }),
        _ => Err(ParseError::UnknownTypeTag {
            line: line_no,
            tag: tag.to_owned(),
        }),
    }
}

fn parse_hex_integer(digits: &str, max_digits: usize) -> Option<u64> {
    let digits = digits.trim();
    if digits.is_empty() || digits.len() > max_digits {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn parse_hex_bytes(line_no: usize, s: &str) -> ParseResult<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| {
            if b.len() > 2 {
                return Err(ParseError::malformed(line_no, "hex byte", b));
            }
            u8::from_str_radix(b, 16).map_err(|_| ParseError::malformed(line_no, "hex byte", b))
        })
        .collect()
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn write_value(out: &mut String, value: &RegistryValue) {
    match value {
        RegistryValue::String(s) if !s.contains(['\r', '\n']) => write_quoted(out, s),
        RegistryValue::String(s) => write_hex(out, "hex(2):", &with_nul(encode_utf16le(s))),
        RegistryValue::ExpandString(s) => {
            write_hex(out, "hex(1):", &with_nul(encode_utf16le(s)))
        }
        RegistryValue::MultiString(data) => write_hex(out, "hex(7):", data),
        RegistryValue::Binary {
            kind: REG_BINARY,
            data,
        } => write_hex(out, "hex:", data),
        RegistryValue::Binary { kind, data } => write_hex(out, &format!("hex({:x}):", kind), data),
        RegistryValue::Dword(v) => out.push_str(&format!("dword:{:08x}", v)),
        RegistryValue::Qword(v) => write_hex(out, "hex(b):", &v.to_le_bytes()),
    }
}

fn with_nul(mut data: Vec<u8>) -> Vec<u8> {
    data.extend_from_slice(&[0, 0]);
    data
}

fn write_hex(out: &mut String, tag: &str, data: &[u8]) {
    let line_start = out.rfind('\n').map_or(0, |i| i + 1);
    let mut column = out.len() - line_start + tag.len();
    out.push_str(tag);

    for (i, b) in data.iter().enumerate() {
        out.push_str(&format!("{:02x}", b));
        column += 2;
        if i + 1 < data.len() {
            out.push(',');
            column += 1;
            if column >= HEX_LINE_WIDTH {
                out.push_str("\\\r\n  ");
                column = 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = r"HKEY_USERS\.DEFAULT\Software\Microsoft\Cryptography\CertificateTemplateCache\User";

    fn single_key(text: &str) -> RegistryValues {
        let tree = RegistryTree::parse(text).unwrap();
        tree.get(KEY).cloned().unwrap()
    }

    #[test]
    fn test_parses_every_value_encoding() {
        let text = format!(
            "{REGEDIT5_HEADER}\r\n\r\n[{KEY}]\r\n\
             \"DisplayName\"=\"User\"\r\n\
             \"Flags\"=dword:0000002a\r\n\
             \"Big\"=hex(b):01,00,00,00,00,00,00,00\r\n\
             \"Blob\"=hex:de,ad,be,ef\r\n\
             \"None\"=hex(0):01,02\r\n\
             \"Expand\"=hex(1):25,00,41,00,25,00,00,00\r\n\
             \"Sz\"=hex(2):41,00,42,00,00,00\r\n\
             \"Multi\"=hex(7):41,00,00,00,42,00,00,00,00,00\r\n\
             \"Dw\"=hex(4):10,00,00,00\r\n\
             @=\"default\"\r\n"
        );

        let values = single_key(&text);
        assert_eq!(values["DisplayName"], RegistryValue::String("User".into()));
        assert_eq!(values["Flags"], RegistryValue::Dword(42));
        assert_eq!(values["Big"], RegistryValue::Qword(1));
        assert_eq!(values["Blob"], RegistryValue::binary(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(
            values["None"],
            RegistryValue::Binary {
                kind: REG_NONE,
                data: vec![1, 2]
            }
        );
        assert_eq!(values["Sz"], RegistryValue::String("AB".into()));
        assert_eq!(values["Expand"], RegistryValue::ExpandString("%A%".into()));
        assert_eq!(
            values["Multi"],
            RegistryValue::MultiString(vec![0x41, 0, 0, 0, 0x42, 0, 0, 0, 0, 0])
        );
        assert_eq!(values["Dw"], RegistryValue::Dword(16));
        assert_eq!(values[""], RegistryValue::String("default".into()));
    }

    #[test]
    fn test_joins_continuation_lines() {
        let text = format!(
            "[{KEY}]\n\"Blob\"=hex:01,02,\\\n  03,04,\\   \n\t05\n\"After\"=dword:00000001\n"
        );
        let values = single_key(&text);
        assert_eq!(values["Blob"], RegistryValue::binary(vec![1, 2, 3, 4, 5]));
        assert_eq!(values["After"], RegistryValue::Dword(1));
    }

    #[test]
    fn test_string_escapes() {
        let text = format!("[{KEY}]\n\"Path \\\"q\\\"\"=\"C:\\\\Windows\\\\\"\n");
        let values = single_key(&text);
        assert_eq!(
            values["Path \"q\""],
            RegistryValue::String(r"C:\Windows\".into())
        );
    }

    #[test]
    fn test_repeated_keys_merge_and_last_write_wins() {
        let text = "[A]\n\"x\"=dword:00000001\n\"y\"=\"keep\"\n[B]\n[A]\n\"x\"=dword:00000002\n";
        let tree = RegistryTree::parse(text).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["A", "B"]);

        let a = tree.get("A").unwrap();
        assert_eq!(a["x"], RegistryValue::Dword(2));
        assert_eq!(a["y"], RegistryValue::String("keep".into()));
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let text = "REGEDIT4\n\n; exported by hand\n[A]\n  ; indented comment\n\"x\"=\"1\"\n";
        let tree = RegistryTree::parse(text).unwrap();
        assert_eq!(tree.get("A").unwrap().len(), 1);
    }

    #[test]
    fn test_indented_comment_ending_in_backslash_does_not_continue() {
        let text = "[A]\n  ; see C:\\\n\"x\"=\"1\"\n";
        let tree = RegistryTree::parse(text).unwrap();
        assert_eq!(tree.get("A").unwrap()["x"], RegistryValue::String("1".into()));
    }

    #[test]
    fn test_hex_string_tags() {
        let values = single_key(&format!(
            "[{KEY}]\n\"one\"=hex(1):41,00,00,00\n\"two\"=hex(2):41,00,00,00\n"
        ));
        assert_eq!(values["one"], RegistryValue::ExpandString("A".into()));
        assert_eq!(values["two"], RegistryValue::String("A".into()));

        let mut tree = RegistryTree::default();
        tree.insert_key("A", values);
        let text = tree.to_reg_string();
        assert!(text.contains("\"one\"=hex(1):41,00,00,00"));
        assert!(text.contains("\"two\"=\"A\""));
    }

    #[test]
    fn test_unterminated_key_reports_line() {
        let err = RegistryTree::parse("REGEDIT4\n\n[HKEY_USERS\\x\n").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedKey { line: 3, .. }));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_value_before_key_is_an_error() {
        let err = RegistryTree::parse("\"x\"=dword:00000001\n").unwrap_err();
        assert!(matches!(err, ParseError::ValueOutsideKey { line: 1, .. }));
    }

    #[test]
    fn test_unknown_type_tag_is_an_error() {
        let err = RegistryTree::parse("[A]\n\"x\"=hex(1f):00\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownTypeTag { line: 2, ref tag } if tag == "1f"));

        let err = RegistryTree::parse("[A]\n\"x\"=sz:abc\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownTypeTag { line: 2, ref tag } if tag == "sz"));
    }

    #[test]
    fn test_error_line_points_at_start_of_continued_value() {
        let err = RegistryTree::parse("[A]\n\"x\"=hex:01,\\\n  zz\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_wrong_width_dword_is_an_error() {
        let err = RegistryTree::parse("[A]\n\"x\"=hex(4):01,00\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }));
        assert!(RegistryTree::parse("[A]\n\"x\"=dword:123456789\n").is_err());
    }

    #[test]
    fn test_decodes_utf16le_with_bom() {
        let text = format!("{REGEDIT5_HEADER}\r\n\r\n[{KEY}]\r\n\"DisplayName\"=\"Benutzer\"\r\n");
        let mut data = vec![0xFF, 0xFE];
        data.extend(encode_utf16le(&text));

        let tree = RegistryExportParser::from_buffer(data).parse().unwrap();
        assert_eq!(tree, RegistryTree::parse(&text).unwrap());
    }

    #[test]
    fn test_decodes_utf16be_with_bom() {
        let text = "[A]\n\"x\"=\"y\"\n";
        let mut data = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            data.extend_from_slice(&unit.to_be_bytes());
        }

        let tree = RegistryExportParser::from_buffer(data).parse().unwrap();
        assert_eq!(tree.get("A").unwrap()["x"], RegistryValue::String("y".into()));
    }

    #[test]
    fn test_falls_back_to_ansi_codec() {
        // 0xFC is `ü` in windows-1252 and invalid as a lone UTF-8 byte.
        let data = b"REGEDIT4\r\n[A]\r\n\"x\"=\"\xFC\"\r\n".to_vec();
        let tree = RegistryExportParser::from_buffer(data).parse().unwrap();
        assert_eq!(tree.get("A").unwrap()["x"], RegistryValue::String("ü".into()));
    }

    #[test]
    fn test_odd_length_utf16_export_is_an_encoding_error() {
        let data = vec![0xFF, 0xFE, 0x5B];
        let err = RegistryExportParser::from_buffer(data).parse().unwrap_err();
        assert!(matches!(err, ParseError::InvalidEncoding { encoding: "UTF-16LE" }));
    }

    #[test]
    fn test_parse_file_reports_path_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.reg");
        std::fs::write(&path, "REGEDIT4\r\n\r\n[A\r\n").unwrap();

        let err = RegistryExportParser::parse_file(&path, ParserSettings::new()).unwrap_err();
        match err {
            RegCertError::Parse { source, path: reported } => {
                assert_eq!(source.line(), Some(3));
                assert_eq!(reported, path);
            }
            other => panic!("expected a parse error, got {:?}", other),
        }

        let missing = dir.path().join("missing.reg");
        assert!(matches!(
            RegistryExportParser::parse_file(&missing, ParserSettings::new()),
            Err(RegCertError::FailedToOpenFile { .. })
        ));
    }

    #[test]
    fn test_serialized_tree_parses_back_identically() {
        let mut values = RegistryValues::new();
        values.insert(String::new(), RegistryValue::String("default".into()));
        values.insert("Quote\"d".into(), RegistryValue::String(r"C:\x".into()));
        values.insert("Lines".into(), RegistryValue::String("a\r\nb".into()));
        values.insert("Expand".into(), RegistryValue::ExpandString("%SystemRoot%".into()));
        values.insert("Multi".into(), RegistryValue::MultiString(vec![0x41, 0, 0, 0, 0, 0]));
        values.insert("Blob".into(), RegistryValue::binary((0..=255).collect::<Vec<u8>>()));
        values.insert(
            "None".into(),
            RegistryValue::Binary {
                kind: REG_NONE,
                data: vec![],
            },
        );
        values.insert("Dw".into(), RegistryValue::Dword(0xFFFF_FFFF));
        values.insert("Qw".into(), RegistryValue::Qword(0x0102_0304_0506_0708));

        let mut tree = RegistryTree::default();
        tree.insert_key(KEY, values);
        tree.insert_key("HKEY_USERS\\Empty", RegistryValues::new());

        let text = tree.to_reg_string();
        assert!(text.contains(",\\\r\n  "), "long payloads should wrap");
        assert_eq!(RegistryTree::parse(&text).unwrap(), tree);
    }
}
