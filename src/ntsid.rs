use std::fmt;
use std::fmt::{Debug, Display};

use crate::err::SecurityDescriptorResult;
use crate::utils::ByteCursor;

/// A security identifier, as stored inside security descriptors.
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct Sid {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl Sid {
    pub fn new(revision: u8, authority: u64, sub_authorities: Vec<u32>) -> Sid {
        Sid {
            revision,
            authority,
            sub_authorities,
        }
    }

    pub(crate) fn from_cursor(cursor: &mut ByteCursor<'_>) -> SecurityDescriptorResult<Sid> {
        let bytes = cursor.sid_bytes()?;
        Ok(Sid::from_validated_bytes(bytes))
    }

    /// `bytes` has already been checked to hold `8 + 4 * bytes[1]` bytes.
    fn from_validated_bytes(bytes: &[u8]) -> Sid {
        let revision = bytes[0];
        let sub_count = bytes[1] as usize;

        // IdentifierAuthority is a 48-bit big-endian integer.
        let mut authority: u64 = 0;
        for &b in &bytes[2..8] {
            authority = (authority << 8) | u64::from(b);
        }

        let sub_authorities = bytes[8..8 + sub_count * 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Sid {
            revision,
            authority,
            sub_authorities,
        }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        8 + self.sub_authorities.len() * 4
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.revision);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// Parse the canonical `S-R-A-S1-S2...` form.
    pub fn parse_str(s: &str) -> Option<Sid> {
        let mut parts = s.strip_prefix("S-")?.split('-');
        let revision = parts.next()?.parse().ok()?;
        let authority = match parts.next()? {
            hex if hex.starts_with("0x") || hex.starts_with("0X") => {
                u64::from_str_radix(&hex[2..], 16).ok()?
            }
            decimal => decimal.parse().ok()?,
        };
        let sub_authorities = parts.map(|p| p.parse().ok()).collect::<Option<Vec<u32>>>()?;

        if authority >= 1 << 48 || sub_authorities.len() > u8::MAX as usize {
            return None;
        }

        Some(Sid::new(revision, authority, sub_authorities))
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Authorities that do not fit in 32 bits are written as 12 hex digits.
        if self.authority >= 1 << 32 {
            write!(f, "S-{}-0x{:012X}", self.revision, self.authority)?;
        } else {
            write!(f, "S-{}-{}", self.revision, self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_domain_sid() {
        let bytes = [
            1, 5, 0, 0, 0, 0, 0, 5, 21, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
            0x09, 0x0A, 0x0B, 0x0C, 0x01, 0x02, 0x00, 0x00,
        ];
        let mut cursor = ByteCursor::with_pos(&bytes, 0).unwrap();
        let sid = Sid::from_cursor(&mut cursor).unwrap();

        assert_eq!(
            sid.to_string(),
            "S-1-5-21-67305985-134678021-202050057-513"
        );
        assert_eq!(cursor.pos(), bytes.len());
        assert_eq!(sid.to_bytes(), bytes.to_vec());
    }

    #[test]
    fn test_string_form_round_trips() {
        let sid = Sid::parse_str("S-1-5-32-544").unwrap();
        assert_eq!(sid.size(), 16);
        assert_eq!(sid.to_string(), "S-1-5-32-544");
    }

    #[test]
    fn test_large_authority_is_written_in_hex() {
        let sid = Sid::new(1, 0x0000_1234_5678_9ABC, vec![7]);
        assert_eq!(sid.to_string(), "S-1-0x123456789ABC-7");
        assert_eq!(Sid::parse_str("S-1-0x123456789ABC-7"), Some(sid));
        assert_eq!(Sid::new(1, 0xFFFF_FFFF, vec![]).to_string(), "S-1-4294967295");
    }

    #[test]
    fn test_rejects_garbage_string() {
        assert!(Sid::parse_str("S-1-x").is_none());
        assert!(Sid::parse_str("1-5-18").is_none());
    }
}
