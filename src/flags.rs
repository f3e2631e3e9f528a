//! Typed flag domains stored on certificate templates.
//!
//! Each domain is its own `bitflags` type so a name flag can never be tested against an
//! enrollment flag by accident. Bits without a named constant are retained.

use bitflags::Flags;
use serde::Serializer;
use serde::ser::SerializeSeq;

bitflags::bitflags! {
    /// `msPKI-Certificate-Name-Flag`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CertificateNameFlags: u32 {
        const ENROLLEE_SUPPLIES_SUBJECT = 0x0000_0001;
        const ADD_EMAIL = 0x0000_0002;
        const ADD_OBJ_GUID = 0x0000_0004;
        const OLD_CERT_SUPPLIES_SUBJECT_AND_ALT_NAME = 0x0000_0008;
        const ADD_DIRECTORY_PATH = 0x0000_0100;
        const ENROLLEE_SUPPLIES_SUBJECT_ALT_NAME = 0x0001_0000;
        const SUBJECT_ALT_REQUIRE_DOMAIN_DNS = 0x0040_0000;
        const SUBJECT_ALT_REQUIRE_SPN = 0x0080_0000;
        const SUBJECT_ALT_REQUIRE_DIRECTORY_GUID = 0x0100_0000;
        const SUBJECT_ALT_REQUIRE_UPN = 0x0200_0000;
        const SUBJECT_ALT_REQUIRE_EMAIL = 0x0400_0000;
        const SUBJECT_ALT_REQUIRE_DNS = 0x0800_0000;
        const SUBJECT_REQUIRE_DNS_AS_CN = 0x1000_0000;
        const SUBJECT_REQUIRE_EMAIL = 0x2000_0000;
        const SUBJECT_REQUIRE_COMMON_NAME = 0x4000_0000;
        const SUBJECT_REQUIRE_DIRECTORY_PATH = 0x8000_0000;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// `msPKI-Enrollment-Flag`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnrollmentFlags: u32 {
        const INCLUDE_SYMMETRIC_ALGORITHMS = 0x0000_0001;
        const PEND_ALL_REQUESTS = 0x0000_0002;
        const PUBLISH_TO_KRA_CONTAINER = 0x0000_0004;
        const PUBLISH_TO_DS = 0x0000_0008;
        const AUTO_ENROLLMENT_CHECK_USER_DS_CERTIFICATE = 0x0000_0010;
        const AUTO_ENROLLMENT = 0x0000_0020;
        const PREVIOUS_APPROVAL_VALIDATE_REENROLLMENT = 0x0000_0040;
        const DOMAIN_AUTHENTICATION_NOT_REQUIRED = 0x0000_0080;
        const USER_INTERACTION_REQUIRED = 0x0000_0100;
        const ADD_TEMPLATE_NAME = 0x0000_0200;
        const REMOVE_INVALID_CERTIFICATE_FROM_PERSONAL_STORE = 0x0000_0400;
        const ALLOW_ENROLL_ON_BEHALF_OF = 0x0000_0800;
        const ADD_OCSP_NOCHECK = 0x0000_1000;
        const ENABLE_KEY_REUSE_ON_NT_TOKEN_KEYSET_STORAGE_FULL = 0x0000_2000;
        const NOREVOCATIONINFOINISSUEDCERTS = 0x0000_4000;
        const INCLUDE_BASIC_CONSTRAINTS_FOR_EE_CERTS = 0x0000_8000;
        const ALLOW_PREVIOUS_APPROVAL_KEYBASEDRENEWAL_VALIDATE_REENROLLMENT = 0x0001_0000;
        const ISSUANCE_POLICIES_FROM_REQUEST = 0x0002_0000;
        const SKIP_AUTO_RENEWAL = 0x0004_0000;
        const NO_SECURITY_EXTENSION = 0x0008_0000;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// `msPKI-Private-Key-Flag`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PrivateKeyFlags: u32 {
        const REQUIRE_PRIVATE_KEY_ARCHIVAL = 0x0000_0001;
        const EXPORTABLE_KEY = 0x0000_0010;
        const STRONG_KEY_PROTECTION_REQUIRED = 0x0000_0020;
        const REQUIRE_ALTERNATE_SIGNATURE_ALGORITHM = 0x0000_0040;
        const REQUIRE_SAME_KEY_RENEWAL = 0x0000_0080;
        const USE_LEGACY_PROVIDER = 0x0000_0100;
        const EK_TRUST_ON_USE = 0x0000_0200;
        const EK_VALIDATE_CERT = 0x0000_0400;
        const EK_VALIDATE_KEY = 0x0000_0800;
        const ATTEST_PREFERRED = 0x0000_1000;
        const ATTEST_REQUIRED = 0x0000_2000;
        const ATTESTATION_WITHOUT_POLICY = 0x0000_4000;
        const HELLO_LOGON_KEY = 0x0020_0000;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Access mask bits of interest on a certificate template object.
    ///
    /// `GENERIC_ALL` is the mapped full-control mask; `contains` requires every bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CertificateRights: u32 {
        const GENERIC_ALL = 0x000F_01FF;
        const GENERIC_READ = 0x0002_0094;
        const GENERIC_WRITE = 0x0002_0028;
        const GENERIC_EXECUTE = 0x0002_0004;
        const WRITE_OWNER = 0x0008_0000;
        const WRITE_DACL = 0x0004_0000;
        const WRITE_PROPERTY = 0x0000_0020;
        const READ_PROPERTY = 0x0000_0010;

        const _ = !0;
    }
}

/// The flag domains a registry integer can be interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagDomain {
    CertificateName,
    Enrollment,
    PrivateKey,
}

pub trait TemplateFlags: Flags<Bits = u32> + Copy {
    const DOMAIN: FlagDomain;
}

impl TemplateFlags for CertificateNameFlags {
    const DOMAIN: FlagDomain = FlagDomain::CertificateName;
}

impl TemplateFlags for EnrollmentFlags {
    const DOMAIN: FlagDomain = FlagDomain::Enrollment;
}

impl TemplateFlags for PrivateKeyFlags {
    const DOMAIN: FlagDomain = FlagDomain::PrivateKey;
}

/// Interpret a raw registry integer in the flag domain `F`.
pub fn decode_bitset<F: TemplateFlags>(raw: u32) -> F {
    F::from_bits_retain(raw)
}

/// Names of the set flags, in declaration order. Unnamed bits are not listed.
pub fn flag_names<F: Flags>(flags: &F) -> Vec<&'static str> {
    flags.iter_names().map(|(name, _)| name).collect()
}

/// Serializes a flag set as the list of its names.
pub(crate) fn serialize_flag_names<F: Flags, S: Serializer>(
    flags: &F,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let names = flag_names(flags);
    let mut seq = serializer.serialize_seq(Some(names.len()))?;
    for name in names {
        seq.serialize_element(name)?;
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_matches_bitwise_and() {
        for raw in [0_u32, 1, 2, 3, 0x20, 0x8000_0001, 0x0001_0001, u32::MAX] {
            let name: CertificateNameFlags = decode_bitset(raw);
            for flag in CertificateNameFlags::all().iter() {
                assert_eq!(name.contains(flag), raw & flag.bits() == flag.bits());
            }

            let enrollment: EnrollmentFlags = decode_bitset(raw);
            for flag in EnrollmentFlags::all().iter() {
                assert_eq!(enrollment.contains(flag), raw & flag.bits() == flag.bits());
            }

            let private_key: PrivateKeyFlags = decode_bitset(raw);
            for flag in PrivateKeyFlags::all().iter() {
                assert_eq!(private_key.contains(flag), raw & flag.bits() == flag.bits());
            }
        }
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let flags: EnrollmentFlags = decode_bitset(0x4000_0002);
        assert_eq!(flags.bits(), 0x4000_0002);
        assert!(flags.contains(EnrollmentFlags::PEND_ALL_REQUESTS));
        assert_eq!(flag_names(&flags), vec!["PEND_ALL_REQUESTS"]);
    }

    #[test]
    fn test_domain_tags() {
        assert_eq!(CertificateNameFlags::DOMAIN, FlagDomain::CertificateName);
        assert_eq!(EnrollmentFlags::DOMAIN, FlagDomain::Enrollment);
        assert_eq!(PrivateKeyFlags::DOMAIN, FlagDomain::PrivateKey);
    }

    #[test]
    fn test_full_control_requires_every_bit() {
        let rights = CertificateRights::from_bits_retain(0x000F_01FF);
        assert!(rights.contains(CertificateRights::GENERIC_ALL));
        assert!(rights.contains(CertificateRights::WRITE_DACL));

        let partial = CertificateRights::from_bits_retain(0x0004_0020);
        assert!(!partial.contains(CertificateRights::GENERIC_ALL));
        assert!(partial.contains(CertificateRights::WRITE_PROPERTY));
    }
}
