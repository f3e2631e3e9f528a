//! Self-relative security descriptors (`nTSecurityDescriptor` / the `Security` value)
//! and the aggregation of their ACEs into certificate template permissions.
//!
//! Layout (all little-endian):
//!
//! ```text
//! SECURITY_DESCRIPTOR_RELATIVE   ACL               ACE_HEADER
//!   0  revision      u8            0 revision u8     0 type  u8
//!   1  sbz1          u8            1 sbz1     u8     1 flags u8
//!   2  control       u16           2 size     u16    2 size  u16
//!   4  owner offset  u32           4 count    u16
//!   8  group offset  u32           6 sbz2     u16
//!  12  sacl offset   u32
//!  16  dacl offset   u32
//! ```

use indexmap::IndexMap;
use log::{debug, trace};
use serde::Serialize;
use winstructs::guid::Guid;

use crate::err::{SecurityDescriptorError, SecurityDescriptorResult};
use crate::flags::CertificateRights;
use crate::identity::IdentityResolver;
use crate::ntsid::Sid;
use crate::utils::ByteCursor;
use crate::utils::bytes;

pub const SECURITY_DESCRIPTOR_REVISION: u8 = 1;
const SECURITY_DESCRIPTOR_HEADER_SIZE: usize = 20;
const ACL_HEADER_SIZE: usize = 8;
const ACE_HEADER_SIZE: usize = 4;

const ACE_OBJECT_TYPE_PRESENT: u32 = 0x1;
const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;

/// `Certificate-Enrollment` extended right.
pub const EXTENDED_RIGHT_ENROLL: &str = "0e10c968-78fb-11d2-90d4-00c04f79dc55";
/// `Certificate-AutoEnrollment` extended right.
pub const EXTENDED_RIGHT_AUTOENROLL: &str = "a05b8cc2-17bc-4802-a710-e7c15ab866a2";
/// The null GUID grants every extended right.
pub const EXTENDED_RIGHT_ALL: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AceType {
    AccessAllowed,
    AccessDenied,
    SystemAudit,
    SystemAlarm,
    AccessAllowedCompound,
    AccessAllowedObject,
    AccessDeniedObject,
    SystemAuditObject,
    SystemAlarmObject,
    AccessAllowedCallback,
    AccessDeniedCallback,
    AccessAllowedCallbackObject,
    AccessDeniedCallbackObject,
    SystemAuditCallback,
    SystemAlarmCallback,
    SystemAuditCallbackObject,
    SystemAlarmCallbackObject,
    SystemMandatoryLabel,
    SystemResourceAttribute,
    SystemScopedPolicyId,
}

impl AceType {
    pub fn from_u8(byte: u8) -> Option<AceType> {
        match byte {
            0x00 => Some(AceType::AccessAllowed),
            0x01 => Some(AceType::AccessDenied),
            0x02 => Some(AceType::SystemAudit),
            0x03 => Some(AceType::SystemAlarm),
            0x04 => Some(AceType::AccessAllowedCompound),
            0x05 => Some(AceType::AccessAllowedObject),
            0x06 => Some(AceType::AccessDeniedObject),
            0x07 => Some(AceType::SystemAuditObject),
            0x08 => Some(AceType::SystemAlarmObject),
            0x09 => Some(AceType::AccessAllowedCallback),
            0x0A => Some(AceType::AccessDeniedCallback),
            0x0B => Some(AceType::AccessAllowedCallbackObject),
            0x0C => Some(AceType::AccessDeniedCallbackObject),
            0x0D => Some(AceType::SystemAuditCallback),
            0x0E => Some(AceType::SystemAlarmCallback),
            0x0F => Some(AceType::SystemAuditCallbackObject),
            0x10 => Some(AceType::SystemAlarmCallbackObject),
            0x11 => Some(AceType::SystemMandatoryLabel),
            0x12 => Some(AceType::SystemResourceAttribute),
            0x13 => Some(AceType::SystemScopedPolicyId),
            _ => None,
        }
    }

    fn is_object(self) -> bool {
        matches!(
            self,
            AceType::AccessAllowedObject
                | AceType::AccessDeniedObject
                | AceType::SystemAuditObject
                | AceType::SystemAlarmObject
                | AceType::AccessAllowedCallbackObject
                | AceType::AccessDeniedCallbackObject
                | AceType::SystemAuditCallbackObject
                | AceType::SystemAlarmCallbackObject
        )
    }
}

#[derive(Debug, Clone)]
pub struct Ace {
    pub ace_type: AceType,
    pub flags: u8,
    pub mask: u32,
    pub object_type: Option<Guid>,
    pub inherited_object_type: Option<Guid>,
    pub sid: Sid,
}

#[derive(Debug, Clone)]
pub struct Acl {
    pub revision: u8,
    pub aces: Vec<Ace>,
}

#[derive(Debug, Clone)]
pub struct SecurityDescriptor {
    pub revision: u8,
    pub control: u16,
    pub owner: Sid,
    pub group: Option<Sid>,
    pub dacl: Option<Acl>,
}

impl SecurityDescriptor {
    pub fn parse(buf: &[u8]) -> SecurityDescriptorResult<SecurityDescriptor> {
        let mut cursor = ByteCursor::with_pos(buf, 0)?;

        let revision = cursor.u8_named("sd.revision")?;
        if revision != SECURITY_DESCRIPTOR_REVISION {
            return Err(SecurityDescriptorError::UnsupportedRevision { revision });
        }

        let _sbz1 = cursor.u8_named("sd.sbz1")?;
        let control = cursor.u16_named("sd.control")?;
        let owner_offset = cursor.u32_named("sd.owner_offset")?;
        let group_offset = cursor.u32_named("sd.group_offset")?;
        let _sacl_offset = cursor.u32_named("sd.sacl_offset")?;
        let dacl_offset = cursor.u32_named("sd.dacl_offset")?;
        debug_assert_eq!(cursor.pos(), SECURITY_DESCRIPTOR_HEADER_SIZE);

        if owner_offset == 0 {
            return Err(SecurityDescriptorError::MissingOwner);
        }
        let owner = sid_at(buf, owner_offset, "sd.owner")?;

        let group = match group_offset {
            0 => None,
            offset => Some(sid_at(buf, offset, "sd.group")?),
        };

        let dacl = match dacl_offset {
            0 => None,
            offset => Some(Acl::parse(buf, offset)?),
        };

        Ok(SecurityDescriptor {
            revision,
            control,
            owner,
            group,
            dacl,
        })
    }

    /// ACEs of the DACL, empty when the descriptor has none.
    pub fn dacl_aces(&self) -> &[Ace] {
        match &self.dacl {
            Some(acl) => &acl.aces,
            None => &[],
        }
    }
}

fn sid_at(buf: &[u8], offset: u32, what: &'static str) -> SecurityDescriptorResult<Sid> {
    let mut cursor = cursor_at(buf, offset, what)?;
    Sid::from_cursor(&mut cursor)
}

fn cursor_at<'a>(
    buf: &'a [u8],
    offset: u32,
    what: &'static str,
) -> SecurityDescriptorResult<ByteCursor<'a>> {
    ByteCursor::with_pos(buf, offset as usize).map_err(|_| {
        SecurityDescriptorError::OffsetOutOfBounds {
            what,
            offset,
            len: buf.len(),
        }
    })
}

impl Acl {
    fn parse(buf: &[u8], offset: u32) -> SecurityDescriptorResult<Acl> {
        let start = offset as usize;
        let mut cursor = cursor_at(buf, offset, "acl")?;

        let revision = cursor.u8_named("acl.revision")?;
        let _sbz1 = cursor.u8_named("acl.sbz1")?;
        let size = cursor.u16_named("acl.size")?;
        let count = cursor.u16_named("acl.ace_count")?;
        let _sbz2 = cursor.u16_named("acl.sbz2")?;
        debug_assert_eq!(cursor.pos(), start + ACL_HEADER_SIZE);

        // The declared ACL must lie inside the buffer; ACEs are then bounded by it.
        let acl = bytes::slice_r(buf, start, usize::from(size), "acl")?;
        let acl_end = start + acl.len();

        let mut aces = Vec::with_capacity(usize::from(count));
        for parsed in 0..count {
            let ace_start = cursor.pos();
            if ace_start + ACE_HEADER_SIZE > acl_end {
                return Err(SecurityDescriptorError::AceCountOverflow {
                    offset: start,
                    count,
                    parsed,
                    size,
                });
            }

            let ace_type = cursor.u8_named("ace.type")?;
            let flags = cursor.u8_named("ace.flags")?;
            let ace_size = cursor.u16_named("ace.size")?;
            let ace_end = ace_start + usize::from(ace_size);

            if usize::from(ace_size) < ACE_HEADER_SIZE + 4 || ace_end > acl_end {
                return Err(SecurityDescriptorError::InvalidAceSize {
                    offset: ace_start,
                    size: ace_size,
                });
            }

            match AceType::from_u8(ace_type) {
                Some(AceType::AccessAllowedCompound) | None => {
                    debug!(
                        "Skipping ACE of type 0x{:02x} at offset {}",
                        ace_type, ace_start
                    );
                }
                Some(kind) => {
                    let mut body =
                        ByteCursor::with_pos(&buf[..ace_end], ace_start + ACE_HEADER_SIZE)?;
                    let ace = Ace::parse_body(kind, flags, &mut body)?;
                    trace!("{:?} for {} mask 0x{:08x}", ace.ace_type, ace.sid, ace.mask);
                    aces.push(ace);
                }
            }

            cursor.set_pos(ace_end, "ace.end")?;
        }

        Ok(Acl { revision, aces })
    }
}

impl Ace {
    fn parse_body(
        ace_type: AceType,
        flags: u8,
        cursor: &mut ByteCursor<'_>,
    ) -> SecurityDescriptorResult<Ace> {
        let mask = cursor.u32_named("ace.mask")?;

        let mut object_type = None;
        let mut inherited_object_type = None;
        if ace_type.is_object() {
            let object_flags = cursor.u32_named("ace.object_flags")?;
            if object_flags & ACE_OBJECT_TYPE_PRESENT != 0 {
                object_type = Some(read_guid(cursor, "ace.object_type")?);
            }
            if object_flags & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0 {
                inherited_object_type = Some(read_guid(cursor, "ace.inherited_object_type")?);
            }
        }

        let sid = Sid::from_cursor(cursor)?;

        Ok(Ace {
            ace_type,
            flags,
            mask,
            object_type,
            inherited_object_type,
            sid,
        })
    }
}

fn read_guid(cursor: &mut ByteCursor<'_>, what: &'static str) -> SecurityDescriptorResult<Guid> {
    let offset = cursor.pos();
    let raw = cursor.array::<16>(what)?;
    Guid::from_buffer(&raw).map_err(|_| bytes::truncated(what, offset, 16, offset + raw.len()))
}

/// Lowercase, brace-less GUID text, the form extended rights are compared in.
fn normalize_guid(guid: &Guid) -> String {
    guid.to_string()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_ascii_lowercase()
}

/// Rights accumulated for one trustee over every ACE that names it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrusteeRights {
    pub rights: CertificateRights,
    pub extended_rights: Vec<String>,
}

impl TrusteeRights {
    pub fn has_extended_right(&self, guid: &str) -> bool {
        self.extended_rights.iter().any(|g| g == guid)
    }

    pub fn can_enroll(&self) -> bool {
        self.has_extended_right(EXTENDED_RIGHT_ENROLL)
            || self.has_extended_right(EXTENDED_RIGHT_AUTOENROLL)
    }
}

/// Owner plus the per-trustee fold of the DACL, in order of first appearance.
///
/// Only access-allowed ACEs grant anything. Other ACE types still register their
/// trustee so the ordering stays stable.
#[derive(Debug, Clone)]
pub struct CertificateSecurity {
    owner: Sid,
    aces: IndexMap<String, TrusteeRights>,
}

impl CertificateSecurity {
    pub fn parse(buf: &[u8]) -> SecurityDescriptorResult<CertificateSecurity> {
        Ok(CertificateSecurity::from_descriptor(&SecurityDescriptor::parse(buf)?))
    }

    pub fn from_descriptor(descriptor: &SecurityDescriptor) -> CertificateSecurity {
        let aces = descriptor
            .dacl_aces()
            .iter()
            .fold(IndexMap::<String, TrusteeRights>::new(), |mut acc, ace| {
                let entry = acc.entry(ace.sid.to_string()).or_default();

                match ace.ace_type {
                    AceType::AccessAllowed => {
                        entry.rights |= CertificateRights::from_bits_retain(ace.mask);
                    }
                    AceType::AccessAllowedObject => {
                        match ace.object_type.as_ref().or(ace.inherited_object_type.as_ref()) {
                            Some(guid) => {
                                let guid = normalize_guid(guid);
                                if !entry.extended_rights.contains(&guid) {
                                    entry.extended_rights.push(guid);
                                }
                            }
                            None => entry.rights |= CertificateRights::from_bits_retain(ace.mask),
                        }
                    }
                    _ => {}
                }

                acc
            });

        CertificateSecurity {
            owner: descriptor.owner.clone(),
            aces,
        }
    }

    pub fn owner(&self) -> &Sid {
        &self.owner
    }

    pub fn aces(&self) -> &IndexMap<String, TrusteeRights> {
        &self.aces
    }

    pub fn rights_of(&self, sid: &str) -> Option<&TrusteeRights> {
        self.aces.get(sid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrollmentPermissions {
    #[serde(rename = "Enrollment Rights", skip_serializing_if = "Vec::is_empty")]
    pub enrollment_rights: Vec<String>,
    #[serde(rename = "All Extended Rights", skip_serializing_if = "Vec::is_empty")]
    pub all_extended_rights: Vec<String>,
}

impl EnrollmentPermissions {
    pub fn is_empty(&self) -> bool {
        self.enrollment_rights.is_empty() && self.all_extended_rights.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectControlPermissions {
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Full Control Principals", skip_serializing_if = "Vec::is_empty")]
    pub full_control_principals: Vec<String>,
    #[serde(rename = "Write Owner Principals", skip_serializing_if = "Vec::is_empty")]
    pub write_owner_principals: Vec<String>,
    #[serde(rename = "Write Dacl Principals", skip_serializing_if = "Vec::is_empty")]
    pub write_dacl_principals: Vec<String>,
    #[serde(rename = "Write Property Principals", skip_serializing_if = "Vec::is_empty")]
    pub write_property_principals: Vec<String>,
}

/// Grouped permissions of a template, keyed the way directory based tooling reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    #[serde(rename = "Enrollment Permissions", skip_serializing_if = "Option::is_none")]
    pub enrollment_permissions: Option<EnrollmentPermissions>,
    #[serde(rename = "Object Control Permissions")]
    pub object_control_permissions: ObjectControlPermissions,
}

/// Group principals by the template rights they hold. Trustees are rendered through
/// `resolver` in first-seen order.
pub fn build_permissions(
    security: &CertificateSecurity,
    resolver: &dyn IdentityResolver,
) -> Permissions {
    let mut enrollment = EnrollmentPermissions::default();
    let mut control = ObjectControlPermissions {
        owner: resolver.resolve(&security.owner().to_string()),
        ..ObjectControlPermissions::default()
    };

    for (sid, trustee) in security.aces() {
        let name = resolver.resolve(sid);

        if trustee.can_enroll() {
            enrollment.enrollment_rights.push(name.clone());
        }
        if trustee.has_extended_right(EXTENDED_RIGHT_ALL) {
            enrollment.all_extended_rights.push(name.clone());
        }

        let rights = trustee.rights;
        if rights.contains(CertificateRights::GENERIC_ALL) {
            control.full_control_principals.push(name.clone());
        }
        if rights.contains(CertificateRights::WRITE_OWNER) {
            control.write_owner_principals.push(name.clone());
        }
        if rights.contains(CertificateRights::WRITE_DACL) {
            control.write_dacl_principals.push(name.clone());
        }
        if rights.contains(CertificateRights::WRITE_PROPERTY) {
            control.write_property_principals.push(name);
        }
    }

    Permissions {
        enrollment_permissions: (!enrollment.is_empty()).then_some(enrollment),
        object_control_permissions: control,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::identity::SidTable;
    use pretty_assertions::assert_eq;

    const OWNER: &str = "S-1-5-21-1004336348-1177238915-682003330-512";
    const DOMAIN_USERS: &str = "S-1-5-21-1004336348-1177238915-682003330-513";
    const ENTERPRISE_ADMINS: &str = "S-1-5-21-1004336348-1177238915-682003330-519";

    #[test]
    fn test_parses_owner_and_dacl() {
        let sd = descriptor(
            OWNER,
            &[
                ace(ACCESS_ALLOWED_OBJECT, 0x100, Some(EXTENDED_RIGHT_ENROLL), DOMAIN_USERS),
                ace(ACCESS_ALLOWED, 0x000F_01FF, None, ENTERPRISE_ADMINS),
            ],
        );

        let parsed = SecurityDescriptor::parse(&sd).unwrap();
        assert_eq!(parsed.owner.to_string(), OWNER);
        assert!(parsed.group.is_none());

        let aces = parsed.dacl_aces();
        assert_eq!(aces.len(), 2);
        assert_eq!(aces[0].ace_type, AceType::AccessAllowedObject);
        assert_eq!(
            normalize_guid(aces[0].object_type.as_ref().unwrap()),
            EXTENDED_RIGHT_ENROLL
        );
        assert_eq!(aces[1].mask, 0x000F_01FF);
        assert_eq!(aces[1].sid.to_string(), ENTERPRISE_ADMINS);
    }

    #[test]
    fn test_single_enroll_ace_populates_only_enrollment_rights() {
        let sd = descriptor(
            OWNER,
            &[ace(ACCESS_ALLOWED_OBJECT, 0x100, Some(EXTENDED_RIGHT_ENROLL), DOMAIN_USERS)],
        );
        let security = CertificateSecurity::parse(&sd).unwrap();
        let permissions = build_permissions(&security, &SidTable::new());

        let enrollment = permissions.enrollment_permissions.unwrap();
        assert_eq!(enrollment.enrollment_rights, vec!["Domain Users"]);
        assert!(enrollment.all_extended_rights.is_empty());
    }

    #[test]
    fn test_empty_dacl_reports_only_owner() {
        let sd = descriptor(OWNER, &[]);
        let security = CertificateSecurity::parse(&sd).unwrap();
        let permissions = build_permissions(&security, &SidTable::new());

        assert_eq!(
            serde_json::to_value(&permissions).unwrap(),
            serde_json::json!({"Object Control Permissions": {"Owner": "Domain Admins"}})
        );
    }

    #[test]
    fn test_rights_fold_per_trustee_in_first_seen_order() {
        let sd = descriptor(
            OWNER,
            &[
                ace(ACCESS_ALLOWED, 0x0002_0094, None, DOMAIN_USERS),
                ace(ACCESS_ALLOWED, 0x0004_0000, None, ENTERPRISE_ADMINS),
                ace(ACCESS_ALLOWED, 0x0008_0020, None, ENTERPRISE_ADMINS),
                ace(ACCESS_ALLOWED_OBJECT, 0x100, Some(EXTENDED_RIGHT_ALL), ENTERPRISE_ADMINS),
                ace(ACCESS_ALLOWED_OBJECT, 0x100, Some(EXTENDED_RIGHT_AUTOENROLL), DOMAIN_USERS),
            ],
        );
        let security = CertificateSecurity::parse(&sd).unwrap();

        let trustees: Vec<&str> = security.aces().keys().map(String::as_str).collect();
        assert_eq!(trustees, vec![DOMAIN_USERS, ENTERPRISE_ADMINS]);

        let permissions = build_permissions(&security, &SidTable::new());
        let enrollment = permissions.enrollment_permissions.unwrap();
        assert_eq!(enrollment.enrollment_rights, vec!["Domain Users"]);
        assert_eq!(enrollment.all_extended_rights, vec!["Enterprise Admins"]);

        let control = permissions.object_control_permissions;
        assert!(control.full_control_principals.is_empty());
        assert_eq!(control.write_owner_principals, vec!["Enterprise Admins"]);
        assert_eq!(control.write_dacl_principals, vec!["Enterprise Admins"]);
        assert_eq!(control.write_property_principals, vec!["Enterprise Admins"]);
    }

    #[test]
    fn test_denied_aces_grant_nothing() {
        let sd = descriptor(
            OWNER,
            &[
                ace(ACCESS_DENIED, 0x000F_01FF, None, DOMAIN_USERS),
                ace(ACCESS_ALLOWED, 0x0000_0020, None, ENTERPRISE_ADMINS),
            ],
        );
        let security = CertificateSecurity::parse(&sd).unwrap();

        assert_eq!(security.rights_of(DOMAIN_USERS), Some(&TrusteeRights::default()));
        let permissions = build_permissions(&security, &SidTable::new());
        assert_eq!(
            permissions.object_control_permissions.write_property_principals,
            vec!["Enterprise Admins"]
        );
        assert!(permissions.object_control_permissions.full_control_principals.is_empty());
    }

    #[test]
    fn test_object_ace_without_guid_contributes_mask() {
        let sd = descriptor(
            OWNER,
            &[ace(ACCESS_ALLOWED_OBJECT, 0x000F_01FF, None, DOMAIN_USERS)],
        );
        let security = CertificateSecurity::parse(&sd).unwrap();
        let rights = security.rights_of(DOMAIN_USERS).unwrap();
        assert!(rights.rights.contains(CertificateRights::GENERIC_ALL));
        assert!(rights.extended_rights.is_empty());
    }

    #[test]
    fn test_unknown_ace_types_are_skipped() {
        let mut unknown = ace(ACCESS_ALLOWED, 0xFFFF_FFFF, None, DOMAIN_USERS);
        unknown[0] = 0x42;
        let sd = descriptor(OWNER, &[unknown, ace(ACCESS_ALLOWED, 0x20, None, ENTERPRISE_ADMINS)]);

        let parsed = SecurityDescriptor::parse(&sd).unwrap();
        assert_eq!(parsed.dacl_aces().len(), 1);
        assert_eq!(parsed.dacl_aces()[0].sid.to_string(), ENTERPRISE_ADMINS);
    }

    #[test]
    fn test_every_truncation_is_an_error() {
        let sd = descriptor(
            OWNER,
            &[ace(ACCESS_ALLOWED_OBJECT, 0x100, Some(EXTENDED_RIGHT_ENROLL), DOMAIN_USERS)],
        );

        for len in 0..sd.len() {
            assert!(
                SecurityDescriptor::parse(&sd[..len]).is_err(),
                "prefix of {} bytes parsed",
                len
            );
        }
    }

    #[test]
    fn test_structural_errors() {
        let mut sd = descriptor(OWNER, &[ace(ACCESS_ALLOWED, 0x20, None, DOMAIN_USERS)]);

        let mut bad_revision = sd.clone();
        bad_revision[0] = 2;
        assert_eq!(
            SecurityDescriptor::parse(&bad_revision).unwrap_err(),
            SecurityDescriptorError::UnsupportedRevision { revision: 2 }
        );

        let mut no_owner = sd.clone();
        no_owner[4..8].copy_from_slice(&0_u32.to_le_bytes());
        assert_eq!(
            SecurityDescriptor::parse(&no_owner).unwrap_err(),
            SecurityDescriptorError::MissingOwner
        );

        let mut far_owner = sd.clone();
        far_owner[4..8].copy_from_slice(&0x1000_u32.to_le_bytes());
        assert!(matches!(
            SecurityDescriptor::parse(&far_owner).unwrap_err(),
            SecurityDescriptorError::OffsetOutOfBounds { what: "sd.owner", offset: 0x1000, .. }
        ));

        // First ACE starts after the 20 byte header, the 28 byte owner and the ACL header.
        let ace_offset = 20 + 28 + 8;
        sd[ace_offset + 2..ace_offset + 4].copy_from_slice(&4_u16.to_le_bytes());
        assert_eq!(
            SecurityDescriptor::parse(&sd).unwrap_err(),
            SecurityDescriptorError::InvalidAceSize {
                offset: ace_offset,
                size: 4
            }
        );
    }

    #[test]
    fn test_ace_count_larger_than_acl_is_an_error() {
        let mut sd = descriptor(OWNER, &[ace(ACCESS_ALLOWED, 0x20, None, DOMAIN_USERS)]);
        let acl_offset = 20 + 28;
        sd[acl_offset + 4..acl_offset + 6].copy_from_slice(&2_u16.to_le_bytes());

        assert!(matches!(
            SecurityDescriptor::parse(&sd).unwrap_err(),
            SecurityDescriptorError::AceCountOverflow { count: 2, parsed: 1, .. }
        ));
    }
}
