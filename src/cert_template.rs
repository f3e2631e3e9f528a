use log::trace;
use serde::{Serialize, Serializer};

use crate::decode::{
    filetime_interval_to_duration, resolve_oid_names, value_bytes, value_integer, value_strings,
    value_text, value_u32,
};
use crate::err::{DecodeError, TemplateError, TemplateResult};
use crate::flags::{
    CertificateNameFlags, EnrollmentFlags, PrivateKeyFlags, decode_bitset, serialize_flag_names,
};
use crate::identity::IdentityResolver;
use crate::reg_parser::{RegistryValue, RegistryValues};
use crate::security::{CertificateSecurity, Permissions, build_permissions};

pub const DISPLAY_NAME: &str = "DisplayName";
pub const SCHEMA_VERSION: &str = "msPKI-Template-Schema-Version";
pub const TEMPLATE_OID: &str = "msPKI-Cert-Template-OID";
pub const VALIDITY_PERIOD: &str = "ValidityPeriod";
pub const RENEWAL_OVERLAP: &str = "RenewalOverlap";
pub const CERTIFICATE_NAME_FLAG: &str = "msPKI-Certificate-Name-Flag";
pub const ENROLLMENT_FLAG: &str = "msPKI-Enrollment-Flag";
pub const PRIVATE_KEY_FLAG: &str = "msPKI-Private-Key-Flag";
pub const RA_SIGNATURE: &str = "msPKI-RA-Signature";
pub const EXT_KEY_USAGE: &str = "ExtKeyUsageSyntax";
pub const RA_APPLICATION_POLICIES: &str = "msPKI-RA-Application-Policies";
pub const CERTIFICATE_POLICY: &str = "msPKI-Certificate-Policy";
pub const SECURITY: &str = "Security";
pub const MINIMAL_KEY_SIZE: &str = "msPKI-Minimal-Key-Size";

const CLIENT_AUTHENTICATION_USAGES: [&str; 3] = [
    "Client Authentication",
    "Smart Card Logon",
    "PKINIT Client Authentication",
];

/// A certificate template decoded from its `CertificateTemplateCache` key.
#[derive(Debug, Clone)]
pub struct CertTemplate {
    pub name: String,
    pub display_name: String,
    pub oid: String,
    pub schema_version: u32,
    pub validity_period: String,
    pub renewal_period: String,
    pub name_flags: CertificateNameFlags,
    pub enrollment_flags: EnrollmentFlags,
    pub private_key_flags: PrivateKeyFlags,
    pub signatures_required: u32,
    pub extended_key_usage: Vec<String>,
    pub application_policies: Vec<String>,
    pub issuance_policies: Vec<String>,
    pub minimal_key_size: u32,
    pub security: CertificateSecurity,
    security_descriptor: Vec<u8>,
}

impl CertTemplate {
    /// Decode the values of one template key. `name` is the last segment of the key path.
    pub fn build(name: impl Into<String>, values: &RegistryValues) -> TemplateResult<CertTemplate> {
        let name = name.into();
        trace!("Decoding template `{}`", name);

        let display_name = decode(DISPLAY_NAME, value_text(required(values, DISPLAY_NAME)?))?;

        let schema_version = match values.get(SCHEMA_VERSION) {
            Some(value) => decode(SCHEMA_VERSION, value_integer(value))?,
            None => 0,
        };

        let oid = decode(TEMPLATE_OID, value_text(required(values, TEMPLATE_OID)?))?;
        let validity_period = duration(values, VALIDITY_PERIOD)?;
        let renewal_period = duration(values, RENEWAL_OVERLAP)?;

        let name_flags = decode_bitset(integer(values, CERTIFICATE_NAME_FLAG)?);
        let enrollment_flags = decode_bitset(integer(values, ENROLLMENT_FLAG)?);
        let private_key_flags = decode_bitset(integer(values, PRIVATE_KEY_FLAG)?);
        let signatures_required = integer(values, RA_SIGNATURE)?;

        let extended_key_usage = oid_list(values, EXT_KEY_USAGE)?;
        let application_policies = oid_list(values, RA_APPLICATION_POLICIES)?;
        let issuance_policies = oid_list(values, CERTIFICATE_POLICY)?;

        let security_descriptor = decode(SECURITY, value_bytes(required(values, SECURITY)?))?.to_vec();
        let security = CertificateSecurity::parse(&security_descriptor)?;

        let minimal_key_size = integer(values, MINIMAL_KEY_SIZE)?;

        Ok(CertTemplate {
            name,
            display_name,
            oid,
            schema_version: if schema_version == 0 { 1 } else { schema_version },
            validity_period,
            renewal_period,
            name_flags,
            enrollment_flags,
            private_key_flags,
            signatures_required,
            extended_key_usage,
            application_policies,
            issuance_policies,
            minimal_key_size,
            security,
            security_descriptor,
        })
    }

    /// The raw `Security` value.
    pub fn security_descriptor(&self) -> &[u8] {
        &self.security_descriptor
    }

    pub fn any_purpose(&self) -> bool {
        self.has_usage("Any Purpose")
    }

    pub fn client_authentication(&self) -> bool {
        self.any_purpose()
            || CLIENT_AUTHENTICATION_USAGES
                .iter()
                .any(|usage| self.has_usage(usage))
    }

    pub fn enrollee_supplies_subject(&self) -> bool {
        self.name_flags
            .contains(CertificateNameFlags::ENROLLEE_SUPPLIES_SUBJECT)
    }

    pub fn enrollment_agent(&self) -> bool {
        self.has_usage("Certificate Request Agent")
    }

    pub fn requires_manager_approval(&self) -> bool {
        self.enrollment_flags
            .contains(EnrollmentFlags::PEND_ALL_REQUESTS)
    }

    pub fn requires_key_archival(&self) -> bool {
        self.private_key_flags
            .contains(PrivateKeyFlags::REQUIRE_PRIVATE_KEY_ARCHIVAL)
    }

    fn has_usage(&self, usage: &str) -> bool {
        self.extended_key_usage.iter().any(|u| u == usage)
    }

    pub fn permissions(&self, resolver: &dyn IdentityResolver) -> Permissions {
        build_permissions(&self.security, resolver)
    }

    /// The record handed to analysis engines, keyed like a directory query result.
    pub fn to_attributes(&self, resolver: &dyn IdentityResolver) -> TemplateAttributes {
        TemplateAttributes {
            cn: self.name.clone(),
            display_name: self.display_name.clone(),
            template_oid: self.oid.clone(),
            validity_period: self.validity_period.clone(),
            renewal_period: self.renewal_period.clone(),
            certificate_name_flag: self.name_flags,
            enrollment_flag: self.enrollment_flags,
            authorized_signatures_required: self.signatures_required,
            extended_key_usage: self.extended_key_usage.clone(),
            permissions: self.permissions(resolver),
            nt_security_descriptor: self.security_descriptor.clone(),
            enrollee_supplies_subject: self.enrollee_supplies_subject(),
            enrollment_agent: self.enrollment_agent(),
            any_purpose: self.any_purpose(),
            client_authentication: self.client_authentication(),
            private_key_flag: self.private_key_flags,
            requires_manager_approval: self.requires_manager_approval(),
            requires_key_archival: self.requires_key_archival(),
            application_policies: self.application_policies.clone(),
            schema_version: self.schema_version,
            minimal_key_size: self.minimal_key_size,
            certificate_policy: self.issuance_policies.clone(),
            enabled: true,
        }
    }
}

/// Attributes of one template under the names a live directory query reports them with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateAttributes {
    pub cn: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "Template OID")]
    pub template_oid: String,
    pub validity_period: String,
    pub renewal_period: String,
    #[serde(serialize_with = "serialize_flag_names")]
    pub certificate_name_flag: CertificateNameFlags,
    #[serde(serialize_with = "serialize_flag_names")]
    pub enrollment_flag: EnrollmentFlags,
    pub authorized_signatures_required: u32,
    pub extended_key_usage: Vec<String>,
    #[serde(rename = "Permissions")]
    pub permissions: Permissions,
    #[serde(rename = "nTSecurityDescriptor", serialize_with = "serialize_hex")]
    pub nt_security_descriptor: Vec<u8>,
    pub enrollee_supplies_subject: bool,
    pub enrollment_agent: bool,
    pub any_purpose: bool,
    pub client_authentication: bool,
    #[serde(serialize_with = "serialize_flag_names")]
    pub private_key_flag: PrivateKeyFlags,
    pub requires_manager_approval: bool,
    pub requires_key_archival: bool,
    pub application_policies: Vec<String>,
    pub schema_version: u32,
    #[serde(rename = "msPKI-Minimal-Key-Size")]
    pub minimal_key_size: u32,
    #[serde(rename = "msPKI-Certificate-Policy")]
    pub certificate_policy: Vec<String>,
    pub enabled: bool,
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    serializer.serialize_str(&hex)
}

fn required<'a>(
    values: &'a RegistryValues,
    name: &'static str,
) -> TemplateResult<&'a RegistryValue> {
    values
        .get(name)
        .ok_or(TemplateError::MissingAttribute { name })
}

fn decode<T>(attribute: &'static str, result: Result<T, DecodeError>) -> TemplateResult<T> {
    result.map_err(|source| TemplateError::Decode { attribute, source })
}

fn duration(values: &RegistryValues, name: &'static str) -> TemplateResult<String> {
    let bytes = decode(name, value_bytes(required(values, name)?))?;
    decode(name, filetime_interval_to_duration(bytes))
}

fn integer(values: &RegistryValues, name: &'static str) -> TemplateResult<u32> {
    decode(name, value_u32(required(values, name)?))
}

fn oid_list(values: &RegistryValues, name: &'static str) -> TemplateResult<Vec<String>> {
    let oids = decode(name, value_strings(required(values, name)?))?;
    Ok(resolve_oid_names(&oids))
}
