#![deny(unused_must_use)]
#![forbid(unsafe_code)]
#![allow(clippy::upper_case_acronyms)]

pub use analysis::{EnrollmentAssessment, EnrollmentEngine, TemplateAnalysisEngine};
pub use cert_template::{CertTemplate, TemplateAttributes};
pub use decode::{
    decode_multistring, decode_utf16_text, encode_multistring, filetime_interval_to_duration,
    resolve_oid_names,
};
pub use extract::{
    DEFAULT_TEMPLATE_CACHE_ROOT, ExtractReport, ExtractSettings, SkippedTemplate,
    extract_templates,
};
pub use flags::{
    CertificateNameFlags, CertificateRights, EnrollmentFlags, FlagDomain, PrivateKeyFlags,
    TemplateFlags, decode_bitset,
};
pub use identity::{IdentityResolver, SidTable};
pub use ntsid::Sid;
pub use output::{TemplateReport, render_csv, render_json, render_text};
pub use reg_parser::{
    ParserSettings, RegistryExportParser, RegistryTree, RegistryValue, RegistryValues,
};
pub use security::{CertificateSecurity, Permissions, SecurityDescriptor, build_permissions};

pub mod analysis;
pub mod cert_template;
pub mod decode;
pub mod err;
pub mod extract;
pub mod flags;
pub mod identity;
pub mod ntsid;
pub mod output;
pub mod reg_parser;
pub mod security;

mod utils;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

