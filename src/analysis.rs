use log::warn;
use serde::Serialize;

use crate::cert_template::TemplateAttributes;
use crate::flags::CertificateRights;
use crate::identity::IdentityResolver;
use crate::security::{CertificateSecurity, EXTENDED_RIGHT_ALL};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrollmentAssessment {
    #[serde(rename = "Can Enroll")]
    pub can_enroll: bool,
    #[serde(rename = "Enrollable SIDs")]
    pub enrollable_sids: Vec<String>,
}

/// Consumer of decoded template attributes.
///
/// Engines only see [`TemplateAttributes`], never the registry tree they came from.
pub trait TemplateAnalysisEngine: Send + Sync {
    fn assess(&self, attributes: &TemplateAttributes) -> EnrollmentAssessment;
}

/// Decides which of the resolver's caller SIDs may enroll in a template.
///
/// A SID may enroll when an access-allowed ACE grants it Enroll, AutoEnroll, all
/// extended rights, or full control.
pub struct EnrollmentEngine<'a> {
    resolver: &'a dyn IdentityResolver,
}

impl<'a> EnrollmentEngine<'a> {
    pub fn new(resolver: &'a dyn IdentityResolver) -> Self {
        EnrollmentEngine { resolver }
    }
}

impl TemplateAnalysisEngine for EnrollmentEngine<'_> {
    fn assess(&self, attributes: &TemplateAttributes) -> EnrollmentAssessment {
        let security = match CertificateSecurity::parse(&attributes.nt_security_descriptor) {
            Ok(security) => security,
            Err(e) => {
                warn!(
                    "Template `{}` has an unreadable security descriptor: {}",
                    attributes.cn, e
                );
                return EnrollmentAssessment::default();
            }
        };

        let enrollable_sids: Vec<String> = self
            .resolver
            .list_known_sids()
            .iter()
            .filter(|sid| {
                security.rights_of(sid).is_some_and(|trustee| {
                    trustee.can_enroll()
                        || trustee.has_extended_right(EXTENDED_RIGHT_ALL)
                        || trustee.rights.contains(CertificateRights::GENERIC_ALL)
                })
            })
            .map(|sid| self.resolver.resolve(sid))
            .collect();

        EnrollmentAssessment {
            can_enroll: !enrollable_sids.is_empty(),
            enrollable_sids,
        }
    }
}
