//! Rendering of decoded templates as text, JSON and CSV reports.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::analysis::EnrollmentAssessment;
use crate::cert_template::TemplateAttributes;
use crate::flags::{CertificateNameFlags, EnrollmentFlags, PrivateKeyFlags, serialize_flag_names};
use crate::security::Permissions;

pub const REPORT_ROOT: &str = "Certificate Templates";

/// Column the `:` separators of the text report are aligned to.
const TEXT_KEY_WIDTH: usize = 40;

/// One template as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateReport {
    #[serde(rename = "Template Name")]
    pub template_name: String,
    #[serde(rename = "Display Name")]
    pub display_name: String,
    #[serde(rename = "Template OID")]
    pub template_oid: String,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "Client Authentication")]
    pub client_authentication: bool,
    #[serde(rename = "Enrollment Agent")]
    pub enrollment_agent: bool,
    #[serde(rename = "Any Purpose")]
    pub any_purpose: bool,
    #[serde(rename = "Enrollee Supplies Subject")]
    pub enrollee_supplies_subject: bool,
    #[serde(rename = "Certificate Name Flag", serialize_with = "serialize_flag_names")]
    pub certificate_name_flag: CertificateNameFlags,
    #[serde(rename = "Enrollment Flag", serialize_with = "serialize_flag_names")]
    pub enrollment_flag: EnrollmentFlags,
    #[serde(rename = "Private Key Flag", serialize_with = "serialize_flag_names")]
    pub private_key_flag: PrivateKeyFlags,
    #[serde(rename = "Extended Key Usage")]
    pub extended_key_usage: Vec<String>,
    #[serde(rename = "Requires Manager Approval")]
    pub requires_manager_approval: bool,
    #[serde(rename = "Requires Key Archival")]
    pub requires_key_archival: bool,
    #[serde(rename = "RA Application Policies")]
    pub application_policies: Vec<String>,
    #[serde(rename = "Authorized Signatures Required")]
    pub authorized_signatures_required: u32,
    #[serde(rename = "Schema Version")]
    pub schema_version: u32,
    #[serde(rename = "Validity Period")]
    pub validity_period: String,
    #[serde(rename = "Renewal Period")]
    pub renewal_period: String,
    #[serde(rename = "Minimum RSA Key Length")]
    pub minimal_key_size: u32,
    #[serde(rename = "Issuance Policies")]
    pub issuance_policies: Vec<String>,
    #[serde(rename = "Permissions")]
    pub permissions: Permissions,
    #[serde(flatten)]
    pub assessment: EnrollmentAssessment,
}

impl TemplateReport {
    pub fn new(attributes: &TemplateAttributes, assessment: EnrollmentAssessment) -> Self {
        TemplateReport {
            template_name: attributes.cn.clone(),
            display_name: attributes.display_name.clone(),
            template_oid: attributes.template_oid.clone(),
            enabled: attributes.enabled,
            client_authentication: attributes.client_authentication,
            enrollment_agent: attributes.enrollment_agent,
            any_purpose: attributes.any_purpose,
            enrollee_supplies_subject: attributes.enrollee_supplies_subject,
            certificate_name_flag: attributes.certificate_name_flag,
            enrollment_flag: attributes.enrollment_flag,
            private_key_flag: attributes.private_key_flag,
            extended_key_usage: attributes.extended_key_usage.clone(),
            requires_manager_approval: attributes.requires_manager_approval,
            requires_key_archival: attributes.requires_key_archival,
            application_policies: attributes.application_policies.clone(),
            authorized_signatures_required: attributes.authorized_signatures_required,
            schema_version: attributes.schema_version,
            validity_period: attributes.validity_period.clone(),
            renewal_period: attributes.renewal_period.clone(),
            minimal_key_size: attributes.minimal_key_size,
            issuance_policies: attributes.certificate_policy.clone(),
            permissions: attributes.permissions.clone(),
            assessment,
        }
    }
}

/// `{"Certificate Templates": {"0": {...}, "1": {...}}}`
pub fn reports_to_value(reports: &[TemplateReport]) -> serde_json::Result<Value> {
    let mut templates = Map::new();
    for (i, report) in reports.iter().enumerate() {
        templates.insert(i.to_string(), serde_json::to_value(report)?);
    }

    let mut root = Map::new();
    root.insert(REPORT_ROOT.to_string(), Value::Object(templates));
    Ok(Value::Object(root))
}

pub fn render_json(reports: &[TemplateReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&reports_to_value(reports)?)
}

/// Indented `key : value` text. List values continue on the following lines,
/// aligned under their first element.
pub fn render_text(reports: &[TemplateReport]) -> serde_json::Result<String> {
    let mut out = String::new();
    if let Value::Object(root) = reports_to_value(reports)? {
        for (key, value) in &root {
            write_text_entry(&mut out, key, value, 0);
        }
    }
    Ok(out)
}

fn write_text_entry(out: &mut String, key: &str, value: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    let width = TEXT_KEY_WIDTH.saturating_sub(indent);

    match value {
        Value::Object(map) => {
            out.push_str(&format!("{}{}\n", pad, key));
            for (k, v) in map {
                write_text_entry(out, k, v, indent + 2);
            }
        }
        Value::Array(items) => {
            let mut lines = items.iter().map(scalar_text);
            out.push_str(&format!(
                "{}{:<width$}: {}\n",
                pad,
                key,
                lines.next().unwrap_or_default(),
                width = width
            ));
            let continuation = " ".repeat(indent + width + 2);
            for line in lines {
                out.push_str(&format!("{}{}\n", continuation, line));
            }
        }
        scalar => {
            out.push_str(&format!(
                "{}{:<width$}: {}\n",
                pad,
                key,
                scalar_text(scalar),
                width = width
            ));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One row per template. Lists are newline separated, nested objects are compact JSON.
pub fn render_csv(reports: &[TemplateReport]) -> serde_json::Result<String> {
    let mut out = String::new();
    let mut header_written = false;

    for report in reports {
        let Value::Object(row) = serde_json::to_value(report)? else {
            continue;
        };

        if !header_written {
            let header: Vec<String> = row.keys().map(|k| csv_field(k.as_str())).collect();
            out.push_str(&header.join(","));
            out.push_str("\r\n");
            header_written = true;
        }

        let fields: Vec<String> = row
            .values()
            .map(|value| match value {
                Value::Array(items) => {
                    let joined: Vec<String> = items.iter().map(scalar_text).collect();
                    csv_field(&joined.join("\n"))
                }
                Value::Object(_) => csv_field(&value.to_string()),
                scalar => csv_field(&scalar_text(scalar)),
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }

    Ok(out)
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
