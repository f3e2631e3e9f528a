use log::{info, warn};

use crate::cert_template::CertTemplate;
use crate::err::TemplateError;
use crate::reg_parser::{RegistryTree, RegistryValues};

#[cfg(feature = "multithreading")]
use rayon::prelude::*;

/// Where `certutil` caches the domain's templates for the local machine.
pub const DEFAULT_TEMPLATE_CACHE_ROOT: &str =
    r"HKEY_USERS\.DEFAULT\Software\Microsoft\Cryptography\CertificateTemplateCache\";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    template_root: String,
    /// 0 lets rayon pick, 1 decodes on the calling thread.
    num_threads: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        ExtractSettings {
            template_root: DEFAULT_TEMPLATE_CACHE_ROOT.to_string(),
            num_threads: 0,
        }
    }
}

impl ExtractSettings {
    pub fn new() -> Self {
        ExtractSettings::default()
    }

    /// Key prefix under which every direct child is a template. A missing trailing
    /// backslash is added.
    pub fn template_root(mut self, root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('\\') {
            root.push('\\');
        }
        self.template_root = root;
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = if cfg!(feature = "multithreading") {
            num_threads
        } else {
            1
        };
        self
    }

    pub fn get_template_root(&self) -> &str {
        &self.template_root
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }
}

/// A template key that could not be decoded.
#[derive(Debug)]
pub struct SkippedTemplate {
    pub name: String,
    pub key: String,
    pub error: TemplateError,
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub templates: Vec<CertTemplate>,
    pub skipped: Vec<SkippedTemplate>,
}

/// Decode every template cached under the configured root, in tree order.
///
/// A template that fails to decode is logged and reported in
/// [`ExtractReport::skipped`]; it never stops its siblings from being decoded.
pub fn extract_templates(tree: &RegistryTree, settings: &ExtractSettings) -> ExtractReport {
    let root = settings.get_template_root();
    let keys: Vec<(&str, &RegistryValues)> = tree
        .keys_with_prefix(root)
        .filter(|(path, _)| path.len() > root.len())
        .collect();

    let results = build_all(&keys, settings.get_num_threads());

    let mut report = ExtractReport::default();
    for ((key, _), (name, result)) in keys.iter().zip(results) {
        match result {
            Ok(template) => report.templates.push(template),
            Err(error) => {
                warn!("Skipping template `{}`: {}", name, error_chain(&error));
                report.skipped.push(SkippedTemplate {
                    name,
                    key: (*key).to_string(),
                    error,
                });
            }
        }
    }

    info!(
        "Found {} templates in the registry ({} skipped)",
        report.templates.len(),
        report.skipped.len()
    );
    report
}

type BuildResult = (String, Result<CertTemplate, TemplateError>);

fn build_one(key: &str, values: &RegistryValues) -> BuildResult {
    let name = key.rsplit('\\').next().unwrap_or(key).to_string();
    let result = CertTemplate::build(name.clone(), values);
    (name, result)
}

#[cfg(feature = "multithreading")]
fn build_all(keys: &[(&str, &RegistryValues)], num_threads: usize) -> Vec<BuildResult> {
    if num_threads == 1 {
        return keys.iter().map(|(key, values)| build_one(key, values)).collect();
    }

    let build = || -> Vec<BuildResult> {
        keys.par_iter()
            .map(|(key, values)| build_one(key, values))
            .collect()
    };

    if num_threads == 0 {
        return build();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(num_threads).build() {
        Ok(pool) => pool.install(build),
        Err(e) => {
            warn!(
                "Failed to start a pool of {} threads ({}), using the global pool",
                num_threads, e
            );
            build()
        }
    }
}

#[cfg(not(feature = "multithreading"))]
fn build_all(keys: &[(&str, &RegistryValues)], _num_threads: usize) -> Vec<BuildResult> {
    keys.iter().map(|(key, values)| build_one(key, values)).collect()
}

/// `error: cause: cause` on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
