//! Mapping of SIDs to display names, and the set of SIDs the analysis runs as.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::err::{RegCertError, Result};
use crate::ntsid::Sid;

/// Resolves trustees to display names and lists the SIDs of the caller being assessed.
pub trait IdentityResolver: Send + Sync {
    fn lookup(&self, sid: &str) -> Option<String>;

    /// The display name of `sid`, or the SID itself when it is not known.
    fn resolve(&self, sid: &str) -> String {
        self.lookup(sid).unwrap_or_else(|| sid.to_string())
    }

    /// SIDs of the user (and their groups) enrollment is assessed for.
    fn list_known_sids(&self) -> Vec<String>;
}

static WELL_KNOWN_SIDS: &[(&str, &str)] = &[
    ("S-1-0-0", "Nobody"),
    ("S-1-1-0", "Everyone"),
    ("S-1-3-0", "Creator Owner"),
    ("S-1-3-1", "Creator Group"),
    ("S-1-5-2", "Network"),
    ("S-1-5-4", "Interactive"),
    ("S-1-5-7", "Anonymous Logon"),
    ("S-1-5-9", "Enterprise Domain Controllers"),
    ("S-1-5-10", "Principal Self"),
    ("S-1-5-11", "Authenticated Users"),
    ("S-1-5-18", "Local System"),
    ("S-1-5-19", "Local Service"),
    ("S-1-5-20", "Network Service"),
    ("S-1-5-32-544", "Administrators"),
    ("S-1-5-32-545", "Users"),
    ("S-1-5-32-546", "Guests"),
    ("S-1-5-32-548", "Account Operators"),
    ("S-1-5-32-549", "Server Operators"),
    ("S-1-5-32-550", "Print Operators"),
    ("S-1-5-32-551", "Backup Operators"),
    ("S-1-5-32-554", "Pre-Windows 2000 Compatible Access"),
    ("S-1-5-32-560", "Windows Authorization Access Group"),
    ("S-1-5-32-574", "Certificate Service DCOM Access"),
];

/// Relative identifiers with a fixed meaning inside any `S-1-5-21-*` domain.
static DOMAIN_RIDS: &[(u32, &str)] = &[
    (500, "Administrator"),
    (501, "Guest"),
    (502, "KRBTGT"),
    (512, "Domain Admins"),
    (513, "Domain Users"),
    (514, "Domain Guests"),
    (515, "Domain Computers"),
    (516, "Domain Controllers"),
    (517, "Cert Publishers"),
    (518, "Schema Admins"),
    (519, "Enterprise Admins"),
    (520, "Group Policy Creator Owners"),
    (521, "Read-only Domain Controllers"),
    (526, "Key Admins"),
    (527, "Enterprise Key Admins"),
    (553, "RAS and IAS Servers"),
];

const DOMAIN_SID_PREFIX: &str = "S-1-5-21-";

/// Static SID table: well-known SIDs, well-known domain RIDs, and caller supplied names.
#[derive(Debug, Clone, Default)]
pub struct SidTable {
    names: IndexMap<String, String>,
    user_sids: Vec<String>,
}

impl SidTable {
    pub fn new() -> Self {
        SidTable::default()
    }

    /// Load the caller's SIDs, one per line. Blank lines and `#` comments are ignored.
    pub fn from_sid_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| RegCertError::FailedToOpenFile {
            source: e,
            path: path.to_path_buf(),
        })?;

        let sids = parse_sid_list(&text);
        debug!("Loaded {} SIDs from {}", sids.len(), path.display());
        Ok(SidTable::new().with_user_sids(sids))
    }

    pub fn with_user_sids<I, S>(mut self, sids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_sids = sids.into_iter().map(Into::into).collect();
        self
    }

    /// Add a display name for a SID, overriding the built-in tables.
    pub fn with_name(mut self, sid: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(sid.into(), name.into());
        self
    }
}

impl IdentityResolver for SidTable {
    fn lookup(&self, sid: &str) -> Option<String> {
        if let Some(name) = self.names.get(sid) {
            return Some(name.clone());
        }

        if let Some((_, name)) = WELL_KNOWN_SIDS.iter().find(|(known, _)| *known == sid) {
            return Some((*name).to_string());
        }

        domain_rid_name(sid).map(str::to_string)
    }

    fn list_known_sids(&self) -> Vec<String> {
        self.user_sids.clone()
    }
}

fn domain_rid_name(sid: &str) -> Option<&'static str> {
    if !sid.starts_with(DOMAIN_SID_PREFIX) {
        return None;
    }

    let rid: u32 = sid.rsplit('-').next()?.parse().ok()?;
    DOMAIN_RIDS
        .iter()
        .find(|(known, _)| *known == rid)
        .map(|(_, name)| *name)
}

fn parse_sid_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match Sid::parse_str(line) {
            Some(sid) => Some(sid.to_string()),
            None => {
                warn!("Ignoring malformed SID `{}`", line);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolves_well_known_and_domain_sids() {
        let table = SidTable::new();
        assert_eq!(table.resolve("S-1-5-11"), "Authenticated Users");
        assert_eq!(
            table.resolve("S-1-5-21-3623811015-3361044348-30300820-513"),
            "Domain Users"
        );
        assert_eq!(
            table.resolve("S-1-5-21-3623811015-3361044348-30300820-1104"),
            "S-1-5-21-3623811015-3361044348-30300820-1104"
        );
        assert_eq!(table.lookup("S-1-5-32-999"), None);
    }

    #[test]
    fn test_custom_names_take_precedence() {
        let table = SidTable::new().with_name("S-1-5-11", "Authenticated");
        assert_eq!(table.resolve("S-1-5-11"), "Authenticated");
    }

    #[test]
    fn test_sid_list_skips_comments_and_garbage() {
        let sids = parse_sid_list("# user\r\nS-1-5-21-1-2-3-1104\r\n\r\nnot a sid\r\nS-1-1-0\r\n");
        assert_eq!(sids, vec!["S-1-5-21-1-2-3-1104", "S-1-1-0"]);
    }
}
