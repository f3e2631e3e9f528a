use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegCertError>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type SecurityDescriptorResult<T> = std::result::Result<T, SecurityDescriptorError>;
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Top level error returned when loading an export.
#[derive(Debug, Error)]
pub enum RegCertError {
    #[error("Failed to open file {}", path.display())]
    FailedToOpenFile {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    #[error("Failed to parse {}", path.display())]
    Parse {
        #[source]
        source: ParseError,
        path: PathBuf,
    },
}

/// Malformed export syntax. Every variant carries the 1-based line number
/// of the logical line that failed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: key path is missing its closing `]`: `{text}`")]
    UnterminatedKey { line: usize, text: String },

    #[error("line {line}: value appears before any key: `{text}`")]
    ValueOutsideKey { line: usize, text: String },

    #[error("line {line}: unrecognized value type tag `{tag}`")]
    UnknownTypeTag { line: usize, tag: String },

    #[error("line {line}: malformed {what}: `{text}`")]
    Malformed {
        line: usize,
        what: &'static str,
        text: String,
    },

    #[error("export text is not valid {encoding}")]
    InvalidEncoding { encoding: &'static str },
}

impl ParseError {
    /// Line of the export the error points at. Encoding errors have no line.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::UnterminatedKey { line, .. }
            | ParseError::ValueOutsideKey { line, .. }
            | ParseError::UnknownTypeTag { line, .. }
            | ParseError::Malformed { line, .. } => Some(*line),
            ParseError::InvalidEncoding { .. } => None,
        }
    }

    pub(crate) fn malformed(line: usize, what: &'static str, text: impl Into<String>) -> Self {
        ParseError::Malformed {
            line,
            what,
            text: text.into(),
        }
    }
}

/// Malformed value payloads (FILETIME, UTF-16, integers).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("FILETIME interval must be 8 bytes, got {len}")]
    InvalidFiletimeLength { len: usize },

    #[error("UTF-16 payload has odd length {len}")]
    OddUtf16Length { len: usize },

    #[error("UTF-16 payload contains an unpaired surrogate")]
    InvalidUtf16,

    #[error("expected {expected} value, found {found}")]
    UnexpectedValueType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{text}` is not a valid integer")]
    InvalidInteger { text: String },
}

/// Truncated or self-inconsistent binary security descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityDescriptorError {
    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("offset {offset} out of bounds for {what} (len={len})")]
    OffsetOutOfBounds {
        what: &'static str,
        offset: u32,
        len: usize,
    },

    #[error("ACE at offset {offset} declares invalid size {size}")]
    InvalidAceSize { offset: usize, size: u16 },

    #[error("ACL at offset {offset} declares {count} ACEs but only {parsed} fit in {size} bytes")]
    AceCountOverflow {
        offset: usize,
        count: u16,
        parsed: u16,
        size: u16,
    },

    #[error("unsupported security descriptor revision {revision}")]
    UnsupportedRevision { revision: u8 },

    #[error("security descriptor has no owner")]
    MissingOwner,
}

/// Failure to decode a single certificate template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("required attribute `{name}` is missing")]
    MissingAttribute { name: &'static str },

    #[error("failed to decode attribute `{attribute}`")]
    Decode {
        attribute: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("failed to parse the `Security` descriptor")]
    SecurityDescriptor(#[from] SecurityDescriptorError),
}
