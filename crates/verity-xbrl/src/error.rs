//! Error types for XBRL extraction.

use thiserror::Error;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, XbrlError>;

/// Longest slice of source text carried in an extraction error.
const MAX_RAW_LEN: usize = 512;

/// Errors that can occur while extracting facts from a filing.
#[derive(Debug, Error)]
pub enum XbrlError {
    /// A tagged value is absent, non-numeric or cannot be tied to a context or unit
    #[error("Extraction error: {reason} in `{raw}`")]
    Extraction {
        /// What went wrong
        reason: String,
        /// The offending tag text from the source document
        raw: String,
    },

    /// A fact or filing has no derivable source URL
    #[error("Reference error: {0}")]
    Reference(String),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// A match rule failed to compile
    #[error("Invalid match rule `{rule}`: {reason}")]
    InvalidRule {
        /// Concept the rule was declared for
        rule: String,
        /// Reason the rule was rejected
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XbrlError {
    /// Build an extraction error, truncating very large tag text.
    pub fn extraction(reason: impl Into<String>, raw: &str) -> Self {
        let raw = match raw.char_indices().nth(MAX_RAW_LEN) {
            Some((cut, _)) => format!("{}...", &raw[..cut]),
            None => raw.to_string(),
        };
        Self::Extraction {
            reason: reason.into(),
            raw,
        }
    }
}

impl From<quick_xml::Error> for XbrlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}
