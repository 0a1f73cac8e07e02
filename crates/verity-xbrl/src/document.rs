//! Raw filing documents.
//!
//! A [`FilingDocument`] is the unit of work for the extraction pipeline: the
//! untouched text of one XBRL instance or inline XBRL document together with
//! the filing metadata needed to cite it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata identifying where a filing document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMetadata {
    /// Central Index Key of the filer (padded or unpadded)
    pub cik: String,

    /// Company name as filed
    #[serde(default)]
    pub company_name: Option<String>,

    /// Form type (e.g., "10-K", "10-Q")
    pub form_type: String,

    /// Accession number (e.g., "0000320193-24-000123")
    pub accession_number: String,

    /// End of the reporting period covered by the filing
    #[serde(default)]
    pub period_end: Option<NaiveDate>,

    /// Date the filing was accepted by EDGAR
    #[serde(default)]
    pub filing_date: Option<NaiveDate>,

    /// Path of the document inside the filing folder (e.g., "aapl-20240928.htm")
    pub document_path: String,
}

/// An immutable raw filing document.
///
/// Cloning is cheap; the text is shared.
#[derive(Debug, Clone)]
pub struct FilingDocument {
    metadata: FilingMetadata,
    text: Arc<str>,
}

impl FilingDocument {
    /// Wraps raw filing text with its metadata.
    pub fn new(metadata: FilingMetadata, text: impl Into<Arc<str>>) -> Self {
        Self {
            metadata,
            text: text.into(),
        }
    }

    /// Filing metadata.
    pub const fn metadata(&self) -> &FilingMetadata {
        &self.metadata
    }

    /// The raw document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Central Index Key of the filer.
    pub fn cik(&self) -> &str {
        &self.metadata.cik
    }

    /// Form type of the filing.
    pub fn form_type(&self) -> &str {
        &self.metadata.form_type
    }

    /// Accession number of the filing.
    pub fn accession_number(&self) -> &str {
        &self.metadata.accession_number
    }

    /// Document path inside the filing folder.
    pub fn document_path(&self) -> &str {
        &self.metadata.document_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accessors() {
        let doc = FilingDocument::new(
            FilingMetadata {
                cik: "320193".to_string(),
                company_name: Some("Apple Inc.".to_string()),
                form_type: "10-K".to_string(),
                accession_number: "0000320193-24-000123".to_string(),
                period_end: NaiveDate::from_ymd_opt(2024, 9, 28),
                filing_date: None,
                document_path: "aapl-20240928.htm".to_string(),
            },
            "<xbrl/>",
        );

        assert_eq!(doc.cik(), "320193");
        assert_eq!(doc.form_type(), "10-K");
        assert_eq!(doc.accession_number(), "0000320193-24-000123");
        assert_eq!(doc.document_path(), "aapl-20240928.htm");
        assert_eq!(doc.text(), "<xbrl/>");

        let copy = doc.clone();
        assert_eq!(copy.metadata(), doc.metadata());
    }
}
