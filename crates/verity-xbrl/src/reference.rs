//! Source references to documents on EDGAR.
//!
//! Every fact leaves the pipeline pointing at the exact filing document it
//! came from. URLs follow the EDGAR archive layout:
//!
//! ```text
//! https://www.sec.gov/Archives/edgar/data/{cik}/{accession without dashes}/{document}
//! ```
//!
//! where `cik` carries no leading zeros.

use crate::document::FilingMetadata;
use crate::error::{Result, XbrlError};
use crate::extract::ExtractedFact;
use crate::fact::{FinancialFact, SourceReference};

/// Root of the EDGAR document archive.
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

/// Validate a CIK and return it without leading zeros.
pub fn normalize_cik(cik: &str) -> Result<String> {
    let cik = cik.trim();
    if cik.is_empty() || cik.len() > 10 || !cik.bytes().all(|b| b.is_ascii_digit()) {
        return Err(XbrlError::Reference(format!("invalid CIK `{}`", cik)));
    }

    let unpadded = cik.trim_start_matches('0');
    if unpadded.is_empty() {
        return Err(XbrlError::Reference(format!("invalid CIK `{}`", cik)));
    }
    Ok(unpadded.to_string())
}

/// Validate an accession number and return it in dashed form.
///
/// Accepts `0000320193-24-000123` and `000032019324000123`.
pub fn normalize_accession(accession: &str) -> Result<String> {
    let accession = accession.trim();
    let digits: String = accession.chars().filter(|c| *c != '-').collect();

    let dashed_ok = accession.len() == 20
        && accession.as_bytes().get(10) == Some(&b'-')
        && accession.as_bytes().get(13) == Some(&b'-');
    let plain_ok = accession.len() == 18;

    if digits.len() != 18
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || !(dashed_ok || plain_ok)
    {
        return Err(XbrlError::Reference(format!(
            "invalid accession number `{}`",
            accession
        )));
    }

    Ok(format!("{}-{}-{}", &digits[..10], &digits[10..12], &digits[12..]))
}

/// URL of the EDGAR index page of a filing.
pub fn filing_index_url(cik: &str, accession: &str) -> Result<String> {
    let cik = normalize_cik(cik)?;
    let accession = normalize_accession(accession)?;
    Ok(format!(
        "{}/{}/{}/{}-index.htm",
        EDGAR_ARCHIVES_URL,
        cik,
        accession.replace('-', ""),
        accession
    ))
}

fn validate_document_path(path: &str) -> Result<String> {
    let path = path.trim();
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains("://")
        || path.chars().any(char::is_whitespace)
        || path.split('/').any(|segment| segment.is_empty() || segment == "..");

    if invalid {
        return Err(XbrlError::Reference(format!(
            "invalid document path `{}`",
            path
        )));
    }
    Ok(path.to_string())
}

/// Attaches source references to the facts of one filing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAnnotator {
    cik: String,
    accession: String,
    form_type: String,
    document_path: String,
}

impl ReferenceAnnotator {
    /// Validate the metadata of a filing document.
    ///
    /// Fails with [`XbrlError::Reference`] when any part of the document URL
    /// cannot be derived, so no fact is ever produced without a reference.
    pub fn new(metadata: &FilingMetadata) -> Result<Self> {
        let form_type = metadata.form_type.trim();
        if form_type.is_empty() {
            return Err(XbrlError::Reference("missing form type".to_string()));
        }

        Ok(Self {
            cik: normalize_cik(&metadata.cik)?,
            accession: normalize_accession(&metadata.accession_number)?,
            form_type: form_type.to_string(),
            document_path: validate_document_path(&metadata.document_path)?,
        })
    }

    /// Accession number in dashed form.
    pub fn accession_number(&self) -> &str {
        &self.accession
    }

    /// URL of the filing folder.
    pub fn folder_url(&self) -> String {
        format!(
            "{}/{}/{}",
            EDGAR_ARCHIVES_URL,
            self.cik,
            self.accession.replace('-', "")
        )
    }

    /// URL of the source document.
    pub fn document_url(&self) -> String {
        format!("{}/{}", self.folder_url(), self.document_path)
    }

    /// URL of the filing index page.
    pub fn index_url(&self) -> String {
        format!("{}/{}-index.htm", self.folder_url(), self.accession)
    }

    /// Reference to the document, optionally pointing at an element id.
    pub fn reference(&self, anchor: Option<&str>) -> SourceReference {
        let anchor = anchor
            .map(str::trim)
            .filter(|a| !a.is_empty() && !a.chars().any(char::is_whitespace));

        let url = match anchor {
            Some(id) => format!("{}#{}", self.document_url(), id),
            None => self.document_url(),
        };

        SourceReference {
            url,
            accession_number: self.accession.clone(),
            form_type: self.form_type.clone(),
            document_path: self.document_path.clone(),
            anchor: anchor.map(str::to_string),
        }
    }

    /// Turn an extracted fact into a referenced financial fact.
    pub fn annotate(&self, fact: ExtractedFact) -> FinancialFact {
        let source = self.reference(fact.element_id.as_deref());
        FinancialFact {
            concept: fact.concept,
            tag: fact.tag,
            value: fact.value,
            raw_value: fact.raw_value,
            unit: fact.unit,
            period: fact.period,
            decimals: fact.decimals,
            scale: fact.scale,
            dimensions: fact.dimensions,
            context_id: fact.context_id,
            form_type: self.form_type.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn metadata(cik: &str, accession: &str, path: &str) -> FilingMetadata {
        FilingMetadata {
            cik: cik.to_string(),
            company_name: None,
            form_type: "10-K".to_string(),
            accession_number: accession.to_string(),
            period_end: None,
            filing_date: None,
            document_path: path.to_string(),
        }
    }

    #[test]
    fn test_document_and_index_urls() {
        let annotator = ReferenceAnnotator::new(&metadata(
            "0000320193",
            "0000320193-24-000123",
            "aapl-20240928.htm",
        ))
        .unwrap();

        assert_eq!(
            annotator.document_url(),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/aapl-20240928.htm"
        );
        assert_eq!(
            annotator.index_url(),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/0000320193-24-000123-index.htm"
        );
    }

    #[test]
    fn test_reference_with_anchor() {
        let annotator =
            ReferenceAnnotator::new(&metadata("320193", "000032019324000123", "aapl-20240928.htm"))
                .unwrap();
        let reference = annotator.reference(Some("f-42"));

        assert!(reference.url.ends_with("aapl-20240928.htm#f-42"));
        assert_eq!(reference.accession_number, "0000320193-24-000123");
        assert_eq!(reference.anchor.as_deref(), Some("f-42"));

        let reference = annotator.reference(Some("has space"));
        assert!(reference.url.ends_with(".htm"));
        assert_eq!(reference.anchor, None);
    }

    #[rstest]
    #[case("", "0000320193-24-000123", "a.htm")]
    #[case("00000000000320193", "0000320193-24-000123", "a.htm")]
    #[case("0000000000", "0000320193-24-000123", "a.htm")]
    #[case("AAPL", "0000320193-24-000123", "a.htm")]
    #[case("320193", "0000320193-24-00012", "a.htm")]
    #[case("320193", "00003201-9324-000123", "a.htm")]
    #[case("320193", "", "a.htm")]
    #[case("320193", "0000320193-24-000123", "")]
    #[case("320193", "0000320193-24-000123", "../secret.htm")]
    #[case("320193", "0000320193-24-000123", "/abs.htm")]
    #[case("320193", "0000320193-24-000123", "my file.htm")]
    fn test_invalid_metadata_is_rejected(
        #[case] cik: &str,
        #[case] accession: &str,
        #[case] path: &str,
    ) {
        let result = ReferenceAnnotator::new(&metadata(cik, accession, path));
        assert!(matches!(result, Err(XbrlError::Reference(_))));
    }

    #[test]
    fn test_filing_index_url() {
        assert_eq!(
            filing_index_url("789019", "0000950170-24-087843").unwrap(),
            "https://www.sec.gov/Archives/edgar/data/789019/000095017024087843/0000950170-24-087843-index.htm"
        );
        assert!(filing_index_url("789019", "bogus").is_err());
    }
}
