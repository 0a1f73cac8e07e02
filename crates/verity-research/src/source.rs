//! Filing sources.
//!
//! A [`FilingSource`] supplies raw filing documents to the tools. Sources are
//! the only async part of the system; everything after a document is in hand
//! is synchronous and pure.

use crate::catalog::{Catalog, CompanyRecord, FilingRecord};
use crate::error::{ProviderError, ResearchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use verity_xbrl::FilingDocument;
use verity_xbrl::reference::{normalize_accession, normalize_cik};

/// Supplies raw filing documents.
pub trait FilingSource: Send + Sync {
    /// Fetch the primary document of a filing.
    fn fetch_filing(
        &self,
        cik: &str,
        form_type: &str,
        accession: &str,
    ) -> impl Future<Output = std::result::Result<FilingDocument, ProviderError>> + Send;
}

/// A filing entry in a manifest: the catalog record plus the document file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFiling {
    /// Filing record
    #[serde(flatten)]
    pub record: FilingRecord,
    /// Document file, relative to the manifest
    pub path: PathBuf,
}

/// A JSON manifest describing local filings.
///
/// ```json
/// {
///   "companies": [{ "cik": "320193", "name": "Apple Inc.", "tickers": ["AAPL"] }],
///   "filings": [{
///     "cik": "320193", "company": "Apple Inc.", "form_type": "10-K",
///     "accession_number": "0000320193-24-000123", "filing_date": "2024-11-01",
///     "period_of_report": "2024-09-28", "primary_document": "aapl-20240928.htm",
///     "path": "filings/aapl-20240928.htm"
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Companies
    #[serde(default)]
    pub companies: Vec<CompanyRecord>,
    /// Filings with their document files
    #[serde(default)]
    pub filings: Vec<ManifestFiling>,
}

impl Manifest {
    /// Build a search catalog from the manifest.
    pub fn catalog(&self) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        for company in &self.companies {
            catalog.add_company(company.clone())?;
        }
        for filing in &self.filings {
            catalog.add_filing(filing.record.clone())?;
        }
        Ok(catalog)
    }
}

fn rejected(err: impl ToString) -> ProviderError {
    ProviderError::Rejected(err.to_string())
}

/// Check a stored filing against what the caller asked for.
fn check_filer(
    record_cik: &str,
    record_form: &str,
    cik: &str,
    form_type: &str,
    accession: &str,
) -> std::result::Result<(), ProviderError> {
    let requested = normalize_cik(cik).map_err(rejected)?;
    let stored = normalize_cik(record_cik).map_err(rejected)?;
    if requested != stored || !record_form.trim().eq_ignore_ascii_case(form_type.trim()) {
        return Err(ProviderError::NotFound(format!(
            "{} filing {} for CIK {}",
            form_type, accession, cik
        )));
    }
    Ok(())
}

/// Reads filings from local files listed in a [`Manifest`].
#[derive(Debug, Clone)]
pub struct LocalFilingSource {
    manifest: Manifest,
    files: HashMap<String, (FilingRecord, PathBuf)>,
}

impl LocalFilingSource {
    /// Load a manifest file. Relative document paths resolve against its directory.
    pub async fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let manifest: Manifest = serde_json::from_str(&json)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let source = Self::new(manifest, root)?;
        info!(
            manifest = %path.display(),
            companies = source.manifest.companies.len(),
            filings = source.files.len(),
            "Loaded filing manifest"
        );
        Ok(source)
    }

    /// Use an in-memory manifest with document paths relative to `root`.
    pub fn new(manifest: Manifest, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut files = HashMap::new();
        for filing in &manifest.filings {
            let accession = normalize_accession(&filing.record.accession_number)?;
            let path = if filing.path.is_relative() {
                root.join(&filing.path)
            } else {
                filing.path.clone()
            };
            if files
                .insert(accession.clone(), (filing.record.clone(), path))
                .is_some()
            {
                return Err(ResearchError::Config(format!(
                    "duplicate filing {} in manifest",
                    accession
                )));
            }
        }
        Ok(Self { manifest, files })
    }

    /// The manifest.
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Build a search catalog of the manifest's companies and filings.
    pub fn catalog(&self) -> Result<Catalog> {
        self.manifest.catalog()
    }
}

impl FilingSource for LocalFilingSource {
    async fn fetch_filing(
        &self,
        cik: &str,
        form_type: &str,
        accession: &str,
    ) -> std::result::Result<FilingDocument, ProviderError> {
        let key = normalize_accession(accession).map_err(rejected)?;
        let (record, path) = self
            .files
            .get(&key)
            .ok_or_else(|| ProviderError::NotFound(format!("filing {}", key)))?;
        check_filer(&record.cik, &record.form_type, cik, form_type, &key)?;

        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotFound(format!("{}: {}", path.display(), e))
            } else {
                ProviderError::Unavailable(format!("{}: {}", path.display(), e))
            }
        })?;

        debug!(accession = %key, bytes = text.len(), "Read filing document");
        Ok(FilingDocument::new(record.metadata(), text))
    }
}

/// Serves documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilingSource {
    documents: HashMap<String, FilingDocument>,
}

impl MemoryFilingSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, keyed by its accession number.
    pub fn insert(&mut self, document: FilingDocument) -> Result<()> {
        let accession = normalize_accession(document.accession_number())?;
        self.documents.insert(accession, document);
        Ok(())
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the source holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FilingSource for MemoryFilingSource {
    async fn fetch_filing(
        &self,
        cik: &str,
        form_type: &str,
        accession: &str,
    ) -> std::result::Result<FilingDocument, ProviderError> {
        let key = normalize_accession(accession).map_err(rejected)?;
        let document = self
            .documents
            .get(&key)
            .ok_or_else(|| ProviderError::NotFound(format!("filing {}", key)))?;
        check_filer(document.cik(), document.form_type(), cik, form_type, &key)?;
        Ok(document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_xbrl::FilingMetadata;

    fn document() -> FilingDocument {
        FilingDocument::new(
            FilingMetadata {
                cik: "0000320193".to_string(),
                company_name: Some("Apple Inc.".to_string()),
                form_type: "10-K".to_string(),
                accession_number: "0000320193-24-000123".to_string(),
                period_end: None,
                filing_date: None,
                document_path: "aapl-20240928.htm".to_string(),
            },
            "<xbrl/>",
        )
    }

    #[tokio::test]
    async fn test_memory_source() {
        let mut source = MemoryFilingSource::new();
        source.insert(document()).unwrap();
        assert_eq!(source.len(), 1);

        let doc = source
            .fetch_filing("320193", "10-k", "000032019324000123")
            .await
            .unwrap();
        assert_eq!(doc.text(), "<xbrl/>");

        let wrong_form = source
            .fetch_filing("320193", "10-Q", "0000320193-24-000123")
            .await;
        assert!(matches!(wrong_form, Err(ProviderError::NotFound(_))));

        let missing = source
            .fetch_filing("320193", "10-K", "0000320193-24-000999")
            .await;
        assert!(matches!(missing, Err(ProviderError::NotFound(_))));

        let malformed = source.fetch_filing("320193", "10-K", "nope").await;
        assert!(matches!(malformed, Err(ProviderError::Rejected(_))));
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "companies": [{"cik": "320193", "name": "Apple Inc.", "tickers": ["AAPL"]}],
                "filings": [{
                    "cik": "320193", "company": "Apple Inc.", "form_type": "10-K",
                    "accession_number": "0000320193-24-000123", "filing_date": "2024-11-01",
                    "period_of_report": "2024-09-28", "primary_document": "aapl-20240928.htm",
                    "path": "aapl.xml"
                }]
            }"#,
        )
        .unwrap();

        let source = LocalFilingSource::new(manifest, "/data/filings").unwrap();
        let catalog = source.catalog().unwrap();
        assert_eq!(catalog.companies().count(), 1);
        assert_eq!(
            catalog.filing("0000320193-24-000123").unwrap().primary_document,
            "aapl-20240928.htm"
        );
        assert_eq!(
            source.files["0000320193-24-000123"].1,
            PathBuf::from("/data/filings/aapl.xml")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_provider_error() {
        let manifest = Manifest {
            companies: Vec::new(),
            filings: vec![ManifestFiling {
                record: FilingRecord {
                    cik: "320193".to_string(),
                    company: "Apple Inc.".to_string(),
                    form_type: "10-K".to_string(),
                    accession_number: "0000320193-24-000123".to_string(),
                    filing_date: chrono::NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
                    period_of_report: None,
                    primary_document: "aapl-20240928.htm".to_string(),
                },
                path: PathBuf::from("does-not-exist.xml"),
            }],
        };
        let source = LocalFilingSource::new(manifest, "/nonexistent").unwrap();
        let result = source
            .fetch_filing("320193", "10-K", "0000320193-24-000123")
            .await;
        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }
}
