//! Search and fetch tools.
//!
//! Two-phase protocol: [`ResearchTools::search`] scores the catalog against a
//! query and hands out an [`ObjectHandle`] per result; [`ResearchTools::fetch`]
//! resolves a handle back to the full record. Filings can be pulled from the
//! filing source and run through the extraction pipeline, and the facts found
//! become searchable themselves.

use crate::catalog::{Catalog, FactRecord, FilingRecord};
use crate::config::ToolsConfig;
use crate::error::{ResearchError, Result};
use crate::registry::{EntityKind, EntityRef, ObjectHandle, ObjectRegistry};
use crate::scoring::{Scored, filing_relevance, relevance, top_k};
use crate::source::FilingSource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use verity_xbrl::{Extractor, FilingDocument, FinancialFact, FinancialStatements};

/// Search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Results to return; the configured default when absent
    pub top_k: Option<usize>,
    /// Kinds to search; all kinds when empty
    pub kinds: Vec<EntityKind>,
    /// Only filings (and their facts) filed this many days before `as_of`
    pub filed_within_days: Option<u32>,
    /// Reference date for the window; today when absent
    pub as_of: Option<NaiveDate>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Handle to pass to fetch
    pub object_id: ObjectHandle,
    /// Kind of object
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Display title
    pub title: String,
    /// One-line description
    pub summary: String,
    /// Relevance in [0, 1]
    pub score: f64,
    /// SEC URL backing the result
    pub source_url: String,
    /// Form type of the underlying filing
    pub form_type: Option<String>,
    /// Fiscal period of the underlying filing or fact
    pub fiscal_period: Option<String>,
    /// Natural key (CIK, accession number, fact key)
    pub natural_key: String,
}

/// Search output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// The query as given
    pub query: String,
    /// Ranked results
    pub results: Vec<SearchResult>,
    /// Candidates with a non-zero score
    pub total_found: usize,
    /// Results returned
    pub returned: usize,
    /// Kinds that were searched
    pub kinds_searched: Vec<EntityKind>,
}

/// Full company record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyPayload {
    /// Handle
    pub object_id: ObjectHandle,
    /// Central Index Key
    pub cik: String,
    /// Registrant name
    pub name: String,
    /// Exchange tickers
    pub tickers: Vec<String>,
    /// SIC code
    pub sic: Option<String>,
    /// SIC description
    pub sic_description: Option<String>,
    /// Listing exchange
    pub exchange: Option<String>,
    /// State of incorporation
    pub state: Option<String>,
    /// Fiscal year end (MMDD)
    pub fiscal_year_end: Option<String>,
    /// Accession number of the most recent cataloged filing
    pub latest_filing: String,
    /// Index URL of the most recent cataloged filing
    pub source_url: String,
    /// Form type of the most recent cataloged filing
    pub form_type: String,
    /// Fiscal period of the most recent cataloged filing
    pub fiscal_period: Option<String>,
}

/// Full filing record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingPayload {
    /// Handle
    pub object_id: ObjectHandle,
    /// Central Index Key of the filer
    pub cik: String,
    /// Company name
    pub company: String,
    /// Accession number
    pub accession_number: String,
    /// Form type
    pub form_type: String,
    /// Filing date
    pub filing_date: NaiveDate,
    /// Period of report
    pub period_of_report: Option<NaiveDate>,
    /// Fiscal period label
    pub fiscal_period: Option<String>,
    /// Primary document
    pub primary_document: String,
    /// EDGAR filing index URL
    pub source_url: String,
    /// Primary document content, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Whether the content was cut at the configured limit
    pub content_truncated: bool,
}

/// Full fact record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactPayload {
    /// Handle
    pub object_id: ObjectHandle,
    /// Company name
    pub company: String,
    /// Source URL of the fact
    pub source_url: String,
    /// Form type of the source filing
    pub form_type: String,
    /// Reporting period of the fact
    pub fiscal_period: String,
    /// The fact
    pub fact: FinancialFact,
}

/// A fetched object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityPayload {
    /// Company
    Company(CompanyPayload),
    /// Filing
    Filing(FilingPayload),
    /// Fact
    Fact(FactPayload),
}

/// A handle that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// The handle as given
    pub object_id: ObjectHandle,
    /// Error kind (e.g., "unknown_handle")
    pub kind: String,
    /// Error message
    pub error: String,
}

/// Output of a multi-handle fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResponse {
    /// Fetched objects, in request order
    pub results: Vec<EntityPayload>,
    /// Handles that failed, in request order
    pub errors: Vec<FetchFailure>,
    /// Number fetched
    pub fetched: usize,
    /// Number failed
    pub failed: usize,
}

/// Outcome of extracting every cataloged filing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    /// Filings extracted
    pub filings: usize,
    /// Facts added to the catalog
    pub facts: usize,
    /// Filings that failed to fetch or extract
    pub failed: usize,
}

#[derive(Debug)]
struct Hit {
    title: String,
    summary: String,
    source_url: String,
    form_type: Option<String>,
    fiscal_period: Option<String>,
}

/// The research tool surface over a catalog and a filing source.
#[derive(Debug)]
pub struct ResearchTools<S> {
    config: ToolsConfig,
    extractor: Extractor,
    registry: Arc<ObjectRegistry>,
    catalog: RwLock<Catalog>,
    source: S,
}

impl<S: FilingSource> ResearchTools<S> {
    /// Create the tools with a fresh registry.
    pub fn new(config: ToolsConfig, catalog: Catalog, source: S) -> Result<Self> {
        let registry = Arc::new(ObjectRegistry::new(config.registry));
        Self::with_registry(config, catalog, source, registry)
    }

    /// Create the tools around an existing registry.
    pub fn with_registry(
        config: ToolsConfig,
        catalog: Catalog,
        source: S,
        registry: Arc<ObjectRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = Extractor::new(config.rule_set()?);
        Ok(Self {
            config,
            extractor,
            registry,
            catalog: RwLock::new(catalog),
            source,
        })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &ToolsConfig {
        &self.config
    }

    /// The handle registry.
    pub const fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// The filing source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Extract and assemble the statements of a document.
    pub fn extract_statements(&self, document: &FilingDocument) -> Result<FinancialStatements> {
        Ok(self.extractor.extract_statements(document)?)
    }

    /// Extract every value of one concept from a document.
    pub fn extract_concept(
        &self,
        document: &FilingDocument,
        concept: &str,
    ) -> Result<Vec<FinancialFact>> {
        Ok(self.extractor.extract_concept(document, concept)?)
    }

    /// Score the catalog against a query and register the top results.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let k = options.top_k.unwrap_or(self.config.default_top_k);
        let mut kinds = if options.kinds.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            options.kinds.clone()
        };
        kinds.sort_unstable();
        kinds.dedup();

        let window = options.filed_within_days.or(self.config.filed_within_days);
        let as_of = options
            .as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let mut candidates: Vec<Scored<Hit>> = Vec::new();
        {
            let catalog = self.catalog()?;

            if kinds.contains(&EntityKind::Company) {
                for company in catalog.companies() {
                    let Some(latest) = catalog.latest_filing(&company.cik) else {
                        continue;
                    };
                    let score = relevance(query, &company.search_text());
                    if score > 0.0 {
                        candidates.push(Scored {
                            score,
                            kind: EntityKind::Company,
                            key: company.cik.clone(),
                            item: Hit {
                                title: company.name.clone(),
                                summary: format!("SEC registered company - CIK: {}", company.cik),
                                source_url: latest.index_url()?,
                                form_type: Some(latest.form_type.clone()),
                                fiscal_period: latest.fiscal_period(),
                            },
                        });
                    }
                }
            }

            if kinds.contains(&EntityKind::Filing) {
                for filing in catalog
                    .filings()
                    .filter(|f| window.is_none_or(|days| f.filed_within(days, as_of)))
                {
                    let score = filing_relevance(query, &filing.search_text(), &filing.form_type);
                    if score > 0.0 {
                        candidates.push(Scored {
                            score,
                            kind: EntityKind::Filing,
                            key: filing.accession_number.clone(),
                            item: Hit {
                                title: format!("{} - {}", filing.company, filing.form_type),
                                summary: format!(
                                    "{} filing from {} filed {}",
                                    filing.form_type, filing.company, filing.filing_date
                                ),
                                source_url: filing.index_url()?,
                                form_type: Some(filing.form_type.clone()),
                                fiscal_period: filing.fiscal_period(),
                            },
                        });
                    }
                }
            }

            if kinds.contains(&EntityKind::Fact) {
                for record in catalog
                    .facts()
                    .filter(|r| window.is_none_or(|days| r.filed_within(days, as_of)))
                {
                    let score = relevance(query, &record.search_text());
                    if score > 0.0 {
                        candidates.push(Scored {
                            score,
                            kind: EntityKind::Fact,
                            key: record.key.clone(),
                            item: fact_hit(record),
                        });
                    }
                }
            }
        }

        let total_found = candidates.len();
        let results = top_k(candidates, k)
            .into_iter()
            .map(|scored| {
                let object_id =
                    self.registry
                        .register(scored.kind, &scored.key, scored.item.summary.as_str())?;
                Ok(SearchResult {
                    object_id,
                    kind: scored.kind,
                    title: scored.item.title,
                    summary: scored.item.summary,
                    score: scored.score,
                    source_url: scored.item.source_url,
                    form_type: scored.item.form_type,
                    fiscal_period: scored.item.fiscal_period,
                    natural_key: scored.key,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            query,
            total_found,
            returned = results.len(),
            "Search complete"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            returned: results.len(),
            results,
            total_found,
            kinds_searched: kinds,
        })
    }

    /// Resolve a handle to its full record.
    ///
    /// With `include_content`, filing payloads carry the primary document,
    /// cut at the configured content limit.
    pub async fn fetch(&self, handle: &ObjectHandle, include_content: bool) -> Result<EntityPayload> {
        let entity = self.registry.resolve(handle)?;
        match entity.kind {
            EntityKind::Company => self.company_payload(handle, &entity),
            EntityKind::Filing => {
                let record = self.filing_record(&entity)?;
                let mut payload = FilingPayload {
                    object_id: handle.clone(),
                    cik: record.cik.clone(),
                    company: record.company.clone(),
                    accession_number: record.accession_number.clone(),
                    form_type: record.form_type.clone(),
                    filing_date: record.filing_date,
                    period_of_report: record.period_of_report,
                    fiscal_period: record.fiscal_period(),
                    primary_document: record.primary_document.clone(),
                    source_url: record.index_url()?,
                    content: None,
                    content_truncated: false,
                };

                if include_content {
                    let document = self.fetch_document(&record).await?;
                    let (content, truncated) =
                        truncate_chars(document.text(), self.config.content_limit);
                    payload.content = Some(content);
                    payload.content_truncated = truncated;
                }
                Ok(EntityPayload::Filing(payload))
            }
            EntityKind::Fact => {
                let record = self
                    .catalog()?
                    .fact(&entity.key)
                    .cloned()
                    .ok_or_else(|| ResearchError::NotFound(entity.to_string()))?;
                Ok(EntityPayload::Fact(FactPayload {
                    object_id: handle.clone(),
                    company: record.company,
                    source_url: record.fact.source.url.clone(),
                    form_type: record.fact.form_type.clone(),
                    fiscal_period: record.fact.period.to_string(),
                    fact: record.fact,
                }))
            }
        }
    }

    /// Fetch several handles, collecting per-handle failures.
    pub async fn fetch_many(&self, handles: &[ObjectHandle], include_content: bool) -> FetchResponse {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for handle in handles {
            match self.fetch(handle, include_content).await {
                Ok(payload) => results.push(payload),
                Err(e) => {
                    debug!(handle = %handle, error = %e, "Fetch failed");
                    errors.push(FetchFailure {
                        object_id: handle.clone(),
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        FetchResponse {
            fetched: results.len(),
            failed: errors.len(),
            results,
            errors,
        }
    }

    /// Pull a filing from the source and assemble its statements.
    ///
    /// The extracted facts are added to the catalog and become searchable.
    pub async fn filing_statements(&self, handle: &ObjectHandle) -> Result<FinancialStatements> {
        let record = self.resolve_filing(handle)?;
        let document = self.fetch_document(&record).await?;
        let statements = self.extract_statements(&document)?;
        let facts: Vec<FinancialFact> = statements.facts().cloned().collect();
        self.index(&facts)?;
        Ok(statements)
    }

    /// Pull a filing from the source and extract one concept.
    pub async fn filing_concept(
        &self,
        handle: &ObjectHandle,
        concept: &str,
    ) -> Result<Vec<FinancialFact>> {
        let record = self.resolve_filing(handle)?;
        let document = self.fetch_document(&record).await?;
        let facts = self.extract_concept(&document, concept)?;
        self.index(&facts)?;
        Ok(facts)
    }

    /// Extract every cataloged filing so its facts become searchable.
    ///
    /// A filing that fails to fetch or extract is logged and skipped.
    pub async fn index_filings(&self) -> Result<IndexSummary> {
        let records: Vec<FilingRecord> = self.catalog()?.filings().cloned().collect();
        let mut summary = IndexSummary::default();

        for record in records {
            let extracted = match self.fetch_document(&record).await {
                Ok(document) => self.extract_statements(&document),
                Err(e) => Err(e),
            };
            match extracted {
                Ok(statements) => {
                    let facts: Vec<FinancialFact> = statements.facts().cloned().collect();
                    summary.facts += self.index(&facts)?;
                    summary.filings += 1;
                }
                Err(e) => {
                    warn!(accession = %record.accession_number, error = %e, "Skipping filing");
                    summary.failed += 1;
                }
            }
        }

        info!(
            filings = summary.filings,
            facts = summary.facts,
            failed = summary.failed,
            "Indexed cataloged filings"
        );
        Ok(summary)
    }

    fn company_payload(&self, handle: &ObjectHandle, entity: &EntityRef) -> Result<EntityPayload> {
        let catalog = self.catalog()?;
        let company = catalog
            .company(&entity.key)
            .ok_or_else(|| ResearchError::NotFound(entity.to_string()))?;
        let latest = catalog.latest_filing(&company.cik).ok_or_else(|| {
            ResearchError::NotFound(format!("no cataloged filing for {}", entity))
        })?;

        Ok(EntityPayload::Company(CompanyPayload {
            object_id: handle.clone(),
            cik: company.cik.clone(),
            name: company.name.clone(),
            tickers: company.tickers.clone(),
            sic: company.sic.clone(),
            sic_description: company.sic_description.clone(),
            exchange: company.exchange.clone(),
            state: company.state.clone(),
            fiscal_year_end: company.fiscal_year_end.clone(),
            latest_filing: latest.accession_number.clone(),
            source_url: latest.index_url()?,
            form_type: latest.form_type.clone(),
            fiscal_period: latest.fiscal_period(),
        }))
    }

    fn resolve_filing(&self, handle: &ObjectHandle) -> Result<FilingRecord> {
        let entity = self.registry.resolve(handle)?;
        if entity.kind != EntityKind::Filing {
            return Err(ResearchError::NotFound(format!(
                "{} refers to a {}, not a filing",
                handle, entity.kind
            )));
        }
        self.filing_record(&entity)
    }

    fn filing_record(&self, entity: &EntityRef) -> Result<FilingRecord> {
        self.catalog()?
            .filing(&entity.key)
            .cloned()
            .ok_or_else(|| ResearchError::NotFound(entity.to_string()))
    }

    async fn fetch_document(&self, record: &FilingRecord) -> Result<FilingDocument> {
        let document = self
            .source
            .fetch_filing(&record.cik, &record.form_type, &record.accession_number)
            .await?;
        Ok(document)
    }

    fn index(&self, facts: &[FinancialFact]) -> Result<usize> {
        let added = self.catalog_mut()?.add_facts(facts);
        debug!(added, "Indexed facts");
        Ok(added)
    }

    fn catalog(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| ResearchError::LockPoisoned("catalog"))
    }

    fn catalog_mut(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| ResearchError::LockPoisoned("catalog"))
    }
}

fn fact_hit(record: &FactRecord) -> Hit {
    let fact = &record.fact;
    Hit {
        title: format!("{} {}", record.company, fact.concept),
        summary: format!(
            "{} {} {} for {} ({})",
            fact.concept, fact.value, fact.unit.measure, fact.period, fact.form_type
        ),
        source_url: fact.source.url.clone(),
        form_type: Some(fact.form_type.clone()),
        fiscal_period: Some(fact.period.to_string()),
    }
}

/// Cut text to at most `limit` characters.
fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}
