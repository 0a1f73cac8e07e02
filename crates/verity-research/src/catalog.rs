//! In-memory catalog of searchable companies, filings and facts.
//!
//! The catalog is the search corpus. Companies and filings come from a
//! filing source manifest; facts are added as filings are extracted.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use verity_xbrl::reference::{filing_index_url, normalize_accession, normalize_cik};
use verity_xbrl::{FilingMetadata, FinancialFact};

/// Annual report forms.
const ANNUAL_FORMS: &[&str] = &["10-K", "10-K/A", "10-KT", "20-F", "40-F"];

/// An SEC registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Central Index Key
    pub cik: String,

    /// Registrant name
    pub name: String,

    /// Exchange tickers
    #[serde(default)]
    pub tickers: Vec<String>,

    /// Standard Industrial Classification code
    #[serde(default)]
    pub sic: Option<String>,

    /// SIC description
    #[serde(default)]
    pub sic_description: Option<String>,

    /// Listing exchange
    #[serde(default)]
    pub exchange: Option<String>,

    /// State of incorporation
    #[serde(default)]
    pub state: Option<String>,

    /// Fiscal year end as MMDD (e.g., "0928")
    #[serde(default)]
    pub fiscal_year_end: Option<String>,
}

impl CompanyRecord {
    /// Text the relevance scorer sees.
    pub fn search_text(&self) -> String {
        format!("{} {} CIK:{}", self.name, self.tickers.join(" "), self.cik)
    }
}

/// One filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    /// Central Index Key of the filer
    pub cik: String,

    /// Company name as filed
    pub company: String,

    /// Form type (e.g., "10-K")
    pub form_type: String,

    /// Accession number
    pub accession_number: String,

    /// Date the filing was accepted
    pub filing_date: NaiveDate,

    /// End of the period the filing reports on
    #[serde(default)]
    pub period_of_report: Option<NaiveDate>,

    /// Primary document path inside the filing folder
    pub primary_document: String,
}

impl FilingRecord {
    /// Text the relevance scorer sees.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.company, self.form_type, self.accession_number
        )
    }

    /// Metadata for the primary document.
    pub fn metadata(&self) -> FilingMetadata {
        FilingMetadata {
            cik: self.cik.clone(),
            company_name: Some(self.company.clone()),
            form_type: self.form_type.clone(),
            accession_number: self.accession_number.clone(),
            period_end: self.period_of_report,
            filing_date: Some(self.filing_date),
            document_path: self.primary_document.clone(),
        }
    }

    /// URL of the EDGAR filing index page.
    pub fn index_url(&self) -> verity_xbrl::Result<String> {
        filing_index_url(&self.cik, &self.accession_number)
    }

    /// Fiscal period label: `FY2024` for annual reports, the period end otherwise.
    pub fn fiscal_period(&self) -> Option<String> {
        let end = self.period_of_report?;
        let annual = ANNUAL_FORMS
            .iter()
            .any(|form| form.eq_ignore_ascii_case(self.form_type.trim()));
        Some(if annual {
            format!("FY{}", end.year())
        } else {
            end.to_string()
        })
    }

    /// Returns true if filed within `days` days up to and including `as_of`.
    pub fn filed_within(&self, days: u32, as_of: NaiveDate) -> bool {
        filed_within(self.filing_date, days, as_of)
    }
}

/// An extracted fact, kept for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    /// Natural key: accession, concept, context and unit
    pub key: String,
    /// Company name
    pub company: String,
    /// Filing date of the source filing
    pub filing_date: NaiveDate,
    /// The fact
    pub fact: FinancialFact,
}

impl FactRecord {
    /// Returns true if the source filing was filed within `days` days up to and including `as_of`.
    pub fn filed_within(&self, days: u32, as_of: NaiveDate) -> bool {
        filed_within(self.filing_date, days, as_of)
    }
}

/// Returns true if `filed` lies in the `days`-day window ending on `as_of`.
///
/// A window reaching past the earliest representable date has no lower bound.
pub fn filed_within(filed: NaiveDate, days: u32, as_of: NaiveDate) -> bool {
    let after_cutoff = as_of
        .checked_sub_days(Days::new(u64::from(days)))
        .is_none_or(|cutoff| filed >= cutoff);
    after_cutoff && filed <= as_of
}

impl FactRecord {
    /// Natural key of a fact.
    pub fn key_for(fact: &FinancialFact) -> String {
        format!(
            "{}:{}:{}:{}",
            fact.source.accession_number, fact.concept, fact.context_id, fact.unit.id
        )
    }

    /// Text the relevance scorer sees.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.company, self.fact.concept, self.fact.tag, self.fact.form_type, self.fact.period
        )
    }
}

/// Searchable records, keyed by natural key.
///
/// Keys are normalized: CIKs without leading zeros, accession numbers in
/// dashed form.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    companies: BTreeMap<String, CompanyRecord>,
    filings: BTreeMap<String, FilingRecord>,
    facts: BTreeMap<String, FactRecord>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a company.
    pub fn add_company(&mut self, mut company: CompanyRecord) -> verity_xbrl::Result<()> {
        company.cik = normalize_cik(&company.cik)?;
        self.companies.insert(company.cik.clone(), company);
        Ok(())
    }

    /// Add or replace a filing.
    pub fn add_filing(&mut self, mut filing: FilingRecord) -> verity_xbrl::Result<()> {
        filing.cik = normalize_cik(&filing.cik)?;
        filing.accession_number = normalize_accession(&filing.accession_number)?;
        self.filings
            .insert(filing.accession_number.clone(), filing);
        Ok(())
    }

    /// Index the facts extracted from a cataloged filing. Returns how many were added.
    pub fn add_facts(&mut self, facts: &[FinancialFact]) -> usize {
        let mut added = 0;
        for fact in facts {
            let Some(filing) = self.filings.get(&fact.source.accession_number) else {
                continue;
            };
            let record = FactRecord {
                key: FactRecord::key_for(fact),
                company: filing.company.clone(),
                filing_date: filing.filing_date,
                fact: fact.clone(),
            };
            if self.facts.insert(record.key.clone(), record).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Look up a company by CIK (padded or not).
    pub fn company(&self, cik: &str) -> Option<&CompanyRecord> {
        let cik = normalize_cik(cik).ok()?;
        self.companies.get(&cik)
    }

    /// Look up a filing by accession number (dashed or not).
    pub fn filing(&self, accession: &str) -> Option<&FilingRecord> {
        let accession = normalize_accession(accession).ok()?;
        self.filings.get(&accession)
    }

    /// Look up a fact by natural key.
    pub fn fact(&self, key: &str) -> Option<&FactRecord> {
        self.facts.get(key)
    }

    /// The most recently filed filing of a company.
    pub fn latest_filing(&self, cik: &str) -> Option<&FilingRecord> {
        let cik = normalize_cik(cik).ok()?;
        self.filings
            .values()
            .filter(|f| f.cik == cik)
            .max_by(|a, b| {
                a.filing_date
                    .cmp(&b.filing_date)
                    .then_with(|| a.accession_number.cmp(&b.accession_number))
            })
    }

    /// All companies, by CIK.
    pub fn companies(&self) -> impl Iterator<Item = &CompanyRecord> {
        self.companies.values()
    }

    /// All filings, by accession number.
    pub fn filings(&self) -> impl Iterator<Item = &FilingRecord> {
        self.filings.values()
    }

    /// All facts, by key.
    pub fn facts(&self) -> impl Iterator<Item = &FactRecord> {
        self.facts.values()
    }
}
