//! The financial fact record.

use crate::context::{Dimension, Period, Unit};
use crate::extract::Decimals;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Where a fact can be checked on EDGAR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceReference {
    /// Canonical SEC URL of the source document, with a fragment for the fact when available
    pub url: String,
    /// Accession number of the filing (e.g., "0000320193-24-000123")
    pub accession_number: String,
    /// Form type of the filing
    pub form_type: String,
    /// Path of the document inside the filing folder
    pub document_path: String,
    /// Element id of the fact in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// A financial value reported in a filing, with everything needed to verify it.
///
/// The value is the number exactly as filed: `scale` and `decimals` are kept
/// as metadata and never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialFact {
    /// Canonical concept name (e.g., "Revenue")
    pub concept: String,

    /// Qualified tag the value was reported under (e.g., "us-gaap:Revenues")
    pub tag: String,

    /// Exact reported value, serialized as a decimal string
    pub value: BigDecimal,

    /// Reported text with whitespace removed
    pub raw_value: String,

    /// Unit of measure
    pub unit: Unit,

    /// Reporting period
    pub period: Period,

    /// Declared precision
    #[serde(default)]
    pub decimals: Option<Decimals>,

    /// Inline XBRL display scale
    #[serde(default)]
    pub scale: Option<i32>,

    /// Dimensional qualifiers; empty for consolidated totals
    #[serde(default)]
    pub dimensions: Vec<Dimension>,

    /// Context id the fact was reported under
    pub context_id: String,

    /// Form type of the filing
    pub form_type: String,

    /// Source reference
    pub source: SourceReference,
}

impl FinancialFact {
    /// Returns true for point-in-time facts.
    pub const fn is_instant(&self) -> bool {
        self.period.is_instant()
    }

    /// Returns true for facts accumulated over a period.
    pub const fn is_duration(&self) -> bool {
        !self.period.is_instant()
    }

    /// Length of the reporting period in days, for durations.
    pub fn duration_days(&self) -> Option<i64> {
        self.period.duration_days()
    }

    /// Returns true when the fact is not qualified by any dimension.
    pub fn is_consolidated(&self) -> bool {
        self.dimensions.is_empty()
    }
}
