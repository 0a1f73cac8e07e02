#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/verity/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod document;
pub mod error;
pub mod extract;
pub mod fact;
pub mod matcher;
pub mod pipeline;
pub mod reference;
pub mod statements;

mod xml;

pub use context::{Context, ContextIndex, Dimension, Period, Unit, UnitKind};
pub use document::{FilingDocument, FilingMetadata};
pub use error::{Result, XbrlError};
pub use extract::{Decimals, ExtractedFact, NumericExtractor};
pub use fact::{FinancialFact, SourceReference};
pub use matcher::{ConceptMatch, ConceptQuery, MatchRule, RuleSet};
pub use pipeline::Extractor;
pub use reference::ReferenceAnnotator;
pub use statements::{FinancialStatements, Statement, StatementKind};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
