#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/verity/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export main types from sub-crates
pub use verity_research as research;
pub use verity_xbrl as xbrl;

// Re-export the common entry points
pub use verity_research::{
    Catalog, LocalFilingSource, ObjectHandle, ResearchTools, SearchOptions, ToolsConfig,
};
pub use verity_xbrl::{
    Extractor, FilingDocument, FilingMetadata, FinancialFact, FinancialStatements, RuleSet,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION, xbrl::VERSION);
        assert_eq!(VERSION, research::VERSION);
    }
}
