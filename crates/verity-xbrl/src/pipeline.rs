//! The extraction pipeline.
//!
//! [`Extractor`] chains the stages over one [`FilingDocument`]:
//!
//! 1. validate the filing metadata so every fact can be referenced
//! 2. index contexts and units
//! 3. match concepts lazily over the raw text
//! 4. extract exact numeric values
//! 5. keep one fact per concept, period and unit
//! 6. attach source references
//! 7. assemble statements (for [`Extractor::extract_statements`])
//!
//! The pipeline is pure: the same document and rules always yield the same
//! facts in the same order. Any extraction failure fails the whole call; no
//! partial result is returned.

use crate::context::ContextIndex;
use crate::document::FilingDocument;
use crate::error::Result;
use crate::extract::{NumericExtractor, select_preferred};
use crate::fact::FinancialFact;
use crate::matcher::{ConceptQuery, RuleSet};
use crate::reference::ReferenceAnnotator;
use crate::statements::{FinancialStatements, assemble};
use std::sync::Arc;
use tracing::debug;

/// Deterministic fact extractor over a shared rule set.
///
/// Cloning is cheap and clones share the compiled rules, so one extractor
/// can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Arc<RuleSet>,
}

impl Extractor {
    /// Create an extractor with the given rules.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Create an extractor with the standard rule set.
    pub fn standard() -> Result<Self> {
        Ok(Self::new(RuleSet::standard()?))
    }

    /// The rules in use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Extract facts answering a query.
    pub fn extract_facts(
        &self,
        document: &FilingDocument,
        query: &ConceptQuery,
    ) -> Result<Vec<FinancialFact>> {
        let annotator = ReferenceAnnotator::new(document.metadata())?;
        let index = ContextIndex::parse(document.text())?;
        let extractor = NumericExtractor::new(&index, document.text());

        let mut extracted = Vec::new();
        for m in self.rules.matches(document.text(), query)? {
            extracted.push(extractor.extract(&m?)?);
        }

        let facts: Vec<FinancialFact> = select_preferred(extracted)
            .into_iter()
            .map(|fact| annotator.annotate(fact))
            .collect();

        debug!(
            accession = %annotator.accession_number(),
            query = ?query,
            facts = facts.len(),
            "Extracted facts"
        );
        Ok(facts)
    }

    /// Extract every value reported for one concept.
    ///
    /// An unknown concept yields an empty list. `"all"` behaves like
    /// [`ConceptQuery::All`].
    pub fn extract_concept(
        &self,
        document: &FilingDocument,
        concept: &str,
    ) -> Result<Vec<FinancialFact>> {
        self.extract_facts(document, &ConceptQuery::parse(concept))
    }

    /// Extract every numeric fact and assemble the statements.
    pub fn extract_statements(&self, document: &FilingDocument) -> Result<FinancialStatements> {
        let facts = self.extract_facts(document, &ConceptQuery::All)?;
        Ok(assemble(facts))
    }
}
