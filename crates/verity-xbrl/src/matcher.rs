//! Concept pattern matching over raw filing text.
//!
//! Financial concepts are recognized with an ordered list of declarative
//! [`MatchRule`]s instead of a fixed concept-to-tag dictionary, so facts filed
//! under extension taxonomies or renamed tags are still found. Rules are data:
//! the standard set ships as `rules/standard.json` and any other rule file can
//! be loaded at runtime.
//!
//! Matching is lazy. [`RuleSet::matches`] returns a [`ConceptMatches`]
//! iterator that walks the document once and yields each fact element as it is
//! reached.
//!
//! # Example
//!
//! ```
//! use verity_xbrl::matcher::{ConceptQuery, RuleSet};
//!
//! let rules = RuleSet::standard().unwrap();
//! let text = r#"<xbrl><us-gaap:Revenues contextRef="FY" unitRef="usd">100</us-gaap:Revenues></xbrl>"#;
//! let matches: Vec<_> = rules
//!     .matches(text, &ConceptQuery::parse("Revenue"))
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].concept, "Revenue");
//! ```

use crate::error::{Result, XbrlError};
use crate::xml;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Rule set compiled into the crate.
const STANDARD_RULES: &str = include_str!("../rules/standard.json");

/// A declarative rule recognizing one financial concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Canonical concept name the rule reports (e.g., "Revenue")
    pub concept: String,

    /// Regular expression over the tag's local name, anchored and case-insensitive
    pub tag: String,

    /// Regular expression over the namespace prefix; any prefix when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Attributes the tag must carry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributePredicate>,
}

/// Requires an attribute to be present, optionally with a matching value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePredicate {
    /// Attribute local name (e.g., "unitRef")
    pub name: String,

    /// Regular expression the value must match, anchored and case-insensitive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<MatchRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    concept: String,
    tag: Regex,
    namespace: Option<Regex>,
    attributes: Vec<(String, Option<Regex>)>,
    priority: usize,
    literal: bool,
}

impl CompiledRule {
    fn compile(rule: &MatchRule, priority: usize) -> Result<Self> {
        let namespace = rule
            .namespace
            .as_deref()
            .map(|ns| anchored(&rule.concept, ns))
            .transpose()?;

        let attributes = rule
            .attributes
            .iter()
            .map(|attr| {
                let pattern = attr
                    .pattern
                    .as_deref()
                    .map(|p| anchored(&rule.concept, p))
                    .transpose()?;
                Ok((attr.name.clone(), pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            concept: rule.concept.clone(),
            tag: anchored(&rule.concept, &rule.tag)?,
            namespace,
            attributes,
            priority,
            literal: false,
        })
    }

    fn is_match(&self, prefix: Option<&str>, local: &str, attrs: &[(String, String)]) -> bool {
        if !self.tag.is_match(local) {
            return false;
        }

        if let Some(ns) = &self.namespace
            && !prefix.is_some_and(|p| ns.is_match(p))
        {
            return false;
        }

        self.attributes.iter().all(|(name, pattern)| {
            xml::find_attribute(attrs, name)
                .is_some_and(|value| pattern.as_ref().is_none_or(|re| re.is_match(value)))
        })
    }
}

fn anchored(concept: &str, pattern: &str) -> Result<Regex> {
    if concept.trim().is_empty() {
        return Err(XbrlError::InvalidRule {
            rule: concept.to_string(),
            reason: "empty concept name".to_string(),
        });
    }

    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|e| XbrlError::InvalidRule {
            rule: concept.to_string(),
            reason: e.to_string(),
        })
}

/// What to look for in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConceptQuery {
    /// Every numeric fact (tags carrying both `contextRef` and `unitRef`)
    All,
    /// One concept, by canonical rule name or literal tag name
    Named(String),
}

impl ConceptQuery {
    /// Parse a concept argument; `"all"` (any case) selects every fact.
    pub fn parse(concept: &str) -> Self {
        let concept = concept.trim();
        if concept.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Named(concept.to_string())
        }
    }
}

impl From<&str> for ConceptQuery {
    fn from(concept: &str) -> Self {
        Self::parse(concept)
    }
}

/// An ordered, compiled set of match rules.
///
/// Earlier rules take priority: when a tag satisfies several rules, the
/// first one names its concept.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules in priority order.
    pub fn new(rules: &[MatchRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(priority, rule)| CompiledRule::compile(rule, priority))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Parse a rule file of the form `{"rules": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(json)?;
        Self::new(&file.rules)
    }

    /// Load a rule file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let rules = Self::from_json(&json)?;
        debug!(path = %path.as_ref().display(), rules = rules.len(), "Loaded match rules");
        Ok(rules)
    }

    /// The standard US-GAAP / IFRS rule set.
    pub fn standard() -> Result<Self> {
        Self::from_json(STANDARD_RULES)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical concept names, in priority order, without duplicates.
    pub fn concepts(&self) -> Vec<&str> {
        let mut concepts: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !concepts
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&rule.concept))
            {
                concepts.push(&rule.concept);
            }
        }
        concepts
    }

    /// Lazily match a query against raw filing text.
    ///
    /// A named query uses every rule declared for that concept, followed by a
    /// literal rule matching the tag name itself, so both `"Revenue"` (a rule
    /// concept) and `"Revenues"` (a us-gaap tag) work. A name that matches
    /// nothing yields an empty sequence.
    pub fn matches<'a>(&self, text: &'a str, query: &ConceptQuery) -> Result<ConceptMatches<'a>> {
        let (rules, numeric_only) = match query {
            ConceptQuery::All => (self.rules.clone(), true),
            ConceptQuery::Named(name) => {
                let mut selected: Vec<CompiledRule> = self
                    .rules
                    .iter()
                    .filter(|rule| rule.concept.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect();
                selected.push(CompiledRule {
                    literal: true,
                    ..CompiledRule::compile(
                        &MatchRule {
                            concept: name.clone(),
                            tag: regex::escape(name),
                            namespace: None,
                            attributes: vec![AttributePredicate {
                                name: "contextRef".to_string(),
                                pattern: None,
                            }],
                        },
                        self.rules.len(),
                    )?
                });
                (selected, false)
            }
        };

        Ok(ConceptMatches {
            source: text,
            reader: xml::reader(text),
            rules,
            numeric_only,
            position: 0,
            done: false,
        })
    }
}

/// A located occurrence of a financial concept in a filing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptMatch {
    /// Canonical concept name
    pub concept: String,
    /// Qualified tag name (e.g., "us-gaap:Revenues")
    pub tag: String,
    /// Namespace prefix of the tag
    pub prefix: Option<String>,
    /// Local name of the tag
    pub local_name: String,
    /// Byte range of the whole element in the source text
    pub span: Range<usize>,
    /// Attributes of the element, keyed by qualified name
    pub attributes: Vec<(String, String)>,
    /// Inner text, nested markup removed
    pub text: String,
    /// Priority of the rule that matched; `None` for unclassified facts
    pub rule_priority: Option<usize>,
    /// Order of the match among all matches in the document
    pub position: usize,
}

impl ConceptMatch {
    /// Attribute value by local name.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        xml::find_attribute(&self.attributes, local)
    }

    /// The raw source text of the element.
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.span.clone()).unwrap_or_default()
    }
}

#[derive(Debug)]
struct Candidate {
    concept: String,
    tag: String,
    attributes: Vec<(String, String)>,
    priority: Option<usize>,
}

/// Lazy, finite, single-pass iterator over the concept matches of a document.
///
/// Yields an error and stops if the document is not well-formed enough to
/// continue.
#[derive(Debug)]
pub struct ConceptMatches<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    rules: Vec<CompiledRule>,
    numeric_only: bool,
    position: usize,
    done: bool,
}

impl ConceptMatches<'_> {
    fn advance(&mut self) -> Result<Option<ConceptMatch>> {
        loop {
            let before = xml::offset(&self.reader)?;
            match self.reader.read_event()? {
                Event::Start(e) => {
                    if let Some(candidate) = self.candidate(&e) {
                        let start = self.tag_start(before);
                        let (text, end) = self.capture()?;
                        return Ok(Some(self.finish(candidate, start..end, text)));
                    }
                }
                Event::Empty(e) => {
                    if let Some(candidate) = self.candidate(&e) {
                        let start = self.tag_start(before);
                        let end = xml::offset(&self.reader)?;
                        return Ok(Some(self.finish(candidate, start..end, String::new())));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// Decide whether an element is a fact this iterator should report.
    fn candidate(&self, e: &BytesStart<'_>) -> Option<Candidate> {
        let element = xml::qualified_name(e);
        let (element_prefix, element_local) = xml::split_qname(&element);
        let attributes = xml::attributes(e);

        let tag = match element_local {
            // Inline XBRL carries the concept in the `name` attribute.
            "nonFraction" | "nonNumeric" => xml::find_attribute(&attributes, "name")?.to_string(),
            _ => {
                element_prefix?;
                xml::find_attribute(&attributes, "contextRef")?;
                element.clone()
            }
        };

        if self.numeric_only
            && (xml::find_attribute(&attributes, "contextRef").is_none()
                || xml::find_attribute(&attributes, "unitRef").is_none())
        {
            return None;
        }

        let (prefix, local) = xml::split_qname(&tag);
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.is_match(prefix, local, &attributes))
        {
            let concept = if rule.literal {
                local.to_string()
            } else {
                rule.concept.clone()
            };
            return Some(Candidate {
                concept,
                tag,
                attributes,
                priority: Some(rule.priority),
            });
        }

        self.numeric_only.then(|| Candidate {
            concept: local.to_string(),
            tag: tag.clone(),
            attributes,
            priority: None,
        })
    }

    /// Collect the text of the element just opened, up to its matching end.
    fn capture(&mut self) -> Result<(String, usize)> {
        let mut depth = 1usize;
        let mut text = String::new();
        loop {
            match self.reader.read_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((text, xml::offset(&self.reader)?));
                    }
                }
                Event::Text(t) => text.push_str(&xml::text(&t)),
                Event::CData(c) => text.push_str(&xml::cdata(&c)),
                Event::Eof => {
                    return Err(XbrlError::XmlParse(
                        "Unexpected end of document inside a fact element".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    fn tag_start(&self, before: usize) -> usize {
        self.source
            .get(before..)
            .and_then(|rest| rest.find('<'))
            .map_or(before, |i| before + i)
    }

    fn finish(&mut self, candidate: Candidate, span: Range<usize>, text: String) -> ConceptMatch {
        let (prefix, local) = xml::split_qname(&candidate.tag);
        let m = ConceptMatch {
            concept: candidate.concept,
            prefix: prefix.map(str::to_string),
            local_name: local.to_string(),
            tag: candidate.tag.clone(),
            span,
            attributes: candidate.attributes,
            text,
            rule_priority: candidate.priority,
            position: self.position,
        };
        self.position += 1;
        m
    }
}

impl Iterator for ConceptMatches<'_> {
    type Item = Result<ConceptMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.advance() {
            Ok(Some(m)) => Some(Ok(m)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ConceptMatches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOC: &str = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance">
        <us-gaap:Revenues contextRef="FY2024" unitRef="usd" decimals="-6">391035000000</us-gaap:Revenues>
        <us-gaap:RevenueFromContractWithCustomerExcludingAssessedTax contextRef="FY2023" unitRef="usd">383285000000</us-gaap:RevenueFromContractWithCustomerExcludingAssessedTax>
        <us-gaap:NetIncomeLoss contextRef="FY2024" unitRef="usd">93736000000</us-gaap:NetIncomeLoss>
        <us-gaap:IncomeTaxesPaidNet contextRef="FY2024" unitRef="usd">26102000000</us-gaap:IncomeTaxesPaidNet>
        <dei:DocumentType contextRef="FY2024">10-K</dei:DocumentType>
    </xbrli:xbrl>"#;

    fn collect(rules: &RuleSet, text: &str, query: &str) -> Vec<ConceptMatch> {
        rules
            .matches(text, &ConceptQuery::parse(query))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_standard_rules_compile() {
        let rules = RuleSet::standard().unwrap();
        assert!(!rules.is_empty());
        assert!(rules.concepts().contains(&"Revenue"));
        assert!(rules.concepts().contains(&"NetIncomeLoss"));
    }

    #[rstest]
    #[case("Revenue", 2)]
    #[case("revenue", 2)]
    #[case("Revenues", 1)]
    #[case("NetIncomeLoss", 1)]
    #[case("NonExistentConcept", 0)]
    fn test_named_queries(#[case] query: &str, #[case] expected: usize) {
        let rules = RuleSet::standard().unwrap();
        assert_eq!(collect(&rules, DOC, query).len(), expected);
    }

    #[test]
    fn test_all_matches_numeric_facts_only() {
        let rules = RuleSet::standard().unwrap();
        let matches = collect(&rules, DOC, "all");

        let concepts: Vec<&str> = matches.iter().map(|m| m.concept.as_str()).collect();
        assert_eq!(
            concepts,
            vec!["Revenue", "Revenue", "NetIncomeLoss", "IncomeTaxesPaidNet"]
        );
        assert_eq!(matches[3].rule_priority, None);
        assert_eq!(matches[3].tag, "us-gaap:IncomeTaxesPaidNet");
        assert_eq!(
            matches.iter().map(|m| m.position).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_match_span_and_attributes() {
        let rules = RuleSet::standard().unwrap();
        let matches = collect(&rules, DOC, "Revenues");
        let m = &matches[0];

        assert_eq!(m.prefix.as_deref(), Some("us-gaap"));
        assert_eq!(m.local_name, "Revenues");
        assert_eq!(m.text, "391035000000");
        assert_eq!(m.attribute("contextRef"), Some("FY2024"));
        assert_eq!(m.attribute("decimals"), Some("-6"));
        assert!(m.source(DOC).starts_with("<us-gaap:Revenues"));
        assert!(m.source(DOC).ends_with("</us-gaap:Revenues>"));
    }

    #[test]
    fn test_inline_nonfraction_uses_name_attribute() {
        let text = r#"<html><body><p>Net sales
            <ix:nonFraction name="us-gaap:Revenues" contextRef="c-1" unitRef="usd" scale="6" format="ixt:num-dot-decimal"><span>85,777</span></ix:nonFraction>
        </p></body></html>"#;
        let rules = RuleSet::standard().unwrap();
        let matches = collect(&rules, text, "Revenue");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tag, "us-gaap:Revenues");
        assert_eq!(matches[0].text, "85,777");
        assert_eq!(matches[0].attribute("scale"), Some("6"));
    }

    #[test]
    fn test_extension_taxonomy_tag_is_found() {
        let text = r#"<xbrl><acme:Revenues contextRef="FY" unitRef="usd">10</acme:Revenues></xbrl>"#;
        let rules = RuleSet::standard().unwrap();
        let matches = collect(&rules, text, "Revenue");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].prefix.as_deref(), Some("acme"));
    }

    #[test]
    fn test_namespace_and_attribute_predicates() {
        let rules = RuleSet::from_json(
            r#"{"rules": [
                {"concept": "UsdRevenue", "tag": "Revenues", "namespace": "us-gaap",
                 "attributes": [{"name": "unitRef", "pattern": "usd"}]}
            ]}"#,
        )
        .unwrap();
        let text = r#"<xbrl>
            <us-gaap:Revenues contextRef="A" unitRef="USD">1</us-gaap:Revenues>
            <us-gaap:Revenues contextRef="B" unitRef="eur">2</us-gaap:Revenues>
            <acme:Revenues contextRef="C" unitRef="usd">3</acme:Revenues>
        </xbrl>"#;

        let matches = collect(&rules, text, "UsdRevenue");
        // The literal fallback rule only matches a local name of "UsdRevenue".
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "1");
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let result = RuleSet::from_json(r#"{"rules": [{"concept": "Bad", "tag": "(unclosed"}]}"#);
        assert!(matches!(result, Err(XbrlError::InvalidRule { .. })));

        let result = RuleSet::from_json(r#"{"rules": [{"concept": " ", "tag": "Assets"}]}"#);
        assert!(matches!(result, Err(XbrlError::InvalidRule { .. })));

        let result = RuleSet::from_json("not json");
        assert!(matches!(result, Err(XbrlError::Serialization(_))));
    }

    #[test]
    fn test_iterator_is_lazy_and_fused() {
        let rules = RuleSet::standard().unwrap();
        let mut matches = rules.matches(DOC, &ConceptQuery::All).unwrap();

        let first = matches.next().unwrap().unwrap();
        assert_eq!(first.local_name, "Revenues");

        assert_eq!(matches.by_ref().count(), 3);
        assert!(matches.next().is_none());
        assert!(matches.next().is_none());
    }

    #[test]
    fn test_truncated_document_yields_error_then_stops() {
        let text = r#"<xbrl><us-gaap:Assets contextRef="I" unitRef="usd">12"#;
        let rules = RuleSet::standard().unwrap();
        let mut matches = rules.matches(text, &ConceptQuery::All).unwrap();

        assert!(matches!(matches.next(), Some(Err(XbrlError::XmlParse(_)))));
        assert!(matches.next().is_none());
    }
}
