//! Numeric value extraction.
//!
//! Turns a [`ConceptMatch`] into an [`ExtractedFact`]: the tagged text is
//! parsed into an arbitrary-precision [`BigDecimal`] and the `contextRef` /
//! `unitRef` attributes are resolved against the document's [`ContextIndex`].
//! Nothing is guessed. A nil, empty or non-numeric value or an unresolvable
//! reference is an [`XbrlError::Extraction`] carrying the offending tag text.

use crate::context::{Context, ContextIndex, Dimension, Period, Unit};
use crate::error::{Result, XbrlError};
use crate::matcher::ConceptMatch;
use crate::xml;
use bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// Plain decimal literal: optional sign, digits, optional fraction.
static PLAIN_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("valid decimal pattern"));

/// Declared precision of a reported value (the XBRL `decimals` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decimals {
    /// Exact as written (`decimals="INF"`)
    Inf,
    /// Accurate to this many decimal places; negative for rounding to thousands, millions, ...
    Places(i32),
}

impl fmt::Display for Decimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inf => write!(f, "INF"),
            Self::Places(places) => write!(f, "{}", places),
        }
    }
}

/// A numeric fact with its context and unit resolved, not yet tied to a source URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    /// Canonical concept name
    pub concept: String,
    /// Qualified tag the value was reported under
    pub tag: String,
    /// Value exactly as reported, sign applied
    pub value: BigDecimal,
    /// Reported text with whitespace removed
    pub raw_value: String,
    /// Resolved unit
    pub unit: Unit,
    /// Resolved period
    pub period: Period,
    /// Declared precision
    pub decimals: Option<Decimals>,
    /// Inline XBRL display scale; the value is not multiplied by it
    pub scale: Option<i32>,
    /// Dimensional qualifiers of the context
    pub dimensions: Vec<Dimension>,
    /// Context id the fact points at
    pub context_id: String,
    /// Element id, when the fact carries one
    pub element_id: Option<String>,
    /// Priority of the matching rule; `None` for unclassified facts
    pub rule_priority: Option<usize>,
    /// Declaration order of the context
    pub context_order: usize,
    /// Order of the fact in the document
    pub position: usize,
}

impl ExtractedFact {
    /// Returns true when the fact is not qualified by any dimension.
    pub fn is_consolidated(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Parses matched tags into facts against one document's contexts and units.
#[derive(Debug, Clone, Copy)]
pub struct NumericExtractor<'a> {
    index: &'a ContextIndex,
    source: &'a str,
}

impl<'a> NumericExtractor<'a> {
    /// Create an extractor for the document `source` indexed by `index`.
    pub const fn new(index: &'a ContextIndex, source: &'a str) -> Self {
        Self { index, source }
    }

    /// Extract one fact.
    pub fn extract(&self, m: &ConceptMatch) -> Result<ExtractedFact> {
        let raw = m.source(self.source);
        let fail = |reason: String| XbrlError::extraction(reason, raw);

        if m.attribute("nil")
            .is_some_and(|nil| nil.trim().eq_ignore_ascii_case("true"))
        {
            return Err(fail(format!("{} is nil", m.tag)));
        }

        let context = self.context(m).map_err(&fail)?;
        let unit = self.unit(m).map_err(&fail)?;

        let raw_value: String = m.text.chars().filter(|c| !c.is_whitespace()).collect();
        if raw_value.is_empty() {
            return Err(fail(format!("{} has no value", m.tag)));
        }

        let mut value = parse_value(&raw_value, m.attribute("format")).map_err(&fail)?;
        if m.attribute("sign").is_some_and(|s| s.trim() == "-") {
            value = -value;
        }

        let decimals = m
            .attribute("decimals")
            .map(parse_decimals)
            .transpose()
            .map_err(&fail)?;

        let scale = m
            .attribute("scale")
            .map(|s| {
                s.trim()
                    .parse::<i32>()
                    .map_err(|_| format!("invalid scale `{}`", s))
            })
            .transpose()
            .map_err(&fail)?;

        Ok(ExtractedFact {
            concept: m.concept.clone(),
            tag: m.tag.clone(),
            value,
            raw_value,
            unit: unit.clone(),
            period: context.period,
            decimals,
            scale,
            dimensions: context.dimensions.clone(),
            context_id: context.id.clone(),
            element_id: m.attribute("id").map(str::to_string),
            rule_priority: m.rule_priority,
            context_order: context.order,
            position: m.position,
        })
    }

    fn context(&self, m: &ConceptMatch) -> std::result::Result<&'a Context, String> {
        let id = m
            .attribute("contextRef")
            .ok_or_else(|| format!("{} has no contextRef", m.tag))?;
        self.index
            .context(id.trim())
            .ok_or_else(|| format!("unresolved context `{}`", id))
    }

    fn unit(&self, m: &ConceptMatch) -> std::result::Result<&'a Unit, String> {
        let id = m
            .attribute("unitRef")
            .ok_or_else(|| format!("{} has no unitRef", m.tag))?;
        self.index
            .unit(id.trim())
            .ok_or_else(|| format!("unresolved unit `{}`", id))
    }
}

fn parse_decimals(raw: &str) -> std::result::Result<Decimals, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("INF") {
        return Ok(Decimals::Inf);
    }
    raw.parse::<i32>()
        .map(Decimals::Places)
        .map_err(|_| format!("invalid decimals `{}`", raw))
}

/// Parse reported text into an exact decimal, honoring an inline XBRL format.
fn parse_value(raw: &str, format: Option<&str>) -> std::result::Result<BigDecimal, String> {
    let format = format.map(|f| xml::strip_prefix(f.trim()).to_ascii_lowercase());

    let normalized = match format.as_deref() {
        None => raw.to_string(),
        Some(f) if f.contains("zerodash") || f.contains("fixed-zero") || f == "fixedzero" => {
            return Ok(BigDecimal::from(0));
        }
        Some(f) if f.contains("comma-decimal") || f.contains("numcommadecimal") => raw
            .replace('.', "")
            .replace('\u{a0}', "")
            .replace(',', "."),
        Some(f) if f.contains("numwordsen") => {
            if let Some(n) = number_word(raw) {
                return Ok(BigDecimal::from(n));
            }
            raw.replace(',', "").replace('\u{a0}', "")
        }
        Some(_) => raw.replace(',', "").replace('\u{a0}', ""),
    };

    if !PLAIN_DECIMAL.is_match(&normalized) {
        return Err(format!("non-numeric value `{}`", raw));
    }

    let unsigned = normalized.strip_prefix('+').unwrap_or(&normalized);
    let unsigned = unsigned.strip_suffix('.').unwrap_or(unsigned);
    BigDecimal::from_str(unsigned).map_err(|e| format!("invalid decimal `{}`: {}", raw, e))
}

/// Value of an English number word as written by `ixt-sec:numwordsen`.
///
/// Filers write "no" or "none" for a zero count; small counts are spelled out.
fn number_word(raw: &str) -> Option<u32> {
    const WORDS: [&str; 13] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve",
    ];
    let word = raw.trim().to_ascii_lowercase();
    if matches!(word.as_str(), "no" | "none" | "nil") {
        return Some(0);
    }
    WORDS
        .iter()
        .position(|w| *w == word)
        .and_then(|n| u32::try_from(n).ok())
}

/// Keep one fact per (concept, period, unit).
///
/// Among facts reporting the same concept for the same period in the same
/// unit, the winner is the consolidated one (no dimensions), then the one
/// matched by the higher priority rule, then the one whose context was
/// declared last, then the first in the document. When no consolidated fact
/// exists the group holds distinct breakdowns, so one fact is kept per
/// dimension set instead. Survivors keep document order.
pub fn select_preferred(facts: Vec<ExtractedFact>) -> Vec<ExtractedFact> {
    let total = facts.len();
    let group = |fact: &ExtractedFact| {
        (
            fact.concept.to_ascii_lowercase(),
            fact.period,
            fact.unit.measure.clone(),
        )
    };

    let consolidated: HashSet<(String, Period, String)> = facts
        .iter()
        .filter(|fact| fact.is_consolidated())
        .map(group)
        .collect();

    let mut best: HashMap<((String, Period, String), Vec<Dimension>), usize> = HashMap::new();
    for (i, fact) in facts.iter().enumerate() {
        let key = group(fact);
        let breakdown = if consolidated.contains(&key) {
            Vec::new()
        } else {
            let mut dimensions = fact.dimensions.clone();
            dimensions.sort_by(|a, b| (&a.axis, &a.member).cmp(&(&b.axis, &b.member)));
            dimensions
        };
        match best.entry((key, breakdown)) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(mut slot) => {
                if preference(fact) < preference(&facts[*slot.get()]) {
                    slot.insert(i);
                }
            }
        }
    }

    let mut keep: Vec<usize> = best.into_values().collect();
    keep.sort_unstable();

    let mut slots: Vec<Option<ExtractedFact>> = facts.into_iter().map(Some).collect();
    let selected: Vec<ExtractedFact> = keep
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();

    if selected.len() < total {
        debug!(
            kept = selected.len(),
            dropped = total - selected.len(),
            "Resolved duplicate facts"
        );
    }
    selected
}

fn preference(fact: &ExtractedFact) -> (bool, usize, std::cmp::Reverse<usize>, usize) {
    (
        !fact.is_consolidated(),
        fact.rule_priority.unwrap_or(usize::MAX),
        std::cmp::Reverse(fact.context_order),
        fact.position,
    )
}
