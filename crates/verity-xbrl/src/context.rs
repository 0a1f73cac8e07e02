//! XBRL contexts and units.
//!
//! Facts point at their reporting period and unit indirectly, through
//! `contextRef` and `unitRef`. [`ContextIndex`] is built in a first pass over
//! the document so the fact pass can resolve those references no matter where
//! in the document they were declared.

use crate::error::Result;
use crate::xml;
use chrono::NaiveDate;
use derive_more::Display;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Reporting period of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Period {
    /// Point-in-time value, like balance sheet items
    Instant {
        /// Measurement date
        date: NaiveDate,
    },
    /// Value accumulated over a period, like income statement items
    Duration {
        /// First day of the period
        start: NaiveDate,
        /// Last day of the period
        end: NaiveDate,
    },
}

impl Period {
    /// End date of the period (the date itself for instants).
    pub const fn end(&self) -> NaiveDate {
        match self {
            Self::Instant { date } => *date,
            Self::Duration { end, .. } => *end,
        }
    }

    /// Start date, if this is a duration.
    pub const fn start(&self) -> Option<NaiveDate> {
        match self {
            Self::Instant { .. } => None,
            Self::Duration { start, .. } => Some(*start),
        }
    }

    /// Returns true for point-in-time periods.
    pub const fn is_instant(&self) -> bool {
        matches!(self, Self::Instant { .. })
    }

    /// Length in days for durations.
    pub fn duration_days(&self) -> Option<i64> {
        self.start()
            .map(|start| self.end().signed_duration_since(start).num_days())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant { date } => write!(f, "{}", date),
            Self::Duration { start, end } => write!(f, "{} to {}", start, end),
        }
    }
}

/// A dimensional qualifier (segment or scenario member) on a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    /// Axis, e.g. "srt:ProductOrServiceAxis"
    pub axis: String,
    /// Member or typed value, e.g. "us-gaap:ProductMember"
    pub member: String,
}

/// A resolved XBRL context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Context id as declared
    pub id: String,
    /// Reporting period
    pub period: Period,
    /// Dimensional qualifiers; empty for consolidated totals
    pub dimensions: Vec<Dimension>,
    /// Declaration order in the document (0-based)
    pub order: usize,
}

impl Context {
    /// Returns true when the context has no dimensional qualifiers.
    pub fn is_consolidated(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Broad classification of a unit of measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// ISO 4217 currency
    #[display("currency")]
    Currency,
    /// Share counts
    #[display("shares")]
    Shares,
    /// Currency per share, e.g. EPS
    #[display("per_share")]
    PerShare,
    /// Dimensionless ratio or percentage
    #[display("pure")]
    Pure,
    /// Anything else
    #[display("other")]
    Other,
}

/// A resolved XBRL unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Unit id as declared
    pub id: String,
    /// Measure with prefixes removed, e.g. "USD", "shares", "USD/shares"
    pub measure: String,
    /// Classification of the measure
    pub kind: UnitKind,
}

/// Index of the contexts and units declared in one document.
#[derive(Debug, Clone, Default)]
pub struct ContextIndex {
    contexts: HashMap<String, Context>,
    units: HashMap<String, Unit>,
}

#[derive(Debug)]
enum Field {
    StartDate,
    EndDate,
    Instant,
    Member(String),
    Measure,
}

#[derive(Debug, Default)]
struct ContextBuilder {
    id: String,
    start: Option<String>,
    end: Option<String>,
    instant: Option<String>,
    dimensions: Vec<Dimension>,
}

#[derive(Debug, Default)]
struct UnitBuilder {
    id: String,
    numerator: Vec<String>,
    denominator: Vec<String>,
}

impl ContextIndex {
    /// Scan a document for `context` and `unit` declarations.
    ///
    /// Contexts whose period cannot be parsed are left out of the index, so
    /// any fact pointing at them fails to resolve instead of getting a guessed
    /// period.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = xml::reader(text);
        let mut index = Self::default();
        let mut context: Option<ContextBuilder> = None;
        let mut unit: Option<UnitBuilder> = None;
        let mut field: Option<Field> = None;
        let mut in_denominator = false;
        let mut order = 0;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let local = xml::local_name(&e);
                    let attrs = xml::attributes(&e);
                    match local.as_str() {
                        "context" => {
                            context = Some(ContextBuilder {
                                id: xml::find_attribute(&attrs, "id")
                                    .unwrap_or_default()
                                    .to_string(),
                                ..ContextBuilder::default()
                            });
                        }
                        "startDate" if context.is_some() => field = Some(Field::StartDate),
                        "endDate" if context.is_some() => field = Some(Field::EndDate),
                        "instant" if context.is_some() => field = Some(Field::Instant),
                        "explicitMember" | "typedMember" if context.is_some() => {
                            let axis = xml::find_attribute(&attrs, "dimension")
                                .unwrap_or_default()
                                .to_string();
                            field = Some(Field::Member(axis));
                        }
                        "unit" => {
                            unit = Some(UnitBuilder {
                                id: xml::find_attribute(&attrs, "id")
                                    .unwrap_or_default()
                                    .to_string(),
                                ..UnitBuilder::default()
                            });
                        }
                        "unitDenominator" => in_denominator = true,
                        "measure" if unit.is_some() => field = Some(Field::Measure),
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    // An empty typed member still qualifies the context.
                    if xml::local_name(&e) == "typedMember"
                        && let Some(ctx) = context.as_mut()
                    {
                        let attrs = xml::attributes(&e);
                        ctx.dimensions.push(Dimension {
                            axis: xml::find_attribute(&attrs, "dimension")
                                .unwrap_or_default()
                                .to_string(),
                            member: String::new(),
                        });
                    }
                }
                Event::Text(t) => {
                    if let Some(current) = &field {
                        let value = xml::text(&t);
                        match current {
                            Field::StartDate => set(&mut context, |c| c.start = Some(value)),
                            Field::EndDate => set(&mut context, |c| c.end = Some(value)),
                            Field::Instant => set(&mut context, |c| c.instant = Some(value)),
                            Field::Member(axis) => {
                                let axis = axis.clone();
                                set(&mut context, |c| {
                                    c.dimensions.push(Dimension {
                                        axis,
                                        member: value,
                                    })
                                });
                            }
                            Field::Measure => {
                                if let Some(u) = unit.as_mut() {
                                    if in_denominator {
                                        u.denominator.push(value);
                                    } else {
                                        u.numerator.push(value);
                                    }
                                }
                            }
                        }
                    }
                }
                Event::End(e) => match String::from_utf8_lossy(e.local_name().as_ref()).as_ref() {
                    "context" => {
                        if let Some(builder) = context.take() {
                            if let Some(ctx) = builder.build(order) {
                                index.contexts.insert(ctx.id.clone(), ctx);
                            }
                            order += 1;
                        }
                    }
                    "unit" => {
                        if let Some(builder) = unit.take()
                            && let Some(u) = builder.build()
                        {
                            index.units.insert(u.id.clone(), u);
                        }
                    }
                    "unitDenominator" => in_denominator = false,
                    "startDate" | "endDate" | "instant" | "explicitMember" | "typedMember"
                    | "measure" => field = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        debug!(
            contexts = index.contexts.len(),
            units = index.units.len(),
            "Indexed XBRL contexts and units"
        );
        Ok(index)
    }

    /// Look up a context by id.
    pub fn context(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }

    /// Look up a unit by id.
    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Number of resolvable contexts.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Number of resolvable units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

fn set(context: &mut Option<ContextBuilder>, apply: impl FnOnce(&mut ContextBuilder)) {
    if let Some(ctx) = context.as_mut() {
        apply(ctx);
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

impl ContextBuilder {
    fn build(self, order: usize) -> Option<Context> {
        if self.id.is_empty() {
            warn!("Skipping context without an id");
            return None;
        }

        let period = match (&self.instant, &self.start, &self.end) {
            (Some(instant), _, _) => parse_date(instant).map(|date| Period::Instant { date }),
            (None, Some(start), Some(end)) => match (parse_date(start), parse_date(end)) {
                (Some(start), Some(end)) => Some(Period::Duration { start, end }),
                _ => None,
            },
            _ => None,
        };

        let Some(period) = period else {
            warn!(context = %self.id, "Skipping context with unparseable period");
            return None;
        };

        Some(Context {
            id: self.id,
            period,
            dimensions: self.dimensions,
            order,
        })
    }
}

impl UnitBuilder {
    fn build(self) -> Option<Unit> {
        if self.id.is_empty() || self.numerator.is_empty() {
            warn!(unit = %self.id, "Skipping unit without measures");
            return None;
        }

        let numerator = join_measures(&self.numerator);
        let measure = if self.denominator.is_empty() {
            numerator
        } else {
            format!("{}/{}", numerator, join_measures(&self.denominator))
        };

        let kind = classify_unit(&self.numerator, &self.denominator);

        Some(Unit {
            id: self.id,
            measure,
            kind,
        })
    }
}

fn join_measures(measures: &[String]) -> String {
    measures
        .iter()
        .map(|m| xml::strip_prefix(m.trim()))
        .collect::<Vec<_>>()
        .join("*")
}

fn is_currency(measure: &str) -> bool {
    matches!(xml::split_qname(measure.trim()), (Some(prefix), _) if prefix.eq_ignore_ascii_case("iso4217"))
}

fn is_measure(measure: &str, name: &str) -> bool {
    xml::strip_prefix(measure.trim()).eq_ignore_ascii_case(name)
}

fn classify_unit(numerator: &[String], denominator: &[String]) -> UnitKind {
    match (numerator, denominator) {
        ([n], []) if is_currency(n) => UnitKind::Currency,
        ([n], []) if is_measure(n, "shares") => UnitKind::Shares,
        ([n], []) if is_measure(n, "pure") => UnitKind::Pure,
        ([n], [d]) if is_currency(n) && is_measure(d, "shares") => UnitKind::PerShare,
        _ => UnitKind::Other,
    }
}
