//! Statement assembly.
//!
//! Groups referenced facts into income statement, balance sheet and cash flow
//! statement views. Classification is by canonical concept name using a fixed
//! table whose order is also the presentation order within each statement.
//! Facts whose concept is not in the table are kept under
//! [`FinancialStatements::other`] rather than dropped.

use crate::context::Period;
use crate::fact::FinancialFact;
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Kind of financial statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Income statement
    #[display("income")]
    Income,
    /// Balance sheet
    #[display("balance")]
    Balance,
    /// Cash flow statement
    #[display("cash_flow")]
    CashFlow,
    /// Facts that belong to no primary statement
    #[display("other")]
    Other,
}

use StatementKind::{Balance, CashFlow, Income};

/// Concept classification in presentation order.
const CLASSIFICATION: &[(&str, StatementKind)] = &[
    ("Revenue", Income),
    ("CostOfRevenue", Income),
    ("GrossProfit", Income),
    ("ResearchAndDevelopmentExpense", Income),
    ("SellingGeneralAndAdministrativeExpense", Income),
    ("OperatingExpenses", Income),
    ("OperatingIncomeLoss", Income),
    ("NonoperatingIncomeExpense", Income),
    ("IncomeBeforeIncomeTaxes", Income),
    ("IncomeTaxExpenseBenefit", Income),
    ("NetIncomeLoss", Income),
    ("EarningsPerShareBasic", Income),
    ("EarningsPerShareDiluted", Income),
    ("WeightedAverageSharesBasic", Income),
    ("WeightedAverageSharesDiluted", Income),
    ("CashAndCashEquivalents", Balance),
    ("ShortTermInvestments", Balance),
    ("AccountsReceivable", Balance),
    ("Inventory", Balance),
    ("AssetsCurrent", Balance),
    ("PropertyPlantAndEquipmentNet", Balance),
    ("Goodwill", Balance),
    ("Assets", Balance),
    ("AccountsPayable", Balance),
    ("LiabilitiesCurrent", Balance),
    ("LongTermDebt", Balance),
    ("Liabilities", Balance),
    ("StockholdersEquity", Balance),
    ("LiabilitiesAndStockholdersEquity", Balance),
    ("NetCashFromOperatingActivities", CashFlow),
    ("DepreciationAndAmortization", CashFlow),
    ("ShareBasedCompensation", CashFlow),
    ("CapitalExpenditures", CashFlow),
    ("NetCashFromInvestingActivities", CashFlow),
    ("RepurchaseOfCommonStock", CashFlow),
    ("PaymentsOfDividends", CashFlow),
    ("NetCashFromFinancingActivities", CashFlow),
    ("CashPeriodIncreaseDecrease", CashFlow),
];

fn lookup(concept: &str) -> Option<(usize, StatementKind)> {
    CLASSIFICATION
        .iter()
        .position(|(name, _)| name.eq_ignore_ascii_case(concept))
        .map(|i| (i, CLASSIFICATION[i].1))
}

/// Statement a concept belongs to.
pub fn classify(concept: &str) -> StatementKind {
    lookup(concept).map_or(StatementKind::Other, |(_, kind)| kind)
}

/// One statement: its facts and the periods they cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Statement kind
    pub kind: StatementKind,
    /// Distinct periods, most recent first
    pub periods: Vec<Period>,
    /// Facts in presentation order, most recent period first within a concept
    pub facts: Vec<FinancialFact>,
}

impl Statement {
    /// An empty statement.
    pub const fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            periods: Vec::new(),
            facts: Vec::new(),
        }
    }

    /// Returns true if no facts were assigned.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true when facts span more than one period.
    pub fn is_multi_period(&self) -> bool {
        self.periods.len() > 1
    }

    /// Facts for one concept, most recent first.
    pub fn concept(&self, concept: &str) -> Vec<&FinancialFact> {
        self.facts
            .iter()
            .filter(|f| f.concept.eq_ignore_ascii_case(concept))
            .collect()
    }

    /// Facts reported for one period.
    pub fn period(&self, period: &Period) -> Vec<&FinancialFact> {
        self.facts.iter().filter(|f| &f.period == period).collect()
    }

    fn collect_periods(&mut self) {
        let mut periods: Vec<Period> = Vec::new();
        for fact in &self.facts {
            if !periods.contains(&fact.period) {
                periods.push(fact.period);
            }
        }
        periods.sort_by_key(|p| (Reverse(p.end()), Reverse(p.duration_days().unwrap_or(0))));
        self.periods = periods;
    }
}

/// The statements assembled from one filing document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    /// Income statement
    pub income: Statement,
    /// Balance sheet
    pub balance: Statement,
    /// Cash flow statement
    pub cash_flow: Statement,
    /// Unclassified facts, in document order
    pub other: Statement,
}

impl Default for FinancialStatements {
    fn default() -> Self {
        Self {
            income: Statement::new(StatementKind::Income),
            balance: Statement::new(StatementKind::Balance),
            cash_flow: Statement::new(StatementKind::CashFlow),
            other: Statement::new(StatementKind::Other),
        }
    }
}

impl FinancialStatements {
    /// Statements in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        [&self.income, &self.balance, &self.cash_flow, &self.other].into_iter()
    }

    /// Statement by kind.
    pub const fn get(&self, kind: StatementKind) -> &Statement {
        match kind {
            StatementKind::Income => &self.income,
            StatementKind::Balance => &self.balance,
            StatementKind::CashFlow => &self.cash_flow,
            StatementKind::Other => &self.other,
        }
    }

    /// All facts across statements.
    pub fn facts(&self) -> impl Iterator<Item = &FinancialFact> {
        self.iter().flat_map(|s| s.facts.iter())
    }

    /// Total number of facts.
    pub fn fact_count(&self) -> usize {
        self.iter().map(Statement::len).sum()
    }

    /// Returns true if no facts were assembled.
    pub fn is_empty(&self) -> bool {
        self.fact_count() == 0
    }
}

/// Table rank, then newest period, then longest duration, then input order.
type SortKey = (usize, Reverse<NaiveDate>, Reverse<i64>, usize);

/// Assemble facts into statements.
///
/// Within a statement, concepts follow the classification table. A concept
/// reported for several periods lists the most recent period first, and the
/// longer duration first when two periods end on the same day. Every input
/// fact lands in exactly one statement.
pub fn assemble(facts: Vec<FinancialFact>) -> FinancialStatements {
    let mut statements = FinancialStatements::default();
    let mut classified: Vec<(SortKey, FinancialFact)> = Vec::new();

    for (position, fact) in facts.into_iter().enumerate() {
        match lookup(&fact.concept) {
            Some((rank, _)) => {
                let key = (
                    rank,
                    Reverse(fact.period.end()),
                    Reverse(fact.duration_days().unwrap_or(0)),
                    position,
                );
                classified.push((key, fact));
            }
            None => statements.other.facts.push(fact),
        }
    }

    classified.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut by_kind: HashMap<StatementKind, Vec<FinancialFact>> = HashMap::new();
    for (_, fact) in classified {
        by_kind.entry(classify(&fact.concept)).or_default().push(fact);
    }

    for (kind, facts) in by_kind {
        match kind {
            StatementKind::Income => statements.income.facts = facts,
            StatementKind::Balance => statements.balance.facts = facts,
            StatementKind::CashFlow => statements.cash_flow.facts = facts,
            StatementKind::Other => statements.other.facts.extend(facts),
        }
    }

    statements.income.collect_periods();
    statements.balance.collect_periods();
    statements.cash_flow.collect_periods();
    statements.other.collect_periods();
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Unit, UnitKind};
    use crate::fact::SourceReference;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(concept: &str, period: Period, value: i64) -> FinancialFact {
        FinancialFact {
            concept: concept.to_string(),
            tag: format!("us-gaap:{}", concept),
            value: BigDecimal::from(value),
            raw_value: value.to_string(),
            unit: Unit {
                id: "usd".to_string(),
                measure: "USD".to_string(),
                kind: UnitKind::Currency,
            },
            period,
            decimals: None,
            scale: None,
            dimensions: Vec::new(),
            context_id: "c".to_string(),
            form_type: "10-K".to_string(),
            source: SourceReference {
                url: "https://www.sec.gov/Archives/edgar/data/1/000000000124000001/a.htm"
                    .to_string(),
                accession_number: "0000000001-24-000001".to_string(),
                form_type: "10-K".to_string(),
                document_path: "a.htm".to_string(),
                anchor: None,
            },
        }
    }

    fn fy(year: i32) -> Period {
        Period::Duration {
            start: date(year - 1, 10, 1),
            end: date(year, 9, 28),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Revenue"), StatementKind::Income);
        assert_eq!(classify("assets"), StatementKind::Balance);
        assert_eq!(classify("CapitalExpenditures"), StatementKind::CashFlow);
        assert_eq!(classify("IncomeTaxesPaidNet"), StatementKind::Other);
        assert_eq!(StatementKind::CashFlow.to_string(), "cash_flow");
    }

    #[test]
    fn test_assemble_orders_concepts_and_periods() {
        let q4 = Period::Duration {
            start: date(2024, 6, 30),
            end: date(2024, 9, 28),
        };
        let facts = vec![
            fact("NetIncomeLoss", fy(2023), 96995),
            fact("Revenue", fy(2023), 383285),
            fact("IncomeTaxesPaidNet", fy(2024), 26102),
            fact("Revenue", q4, 94930),
            fact("Revenue", fy(2024), 391035),
            fact("Assets", Period::Instant { date: date(2024, 9, 28) }, 364980),
            fact("NetIncomeLoss", fy(2024), 93736),
        ];

        let statements = assemble(facts);
        assert_eq!(statements.fact_count(), 7);

        let income: Vec<(&str, BigDecimal)> = statements
            .income
            .facts
            .iter()
            .map(|f| (f.concept.as_str(), f.value.clone()))
            .collect();
        assert_eq!(
            income,
            vec![
                ("Revenue", BigDecimal::from(391035)),
                ("Revenue", BigDecimal::from(94930)),
                ("Revenue", BigDecimal::from(383285)),
                ("NetIncomeLoss", BigDecimal::from(93736)),
                ("NetIncomeLoss", BigDecimal::from(96995)),
            ]
        );
        assert!(statements.income.is_multi_period());
        assert_eq!(statements.income.periods[0], fy(2024));
        assert_eq!(statements.income.periods[1], q4);

        assert_eq!(statements.balance.len(), 1);
        assert!(!statements.balance.is_multi_period());
        assert!(statements.cash_flow.is_empty());
        assert_eq!(statements.other.facts[0].concept, "IncomeTaxesPaidNet");
        assert_eq!(statements.income.concept("revenue").len(), 3);
        assert_eq!(statements.income.period(&fy(2023)).len(), 2);
    }

    #[test]
    fn test_assemble_empty() {
        let statements = assemble(Vec::new());
        assert!(statements.is_empty());
        assert_eq!(statements.iter().count(), 4);
        assert_eq!(statements.get(StatementKind::Balance).kind, StatementKind::Balance);
    }
}
