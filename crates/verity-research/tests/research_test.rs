//! Integration tests for search, fetch and filing extraction

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use futures::future::join_all;
use verity_research::{
    Catalog, CompanyRecord, EntityKind, EntityPayload, FilingRecord, MemoryFilingSource,
    ObjectHandle, ResearchError, ResearchTools, SearchOptions, ToolsConfig,
};
use verity_xbrl::{FilingDocument, FilingMetadata};

const AAPL_10K: &str = include_str!("../../verity-xbrl/tests/fixtures/aapl-20240928.xml");
const MSFT_10Q: &str = include_str!("../../verity-xbrl/tests/fixtures/msft-20240331.htm");

const AAPL_ACCESSION: &str = "0000320193-24-000123";
const MSFT_ACCESSION: &str = "0000950170-24-048288";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn company(cik: &str, name: &str, ticker: &str) -> CompanyRecord {
    CompanyRecord {
        cik: cik.to_string(),
        name: name.to_string(),
        tickers: vec![ticker.to_string()],
        sic: None,
        sic_description: None,
        exchange: Some("Nasdaq".to_string()),
        state: None,
        fiscal_year_end: None,
    }
}

fn aapl_filing() -> FilingRecord {
    FilingRecord {
        cik: "320193".to_string(),
        company: "Apple Inc.".to_string(),
        form_type: "10-K".to_string(),
        accession_number: AAPL_ACCESSION.to_string(),
        filing_date: date(2024, 11, 1),
        period_of_report: Some(date(2024, 9, 28)),
        primary_document: "aapl-20240928.htm".to_string(),
    }
}

fn msft_filing() -> FilingRecord {
    FilingRecord {
        cik: "789019".to_string(),
        company: "MICROSOFT CORP".to_string(),
        form_type: "10-Q".to_string(),
        accession_number: MSFT_ACCESSION.to_string(),
        filing_date: date(2024, 4, 25),
        period_of_report: Some(date(2024, 3, 31)),
        primary_document: "msft-20240331.htm".to_string(),
    }
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .add_company(company("0000320193", "Apple Inc.", "AAPL"))
        .unwrap();
    catalog
        .add_company(company("789019", "MICROSOFT CORP", "MSFT"))
        .unwrap();
    catalog.add_filing(aapl_filing()).unwrap();
    catalog.add_filing(msft_filing()).unwrap();
    catalog
}

fn source() -> MemoryFilingSource {
    let mut source = MemoryFilingSource::new();
    source
        .insert(FilingDocument::new(aapl_filing().metadata(), AAPL_10K))
        .unwrap();
    source
        .insert(FilingDocument::new(msft_filing().metadata(), MSFT_10Q))
        .unwrap();
    source
}

fn tools_with(config: ToolsConfig) -> ResearchTools<MemoryFilingSource> {
    ResearchTools::new(config, catalog(), source()).unwrap()
}

fn tools() -> ResearchTools<MemoryFilingSource> {
    tools_with(ToolsConfig::default())
}

fn as_of_2024() -> SearchOptions {
    SearchOptions {
        as_of: Some(date(2024, 12, 31)),
        ..SearchOptions::default()
    }
}

fn filing_handle(tools: &ResearchTools<MemoryFilingSource>, query: &str) -> ObjectHandle {
    let options = SearchOptions {
        kinds: vec![EntityKind::Filing],
        ..as_of_2024()
    };
    tools.search(query, &options).unwrap().results[0]
        .object_id
        .clone()
}

#[test]
fn test_search_ranks_filing_with_named_form_first() {
    let tools = tools();
    let response = tools.search("Apple 10-K", &as_of_2024()).unwrap();

    assert_eq!(response.total_found, 2);
    assert_eq!(response.returned, 2);
    assert_eq!(response.kinds_searched, EntityKind::ALL.to_vec());

    let filing = &response.results[0];
    assert_eq!(filing.kind, EntityKind::Filing);
    assert_eq!(filing.score, 1.0);
    assert_eq!(filing.title, "Apple Inc. - 10-K");
    assert_eq!(filing.natural_key, AAPL_ACCESSION);
    assert_eq!(filing.fiscal_period.as_deref(), Some("FY2024"));
    assert_eq!(
        filing.source_url,
        "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/0000320193-24-000123-index.htm"
    );

    let company = &response.results[1];
    assert_eq!(company.kind, EntityKind::Company);
    assert_eq!(company.score, 0.5);
    assert_eq!(company.natural_key, "320193");
    assert_eq!(company.form_type.as_deref(), Some("10-K"));
    assert_eq!(company.source_url, filing.source_url);

    assert_eq!(tools.registry().len().unwrap(), 2);
}

#[test]
fn test_search_is_deterministic_across_sessions() {
    let first = tools().search("Apple revenue", &as_of_2024()).unwrap();
    let second = tools().search("Apple revenue", &as_of_2024()).unwrap();

    assert!(!first.results.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_search_filters() {
    let tools = tools();

    let none = tools.search("Tesla", &as_of_2024()).unwrap();
    assert_eq!(none.total_found, 0);
    assert!(none.results.is_empty());

    let companies = SearchOptions {
        kinds: vec![EntityKind::Company],
        ..as_of_2024()
    };
    let response = tools.search("microsoft msft", &companies).unwrap();
    assert_eq!(response.returned, 1);
    assert_eq!(response.results[0].title, "MICROSOFT CORP");

    let recent = SearchOptions {
        kinds: vec![EntityKind::Filing],
        filed_within_days: Some(90),
        ..as_of_2024()
    };
    let response = tools.search("10-K 10-Q", &recent).unwrap();
    assert_eq!(response.returned, 1);
    assert_eq!(response.results[0].natural_key, AAPL_ACCESSION);

    let top_one = SearchOptions {
        top_k: Some(1),
        ..as_of_2024()
    };
    let response = tools.search("Apple", &top_one).unwrap();
    assert_eq!(response.total_found, 2);
    assert_eq!(response.returned, 1);
}

#[tokio::test]
async fn test_date_window_wider_than_the_calendar() {
    let tools = tools();

    let unbounded = SearchOptions {
        kinds: vec![EntityKind::Filing],
        filed_within_days: Some(u32::MAX),
        ..as_of_2024()
    };
    let response = tools.search("10-K 10-Q", &unbounded).unwrap();
    assert_eq!(response.returned, 2);

    let line = serde_json::json!({
        "id": 7,
        "tool": "search",
        "arguments": {
            "query": "Apple 10-K",
            "data_types": ["filings"],
            "date_range_days": u32::MAX,
            "as_of": "2024-12-31"
        }
    })
    .to_string();
    let response: serde_json::Value = serde_json::from_str(&tools.call_json(&line).await).unwrap();
    assert_eq!(response["id"], 7);
    assert_eq!(response["success"], true);
    assert_eq!(response["result"]["results"][0]["natural_key"], AAPL_ACCESSION);
}

#[tokio::test]
async fn test_fetch_filing_with_content() {
    let tools = tools();
    let handle = filing_handle(&tools, "Apple 10-K");

    let EntityPayload::Filing(filing) = tools.fetch(&handle, false).await.unwrap() else {
        panic!("expected a filing");
    };
    assert_eq!(filing.accession_number, AAPL_ACCESSION);
    assert_eq!(filing.cik, "320193");
    assert!(filing.content.is_none());

    let EntityPayload::Filing(filing) = tools.fetch(&handle, true).await.unwrap() else {
        panic!("expected a filing");
    };
    assert_eq!(filing.content.as_deref(), Some(AAPL_10K));
    assert!(!filing.content_truncated);
}

#[tokio::test]
async fn test_fetch_truncates_content() {
    let tools = tools_with(ToolsConfig {
        content_limit: 100,
        ..ToolsConfig::default()
    });
    let handle = filing_handle(&tools, "Apple 10-K");

    let EntityPayload::Filing(filing) = tools.fetch(&handle, true).await.unwrap() else {
        panic!("expected a filing");
    };
    assert!(filing.content_truncated);
    assert_eq!(filing.content.unwrap().chars().count(), 100);
}

#[tokio::test]
async fn test_fetch_rejects_fabricated_handles() {
    let tools = tools();
    let handle = filing_handle(&tools, "Apple 10-K");
    let fabricated = ObjectHandle::new("fabricated-id-123");

    let err = tools.fetch(&fabricated, false).await.unwrap_err();
    assert!(matches!(err, ResearchError::UnknownHandle(_)));

    let response = tools
        .fetch_many(&[fabricated.clone(), handle.clone()], false)
        .await;
    assert_eq!(response.fetched, 1);
    assert_eq!(response.failed, 1);
    assert_eq!(response.errors[0].object_id, fabricated);
    assert_eq!(response.errors[0].kind, "unknown_handle");
}

#[tokio::test]
async fn test_concurrent_fetches_agree() {
    let tools = tools();
    let handle = filing_handle(&tools, "Apple 10-K");

    let payloads = join_all((0..8).map(|_| tools.fetch(&handle, false))).await;
    let first = payloads[0].as_ref().unwrap();
    assert!(payloads.iter().all(|p| p.as_ref().unwrap() == first));
}

#[tokio::test]
async fn test_filing_statements_make_facts_searchable() {
    let tools = tools();
    let handle = filing_handle(&tools, "Apple 10-K");

    let statements = tools.filing_statements(&handle).await.unwrap();
    assert_eq!(statements.fact_count(), 21);

    let facts = SearchOptions {
        kinds: vec![EntityKind::Fact],
        top_k: Some(5),
        ..as_of_2024()
    };
    let response = tools.search("Apple revenue", &facts).unwrap();
    assert_eq!(response.returned, 5);

    let best: Vec<&str> = response
        .results
        .iter()
        .filter(|r| r.score == 1.0)
        .map(|r| r.natural_key.as_str())
        .collect();
    assert_eq!(best.len(), 3);
    assert!(best.iter().all(|key| key.starts_with(AAPL_ACCESSION)));
    assert!(best[0].contains(":CostOfRevenue:"));

    let EntityPayload::Fact(fact) = tools
        .fetch(&response.results[2].object_id, false)
        .await
        .unwrap()
    else {
        panic!("expected a fact");
    };
    assert_eq!(fact.company, "Apple Inc.");
    assert_eq!(fact.fact.concept, "Revenue");
    assert_eq!(fact.fact.value, BigDecimal::from(391_035_000_000_i64));
    assert!(
        fact.source_url
            .starts_with("https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/")
    );
}

#[tokio::test]
async fn test_filing_concept() {
    let tools = tools();
    let handle = filing_handle(&tools, "MICROSOFT 10-Q");

    let facts = tools.filing_concept(&handle, "Revenue").await.unwrap();
    assert_eq!(facts.len(), 2);
    assert!(facts.iter().all(|f| f.form_type == "10-Q"));
}

#[tokio::test]
async fn test_extraction_requires_filing_handle() {
    let tools = tools();
    let companies = SearchOptions {
        kinds: vec![EntityKind::Company],
        ..as_of_2024()
    };
    let company = tools.search("Apple", &companies).unwrap().results[0]
        .object_id
        .clone();

    let err = tools.filing_statements(&company).await.unwrap_err();
    assert!(matches!(err, ResearchError::NotFound(_)));

    let err = tools
        .filing_statements(&ObjectHandle::new("fabricated-id-123"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unknown_handle");
}

#[tokio::test]
async fn test_index_filings_skips_failures() {
    let mut catalog = catalog();
    catalog
        .add_filing(FilingRecord {
            accession_number: "0000320193-24-000081".to_string(),
            form_type: "10-Q".to_string(),
            filing_date: date(2024, 8, 2),
            ..aapl_filing()
        })
        .unwrap();
    let tools = ResearchTools::new(ToolsConfig::default(), catalog, source()).unwrap();

    let summary = tools.index_filings().await.unwrap();
    assert_eq!(summary.filings, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.facts > 21);
}

#[tokio::test]
async fn test_json_line_protocol() {
    let tools = tools();

    let line = r#"{"id": 1, "tool": "search", "arguments": {"query": "Apple 10-K", "data_types": ["filings"], "as_of": "2024-12-31"}}"#;
    let response: serde_json::Value = serde_json::from_str(&tools.call_json(line).await).unwrap();
    assert_eq!(response["id"], 1);
    assert_eq!(response["success"], true);
    let object_id = response["result"]["results"][0]["object_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(response["result"]["results"][0]["type"], "filing");

    let line = serde_json::json!({
        "id": 2,
        "tool": "extract_concept",
        "arguments": {"object_id": object_id, "concept": "Revenue"}
    })
    .to_string();
    let response: serde_json::Value = serde_json::from_str(&tools.call_json(&line).await).unwrap();
    assert_eq!(response["success"], true);
    assert_eq!(response["result"][0]["value"], "391035000000");

    let line = r#"{"id": 3, "tool": "fetch", "arguments": {"object_ids": ["fabricated-id-123"]}}"#;
    let response: serde_json::Value = serde_json::from_str(&tools.call_json(line).await).unwrap();
    assert_eq!(response["success"], false);
    assert_eq!(response["result"]["errors"][0]["kind"], "unknown_handle");

    let response: serde_json::Value =
        serde_json::from_str(&tools.call_json(r#"{"tool": "delete"}"#).await).unwrap();
    assert_eq!(response["error"]["kind"], "invalid_request");

    let response: serde_json::Value =
        serde_json::from_str(&tools.call_json("not json").await).unwrap();
    assert_eq!(response["success"], false);
    assert_eq!(response["error"]["kind"], "invalid_request");
}
