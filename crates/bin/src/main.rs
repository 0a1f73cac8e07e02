//! Verity CLI binary.
//!
//! Extracts financial statements from filing documents, searches a local
//! filing catalog and serves the research tools as JSON lines.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use verity::research::{EntityKind, EntityPayload, LocalFilingSource, ResearchTools};
use verity::{
    Extractor, FilingDocument, FilingMetadata, FinancialFact, SearchOptions, ToolsConfig,
};

#[derive(Parser)]
#[command(name = "verity")]
#[command(about = "Verity: source-referenced financial facts from SEC EDGAR", long_about = None)]
#[command(version)]
struct Cli {
    /// Tools configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Match rule file (JSON); overrides the configuration
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the financial statements of a filing document
    Extract {
        #[command(flatten)]
        document: DocumentArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Extract one concept from a filing document
    Concept {
        #[command(flatten)]
        document: DocumentArgs,

        /// Concept name, tag local name, or "all"
        concept: String,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Search the filings listed in a manifest
    Search {
        /// Filing manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,

        /// Free-text query
        query: String,

        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,

        /// Kinds to search (companies, filings, facts)
        #[arg(long = "type", value_delimiter = ',')]
        kinds: Vec<String>,

        /// Only filings filed within this many days
        #[arg(long)]
        within_days: Option<u32>,

        /// Reference date for the window (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Extract every filing first so facts are searchable
        #[arg(long)]
        index: bool,

        /// Fetch the top N results and print their full records
        #[arg(long, default_value = "0")]
        fetch_top: usize,
    },

    /// Serve the research tools as JSON lines on stdin/stdout
    Serve {
        /// Filing manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,

        /// Extract every filing at startup so facts are searchable
        #[arg(long)]
        index: bool,
    },
}

#[derive(Args)]
struct DocumentArgs {
    /// XBRL instance or inline XBRL document
    file: PathBuf,

    /// Central Index Key of the filer
    #[arg(long)]
    cik: String,

    /// Form type (e.g., 10-K)
    #[arg(long)]
    form: String,

    /// Accession number
    #[arg(long)]
    accession: String,

    /// Document name inside the filing folder; the file name when absent
    #[arg(long)]
    document: Option<String>,

    /// Company name
    #[arg(long)]
    company: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.rules)?;

    match cli.command {
        Commands::Extract { document, format } => {
            let document = read_document(&document).await?;
            let extractor = Extractor::new(config.rule_set()?);
            let statements = extractor.extract_statements(&document)?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&statements)?),
                Format::Text => {
                    for statement in statements.iter() {
                        println!("\n== {} ({} facts) ==", statement.kind, statement.len());
                        print_facts(&statement.facts);
                    }
                }
            }
        }
        Commands::Concept {
            document,
            concept,
            format,
        } => {
            let document = read_document(&document).await?;
            let extractor = Extractor::new(config.rule_set()?);
            let facts = extractor.extract_concept(&document, &concept)?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&facts)?),
                Format::Text => {
                    if facts.is_empty() {
                        println!("No facts found for {}", concept);
                    }
                    print_facts(&facts);
                }
            }
        }
        Commands::Search {
            manifest,
            query,
            top_k,
            kinds,
            within_days,
            as_of,
            index,
            fetch_top,
        } => {
            let tools = open_tools(config, &manifest, index).await?;
            let kinds = kinds
                .iter()
                .map(|name| {
                    EntityKind::parse(name).ok_or_else(|| format!("unknown type `{}`", name))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let options = SearchOptions {
                top_k,
                kinds,
                filed_within_days: within_days,
                as_of,
            };

            let response = tools.search(&query, &options)?;
            println!(
                "{} of {} results for \"{}\"",
                response.returned, response.total_found, response.query
            );
            for result in &response.results {
                println!(
                    "{}  {:.2}  {:<7}  {}",
                    result.object_id,
                    result.score,
                    result.kind.to_string(),
                    result.title
                );
                println!("    {}", result.source_url);
            }

            for result in response.results.iter().take(fetch_top) {
                let payload: EntityPayload = tools.fetch(&result.object_id, false).await?;
                println!("\n{}", serde_json::to_string_pretty(&payload)?);
            }
        }
        Commands::Serve { manifest, index } => {
            let tools = open_tools(config, &manifest, index).await?;
            serve(&tools).await?;
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    rules: Option<PathBuf>,
) -> Result<ToolsConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ToolsConfig::from_path(path)?,
        None => ToolsConfig::default(),
    };
    if rules.is_some() {
        config.rules_path = rules;
    }
    Ok(config)
}

async fn read_document(args: &DocumentArgs) -> Result<FilingDocument, Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(&args.file).await?;
    let document_path = match &args.document {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or("document path has no file name")?,
    };

    Ok(FilingDocument::new(
        FilingMetadata {
            cik: args.cik.clone(),
            company_name: args.company.clone(),
            form_type: args.form.clone(),
            accession_number: args.accession.clone(),
            period_end: None,
            filing_date: None,
            document_path,
        },
        text,
    ))
}

async fn open_tools(
    config: ToolsConfig,
    manifest: &Path,
    index: bool,
) -> Result<ResearchTools<LocalFilingSource>, Box<dyn std::error::Error>> {
    let source = LocalFilingSource::from_manifest(manifest).await?;
    let catalog = source.catalog()?;
    let tools = ResearchTools::new(config, catalog, source)?;
    if index {
        let summary = tools.index_filings().await?;
        info!(
            filings = summary.filings,
            facts = summary.facts,
            failed = summary.failed,
            "Index ready"
        );
    }
    Ok(tools)
}

async fn serve(
    tools: &ResearchTools<LocalFilingSource>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Serving research tools on stdin");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = tools.call_json(&line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn print_facts(facts: &[FinancialFact]) {
    for fact in facts {
        println!(
            "{:<40} {:<26} {:>22} {:<10} {}",
            fact.concept,
            fact.period.to_string(),
            fact.value.to_string(),
            fact.unit.measure,
            fact.source.url
        );
    }
}
