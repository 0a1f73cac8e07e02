#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/verity/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod scoring;
pub mod source;
pub mod tools;

pub use catalog::{Catalog, CompanyRecord, FactRecord, FilingRecord};
pub use config::ToolsConfig;
pub use error::{ProviderError, ResearchError, Result};
pub use protocol::{ToolError, ToolRequest, ToolResponse};
pub use registry::{EntityKind, EntityRef, ObjectHandle, ObjectRegistry, RegistryConfig};
pub use source::{FilingSource, LocalFilingSource, Manifest, MemoryFilingSource};
pub use tools::{
    EntityPayload, FetchResponse, ResearchTools, SearchOptions, SearchResponse, SearchResult,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
