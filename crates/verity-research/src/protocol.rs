//! JSON-lines tool protocol.
//!
//! Each request line names a tool and its arguments:
//!
//! ```json
//! {"id": 1, "tool": "search", "arguments": {"query": "Apple 10-K", "top_k": 5}}
//! {"id": 2, "tool": "fetch", "arguments": {"object_ids": ["3f2a9c0d1e4b5a67"]}}
//! {"id": 3, "tool": "extract_statements", "arguments": {"object_id": "3f2a9c0d1e4b5a67"}}
//! {"id": 4, "tool": "extract_concept", "arguments": {"object_id": "3f2a9c0d1e4b5a67", "concept": "Revenue"}}
//! ```
//!
//! Each response line echoes the id and carries either a result or an error.

use crate::error::ResearchError;
use crate::registry::{EntityKind, ObjectHandle};
use crate::source::FilingSource;
use crate::tools::{ResearchTools, SearchOptions};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A tool invocation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolRequest {
    /// Caller-chosen id, echoed in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Tool name
    pub tool: String,

    /// Tool arguments
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of the `search` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    /// Free-text query
    pub query: String,
    /// Results to return
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Kinds to search ("companies", "filings", "financials", ...)
    #[serde(default)]
    pub data_types: Vec<String>,
    /// Filing-date window in days
    #[serde(default)]
    pub date_range_days: Option<u32>,
    /// Reference date for the window
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl SearchArgs {
    /// Convert to search options. Unknown kind names are an error.
    pub fn options(&self) -> Result<SearchOptions, String> {
        let kinds = self
            .data_types
            .iter()
            .map(|name| {
                EntityKind::parse(name).ok_or_else(|| format!("unknown data type `{}`", name))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchOptions {
            top_k: self.top_k,
            kinds,
            filed_within_days: self.date_range_days,
            as_of: self.as_of,
        })
    }
}

/// One handle or several.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ObjectIds {
    /// A single handle
    One(String),
    /// Several handles
    Many(Vec<String>),
}

impl ObjectIds {
    /// The handles, in request order.
    pub fn handles(&self) -> Vec<ObjectHandle> {
        match self {
            Self::One(id) => vec![ObjectHandle::new(id.as_str())],
            Self::Many(ids) => ids.iter().map(|id| ObjectHandle::new(id.as_str())).collect(),
        }
    }
}

/// Arguments of the `fetch` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchArgs {
    /// Handles to fetch
    #[serde(alias = "object_id")]
    pub object_ids: ObjectIds,
    /// Include filing document content
    #[serde(default)]
    pub include_content: bool,
}

/// Arguments of the `extract_statements` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilingArgs {
    /// Filing handle
    pub object_id: String,
}

/// Arguments of the `extract_concept` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConceptArgs {
    /// Filing handle
    pub object_id: String,
    /// Concept name, or "all"
    pub concept: String,
}

/// Error body of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind (e.g., "unknown_handle", "invalid_request")
    pub kind: String,
    /// Error message
    pub message: String,
}

impl From<ResearchError> for ToolError {
    fn from(err: ResearchError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Response to a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The request id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Whether the call succeeded
    pub success: bool,

    /// Result body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    fn ok(id: Option<Value>, result: Value, success: bool) -> Self {
        Self {
            id,
            success,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<Value>, error: ToolError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error),
        }
    }

    fn invalid(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::err(
            id,
            ToolError {
                kind: "invalid_request".to_string(),
                message: message.into(),
            },
        )
    }
}

fn arguments<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("invalid arguments: {}", e))
}

fn respond<T: Serialize>(id: Option<Value>, value: &T, success: bool) -> ToolResponse {
    match serde_json::to_value(value) {
        Ok(result) => ToolResponse::ok(id, result, success),
        Err(e) => ToolResponse::err(id, ResearchError::from(e).into()),
    }
}

impl<S: FilingSource> ResearchTools<S> {
    /// Run one tool invocation.
    pub async fn call(&self, request: ToolRequest) -> ToolResponse {
        let ToolRequest {
            id,
            tool,
            arguments: args,
        } = request;
        debug!(tool = %tool, "Tool call");

        match tool.as_str() {
            "search" => {
                let args = match arguments::<SearchArgs>(args) {
                    Ok(args) => args,
                    Err(message) => return ToolResponse::invalid(id, message),
                };
                let options = match args.options() {
                    Ok(options) => options,
                    Err(message) => return ToolResponse::invalid(id, message),
                };
                match self.search(&args.query, &options) {
                    Ok(response) => respond(id, &response, true),
                    Err(e) => ToolResponse::err(id, e.into()),
                }
            }
            "fetch" => {
                let args = match arguments::<FetchArgs>(args) {
                    Ok(args) => args,
                    Err(message) => return ToolResponse::invalid(id, message),
                };
                let handles = args.object_ids.handles();
                if handles.is_empty() {
                    return ToolResponse::invalid(id, "no object ids given");
                }
                let response = self.fetch_many(&handles, args.include_content).await;
                let success = response.fetched > 0;
                respond(id, &response, success)
            }
            "extract_statements" => {
                let args = match arguments::<FilingArgs>(args) {
                    Ok(args) => args,
                    Err(message) => return ToolResponse::invalid(id, message),
                };
                match self.filing_statements(&ObjectHandle::new(args.object_id)).await {
                    Ok(statements) => respond(id, &statements, true),
                    Err(e) => ToolResponse::err(id, e.into()),
                }
            }
            "extract_concept" => {
                let args = match arguments::<ConceptArgs>(args) {
                    Ok(args) => args,
                    Err(message) => return ToolResponse::invalid(id, message),
                };
                let handle = ObjectHandle::new(args.object_id);
                match self.filing_concept(&handle, &args.concept).await {
                    Ok(facts) => respond(id, &facts, true),
                    Err(e) => ToolResponse::err(id, e.into()),
                }
            }
            other => ToolResponse::invalid(id, format!("unknown tool `{}`", other)),
        }
    }

    /// Run one JSON request line and return the JSON response line.
    pub async fn call_json(&self, line: &str) -> String {
        let response = match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => self.call(request).await,
            Err(e) => ToolResponse::invalid(None, format!("malformed request: {}", e)),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"success":false,"error":{{"kind":"serialization_error","message":{:?}}}}}"#,
                e.to_string()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_search_args() {
        let args: SearchArgs = arguments(serde_json::json!({
            "query": "Apple 10-K",
            "data_types": ["filings", "companies"],
            "date_range_days": 90,
            "as_of": "2024-12-31"
        }))
        .unwrap();
        let options = args.options().unwrap();
        assert_eq!(options.kinds, vec![EntityKind::Filing, EntityKind::Company]);
        assert_eq!(options.filed_within_days, Some(90));
        assert_eq!(options.as_of, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(options.top_k, None);
    }

    #[test]
    fn test_unknown_data_type() {
        let args: SearchArgs =
            arguments(serde_json::json!({"query": "x", "data_types": ["options"]})).unwrap();
        assert!(args.options().unwrap_err().contains("options"));
    }

    #[rstest]
    #[case(serde_json::json!({"object_ids": "abc"}), 1)]
    #[case(serde_json::json!({"object_id": "abc"}), 1)]
    #[case(serde_json::json!({"object_ids": ["abc", "def"]}), 2)]
    #[case(serde_json::json!({"object_ids": []}), 0)]
    fn test_fetch_args(#[case] value: Value, #[case] expected: usize) {
        let args: FetchArgs = arguments(value).unwrap();
        assert_eq!(args.object_ids.handles().len(), expected);
        assert!(!args.include_content);
    }

    #[test]
    fn test_missing_arguments() {
        assert!(arguments::<FilingArgs>(serde_json::json!({})).is_err());
        assert!(arguments::<ConceptArgs>(serde_json::json!({"object_id": "abc"})).is_err());
    }
}
