use serde::{Deserialize, Serialize};

pub mod capability;
pub mod config;
pub mod envelope;
pub mod registry;
pub mod research;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use capability::{catalog, CapabilityDescriptor, CapabilityId};
pub use config::{RuntimeConfig, ToolSelection};
pub use envelope::{ContentBlock, InvocationResult};
pub use registry::{compute_active_set, ActiveSet};
pub use research::{
    Citation, CostSummary, ModelVariant, PollOutcome, ResearchStatus, ResearchTask, Submission,
    TaskLifecycle,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No response at all: DNS, connect, reset, or the fixed request timeout.
    #[error("remote endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("remote endpoint rejected the request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },
    /// Success status, but the body cannot be interpreted.
    #[error("unexpected response from remote endpoint: {0}")]
    MalformedSnapshot(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    pub max_characters: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentsOptions {
    pub text: TextOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livecrawl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
    pub num_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<ContentsOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_dollars: Option<serde_json::Value>,
}

/// Body for the contents (crawl) endpoint. Text options sit at the top level here,
/// unlike [`SearchRequest`] where they nest under `contents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentsRequest {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub contents: ContentsOptions,
}

/// Token budget for code context: either let the endpoint decide, or a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBudget {
    Dynamic,
    Fixed(u32),
}

impl TokenBudget {
    pub const MIN: u32 = 1_000;
    pub const MAX: u32 = 50_000;
    pub const DEFAULT: Self = Self::Fixed(5_000);
}

impl Serialize for TokenBudget {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Dynamic => s.serialize_str("dynamic"),
            Self::Fixed(n) => s.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for TokenBudget {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Fixed(u32),
            Named(String),
        }
        match Raw::deserialize(d)? {
            Raw::Fixed(n) if (Self::MIN..=Self::MAX).contains(&n) => Ok(Self::Fixed(n)),
            Raw::Fixed(n) => Err(serde::de::Error::custom(format!(
                "tokens_num must be between {} and {} (got {n})",
                Self::MIN,
                Self::MAX
            ))),
            Raw::Named(s) if s.trim().eq_ignore_ascii_case("dynamic") => Ok(Self::Dynamic),
            Raw::Named(s) => Err(serde::de::Error::custom(format!(
                "tokens_num must be \"dynamic\" or a number (got {s:?})"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeContextRequest {
    pub query: String,
    pub tokens_num: TokenBudget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeContextResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_dollars: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutputOptions {
    pub infer_schema: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSubmitRequest {
    pub instructions: String,
    pub model: ModelVariant,
    pub output: ResearchOutputOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSubmitResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

/// Research task exactly as the poll endpoint reports it.
///
/// Everything is optional here; [`ResearchTask::from_snapshot`] decides which
/// fields the reported status requires.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub citations: Option<serde_json::Value>,
    #[serde(default)]
    pub cost_dollars: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One request per call, no retries. Implementations classify failures into
/// [`Error::Unreachable`], [`Error::RemoteRejected`] and [`Error::MalformedSnapshot`].
#[async_trait::async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse>;
    async fn code_context(&self, req: &CodeContextRequest) -> Result<CodeContextResponse>;
    async fn contents(&self, req: &ContentsRequest) -> Result<SearchResponse>;
    async fn submit_research(&self, req: &ResearchSubmitRequest)
        -> Result<ResearchSubmitResponse>;
    async fn poll_research(&self, task_id: &str) -> Result<ResearchSnapshot>;
}
