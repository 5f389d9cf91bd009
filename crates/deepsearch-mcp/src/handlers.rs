//! Capability handlers.
//!
//! Every handler parses its arguments, makes exactly one remote request (or one lifecycle
//! call), and folds the outcome into an [`InvocationResult`]. Errors never escape `invoke`.

use serde::Deserialize;
use std::sync::Arc;

use deepsearch_core::{
    research::canonical_result_text, CapabilityId, ContentsOptions, ContentsRequest, Error,
    InvocationResult, ModelVariant, PollOutcome, RemoteEndpoint, Result, SearchRequest,
    TaskLifecycle, TextOptions, TokenBudget,
};

use crate::envelope::{error_result, no_result};

const MAX_RESULTS: usize = 50;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct WebSearchArgs {
    /// Search query.
    pub query: String,
    /// Number of results to return (default: 8, max: 50).
    #[serde(default, alias = "numResults")]
    pub num_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct CodeContextArgs {
    /// What to look up, e.g. "axum middleware that adds a request id".
    pub query: String,
    /// Token budget: "dynamic", or a number between 1000 and 50000 (default: 5000).
    #[serde(default, alias = "tokensNum")]
    pub tokens_num: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct CompanyResearchArgs {
    /// Company name, e.g. "Anthropic" or "Stripe".
    #[serde(alias = "companyName")]
    pub company_name: String,
    /// Number of sources to return (default: 5, max: 50).
    #[serde(default, alias = "numResults")]
    pub num_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct CrawlingArgs {
    /// Absolute http(s) URL to fetch.
    pub url: String,
    /// Maximum characters of page text to return (default: 3000).
    #[serde(default, alias = "maxCharacters")]
    pub max_characters: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum LinkedinScope {
    Profiles,
    Companies,
    #[default]
    All,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct LinkedinSearchArgs {
    /// Who or what to find, e.g. "rust compiler engineers in Berlin".
    pub query: String,
    /// Restrict to people profiles, company pages, or both (default: all).
    #[serde(default, alias = "searchType")]
    pub search_type: Option<LinkedinScope>,
    /// Number of results to return (default: 5, max: 50).
    #[serde(default, alias = "numResults")]
    pub num_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct DeepResearchStartArgs {
    /// The research question and any constraints on the answer.
    pub instructions: String,
    /// "exa-research" (default, faster) or "exa-research-pro" (more thorough).
    #[serde(default)]
    pub model: Option<String>,
    /// Ask the service to infer a structured output schema (default: false).
    #[serde(default, alias = "inferOutputSchema", alias = "inferSchema")]
    pub infer_output_schema: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "stdio", derive(schemars::JsonSchema))]
pub struct DeepResearchCheckArgs {
    /// Task id returned by deep_researcher_start.
    #[serde(alias = "taskId")]
    pub task_id: String,
}

/// Handler bound to one capability. One variant per [`CapabilityId`].
#[derive(Clone)]
pub enum Handler {
    WebSearch(Arc<dyn RemoteEndpoint>),
    CodeContext(Arc<dyn RemoteEndpoint>),
    CompanyResearch(Arc<dyn RemoteEndpoint>),
    Crawling(Arc<dyn RemoteEndpoint>),
    LinkedinSearch(Arc<dyn RemoteEndpoint>),
    DeepResearchStart(TaskLifecycle),
    DeepResearchCheck(TaskLifecycle),
}

impl Handler {
    pub fn for_capability(id: CapabilityId, endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        match id {
            CapabilityId::WebSearch => Self::WebSearch(endpoint),
            CapabilityId::GetCodeContext => Self::CodeContext(endpoint),
            CapabilityId::CompanyResearch => Self::CompanyResearch(endpoint),
            CapabilityId::Crawling => Self::Crawling(endpoint),
            CapabilityId::LinkedinSearch => Self::LinkedinSearch(endpoint),
            CapabilityId::DeepResearcherStart => {
                Self::DeepResearchStart(TaskLifecycle::new(endpoint))
            }
            CapabilityId::DeepResearcherCheck => {
                Self::DeepResearchCheck(TaskLifecycle::new(endpoint))
            }
        }
    }

    pub fn capability(&self) -> CapabilityId {
        match self {
            Self::WebSearch(_) => CapabilityId::WebSearch,
            Self::CodeContext(_) => CapabilityId::GetCodeContext,
            Self::CompanyResearch(_) => CapabilityId::CompanyResearch,
            Self::Crawling(_) => CapabilityId::Crawling,
            Self::LinkedinSearch(_) => CapabilityId::LinkedinSearch,
            Self::DeepResearchStart(_) => CapabilityId::DeepResearcherStart,
            Self::DeepResearchCheck(_) => CapabilityId::DeepResearcherCheck,
        }
    }

    pub async fn invoke(&self, args: serde_json::Value) -> InvocationResult {
        self.run(args)
            .await
            .unwrap_or_else(|e| error_result(self.capability(), &e))
    }

    async fn run(&self, args: serde_json::Value) -> Result<InvocationResult> {
        match self {
            Self::WebSearch(ep) => web_search(ep.as_ref(), parse_args(args)?).await,
            Self::CodeContext(ep) => code_context(ep.as_ref(), parse_args(args)?).await,
            Self::CompanyResearch(ep) => company_research(ep.as_ref(), parse_args(args)?).await,
            Self::Crawling(ep) => crawling(ep.as_ref(), parse_args(args)?).await,
            Self::LinkedinSearch(ep) => linkedin_search(ep.as_ref(), parse_args(args)?).await,
            Self::DeepResearchStart(lc) => deep_research_start(lc, parse_args(args)?).await,
            Self::DeepResearchCheck(lc) => deep_research_check(lc, parse_args(args)?).await,
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> Result<T> {
    let args = if args.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| Error::InvalidArguments(e.to_string()))
}

fn non_empty<'a>(field: &str, v: &'a str) -> Result<&'a str> {
    let v = v.trim();
    if v.is_empty() {
        return Err(Error::InvalidArguments(format!("{field} must not be empty")));
    }
    Ok(v)
}

fn result_count(n: Option<usize>, default: usize) -> Result<usize> {
    match n.unwrap_or(default) {
        0 => Err(Error::InvalidArguments(
            "num_results must be at least 1".to_string(),
        )),
        n => Ok(n.min(MAX_RESULTS)),
    }
}

fn text_contents(max_characters: usize, livecrawl: Option<&str>) -> ContentsOptions {
    ContentsOptions {
        text: TextOptions { max_characters },
        livecrawl: livecrawl.map(str::to_string),
    }
}

async fn web_search(ep: &dyn RemoteEndpoint, args: WebSearchArgs) -> Result<InvocationResult> {
    let query = non_empty("query", &args.query)?;
    let req = SearchRequest {
        query: query.to_string(),
        search_type: Some("auto".to_string()),
        num_results: result_count(args.num_results, 8)?,
        category: None,
        include_domains: Vec::new(),
        contents: Some(text_contents(10_000, Some("fallback"))),
    };
    let resp = ep.search(&req).await?;
    if resp.results.is_empty() {
        return Ok(no_result(format!("No search results found for {query:?}.")));
    }
    Ok(InvocationResult::json(&resp))
}

async fn code_context(ep: &dyn RemoteEndpoint, args: CodeContextArgs) -> Result<InvocationResult> {
    let query = non_empty("query", &args.query)?;
    let tokens_num = match args.tokens_num {
        None | Some(serde_json::Value::Null) => TokenBudget::DEFAULT,
        Some(v) => serde_json::from_value(v).map_err(|e| Error::InvalidArguments(e.to_string()))?,
    };
    let resp = ep
        .code_context(&deepsearch_core::CodeContextRequest {
            query: query.to_string(),
            tokens_num,
        })
        .await?;
    if resp.response.trim().is_empty() {
        return Ok(no_result(format!("No code context found for {query:?}.")));
    }
    Ok(InvocationResult::text(resp.response))
}

async fn company_research(
    ep: &dyn RemoteEndpoint,
    args: CompanyResearchArgs,
) -> Result<InvocationResult> {
    let company = non_empty("company_name", &args.company_name)?;
    let req = SearchRequest {
        query: format!("{company} company"),
        search_type: Some("auto".to_string()),
        num_results: result_count(args.num_results, 5)?,
        category: Some("company".to_string()),
        include_domains: Vec::new(),
        contents: Some(text_contents(7_000, None)),
    };
    let resp = ep.search(&req).await?;
    if resp.results.is_empty() {
        return Ok(no_result(format!(
            "No company information found for {company:?}."
        )));
    }
    Ok(InvocationResult::json(&resp))
}

async fn crawling(ep: &dyn RemoteEndpoint, args: CrawlingArgs) -> Result<InvocationResult> {
    let raw = non_empty("url", &args.url)?;
    let url = url::Url::parse(raw)
        .map_err(|e| Error::InvalidArguments(format!("url {raw:?} is not valid: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidArguments(format!(
            "url must be http or https (got {})",
            url.scheme()
        )));
    }
    let req = ContentsRequest {
        ids: vec![url.to_string()],
        contents: text_contents(args.max_characters.unwrap_or(3_000).max(1), Some("preferred")),
    };
    let resp = ep.contents(&req).await?;
    if resp.results.is_empty() {
        return Ok(InvocationResult::text(format!(
            "No content could be retrieved from {url}. The page may be unavailable or blocked."
        )));
    }
    Ok(InvocationResult::json(&resp))
}

async fn linkedin_search(
    ep: &dyn RemoteEndpoint,
    args: LinkedinSearchArgs,
) -> Result<InvocationResult> {
    let query = non_empty("query", &args.query)?;
    let scoped = match args.search_type.unwrap_or_default() {
        LinkedinScope::Profiles => format!("{query} LinkedIn profile"),
        LinkedinScope::Companies => format!("{query} LinkedIn company page"),
        LinkedinScope::All => format!("{query} LinkedIn"),
    };
    let req = SearchRequest {
        query: scoped,
        search_type: Some("auto".to_string()),
        num_results: result_count(args.num_results, 5)?,
        category: None,
        include_domains: vec!["linkedin.com".to_string()],
        contents: Some(text_contents(1_000, None)),
    };
    let resp = ep.search(&req).await?;
    if resp.results.is_empty() {
        return Ok(no_result(format!("No LinkedIn results found for {query:?}.")));
    }
    Ok(InvocationResult::json(&resp))
}

async fn deep_research_start(
    lc: &TaskLifecycle,
    args: DeepResearchStartArgs,
) -> Result<InvocationResult> {
    let model = match args.model.as_deref().map(str::trim) {
        None | Some("") => ModelVariant::default(),
        Some(m) => serde_json::from_value(serde_json::Value::String(m.to_string())).map_err(
            |_| {
                Error::InvalidArguments(format!(
                    "model must be \"exa-research\" or \"exa-research-pro\" (got {m:?})"
                ))
            },
        )?,
    };
    let sub = lc
        .submit(
            &args.instructions,
            model,
            args.infer_output_schema.unwrap_or(false),
        )
        .await?;
    tracing::debug!(task_id = %sub.task_id, model = model.as_str(), "research task submitted");

    let mut payload = serde_json::json!({
        "taskId": sub.task_id,
        "model": sub.model.as_str(),
        "status": "running",
        "nextStep": format!(
            "Call deep_researcher_check with taskId \"{}\" until the status is completed or failed.",
            sub.task_id
        ),
    });
    if let Some(schema) = sub.output_schema {
        payload["outputSchema"] = schema;
    }
    Ok(InvocationResult::json(&payload))
}

async fn deep_research_check(
    lc: &TaskLifecycle,
    args: DeepResearchCheckArgs,
) -> Result<InvocationResult> {
    match lc.poll(&args.task_id).await? {
        PollOutcome::Running(task) => {
            let mut payload = serde_json::json!({
                "taskId": task.id,
                "status": "running",
                "message": "Research is still in progress. Call deep_researcher_check again later with the same taskId.",
            });
            if let Some(created) = task.created_at {
                payload["createdAt"] = serde_json::json!(created.to_rfc3339());
            }
            if let Some(partial) = task.data.as_ref() {
                payload["partial"] = serde_json::json!(canonical_result_text(partial));
            }
            Ok(InvocationResult::json(&payload))
        }
        PollOutcome::Completed { task, report } => {
            let mut out = InvocationResult::text(report);
            if let Some(extra) = sources_and_cost(&task) {
                out = out.push_text(extra);
            }
            Ok(out)
        }
        PollOutcome::Failed(task) => {
            tracing::warn!(
                capability = CapabilityId::DeepResearcherCheck.as_str(),
                code = "task_failed",
                retryable = false,
                task_id = %task.id,
                "capability invocation failed"
            );
            Ok(InvocationResult::error(match task.error {
                Some(detail) => format!("Research task {} failed: {detail}", task.id),
                None => format!("Research task {} failed, no further detail.", task.id),
            }))
        }
    }
}

fn sources_and_cost(task: &deepsearch_core::ResearchTask) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    if let Some(citations) = task.citations.as_ref() {
        let mut seen: Vec<&str> = Vec::new();
        for c in citations.values().flatten() {
            if seen.contains(&c.url.as_str()) {
                continue;
            }
            seen.push(&c.url);
            match c.title.as_deref() {
                Some(t) if !t.trim().is_empty() => lines.push(format!("- {t}: {}", c.url)),
                _ => lines.push(format!("- {}", c.url)),
            }
        }
        if !lines.is_empty() {
            lines.insert(0, "Sources:".to_string());
        }
    }
    if let Some(total) = task.cost_summary.as_ref().and_then(|c| c.total) {
        lines.push(format!("Cost: ${total:.4}"));
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}
