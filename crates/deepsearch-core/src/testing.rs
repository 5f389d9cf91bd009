//! In-memory [`RemoteEndpoint`] with canned responses, for tests.

use std::sync::Mutex;

use crate::{
    CodeContextRequest, CodeContextResponse, ContentsRequest, Error, RemoteEndpoint,
    ResearchSnapshot, ResearchSubmitRequest, ResearchSubmitResponse, Result, SearchRequest,
    SearchResponse,
};

/// Each method returns a clone of its scripted response on every call, or
/// `Unreachable` when nothing was scripted. Requests are recorded as JSON.
#[derive(Default)]
pub struct ScriptedEndpoint {
    search: Option<Result<SearchResponse>>,
    code_context: Option<Result<CodeContextResponse>>,
    contents: Option<Result<SearchResponse>>,
    submit: Option<Result<ResearchSubmitResponse>>,
    poll: Option<Result<ResearchSnapshot>>,
    calls: Mutex<Vec<(&'static str, serde_json::Value)>>,
}

impl ScriptedEndpoint {
    pub fn with_search(mut self, r: Result<SearchResponse>) -> Self {
        self.search = Some(r);
        self
    }

    pub fn with_code_context(mut self, r: Result<CodeContextResponse>) -> Self {
        self.code_context = Some(r);
        self
    }

    pub fn with_contents(mut self, r: Result<SearchResponse>) -> Self {
        self.contents = Some(r);
        self
    }

    pub fn with_submit(mut self, r: Result<ResearchSubmitResponse>) -> Self {
        self.submit = Some(r);
        self
    }

    pub fn with_poll(mut self, r: Result<ResearchSnapshot>) -> Self {
        self.poll = Some(r);
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, serde_json::Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, method: &'static str, body: serde_json::Value) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((method, body));
    }

    fn reply<T: Clone>(method: &str, r: &Option<Result<T>>) -> Result<T> {
        r.clone()
            .unwrap_or_else(|| Err(Error::Unreachable(format!("{method} not scripted"))))
    }
}

#[async_trait::async_trait]
impl RemoteEndpoint for ScriptedEndpoint {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        self.record("search", serde_json::to_value(req).unwrap_or_default());
        Self::reply("search", &self.search)
    }

    async fn code_context(&self, req: &CodeContextRequest) -> Result<CodeContextResponse> {
        self.record("code_context", serde_json::to_value(req).unwrap_or_default());
        Self::reply("code_context", &self.code_context)
    }

    async fn contents(&self, req: &ContentsRequest) -> Result<SearchResponse> {
        self.record("contents", serde_json::to_value(req).unwrap_or_default());
        Self::reply("contents", &self.contents)
    }

    async fn submit_research(
        &self,
        req: &ResearchSubmitRequest,
    ) -> Result<ResearchSubmitResponse> {
        self.record("submit_research", serde_json::to_value(req).unwrap_or_default());
        Self::reply("submit_research", &self.submit)
    }

    async fn poll_research(&self, task_id: &str) -> Result<ResearchSnapshot> {
        self.record("poll_research", serde_json::json!({ "id": task_id }));
        Self::reply("poll_research", &self.poll)
    }
}
