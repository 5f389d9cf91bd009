use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use deepsearch_core::{
    CodeContextRequest, CodeContextResponse, ContentsRequest, Error, RemoteEndpoint,
    ResearchSnapshot, ResearchSubmitRequest, ResearchSubmitResponse, Result, SearchRequest,
    SearchResponse,
};

/// Fixed per-request timeout. Expiry is reported as unreachable.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

const DEFAULT_ENDPOINT: &str = "https://api.exa.ai";

fn api_key_from_env() -> Option<String> {
    std::env::var("DEEPSEARCH_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("EXA_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn endpoint_from_env() -> Option<String> {
    std::env::var("DEEPSEARCH_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct ExaClient {
    client: reqwest::Client,
    base: url::Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl ExaClient {
    pub fn new(client: reqwest::Client, base: &str, api_key: Option<String>) -> Result<Self> {
        let base = url::Url::parse(base.trim())
            .map_err(|e| Error::InvalidConfig(format!("invalid endpoint {base:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "endpoint is not a base url: {base}"
            )));
        }
        Ok(Self {
            client,
            base,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// `explicit_key` wins over `DEEPSEARCH_API_KEY` / `EXA_API_KEY`; the base url may be
    /// overridden with `DEEPSEARCH_ENDPOINT` (tests, proxies).
    pub fn from_env(client: reqwest::Client, explicit_key: Option<String>) -> Result<Self> {
        let base = endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let key = explicit_key
            .filter(|k| !k.trim().is_empty())
            .or_else(api_key_from_env);
        Self::new(client, &base, key)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url> {
        let mut u = self.base.clone();
        {
            let mut path = u.path_segments_mut().map_err(|_| {
                Error::InvalidConfig(format!("endpoint is not a base url: {}", self.base))
            })?;
            path.pop_if_empty();
            // push() percent-encodes, so task ids cannot escape the path.
            for s in segments {
                path.push(s);
            }
        }
        Ok(u)
    }

    fn with_auth(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let rb = rb
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json");
        match self.api_key.as_deref() {
            Some(k) => rb.header("x-api-key", k),
            None => rb,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        op: &'static str,
        rb: reqwest::RequestBuilder,
    ) -> Result<T> {
        let t0 = Instant::now();
        let resp = self
            .with_auth(rb)
            .send()
            .await
            .map_err(|e| self.transport_error(op, e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(op, e))?;
        tracing::debug!(
            op,
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "remote call finished"
        );

        if !status.is_success() {
            return Err(Error::RemoteRejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }
        serde_json::from_slice(&body)
            .map_err(|e| Error::MalformedSnapshot(format!("{op}: could not decode response: {e}")))
    }

    fn transport_error(&self, op: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Unreachable(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))
        } else {
            Error::Unreachable(format!("{op}: {e}"))
        }
    }
}

/// Message for a non-success response: the endpoint's own error text when the body is
/// JSON carrying one, otherwise the body itself, otherwise the status reason.
fn rejection_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(v) = serde_json::from_slice::<serde_json::Value>(body) {
        let field = v
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| v.get("message").and_then(|m| m.as_str()));
        if let Some(m) = field.map(str::trim).filter(|m| !m.is_empty()) {
            return m.to_string();
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status
        .canonical_reason()
        .unwrap_or("no response body")
        .to_string()
}

#[async_trait::async_trait]
impl RemoteEndpoint for ExaClient {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        let url = self.url(&["search"])?;
        self.send("search", self.client.post(url).json(req)).await
    }

    async fn code_context(&self, req: &CodeContextRequest) -> Result<CodeContextResponse> {
        let url = self.url(&["context"])?;
        self.send("code_context", self.client.post(url).json(req))
            .await
    }

    async fn contents(&self, req: &ContentsRequest) -> Result<SearchResponse> {
        let url = self.url(&["contents"])?;
        self.send("contents", self.client.post(url).json(req)).await
    }

    async fn submit_research(
        &self,
        req: &ResearchSubmitRequest,
    ) -> Result<ResearchSubmitResponse> {
        let url = self.url(&["research", "v0", "tasks"])?;
        self.send("research_submit", self.client.post(url).json(req))
            .await
    }

    async fn poll_research(&self, task_id: &str) -> Result<ResearchSnapshot> {
        let url = self.url(&["research", "v0", "tasks", task_id])?;
        self.send("research_poll", self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use deepsearch_core::{ContentsOptions, ModelVariant, ResearchOutputOptions, TextOptions};
    use std::net::SocketAddr;

    struct EnvGuard {
        k: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(k: &'static str, v: &str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::set_var(k, v);
            Self { k, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(v) = self.prev.take() {
                std::env::set_var(self.k, v);
            } else {
                std::env::remove_var(self.k);
            }
        }
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr, key: Option<&str>) -> ExaClient {
        ExaClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}"),
            key.map(str::to_string),
        )
        .unwrap()
    }

    fn search_req() -> SearchRequest {
        SearchRequest {
            query: "rust async".to_string(),
            search_type: Some("auto".to_string()),
            num_results: 3,
            category: None,
            include_domains: Vec::new(),
            contents: Some(ContentsOptions {
                text: TextOptions {
                    max_characters: 100,
                },
                livecrawl: None,
            }),
        }
    }

    #[test]
    fn empty_key_is_treated_as_missing() {
        let _a = EnvGuard::set("DEEPSEARCH_API_KEY", "   ");
        let _b = EnvGuard::set("EXA_API_KEY", "");
        assert!(api_key_from_env().is_none());
    }

    #[test]
    fn rejects_unusable_base_urls() {
        let e = ExaClient::new(reqwest::Client::new(), "not a url", None).unwrap_err();
        assert!(matches!(e, Error::InvalidConfig(_)));
        let e = ExaClient::new(reqwest::Client::new(), "mailto:a@b.c", None).unwrap_err();
        assert!(matches!(e, Error::InvalidConfig(_)));
    }

    #[test]
    fn task_ids_are_percent_encoded_into_one_segment() {
        let c = ExaClient::new(reqwest::Client::new(), "http://127.0.0.1:1/api/", None).unwrap();
        let u = c.url(&["research", "v0", "tasks", "a/b?c"]).unwrap();
        assert_eq!(
            u.as_str(),
            "http://127.0.0.1:1/api/research/v0/tasks/a%2Fb%3Fc"
        );
    }

    #[test]
    fn rejection_message_prefers_endpoint_error_text() {
        let s = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(rejection_message(s, br#"{"error":"bad key"}"#), "bad key");
        assert_eq!(
            rejection_message(s, br#"{"error":{"message":"nested"}}"#),
            "nested"
        );
        assert_eq!(rejection_message(s, b"plain text"), "plain text");
        assert_eq!(rejection_message(s, b""), "Unauthorized");
    }

    #[tokio::test]
    async fn search_sends_key_and_decodes_results() {
        let app = Router::new().route(
            "/search",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let key = headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({
                    "requestId": "r1",
                    "results": [{
                        "url": "https://a.example",
                        "title": format!("{key}|{}|{}", body["query"].as_str().unwrap_or(""), body["numResults"]),
                    }]
                }))
            }),
        );
        let addr = serve(app).await;
        let resp = client(addr, Some("k1")).search(&search_req()).await.unwrap();
        assert_eq!(resp.request_id.as_deref(), Some("r1"));
        assert_eq!(resp.results[0].title.as_deref(), Some("k1|rust async|3"));
    }

    #[tokio::test]
    async fn non_success_status_is_remote_rejected_with_message() {
        let app = Router::new().route(
            "/search",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(serde_json::json!({"error": "rate limited"})),
                )
            }),
        );
        let addr = serve(app).await;
        let e = client(addr, None).search(&search_req()).await.unwrap_err();
        assert_eq!(
            e,
            Error::RemoteRejected {
                status: 429,
                message: "rate limited".to_string()
            }
        );
    }

    #[tokio::test]
    async fn undecodable_success_body_is_malformed() {
        let app = Router::new().route("/contents", post(|| async { "<html>oops</html>" }));
        let addr = serve(app).await;
        let req = ContentsRequest {
            ids: vec!["https://a.example".to_string()],
            contents: ContentsOptions {
                text: TextOptions {
                    max_characters: 10,
                },
                livecrawl: Some("preferred".to_string()),
            },
        };
        let e = client(addr, None).contents(&req).await.unwrap_err();
        assert!(matches!(e, Error::MalformedSnapshot(_)), "{e:?}");
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let e = client(addr, None).poll_research("t1").await.unwrap_err();
        assert!(matches!(e, Error::Unreachable(_)), "{e:?}");
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_unreachable() {
        let app = Router::new().route(
            "/research/v0/tasks/:id",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({"status": "running"}))
            }),
        );
        let addr = serve(app).await;
        let c = client(addr, None).with_timeout(Duration::from_millis(100));
        let e = c.poll_research("t1").await.unwrap_err();
        match e {
            Error::Unreachable(m) => assert!(m.contains("timed out"), "{m}"),
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn research_submit_and_poll_use_task_paths() {
        let app = Router::new()
            .route(
                "/research/v0/tasks",
                post(|Json(body): Json<serde_json::Value>| async move {
                    Json(serde_json::json!({
                        "id": format!("task-{}", body["model"].as_str().unwrap_or("")),
                    }))
                }),
            )
            .route(
                "/research/v0/tasks/:id",
                get(|Path(id): Path<String>| async move {
                    Json(serde_json::json!({"id": id, "status": "completed", "data": {"report": "done"}}))
                }),
            );
        let addr = serve(app).await;
        let c = client(addr, Some("k"));
        let sub = c
            .submit_research(&ResearchSubmitRequest {
                instructions: "why".to_string(),
                model: ModelVariant::Pro,
                output: ResearchOutputOptions {
                    infer_schema: false,
                },
            })
            .await
            .unwrap();
        assert_eq!(sub.id.as_deref(), Some("task-exa-research-pro"));

        let snap = c.poll_research("task-1").await.unwrap();
        assert_eq!(snap.id.as_deref(), Some("task-1"));
        assert_eq!(snap.status.as_deref(), Some("completed"));
    }
}
