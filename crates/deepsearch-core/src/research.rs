//! Client view of the two-phase research job (submit, then poll).
//!
//! The remote endpoint owns the state machine: `running -> completed` or
//! `running -> failed`. Nothing here caches a task or moves it between states; every
//! [`TaskLifecycle::poll`] is an independent query that reports what the endpoint says.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    Error, RemoteEndpoint, ResearchOutputOptions, ResearchSnapshot, ResearchSubmitRequest, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Running,
    Completed,
    Failed,
}

impl ResearchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl FromStr for ResearchStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // Some deployments report queued work as "pending".
            "running" | "pending" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown research status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVariant {
    #[default]
    #[serde(rename = "exa-research", alias = "standard")]
    Standard,
    #[serde(rename = "exa-research-pro", alias = "pro")]
    Pro,
}

impl ModelVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "exa-research",
            Self::Pro => "exa-research-pro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub source_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub total: Option<f64>,
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchTask {
    pub id: String,
    pub status: ResearchStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub instructions: String,
    pub data: Option<serde_json::Value>,
    /// Logical step id -> sources, in the order reported.
    pub citations: Option<BTreeMap<String, Vec<Citation>>>,
    pub cost_summary: Option<CostSummary>,
    /// Diagnostic text the endpoint attached, if any. Never synthesized.
    pub error: Option<String>,
}

impl ResearchTask {
    /// Validate a poll response. `requested_id` fills in a missing `id`.
    pub fn from_snapshot(requested_id: &str, snap: ResearchSnapshot) -> Result<Self> {
        let raw_status = snap.status.as_deref().ok_or_else(|| {
            Error::MalformedSnapshot(format!("research task {requested_id} has no status"))
        })?;
        let status = raw_status
            .parse::<ResearchStatus>()
            .map_err(|e| Error::MalformedSnapshot(format!("research task {requested_id}: {e}")))?;

        let id = snap
            .id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| requested_id.to_string());

        Ok(Self {
            id,
            status,
            created_at: snap.created_at.as_ref().and_then(parse_timestamp),
            instructions: snap.instructions.unwrap_or_default(),
            data: snap.data.filter(|v| !v.is_null()),
            citations: snap.citations.as_ref().and_then(parse_citations),
            cost_summary: snap.cost_dollars.as_ref().and_then(parse_cost),
            error: diagnostic(snap.error.as_ref(), snap.message.as_deref()),
        })
    }
}

fn parse_timestamp(v: &serde_json::Value) -> Option<DateTime<Utc>> {
    match v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    }
}

fn parse_citations(v: &serde_json::Value) -> Option<BTreeMap<String, Vec<Citation>>> {
    let obj = v.as_object()?;
    let mut out = BTreeMap::new();
    for (step, items) in obj {
        let Some(items) = items.as_array() else {
            continue;
        };
        let cites: Vec<Citation> = items
            .iter()
            .filter_map(|it| {
                let url = it.get("url")?.as_str()?.to_string();
                let s = |k: &str| it.get(k).and_then(|x| x.as_str()).map(str::to_string);
                Some(Citation {
                    source_id: s("id"),
                    url,
                    title: s("title"),
                    snippet: s("snippet"),
                })
            })
            .collect();
        out.insert(step.clone(), cites);
    }
    Some(out)
}

fn parse_cost(v: &serde_json::Value) -> Option<CostSummary> {
    match v {
        serde_json::Value::Number(n) => Some(CostSummary {
            total: n.as_f64(),
            breakdown: BTreeMap::new(),
        }),
        serde_json::Value::Object(m) => {
            let mut cost = CostSummary::default();
            for (k, x) in m {
                let Some(f) = x.as_f64() else {
                    continue;
                };
                if k == "total" {
                    cost.total = Some(f);
                } else {
                    cost.breakdown.insert(k.clone(), f);
                }
            }
            Some(cost)
        }
        _ => None,
    }
}

fn diagnostic(error: Option<&serde_json::Value>, message: Option<&str>) -> Option<String> {
    let from_error = error.and_then(|e| match e {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Object(m) => m
            .get("message")
            .and_then(|x| x.as_str())
            .map(|s| s.trim().to_string())
            .or_else(|| Some(e.to_string())),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    });
    from_error
        .or_else(|| message.map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Canonical result text for a completed task: `data.report` when it is a non-empty
/// string, otherwise a deterministic serialization of the whole payload.
pub fn canonical_result_text(data: &serde_json::Value) -> String {
    if let Some(report) = data.get("report").and_then(|r| r.as_str()) {
        if !report.trim().is_empty() {
            return report.to_string();
        }
    }
    match data {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub task_id: String,
    pub model: ModelVariant,
    pub output_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Not ready yet. Distinct from failure; poll again later.
    Running(ResearchTask),
    Completed { task: ResearchTask, report: String },
    Failed(ResearchTask),
}

impl PollOutcome {
    pub fn task(&self) -> &ResearchTask {
        match self {
            Self::Running(t) | Self::Failed(t) => t,
            Self::Completed { task, .. } => task,
        }
    }
}

#[derive(Clone)]
pub struct TaskLifecycle {
    endpoint: Arc<dyn RemoteEndpoint>,
}

impl TaskLifecycle {
    pub fn new(endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        Self { endpoint }
    }

    /// One submit request; failures are returned as-is and never retried.
    pub async fn submit(
        &self,
        instructions: &str,
        model: ModelVariant,
        infer_output_schema: bool,
    ) -> Result<Submission> {
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Err(Error::InvalidArguments(
                "instructions must not be empty".to_string(),
            ));
        }
        let req = ResearchSubmitRequest {
            instructions: instructions.to_string(),
            model,
            output: ResearchOutputOptions {
                infer_schema: infer_output_schema,
            },
        };
        let resp = self.endpoint.submit_research(&req).await?;
        let task_id = resp
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::MalformedSnapshot("research submit response has no task id".to_string())
            })?;
        Ok(Submission {
            task_id,
            model,
            output_schema: resp.output_schema.filter(|v| !v.is_null()),
        })
    }

    pub async fn poll(&self, task_id: &str) -> Result<PollOutcome> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(Error::InvalidArguments("task_id must not be empty".to_string()));
        }
        let snap = self.endpoint.poll_research(task_id).await?;
        let task = ResearchTask::from_snapshot(task_id, snap)?;
        match task.status {
            ResearchStatus::Running => Ok(PollOutcome::Running(task)),
            ResearchStatus::Failed => Ok(PollOutcome::Failed(task)),
            ResearchStatus::Completed => {
                // Completed with no payload at all is not an empty success.
                let Some(data) = task.data.as_ref() else {
                    return Err(Error::MalformedSnapshot(format!(
                        "research task {} reported completed without any result data",
                        task.id
                    )));
                };
                let report = canonical_result_text(data);
                Ok(PollOutcome::Completed { task, report })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEndpoint;
    use crate::ResearchSubmitResponse;
    use serde_json::json;

    fn snapshot(v: serde_json::Value) -> ResearchSnapshot {
        serde_json::from_value(v).unwrap()
    }

    fn lifecycle(ep: ScriptedEndpoint) -> (TaskLifecycle, Arc<ScriptedEndpoint>) {
        let ep = Arc::new(ep);
        (TaskLifecycle::new(ep.clone()), ep)
    }

    #[tokio::test]
    async fn submit_sends_model_and_schema_flag() {
        let (lc, ep) = lifecycle(ScriptedEndpoint::default().with_submit(Ok(
            ResearchSubmitResponse {
                id: Some("task-1".into()),
                output_schema: Some(json!({"type": "object"})),
            },
        )));
        let sub = lc
            .submit("  Compare tokio and async-std  ", ModelVariant::Pro, true)
            .await
            .unwrap();
        assert_eq!(sub.task_id, "task-1");
        assert_eq!(sub.output_schema, Some(json!({"type": "object"})));

        let calls = ep.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "submit_research");
        assert_eq!(calls[0].1["model"], "exa-research-pro");
        assert_eq!(calls[0].1["instructions"], "Compare tokio and async-std");
        assert_eq!(calls[0].1["output"]["inferSchema"], true);
    }

    #[tokio::test]
    async fn submit_failure_is_surfaced_once_without_retry() {
        let (lc, ep) = lifecycle(
            ScriptedEndpoint::default()
                .with_submit(Err(Error::Unreachable("connection reset".into()))),
        );
        let e = lc.submit("q", ModelVariant::Standard, false).await.unwrap_err();
        assert_eq!(e, Error::Unreachable("connection reset".into()));
        assert_eq!(ep.calls().len(), 1);
    }

    #[tokio::test]
    async fn submit_rejection_keeps_status_and_message() {
        let (lc, _) = lifecycle(ScriptedEndpoint::default().with_submit(Err(
            Error::RemoteRejected {
                status: 402,
                message: "out of credits".into(),
            },
        )));
        let e = lc.submit("q", ModelVariant::Standard, false).await.unwrap_err();
        assert_eq!(
            e,
            Error::RemoteRejected {
                status: 402,
                message: "out of credits".into()
            }
        );
    }

    #[tokio::test]
    async fn submit_without_task_id_is_malformed() {
        let (lc, _) =
            lifecycle(ScriptedEndpoint::default().with_submit(Ok(Default::default())));
        let e = lc.submit("q", ModelVariant::Standard, false).await.unwrap_err();
        assert!(matches!(e, Error::MalformedSnapshot(_)));
    }

    #[tokio::test]
    async fn empty_instructions_never_reach_the_endpoint() {
        let (lc, ep) = lifecycle(ScriptedEndpoint::default());
        let e = lc.submit("   ", ModelVariant::Standard, false).await.unwrap_err();
        assert!(matches!(e, Error::InvalidArguments(_)));
        assert!(ep.calls().is_empty());
    }

    #[tokio::test]
    async fn running_without_data_is_not_ready() {
        let (lc, _) = lifecycle(
            ScriptedEndpoint::default()
                .with_poll(Ok(snapshot(json!({"id": "t", "status": "running"})))),
        );
        let out = lc.poll("t").await.unwrap();
        assert!(matches!(out, PollOutcome::Running(ref t) if t.data.is_none()));
        assert!(!out.task().status.is_terminal());
    }

    #[tokio::test]
    async fn completed_report_is_canonical_text() {
        let (lc, _) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(json!({
            "id": "t",
            "status": "completed",
            "data": {"report": "X"}
        })))));
        match lc.poll("t").await.unwrap() {
            PollOutcome::Completed { report, .. } => assert_eq!(report, "X"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_structured_data_round_trips() {
        let data = json!({"answer": 42, "items": ["a", "b"], "nested": {"z": true, "a": null}});
        let (lc, _) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(json!({
            "status": "completed",
            "data": data.clone()
        })))));
        let PollOutcome::Completed { report, task } = lc.poll("t").await.unwrap() else {
            panic!("expected completed");
        };
        assert_eq!(task.id, "t");
        let back: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(back, data);
        assert_eq!(report, canonical_result_text(&data));
    }

    #[tokio::test]
    async fn completed_without_data_is_malformed() {
        for snap in [
            json!({"status": "completed"}),
            json!({"status": "completed", "data": null}),
        ] {
            let (lc, _) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(snap))));
            let e = lc.poll("t").await.unwrap_err();
            assert!(matches!(e, Error::MalformedSnapshot(_)), "{e:?}");
        }
    }

    #[tokio::test]
    async fn failed_without_detail_has_no_invented_reason() {
        let (lc, _) = lifecycle(
            ScriptedEndpoint::default().with_poll(Ok(snapshot(json!({"status": "failed"})))),
        );
        let PollOutcome::Failed(task) = lc.poll("t").await.unwrap() else {
            panic!("expected failed");
        };
        assert!(task.error.is_none());
    }

    #[tokio::test]
    async fn failed_keeps_reported_diagnostic() {
        let (lc, _) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(json!({
            "status": "failed",
            "error": {"message": "quota exceeded"}
        })))));
        let PollOutcome::Failed(task) = lc.poll("t").await.unwrap() else {
            panic!("expected failed");
        };
        assert_eq!(task.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn unknown_or_missing_status_is_malformed() {
        for snap in [json!({"id": "t"}), json!({"id": "t", "status": "paused"})] {
            let (lc, _) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(snap))));
            assert!(matches!(
                lc.poll("t").await.unwrap_err(),
                Error::MalformedSnapshot(_)
            ));
        }
    }

    #[tokio::test]
    async fn poll_is_idempotent_against_unchanged_task() {
        let (lc, ep) = lifecycle(ScriptedEndpoint::default().with_poll(Ok(snapshot(json!({
            "id": "t",
            "status": "running",
            "data": {"report": "partial"}
        })))));
        let a = lc.poll("t").await.unwrap();
        let b = lc.poll("t").await.unwrap();
        assert_eq!(a.task().status, b.task().status);
        assert_eq!(a.task().data, b.task().data);
        assert_eq!(ep.calls().len(), 2);
    }

    #[test]
    fn snapshot_details_are_parsed_leniently() {
        let task = ResearchTask::from_snapshot(
            "t",
            snapshot(json!({
                "status": "completed",
                "createdAt": 1_700_000_000_000i64,
                "instructions": "why",
                "data": {"report": "r"},
                "citations": {
                    "root": [
                        {"id": "s1", "url": "https://a.example", "title": "A", "snippet": "aa"},
                        {"title": "no url, skipped"}
                    ],
                    "bad": "not a list"
                },
                "costDollars": {"total": 0.25, "numSearches": 0.1, "label": "x"}
            })),
        )
        .unwrap();
        assert_eq!(task.created_at.map(|d| d.timestamp()), Some(1_700_000_000));
        let cites = task.citations.unwrap();
        assert_eq!(cites["root"].len(), 1);
        assert_eq!(cites["root"][0].source_id.as_deref(), Some("s1"));
        assert!(!cites.contains_key("bad"));
        let cost = task.cost_summary.unwrap();
        assert_eq!(cost.total, Some(0.25));
        assert_eq!(cost.breakdown.get("numSearches"), Some(&0.1));
        assert!(!cost.breakdown.contains_key("label"));
    }

    #[test]
    fn rfc3339_timestamps_are_accepted() {
        let task = ResearchTask::from_snapshot(
            "t",
            snapshot(json!({"status": "running", "createdAt": "2025-01-02T03:04:05Z"})),
        )
        .unwrap();
        assert_eq!(
            task.created_at.map(|d| d.to_rfc3339()),
            Some("2025-01-02T03:04:05+00:00".to_string())
        );
    }

    #[test]
    fn empty_report_falls_back_to_full_payload() {
        let data = json!({"report": "  ", "rows": [1, 2]});
        let text = canonical_result_text(&data);
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn model_variant_accepts_short_names() {
        let m: ModelVariant = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(m, ModelVariant::Pro);
        let m: ModelVariant = serde_json::from_str("\"exa-research\"").unwrap();
        assert_eq!(m, ModelVariant::Standard);
        assert_eq!(serde_json::to_value(ModelVariant::Pro).unwrap(), "exa-research-pro");
    }
}
