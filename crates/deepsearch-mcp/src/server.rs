use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use std::sync::Arc;

use deepsearch_core::{
    catalog, compute_active_set, CapabilityId, InvocationResult, RemoteEndpoint, RuntimeConfig,
};

use crate::dispatch::Dispatcher;
use crate::handlers::{
    CodeContextArgs, CompanyResearchArgs, CrawlingArgs, DeepResearchCheckArgs,
    DeepResearchStartArgs, Handler, LinkedinSearchArgs, WebSearchArgs,
};

pub const SERVER_NAME: &str = "deepsearch";

#[derive(Clone)]
pub struct DeepsearchMcp {
    dispatcher: Arc<Dispatcher>,
    tools: Arc<Vec<Tool>>,
}

impl DeepsearchMcp {
    pub fn new(config: &RuntimeConfig, endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        let active = compute_active_set(config, catalog());
        let dispatcher = Dispatcher::bind(&active, config.debug, |id| {
            Handler::for_capability(id, endpoint.clone())
        });
        let tools = dispatcher.ids().iter().map(|&id| tool_for(id)).collect();
        Self {
            dispatcher: Arc::new(dispatcher),
            tools: Arc::new(tools),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.to_string()).collect()
    }
}

fn schema_for<T: schemars::JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(m)) => Arc::new(m),
        _ => Arc::new(JsonObject::default()),
    }
}

fn tool_for(id: CapabilityId) -> Tool {
    let schema = match id {
        CapabilityId::WebSearch => schema_for::<WebSearchArgs>(),
        CapabilityId::GetCodeContext => schema_for::<CodeContextArgs>(),
        CapabilityId::CompanyResearch => schema_for::<CompanyResearchArgs>(),
        CapabilityId::Crawling => schema_for::<CrawlingArgs>(),
        CapabilityId::LinkedinSearch => schema_for::<LinkedinSearchArgs>(),
        CapabilityId::DeepResearcherStart => schema_for::<DeepResearchStartArgs>(),
        CapabilityId::DeepResearcherCheck => schema_for::<DeepResearchCheckArgs>(),
    };
    Tool::new(id.as_str(), id.descriptor().description, schema)
}

fn to_call_result(r: InvocationResult) -> CallToolResult {
    let content: Vec<Content> = r
        .content
        .iter()
        .filter_map(|b| b.as_text().map(|t| Content::text(t.to_string())))
        .collect();
    if r.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for DeepsearchMcp {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = SERVER_NAME.to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();
        ServerInfo {
            instructions: Some(
                "Web search, code context and company lookups backed by a remote search API. Deep research is two-phase: deep_researcher_start returns a task id, then poll deep_researcher_check until the task completes or fails."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(
            self.tools.as_ref().clone(),
        )))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let name = request.name.to_string();
            let args = request
                .arguments
                .map(serde_json::Value::Object)
                .unwrap_or(serde_json::Value::Null);
            tracing::debug!(tool = %name, "call_tool");
            match self.dispatcher.invoke(&name, args).await {
                Some(r) => Ok(to_call_result(r)),
                None => Err(McpError::invalid_params(
                    format!("unknown or inactive tool: {name}"),
                    None,
                )),
            }
        }
    }
}

pub async fn serve_stdio(
    config: &RuntimeConfig,
    endpoint: Arc<dyn RemoteEndpoint>,
) -> Result<(), McpError> {
    let svc = DeepsearchMcp::new(config, endpoint);
    tracing::debug!(tools = ?svc.tool_names(), "starting stdio server");
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    // Runs until the client closes stdin.
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}
