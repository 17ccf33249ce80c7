//! Web search tool backed by the Tavily search API.
//!
//! Results are cut down to five entries with short content so a search does
//! not flood the model's context.

use std::time::Duration;

use async_trait::async_trait;
use nexus_core::error::ToolFailure;
use nexus_core::schema::{ArgumentSchema, CanonicalArgs, FieldSpec};
use nexus_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::market_data::truncate_chars;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;
const CONTENT_CHARS: usize = 300;

pub struct WebSearchTool {
    api_key: Option<String>,
    endpoint: String,
    schema: ArgumentSchema,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_key,
            endpoint: TAVILY_ENDPOINT.into(),
            schema: ArgumentSchema::new().field(FieldSpec::string("query", "The search query").required()),
            client,
        }
    }

    /// Point the tool at a different search endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns up to 5 results with title, URL and a short content excerpt."
    }

    fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(10 * 60)
    }

    async fn execute(&self, arguments: &CanonicalArgs) -> Result<Value, ToolFailure> {
        let Some(api_key) = &self.api_key else {
            return Err(ToolFailure::Execution(
                "web search is not configured (missing TAVILY_API_KEY)".into(),
            ));
        };
        let query = arguments.get_str("query").unwrap_or_default();
        debug!(query_len = query.len(), "Executing web search");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&json!({ "query": query, "max_results": MAX_RESULTS }))
            .send()
            .await
            .map_err(|e| ToolFailure::Execution(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolFailure::Execution(format!(
                "search API returned {}",
                status.as_u16()
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolFailure::Execution(format!("invalid search response: {e}")))?;

        let results: Vec<Value> = body
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "content": truncate_chars(&r.content, CONTENT_CHARS),
                    "score": r.score,
                })
            })
            .collect();

        Ok(json!({
            "query": query,
            "results_count": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::{Json, Router, routing::post};

    fn args(query: &str) -> CanonicalArgs {
        WebSearchTool::new(None, reqwest::Client::new())
            .schema
            .validate(&json!({ "query": query }))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_execution_failure() {
        let tool = WebSearchTool::new(None, reqwest::Client::new());
        let err = tool.execute(&args("rust")).await.unwrap_err();
        assert!(matches!(err, ToolFailure::Execution(_)));
    }

    #[tokio::test]
    async fn results_are_limited_and_truncated() {
        let router = Router::new().route(
            "/search",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer tvly-test");
                assert_eq!(body["max_results"], 5);
                let results: Vec<Value> = (0..7)
                    .map(|i| json!({"title": format!("r{i}"), "url": "https://x", "content": "c".repeat(1000), "score": 0.5}))
                    .collect();
                Json(json!({ "results": results }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let tool = WebSearchTool::new(Some("tvly-test".into()), reqwest::Client::new())
            .with_endpoint(format!("http://{addr}/search"));
        let value = tool.execute(&args("nvidia earnings")).await.unwrap();

        assert_eq!(value["results_count"], 5);
        assert_eq!(value["query"], "nvidia earnings");
        assert_eq!(value["results"][0]["content"].as_str().unwrap().len(), 300);
    }
}
