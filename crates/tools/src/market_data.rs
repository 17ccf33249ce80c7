//! Market data tools: thin adapters over an HTTP market data service.
//!
//! Each tool POSTs its canonical arguments as JSON to
//! `{base_url}/{tool_name}` and hands the response body back to the model.
//! News is trimmed to the few fields worth spending tokens on.

use std::time::Duration;

use async_trait::async_trait;
use nexus_core::error::ToolFailure;
use nexus_core::schema::{ArgumentSchema, CanonicalArgs, FieldSpec};
use nexus_core::tool::Tool;
use serde_json::{Value, json};
use tracing::debug;

const NEWS_MAX_ARTICLES: usize = 5;
const NEWS_SUMMARY_CHARS: usize = 200;

/// Which market data endpoint a tool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataKind {
    Price,
    Historical,
    BalanceSheet,
    News,
}

impl MarketDataKind {
    pub const ALL: [MarketDataKind; 4] = [
        MarketDataKind::Price,
        MarketDataKind::Historical,
        MarketDataKind::BalanceSheet,
        MarketDataKind::News,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Price => "get_stock_price",
            Self::Historical => "get_historical_stock_price",
            Self::BalanceSheet => "get_balance_sheet",
            Self::News => "get_stock_news",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Price => "Returns the real-time stock price for a ticker symbol, e.g. NVDA.",
            Self::Historical => {
                "Returns summarized historical price data for a ticker symbol over a date range: \
                 summary statistics and monthly closing prices."
            }
            Self::BalanceSheet => {
                "Returns key balance sheet metrics (assets, liabilities, debt, equity) of a ticker symbol."
            }
            Self::News => "Returns the 5 most recent news articles related to a ticker symbol.",
        }
    }

    /// How long a result stays fresh.
    pub fn default_ttl(self) -> Duration {
        match self {
            Self::Price => Duration::from_secs(60),
            Self::Historical => Duration::from_secs(60 * 60),
            Self::BalanceSheet => Duration::from_secs(24 * 60 * 60),
            Self::News => Duration::from_secs(15 * 60),
        }
    }

    fn schema(self) -> ArgumentSchema {
        let ticker = FieldSpec::string("ticker", "Ticker symbol, e.g. NVDA")
            .required()
            .uppercase();
        match self {
            Self::Historical => ArgumentSchema::new()
                .field(ticker)
                .field(FieldSpec::date("start_date", "Range start, YYYY-MM-DD").required())
                .field(FieldSpec::date("end_date", "Range end, YYYY-MM-DD").required()),
            _ => ArgumentSchema::new().field(ticker),
        }
    }
}

pub struct MarketDataTool {
    kind: MarketDataKind,
    endpoint: String,
    schema: ArgumentSchema,
    client: reqwest::Client,
}

impl MarketDataTool {
    pub fn new(kind: MarketDataKind, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            kind,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), kind.tool_name()),
            schema: kind.schema(),
            client,
        }
    }
}

#[async_trait]
impl Tool for MarketDataTool {
    fn name(&self) -> &str {
        self.kind.tool_name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }

    fn ttl(&self) -> Duration {
        self.kind.default_ttl()
    }

    async fn execute(&self, arguments: &CanonicalArgs) -> Result<Value, ToolFailure> {
        debug!(tool = self.name(), "Calling market data service");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&arguments.to_value())
            .send()
            .await
            .map_err(|e| ToolFailure::Execution(format!("market data request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolFailure::Execution(format!(
                "market data service returned {}: {}",
                status.as_u16(),
                truncate_chars(&body, 200)
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolFailure::Execution(format!("invalid market data response: {e}")))?;

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(ToolFailure::Execution(error.to_string()));
        }

        Ok(match self.kind {
            MarketDataKind::News => shape_news(arguments.get_str("ticker").unwrap_or_default(), &body),
            _ => body,
        })
    }
}

/// Keep at most five articles with short summaries.
fn shape_news(ticker: &str, body: &Value) -> Value {
    let articles = body
        .as_array()
        .or_else(|| body.get("articles").and_then(Value::as_array))
        .or_else(|| body.get("news").and_then(Value::as_array));

    let Some(articles) = articles.filter(|a| !a.is_empty()) else {
        return json!({ "ticker": ticker, "message": "No recent news available" });
    };

    let text = |a: &Value, key: &str| a.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    let limited: Vec<Value> = articles
        .iter()
        .take(NEWS_MAX_ARTICLES)
        .map(|a| {
            json!({
                "title": text(a, "title"),
                "publisher": text(a, "publisher"),
                "link": text(a, "link"),
                "published_date": a.get("published_date")
                    .or_else(|| a.get("providerPublishTime"))
                    .cloned()
                    .unwrap_or(Value::Null),
                "summary": truncate_chars(&text(a, "summary"), NEWS_SUMMARY_CHARS),
            })
        })
        .collect();

    json!({
        "ticker": ticker,
        "news_count": limited.len(),
        "articles": limited,
    })
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn args(kind: MarketDataKind, raw: Value) -> CanonicalArgs {
        kind.schema().validate(&raw).unwrap()
    }

    #[test]
    fn names_and_ttls() {
        assert_eq!(MarketDataKind::Price.tool_name(), "get_stock_price");
        assert_eq!(MarketDataKind::Price.default_ttl(), Duration::from_secs(60));
        assert_eq!(
            MarketDataKind::BalanceSheet.default_ttl(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn historical_requires_dates() {
        let schema = MarketDataKind::Historical.schema();
        assert!(schema.validate(&json!({"ticker": "NVDA"})).is_err());
        assert!(
            schema
                .validate(&json!({"ticker": "NVDA", "start_date": "2024-01-01", "end_date": "01/02/2024"}))
                .is_err()
        );
        let ok = schema
            .validate(&json!({"ticker": "nvda", "start_date": "2024-01-01", "end_date": "2024-06-30"}))
            .unwrap();
        assert_eq!(ok.get_str("ticker"), Some("NVDA"));
    }

    #[test]
    fn news_is_limited_and_truncated() {
        let articles: Vec<Value> = (0..8)
            .map(|i| json!({"title": format!("t{i}"), "summary": "s".repeat(500)}))
            .collect();
        let shaped = shape_news("NVDA", &json!({ "articles": articles }));
        assert_eq!(shaped["news_count"], 5);
        assert_eq!(shaped["articles"][0]["summary"].as_str().unwrap().len(), 200);
    }

    #[test]
    fn empty_news_message() {
        let shaped = shape_news("NVDA", &json!([]));
        assert_eq!(shaped["message"], "No recent news available");
    }

    #[tokio::test]
    async fn posts_canonical_arguments() {
        let base = serve(Router::new().route(
            "/get_stock_price",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "ticker": body["ticker"], "price": 42.0 }))
            }),
        ))
        .await;

        let tool = MarketDataTool::new(MarketDataKind::Price, &base, reqwest::Client::new());
        let value = tool
            .execute(&args(MarketDataKind::Price, json!({"ticker": " x "})))
            .await
            .unwrap();
        assert_eq!(value, json!({"ticker": "X", "price": 42.0}));
    }

    #[tokio::test]
    async fn upstream_error_is_execution_failure() {
        let base = serve(Router::new().route(
            "/get_balance_sheet",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        ))
        .await;

        let tool = MarketDataTool::new(MarketDataKind::BalanceSheet, &base, reqwest::Client::new());
        let err = tool
            .execute(&args(MarketDataKind::BalanceSheet, json!({"ticker": "X"})))
            .await
            .unwrap_err();
        let ToolFailure::Execution(msg) = err else {
            panic!("expected execution failure");
        };
        assert!(msg.contains("502"));
    }

    #[tokio::test]
    async fn error_body_is_execution_failure() {
        let base = serve(Router::new().route(
            "/get_historical_stock_price",
            post(|| async { Json(json!({"error": "No data available for the specified period"})) }),
        ))
        .await;

        let tool = MarketDataTool::new(MarketDataKind::Historical, &base, reqwest::Client::new());
        let err = tool
            .execute(&args(
                MarketDataKind::Historical,
                json!({"ticker": "X", "start_date": "2024-01-01", "end_date": "2024-01-31"}),
            ))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No data available"));
    }
}
