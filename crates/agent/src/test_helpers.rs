//! Shared test helpers for loop and runtime tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nexus_cache::InMemoryCache;
use nexus_core::error::{ProviderError, ToolFailure};
use nexus_core::provider::{Fragment, FragmentStream, ReasoningProvider, ReasoningRequest};
use nexus_core::schema::{ArgumentSchema, CanonicalArgs, FieldSpec};
use nexus_core::tool::{Tool, ToolCallRequest};
use nexus_tools::ToolDispatcher;

/// One scripted reasoning step.
#[derive(Clone)]
pub struct Step {
    fragments: Vec<Result<Fragment, ProviderError>>,
    refuse: Option<ProviderError>,
    delay: Duration,
}

impl Step {
    /// A step streaming the given text pieces.
    pub fn text(pieces: &[&str]) -> Self {
        Self {
            fragments: pieces.iter().map(|p| Ok(Fragment::text(*p))).collect(),
            refuse: None,
            delay: Duration::ZERO,
        }
    }

    /// A step requesting `get_stock_price` once per `(call_id, ticker)`.
    pub fn tool_calls(calls: &[(&str, &str)]) -> Self {
        let mut step = Self::text(&[]);
        for (id, ticker) in calls {
            step = step.with_tool_call(id, ticker);
        }
        step
    }

    /// A step requesting a `get_stock_price` call with arbitrary arguments.
    pub fn raw_tool_call(id: &str, arguments: serde_json::Value) -> Self {
        let mut step = Self::text(&[]);
        step.fragments.push(Ok(Fragment::ToolCalls {
            calls: vec![ToolCallRequest {
                id: id.into(),
                name: "get_stock_price".into(),
                arguments,
            }],
        }));
        step
    }

    /// A step whose `converse` call fails outright.
    pub fn fail(error: ProviderError) -> Self {
        Self {
            fragments: Vec::new(),
            refuse: Some(error),
            delay: Duration::ZERO,
        }
    }

    pub fn with_tool_call(mut self, id: &str, ticker: &str) -> Self {
        self.fragments.push(Ok(Fragment::ToolCalls {
            calls: vec![ToolCallRequest {
                id: id.into(),
                name: "get_stock_price".into(),
                arguments: serde_json::json!({ "ticker": ticker }),
            }],
        }));
        self
    }

    /// End the fragment stream with an error.
    pub fn then_fail(mut self, error: ProviderError) -> Self {
        self.fragments.push(Err(error));
        self
    }

    /// Wait this long before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A provider that plays back scripted steps and records every request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that requests another tool call every time it is asked.
    pub fn always_tool_calls() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat: Some(Step::tool_calls(&[("call_loop", "X")])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn converse(&self, request: ReasoningRequest) -> Result<FragmentStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| ProviderError::Malformed("script exhausted".into()))?;

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        if let Some(error) = step.refuse {
            return Err(error);
        }
        Ok(Box::pin(futures::stream::iter(step.fragments)))
    }
}

/// `get_stock_price` that always answers 42.
pub struct FixedPriceTool {
    schema: ArgumentSchema,
}

impl FixedPriceTool {
    pub fn new() -> Self {
        Self {
            schema: ArgumentSchema::new()
                .field(FieldSpec::string("ticker", "Ticker symbol").required().uppercase()),
        }
    }
}

#[async_trait]
impl Tool for FixedPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }
    fn description(&self) -> &str {
        "Latest price"
    }
    fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }
    fn ttl(&self) -> Duration {
        Duration::from_secs(60)
    }
    async fn execute(&self, _args: &CanonicalArgs) -> Result<serde_json::Value, ToolFailure> {
        Ok(serde_json::json!(42))
    }
}

pub fn price_dispatcher() -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new(Arc::new(InMemoryCache::new()), Duration::from_secs(5));
    dispatcher.register(Arc::new(FixedPriceTool::new()));
    dispatcher
}
