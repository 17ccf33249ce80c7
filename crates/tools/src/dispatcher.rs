//! Tool registry and dispatcher.
//!
//! Dispatching one call: look the tool up, validate and canonicalize its
//! arguments, consult the cache, run the executor under a timeout, and
//! write successful results back. Every failure on the way comes back as a
//! [`ToolFailure`] inside the result, never as an `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nexus_core::cache::CacheStore;
use nexus_core::error::ToolFailure;
use nexus_core::tool::{Tool, ToolCallRequest, ToolDefinition, ToolInvocationResult};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache_aside::{CacheAside, cache_key};

struct Registered {
    tool: Arc<dyn Tool>,
    ttl: Duration,
}

/// A registered tool as listed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    #[serde(flatten)]
    pub definition: ToolDefinition,
    pub ttl_secs: u64,
}

/// Read-only after startup; share it as `Arc<ToolDispatcher>`.
pub struct ToolDispatcher {
    tools: HashMap<String, Registered>,
    order: Vec<String>,
    cache: CacheAside,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(cache: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            cache: CacheAside::new(cache),
            timeout,
        }
    }

    /// Bound every cache read and write by `timeout`.
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache = self.cache.with_store_timeout(timeout);
        self
    }

    /// Register a tool with its own TTL.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let ttl = tool.ttl();
        self.register_with_ttl(tool, ttl);
    }

    /// Register a tool, overriding its TTL. A zero TTL disables caching.
    pub fn register_with_ttl(&mut self, tool: Arc<dyn Tool>, ttl: Duration) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Registered { tool, ttl }).is_none() {
            self.order.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Definitions sent to the reasoning provider, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registered().map(|r| r.tool.to_definition()).collect()
    }

    pub fn listings(&self) -> Vec<ToolListing> {
        self.registered()
            .map(|r| ToolListing {
                definition: r.tool.to_definition(),
                ttl_secs: r.ttl.as_secs(),
            })
            .collect()
    }

    fn registered(&self) -> impl Iterator<Item = &Registered> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Dispatch one call.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolInvocationResult {
        let started = Instant::now();
        let finish = |arguments: serde_json::Value,
                      outcome: Result<serde_json::Value, ToolFailure>,
                      served_from_cache: bool| ToolInvocationResult {
            call_id: request.id.clone(),
            tool_name: request.name.clone(),
            arguments,
            outcome,
            served_from_cache,
            latency: started.elapsed(),
        };

        let Some(registered) = self.tools.get(&request.name) else {
            warn!(tool = %request.name, "Unknown tool requested");
            return finish(
                request.arguments.clone(),
                Err(ToolFailure::Argument(format!("unknown tool `{}`", request.name))),
                false,
            );
        };

        let args = match registered.tool.schema().validate(&request.arguments) {
            Ok(args) => args,
            Err(failure) => {
                warn!(tool = %request.name, error = %failure, "Tool arguments rejected");
                return finish(request.arguments.clone(), Err(failure), false);
            }
        };
        let canonical = args.to_value();

        let caching = !registered.ttl.is_zero();
        let key = cache_key(&request.name, &args);

        if caching && let Some(value) = self.cache.get(&key).await {
            debug!(tool = %request.name, "Cache hit");
            return finish(canonical, Ok(value), true);
        }

        let outcome = match tokio::time::timeout(self.timeout, registered.tool.execute(&args)).await
        {
            Ok(result) => result,
            Err(_) => Err(ToolFailure::Execution(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        };

        match &outcome {
            Ok(value) if caching => self.cache.set(&key, value, registered.ttl).await,
            Ok(_) => {}
            Err(failure) => warn!(tool = %request.name, error = %failure, "Tool call failed"),
        }

        let result = finish(canonical, outcome, false);
        debug!(
            tool = %request.name,
            success = result.is_success(),
            latency_ms = result.latency.as_millis() as u64,
            "Tool executed"
        );
        result
    }

    /// Dispatch every call of one step concurrently. Results come back in
    /// request order.
    pub async fn dispatch_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolInvocationResult> {
        futures::future::join_all(requests.iter().map(|r| self.dispatch(r))).await
    }
}
