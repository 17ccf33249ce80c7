//! Tools for Nexus: the dispatcher that validates, caches and runs tool
//! calls, and the data tools the agent can call.

pub mod cache_aside;
pub mod dispatcher;
pub mod market_data;
pub mod web_search;

pub use cache_aside::{CacheAside, cache_key};
pub use dispatcher::{ToolDispatcher, ToolListing};
pub use market_data::{MarketDataKind, MarketDataTool};
pub use web_search::WebSearchTool;

use std::sync::Arc;
use std::time::Duration;

use nexus_config::ToolsConfig;
use nexus_core::cache::CacheStore;
use nexus_core::tool::Tool;

/// Create a dispatcher with every built-in tool registered.
///
/// TTLs come from each tool unless `ttl_overrides` names it.
pub fn default_dispatcher(config: &ToolsConfig, cache: Arc<dyn CacheStore>) -> ToolDispatcher {
    let timeout = Duration::from_secs(config.timeout_secs);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default();

    let mut dispatcher = ToolDispatcher::new(cache, timeout);

    let mut tools: Vec<Arc<dyn Tool>> = MarketDataKind::ALL
        .into_iter()
        .map(|kind| {
            Arc::new(MarketDataTool::new(kind, &config.market_data_url, client.clone()))
                as Arc<dyn Tool>
        })
        .collect();
    tools.push(Arc::new(WebSearchTool::new(
        config.search_api_key.clone(),
        client,
    )));

    for tool in tools {
        let ttl = config
            .ttl_overrides
            .get(tool.name())
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| tool.ttl());
        dispatcher.register_with_ttl(tool, ttl);
    }

    tracing::debug!(tools = dispatcher.len(), "Tool dispatcher ready");
    dispatcher
}
