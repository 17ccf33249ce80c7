//! `nexus serve`: start the HTTP gateway.

use nexus_config::AppConfig;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        return Err(format!(
            "No API key found. Set OPENAI_API_KEY or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        )
        .into());
    }

    println!("Nexus gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model);
    println!("   Cache:     {}", config.cache.backend);

    nexus_gateway::start(config).await
}
