//! `atlas serve` — Start the HTTP API server.

use atlas_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Atlas Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);
    println!("   Corpus:    {}", config.documents_dir().display());
    println!(
        "   Token:     {}",
        if config.gateway.api_token.is_some() { "required" } else { "not required" }
    );

    atlas_gateway::start(config).await?;

    Ok(())
}
