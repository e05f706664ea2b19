//! `atlas config` — Configuration management commands.

use atlas_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set ATLAS_API_KEY or OPENAI_API_KEY)".to_string());
            }
            if !config.documents_dir().is_dir() {
                warnings.push(format!(
                    "Corpus directory {} does not exist",
                    config.documents_dir().display()
                ));
            }
            if config.gateway.host == "0.0.0.0" && config.gateway.api_token.is_none() {
                warnings.push("Gateway bound to 0.0.0.0 without gateway.api_token".to_string());
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.default_model);
            println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
            println!(
                "   Chunking:  {} chars, {} overlap, top {}",
                config.knowledge.chunk_size, config.knowledge.chunk_overlap, config.knowledge.top_k
            );
            println!(
                "   Memory:    window {}, cap {}",
                config.memory.window, config.memory.persisted_cap
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    // never print secrets
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    if config.gateway.api_token.is_some() {
        config.gateway.api_token = Some("***".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("***".into());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = atlas_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
