//! `atlas status` — Show configuration, corpus and memory status.

use atlas_config::AppConfig;
use atlas_core::memory::ConversationLog;
use atlas_knowledge::{list_documents, read_essence};
use atlas_memory::FileBackend;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let docs = list_documents(&config.documents_dir());
    let essence = read_essence(&config.essence_path());
    let memory_items = FileBackend::new(config.memory_path(), config.memory.persisted_cap)
        .len()
        .await;

    println!("Atlas Status");
    println!("============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Workspace:    {}", config.workspace_dir);
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    match &docs {
        Some(files) => println!("  Corpus:       {} ({} documents)", config.documents_dir().display(), files.len()),
        None => println!("  Corpus:       {} (missing)", config.documents_dir().display()),
    }
    println!(
        "  Essence:      {} chars{}",
        essence.chars().count(),
        if essence.chars().count() > config.knowledge.min_essence_chars { "" } else { " (persona fallback)" }
    );
    println!("  Memory:       {memory_items} entries (cap {})", config.memory.persisted_cap);
    println!(
        "  Converter:    {}",
        config.knowledge.convert_command.as_deref().unwrap_or("not configured")
    );

    if let Some(files) = docs {
        for f in files.iter().take(15) {
            println!("    - {f}");
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `atlas init` first");
    }

    Ok(())
}
