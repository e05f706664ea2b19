//! `atlas init` — First-time setup.

use atlas_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Atlas — First-Time Setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config = if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run init.\n");
        AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        AppConfig::default()
    };

    for (label, dir) in [
        ("corpus", config.documents_dir()),
        ("uploads", config.uploads_dir()),
    ] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            println!("Created {label} directory: {}", dir.display());
        }
    }

    println!("\nNext steps:");
    println!("   1. Put your .txt documents in {}", config.documents_dir().display());
    println!("   2. Set ATLAS_API_KEY (or add api_key to {})", config_path.display());
    println!("   3. Run: atlas distill");
    println!("   4. Run: atlas serve\n");

    Ok(())
}
