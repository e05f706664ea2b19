//! `atlas chat` — Interactive or single-message chat mode.
//!
//! Runs the same pipeline as `POST /v1/chat`: every exchange is retrieved
//! against the corpus and appended to long-term memory.

use atlas_agent::ChatInput;
use atlas_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // fail before loading the corpus
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ATLAS_API_KEY   = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let service = atlas_gateway::build_chat_service(&config).await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = service.chat(ChatInput::new(msg)).await;
        eprint!("\r              \r");
        println!("{}", reply?.reply);
        return Ok(());
    }

    let snapshot = service.knowledge().snapshot().await;
    println!();
    println!("  Atlas — Interactive Mode");
    println!();
    println!("  Persona:   {} ({})", service.persona().name, service.persona().source);
    println!("  Model:     {}", service.model());
    println!("  Corpus:    {} chunks, essence {} chars", snapshot.index.len(), snapshot.essence.chars().count());
    println!("  Memory:    {} entries", service.memory().len().await);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        eprint!("  ...");
        match service.chat(ChatInput::new(line)).await {
            Ok(reply) => {
                eprint!("\r     \r");
                println!();
                for l in reply.reply.lines() {
                    println!("  {} > {l}", service.persona().name);
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
