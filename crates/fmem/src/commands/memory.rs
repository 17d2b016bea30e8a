//! Short-term values and interaction log commands.

use anyhow::{Context, Result, bail};
use chrono::Local;
use colored::Colorize;
use friday_memory::{ExplicitInteraction, InteractionInput, MemorySystem};

use super::{display_value, parse_value, truncate};

/// Store a value in short-term memory.
pub async fn remember(memory: &MemorySystem, key: &str, raw: &str, ttl: Option<u64>) -> Result<()> {
    let value = parse_value(raw);
    if !memory.store_short_term(key, &value, ttl).await {
        bail!("Failed to store '{}' in short-term memory", key);
    }

    let ttl = ttl.filter(|t| *t > 0).unwrap_or_else(|| memory.short_term().default_ttl());
    let target = if memory.short_term().is_cache_available() {
        "cache"
    } else {
        "process memory"
    };
    println!(
        "{} Stored {} in {} (ttl {}s)",
        "✓".green(),
        key.cyan(),
        target,
        ttl
    );
    Ok(())
}

/// Print a short-term value.
pub async fn recall(memory: &MemorySystem, key: &str) -> Result<()> {
    match memory.get_short_term(key).await {
        Some(value) => println!("{}", display_value(&value)),
        None => bail!("No short-term value for '{}'", key),
    }
    Ok(())
}

/// Record one interaction.
pub async fn log(memory: &MemorySystem, user_input: &str, response: Option<&str>) -> Result<()> {
    let input = match response {
        Some(response) => InteractionInput::from(ExplicitInteraction::exchange(user_input, response)),
        None => InteractionInput::user(user_input),
    };

    let Some(id) = memory.store_interaction(input).await else {
        bail!("Interaction was not recorded: mid-term memory is unavailable");
    };
    println!("{} Recorded interaction {}", "✓".green(), id.dimmed());
    Ok(())
}

/// List recent interactions, newest first.
pub async fn recent(memory: &MemorySystem, limit: usize, json: bool) -> Result<()> {
    let interactions = memory.get_recent_interactions(limit).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&interactions).context("Could not render interactions")?);
        return Ok(());
    }

    if interactions.is_empty() {
        println!("{}", "No interactions recorded".yellow());
        return Ok(());
    }

    for interaction in &interactions {
        println!(
            "{} {}",
            interaction
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            truncate(&interaction.user_input, 70)
        );
        if !interaction.friday_response.is_empty() {
            println!("    {} {}", "→".cyan(), truncate(&interaction.friday_response, 66));
        }
    }
    Ok(())
}
