//! User preference commands.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use friday_memory::MemorySystem;
use serde_json::Value;

use super::{display_value, parse_value};
use crate::cli::{PrefAction, PrefCommand};

pub async fn execute(cmd: PrefCommand, memory: &MemorySystem) -> Result<()> {
    match cmd.action {
        PrefAction::Set { key, value } => set(memory, &key, &value).await,
        PrefAction::Get { key } => get(memory, &key).await,
        PrefAction::List { json } => list(memory, json).await,
    }
}

async fn set(memory: &MemorySystem, key: &str, raw: &str) -> Result<()> {
    let value = parse_value(raw);
    if !memory.store_user_preference(key, &value).await {
        bail!("Failed to store preference '{}'", key);
    }
    println!("{} {} = {}", "✓".green(), key.cyan(), display_value(&value));
    Ok(())
}

async fn get(memory: &MemorySystem, key: &str) -> Result<()> {
    match memory.get_user_preference(key, Value::Null).await {
        Value::Null => bail!("Preference '{}' is not set", key),
        value => println!("{}", display_value(&value)),
    }
    Ok(())
}

async fn list(memory: &MemorySystem, json: bool) -> Result<()> {
    let profile = memory.get_user_profile().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile).context("Could not render preferences")?);
        return Ok(());
    }

    if profile.is_empty() {
        println!("{}", "No preferences stored".yellow());
        return Ok(());
    }

    let width = profile.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, value) in &profile {
        println!("  {:<width$}  {}", key.cyan(), display_value(value), width = width);
    }
    Ok(())
}
