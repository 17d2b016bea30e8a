//! Status, cleanup and connectivity commands.

use anyhow::{Context, Result};
use colored::Colorize;
use friday_memory::{Collection, MemorySystem, TierState};

fn state_label(state: TierState) -> colored::ColoredString {
    match state {
        TierState::Available => "✓ available".green(),
        TierState::Degraded => "⚠ degraded".yellow(),
    }
}

fn reach_label(reachable: bool) -> colored::ColoredString {
    if reachable { "✓ reachable".green() } else { "✗ unreachable".red() }
}

/// Show every tier's state and counts.
pub async fn status(memory: &MemorySystem, json: bool) -> Result<()> {
    let status = memory.get_memory_status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status).context("Could not render memory status")?);
        return Ok(());
    }

    println!("{}", "Friday Memory".cyan().bold());
    println!("{}", "─".repeat(50));

    let short = &status.short_term;
    println!("  Short-term: {}", state_label(short.state));
    println!("    cache keys:    {}", short.cache_keys);
    println!("    fallback keys: {}", short.fallback_keys);
    if let Some(reason) = memory.short_term().degraded_reason() {
        println!("    {}", reason.dimmed());
    }

    let mid = &status.mid_term;
    println!("  Mid-term:   {}", state_label(mid.state));
    println!("    interactions:  {}", mid.interactions);
    println!("    sessions:      {}", mid.sessions);
    println!("    preferences:   {}", mid.preferences);

    let long = &status.long_term;
    println!("  Long-term:  {}", state_label(long.state));
    for collection in Collection::ALL {
        let entry = long.collection(collection);
        let count = if entry.available {
            entry.count.to_string().normal()
        } else {
            "n/a".dimmed()
        };
        println!("    {:<14} {}", format!("{}:", collection), count);
    }
    if let Some(reason) = memory.long_term().degraded_reason() {
        println!("    {}", reason.dimmed());
    }

    Ok(())
}

/// Run a retention pass.
pub async fn cleanup(memory: &MemorySystem) -> Result<()> {
    let report = memory.cleanup_expired_data().await;
    let retention = memory.config().mid_term.retention_days;

    println!(
        "{} Removed {} interaction(s) older than {} days",
        "✓".green(),
        report.mid_term,
        retention
    );
    Ok(())
}

/// Check every backend right now.
pub async fn connectivity(memory: &MemorySystem) -> Result<()> {
    let report = memory.test_connectivity().await;

    println!("  Short-term (cache): {}", reach_label(report.short_term));
    println!("  Mid-term (sqlite):  {}", reach_label(report.mid_term));
    println!("  Long-term (index):  {}", reach_label(report.long_term));

    if !report.short_term {
        println!(
            "  {} short-term values are kept in process memory only",
            "○".yellow()
        );
    }
    Ok(())
}
