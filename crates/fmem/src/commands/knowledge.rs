//! Long-term knowledge commands.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use friday_memory::{Collection, MemorySystem, SearchHit};
use serde_json::{Map, Value};

use super::truncate;

/// Add a document to the knowledge (or persona) collection.
pub async fn learn(memory: &MemorySystem, text: &str, category: Option<&str>, persona: bool) -> Result<()> {
    let metadata = category.map(|c| {
        let mut map = Map::new();
        map.insert("category".to_string(), Value::String(c.to_string()));
        map
    });

    let (collection, id) = if persona {
        (Collection::Persona, memory.store_persona(text, metadata).await)
    } else {
        (Collection::Knowledge, memory.store_knowledge(text, metadata).await)
    };

    let Some(id) = id else {
        bail!("Could not store document: {} collection is unavailable", collection);
    };
    println!("{} Stored in {} as {}", "✓".green(), collection.as_str().cyan(), id.dimmed());
    Ok(())
}

/// Search knowledge, or every collection with `all`.
pub async fn search(memory: &MemorySystem, query: &str, limit: usize, all: bool, json: bool) -> Result<()> {
    let hits: Vec<SearchHit> = if all {
        memory.semantic_search(query, limit).await
    } else {
        memory
            .search_knowledge(query, limit)
            .await
            .into_iter()
            .map(|hit| SearchHit::from_query_hit(hit, Collection::Knowledge))
            .collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits).context("Could not render search results")?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{}", "No matches".yellow());
        return Ok(());
    }

    for hit in &hits {
        let distance = hit
            .distance
            .map(|d| format!("{:.3}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:<12} {}",
            distance.dimmed(),
            hit.collection.as_str().cyan(),
            truncate(&hit.document.text, 80)
        );
    }
    Ok(())
}
