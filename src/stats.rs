//! Corpus and index overview.
//!
//! Used by `counsel-rag stats` (and after `init`/`reindex`) to confirm
//! which retrieval mode is live and how much of the corpus is indexed.

use anyhow::Result;

use crate::config::Config;
use crate::rag::RagSystem;

pub async fn run_stats(config: &Config, rag: &RagSystem) -> Result<()> {
    let stats = rag.stats().await;

    let db_path = config.vector_db.db_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Counsel RAG — Knowledge Stats");
    println!("=============================");
    println!();
    println!("  Knowledge:   {}", config.knowledge.path.display());
    println!("  Topics:      {}", stats.topics);
    println!();
    println!(
        "  Mode:        {}",
        if stats.vector_enabled { "vector" } else { "keyword (fallback)" }
    );
    if let Some(model) = &stats.model {
        match stats.dims {
            Some(dims) => println!("  Model:       {} ({} dims)", model, dims),
            None => println!("  Model:       {}", model),
        }
    }
    if stats.vector_enabled {
        println!("  Index:       {}", db_path.display());
        println!("  Size:        {}", format_bytes(db_size));
        println!("  Collection:  {}", config.vector_db.collection);
        match stats.indexed_documents {
            Some(n) => println!("  Documents:   {}", n),
            None => println!("  Documents:   unknown"),
        }
    }
    println!("  Cached:      {}", stats.cached_queries);
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
