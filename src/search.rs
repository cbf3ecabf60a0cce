//! `search` and `context` commands.

use anyhow::Result;

use counsel_rag_core::{Score, SearchResult};

use crate::rag::RagSystem;

pub async fn run_search(
    rag: &RagSystem,
    query: &str,
    top_k: Option<usize>,
    use_cache: bool,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(rag.settings().top_k);
    let results = rag.search(query, top_k, use_cache).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("{} result(s), {} mode:", results.len(), mode_label(&results));
    println!();
    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

pub async fn run_context(rag: &RagSystem, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(rag.settings().top_k);
    let results = rag.search(query, top_k, true).await;
    let context = rag.format_context(&results);

    if context.is_empty() {
        println!("No relevant knowledge; the base prompt is used unchanged.");
    } else {
        print!("{}", context);
    }
    Ok(())
}

fn print_result(rank: usize, result: &SearchResult) {
    println!("{}. [{:.2}] {}", rank, result.score.value(), result.topic);
    if !result.keywords.is_empty() {
        println!("    keywords: {}", result.keywords.join(", "));
    }
    println!(
        "    excerpt: \"{}\"",
        excerpt(&result.content, 120).replace('\n', " ").trim()
    );
    if !result.examples.is_empty() {
        println!("    examples: {}", result.examples.len());
    }
    println!();
}

/// The mode that actually answered, read off the scores. A vector search
/// that failed mid-call is answered by keywords even in vector mode.
fn mode_label(results: &[SearchResult]) -> &'static str {
    match results.first().map(|r| &r.score) {
        Some(Score::Similarity(_)) => "vector",
        _ => "keyword",
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
