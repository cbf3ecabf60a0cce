//! Rendering search results into a prompt-injectable context block.

use crate::models::SearchResult;

/// First line of every non-empty context block.
pub const CONTEXT_PREAMBLE: &str = "以下是相关的专业知识，请参考：";

/// Render `results` in order as one context string.
///
/// Returns an empty string for no results; callers then use their base
/// prompt unchanged. Each result becomes a `【topic】` header, annotated with
/// its relevance when the score is below 1, followed by the topic content.
/// Blocks are separated by a blank line.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut context = format!("{}\n\n", CONTEXT_PREAMBLE);
    for result in results {
        let annotation = if result.score.is_exact() {
            String::new()
        } else {
            format!("(相关度: {:.2})", result.score.value())
        };
        context.push_str(&format!(
            "【{}】{}\n{}\n\n",
            result.topic, annotation, result.content
        ));
    }
    context
}
