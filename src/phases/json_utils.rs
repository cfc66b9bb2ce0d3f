//! JSON extraction utilities for parsing oracle responses.

/// Extract a JSON object from oracle response text.
///
/// Handles ```json fenced blocks, bare ``` fences, and raw objects (first `{` to last `}`).
pub fn extract_json_block(text: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = text.find(fence) {
            let content_start = start + fence.len();
            if let Some(end) = text[content_start..].find("```") {
                let inner = text[content_start..content_start + end].trim();
                if inner.starts_with('{') {
                    return Some(inner);
                }
            }
        }
    }

    if let Some(start) = text.find('{')
        && let Some(end) = text.rfind('}')
        && start < end
    {
        return Some(&text[start..=end]);
    }

    None
}
