//! Token counting using tiktoken-rs.
//!
//! Uses the cl100k_base encoding, which matches the GPT-4 family models the
//! answers are generated with.

use std::sync::OnceLock;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Encoder, loaded on first use. `None` if loading failed.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "Token encoder unavailable, falling back to estimates");
                None
            }
        })
        .as_ref()
}

/// Count tokens in text using cl100k_base encoding.
pub fn count_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
        None => estimate_tokens_quick(text),
    }
}

/// Estimate tokens without the encoder
pub fn estimate_tokens_quick(text: &str) -> u32 {
    // ~4 chars per token on average
    (text.len() as f64 / 4.0).ceil() as u32
}

/// Check if text exceeds a token limit
pub fn exceeds_token_limit(text: &str, limit: u32) -> bool {
    let quick_estimate = estimate_tokens_quick(text);
    if quick_estimate < limit / 2 {
        return false;
    }
    if quick_estimate > limit.saturating_mul(2) {
        return true;
    }
    count_tokens(text) > limit
}

/// Split text on whitespace into pieces of at most `limit` tokens each.
///
/// Text within the limit comes back as a single unchanged piece. Word counts
/// are summed per word, so a piece may come in slightly under the limit. A
/// single word longer than the limit becomes a piece of its own.
pub fn split_by_token_limit(text: &str, limit: u32) -> Vec<String> {
    if !exceeds_token_limit(text, limit) {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0u32;

    for word in text.split_whitespace() {
        // +1 for the separating space
        let word_tokens = count_tokens(word) + 1;
        if !current.is_empty() && current_tokens + word_tokens > limit {
            pieces.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        current_tokens += word_tokens;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(estimate_tokens_quick(""), 0);
    }

    #[test]
    fn test_count_tokens_on_page_text() {
        let page = "Het opbouwpercentage bedraagt 1,875% van de pensioengrondslag.";
        let tokens = count_tokens(page);
        assert!(tokens > 5);
        assert!(tokens < page.len() as u32);
        assert_eq!(count_tokens(page), tokens);
    }

    #[test]
    fn test_estimate_within_factor_two() {
        let question = "Wat gebeurt er met mijn pensioen als ik uit dienst ga?";
        let estimate = estimate_tokens_quick(question);
        let counted = count_tokens(question);
        assert!(estimate <= counted * 2);
        assert!(estimate * 2 >= counted);
    }

    #[test]
    fn test_limit_shortcuts_and_exact_check() {
        assert!(!exceeds_token_limit("Pension rate is 2.5%.", 1_000));
        assert!(exceeds_token_limit(&"pensioen ".repeat(500), 10));

        let context = "Effective 2024. ".repeat(20);
        let counted = count_tokens(&context);
        assert!(!exceeds_token_limit(&context, counted));
        assert!(exceeds_token_limit(&context, counted - 1));
    }

    #[test]
    fn test_split_keeps_short_text_whole() {
        let page = "  Pension rate is 2.5%.\n";
        assert_eq!(split_by_token_limit(page, 100), vec![page.to_string()]);
    }

    #[test]
    fn test_split_long_text_within_limit() {
        let page = "Het opbouwpercentage bedraagt 1,875% per dienstjaar. ".repeat(40);
        let pieces = split_by_token_limit(&page, 50);

        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(count_tokens(piece) <= 50, "piece has {} tokens", count_tokens(piece));
        }
        let rejoined: Vec<&str> = pieces.iter().flat_map(|p| p.split_whitespace()).collect();
        let original: Vec<&str> = page.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }
}
