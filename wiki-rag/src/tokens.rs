//! Token estimation.
//!
//! One estimator serves the whole engine (chunker, prompt budgets, source
//! fetcher) so every budget is measured with the same yardstick:
//! `ceil(words * 4 / 3)`, where words are whitespace-separated.

/// Estimate the token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    words.div_ceil(3) + words // == ceil(words * 4 / 3)
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t"), 0);
    }

    #[test]
    fn matches_formula() {
        // 3 words -> ceil(4) = 4; 4 words -> ceil(16/3) = 6
        assert_eq!(estimate_tokens("a b c"), 4);
        assert_eq!(estimate_tokens("a b c d"), 6);
    }

    #[test]
    fn estimate_tracks_word_count_within_tolerance() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(50);
        let est = estimate_tokens(&text) as f64;
        let reference = (word_count(&text) as f64) * 4.0 / 3.0;
        let drift = (est - reference).abs() / reference;
        assert!(drift < 0.1, "estimator drifted {drift}");
    }
}
