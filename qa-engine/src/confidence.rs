//! Confidence derivation from the initial retrieval distribution.
//!
//! Never taken from the LLM. High needs several strong vector matches;
//! medium needs at least one reasonable match (or any code-index hit,
//! which carries no distance); everything else is low.

use crate::types::Confidence;

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceThresholds {
    /// Distance below which a vector match counts as strong.
    pub high_distance: f32,
    /// Distance below which a vector match counts as acceptable.
    pub medium_distance: f32,
    /// Strong matches required for high confidence.
    pub min_strong_matches: usize,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_distance: 0.35,
            medium_distance: 0.6,
            min_strong_matches: 2,
        }
    }
}

/// Derive confidence from semantic distances and code-index usage.
pub fn derive(
    distances: &[f32],
    results_found: usize,
    used_code_index: bool,
    thresholds: &ConfidenceThresholds,
) -> Confidence {
    let strong = distances
        .iter()
        .filter(|d| **d < thresholds.high_distance)
        .count();
    if strong >= thresholds.min_strong_matches {
        return Confidence::High;
    }
    if distances.iter().any(|d| *d < thresholds.medium_distance) {
        return Confidence::Medium;
    }
    // code-index hits are exact matches without a distance
    if used_code_index && results_found > 0 {
        return Confidence::Medium;
    }
    Confidence::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_matches_mean_high() {
        let t = ConfidenceThresholds::default();
        assert_eq!(derive(&[0.1, 0.2, 0.8], 3, false, &t), Confidence::High);
    }

    #[test]
    fn one_decent_match_means_medium() {
        let t = ConfidenceThresholds::default();
        assert_eq!(derive(&[0.5, 0.9], 2, false, &t), Confidence::Medium);
    }

    #[test]
    fn index_hits_without_distances_mean_medium() {
        let t = ConfidenceThresholds::default();
        assert_eq!(derive(&[], 4, true, &t), Confidence::Medium);
    }

    #[test]
    fn nothing_means_low() {
        let t = ConfidenceThresholds::default();
        assert_eq!(derive(&[], 0, false, &t), Confidence::Low);
        assert_eq!(derive(&[0.9, 0.95], 2, false, &t), Confidence::Low);
    }
}
