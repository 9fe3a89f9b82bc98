//! Plateau truncation of ranked result lists.
//!
//! Converts "top K" into "top cluster": a descending score list is cut
//! at the first significant relative drop, under an absolute floor and
//! a hard cap. Applied uniformly to normalized lexical scores and to
//! vector cosine similarities.

use crate::config::DynamicLimitConfig;

/// Truncate a monotonically-descending `(item, score)` list.
///
/// Acceptance stops at the hard cap, at the first score below the
/// floor, or at the first relative gap exceeding the drop threshold.
pub fn apply_dynamic_limit<T>(scored: Vec<(T, f32)>, config: &DynamicLimitConfig) -> Vec<(T, f32)> {
    let mut accepted = Vec::new();

    for (i, (item, score)) in scored.into_iter().enumerate() {
        if accepted.len() >= config.max_results {
            break;
        }
        if score < config.min_score {
            break;
        }
        if i > 0 {
            let prev: f32 = accepted.last().map(|(_, s)| *s).unwrap_or(score);
            if prev > 0.0 && (prev - score) / prev > config.drop_threshold {
                break;
            }
        }
        accepted.push((item, score));
    }

    accepted
}
