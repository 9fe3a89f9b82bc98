//! Canonical embedding text.
//!
//! The text submitted to the embedding model is derived from the
//! post-transform descriptor alone, so it doubles as the staleness key:
//! a stored row whose `embedding_text` differs from the current
//! canonical text is regenerated on the next reconciliation.

use crate::config::TruncationConfig;

/// Cut a description at a delimiter occurrence to keep schema dumps and
/// other appended noise out of the embedding.
///
/// Occurrences before `occurrence` are ignored; from there on, the
/// first whitespace-trimmed prefix of at least `min_length` characters
/// wins. If no occurrence yields a long-enough prefix the full
/// description is kept: a near-empty embedding is worse than a noisy
/// one.
pub fn truncate_description<'a>(description: &'a str, config: &TruncationConfig) -> &'a str {
    if !config.enabled || description.is_empty() || config.delimiter.is_empty() {
        return description;
    }

    let mut seen = 0usize;
    for (position, _) in description.match_indices(&config.delimiter) {
        seen += 1;
        if seen < config.occurrence {
            continue;
        }
        let prefix = description[..position].trim();
        if prefix.chars().count() >= config.min_length {
            return prefix;
        }
    }

    description
}

/// The exact text submitted to the embedding model for one tool.
pub fn canonical_embedding_text(
    method: &str,
    description: Option<&str>,
    parameter_descriptions: &str,
    truncation: &TruncationConfig,
) -> String {
    let description = description
        .filter(|d| !d.trim().is_empty())
        .map(|d| truncate_description(d, truncation))
        .unwrap_or("No description");

    let parameters = if parameter_descriptions.is_empty() {
        "none"
    } else {
        parameter_descriptions
    };

    format!("{}: {}\nParameters: {}", method, description, parameters)
}
