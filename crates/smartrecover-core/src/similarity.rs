//! Incident-to-incident similarity.
//!
//! Similarity is a weighted Jaccard blend over token sets: title 0.4,
//! description 0.4, affected services 0.2. Tokens are lowercased, split on
//! non-alphanumeric characters, stripped of a fixed English stopword set,
//! and dropped when shorter than three characters.

use std::collections::HashSet;

use crate::models::{Incident, IncidentStatus};

/// Fixed English stopword set ignored during tokenization.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "this", "but", "they", "have",
    "had", "what", "when", "where", "who", "which", "why", "how",
];

const TITLE_WEIGHT: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.4;
const SERVICE_WEIGHT: f64 = 0.2;

/// Minimum token length kept after stopword filtering.
const MIN_TOKEN_LEN: usize = 3;

/// Extract the comparable token set from free text.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard coefficient of two sets; 0 when both are empty.
fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Keyword-overlap similarity of two text strings.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let ka = extract_keywords(a);
    let kb = extract_keywords(b);
    if ka.is_empty() || kb.is_empty() {
        return 0.0;
    }
    jaccard(&ka, &kb)
}

/// Jaccard similarity of two affected-service lists.
pub fn service_similarity(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&String> = a.iter().collect();
    let sb: HashSet<&String> = b.iter().collect();
    jaccard(&sa, &sb)
}

/// Weighted similarity of two incidents.
pub fn incident_similarity(a: &Incident, b: &Incident) -> f64 {
    let title = text_similarity(&a.title, &b.title);
    let description = text_similarity(&a.description, &b.description);
    let services = service_similarity(&a.affected_services, &b.affected_services);

    title * TITLE_WEIGHT + description * DESCRIPTION_WEIGHT + services * SERVICE_WEIGHT
}

/// Rank historical incidents against a target.
///
/// Only resolved incidents other than the target are considered. Results at
/// or above `threshold` are returned best-first, capped at `max_results`,
/// with score ties broken by incident id ascending.
pub fn find_similar_incidents<'a>(
    target: &Incident,
    candidates: &'a [Incident],
    threshold: f64,
    max_results: usize,
) -> Vec<(&'a Incident, f64)> {
    let mut scored: Vec<(&Incident, f64)> = candidates
        .iter()
        .filter(|c| c.id != target.id && c.status == IncidentStatus::Resolved)
        .map(|c| (c, incident_similarity(target, c)))
        .filter(|(_, score)| *score >= threshold)
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(max_results);
    scored
}
