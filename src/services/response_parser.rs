use serde_json::Value;
use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::Recommendation,
    services::catalog::ProductStore,
};

/// Score used when an entry carries no usable relevance score
pub const DEFAULT_RELEVANCE: f64 = 0.5;

/// Recommendations recovered from a generator reply, plus the entries that
/// were dropped along the way
#[derive(Debug, Clone, Default)]
pub struct ParsedRecommendations {
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<String>,
}

impl ParsedRecommendations {
    fn warn(&mut self, message: String) {
        tracing::warn!(warning = %message, "Dropping recommendation entry");
        self.warnings.push(message);
    }
}

/// Locates and parses the JSON array in a reply, ignoring code fences and
/// any prose around it.
///
/// Arrays that open with an object are tried first, so bracketed prose such
/// as `[3]` or `[0, 1]` is skipped. Text after the first array that parses is
/// ignored.
fn extract_json_array(raw: &str) -> AppResult<Vec<Value>> {
    let cleaned = raw.replace("```json", "").replace("```", "");

    let (object_arrays, other_arrays): (Vec<usize>, Vec<usize>) = cleaned
        .match_indices('[')
        .map(|(start, _)| start)
        .partition(|&start| cleaned[start + 1..].trim_start().starts_with('{'));
    let starts = if object_arrays.is_empty() {
        other_arrays
    } else {
        object_arrays
    };

    let mut first_error = None;
    for start in starts {
        let mut stream =
            serde_json::Deserializer::from_str(&cleaned[start..]).into_iter::<Vec<Value>>();
        match stream.next() {
            Some(Ok(entries)) => return Ok(entries),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    Err(match first_error {
        Some(e) => {
            tracing::error!(error = %e, reply = %raw, "Failed to parse generator reply");
            AppError::ExternalService(format!("Failed to parse JSON from generator reply: {}", e))
        }
        None => {
            AppError::ExternalService("Could not find recommendations in generator reply".to_string())
        }
    })
}

fn relevance_score(value: Option<&Value>) -> f64 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    score
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_RELEVANCE)
        .clamp(0.0, 1.0)
}

/// Maps a raw generator reply onto catalog products.
///
/// Entries naming unknown or repeated products, and entries that are not
/// objects with a string `product_id`, are dropped with a warning. Reply
/// order is preserved. A reply with no parseable JSON array is an error.
pub fn parse_recommendations(raw: &str, store: &ProductStore) -> AppResult<ParsedRecommendations> {
    let entries = extract_json_array(raw)?;

    let mut parsed = ParsedRecommendations::default();
    let mut seen = HashSet::new();

    for (position, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            parsed.warn(format!("Entry {} is not an object", position));
            continue;
        };

        let Some(product_id) = fields.get("product_id").and_then(Value::as_str) else {
            parsed.warn(format!("Entry {} has no product_id", position));
            continue;
        };

        let Some(product) = store.get(product_id) else {
            parsed.warn(format!("Unknown product {} in entry {}", product_id, position));
            continue;
        };

        if !seen.insert(product_id) {
            parsed.warn(format!("Duplicate product {} in entry {}", product_id, position));
            continue;
        }

        parsed.recommendations.push(Recommendation {
            product: product.clone(),
            explanation: fields
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            relevance_score: relevance_score(fields.get("relevance_score")),
        });
    }

    tracing::info!(
        entries = entries.len(),
        accepted = parsed.recommendations.len(),
        dropped = parsed.warnings.len(),
        "Generator reply parsed"
    );

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    fn store() -> ProductStore {
        ProductStore::from_products(vec![
            product("p1", "A", "Acme", 30.0),
            product("p2", "B", "Globex", 120.0),
            product("p3", "A", "Globex", 75.0),
        ])
        .unwrap()
    }

    fn ids(parsed: &ParsedRecommendations) -> Vec<&str> {
        parsed
            .recommendations
            .iter()
            .map(|r| r.product.id.as_str())
            .collect()
    }

    #[test]
    fn test_unknown_product_only_entry() {
        let raw = r#"[{"product_id":"p9","explanation":"x","relevance_score":1.4}]"#;
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert!(parsed.recommendations.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_entry_dropped_order_preserved() {
        let raw = r#"[
            {"product_id": "p3", "explanation": "first", "relevance_score": 0.4},
            {"product_id": "nope", "explanation": "bad", "relevance_score": 0.9},
            {"product_id": "p1", "explanation": "third", "relevance_score": 0.8}
        ]"#;
        let parsed = parse_recommendations(raw, &store()).unwrap();

        // No re-ranking: lower score stays first
        assert_eq!(ids(&parsed), vec!["p3", "p1"]);
        assert_eq!(parsed.recommendations[0].explanation, "first");
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_scores_clamped_and_defaulted() {
        let raw = r#"[
            {"product_id": "p1", "relevance_score": 1.4},
            {"product_id": "p2", "relevance_score": -3},
            {"product_id": "p3", "relevance_score": "0.25"}
        ]"#;
        let parsed = parse_recommendations(raw, &store()).unwrap();
        let scores: Vec<f64> = parsed
            .recommendations
            .iter()
            .map(|r| r.relevance_score)
            .collect();

        assert_eq!(scores, vec![1.0, 0.0, 0.25]);
        assert_eq!(parsed.recommendations[0].explanation, "");
    }

    #[test]
    fn test_missing_or_garbage_score_uses_default() {
        let raw = r#"[
            {"product_id": "p1"},
            {"product_id": "p2", "relevance_score": "high"}
        ]"#;
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert!(parsed
            .recommendations
            .iter()
            .all(|r| r.relevance_score == DEFAULT_RELEVANCE));
    }

    #[test]
    fn test_fenced_reply_with_prose() {
        let raw = "Here are my picks:\n```json\n[{\"product_id\": \"p2\", \"explanation\": \"fits\", \"relevance_score\": 0.7}]\n```\nEnjoy!";
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert_eq!(ids(&parsed), vec!["p2"]);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_malformed_entries_and_duplicates_dropped() {
        let raw = r#"[
            "p1",
            {"explanation": "no id"},
            {"product_id": 42},
            {"product_id": "p1", "relevance_score": 0.9},
            {"product_id": "p1", "relevance_score": 0.1}
        ]"#;
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert_eq!(ids(&parsed), vec!["p1"]);
        assert_eq!(parsed.recommendations[0].relevance_score, 0.9);
        assert_eq!(parsed.warnings.len(), 4);
    }

    #[test]
    fn test_bracketed_prose_before_array() {
        let raw = "Top [3] picks:\n[{\"product_id\": \"p1\", \"relevance_score\": 0.6}]";
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert_eq!(ids(&parsed), vec!["p1"]);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_bracketed_prose_after_array() {
        let raw = "[{\"product_id\": \"p2\", \"explanation\": \"see [docs]\"}]\nScores are in [0, 1].";
        let parsed = parse_recommendations(raw, &store()).unwrap();

        assert_eq!(ids(&parsed), vec!["p2"]);
        assert_eq!(parsed.recommendations[0].explanation, "see [docs]");
    }

    #[test]
    fn test_invalid_array_not_replaced_by_prose_brackets() {
        let raw = "[{\"product_id\": \"p1\",]\nScores are in [0, 1].";
        let result = parse_recommendations(raw, &store());
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[test]
    fn test_reply_without_array_is_error() {
        let result = parse_recommendations("I cannot help with that.", &store());
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let result = parse_recommendations(r#"[{"product_id": "p1",]"#, &store());
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[test]
    fn test_empty_array_is_empty_result() {
        let parsed = parse_recommendations("[]", &store()).unwrap();
        assert!(parsed.recommendations.is_empty());
        assert!(parsed.warnings.is_empty());
    }
}
