//! Response schema for the /news endpoint and the fetch command
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single extracted headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Normalized anchor text
    pub title: String,
    /// Absolute URL, unique within one extraction
    pub url: String,
    /// RFC 3339 UTC timestamp found near the link (null if none parsed)
    pub published_at: Option<String>,
    /// Short label found near the link (null if none)
    pub category: Option<String>,
}

/// Result envelope, built once per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsEnvelope {
    pub source: String,
    pub retrieved_at: String,
    pub count: usize,
    pub items: Vec<Article>,
}

impl NewsEnvelope {
    /// Wrap `items`, keeping `count` in step with them
    pub fn new(source: &str, retrieved_at: DateTime<Utc>, items: Vec<Article>) -> Self {
        Self {
            source: source.to_string(),
            retrieved_at: retrieved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            count: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Article {
        Article {
            title: "Il governo approva la manovra economica".to_string(),
            url: "https://www.ansa.it/sito/notizie/politica/manovra.html".to_string(),
            published_at: None,
            category: Some("Politica".to_string()),
        }
    }

    #[test]
    fn test_envelope_count_matches_items() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let envelope = NewsEnvelope::new("ansa", at, vec![sample(), sample()]);
        assert_eq!(envelope.count, 2);
        assert_eq!(envelope.items.len(), envelope.count);
        assert_eq!(envelope.retrieved_at, "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_serialize_camel_case_with_nulls() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let envelope = NewsEnvelope::new("ansa", at, vec![sample()]);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["source"], "ansa");
        assert_eq!(json["retrievedAt"], "2024-05-01T10:00:00.000Z");
        assert_eq!(json["count"], 1);
        // absent values are explicit nulls, not missing keys
        assert!(json["items"][0]
            .as_object()
            .unwrap()
            .contains_key("publishedAt"));
        assert!(json["items"][0]["publishedAt"].is_null());
        assert_eq!(json["items"][0]["category"], "Politica");
    }
}
