//! Pulling a JSON object out of free-form model replies.
//!
//! Models wrap JSON in prose or markdown fences often enough that a plain
//! parse is not sufficient. Strategies run in order; the first one that yields
//! a JSON object wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern is valid")
});

/// One way of locating a JSON object in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole (trimmed) reply is JSON
    Direct,
    /// The first ```json fenced block
    FencedBlock,
    /// From the first `{` to the last `}`
    BraceSpan,
}

impl ExtractionStrategy {
    pub const CHAIN: [Self; 3] = [Self::Direct, Self::FencedBlock, Self::BraceSpan];

    fn candidate(self, text: &str) -> Option<&str> {
        match self {
            Self::Direct => Some(text),
            Self::FencedBlock => FENCED_BLOCK
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
            Self::BraceSpan => {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                (end > start).then(|| &text[start..=end])
            }
        }
    }

    /// Apply this strategy; only JSON objects count as a match.
    pub fn extract(self, text: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(self.candidate(text)?) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Run the strategy chain; returns the object and the strategy that found it.
pub fn extract_json_object(text: &str) -> Option<(Map<String, Value>, ExtractionStrategy)> {
    let trimmed = text.trim();
    ExtractionStrategy::CHAIN
        .into_iter()
        .find_map(|s| s.extract(trimmed).map(|obj| (obj, s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_object() {
        let (obj, strategy) = extract_json_object(r#"  {"a": 1}  "#).unwrap();
        assert_eq!(strategy, ExtractionStrategy::Direct);
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn test_fenced_block_inside_prose() {
        let reply = "Here you go:\n```json\n{\"a\": \"x\"}\n```\nThanks {not json}";
        let (obj, strategy) = extract_json_object(reply).unwrap();
        assert_eq!(strategy, ExtractionStrategy::FencedBlock);
        assert_eq!(obj["a"], "x");
    }

    #[test]
    fn test_brace_span_in_prose() {
        let reply = "Sure. {\"a\": {\"b\": 2}} Hope it helps.";
        let (obj, strategy) = extract_json_object(reply).unwrap();
        assert_eq!(strategy, ExtractionStrategy::BraceSpan);
        assert_eq!(obj["a"]["b"], 2);
    }

    #[test]
    fn test_same_payload_in_every_wrapping_gives_same_object() {
        let payload = r#"{"diagnosis_system": "Укажи код МКБ-10: X00.0", "meta": {"tags": ["a", "b"], "n": 2}}"#;
        let plain = extract_json_object(payload).unwrap();
        let fenced = extract_json_object(&format!("```json\n{payload}\n```")).unwrap();
        let prose = extract_json_object(&format!("Вот улучшенные промпты: {payload} Удачи!")).unwrap();

        assert_eq!(plain.1, ExtractionStrategy::Direct);
        assert_eq!(fenced.1, ExtractionStrategy::FencedBlock);
        assert_eq!(prose.1, ExtractionStrategy::BraceSpan);
        assert_eq!(plain.0, fenced.0);
        assert_eq!(plain.0, prose.0);
        assert_eq!(plain.0["meta"]["tags"][1], "b");
    }

    #[test]
    fn test_non_objects_do_not_count() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("\"just a string\"").is_none());
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
