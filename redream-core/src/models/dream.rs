use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Emotional classification of a dream, as stored and serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    Positive,
    Neutral,
    Negative,
}

impl Emotion {
    pub const ALL: [Emotion; 3] = [Emotion::Positive, Emotion::Neutral, Emotion::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Positive => "POSITIVE",
            Emotion::Neutral => "NEUTRAL",
            Emotion::Negative => "NEGATIVE",
        }
    }

    /// Static illustration shown next to an analysis result.
    pub fn illustration(&self) -> &'static str {
        match self {
            Emotion::Positive => "/static/images/긍정.png",
            Emotion::Neutral => "/static/images/중립.png",
            Emotion::Negative => "/static/images/부정.png",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown emotion '{0}'")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    /// Parses the canonical uppercase form only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POSITIVE" => Ok(Emotion::Positive),
            "NEUTRAL" => Ok(Emotion::Neutral),
            "NEGATIVE" => Ok(Emotion::Negative),
            other => Err(UnknownEmotion(other.to_string())),
        }
    }
}

/// A fully analyzed dream awaiting an id from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDream {
    pub dream_text: String,
    pub keywords: Vec<String>,
    pub emotion: Emotion,
    pub confidence: f32,
    pub search_results: String,
}

/// A persisted dream analysis. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreamRecord {
    pub id: i64,
    pub dream_text: String,
    pub keywords: Vec<String>,
    pub emotion: Emotion,
    pub confidence: f32,
    pub search_results: String,
    pub created_at: DateTime<Utc>,
}

impl DreamRecord {
    pub fn from_new(id: i64, created_at: DateTime<Utc>, dream: NewDream) -> Self {
        Self {
            id,
            dream_text: dream.dream_text,
            keywords: dream.keywords,
            emotion: dream.emotion,
            confidence: dream.confidence,
            search_results: dream.search_results,
            created_at,
        }
    }

    /// Keywords rendered the way the records page shows them.
    pub fn keywords_display(&self) -> String {
        self.keywords.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_serializes_uppercase() {
        let json = serde_json::to_value(Emotion::Negative).unwrap();
        assert_eq!(json, serde_json::json!("NEGATIVE"));
        let back: Emotion = serde_json::from_value(serde_json::json!("POSITIVE")).unwrap();
        assert_eq!(back, Emotion::Positive);
    }

    #[test]
    fn test_emotion_from_str_rejects_other_casings() {
        assert_eq!("NEUTRAL".parse::<Emotion>(), Ok(Emotion::Neutral));
        assert!("neutral".parse::<Emotion>().is_err());
        assert!("".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_unknown_emotion_is_std_error() {
        let err = "happy".parse::<Emotion>().unwrap_err();
        assert_eq!(err, UnknownEmotion("happy".to_string()));
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(boxed.to_string(), "unknown emotion 'happy'");
    }

    #[test]
    fn test_every_emotion_has_distinct_illustration() {
        let paths: std::collections::HashSet<_> =
            Emotion::ALL.iter().map(|e| e.illustration()).collect();
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_keywords_display_joins_with_comma() {
        let record = DreamRecord::from_new(
            7,
            Utc::now(),
            NewDream {
                dream_text: "하늘을 날았다".to_string(),
                keywords: vec!["flew".to_string(), "sky".to_string()],
                emotion: Emotion::Positive,
                confidence: 0.9,
                search_results: "없음".to_string(),
            },
        );
        assert_eq!(record.id, 7);
        assert_eq!(record.keywords_display(), "flew, sky");
    }
}
