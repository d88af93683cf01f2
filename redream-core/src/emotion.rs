//! Emotion classification: sentiment model output mapped onto `Emotion`

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Emotion;

/// Raw output of a single-label sentiment model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    pub score: f32,
}

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("model returned unknown label '{0}' (model/version mismatch?)")]
    UnknownLabel(String),

    #[error("model returned score {0} outside [0, 1]")]
    InvalidScore(f32),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("sentiment inference error: {0}")]
    Inference(String),

    #[error("sentiment model timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn predict(&self, text: &str) -> Result<RawPrediction, ClassificationError>;
}

/// Fixed lookup from the model's raw labels. Anything else is rejected.
pub fn map_raw_label(label: &str) -> Result<Emotion, ClassificationError> {
    match label {
        "LABEL_0" => Ok(Emotion::Negative),
        "LABEL_1" => Ok(Emotion::Neutral),
        "LABEL_2" => Ok(Emotion::Positive),
        other => Err(ClassificationError::UnknownLabel(other.to_string())),
    }
}

#[derive(Clone)]
pub struct EmotionClassifier {
    model: Arc<dyn SentimentModel>,
}

impl EmotionClassifier {
    pub fn new(model: Arc<dyn SentimentModel>) -> Self {
        Self { model }
    }

    /// One model call; the confidence is the score of that same prediction.
    pub async fn classify(&self, text: &str) -> Result<(Emotion, f32), ClassificationError> {
        let prediction = self.model.predict(text).await?;
        let emotion = map_raw_label(&prediction.label)?;

        if !(0.0..=1.0).contains(&prediction.score) {
            return Err(ClassificationError::InvalidScore(prediction.score));
        }

        tracing::debug!(
            raw_label = %prediction.label,
            emotion = %emotion,
            confidence = prediction.score,
            "Classified emotion"
        );
        Ok((emotion, prediction.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(&'static str, f32);

    #[async_trait]
    impl SentimentModel for FixedModel {
        async fn predict(&self, _text: &str) -> Result<RawPrediction, ClassificationError> {
            Ok(RawPrediction {
                label: self.0.to_string(),
                score: self.1,
            })
        }
    }

    fn classifier(label: &'static str, score: f32) -> EmotionClassifier {
        EmotionClassifier::new(Arc::new(FixedModel(label, score)))
    }

    #[tokio::test]
    async fn test_label_table() {
        let cases = [
            ("LABEL_0", Emotion::Negative),
            ("LABEL_1", Emotion::Neutral),
            ("LABEL_2", Emotion::Positive),
        ];
        for (raw, expected) in cases {
            let (emotion, confidence) = classifier(raw, 0.61).classify("text").await.unwrap();
            assert_eq!(emotion, expected, "raw label {raw}");
            assert_eq!(confidence, 0.61);
        }
    }

    #[tokio::test]
    async fn test_unknown_label_is_error_not_default() {
        for raw in ["LABEL_3", "positive", "POSITIVE", ""] {
            match classifier(raw, 0.9).classify("text").await {
                Err(ClassificationError::UnknownLabel(label)) => assert_eq!(label, raw),
                other => panic!("Expected UnknownLabel for {raw:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_confidence_passes_through_unmodified() {
        let (_, confidence) = classifier("LABEL_2", 0.87).classify("text").await.unwrap();
        assert_eq!(confidence, 0.87);

        let (_, edge) = classifier("LABEL_0", 1.0).classify("text").await.unwrap();
        assert_eq!(edge, 1.0);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        for score in [1.5, -0.01, f32::NAN] {
            let result = classifier("LABEL_1", score).classify("text").await;
            assert!(
                matches!(result, Err(ClassificationError::InvalidScore(_))),
                "score {score} should be rejected"
            );
        }
    }
}
