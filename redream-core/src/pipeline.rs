//! Dream analysis pipeline
//!
//! ```text
//!   dream_text ─┬─► InterpretationSearcher ───────────────────────┐
//!               └─► Translator ─┬─► KeywordExtractor ─────────────┤
//!                               └─► EmotionClassifier ────────────┴─► RecordStore
//! ```
//!
//! The search stage degrades to placeholder text; every other failure aborts
//! the run before anything is written, so no partial record is ever stored.

use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::emotion::EmotionClassifier;
use crate::error::PipelineError;
use crate::keywords::KeywordExtractor;
use crate::models::{DreamRecord, NewDream};
use crate::search::InterpretationSearcher;
use crate::store::{DeleteOutcome, RecordStore};
use crate::translate::Translator;

/// Source and pivot language codes handed to the translator.
#[derive(Debug, Clone)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            source: "ko".to_string(),
            target: "en".to_string(),
        }
    }
}

/// Explicitly constructed stages; nothing here is a global.
pub struct DreamPipeline {
    translator: Arc<dyn Translator>,
    languages: LanguagePair,
    keywords: KeywordExtractor,
    classifier: EmotionClassifier,
    searcher: InterpretationSearcher,
    store: Arc<dyn RecordStore>,
}

impl DreamPipeline {
    pub fn new(
        translator: Arc<dyn Translator>,
        languages: LanguagePair,
        keywords: KeywordExtractor,
        classifier: EmotionClassifier,
        searcher: InterpretationSearcher,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            translator,
            languages,
            keywords,
            classifier,
            searcher,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run every stage on `dream_text` and persist the result.
    pub async fn analyze(&self, dream_text: &str) -> Result<DreamRecord, PipelineError> {
        if dream_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("analyze", %run_id, chars = dream_text.chars().count());
        self.run(dream_text).instrument(span).await
    }

    async fn run(&self, dream_text: &str) -> Result<DreamRecord, PipelineError> {
        let (search_results, translated) = tokio::join!(
            self.searcher.search(dream_text),
            self.translator.translate(
                dream_text,
                &self.languages.source,
                &self.languages.target
            ),
        );

        let translated = translated.map_err(|e| {
            tracing::error!(translator = self.translator.name(), error = %e, "Translation failed");
            PipelineError::from(e)
        })?;
        tracing::debug!(translated = %translated, "Translated dream text");

        let (keywords, classification) = tokio::join!(
            self.keywords.extract_keywords(&translated),
            self.classifier.classify(&translated),
        );
        let keywords = keywords.map_err(|e| {
            tracing::error!(error = %e, "Keyword extraction failed");
            PipelineError::from(e)
        })?;
        let (emotion, confidence) = classification.map_err(|e| {
            tracing::error!(error = %e, "Emotion classification failed");
            PipelineError::from(e)
        })?;

        let dream = NewDream {
            dream_text: dream_text.to_string(),
            keywords,
            emotion,
            confidence,
            search_results,
        };

        let record = self.store.insert(dream).await?;
        tracing::info!(
            id = record.id,
            emotion = %record.emotion,
            confidence = record.confidence,
            keywords = record.keywords.len(),
            "Dream analyzed"
        );
        Ok(record)
    }

    pub async fn list_records(&self) -> Result<Vec<DreamRecord>, PipelineError> {
        Ok(self.store.list().await?)
    }

    pub async fn delete_record(&self, id: i64) -> Result<DeleteOutcome, PipelineError> {
        Ok(self.store.delete_by_id(id).await?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
