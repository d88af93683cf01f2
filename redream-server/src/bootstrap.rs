//! Startup wiring: builds every pipeline stage from configuration
//!
//! Models, HTTP clients and the store are constructed exactly once here and
//! injected into `DreamPipeline`; nothing downstream reaches for globals.

use std::sync::Arc;
use std::time::Duration;

use redream_core::config::StoreBackend;
use redream_core::translate::create_translator;
use redream_core::{
    db, BingSearchClient, DreamPipeline, EmotionClassifier, InterpretationSearcher,
    KeywordExtractor, LanguagePair, MemoryRecordStore, OnnxModelConfig, OnnxPosTagger,
    OnnxSentimentModel, PgRecordStore, RecordStore, RedreamConfig, RedreamError,
};

/// Read `path` and apply the `REDREAM__*` environment overlay.
pub fn load_config(path: &str) -> Result<RedreamConfig, RedreamError> {
    Ok(RedreamConfig::load(path)?)
}

/// Connect the configured record store, creating the schema if needed.
pub async fn build_store(config: &RedreamConfig) -> Result<Arc<dyn RecordStore>, RedreamError> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let pool = db::connect_with_retry(&config.database).await?;
            db::ensure_schema(&pool).await?;
            tracing::info!("Connected to PostgreSQL record store");
            Ok(Arc::new(PgRecordStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; records are lost on restart");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}

/// Load models and clients, then assemble the pipeline around `store`.
pub fn build_pipeline(
    config: &RedreamConfig,
    store: Arc<dyn RecordStore>,
) -> Result<DreamPipeline, RedreamError> {
    let translator = create_translator(&config.translation)?;
    tracing::info!(provider = translator.name(), "Translator ready");

    let threads = config.models.effective_intra_threads();
    let timeout = Duration::from_secs(config.models.inference_timeout_seconds);

    let sentiment = OnnxSentimentModel::new(OnnxModelConfig::from_dir(
        &config.models.sentiment_path(),
        threads,
        timeout,
    ))?;
    let tagger = OnnxPosTagger::new(OnnxModelConfig::from_dir(
        &config.models.tagger_path(),
        threads,
        timeout,
    ))?;
    let search = BingSearchClient::new(&config.search)?;

    Ok(DreamPipeline::new(
        Arc::from(translator),
        LanguagePair {
            source: config.translation.source_lang.clone(),
            target: config.translation.target_lang.clone(),
        },
        KeywordExtractor::new(Arc::new(tagger)),
        EmotionClassifier::new(Arc::new(sentiment)),
        InterpretationSearcher::new(Arc::new(search), config.search.query_suffix.clone()),
        store,
    ))
}
