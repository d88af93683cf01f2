pub mod config;
pub mod db;
pub mod emotion;
pub mod error;
pub mod ipc;
pub mod keywords;
pub mod models;
pub mod onnx_models;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod translate;

pub use config::RedreamConfig;
pub use emotion::{ClassificationError, EmotionClassifier, RawPrediction, SentimentModel};
pub use error::{PipelineError, RedreamError};
pub use keywords::{KeywordError, KeywordExtractor, PosTag, PosTagger, TaggedToken};
pub use models::{DreamRecord, Emotion, NewDream};
pub use onnx_models::{ModelError, OnnxModelConfig, OnnxPosTagger, OnnxSentimentModel};
pub use pipeline::{DreamPipeline, LanguagePair};
pub use search::{BingSearchClient, InterpretationSearcher, SearchError, SearchProvider};
pub use store::{DeleteOutcome, MemoryRecordStore, PgRecordStore, RecordStore, StoreError};
pub use translate::{GoogleTranslateClient, PassthroughTranslator, TranslationError, Translator};
