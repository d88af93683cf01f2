use thiserror::Error;

use crate::emotion::ClassificationError;
use crate::keywords::KeywordError;
use crate::onnx_models::ModelError;
use crate::search::SearchError;
use crate::store::StoreError;
use crate::translate::TranslationError;

/// Failures while wiring the service together at startup.
#[derive(Error, Debug)]
pub enum RedreamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Translation setup error: {0}")]
    Translation(#[from] TranslationError),

    #[error("Search setup error: {0}")]
    Search(#[from] SearchError),
}

/// Failure of a single `analyze` run. The search stage never appears here:
/// it degrades to placeholder text instead of aborting.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("dream text is empty")]
    EmptyInput,

    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("keyword extraction failed: {0}")]
    Keywords(#[from] KeywordError),

    #[error("emotion classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("failed to persist record: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RedreamConfig;

    fn load_missing() -> Result<RedreamConfig, RedreamError> {
        Ok(RedreamConfig::load("/nonexistent/redream.toml")?)
    }

    fn read_missing() -> Result<String, RedreamError> {
        Ok(std::fs::read_to_string("/nonexistent/socket.lock")?)
    }

    #[test]
    fn test_config_and_io_failures_convert() {
        let err = load_missing().unwrap_err();
        assert!(matches!(err, RedreamError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));

        let err = read_missing().unwrap_err();
        assert!(matches!(err, RedreamError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_pipeline_error_wraps_stage_errors() {
        let err = PipelineError::from(TranslationError::MissingTranslation);
        assert!(matches!(err, PipelineError::Translation(_)));
        assert_eq!(PipelineError::EmptyInput.to_string(), "dream text is empty");
    }
}
