//! Translation stage: converts the dream text into the pivot language
//!
//! Provides a `Translator` trait with implementations for:
//! - **Google**: Cloud Translation v2 REST API
//! - **Passthrough**: identity, for input already in the pivot language

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{TranslationConfig, TranslationProvider};

// ============================================================================
// Translator trait
// ============================================================================

/// Abstraction over translation providers.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("nothing to translate")]
    EmptyInput,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing translation in response")]
    MissingTranslation,

    #[error("Missing API key")]
    MissingApiKey,
}

/// Build the translator selected by `[translation] provider`.
pub fn create_translator(
    config: &TranslationConfig,
) -> Result<Box<dyn Translator>, TranslationError> {
    match config.provider {
        TranslationProvider::Google => Ok(Box::new(GoogleTranslateClient::new(config)?)),
        TranslationProvider::Passthrough => Ok(Box::new(PassthroughTranslator)),
    }
}

// ============================================================================
// Google Cloud Translation v2 (private wire structs)
// ============================================================================

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: Option<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GoogleTranslateClient
// ============================================================================

/// Google Cloud Translation client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct GoogleTranslateClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleTranslateClient {
    pub fn new(config: &TranslationConfig) -> Result<Self, TranslationError> {
        Self::with_base_url(config, config.base_url.clone())
    }

    /// Create a client against a custom base URL (for testing / proxies)
    pub fn with_base_url(
        config: &TranslationConfig,
        base_url: String,
    ) -> Result<Self, TranslationError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();
        if api_key.is_empty() {
            return Err(TranslationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let url = format!("{}/language/translate/v2", self.base_url);
        let request = TranslateRequest {
            q: text,
            source: source_lang,
            target: target_lang,
            format: "text",
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<GoogleErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Translation API error");
            return Err(TranslationError::Api { code, message });
        }

        let body: TranslateResponse = response.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslationError::MissingTranslation)
    }

    fn name(&self) -> &str {
        "google"
    }
}

// ============================================================================
// PassthroughTranslator
// ============================================================================

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

// ============================================================================
// TESTS
// ============================================================================
