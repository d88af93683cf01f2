//! Keyword extraction: part-of-speech filtering over the translated text
//!
//! A keyword is any token whose Universal POS tag carries content:
//! NOUN, PROPN, ADJ, VERB or ADV. No ranking, no deduplication.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Universal Dependencies part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosTag {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    X,
}

impl PosTag {
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            PosTag::Noun | PosTag::Propn | PosTag::Adj | PosTag::Verb | PosTag::Adv
        )
    }
}

impl FromStr for PosTag {
    type Err = std::convert::Infallible;

    /// Labels outside the UPOS set parse to `X`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s.to_ascii_uppercase().as_str() {
            "ADJ" => PosTag::Adj,
            "ADP" => PosTag::Adp,
            "ADV" => PosTag::Adv,
            "AUX" => PosTag::Aux,
            "CCONJ" | "CONJ" => PosTag::Cconj,
            "DET" => PosTag::Det,
            "INTJ" => PosTag::Intj,
            "NOUN" => PosTag::Noun,
            "NUM" => PosTag::Num,
            "PART" => PosTag::Part,
            "PRON" => PosTag::Pron,
            "PROPN" => PosTag::Propn,
            "PUNCT" => PosTag::Punct,
            "SCONJ" => PosTag::Sconj,
            "SYM" => PosTag::Sym,
            "VERB" => PosTag::Verb,
            _ => PosTag::X,
        };
        Ok(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub tag: PosTag,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, tag: PosTag) -> Self {
        Self {
            text: text.into(),
            tag,
        }
    }
}

#[derive(Error, Debug)]
pub enum KeywordError {
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("tagger inference error: {0}")]
    Inference(String),

    #[error("tagger timed out after {0}s")]
    Timeout(u64),
}

/// Tokenizes text and assigns one POS tag per token, in token order.
#[async_trait]
pub trait PosTagger: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, KeywordError>;
}

#[derive(Clone)]
pub struct KeywordExtractor {
    tagger: Arc<dyn PosTagger>,
}

impl KeywordExtractor {
    pub fn new(tagger: Arc<dyn PosTagger>) -> Self {
        Self { tagger }
    }

    pub async fn extract_keywords(&self, text: &str) -> Result<Vec<String>, KeywordError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.tagger.tag(text).await?;
        let total = tokens.len();
        let keywords: Vec<String> = tokens
            .into_iter()
            .filter(|t| t.tag.is_content())
            .map(|t| t.text)
            .collect();

        tracing::debug!(tokens = total, keywords = keywords.len(), "Extracted keywords");
        Ok(keywords)
    }
}
