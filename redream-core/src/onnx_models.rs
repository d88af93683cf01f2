//! ONNX inference backends: sentiment and part-of-speech models
//!
//! Both are Hugging Face transformer exports living in a directory with
//! `model.onnx`, `tokenizer.json` and `config.json` (for `id2label`).
//! Sessions are loaded once at startup and shared behind a mutex; inference
//! runs on the blocking thread pool under an explicit timeout.

use async_trait::async_trait;
use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokenizers::{Encoding, Tokenizer, TruncationParams};

use crate::emotion::{ClassificationError, RawPrediction, SentimentModel};
use crate::keywords::{KeywordError, PosTag, PosTagger, TaggedToken};

/// Longest token sequence fed to either model.
pub const MAX_SEQUENCE_LEN: usize = 512;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found at {path}")]
    NotFound { path: String },

    #[error("failed to create ONNX session: {0}")]
    Session(String),

    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),

    #[error("invalid model config: {0}")]
    Labels(String),
}

/// Paths and runtime limits for one model directory.
#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub config_path: PathBuf,
    pub intra_threads: usize,
    pub timeout: Duration,
}

impl OnnxModelConfig {
    pub fn from_dir(dir: &Path, intra_threads: usize, timeout: Duration) -> Self {
        Self {
            model_path: dir.join("model.onnx"),
            tokenizer_path: dir.join("tokenizer.json"),
            config_path: dir.join("config.json"),
            intra_threads,
            timeout,
        }
    }
}

/// The subset of a Hugging Face `config.json` we read.
#[derive(Debug, Deserialize)]
struct HfModelConfig {
    id2label: HashMap<String, String>,
    #[serde(default)]
    type_vocab_size: Option<u32>,
}

/// Turn `{"0": "A", "1": "B"}` into `["A", "B"]`, requiring contiguous ids.
fn labels_from_id2label(id2label: HashMap<String, String>) -> Result<Vec<String>, ModelError> {
    let mut indexed = Vec::with_capacity(id2label.len());
    for (id, label) in id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| ModelError::Labels(format!("non-numeric label id '{id}'")))?;
        indexed.push((idx, label));
    }
    indexed.sort_by_key(|(idx, _)| *idx);

    for (expected, (idx, _)) in indexed.iter().enumerate() {
        if *idx != expected {
            return Err(ModelError::Labels(format!(
                "label ids are not contiguous: missing {expected}"
            )));
        }
    }
    if indexed.is_empty() {
        return Err(ModelError::Labels("id2label is empty".to_string()));
    }
    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

#[derive(Debug)]
enum InferenceFailure {
    Tokenizer(String),
    Inference(String),
}

impl From<InferenceFailure> for ClassificationError {
    fn from(f: InferenceFailure) -> Self {
        match f {
            InferenceFailure::Tokenizer(m) => ClassificationError::Tokenizer(m),
            InferenceFailure::Inference(m) => ClassificationError::Inference(m),
        }
    }
}

impl From<InferenceFailure> for KeywordError {
    fn from(f: InferenceFailure) -> Self {
        match f {
            InferenceFailure::Tokenizer(m) => KeywordError::Tokenizer(m),
            InferenceFailure::Inference(m) => KeywordError::Inference(m),
        }
    }
}

/// Session, tokenizer and label table shared by both model kinds.
struct LoadedModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    labels: Arc<Vec<String>>,
    token_type_ids: bool,
    timeout: Duration,
}

impl LoadedModel {
    fn load(config: &OnnxModelConfig) -> Result<Self, ModelError> {
        for path in [&config.model_path, &config.tokenizer_path, &config.config_path] {
            if !path.exists() {
                return Err(ModelError::NotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let raw_config = std::fs::read_to_string(&config.config_path)
            .map_err(|e| ModelError::Labels(e.to_string()))?;
        let hf: HfModelConfig =
            serde_json::from_str(&raw_config).map_err(|e| ModelError::Labels(e.to_string()))?;
        // RoBERTa-style exports (type_vocab_size = 1) take no token_type_ids input.
        let token_type_ids = hf.type_vocab_size.map(|n| n > 1).unwrap_or(true);
        let labels = labels_from_id2label(hf.id2label)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(config.intra_threads))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| ModelError::Session(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LEN,
                ..Default::default()
            }))
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        tracing::info!(
            model = %config.model_path.display(),
            labels = labels.len(),
            token_type_ids,
            "Loaded ONNX model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            labels: Arc::new(labels),
            token_type_ids,
            timeout: config.timeout,
        })
    }

    /// Tokenize and run the model on the blocking pool.
    /// Returns the encoding alongside the output logits (shape, flat data).
    async fn infer(
        &self,
        text: &str,
    ) -> Result<Option<(Encoding, Vec<usize>, Vec<f32>)>, InferenceFailure> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let token_type_ids = self.token_type_ids;
        let text = text.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|e| InferenceFailure::Inference(format!("session lock poisoned: {e}")))?;
            run_sync(&mut guard, &tokenizer, &text, token_type_ids)
        });

        await_with_deadline(self.timeout, task).await
    }
}

/// Await an inference task, yielding `Ok(None)` once `timeout` elapses.
async fn await_with_deadline<T>(
    timeout: Duration,
    task: JoinHandle<Result<T, InferenceFailure>>,
) -> Result<Option<T>, InferenceFailure> {
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined
            .map_err(|e| InferenceFailure::Inference(format!("spawn_blocking join error: {e}")))?
            .map(Some),
        Err(_) => Ok(None),
    }
}

fn run_sync(
    session: &mut Session,
    tokenizer: &Tokenizer,
    text: &str,
    with_token_type_ids: bool,
) -> Result<(Encoding, Vec<usize>, Vec<f32>), InferenceFailure> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| InferenceFailure::Tokenizer(e.to_string()))?;

    let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let attention_mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    let token_type_ids: Vec<i64> = encoding
        .get_type_ids()
        .iter()
        .map(|&t| t as i64)
        .collect();

    let shape = vec![1i64, input_ids.len() as i64];

    let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids)).map_err(ort_err)?;
    let attention_mask_tensor =
        Tensor::from_array((shape.clone(), attention_mask)).map_err(ort_err)?;

    let run_result = if with_token_type_ids {
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids)).map_err(ort_err)?;
        session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })
    } else {
        session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        })
    };
    let outputs = run_result.map_err(ort_err)?;

    let (out_shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(ort_err)?;
    let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();

    Ok((encoding, dims, data.to_vec()))
}

fn ort_err<E: std::fmt::Display>(e: E) -> InferenceFailure {
    InferenceFailure::Inference(e.to_string())
}

/// Numerically stable softmax over one logit row.
fn softmax(logits: ArrayView1<'_, f32>) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .cloned()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

// ============================================================================
// Sentiment
// ============================================================================

/// Sequence-classification model, e.g. `twitter-roberta-base-sentiment`.
pub struct OnnxSentimentModel {
    inner: LoadedModel,
}

impl std::fmt::Debug for OnnxSentimentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSentimentModel")
            .field("labels", &self.inner.labels)
            .finish_non_exhaustive()
    }
}

impl OnnxSentimentModel {
    pub fn new(config: OnnxModelConfig) -> Result<Self, ModelError> {
        Ok(Self {
            inner: LoadedModel::load(&config)?,
        })
    }
}

#[async_trait]
impl SentimentModel for OnnxSentimentModel {
    async fn predict(&self, text: &str) -> Result<RawPrediction, ClassificationError> {
        let (_, dims, data) = self
            .inner
            .infer(text)
            .await?
            .ok_or(ClassificationError::Timeout(self.inner.timeout.as_secs()))?;

        let prediction = sentiment_from_logits(&dims, &data, &self.inner.labels)?;
        Ok(prediction)
    }
}

fn sentiment_from_logits(
    dims: &[usize],
    data: &[f32],
    labels: &[String],
) -> Result<RawPrediction, ClassificationError> {
    // Expected shape: [1, num_labels]
    if dims.len() != 2 {
        return Err(ClassificationError::Inference(format!(
            "Expected 2D output, got {}D",
            dims.len()
        )));
    }
    let logits = ArrayView2::from_shape((dims[0], dims[1]), data)
        .map_err(|e| ClassificationError::Inference(e.to_string()))?;
    let probs = softmax(logits.index_axis(Axis(0), 0));
    let (idx, score) = argmax(&probs)
        .ok_or_else(|| ClassificationError::Inference("empty logits".to_string()))?;
    let label = labels
        .get(idx)
        .cloned()
        .ok_or_else(|| ClassificationError::UnknownLabel(format!("index {idx}")))?;

    Ok(RawPrediction { label, score })
}

// ============================================================================
// Part-of-speech tagging
// ============================================================================

/// Token-classification model emitting Universal POS labels.
pub struct OnnxPosTagger {
    inner: LoadedModel,
}

impl std::fmt::Debug for OnnxPosTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPosTagger")
            .field("labels", &self.inner.labels.len())
            .finish_non_exhaustive()
    }
}

impl OnnxPosTagger {
    pub fn new(config: OnnxModelConfig) -> Result<Self, ModelError> {
        Ok(Self {
            inner: LoadedModel::load(&config)?,
        })
    }
}

#[async_trait]
impl PosTagger for OnnxPosTagger {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, KeywordError> {
        let (encoding, dims, data) = self
            .inner
            .infer(text)
            .await?
            .ok_or(KeywordError::Timeout(self.inner.timeout.as_secs()))?;

        let spans = WordSpans {
            word_ids: encoding.get_word_ids(),
            offsets: encoding.get_offsets(),
        };
        tokens_from_logits(text, &spans, &dims, &data, &self.inner.labels)
    }
}

struct WordSpans<'a> {
    word_ids: &'a [Option<u32>],
    offsets: &'a [(usize, usize)],
}

/// Aggregate sub-token predictions into words: the first sub-token's label
/// wins, the surface form covers every sub-token of the word.
fn tokens_from_logits(
    text: &str,
    spans: &WordSpans<'_>,
    dims: &[usize],
    data: &[f32],
    labels: &[String],
) -> Result<Vec<TaggedToken>, KeywordError> {
    // Expected shape: [1, seq_len, num_labels]
    if dims.len() != 3 {
        return Err(KeywordError::Inference(format!(
            "Expected 3D output, got {}D",
            dims.len()
        )));
    }
    let logits = ArrayView3::from_shape((dims[0], dims[1], dims[2]), data)
        .map_err(|e| KeywordError::Inference(e.to_string()))?;
    let logits = logits.index_axis(Axis(0), 0);

    let mut words: Vec<(u32, usize, usize, PosTag)> = Vec::new();
    for (tok_idx, word_id) in spans.word_ids.iter().enumerate() {
        let Some(word_id) = *word_id else { continue };
        if tok_idx >= logits.nrows() {
            break;
        }
        let (start, end) = spans.offsets[tok_idx];

        match words.last_mut() {
            Some(last) if last.0 == word_id => last.2 = end,
            _ => {
                let row: Vec<f32> = logits.row(tok_idx).to_vec();
                let (label_idx, _) = argmax(&row)
                    .ok_or_else(|| KeywordError::Inference("empty logits".to_string()))?;
                let tag = labels
                    .get(label_idx)
                    .map(|l| l.parse().unwrap_or(PosTag::X))
                    .unwrap_or(PosTag::X);
                words.push((word_id, start, end, tag));
            }
        }
    }

    Ok(words
        .into_iter()
        .filter_map(|(_, start, end, tag)| {
            let surface = text.get(start..end)?.trim();
            (!surface.is_empty()).then(|| TaggedToken::new(surface, tag))
        })
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_model_returns_not_found() {
        let config = OnnxModelConfig::from_dir(
            Path::new("/nonexistent/sentiment"),
            1,
            Duration::from_secs(1),
        );
        match OnnxSentimentModel::new(config) {
            Err(ModelError::NotFound { path }) => {
                assert!(path.ends_with("model.onnx"), "path was: {path}")
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_from_dir_layout() {
        let cfg = OnnxModelConfig::from_dir(Path::new("/m/upos"), 2, Duration::from_secs(3));
        assert_eq!(cfg.model_path, PathBuf::from("/m/upos/model.onnx"));
        assert_eq!(cfg.tokenizer_path, PathBuf::from("/m/upos/tokenizer.json"));
        assert_eq!(cfg.config_path, PathBuf::from("/m/upos/config.json"));
    }

    #[test]
    fn test_id2label_ordering() {
        let map: HashMap<String, String> = [("2", "LABEL_2"), ("0", "LABEL_0"), ("1", "LABEL_1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            labels_from_id2label(map).unwrap(),
            labels(&["LABEL_0", "LABEL_1", "LABEL_2"])
        );
    }

    #[test]
    fn test_id2label_gap_is_rejected() {
        let map: HashMap<String, String> = [("0", "A"), ("2", "C")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(matches!(labels_from_id2label(map), Err(ModelError::Labels(_))));
    }

    #[test]
    fn test_sentiment_from_logits_picks_argmax_probability() {
        let names = labels(&["LABEL_0", "LABEL_1", "LABEL_2"]);
        let prediction = sentiment_from_logits(&[1, 3], &[-1.0, 0.5, 2.5], &names).unwrap();
        assert_eq!(prediction.label, "LABEL_2");

        let expected = 2.5f32.exp() / ((-1.0f32).exp() + 0.5f32.exp() + 2.5f32.exp());
        assert!((prediction.score - expected).abs() < 1e-6);
        assert!(prediction.score > 0.0 && prediction.score <= 1.0);
    }

    #[test]
    fn test_sentiment_rejects_wrong_rank() {
        let names = labels(&["LABEL_0"]);
        let result = sentiment_from_logits(&[1, 1, 1], &[0.3], &names);
        assert!(matches!(result, Err(ClassificationError::Inference(_))));
    }

    #[test]
    fn test_tokens_merge_subwords_and_keep_first_label() {
        // "I was flying" -> [CLS] i was fly ##ing [SEP]
        let text = "I was flying";
        let word_ids = [None, Some(0), Some(1), Some(2), Some(2), None];
        let offsets = [(0, 0), (0, 1), (2, 5), (6, 9), (9, 12), (0, 0)];
        let names = labels(&["PRON", "AUX", "VERB", "NOUN"]);
        #[rustfmt::skip]
        let data = [
            0.0, 0.0, 0.0, 0.0,
            5.0, 0.0, 0.0, 0.0,
            0.0, 5.0, 0.0, 0.0,
            0.0, 0.0, 5.0, 0.0,
            0.0, 0.0, 0.0, 5.0,
            0.0, 0.0, 0.0, 0.0,
        ];

        let spans = WordSpans {
            word_ids: &word_ids,
            offsets: &offsets,
        };
        let tokens = tokens_from_logits(text, &spans, &[1, 6, 4], &data, &names).unwrap();
        assert_eq!(
            tokens,
            vec![
                TaggedToken::new("I", PosTag::Pron),
                TaggedToken::new("was", PosTag::Aux),
                TaggedToken::new("flying", PosTag::Verb),
            ]
        );
    }

    #[tokio::test]
    async fn test_deadline_expiry_maps_to_timeout_errors() {
        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, InferenceFailure>(1u8)
        });
        let outcome = await_with_deadline(Duration::from_millis(20), slow).await;
        assert!(matches!(outcome, Ok(None)));

        let classify: Result<u8, ClassificationError> = outcome
            .map_err(ClassificationError::from)
            .and_then(|o| o.ok_or(ClassificationError::Timeout(30)));
        assert!(matches!(classify, Err(ClassificationError::Timeout(30))));
    }

    #[tokio::test]
    async fn test_deadline_passes_through_fast_results_and_failures() {
        let fast = tokio::spawn(async { Ok::<_, InferenceFailure>(7u8) });
        assert!(matches!(
            await_with_deadline(Duration::from_secs(5), fast).await,
            Ok(Some(7))
        ));

        let failing = tokio::spawn(async {
            Err::<u8, _>(InferenceFailure::Tokenizer("bad input".to_string()))
        });
        let err = await_with_deadline(Duration::from_secs(5), failing)
            .await
            .map_err(KeywordError::from);
        assert!(matches!(err, Err(KeywordError::Tokenizer(m)) if m == "bad input"));
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let logits = ndarray::arr1(&[1.0f32, 2.0, 3.0]);
        let probs = softmax(logits.view());
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
