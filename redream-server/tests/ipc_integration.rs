//! Round-trips MessagePack requests through the Unix socket server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use redream_core::ipc::{RedreamRequest, RedreamResponse};
use redream_core::{
    ClassificationError, DreamPipeline, EmotionClassifier, InterpretationSearcher,
    KeywordError, KeywordExtractor, LanguagePair, MemoryRecordStore, PassthroughTranslator,
    PosTag, PosTagger, RawPrediction, SearchError, SearchProvider, SentimentModel, TaggedToken,
};
use redream_server::server::run_unix_server;
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

struct NounTagger;

#[async_trait]
impl PosTagger for NounTagger {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, KeywordError> {
        Ok(text
            .split_whitespace()
            .map(|w| TaggedToken::new(w, PosTag::Noun))
            .collect())
    }
}

struct NeutralSentiment;

#[async_trait]
impl SentimentModel for NeutralSentiment {
    async fn predict(&self, _text: &str) -> Result<RawPrediction, ClassificationError> {
        Ok(RawPrediction {
            label: "LABEL_1".to_string(),
            score: 0.5,
        })
    }
}

struct NoResults;

#[async_trait]
impl SearchProvider for NoResults {
    async fn snippets(&self, _query: &str) -> Result<Vec<String>, SearchError> {
        Ok(Vec::new())
    }
}

async fn call(
    framed: &mut Framed<UnixStream, LengthDelimitedCodec>,
    request: &RedreamRequest,
) -> RedreamResponse {
    let bytes = rmp_serde::to_vec_named(request).unwrap();
    framed.send(Bytes::from(bytes)).await.unwrap();
    let frame = framed.next().await.expect("response frame").unwrap();
    rmp_serde::from_slice(&frame).unwrap()
}

#[tokio::test]
async fn test_ipc_analyze_list_delete() {
    let socket_path = std::env::temp_dir()
        .join(format!("redream-ipc-{}.sock", std::process::id()))
        .to_string_lossy()
        .into_owned();

    let pipeline = Arc::new(DreamPipeline::new(
        Arc::new(PassthroughTranslator),
        LanguagePair::default(),
        KeywordExtractor::new(Arc::new(NounTagger)),
        EmotionClassifier::new(Arc::new(NeutralSentiment)),
        InterpretationSearcher::new(Arc::new(NoResults), "꿈 해석"),
        Arc::new(MemoryRecordStore::new()),
    ));

    let (tx, _rx) = broadcast::channel(1);
    let server = tokio::spawn({
        let path = socket_path.clone();
        let shutdown = tx.subscribe();
        async move { run_unix_server(&path, pipeline, shutdown).await }
    });

    let mut stream = None;
    for _ in 0..50 {
        if let Ok(s) = UnixStream::connect(&socket_path).await {
            stream = Some(s);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let codec = LengthDelimitedCodec::builder().little_endian().new_codec();
    let mut framed = Framed::new(stream.expect("server socket"), codec);

    let pong = call(&mut framed, &RedreamRequest::Ping).await;
    assert!(pong.is_ok());

    let analyzed = call(
        &mut framed,
        &RedreamRequest::Analyze {
            dream_text: "river cat".to_string(),
        },
    )
    .await;
    assert!(analyzed.is_ok(), "analyze failed: {:?}", analyzed.error);
    let data = analyzed.data.unwrap();
    assert_eq!(data["record"]["emotion"], "NEUTRAL");
    assert_eq!(data["record"]["search_results"], "검색 결과를 찾을 수 없습니다.");
    assert_eq!(data["illustration"], "/static/images/중립.png");

    let listed = call(&mut framed, &RedreamRequest::List).await;
    assert_eq!(listed.data.unwrap()["count"], 1);

    let deleted = call(&mut framed, &RedreamRequest::Delete { id: 1 }).await;
    assert_eq!(deleted.data.unwrap()["deleted"], true);
    let missing = call(&mut framed, &RedreamRequest::Delete { id: 1 }).await;
    assert_eq!(missing.data.unwrap()["deleted"], false);

    // Garbage payloads get an error response, not a dropped connection.
    framed.send(Bytes::from_static(b"\xc1")).await.unwrap();
    let frame = framed.next().await.unwrap().unwrap();
    let resp: RedreamResponse = rmp_serde::from_slice(&frame).unwrap();
    assert!(!resp.is_ok());

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    assert!(!std::path::Path::new(&socket_path).exists());
}
