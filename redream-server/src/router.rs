use redream_core::ipc::{RedreamRequest, RedreamResponse};
use redream_core::{DeleteOutcome, DreamPipeline, DreamRecord, PipelineError};
use serde::Serialize;

/// Body of a successful `Analyze` response.
#[derive(Debug, Serialize)]
pub struct AnalysisView<'a> {
    pub record: &'a DreamRecord,
    /// Asset path for a front end to resolve against its own static root.
    /// This server does not serve `/static`.
    pub illustration: &'static str,
}

/// Dispatch one request against the pipeline. Shared by IPC and HTTP.
pub async fn handle_request(request: RedreamRequest, pipeline: &DreamPipeline) -> RedreamResponse {
    match request {
        RedreamRequest::Ping => RedreamResponse::pong(),
        RedreamRequest::Health => match pipeline.store().describe().await {
            Ok(store) => RedreamResponse::ok(serde_json::json!({
                "status": "healthy",
                "store": store,
            })),
            Err(e) => RedreamResponse::err(format!("Store health check failed: {}", e)),
        },
        RedreamRequest::Analyze { dream_text } => match pipeline.analyze(&dream_text).await {
            Ok(record) => to_response(&AnalysisView {
                illustration: record.emotion.illustration(),
                record: &record,
            }),
            Err(e) => pipeline_error(e),
        },
        RedreamRequest::List => match pipeline.list_records().await {
            Ok(records) => RedreamResponse::ok(serde_json::json!({
                "count": records.len(),
                "records": records,
            })),
            Err(e) => pipeline_error(e),
        },
        RedreamRequest::Delete { id } => match pipeline.delete_record(id).await {
            Ok(outcome) => RedreamResponse::ok(serde_json::json!({
                "id": id,
                "deleted": outcome == DeleteOutcome::Deleted,
            })),
            Err(e) => pipeline_error(e),
        },
    }
}

fn to_response<T: Serialize>(value: &T) -> RedreamResponse {
    match serde_json::to_value(value) {
        Ok(v) => RedreamResponse::ok(v),
        Err(e) => RedreamResponse::err(format!("Serialization error: {}", e)),
    }
}

fn pipeline_error(e: PipelineError) -> RedreamResponse {
    tracing::warn!(error = %e, "Request failed");
    RedreamResponse::err(e.to_string())
}
