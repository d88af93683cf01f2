use crate::router;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use redream_core::ipc::{RedreamRequest, RedreamResponse};
use redream_core::{DreamPipeline, RedreamError};
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Serve MessagePack requests framed with a 4-byte little-endian length prefix.
pub async fn run_unix_server(
    socket_path: &str,
    pipeline: Arc<DreamPipeline>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    remove_stale_socket(socket_path)?;

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let (read, write) = stream.into_split();
                    let le_codec = || LengthDelimitedCodec::builder().little_endian().new_codec();
                    let mut framed_read = FramedRead::new(read, le_codec());
                    let mut framed_write = FramedWrite::new(write, le_codec());

                    while let Some(frame) = framed_read.next().await {
                        let bytes_mut = match frame {
                            Ok(b) => b,
                            Err(e) => {
                                tracing::error!("Frame error: {}", e);
                                break;
                            }
                        };

                        let response = match rmp_serde::from_slice::<RedreamRequest>(&bytes_mut) {
                            Ok(request) => router::handle_request(request, &pipeline).await,
                            Err(e) => RedreamResponse::err(format!("Deserialization error: {}", e)),
                        };

                        match rmp_serde::to_vec_named(&response) {
                            Ok(resp_bytes) => {
                                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                                    tracing::error!("Failed to send response: {}", e);
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to serialize response: {}", e);
                                break;
                            }
                        }
                    }
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    remove_stale_socket(socket_path)?;

    Ok(())
}

pub fn remove_stale_socket(socket_path: &str) -> Result<(), RedreamError> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }
    Ok(())
}
