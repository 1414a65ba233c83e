//! gRPC Director service: unary and streamed snapshot ingestion

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tonic::{Request, Response, Status, Streaming};

use crate::auth::AuthGate;
use crate::proto::{self, director_server::Director};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use crate::{AgentComError, Result, DEFAULT_MAX_SNAPSHOT_BYTES};

/// Director service state
#[derive(Clone)]
pub struct DirectorService {
    store: Arc<SnapshotStore>,
    auth: AuthGate,
    max_snapshot_bytes: usize,
}

impl DirectorService {
    pub fn new(store: Arc<SnapshotStore>, auth: AuthGate) -> Self {
        Self {
            store,
            auth,
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
        }
    }

    /// Cap the size of a single snapshot
    pub fn with_max_snapshot_bytes(mut self, max: usize) -> Self {
        self.max_snapshot_bytes = max;
        self
    }

    /// Wrap in the generated tonic server
    pub fn into_server(self) -> proto::director_server::DirectorServer<Self> {
        // Room for the envelope around a maximum-size snapshot
        let limit = self.max_snapshot_bytes.saturating_add(1024);
        proto::director_server::DirectorServer::new(self).max_decoding_message_size(limit)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Reassemble a chunked snapshot, decode it and store it
    pub async fn ingest_stream<S>(&self, chunks: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<proto::RawSnapshotChunk, Status>> + Unpin,
    {
        let data = reassemble(chunks, self.max_snapshot_bytes).await?;
        let snapshot = Snapshot::from_slice(&data).map_err(|e| {
            tracing::warn!("Rejected malformed snapshot stream: {}", e);
            e
        })?;
        self.accept(snapshot, data.len(), "stream").await
    }

    async fn accept(&self, snapshot: Snapshot, bytes: usize, source: &'static str) -> Result<()> {
        if bytes > self.max_snapshot_bytes {
            return Err(AgentComError::PayloadTooLarge {
                limit: self.max_snapshot_bytes,
            });
        }

        tracing::info!(source, bytes, "Received snapshot");
        self.store.write(snapshot).await?;
        Ok(())
    }
}

/// Concatenate chunks in arrival order until the stream ends cleanly.
///
/// A transport error aborts reassembly and is returned as-is; whatever was
/// buffered so far is dropped. The buffer never grows past `limit`.
pub async fn reassemble<S>(mut chunks: S, limit: usize) -> Result<Vec<u8>>
where
    S: Stream<Item = std::result::Result<proto::RawSnapshotChunk, Status>> + Unpin,
{
    let mut data = Vec::new();
    while let Some(next) = chunks.next().await {
        let chunk = match next {
            Ok(message) => message.chunk,
            Err(status) => {
                tracing::warn!(
                    buffered = data.len(),
                    "Snapshot stream failed: {}",
                    status.message()
                );
                return Err(AgentComError::Stream(status));
            }
        };
        if data.len() + chunk.len() > limit {
            return Err(AgentComError::PayloadTooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

type SnapshotStream =
    Pin<Box<dyn Stream<Item = std::result::Result<proto::Snapshot, Status>> + Send>>;

#[tonic::async_trait]
impl Director for DirectorService {
    type RetrieveStream = SnapshotStream;

    async fn report(
        &self,
        request: Request<proto::Snapshot>,
    ) -> std::result::Result<Response<proto::SnapshotResponse>, Status> {
        self.auth.check(request.metadata()).map_err(AgentComError::from)?;

        let message = request.into_inner();
        if let Some(identity) = message.identity.clone() {
            tracing::debug!(agent = %crate::Identity::from(identity), "Report");
        }
        let bytes = prost::Message::encoded_len(&message);
        self.accept(message.to_record()?, bytes, "unary").await?;
        Ok(Response::new(proto::SnapshotResponse {}))
    }

    async fn report_stream(
        &self,
        request: Request<Streaming<proto::RawSnapshotChunk>>,
    ) -> std::result::Result<Response<proto::SnapshotResponse>, Status> {
        self.auth.check(request.metadata()).map_err(AgentComError::from)?;

        self.ingest_stream(request.into_inner()).await?;
        Ok(Response::new(proto::SnapshotResponse {}))
    }

    async fn retrieve(
        &self,
        request: Request<proto::Identity>,
    ) -> std::result::Result<Response<Self::RetrieveStream>, Status> {
        let identity = crate::Identity::from(request.into_inner());
        tracing::debug!(agent = %identity, "Retrieve requested");
        Err(Status::unimplemented("Retrieve is not implemented"))
    }
}
