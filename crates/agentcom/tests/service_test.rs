//! End-to-end tests: a real agentcom instance on ephemeral ports, driven
//! through the generated gRPC client and plain HTTP.

use agentcom::proto::{self, director_client::DirectorClient};
use agentcom::{
    AgentCom, AgentComConfig, Completion, ShutdownReason, Snapshot, DEFAULT_API_KEY_HEADER,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Request};

struct Running {
    dir: TempDir,
    completion: Completion,
    trigger: oneshot::Sender<()>,
}

impl Running {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentComConfig::new()
            .with_host("127.0.0.1")
            .with_rpc_port(0)
            .with_http_port(0)
            .with_snapshot_path(dir.path().join("snapshot.json"))
            .with_shutdown_grace(Duration::from_secs(5));
        let (trigger, stopped) = oneshot::channel::<()>();

        let completion = AgentCom::new(config)
            .start_with_shutdown(async move {
                let _ = stopped.await;
            })
            .await
            .unwrap();

        Self {
            dir,
            completion,
            trigger,
        }
    }

    async fn client(&self) -> DirectorClient<Channel> {
        DirectorClient::connect(format!("http://{}", self.completion.rpc_addr()))
            .await
            .unwrap()
    }

    fn last_snapshot_url(&self) -> String {
        format!("http://{}/lastSnapshot", self.completion.http_addr())
    }

    fn persisted(&self) -> Option<Snapshot> {
        std::fs::read(self.dir.path().join("snapshot.json"))
            .ok()
            .map(|bytes| Snapshot::from_slice(&bytes).unwrap())
    }

    async fn stop(self) -> agentcom::Result<ShutdownReason> {
        let _ = self.trigger.send(());
        tokio::time::timeout(Duration::from_secs(10), self.completion.wait())
            .await
            .expect("shutdown exceeded bound")
    }
}

fn with_key<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(DEFAULT_API_KEY_HEADER, MetadataValue::from_static("agent-key"));
    request
}

fn report_of(body: serde_json::Value) -> proto::Snapshot {
    proto::Snapshot {
        raw_snapshot: serde_json::to_vec(&body).unwrap(),
        content_type: "application/json".to_string(),
        identity: Some(proto::Identity {
            account_id: "acct-1".to_string(),
            cluster_id: "c-1".to_string(),
            hostname: "edge-0".to_string(),
            version: "1.0.0".to_string(),
        }),
    }
}

fn chunks(parts: &[&str]) -> Vec<proto::RawSnapshotChunk> {
    parts
        .iter()
        .map(|part| proto::RawSnapshotChunk {
            chunk: part.as_bytes().to_vec(),
        })
        .collect()
}

#[tokio::test]
async fn test_report_is_cached_persisted_and_served() {
    let running = Running::start().await;
    let mut client = running.client().await;
    let report = report_of(json!({"services": [{"name": "web", "replicas": 3}]}));
    let expected = report.to_record().unwrap();

    client.report(with_key(report.clone())).await.unwrap();

    assert_eq!(running.persisted(), Some(expected.clone()));
    let response = reqwest::get(running.last_snapshot_url()).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let served: proto::Snapshot = response.json().await.unwrap();
    assert_eq!(served, report);

    drop(client);
    assert_eq!(running.stop().await.unwrap(), ShutdownReason::Signal);
}

#[tokio::test]
async fn test_not_found_before_first_report() {
    let running = Running::start().await;

    let response = reqwest::get(running.last_snapshot_url()).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.unwrap().is_empty());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_report_stream_reassembles_chunks() {
    let running = Running::start().await;
    let mut client = running.client().await;

    let request = with_key(futures::stream::iter(chunks(&[r#"{"a":1"#, "}"])));
    client.report_stream(request).await.unwrap();

    let expected = Snapshot::new(json!({"a": 1}));
    assert_eq!(running.persisted(), Some(expected.clone()));
    let served: Snapshot = reqwest::get(running.last_snapshot_url())
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(served, expected);

    drop(client);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_unauthenticated_calls_leave_state_unchanged() {
    let running = Running::start().await;
    let mut client = running.client().await;
    let report = report_of(json!({"version": 1}));
    let accepted = report.to_record().unwrap();
    client.report(with_key(report)).await.unwrap();

    let rejected = report_of(json!({"version": 2}));
    let status = client
        .report(Request::new(rejected.clone()))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    let mut empty_key = Request::new(rejected);
    empty_key
        .metadata_mut()
        .insert(DEFAULT_API_KEY_HEADER, MetadataValue::from_static(""));
    let status = client.report(empty_key).await.unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    let status = client
        .report_stream(Request::new(futures::stream::iter(chunks(&[
            r#"{"version":3}"#,
        ]))))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    assert_eq!(running.persisted(), Some(accepted.clone()));
    let served: Snapshot = reqwest::get(running.last_snapshot_url())
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(served, accepted);

    drop(client);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_stream_is_rejected() {
    let running = Running::start().await;
    let mut client = running.client().await;

    let status = client
        .report_stream(with_key(futures::stream::iter(chunks(&[r#"{"a":"#]))))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert_eq!(running.persisted(), None);

    drop(client);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_retrieve_reports_unimplemented() {
    let running = Running::start().await;
    let mut client = running.client().await;

    let status = client
        .retrieve(with_key(proto::Identity::default()))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    drop(client);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_reports_keep_one_whole_snapshot() {
    let running = Running::start().await;
    let report_a = report_of(json!({"who": "a", "blob": "a".repeat(64 * 1024)}));
    let report_b = report_of(json!({"who": "b", "blob": "b".repeat(64 * 1024)}));
    let a = report_a.to_record().unwrap();
    let b = report_b.to_record().unwrap();

    let mut client_a = running.client().await;
    let mut client_b = running.client().await;
    let (ra, rb) = tokio::join!(
        client_a.report(with_key(report_a)),
        client_b.report(with_key(report_b)),
    );
    ra.unwrap();
    rb.unwrap();

    let persisted = running.persisted().unwrap();
    assert!(persisted == a || persisted == b);
    let served: Snapshot = reqwest::get(running.last_snapshot_url())
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(served, persisted);

    drop(client_a);
    drop(client_b);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_signal_stops_both_listeners() {
    let running = Running::start().await;
    let rpc_addr = running.completion.rpc_addr();
    let http_addr = running.completion.http_addr();

    let started = std::time::Instant::now();
    assert_eq!(running.stop().await.unwrap(), ShutdownReason::Signal);
    assert!(started.elapsed() < Duration::from_secs(30));

    assert!(tokio::net::TcpStream::connect(rpc_addr).await.is_err());
    assert!(tokio::net::TcpStream::connect(http_addr).await.is_err());
}

#[tokio::test]
async fn test_manual_shutdown() {
    let running = Running::start().await;
    running.completion.shutdown();

    let reason = tokio::time::timeout(Duration::from_secs(10), running.completion.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::Requested);
}
