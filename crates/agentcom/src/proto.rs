//! Generated gRPC types for the `agent` package

#![allow(missing_docs)]
#![allow(clippy::doc_markdown)]

tonic::include_proto!("agent");

impl From<Identity> for crate::snapshot::Identity {
    fn from(id: Identity) -> Self {
        Self {
            account_id: id.account_id,
            cluster_id: id.cluster_id,
            hostname: id.hostname,
            version: id.version,
        }
    }
}

impl From<crate::snapshot::Identity> for Identity {
    fn from(id: crate::snapshot::Identity) -> Self {
        Self {
            account_id: id.account_id,
            cluster_id: id.cluster_id,
            hostname: id.hostname,
            version: id.version,
        }
    }
}

impl Snapshot {
    /// The whole message as an opaque record, exactly as it is persisted
    pub fn to_record(&self) -> crate::Result<crate::Snapshot> {
        Ok(crate::Snapshot::new(serde_json::to_value(self)?))
    }
}
