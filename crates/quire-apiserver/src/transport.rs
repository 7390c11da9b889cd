use crate::handlers::dispatch;
use async_trait::async_trait;
use quire_core::{RpcCall, RpcFailure, RpcTransport, StructuredError};
use quire_versioning::VersioningEngine;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// In-process [`RpcTransport`]
///
/// Runs calls through the same dispatcher as the HTTP handler. The call,
/// its result and any error are serialized to JSON and back on the way, so
/// anything that would not survive the wire fails here too.
#[derive(Clone)]
pub struct LocalTransport {
    engine: Arc<VersioningEngine>,
}

impl LocalTransport {
    pub fn new(engine: Arc<VersioningEngine>) -> Self {
        Self { engine }
    }
}

fn round_trip<T>(what: &str, value: &T) -> Result<T, RpcFailure>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let bytes = serde_json::to_vec(value)
        .map_err(|e| RpcFailure::transport(format!("failed to encode {}: {}", what, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RpcFailure::transport(format!("failed to decode {}: {}", what, e)))
}

#[async_trait]
impl RpcTransport for LocalTransport {
    async fn call(&self, call: RpcCall) -> Result<Value, RpcFailure> {
        let call = round_trip("request", &call)?;
        debug!("Local RPC call: {}", call.method());

        match dispatch(&self.engine, call) {
            Ok(value) => round_trip("response", &value),
            Err(err) => {
                let body: StructuredError = round_trip("error", &err.to_structured())?;
                Err(RpcFailure::Remote(body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{decode_result, Changeset, ChangesetNum, ErrorKind};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_transport_round_trip() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(VersioningEngine::open(dir.path().join("test.redb")).unwrap());
        let transport = LocalTransport::new(engine);

        let value = transport.call(RpcCall::NewStagingChangeset).await.unwrap();
        let cs: Changeset = decode_result("new_staging_changeset", value).unwrap();
        assert_eq!(cs.num, ChangesetNum::new(1));

        let failure = transport
            .call(RpcCall::Commit {
                changeset: cs.num,
                force: false,
            })
            .await
            .unwrap_err();
        match failure {
            RpcFailure::Remote(err) => assert_eq!(err.kind, ErrorKind::ChangesetNotFinalized),
            other => panic!("unexpected failure: {}", other),
        }
    }
}
