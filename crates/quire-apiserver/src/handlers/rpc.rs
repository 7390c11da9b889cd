use crate::{ApiError, AppState, Result};
use axum::extract::State;
use axum::Json;
use quire_core::RpcCall;
use quire_versioning::{VersioningEngine, VersioningError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Execute one call against the engine and encode its result as JSON
pub fn dispatch(engine: &VersioningEngine, call: RpcCall) -> quire_versioning::Result<Value> {
    match call {
        RpcCall::NewStagingChangeset => encode(engine.new_staging_changeset()?),
        RpcCall::GetChangeset { changeset } => encode(engine.get_changeset(changeset)?),
        RpcCall::AssociateFile { changeset, path } => {
            encode(engine.associate_file(changeset, &path)?)
        }
        RpcCall::DisassociateFile { changeset, path } => {
            encode(engine.disassociate_file(changeset, &path)?)
        }
        RpcCall::FinalizeAssociatedFiles { changeset } => {
            encode(engine.finalize_associated_files(changeset)?)
        }
        RpcCall::GetFiles { changeset } => encode(engine.get_files(changeset)?),
        RpcCall::ListFiles { changeset } => encode(engine.list_files(changeset)?),
        RpcCall::Commit { changeset, force } => encode(engine.commit(changeset, force)?),
        RpcCall::LastCommittedChangeset => encode(engine.last_committed_changeset()?),
        RpcCall::WriteFile {
            path,
            content,
            changeset,
        } => encode(engine.write_file(&path, &content, changeset)?),
        RpcCall::DeleteFile { path, changeset } => encode(engine.delete_file(&path, changeset)?),
        RpcCall::RevertFile { changeset, path } => encode(engine.revert_file(changeset, &path)?),
        RpcCall::ReadFile { path } => encode(engine.read_file(&path)?),
        RpcCall::GetFileVersions { path, limit } => {
            encode(engine.get_file_versions(&path, limit)?)
        }
    }
}

fn encode<T: serde::Serialize>(value: T) -> quire_versioning::Result<Value> {
    serde_json::to_value(value).map_err(|e| {
        VersioningError::internal_error(format!("Failed to encode result: {}", e))
    })
}

/// POST /rpc
pub async fn rpc(
    State(state): State<Arc<AppState>>,
    Json(call): Json<RpcCall>,
) -> Result<Json<Value>> {
    let method = call.method();
    debug!("RPC call: {}", method);

    match dispatch(&state.engine, call) {
        Ok(value) => Ok(Json(value)),
        Err(err) => {
            warn!("RPC {} rejected: {}", method, err);
            Err(ApiError::from(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use quire_core::{Changeset, ChangesetNum, ChangesetStatus, ErrorKind, FileRecord};
    use tempfile::tempdir;

    fn setup_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempdir().unwrap();
        let engine = VersioningEngine::open(dir.path().join("test.redb")).unwrap();
        (dir, Arc::new(AppState::new(Arc::new(engine))))
    }

    #[test]
    fn test_dispatch_lifecycle() {
        let (_dir, state) = setup_state();
        let engine = &state.engine;

        let created = dispatch(engine, RpcCall::NewStagingChangeset).unwrap();
        let cs: Changeset = serde_json::from_value(created).unwrap();
        assert_eq!(cs.status, ChangesetStatus::Staging);

        dispatch(
            engine,
            RpcCall::WriteFile {
                path: "/a/foo".to_string(),
                content: b"foo!".to_vec(),
                changeset: Some(cs.num),
            },
        )
        .unwrap();
        dispatch(
            engine,
            RpcCall::Commit {
                changeset: cs.num,
                force: true,
            },
        )
        .unwrap();

        let read = dispatch(
            engine,
            RpcCall::ReadFile {
                path: "/a/foo".to_string(),
            },
        )
        .unwrap();
        let file: FileRecord = serde_json::from_value(read).unwrap();
        assert_eq!(file.content, b"foo!");
        assert_eq!(file.changeset, cs.num);
    }

    #[test]
    fn test_dispatch_delete_and_revert() {
        let (_dir, state) = setup_state();
        let engine = &state.engine;
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();

        let staged = dispatch(
            engine,
            RpcCall::DeleteFile {
                path: "/a/foo".to_string(),
                changeset: Some(cs.num),
            },
        )
        .unwrap();
        assert_eq!(staged["deleted"], serde_json::json!(true));

        let reverted = dispatch(
            engine,
            RpcCall::RevertFile {
                changeset: cs.num,
                path: "/a/foo".to_string(),
            },
        )
        .unwrap();
        let reverted: Changeset = serde_json::from_value(reverted).unwrap();
        assert!(reverted.is_staging());
        assert!(engine.list_files(cs.num).unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_reports_typed_errors() {
        let (_dir, state) = setup_state();

        let result = dispatch(
            &state.engine,
            RpcCall::GetFiles {
                changeset: ChangesetNum::new(7),
            },
        );
        assert!(matches!(
            result,
            Err(VersioningError::ChangesetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rpc_handler_error_response() {
        let (_dir, state) = setup_state();

        let result = rpc(
            State(state),
            Json(RpcCall::WriteFile {
                path: "/a/foo".to_string(),
                content: b"foo!".to_vec(),
                changeset: None,
            }),
        )
        .await;

        let err = result.err().unwrap();
        assert_eq!(err.body().kind, ErrorKind::WriteWithoutChangeset);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rpc_handler_success() {
        let (_dir, state) = setup_state();

        let Json(value) = rpc(State(state), Json(RpcCall::LastCommittedChangeset))
            .await
            .unwrap();
        assert!(value.is_null());
    }
}
