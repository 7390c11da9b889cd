use crate::transport::{HttpTransport, HttpTransportConfig, DEFAULT_SERVER_URL};
use crate::vcs::RemoteVcs;
use quire_versioning::{LocalVcs, Result, VersionControl, VersioningEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where versioning operations are executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Engine in this process over a redb file
    Local { data_dir: PathBuf },
    /// Quire server reached over HTTP
    Remote { base_url: String },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Local {
            data_dir: PathBuf::from("./quire.redb"),
        }
    }
}

impl Backend {
    pub fn remote_default() -> Self {
        Backend::Remote {
            base_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

/// Builds a [`VersionControl`] for the configured backend
///
/// Callers written against `Arc<dyn VersionControl>` switch between an
/// in-process engine and a server by changing the backend only.
#[derive(Debug, Clone, Default)]
pub struct VcsFactory {
    backend: Backend,
    timeout: Option<Duration>,
}

impl VcsFactory {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    /// Request timeout for remote backends
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn build(&self) -> Result<Arc<dyn VersionControl>> {
        match &self.backend {
            Backend::Local { data_dir } => {
                info!("Using local versioning engine at {}", data_dir.display());
                let engine = VersioningEngine::open(data_dir)?;
                Ok(Arc::new(LocalVcs::new(Arc::new(engine))))
            }
            Backend::Remote { base_url } => {
                info!("Using remote versioning engine at {}", base_url);
                let mut config = HttpTransportConfig::new(base_url.clone());
                if let Some(timeout) = self.timeout {
                    config.timeout = timeout;
                }
                let transport = HttpTransport::new(config)?;
                Ok(Arc::new(RemoteVcs::new(Arc::new(transport))))
            }
        }
    }
}
