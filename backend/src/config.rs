//! Chain store and transfer configuration loaded via OrthoConfig.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::TransferOptions;
use crate::domain::ports::ChainRepository;
use crate::outbound::persistence::{StoreLocation, StoreSetupError, open_chain_repository};

/// Connection settings for the chain store a process serves.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CHAINSYNC")]
pub struct StoreSettings {
    /// Store location: a PostgreSQL URL, `sqlite://<path>` or a file path.
    pub database_url: Option<String>,
    /// Pool size for PostgreSQL. SQLite always uses one connection.
    #[ortho_config(default = 10)]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    #[ortho_config(default = 30)]
    pub connection_timeout_secs: u64,
}

impl StoreSettings {
    /// Resolve the configured store location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreSetupError::Location`] when no location is configured
    /// or the scheme is unsupported.
    pub fn location(&self) -> Result<StoreLocation, StoreSetupError> {
        StoreLocation::parse(self.database_url.as_deref().unwrap_or_default())
    }

    /// Connection checkout timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Migrate the configured store and open a repository over it.
    pub async fn open(&self) -> Result<Arc<dyn ChainRepository>, StoreSetupError> {
        open_chain_repository(
            &self.location()?,
            self.max_connections,
            self.connection_timeout(),
        )
        .await
    }
}

/// Settings for a one-shot store transfer.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CHAINSYNC_TRANSFER")]
pub struct TransferSettings {
    /// Store to copy from.
    pub source_url: Option<String>,
    /// Store to copy into. Migrated before the copy starts.
    pub destination_url: Option<String>,
    /// Copy read marks as well as identities and feed blobs.
    #[ortho_config(default = false)]
    pub transfer_read_marks: bool,
}

impl TransferSettings {
    /// Resolve the source store location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreSetupError::Location`] when unset or unsupported.
    pub fn source(&self) -> Result<StoreLocation, StoreSetupError> {
        StoreLocation::parse(self.source_url.as_deref().unwrap_or_default())
    }

    /// Resolve the destination store location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreSetupError::Location`] when unset or unsupported.
    pub fn destination(&self) -> Result<StoreLocation, StoreSetupError> {
        StoreLocation::parse(self.destination_url.as_deref().unwrap_or_default())
    }

    /// Transfer knobs derived from these settings.
    pub fn options(&self) -> TransferOptions {
        TransferOptions {
            transfer_read_marks: self.transfer_read_marks,
        }
    }
}
