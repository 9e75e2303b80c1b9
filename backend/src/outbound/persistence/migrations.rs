//! Store locations, embedded schema migrations and repository construction.
//!
//! A chain store is named by a single location string. The scheme picks the
//! backend:
//!
//! - `postgres://` or `postgresql://` opens PostgreSQL;
//! - `sqlite://<path>`, a `file:` URI or a bare filesystem path opens SQLite.
//!
//! Each backend carries its own migration set under `backend/migrations/`.
//! Migrations always run to completion before the pool is handed out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;
use url::Url;

use crate::domain::ports::ChainRepository;

use super::pool::{PgPool, PoolConfig, PoolError, SqlitePool};
use super::{PostgresChainRepository, SqliteChainRepository};

/// Embedded migrations for PostgreSQL.
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Embedded migrations for SQLite.
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

const SQLITE_SCHEME_PREFIX: &str = "sqlite://";

/// Errors raised while locating, migrating or opening a chain store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreSetupError {
    /// The location string names no supported backend.
    #[error("unsupported store location `{location}`: {reason}")]
    Location { location: String, reason: String },

    /// Schema migrations could not be applied.
    #[error("failed to migrate {backend} store: {message}")]
    Migration {
        backend: &'static str,
        message: String,
    },

    /// The connection pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl StoreSetupError {
    fn location(location: &str, reason: impl Into<String>) -> Self {
        Self::Location {
            location: location.to_owned(),
            reason: reason.into(),
        }
    }

    fn migration(backend: &'static str, message: impl fmt::Display) -> Self {
        Self::Migration {
            backend,
            message: message.to_string(),
        }
    }
}

/// Where a chain store lives.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A PostgreSQL connection URL.
    Postgres { url: String },
    /// A SQLite database file, as a path or `file:` URI.
    Sqlite { path: String },
}

impl StoreLocation {
    /// Classify a location string by its scheme.
    ///
    /// # Errors
    ///
    /// Returns [`StoreSetupError::Location`] for empty strings, unknown URL
    /// schemes and in-memory SQLite databases, which cannot be migrated and
    /// shared across connections.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainsync::outbound::persistence::StoreLocation;
    ///
    /// let location = StoreLocation::parse("sqlite:///var/lib/chains.db").unwrap();
    /// assert_eq!(location.backend_name(), "sqlite");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, StoreSetupError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreSetupError::location(raw, "location is empty"));
        }

        if let Some(path) = trimmed.strip_prefix(SQLITE_SCHEME_PREFIX) {
            return Self::sqlite(raw, path);
        }

        match Url::parse(trimmed) {
            Ok(url) => match url.scheme() {
                "postgres" | "postgresql" => Ok(Self::Postgres {
                    url: trimmed.to_owned(),
                }),
                "file" => Self::sqlite(raw, trimmed),
                scheme => Err(StoreSetupError::location(
                    raw,
                    format!("unknown scheme `{scheme}`"),
                )),
            },
            Err(_) => Self::sqlite(raw, trimmed),
        }
    }

    fn sqlite(raw: &str, path: &str) -> Result<Self, StoreSetupError> {
        if path.is_empty() {
            return Err(StoreSetupError::location(raw, "sqlite path is empty"));
        }
        if path == ":memory:" || path.contains("mode=memory") {
            return Err(StoreSetupError::location(
                raw,
                "in-memory sqlite databases are not supported",
            ));
        }
        Ok(Self::Sqlite {
            path: path.to_owned(),
        })
    }

    /// Short backend label for logs and errors.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Sqlite { .. } => "sqlite",
        }
    }

    /// The string handed to the database driver.
    pub fn connection_string(&self) -> &str {
        match self {
            Self::Postgres { url } => url,
            Self::Sqlite { path } => path,
        }
    }

    /// Apply every pending migration for this backend.
    ///
    /// Blocks the calling thread; async callers use [`migrate`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreSetupError::Migration`] when the database cannot be
    /// reached or a migration fails.
    pub fn run_pending_migrations(&self) -> Result<(), StoreSetupError> {
        let backend = self.backend_name();
        let applied = match self {
            Self::Postgres { url } => {
                let mut conn = PgConnection::establish(url)
                    .map_err(|err| StoreSetupError::migration(backend, err))?;
                conn.run_pending_migrations(POSTGRES_MIGRATIONS)
                    .map_err(|err| StoreSetupError::migration(backend, err))?
                    .len()
            }
            Self::Sqlite { path } => {
                let mut conn = SqliteConnection::establish(path)
                    .map_err(|err| StoreSetupError::migration(backend, err))?;
                conn.run_pending_migrations(SQLITE_MIGRATIONS)
                    .map_err(|err| StoreSetupError::migration(backend, err))?
                    .len()
            }
        };
        info!(backend, applied, "schema migrations complete");
        Ok(())
    }
}

impl fmt::Debug for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Renders the location with any PostgreSQL password masked.
impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres { url } => match Url::parse(url) {
                Ok(mut parsed) if parsed.password().is_some() => {
                    // Only fails for cannot-be-a-base URLs, which have no password.
                    let _ = parsed.set_password(Some("***"));
                    write!(f, "{parsed}")
                }
                _ => f.write_str(url),
            },
            Self::Sqlite { path } => write!(f, "sqlite:{path}"),
        }
    }
}

/// Apply pending migrations on a blocking thread.
///
/// # Errors
///
/// As for [`StoreLocation::run_pending_migrations`].
pub async fn migrate(location: &StoreLocation) -> Result<(), StoreSetupError> {
    let backend = location.backend_name();
    let owned = location.clone();
    tokio::task::spawn_blocking(move || owned.run_pending_migrations())
        .await
        .map_err(|err| StoreSetupError::migration(backend, err))?
}

/// Migrate the store at `location` and open a repository over it.
///
/// `max_connections` only applies to PostgreSQL; SQLite always uses a single
/// connection.
///
/// # Errors
///
/// Returns [`StoreSetupError::Migration`] if the schema cannot be brought up
/// to date and [`StoreSetupError::Pool`] if the pool cannot be built.
pub async fn open_chain_repository(
    location: &StoreLocation,
    max_connections: u32,
    connection_timeout: Duration,
) -> Result<Arc<dyn ChainRepository>, StoreSetupError> {
    migrate(location).await?;

    let config = PoolConfig::new(location.connection_string())
        .with_max_size(max_connections.max(1))
        .with_min_idle(Some(1))
        .with_connection_timeout(connection_timeout);

    let repository: Arc<dyn ChainRepository> = match location {
        StoreLocation::Postgres { .. } => {
            Arc::new(PostgresChainRepository::new(PgPool::new(config).await?))
        }
        StoreLocation::Sqlite { .. } => {
            Arc::new(SqliteChainRepository::new(SqlitePool::new(config).await?))
        }
    };
    info!(location = %location, "chain store opened");
    Ok(repository)
}
