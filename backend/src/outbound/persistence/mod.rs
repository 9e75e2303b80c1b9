//! Chain store persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of the chain repository
//! ports backed by PostgreSQL or SQLite via the Diesel ORM with async support
//! through `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! The persistence layer follows these principles:
//!
//! - **One query set, two backends**: Both adapters share the schema, the row
//!   models and the query code (`chain_repository_macros.rs`). They differ
//!   only in pool type and unique-violation classification.
//! - **Thin adapters**: Repository implementations only translate between
//!   Diesel models and domain types. The feed blob write protocol and the
//!   reconciliation rules live in the domain.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) are internal implementation details, never
//!   exposed to the domain layer.
//! - **Strongly typed errors**: All database errors are mapped to
//!   [`StoreError`](crate::domain::ports::StoreError) at the boundary.
//!
//! # Example
//!
//! ```ignore
//! use chainsync::outbound::persistence::{StoreLocation, open_chain_repository};
//!
//! let location = StoreLocation::parse("postgres://localhost/chains")?;
//! let repo = open_chain_repository(&location, 10, Duration::from_secs(30)).await?;
//! ```

mod chain_repository_macros;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod postgres_chain_repository;
mod schema;
mod sqlite_chain_repository;

pub use migrations::{
    POSTGRES_MIGRATIONS, SQLITE_MIGRATIONS, StoreLocation, StoreSetupError, migrate,
    open_chain_repository,
};
pub use pool::{PgPool, PoolConfig, PoolError, SqliteHandle, SqlitePool};
pub use postgres_chain_repository::PostgresChainRepository;
pub use sqlite_chain_repository::SqliteChainRepository;
