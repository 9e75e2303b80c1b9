//! Chain store core for multi-device feed sync.
//!
//! Chains group devices under one identity. The crate persists chain
//! identities, read marks and per-chain feed blobs on PostgreSQL or SQLite,
//! reconciles identities arriving from the legacy sync service and copies
//! whole stores between backends.

pub mod config;
pub mod domain;
pub mod outbound;
