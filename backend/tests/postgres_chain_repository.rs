//! Integration tests for `PostgresChainRepository` against embedded PostgreSQL.
//!
//! The suite bootstraps a cluster with `pg-embed-setup-unpriv`, recreates a
//! dedicated database, migrates it through the store's own migrations and
//! then runs the shared backend checks, plus a transfer from a SQLite
//! store. Set `SKIP_TEST_CLUSTER=1` where the cluster cannot start.

use std::time::Duration;

use chainsync::domain::ports::UniqueIndex;
use chainsync::domain::{
    ChainKey, Device, Precondition, StoreTransfer, TransferOptions, TransferReport,
};
use chainsync::outbound::persistence::{StoreLocation, open_chain_repository};
use chrono::{DateTime, Utc};
use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use rstest::{fixture, rstest};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use uuid::Uuid;

#[path = "support/chain_contract.rs"]
mod chain_contract;

mod support;

use chain_contract::Store;
use support::{format_postgres_error, handle_cluster_setup_failure, reset_database, test_cluster};

// Fields drop in order: the pool before its runtime, the cluster last.
struct TestContext {
    store: Store,
    database_url: String,
    runtime: Runtime,
    _cluster: TestCluster,
}

fn setup_context() -> Result<TestContext, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = test_cluster()?;
    let database = format!("chains_{}", Uuid::new_v4().simple());
    reset_database(&cluster, &database)?;
    let database_url = cluster.connection().database_url(&database);
    let location = StoreLocation::parse(&database_url).map_err(|err| err.to_string())?;

    let repo = runtime
        .block_on(open_chain_repository(&location, 4, Duration::from_secs(10)))
        .map_err(|err| err.to_string())?;

    Ok(TestContext {
        store: chain_contract::chain_store(repo),
        database_url,
        runtime,
        _cluster: cluster,
    })
}

#[fixture]
fn repo_context() -> Option<TestContext> {
    match setup_context() {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

fn index_names(url: &str) -> Result<Vec<String>, String> {
    let mut client = Client::connect(url, NoTls).map_err(|err| format_postgres_error(&err))?;
    let rows = client
        .query(
            "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' ORDER BY indexname",
            &[],
        )
        .map_err(|err| format_postgres_error(&err))?;
    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

#[rstest]
fn postgres_store_honours_the_backend_contract(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: postgres_store_honours_the_backend_contract skipped");
        return;
    };

    context
        .runtime
        .block_on(chain_contract::full_contract(&context.store));
}

async fn sqlite_source(dir: &TempDir) -> Store {
    let path = dir.path().join("source.db");
    let location =
        StoreLocation::parse(path.to_str().expect("utf-8 temp path")).expect("sqlite location");
    let repo = open_chain_repository(&location, 1, Duration::from_secs(10))
        .await
        .expect("open sqlite store");
    chain_contract::chain_store(repo)
}

#[rstest]
fn sqlite_chains_transfer_into_postgres(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: sqlite_chains_transfer_into_postgres skipped");
        return;
    };
    let dir = tempfile::tempdir().expect("create temp dir");

    context.runtime.block_on(async {
        let source = sqlite_source(&dir).await;
        let destination = &context.store;

        let (user, _) = source
            .identity
            .register_chain("laptop")
            .await
            .expect("register chain");
        source
            .identity
            .join_chain(&ChainKey::Public(user.public_id), "phone")
            .await
            .expect("join chain");
        let etag = source
            .feed_blobs
            .write(user.db_id, 21, "feeds-v1", &Precondition::Any)
            .await
            .expect("write blob");
        source
            .read_marks
            .add_read_mark(user.db_id, "article-1")
            .await
            .expect("add read mark");

        let report = StoreTransfer::new(
            source.repository().as_ref(),
            destination.repository().as_ref(),
            TransferOptions::default(),
        )
        .run()
        .await
        .expect("transfer succeeds");
        assert_eq!(
            report,
            TransferReport {
                users: 1,
                devices: 2,
                feed_blobs: 1,
                read_marks: 0,
            }
        );

        let copied = destination
            .identity
            .find_chain(&ChainKey::SyncCode(user.sync_code.clone()))
            .await
            .expect("chain copied");
        assert_eq!(copied.public_id, user.public_id);

        let source_devices = source
            .identity
            .list_devices(&user.public_id)
            .await
            .expect("source devices");
        let copied_devices = destination
            .identity
            .list_devices(&copied.public_id)
            .await
            .expect("copied devices");
        let project = |devices: &[Device]| {
            devices
                .iter()
                .map(|device| {
                    (
                        device.public_id,
                        device.legacy_id,
                        device.name.clone(),
                        device.last_seen,
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(project(&copied_devices), project(&source_devices));
        assert!(copied_devices.iter().all(|device| device.owner == copied.db_id));

        let blob = destination
            .feed_blobs
            .read(copied.db_id)
            .await
            .expect("blob copied");
        assert_eq!(blob.etag, etag);
        assert_eq!(blob.content, "feeds-v1");
        assert_eq!(blob.content_hash, 21);

        let marks = destination
            .read_marks
            .read_marks_since(&copied.public_id, DateTime::<Utc>::UNIX_EPOCH)
            .await
            .expect("read marks");
        assert!(marks.is_empty(), "read marks stay behind by default");
    });
}

#[rstest]
fn unique_indexes_carry_the_names_errors_are_classified_by(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!(
            "SKIP-TEST-CLUSTER: unique_indexes_carry_the_names_errors_are_classified_by skipped"
        );
        return;
    };

    let names = index_names(&context.database_url).expect("list indexes");

    for name in [
        "idx_users_user_id",
        "idx_users_legacy_sync_code",
        "idx_devices_device_id",
        "idx_devices_user_db_id_legacy_device_id",
        "idx_read_marks_user_db_id_identifier",
        "idx_feed_blobs_user_db_id",
    ] {
        assert!(names.iter().any(|n| n == name), "missing index {name}");
        assert_ne!(
            UniqueIndex::from_index_name(name),
            UniqueIndex::Unknown,
            "{name} should map to a known index"
        );
    }
}

#[rstest]
fn migrating_twice_is_a_no_op(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: migrating_twice_is_a_no_op skipped");
        return;
    };

    let location = StoreLocation::parse(&context.database_url).expect("postgres location");
    context
        .runtime
        .block_on(chainsync::outbound::persistence::migrate(&location))
        .expect("second migration run");
    context
        .runtime
        .block_on(chain_contract::stores_answer_pings(&context.store));
}
