//! Embedded PostgreSQL bootstrap and database reset for integration suites.
//!
//! `pg-embed-setup-unpriv` installs into `/var/tmp` by default. Sandboxed
//! runners cannot write there, so unless `PG_RUNTIME_DIR` and `PG_DATA_DIR`
//! are both set, bootstrap points them at a fresh directory under the cargo
//! target directory for the duration of the call.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use uuid::Uuid;

use super::format_postgres_error;

const MAINTENANCE_DB: &str = "postgres";
const BOOTSTRAP_ATTEMPTS: u32 = 4;
const BOOTSTRAP_BACKOFF: Duration = Duration::from_millis(500);

static BOOTSTRAP_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn scratch_dirs() -> Result<(String, String), String> {
    let target = std::env::var_os("CARGO_TARGET_DIR").map_or_else(
        || PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target"),
        PathBuf::from,
    );
    let base = target
        .join("pg-embed")
        .join(format!("chainsync-{}-{}", std::process::id(), Uuid::new_v4()));
    let runtime = base.join("install");
    let data = base.join("data");
    for dir in [&runtime, &data] {
        std::fs::create_dir_all(dir).map_err(|err| format!("create {}: {err}", dir.display()))?;
    }
    Ok((
        runtime.to_string_lossy().into_owned(),
        data.to_string_lossy().into_owned(),
    ))
}

/// Binary downloads fail intermittently when suites start in parallel.
fn looks_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    [
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "dns error",
        "error decoding response body",
        "temporarily unavailable",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

/// Start an embedded cluster, retrying transient download failures with
/// exponential backoff.
pub fn test_cluster() -> Result<TestCluster, String> {
    let _serialised = BOOTSTRAP_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let has_dirs =
        std::env::var_os("PG_RUNTIME_DIR").is_some() && std::env::var_os("PG_DATA_DIR").is_some();
    let _env = if has_dirs {
        None
    } else {
        let (runtime, data) = scratch_dirs()?;
        Some(env_lock::lock_env([
            ("PG_RUNTIME_DIR", Some(runtime)),
            ("PG_DATA_DIR", Some(data)),
        ]))
    };

    let mut attempt = 1;
    loop {
        match TestCluster::new() {
            Ok(cluster) => return Ok(cluster),
            Err(err) => {
                let message = format!("{err:?}");
                if attempt >= BOOTSTRAP_ATTEMPTS || !looks_transient(&message) {
                    return Err(message);
                }
                let delay = BOOTSTRAP_BACKOFF * 2_u32.pow(attempt - 1);
                eprintln!("pg-embed: attempt {attempt} failed, retrying in {delay:?}: {message}");
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Drop `name` if it exists and create it empty.
///
/// Open sessions on the old database are terminated so a previous suite's
/// pool cannot block the reset.
pub fn reset_database(cluster: &TestCluster, name: &str) -> Result<(), String> {
    let url = cluster.connection().database_url(MAINTENANCE_DB);
    let mut client = Client::connect(&url, NoTls).map_err(|err| format_postgres_error(&err))?;
    // Separate statements: a multi-statement batch runs as one transaction.
    client
        .batch_execute(&format!("DROP DATABASE IF EXISTS \"{name}\" WITH (FORCE)"))
        .map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute(&format!("CREATE DATABASE \"{name}\""))
        .map_err(|err| format_postgres_error(&err))?;
    Ok(())
}
