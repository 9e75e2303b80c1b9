//! Helpers shared by the PostgreSQL integration suites.
//!
//! Each file under `backend/tests/` is its own crate, so suites that need an
//! embedded cluster declare `mod support;` and pull these in.

pub mod embedded_postgres;

pub use embedded_postgres::{reset_database, test_cluster};

const SKIP_ENV: &str = "SKIP_TEST_CLUSTER";

/// True when `SKIP_TEST_CLUSTER` is `1`, `true` or `yes` (any case).
pub fn should_skip_test_cluster() -> bool {
    std::env::var(SKIP_ENV).is_ok_and(|value| {
        matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

/// Turn a cluster setup failure into a skip or a panic.
///
/// Returns `None` after printing a `SKIP-TEST-CLUSTER` marker when skipping
/// is enabled. Otherwise panics, so a broken cluster fails CI loudly.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        return None;
    }
    panic!("embedded PostgreSQL setup failed: {reason}. Set {SKIP_ENV}=1 to skip.");
}

/// Render a `postgres` error including SQLSTATE, detail and hint.
///
/// The driver's `Display` collapses server errors to `db error`, which is
/// useless in CI logs.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut rendered = format!("{} ({})", db_error.message(), db_error.code().code());
    for (label, extra) in [("detail", db_error.detail()), ("hint", db_error.hint())] {
        if let Some(text) = extra {
            rendered.push_str(&format!("; {label}: {text}"));
        }
    }
    rendered
}
