//! Diesel table definitions shared by the PostgreSQL and SQLite backends.
//!
//! These definitions must match both migration trees under
//! `backend/migrations/`. Only types both engines map identically are used:
//! public identifiers are canonical UUID text and timestamps are unix
//! milliseconds.

diesel::table! {
    /// Chain identities.
    users (db_id) {
        /// Surrogate key; differs between backends.
        db_id -> BigInt,
        /// Public chain UUID (unique).
        public_id -> Text,
        /// Legacy 64-character sync code (unique).
        legacy_sync_code -> Text,
    }
}

diesel::table! {
    /// Chain members.
    ///
    /// `(user_db_id, legacy_device_id)` is unique.
    devices (db_id) {
        db_id -> BigInt,
        /// Public device UUID (unique).
        public_id -> Text,
        user_db_id -> BigInt,
        device_name -> Text,
        legacy_device_id -> BigInt,
        /// Unix milliseconds; never decreases.
        last_seen -> BigInt,
    }
}

diesel::table! {
    /// Append-only read marks; `(user_db_id, identifier)` is unique.
    read_marks (db_id) {
        db_id -> BigInt,
        user_db_id -> BigInt,
        identifier -> Text,
        read_time -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    /// One feed blob per chain; `user_db_id` is unique.
    feed_blobs (db_id) {
        db_id -> BigInt,
        user_db_id -> BigInt,
        content_hash -> BigInt,
        content -> Text,
        etag -> Text,
    }
}

diesel::joinable!(devices -> users (user_db_id));
diesel::joinable!(read_marks -> users (user_db_id));
diesel::joinable!(feed_blobs -> users (user_db_id));

diesel::allow_tables_to_appear_in_same_query!(users, devices, read_marks, feed_blobs);
