//! Behaviour every chain store backend must show.
//!
//! The PostgreSQL and SQLite suites run these checks against their own
//! adapter. Each check registers fresh chains, so checks can share one
//! database.

use std::sync::Arc;
use std::time::Duration;

use chainsync::domain::ports::{ChainRepository, IdentityRepository, UniqueIndex};
use chainsync::domain::{
    ChainId, ChainKey, ChainStore, ConditionalRead, ErrorCode, Etag, IfNoneMatch, LegacyDeviceId,
    Missing, NewDevice, NewUser, Precondition, ReadMarkInsert, SyncCode, SyncError, UserDbId,
};
use chrono::{TimeDelta, Utc};
use mockable::DefaultClock;

/// A chain store over a type-erased backend.
pub type Store = ChainStore<dyn ChainRepository>;

/// Wire the services to `repo` with the system clock.
pub fn chain_store(repo: Arc<dyn ChainRepository>) -> Store {
    ChainStore::new(repo, Arc::new(DefaultClock))
}

fn fresh_sync_code() -> SyncCode {
    SyncCode::generate(&mut rand::thread_rng())
}

pub async fn registration_round_trips(store: &Store) {
    let (user, device) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    assert_eq!(device.owner, user.db_id);
    assert_eq!(device.name, "laptop");

    let by_public = store
        .identity
        .find_chain(&ChainKey::Public(user.public_id))
        .await
        .expect("find by public id");
    let by_code = store
        .identity
        .find_chain(&ChainKey::SyncCode(user.sync_code.clone()))
        .await
        .expect("find by sync code");
    assert_eq!(by_public, user);
    assert_eq!(by_code, user);

    let found = store
        .identity
        .find_device(&user, device.legacy_id)
        .await
        .expect("find device");
    assert_eq!(found, device);
}

pub async fn unknown_chains_are_not_found(store: &Store) {
    let stranger = ChainId::random();

    let find = store.identity.find_chain(&ChainKey::Public(stranger)).await;
    assert_eq!(find, Err(SyncError::NotFound(Missing::Chain)));

    let join = store
        .identity
        .join_chain(&ChainKey::SyncCode(fresh_sync_code()), "phone")
        .await;
    assert_eq!(join, Err(SyncError::NotFound(Missing::Chain)));

    let fingerprint = store.identity.devices_fingerprint(&stranger).await;
    assert_eq!(fingerprint, Err(SyncError::NotFound(Missing::Chain)));

    let devices = store
        .identity
        .list_devices(&stranger)
        .await
        .expect("listing an unknown chain");
    assert!(devices.is_empty());
}

pub async fn membership_changes_move_the_fingerprint(store: &Store) {
    let (user, _) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    let solo = store
        .identity
        .devices_fingerprint(&user.public_id)
        .await
        .expect("fingerprint");

    let joined = store
        .identity
        .join_chain(&ChainKey::SyncCode(user.sync_code.clone()), "phone")
        .await
        .expect("join by sync code");
    assert_eq!(joined.owner, user.db_id);

    let devices = store
        .identity
        .list_devices(&user.public_id)
        .await
        .expect("list devices");
    assert_eq!(devices.len(), 2);

    let pair = store
        .identity
        .devices_fingerprint(&user.public_id)
        .await
        .expect("fingerprint");
    assert_ne!(pair, solo);

    let removed = store
        .identity
        .remove_device(user.db_id, joined.legacy_id)
        .await
        .expect("remove device");
    assert_eq!(removed, 1);
    let removed_again = store
        .identity
        .remove_device(user.db_id, joined.legacy_id)
        .await
        .expect("remove device again");
    assert_eq!(removed_again, 0);

    let devices = store
        .identity
        .list_devices(&user.public_id)
        .await
        .expect("list devices");
    assert_eq!(devices.len(), 1);
    let back_to_solo = store
        .identity
        .devices_fingerprint(&user.public_id)
        .await
        .expect("fingerprint");
    assert_eq!(back_to_solo, solo);
}

pub async fn touching_a_device_advances_last_seen(store: &Store) {
    let (user, device) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");

    tokio::time::sleep(Duration::from_millis(20)).await;
    store
        .identity
        .touch_last_seen(&device)
        .await
        .expect("touch last seen");

    let touched = store
        .identity
        .find_device(&user, device.legacy_id)
        .await
        .expect("find device");
    assert!(touched.last_seen > device.last_seen);

    store
        .identity
        .remove_device(user.db_id, device.legacy_id)
        .await
        .expect("remove device");
    store
        .identity
        .touch_last_seen(&device)
        .await
        .expect("touching a removed device is not an error");
}

pub async fn last_seen_never_moves_backwards(store: &Store) {
    let (user, device) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");

    let touched = store
        .repository()
        .touch_last_seen(device.db_id, device.last_seen - TimeDelta::hours(1))
        .await
        .expect("stale touch");
    assert_eq!(touched, 0);

    let stored = store
        .identity
        .find_device(&user, device.legacy_id)
        .await
        .expect("find device");
    assert_eq!(stored.last_seen, device.last_seen);

    let same_instant = store
        .repository()
        .touch_last_seen(device.db_id, device.last_seen)
        .await
        .expect("repeat touch");
    assert_eq!(same_instant, 1);
}

pub async fn unique_indexes_are_classified(store: &Store) {
    let repo = store.repository();
    let now = Utc::now();
    let code = fresh_sync_code();

    let user = repo
        .insert_user(&NewUser::with_sync_code(code.clone()))
        .await
        .expect("first user");
    let same_code = repo
        .insert_user(&NewUser::with_sync_code(code))
        .await
        .expect_err("sync code is unique");
    assert!(same_code.is_duplicate_on(UniqueIndex::UserSyncCode), "{same_code:?}");

    let same_public_id = repo
        .insert_user(&NewUser {
            public_id: user.public_id,
            sync_code: fresh_sync_code(),
        })
        .await
        .expect_err("public id is unique");
    assert!(same_public_id.is_duplicate_on(UniqueIndex::UserPublicId), "{same_public_id:?}");

    let device = repo
        .insert_device(user.db_id, &NewDevice::new("phone", LegacyDeviceId::new(7), now))
        .await
        .expect("first device");
    let same_legacy_id = repo
        .insert_device(user.db_id, &NewDevice::new("tablet", LegacyDeviceId::new(7), now))
        .await
        .expect_err("legacy id is unique per chain");
    assert!(same_legacy_id.is_duplicate_on(UniqueIndex::DeviceLegacyId), "{same_legacy_id:?}");

    let same_device_id = repo
        .insert_device(
            user.db_id,
            &NewDevice {
                public_id: device.public_id,
                ..NewDevice::new("watch", LegacyDeviceId::new(8), now)
            },
        )
        .await
        .expect_err("device public id is unique");
    assert!(same_device_id.is_duplicate_on(UniqueIndex::DevicePublicId), "{same_device_id:?}");

    let orphan = repo
        .insert_device(
            UserDbId::new(i64::MAX),
            &NewDevice::new("ghost", LegacyDeviceId::new(9), now),
        )
        .await
        .expect_err("owner must exist");
    assert!(orphan.is_query(), "{orphan:?}");
}

pub async fn registration_is_atomic(store: &Store) {
    let (_, existing) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    let code = fresh_sync_code();

    let clash = store
        .repository()
        .register_chain(
            &NewUser::with_sync_code(code.clone()),
            &NewDevice {
                public_id: existing.public_id,
                ..NewDevice::new("phone", LegacyDeviceId::new(1), Utc::now())
            },
        )
        .await
        .expect_err("device insert collides");
    assert!(clash.is_duplicate_on(UniqueIndex::DevicePublicId), "{clash:?}");

    let leftover = store
        .repository()
        .find_user_by_sync_code(&code)
        .await
        .expect("lookup");
    assert!(leftover.is_none(), "failed registration left a user behind");
}

pub async fn reconciliation_is_idempotent(store: &Store) {
    let code = fresh_sync_code();

    let first = store
        .reconciler
        .ensure_migration(code.as_str(), LegacyDeviceId::new(41), "legacy phone")
        .await
        .expect("first migration");
    assert_eq!(first.rows_created(), 2);

    let replay = store
        .reconciler
        .ensure_migration(code.as_str(), LegacyDeviceId::new(41), "legacy phone")
        .await
        .expect("replay");
    assert_eq!(replay.rows_created(), 0);

    let second_device = store
        .reconciler
        .ensure_migration(code.as_str(), LegacyDeviceId::new(42), "legacy tablet")
        .await
        .expect("second device");
    assert!(!second_device.user_created);
    assert!(second_device.device_created);

    let user = store
        .identity
        .find_chain(&ChainKey::SyncCode(code))
        .await
        .expect("migrated chain");
    let devices = store
        .identity
        .list_devices(&user.public_id)
        .await
        .expect("list devices");
    assert_eq!(devices.len(), 2);

    let invalid = store
        .reconciler
        .ensure_migration("short", LegacyDeviceId::new(1), "phone")
        .await
        .expect_err("wrong length");
    assert_eq!(invalid.code(), ErrorCode::InvalidArgument);
}

pub async fn feed_blob_writes_follow_preconditions(store: &Store) {
    let (user, _) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    let owner = user.db_id;
    let blobs = &store.feed_blobs;

    assert_eq!(
        blobs.read(owner).await,
        Err(SyncError::NotFound(Missing::FeedBlob))
    );
    assert_eq!(
        blobs
            .write(owner, 1, "nothing to match", &Precondition::IfMatchAny)
            .await,
        Err(SyncError::PreconditionFailed)
    );

    let e1 = blobs
        .write(owner, 1, "{\"feeds\":[1]}", &Precondition::Any)
        .await
        .expect("unconditional write");
    let stored = blobs.read(owner).await.expect("read back");
    assert_eq!(stored.content, "{\"feeds\":[1]}");
    assert_eq!(stored.content_hash, 1);
    assert_eq!(stored.etag, e1);

    assert_eq!(
        blobs
            .write(owner, 9, "blind overwrite", &Precondition::NoPrecondition)
            .await,
        Err(SyncError::PreconditionFailed)
    );

    let e2 = blobs
        .write(owner, 2, "{\"feeds\":[1,2]}", &Precondition::IfMatch(e1.clone()))
        .await
        .expect("matching write");
    assert_ne!(e2, e1);

    assert_eq!(
        blobs
            .write(owner, 3, "stale", &Precondition::IfMatch(e1.clone()))
            .await,
        Err(SyncError::PreconditionFailed)
    );

    let e3 = blobs
        .write(owner, 3, "{\"feeds\":[3]}", &Precondition::IfMatchAny)
        .await
        .expect("wildcard write");
    assert_ne!(e3, e2);

    let strong = Etag::parse(e3.as_str().trim_start_matches("W/")).expect("strong form");
    let e4 = blobs
        .write(owner, 4, "{\"feeds\":[4]}", &Precondition::IfMatch(strong))
        .await
        .expect("weak comparison ignores W/");

    assert_eq!(
        blobs
            .read_if_none_match(owner, &IfNoneMatch::Etag(e4.clone()))
            .await,
        Ok(ConditionalRead::NotModified)
    );
    let stale_cache = blobs
        .read_if_none_match(owner, &IfNoneMatch::Etag(e3))
        .await
        .expect("revalidate");
    assert!(matches!(stale_cache, ConditionalRead::Modified(blob) if blob.etag == e4));
    let wildcard = blobs
        .read_if_none_match(owner, &IfNoneMatch::Any)
        .await
        .expect("wildcard revalidate");
    assert!(matches!(wildcard, ConditionalRead::Modified(_)));
}

pub async fn first_writes_need_no_current_tag(store: &Store) {
    for precondition in [
        Precondition::NoPrecondition,
        Precondition::IfMatch(Etag::parse("\"never-stored\"").expect("valid tag")),
    ] {
        let (user, _) = store
            .identity
            .register_chain("laptop")
            .await
            .expect("register chain");

        let etag = store
            .feed_blobs
            .write(user.db_id, 5, "first", &precondition)
            .await
            .expect("first write creates the blob");
        assert_eq!(
            store.feed_blobs.read(user.db_id).await.map(|blob| blob.etag),
            Ok(etag)
        );
    }
}

pub async fn concurrent_writers_have_one_winner(store: &Store) {
    let (user, _) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    let owner = user.db_id;
    let base = store
        .feed_blobs
        .write(owner, 1, "base", &Precondition::Any)
        .await
        .expect("base write");

    let left = Precondition::IfMatch(base.clone());
    let right = Precondition::IfMatch(base);
    let (a, b) = tokio::join!(
        store.feed_blobs.write(owner, 2, "left", &left),
        store.feed_blobs.write(owner, 3, "right", &right),
    );

    let winners = [&a, &b].iter().filter(|result| result.is_ok()).count();
    assert_eq!(winners, 1, "left: {a:?}, right: {b:?}");
    let loser = if a.is_ok() { b } else { a };
    assert_eq!(loser, Err(SyncError::PreconditionFailed));
}

pub async fn read_marks_track_updates(store: &Store) {
    let (user, _) = store
        .identity
        .register_chain("laptop")
        .await
        .expect("register chain");
    let (other, _) = store
        .identity
        .register_chain("desktop")
        .await
        .expect("register chain");
    let before = Utc::now() - TimeDelta::minutes(1);
    let marks = &store.read_marks;

    assert_eq!(
        marks.add_read_mark(user.db_id, "article-1").await,
        Ok(ReadMarkInsert::Inserted)
    );
    assert_eq!(
        marks.add_read_mark(user.db_id, "article-1").await,
        Ok(ReadMarkInsert::AlreadyPresent)
    );
    assert_eq!(
        marks.add_read_mark(user.db_id, "article-2").await,
        Ok(ReadMarkInsert::Inserted)
    );
    assert_eq!(
        marks.add_read_mark(other.db_id, "article-1").await,
        Ok(ReadMarkInsert::Inserted)
    );
    let blank = marks
        .add_read_mark(user.db_id, "  ")
        .await
        .expect_err("blank identifier");
    assert_eq!(blank.code(), ErrorCode::InvalidArgument);

    let recent = marks
        .read_marks_since(&user.public_id, before)
        .await
        .expect("read marks");
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|mark| mark.owner == user.db_id));
    assert!(recent.windows(2).all(|pair| pair[0].read_time >= pair[1].read_time));

    let future = marks
        .read_marks_since(&user.public_id, Utc::now() + TimeDelta::minutes(1))
        .await
        .expect("read marks");
    assert!(future.is_empty());
}

pub async fn stores_answer_pings(store: &Store) {
    store.ping().await.expect("store answers");
}

/// Every check above, in sequence.
pub async fn full_contract(store: &Store) {
    registration_round_trips(store).await;
    unknown_chains_are_not_found(store).await;
    membership_changes_move_the_fingerprint(store).await;
    touching_a_device_advances_last_seen(store).await;
    last_seen_never_moves_backwards(store).await;
    unique_indexes_are_classified(store).await;
    registration_is_atomic(store).await;
    reconciliation_is_idempotent(store).await;
    feed_blob_writes_follow_preconditions(store).await;
    first_writes_need_no_current_tag(store).await;
    concurrent_writers_have_one_winner(store).await;
    read_marks_track_updates(store).await;
    stores_answer_pings(store).await;
}
