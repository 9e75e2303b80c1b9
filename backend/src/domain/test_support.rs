//! Shared builders for domain unit tests.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;

use super::{
    ChainId, Device, DeviceDbId, DeviceId, Etag, FeedBlob, LegacyDeviceId, SyncCode, User,
    UserDbId,
};

pub(crate) fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
        .single()
        .expect("valid fixture timestamp")
}

struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

pub(crate) fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock {
        utc_now: fixture_timestamp(),
    })
}

pub(crate) fn sync_code(fill: char) -> SyncCode {
    SyncCode::parse(fill.to_string().repeat(64)).expect("valid sync code")
}

pub(crate) fn user(db_id: i64) -> User {
    User {
        db_id: UserDbId::new(db_id),
        public_id: ChainId::random(),
        sync_code: sync_code('u'),
    }
}

pub(crate) fn device(owner: &User, legacy: i64) -> Device {
    Device {
        db_id: DeviceDbId::new(legacy),
        public_id: DeviceId::random(),
        owner: owner.db_id,
        name: format!("device {legacy}"),
        legacy_id: LegacyDeviceId::new(legacy),
        last_seen: fixture_timestamp(),
    }
}

pub(crate) fn feed_blob(owner: &User, etag: &str) -> FeedBlob {
    FeedBlob {
        owner: owner.db_id,
        content_hash: 7,
        content: "[\"https://example.org/feed\"]".to_owned(),
        etag: Etag::parse(etag).expect("valid etag"),
    }
}
