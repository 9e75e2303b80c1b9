//! One-shot copy of a chain store into another store.
//!
//! The copy runs in dependency order: every user first, then every user's
//! devices, then feed blobs, then (optionally) read marks. Devices, blobs
//! and marks reference their owner by surrogate key, which differs between
//! stores, so each import re-resolves the owner by public id.

use futures_util::TryStreamExt;
use tracing::info;

use crate::domain::SyncError;
use crate::domain::ports::TransferRepository;

/// Knobs for a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOptions {
    /// Copy read marks as well. Off by default: read marks are cheap for
    /// clients to re-derive.
    pub transfer_read_marks: bool,
}

/// Rows copied by a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport {
    pub users: u64,
    pub devices: u64,
    pub feed_blobs: u64,
    pub read_marks: u64,
}

/// Copies everything from `source` into `destination`.
pub struct StoreTransfer<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    options: TransferOptions,
}

impl<'a, S, D> StoreTransfer<'a, S, D>
where
    S: TransferRepository + ?Sized,
    D: TransferRepository + ?Sized,
{
    /// Prepare a transfer. Destination migrations must already have run.
    pub const fn new(source: &'a S, destination: &'a D, options: TransferOptions) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Run every pass and report what was copied.
    ///
    /// The run is not resumable: on failure, fix the cause, reset the
    /// destination and start again.
    pub async fn run(&self) -> Result<TransferReport, SyncError> {
        let mut report = TransferReport::default();

        report.users = self.copy_users().await?;
        info!(users = report.users, "transferred users");

        report.devices = self.copy_devices().await?;
        info!(devices = report.devices, "transferred devices");

        report.feed_blobs = self.copy_feed_blobs().await?;
        info!(feed_blobs = report.feed_blobs, "transferred feed blobs");

        if self.options.transfer_read_marks {
            report.read_marks = self.copy_read_marks().await?;
            info!(read_marks = report.read_marks, "transferred read marks");
        } else {
            info!("skipping read marks");
        }

        Ok(report)
    }

    async fn copy_users(&self) -> Result<u64, SyncError> {
        let mut copied = 0;
        let mut users = self.source.export_users();
        while let Some(user) = users.try_next().await? {
            self.destination.import_user(&user).await?;
            copied += 1;
        }
        Ok(copied)
    }

    async fn copy_devices(&self) -> Result<u64, SyncError> {
        let mut copied = 0;
        let mut users = self.source.export_users();
        while let Some(user) = users.try_next().await? {
            let mut devices = self.source.export_devices_for_user(&user);
            while let Some(device) = devices.try_next().await? {
                self.destination
                    .import_device(&user.public_id, &device)
                    .await?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    async fn copy_feed_blobs(&self) -> Result<u64, SyncError> {
        let mut copied = 0;
        let mut users = self.source.export_users();
        while let Some(user) = users.try_next().await? {
            if let Some(blob) = self.source.export_feed_blob(&user).await? {
                self.destination
                    .import_feed_blob(&user.public_id, &blob)
                    .await?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    async fn copy_read_marks(&self) -> Result<u64, SyncError> {
        let mut copied = 0;
        let mut users = self.source.export_users();
        while let Some(user) = users.try_next().await? {
            let mut marks = self.source.export_read_marks(&user);
            while let Some(mark) = marks.try_next().await? {
                self.destination
                    .import_read_mark(&user.public_id, &mark)
                    .await?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}
