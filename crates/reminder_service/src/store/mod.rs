/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod memory;

use crate::{common::types::*, tools::error::AppError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::*;

/// Result of a status write. Repeated writes with the same target status are
/// idempotent no-ops; the distinction lets the Lifecycle Controller count
/// actual `scheduled -> sent` transitions exactly once.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StatusWrite {
    Applied,
    AlreadyInStatus,
}

/// Change-feed of a user's `scheduled` reminders. Every mutation of the
/// underlying set pushes a full current snapshot.
pub struct ScheduledFeed {
    pub snapshots: UnboundedReceiver<Vec<Reminder>>,
    pub guard: SubscriptionGuard,
}

pub(crate) struct ScheduledSubscriber {
    pub user_id: UserId,
    pub snapshot_tx: UnboundedSender<Vec<Reminder>>,
}

pub(crate) type SubscriberRegistry = Arc<Mutex<FxHashMap<u64, ScheduledSubscriber>>>;

/// Handle releasing a `subscribe_scheduled` feed. Publication happens under
/// the same registry lock that `unsubscribe` takes, so once `unsubscribe`
/// returns no further snapshot is produced for this subscription.
pub struct SubscriptionGuard {
    subscription_id: u64,
    registry: SubscriberRegistry,
}

impl SubscriptionGuard {
    pub(crate) fn new(subscription_id: u64, registry: SubscriberRegistry) -> Self {
        SubscriptionGuard {
            subscription_id,
            registry,
        }
    }

    pub fn unsubscribe(self) {
        self.remove();
    }

    fn remove(&self) {
        match self.registry.lock() {
            Ok(mut subscribers) => {
                subscribers.remove(&self.subscription_id);
            }
            Err(err) => error!("Failed to lock subscriber registry : {}", err),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Persistence contract for the reminder collection. Modeled after a hosted
/// document store: equality/range filters plus a per-filter change feed.
#[async_trait]
pub trait ReminderStore: Send + Sync + 'static {
    /// Persists a new reminder with `scheduled` status and bookkeeping
    /// timestamps set to `now`. Rejects an empty channel set.
    async fn create(&self, new_reminder: NewReminder, now: DateTime<Utc>)
        -> Result<Reminder, AppError>;

    async fn get(&self, reminder_id: &ReminderId) -> Result<Option<Reminder>, AppError>;

    /// Sets `status` and `updated_at`. Safe to call concurrently for the same
    /// id with the same target status; conflicting targets resolve
    /// last-write-wins at this level.
    async fn update_status(
        &self,
        reminder_id: &ReminderId,
        status: ReminderStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, AppError>;

    /// Replaces the schedule and resets status to `scheduled`, reviving a
    /// `sent` or `cancelled` reminder. A reschedule expresses fresh user
    /// intent to be notified.
    async fn reschedule(
        &self,
        reminder_id: &ReminderId,
        schedule: ReminderSchedule,
        now: DateTime<Utc>,
    ) -> Result<Reminder, AppError>;

    /// Every reminder for `user_id` with `scheduled` status and
    /// `schedule.date_time <= now`. Unordered.
    async fn query_due_scheduled(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, AppError>;

    /// Subscribes to snapshots of the user's `scheduled` reminders. The
    /// current snapshot is delivered immediately, then one per mutation.
    async fn subscribe_scheduled(&self, user_id: &UserId) -> Result<ScheduledFeed, AppError>;

    /// Explicit user deletion. Out of lifecycle scope.
    async fn delete(&self, reminder_id: &ReminderId) -> Result<(), AppError>;
}
