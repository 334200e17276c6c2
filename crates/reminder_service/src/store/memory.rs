/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::{
    ScheduledFeed, ScheduledSubscriber, StatusWrite, SubscriberRegistry, SubscriptionGuard,
};
use crate::{common::types::*, store::ReminderStore, tools::error::AppError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::{mpsc, RwLock};
use tracing::*;

/// In-process reminder collection. Snapshot publication happens while the
/// write lock of the mutation is still held, so a subscriber never observes
/// snapshots out of order with the mutations that caused them.
pub struct InMemoryReminderStore {
    reminders: RwLock<FxHashMap<ReminderId, Reminder>>,
    subscribers: SubscriberRegistry,
    next_subscription_id: AtomicU64,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        InMemoryReminderStore {
            reminders: RwLock::new(FxHashMap::default()),
            subscribers: Arc::new(Mutex::new(FxHashMap::default())),
            next_subscription_id: AtomicU64::new(0),
        }
    }

    fn scheduled_snapshot(
        reminders: &FxHashMap<ReminderId, Reminder>,
        user_id: &UserId,
    ) -> Vec<Reminder> {
        reminders
            .values()
            .filter(|reminder| {
                reminder.user_id == *user_id && reminder.status == ReminderStatus::Scheduled
            })
            .cloned()
            .collect()
    }

    fn publish_scheduled(&self, reminders: &FxHashMap<ReminderId, Reminder>) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(err) => {
                error!("Failed to lock subscriber registry : {}", err);
                return;
            }
        };

        let mut closed: Vec<u64> = Vec::new();
        for (subscription_id, subscriber) in subscribers.iter() {
            let snapshot = Self::scheduled_snapshot(reminders, &subscriber.user_id);
            if subscriber.snapshot_tx.send(snapshot).is_err() {
                closed.push(*subscription_id);
            }
        }
        for subscription_id in closed {
            subscribers.remove(&subscription_id);
        }
    }
}

impl Default for InMemoryReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn create(
        &self,
        new_reminder: NewReminder,
        now: DateTime<Utc>,
    ) -> Result<Reminder, AppError> {
        new_reminder.validate()?;

        let reminder = Reminder {
            id: ReminderId(uuid::Uuid::new_v4().to_string()),
            user_id: new_reminder.user_id,
            title: new_reminder.title,
            description: new_reminder.description,
            reminder_type: new_reminder.reminder_type,
            channels: new_reminder.channels,
            priority: new_reminder.priority,
            schedule: new_reminder.schedule,
            status: ReminderStatus::Scheduled,
            document_id: new_reminder.document_id,
            created_at: now,
            updated_at: now,
        };

        let mut reminders = self.reminders.write().await;
        reminders.insert(reminder.id.clone(), reminder.clone());
        self.publish_scheduled(&reminders);

        Ok(reminder)
    }

    async fn get(&self, reminder_id: &ReminderId) -> Result<Option<Reminder>, AppError> {
        Ok(self.reminders.read().await.get(reminder_id).cloned())
    }

    async fn update_status(
        &self,
        reminder_id: &ReminderId,
        status: ReminderStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, AppError> {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(reminder_id)
            .ok_or_else(|| AppError::ReminderNotFound(reminder_id.inner()))?;

        if reminder.status == status {
            return Ok(StatusWrite::AlreadyInStatus);
        }

        reminder.status = status;
        reminder.updated_at = now;
        self.publish_scheduled(&reminders);

        Ok(StatusWrite::Applied)
    }

    async fn reschedule(
        &self,
        reminder_id: &ReminderId,
        schedule: ReminderSchedule,
        now: DateTime<Utc>,
    ) -> Result<Reminder, AppError> {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(reminder_id)
            .ok_or_else(|| AppError::ReminderNotFound(reminder_id.inner()))?;

        reminder.schedule = schedule;
        reminder.status = ReminderStatus::Scheduled;
        reminder.updated_at = now;
        let rescheduled = reminder.clone();
        self.publish_scheduled(&reminders);

        Ok(rescheduled)
    }

    async fn query_due_scheduled(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, AppError> {
        Ok(self
            .reminders
            .read()
            .await
            .values()
            .filter(|reminder| {
                reminder.user_id == *user_id
                    && reminder.status == ReminderStatus::Scheduled
                    && reminder.schedule.date_time <= now
            })
            .cloned()
            .collect())
    }

    async fn subscribe_scheduled(&self, user_id: &UserId) -> Result<ScheduledFeed, AppError> {
        let (snapshot_tx, snapshots) = mpsc::unbounded_channel();

        // Read lock held across registration so the initial snapshot and the
        // first mutation-driven snapshot cannot be reordered.
        let reminders = self.reminders.read().await;
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self
                .subscribers
                .lock()
                .map_err(|err| AppError::Store(format!("subscriber registry poisoned: {err}")))?;
            let _ = snapshot_tx.send(Self::scheduled_snapshot(&reminders, user_id));
            subscribers.insert(
                subscription_id,
                ScheduledSubscriber {
                    user_id: user_id.clone(),
                    snapshot_tx,
                },
            );
        }

        Ok(ScheduledFeed {
            snapshots,
            guard: SubscriptionGuard::new(subscription_id, self.subscribers.clone()),
        })
    }

    async fn delete(&self, reminder_id: &ReminderId) -> Result<(), AppError> {
        let mut reminders = self.reminders.write().await;
        reminders
            .remove(reminder_id)
            .ok_or_else(|| AppError::ReminderNotFound(reminder_id.inner()))?;
        self.publish_scheduled(&reminders);
        Ok(())
    }
}
