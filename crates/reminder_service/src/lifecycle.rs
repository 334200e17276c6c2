/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::{types::*, utils::abs_diff_utc_as_sec},
    delivery_lag,
    dispatch::{ChannelOutcome, DispatchGateway},
    store::{ReminderStore, StatusWrite},
    tools::{
        error::AppError,
        prometheus::{DELIVERY_LAG, DUPLICATE_CLAIMS, RETIRED_REMINDERS},
    },
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::*;

/// A dispatch *attempt* retires a reminder, delivery success does not matter.
/// This bounds resource use: a permanently broken channel (e.g. revoked push
/// permission) must not keep a reminder eligible forever, at the price of a
/// possibly missed notification.
pub const DEFAULT_RETIRE_ON_ATTEMPT: bool = true;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProcessOutcome {
    /// Dispatch attempted and the reminder transitioned to `sent`.
    Retired {
        outcomes: FxHashMap<Channel, ChannelOutcome>,
    },
    /// Dispatch attempted but every channel failed and the retire-on-attempt
    /// policy is off; the reminder stays `scheduled` for the next cycle.
    LeftScheduled {
        outcomes: FxHashMap<Channel, ChannelOutcome>,
    },
    /// The reminder left `scheduled` (or was deleted) between detection and
    /// claim; the other trigger path got there first.
    AlreadyRetired,
    /// A claim for this reminder is currently being processed in this
    /// process; the duplicate trigger is dropped.
    InFlight,
}

/// Owns the `scheduled -> sent` and `scheduled -> cancelled` transitions and
/// guarantees at most one dispatch sequence per reminder at a time within
/// this process.
pub struct ReminderLifecycle<S: ReminderStore> {
    store: Arc<S>,
    gateway: Arc<DispatchGateway>,
    in_flight: DashMap<ReminderId, ()>,
    retire_on_attempt: bool,
}

struct InFlightClaim<'a> {
    in_flight: &'a DashMap<ReminderId, ()>,
    reminder_id: ReminderId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.reminder_id);
    }
}

impl<S: ReminderStore> ReminderLifecycle<S> {
    pub fn new(store: Arc<S>, gateway: Arc<DispatchGateway>, retire_on_attempt: bool) -> Self {
        ReminderLifecycle {
            store,
            gateway,
            in_flight: DashMap::new(),
            retire_on_attempt,
        }
    }

    /// Claims, dispatches and retires one due candidate.
    ///
    /// Both trigger paths can present the same candidate in overlapping
    /// windows. The in-flight claim and the re-validation below close most of
    /// that window; the idempotent status write closes double *retirement*
    /// entirely. A true back-to-back race can still dispatch twice - accepted
    /// at-least-once behavior without a transactional claim primitive.
    pub async fn process_due(
        &self,
        candidate: &Reminder,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, AppError> {
        if self.in_flight.insert(candidate.id.clone(), ()).is_some() {
            DUPLICATE_CLAIMS.inc();
            return Ok(ProcessOutcome::InFlight);
        }
        let _claim = InFlightClaim {
            in_flight: &self.in_flight,
            reminder_id: candidate.id.clone(),
        };

        // Re-validate: the other trigger path may have retired the candidate
        // between detection and this claim.
        let current = match self.store.get(&candidate.id).await? {
            Some(current) if current.status == ReminderStatus::Scheduled => current,
            _ => return Ok(ProcessOutcome::AlreadyRetired),
        };

        let outcomes = self.gateway.dispatch(&current).await;
        info!(
            "[Dispatch Attempted] ReminderId-{} => {:?}",
            current.id.inner(),
            outcomes
        );

        let delivered_any = outcomes
            .values()
            .any(|outcome| *outcome == ChannelOutcome::Delivered);
        if !self.retire_on_attempt && !delivered_any {
            warn!(
                "[Left Scheduled] ReminderId-{} : all channels failed",
                current.id.inner()
            );
            return Ok(ProcessOutcome::LeftScheduled { outcomes });
        }

        // A store failure here propagates: the reminder stays `scheduled`
        // and the next detection cycle retries it.
        match self
            .store
            .update_status(&current.id, ReminderStatus::Sent, now)
            .await?
        {
            StatusWrite::Applied => {
                RETIRED_REMINDERS.inc();
                delivery_lag!(current.priority, current.schedule.date_time, now);
            }
            StatusWrite::AlreadyInStatus => {}
        }

        Ok(ProcessOutcome::Retired { outcomes })
    }

    /// User-initiated cancellation. Only a `scheduled` reminder can be
    /// cancelled; terminal states are left untouched.
    pub async fn cancel(
        &self,
        reminder_id: &ReminderId,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        match self.store.get(reminder_id).await? {
            Some(current) if current.status == ReminderStatus::Scheduled => {
                self.store
                    .update_status(reminder_id, ReminderStatus::Cancelled, now)
                    .await?;
                Ok(())
            }
            Some(current) => Err(AppError::Validation(format!(
                "cannot cancel reminder in {} status",
                current.status
            ))),
            None => Err(AppError::ReminderNotFound(reminder_id.inner())),
        }
    }
}

