/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::types::*,
    detector::select_due,
    lifecycle::ReminderLifecycle,
    measure_latency_duration,
    store::{ReminderStore, ScheduledFeed},
    tools::prometheus::{DUE_REMINDERS, MEASURE_DURATION},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::*;

/// Time source for due detection. Injected so tests drive "now" directly
/// instead of sleeping against the wall clock.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Runs the two due-detection triggers - a fixed-interval poll and the
/// store change feed - against one Lifecycle Controller. The triggers are
/// unordered relative to each other; dedup of overlapping detections is the
/// controller's job.
pub struct ReminderCoordinator<S: ReminderStore> {
    store: Arc<S>,
    lifecycle: Arc<ReminderLifecycle<S>>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    poll_interval: Duration,
}

pub struct CoordinatorHandle {
    shutdown_tx: watch::Sender<bool>,
    poller_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Signals both looper tasks and waits for them to finish. No tick is
    /// started and no snapshot is processed after this returns; the
    /// realtime subscription is released on listener exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.poller_task.await {
            error!("[POLLER_TASK] : {:?}", err);
        }
        if let Err(err) = self.listener_task.await {
            error!("[LISTENER_TASK] : {:?}", err);
        }
    }
}

impl<S: ReminderStore> ReminderCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        lifecycle: Arc<ReminderLifecycle<S>>,
        clock: Arc<dyn Clock>,
        user_id: UserId,
        poll_interval: Duration,
    ) -> Self {
        ReminderCoordinator {
            store,
            lifecycle,
            clock,
            user_id,
            poll_interval,
        }
    }

    pub fn spawn(self) -> CoordinatorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller_task = tokio::spawn(poll_looper(
            self.store.clone(),
            self.lifecycle.clone(),
            self.clock.clone(),
            self.user_id.clone(),
            self.poll_interval,
            shutdown_rx.clone(),
        ));

        let listener_task = tokio::spawn(realtime_looper(
            self.store,
            self.lifecycle,
            self.clock,
            self.user_id,
            shutdown_rx,
        ));

        CoordinatorHandle {
            shutdown_tx,
            poller_task,
            listener_task,
        }
    }
}

/// One poll trigger: query the store for due scheduled reminders and feed
/// them through the detector to the controller. Query failures are logged
/// and left for the next tick.
pub async fn run_poll_tick<S: ReminderStore>(
    store: &Arc<S>,
    lifecycle: &Arc<ReminderLifecycle<S>>,
    clock: &Arc<dyn Clock>,
    user_id: &UserId,
) {
    let start_time = std::time::Instant::now();
    let now = clock.now();
    match store.query_due_scheduled(user_id, now).await {
        Ok(candidates) => {
            let due = select_due(candidates, now);
            if !due.is_empty() {
                DUE_REMINDERS.inc_by(due.len() as u64);
                debug!("[Poll Tick] {} due reminder(s)", due.len());
            }
            process_batch(lifecycle, due, now).await;
        }
        Err(err) => {
            error!("Error in query_due_scheduled : {}", err);
        }
    }
    measure_latency_duration!("run_poll_tick", start_time);
}

/// Per-reminder processing within one trigger invocation is independent: a
/// failure is logged against that reminder and never aborts its siblings.
async fn process_batch<S: ReminderStore>(
    lifecycle: &Arc<ReminderLifecycle<S>>,
    due: Vec<Reminder>,
    now: DateTime<Utc>,
) {
    let tasks = due.iter().map(|reminder| async move {
        match lifecycle.process_due(reminder, now).await {
            Ok(outcome) => {
                debug!(
                    "[Processed] ReminderId-{} => {:?}",
                    reminder.id.inner(),
                    outcome
                );
            }
            Err(err) => {
                error!(
                    "Error processing ReminderId-{} : {}",
                    reminder.id.inner(),
                    err
                );
            }
        }
    });
    join_all(tasks).await;
}

async fn poll_looper<S: ReminderStore>(
    store: Arc<S>,
    lifecycle: Arc<ReminderLifecycle<S>>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => {
                info!("[Poller Shutting Down]");
                break;
            }
        }
        run_poll_tick(&store, &lifecycle, &clock, &user_id).await;
    }
}

async fn realtime_looper<S: ReminderStore>(
    store: Arc<S>,
    lifecycle: Arc<ReminderLifecycle<S>>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let ScheduledFeed {
        mut snapshots,
        guard,
    } = match store.subscribe_scheduled(&user_id).await {
        Ok(feed) => feed,
        Err(err) => {
            error!("Error in subscribe_scheduled : {}", err);
            return;
        }
    };

    loop {
        let snapshot = tokio::select! {
            maybe_snapshot = snapshots.recv() => match maybe_snapshot {
                Some(snapshot) => snapshot,
                None => {
                    error!("Error: scheduled feed closed");
                    break;
                }
            },
            _ = shutdown_rx.changed() => {
                info!("[Listener Shutting Down]");
                break;
            }
        };

        let now = clock.now();
        let due = select_due(snapshot, now);
        if !due.is_empty() {
            DUE_REMINDERS.inc_by(due.len() as u64);
            debug!("[Snapshot] {} due reminder(s)", due.len());
        }
        process_batch(&lifecycle, due, now).await;
    }

    guard.unsubscribe();
}
