/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::{Reminder, ReminderStatus};
use chrono::{DateTime, Utc};

/// Keeps exactly the candidates that are due: still `scheduled` and past
/// their trigger time. Both the interval poller and the realtime listener go
/// through this same filter, which is what lets the Lifecycle Controller
/// treat the two trigger paths identically.
pub fn select_due(candidates: Vec<Reminder>, now: DateTime<Utc>) -> Vec<Reminder> {
    candidates
        .into_iter()
        .filter(|reminder| {
            reminder.status == ReminderStatus::Scheduled && reminder.schedule.date_time <= now
        })
        .collect()
}
