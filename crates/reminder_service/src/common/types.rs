/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::tools::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

macro_rules! impl_inner {
    ($outer:ty, $inner:ty) => {
        impl $outer {
            pub fn inner(&self) -> $inner {
                self.0.to_owned()
            }
        }
    };
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReminderId(pub String);
impl_inner!(ReminderId, String);

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct UserId(pub String);
impl_inner!(UserId, String);

/// Back-reference to the domain record the reminder concerns (e.g. a finance
/// record). Carried into notification payloads, never dereferenced here.
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct DocumentId(pub String);
impl_inner!(DocumentId, String);

#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Push,
    Email,
    Whatsapp,
}

#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// High and Urgent reminders must persist until the user acts on them,
    /// so their push notifications are shown with `require_interaction`.
    pub fn requires_interaction(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Repeat {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::None
    }
}

#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Cancelled,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReminderSchedule {
    pub date_time: DateTime<Utc>,
    /// Declared for forward compatibility. Recurrence is not implemented:
    /// a reminder whose repeat is not `none` is stored as-is and is never
    /// auto-requeued after retirement.
    #[serde(default)]
    pub repeat: Repeat,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    /// Category tag ("Finance", "Task", ...). Informational only, never a
    /// dispatch channel.
    pub reminder_type: String,
    pub channels: Vec<Channel>,
    pub priority: Priority,
    pub schedule: ReminderSchedule,
    pub status: ReminderStatus,
    pub document_id: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation-time shape of a reminder, before the store has assigned an id
/// and bookkeeping timestamps.
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct NewReminder {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub reminder_type: String,
    pub channels: Vec<Channel>,
    pub priority: Priority,
    pub schedule: ReminderSchedule,
    pub document_id: Option<DocumentId>,
}

impl NewReminder {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.channels.is_empty() {
            return Err(AppError::Validation(
                "reminder must request at least one delivery channel".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct ApiSuccess {
    pub result: String,
}
