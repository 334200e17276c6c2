/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::ChannelError;
use crate::common::types::Reminder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

/// Local/browser-style notification payload. `tag` is the reminder id so the
/// notification UI can dedup repeated shows of the same reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
    pub data: Option<serde_json::Value>,
}

impl PushPayload {
    pub fn build(reminder: &Reminder) -> Self {
        PushPayload {
            title: reminder.title.to_owned(),
            body: reminder.description.to_owned(),
            tag: reminder.id.inner(),
            require_interaction: reminder.priority.requires_interaction(),
            data: reminder.document_id.as_ref().map(|document_id| {
                json!({
                    "document_id": document_id.inner(),
                    "reminder_type": reminder.reminder_type,
                })
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PushCapability {
    Granted,
    Denied,
    Unsupported,
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    fn capability(&self) -> PushCapability;
    async fn show(&self, payload: &PushPayload) -> Result<(), ChannelError>;
}

/// Fans push payloads out to in-process subscribers (the browser/UI bridge
/// attaches here). With no subscriber attached the runtime has no
/// notification capability at all.
pub struct LocalPushProvider {
    permission_granted: bool,
    payload_tx: broadcast::Sender<PushPayload>,
}

impl LocalPushProvider {
    pub fn new(permission_granted: bool) -> Self {
        let (payload_tx, _) = broadcast::channel(256);
        LocalPushProvider {
            permission_granted,
            payload_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushPayload> {
        self.payload_tx.subscribe()
    }
}

#[async_trait]
impl PushProvider for LocalPushProvider {
    fn capability(&self) -> PushCapability {
        if self.payload_tx.receiver_count() == 0 {
            PushCapability::Unsupported
        } else if !self.permission_granted {
            PushCapability::Denied
        } else {
            PushCapability::Granted
        }
    }

    async fn show(&self, payload: &PushPayload) -> Result<(), ChannelError> {
        self.payload_tx
            .send(payload.to_owned())
            .map(|_| ())
            .map_err(|_| ChannelError::Unsupported)
    }
}
