/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reminder_service::{
    common::types::*,
    coordinator::Clock,
    dispatch::{
        email::EmailTransport,
        push::{PushCapability, PushPayload, PushProvider},
        whatsapp::WhatsappTransport,
        ChannelError, DispatchGateway, RecipientConfig,
    },
    lifecycle::ReminderLifecycle,
    store::memory::InMemoryReminderStore,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct RecordingPushProvider {
    pub capability: PushCapability,
    pub shown: Mutex<Vec<PushPayload>>,
}

#[async_trait]
impl PushProvider for RecordingPushProvider {
    fn capability(&self) -> PushCapability {
        self.capability
    }

    async fn show(&self, payload: &PushPayload) -> Result<(), ChannelError> {
        self.shown.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

pub struct RecordingEmailTransport {
    pub fail: bool,
    pub attempts: Mutex<u32>,
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl EmailTransport for RecordingEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(ChannelError::TransportError(
                "recipient rejected".to_string(),
            ));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct RecordingWhatsappTransport {
    pub fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl WhatsappTransport for RecordingWhatsappTransport {
    async fn send(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::TransportError("connection reset".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryReminderStore>,
    pub lifecycle: Arc<ReminderLifecycle<InMemoryReminderStore>>,
    pub clock: Arc<ManualClock>,
    pub push: Arc<RecordingPushProvider>,
    pub email: Arc<RecordingEmailTransport>,
    pub whatsapp: Arc<RecordingWhatsappTransport>,
}

impl Harness {
    pub fn clock_handle(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

pub fn harness(
    push_capability: PushCapability,
    email_fails: bool,
    whatsapp_fails: bool,
    retire_on_attempt: bool,
) -> Harness {
    let store = Arc::new(InMemoryReminderStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let push = Arc::new(RecordingPushProvider {
        capability: push_capability,
        shown: Mutex::new(Vec::new()),
    });
    let email = Arc::new(RecordingEmailTransport {
        fail: email_fails,
        attempts: Mutex::new(0),
        sent: Mutex::new(Vec::new()),
    });
    let whatsapp = Arc::new(RecordingWhatsappTransport {
        fail: whatsapp_fails,
        sent: Mutex::new(Vec::new()),
    });

    let gateway = Arc::new(DispatchGateway::new(
        push.clone(),
        email.clone(),
        whatsapp.clone(),
        RecipientConfig {
            email: "owner@example.com".to_string(),
            whatsapp_number: "+911234567890".to_string(),
        },
        Duration::from_secs(2),
    ));
    let lifecycle = Arc::new(ReminderLifecycle::new(
        store.clone(),
        gateway,
        retire_on_attempt,
    ));

    Harness {
        store,
        lifecycle,
        clock,
        push,
        email,
        whatsapp,
    }
}

pub fn new_reminder(
    channels: Vec<Channel>,
    priority: Priority,
    date_time: DateTime<Utc>,
) -> NewReminder {
    NewReminder {
        user_id: UserId("owner".to_string()),
        title: "Loan installment due".to_string(),
        description: "Installment of 5000 INR due".to_string(),
        reminder_type: "Finance".to_string(),
        channels,
        priority,
        schedule: ReminderSchedule {
            date_time,
            repeat: Repeat::None,
        },
        document_id: Some(DocumentId("finance-record-1".to_string())),
    }
}

pub fn owner() -> UserId {
    UserId("owner".to_string())
}
