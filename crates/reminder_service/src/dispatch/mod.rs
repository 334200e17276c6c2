/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod email;
pub mod push;
pub mod whatsapp;

use crate::{
    common::types::{Channel, Reminder},
    dispatch::{
        email::EmailTransport,
        push::{PushCapability, PushPayload, PushProvider},
        whatsapp::WhatsappTransport,
    },
    tools::prometheus::DISPATCHED_CHANNELS,
};
use futures::future::join_all;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::*;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ChannelError {
    #[error("channel has no runtime capability")]
    Unsupported,
    #[error("notification permission not granted")]
    PermissionDenied,
    #[error("transport failure: {0}")]
    TransportError(String),
    #[error("channel dispatch timed out")]
    Timeout,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ChannelOutcome {
    Delivered,
    Failed(ChannelError),
}

/// Contact endpoints of the reminder owner. The host application is a
/// single-owner dashboard, so these come from deployment configuration
/// rather than per-reminder data.
#[derive(Debug, Deserialize, Clone)]
pub struct RecipientConfig {
    pub email: String,
    pub whatsapp_number: String,
}

/// Uniform best-effort delivery across the requested channels. Every channel
/// is attempted independently under a per-channel timeout; outcomes are
/// aggregated and returned to the caller, never raised.
pub struct DispatchGateway {
    push: Arc<dyn PushProvider>,
    email: Arc<dyn EmailTransport>,
    whatsapp: Arc<dyn WhatsappTransport>,
    recipient: RecipientConfig,
    channel_timeout: Duration,
}

impl DispatchGateway {
    pub fn new(
        push: Arc<dyn PushProvider>,
        email: Arc<dyn EmailTransport>,
        whatsapp: Arc<dyn WhatsappTransport>,
        recipient: RecipientConfig,
        channel_timeout: Duration,
    ) -> Self {
        DispatchGateway {
            push,
            email,
            whatsapp,
            recipient,
            channel_timeout,
        }
    }

    pub async fn dispatch(&self, reminder: &Reminder) -> FxHashMap<Channel, ChannelOutcome> {
        let mut requested: Vec<Channel> = Vec::new();
        for channel in &reminder.channels {
            if !requested.contains(channel) {
                requested.push(*channel);
            }
        }

        let attempts = requested.into_iter().map(|channel| async move {
            let outcome = match timeout(self.channel_timeout, self.attempt(channel, reminder)).await
            {
                Ok(Ok(())) => ChannelOutcome::Delivered,
                Ok(Err(err)) => ChannelOutcome::Failed(err),
                Err(_) => ChannelOutcome::Failed(ChannelError::Timeout),
            };
            (channel, outcome)
        });

        let outcomes: FxHashMap<Channel, ChannelOutcome> =
            join_all(attempts).await.into_iter().collect();

        for (channel, outcome) in &outcomes {
            let outcome_label = match outcome {
                ChannelOutcome::Delivered => "delivered",
                ChannelOutcome::Failed(_) => "failed",
            };
            DISPATCHED_CHANNELS
                .with_label_values(&[channel.to_string().as_str(), outcome_label])
                .inc();
            if let ChannelOutcome::Failed(err) = outcome {
                warn!(
                    "[Dispatch Failed] ReminderId-{} Channel-{} : {}",
                    reminder.id.inner(),
                    channel,
                    err
                );
            }
        }

        outcomes
    }

    async fn attempt(&self, channel: Channel, reminder: &Reminder) -> Result<(), ChannelError> {
        match channel {
            Channel::Push => match self.push.capability() {
                PushCapability::Granted => self.push.show(&PushPayload::build(reminder)).await,
                PushCapability::Denied => Err(ChannelError::PermissionDenied),
                PushCapability::Unsupported => Err(ChannelError::Unsupported),
            },
            Channel::Email => {
                let subject = format!("Reminder: {}", reminder.title);
                self.email
                    .send(&self.recipient.email, &subject, &reminder.description)
                    .await
            }
            Channel::Whatsapp => {
                let text = format!("{}\n{}", reminder.title, reminder.description);
                self.whatsapp
                    .send(&self.recipient.whatsapp_number, &text)
                    .await
            }
        }
    }
}
