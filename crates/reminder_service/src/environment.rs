/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use crate::{
    common::types::UserId,
    coordinator::{Clock, SystemClock},
    dispatch::{
        email::HttpEmailTransport, push::LocalPushProvider, whatsapp::CloudApiWhatsappTransport,
        DispatchGateway, RecipientConfig,
    },
    lifecycle::ReminderLifecycle,
    store::memory::InMemoryReminderStore,
    tools::logger::LoggerConfig,
};
use reqwest::Url;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    pub permission_granted: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub recipient: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsappConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub phone_number_id: String,
    pub recipient: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http_server_port: u16,
    pub logger_cfg: LoggerConfig,
    pub user_id: String,
    pub poll_interval_seconds: u64,
    pub channel_timeout_seconds: u64,
    pub retire_on_attempt: bool,
    pub push_cfg: PushConfig,
    pub email_cfg: EmailConfig,
    pub whatsapp_cfg: WhatsappConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryReminderStore>,
    pub lifecycle: Arc<ReminderLifecycle<InMemoryReminderStore>>,
    pub push_provider: Arc<LocalPushProvider>,
    pub clock: Arc<dyn Clock>,
    pub user_id: UserId,
    pub poll_interval: Duration,
    pub http_server_port: u16,
}

impl AppState {
    pub async fn new(app_config: AppConfig) -> AppState {
        let store = Arc::new(InMemoryReminderStore::new());

        let push_provider = Arc::new(LocalPushProvider::new(
            app_config.push_cfg.permission_granted,
        ));
        let email_transport = Arc::new(HttpEmailTransport::new(
            Url::parse(app_config.email_cfg.api_url.as_str()).expect("Failed to parse api_url."),
            app_config.email_cfg.api_key,
        ));
        let whatsapp_transport = Arc::new(CloudApiWhatsappTransport::new(
            Url::parse(app_config.whatsapp_cfg.base_url.as_str())
                .expect("Failed to parse base_url."),
            app_config.whatsapp_cfg.bearer_token,
            app_config.whatsapp_cfg.phone_number_id,
        ));

        let gateway = Arc::new(DispatchGateway::new(
            push_provider.clone(),
            email_transport,
            whatsapp_transport,
            RecipientConfig {
                email: app_config.email_cfg.recipient,
                whatsapp_number: app_config.whatsapp_cfg.recipient,
            },
            Duration::from_secs(app_config.channel_timeout_seconds),
        ));

        let lifecycle = Arc::new(ReminderLifecycle::new(
            store.clone(),
            gateway,
            app_config.retire_on_attempt,
        ));

        AppState {
            store,
            lifecycle,
            push_provider,
            clock: Arc::new(SystemClock),
            user_id: UserId(app_config.user_id),
            poll_interval: Duration::from_secs(app_config.poll_interval_seconds),
            http_server_port: app_config.http_server_port,
        }
    }
}
