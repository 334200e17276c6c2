/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use super::ChannelError;
use crate::tools::callapi::call_api;
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait WhatsappTransport: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<(), ChannelError>;
}

#[derive(Debug, Serialize)]
struct WhatsappTextReq {
    messaging_product: &'static str,
    to: String,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: WhatsappTextBody,
}

#[derive(Debug, Serialize)]
struct WhatsappTextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
pub struct WhatsappMessageResp {
    pub messages: Vec<WhatsappMessageId>,
}

#[derive(Debug, Deserialize)]
pub struct WhatsappMessageId {
    pub id: String,
}

/// Posts message text to the Business Cloud API, authenticated with a bearer
/// credential and bound to a verified sender number.
pub struct CloudApiWhatsappTransport {
    base_url: Url,
    bearer_token: String,
    phone_number_id: String,
}

impl CloudApiWhatsappTransport {
    pub fn new(base_url: Url, bearer_token: String, phone_number_id: String) -> Self {
        CloudApiWhatsappTransport {
            base_url,
            bearer_token,
            phone_number_id,
        }
    }
}

#[async_trait]
impl WhatsappTransport for CloudApiWhatsappTransport {
    async fn send(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("Invalid base URL")
            .push(&self.phone_number_id)
            .push("messages");

        let authorization = format!("Bearer {}", self.bearer_token);
        let request_body = WhatsappTextReq {
            messaging_product: "whatsapp",
            to: to.to_owned(),
            message_type: "text",
            text: WhatsappTextBody {
                body: text.to_owned(),
            },
        };

        call_api::<WhatsappMessageResp, WhatsappTextReq>(
            Method::POST,
            &url,
            vec![
                ("content-type", "application/json"),
                ("authorization", authorization.as_str()),
            ],
            Some(request_body),
        )
        .await
        .map(|_| ())
        .map_err(|err| ChannelError::TransportError(err.to_string()))
    }
}
