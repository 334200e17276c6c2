/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::ChannelError;
use crate::{common::types::ApiSuccess, tools::callapi::call_api};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Serialize;

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError>;
}

#[derive(Debug, Serialize)]
struct EmailMessageReq {
    to: String,
    subject: String,
    html: String,
}

/// Hands the rendered message off to an external JSON mail API.
pub struct HttpEmailTransport {
    api_url: Url,
    api_key: String,
}

impl HttpEmailTransport {
    pub fn new(api_url: Url, api_key: String) -> Self {
        HttpEmailTransport { api_url, api_key }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        let request_body = EmailMessageReq {
            to: to.to_owned(),
            subject: subject.to_owned(),
            html: body.to_owned(),
        };

        call_api::<ApiSuccess, EmailMessageReq>(
            Method::POST,
            &self.api_url,
            vec![
                ("content-type", "application/json"),
                ("api-key", self.api_key.as_str()),
            ],
            Some(request_body),
        )
        .await
        .map(|_| ())
        .map_err(|err| ChannelError::TransportError(err.to_string()))
    }
}
