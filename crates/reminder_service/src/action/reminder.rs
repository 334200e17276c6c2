/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::types::*, environment::AppState, store::ReminderStore, tools::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::*;

/// Inbound surface for the domain write-paths (finance, tasks, ...) that
/// need a future notification.
#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub reminder_type: String,
    pub channels: Vec<Channel>,
    pub priority: Priority,
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub repeat: Repeat,
    pub document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleReminderRequest {
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub repeat: Repeat,
}

pub async fn create_reminder(
    app_state: web::Data<AppState>,
    request: web::Json<CreateReminderRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let new_reminder = NewReminder {
        user_id: UserId(request.user_id),
        title: request.title,
        description: request.description,
        reminder_type: request.reminder_type,
        channels: request.channels,
        priority: request.priority,
        schedule: ReminderSchedule {
            date_time: request.date_time,
            repeat: request.repeat,
        },
        document_id: request.document_id.map(DocumentId),
    };

    let reminder = app_state
        .store
        .create(new_reminder, app_state.clock.now())
        .await?;
    info!("[Reminder Created] : {:?}", reminder.id);

    Ok(HttpResponse::Ok().json(reminder))
}

pub async fn cancel_reminder(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let reminder_id = ReminderId(path.into_inner());
    app_state
        .lifecycle
        .cancel(&reminder_id, app_state.clock.now())
        .await?;
    info!("[Reminder Cancelled] : {:?}", reminder_id);

    Ok(HttpResponse::Ok().json(ApiSuccess {
        result: "cancelled".to_string(),
    }))
}

pub async fn reschedule_reminder(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<RescheduleReminderRequest>,
) -> Result<HttpResponse, AppError> {
    let reminder_id = ReminderId(path.into_inner());
    let request = request.into_inner();

    let reminder = app_state
        .store
        .reschedule(
            &reminder_id,
            ReminderSchedule {
                date_time: request.date_time,
                repeat: request.repeat,
            },
            app_state.clock.now(),
        )
        .await?;
    info!("[Reminder Rescheduled] : {:?}", reminder.id);

    Ok(HttpResponse::Ok().json(reminder))
}

pub async fn delete_reminder(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let reminder_id = ReminderId(path.into_inner());
    app_state.store.delete(&reminder_id).await?;
    info!("[Reminder Deleted] : {:?}", reminder_id);

    Ok(HttpResponse::NoContent().finish())
}
