/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    action::reminder::{
        cancel_reminder, create_reminder, delete_reminder, reschedule_reminder,
    },
    coordinator::ReminderCoordinator,
    environment::{AppConfig, AppState},
    tools::{logger::setup_tracing, prometheus::prometheus_metrics},
};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{anyhow, Result};
use std::{env::var, net::Ipv4Addr};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};
use tracing::*;

pub async fn run_server() -> Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall-configs/dev/reminder_service.dhall".to_string());
    let app_config = serde_dhall::from_file(dhall_config_path).parse::<AppConfig>()?;

    let _guard = setup_tracing(app_config.logger_cfg.clone());

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic Occured : {:?}", panic_info);
    }));

    let app_state = AppState::new(app_config).await;

    let (signal_tx, signal_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install signal handler");
        tokio::select! {
            _ = sigterm.recv() => {
                error!("SIGTERM received: shutting down");
                let _ = signal_tx.send(());
            },
            _ = sigint.recv() => {
                error!("SIGINT received: shutting down");
                let _ = signal_tx.send(());
            }
        }
    });

    let coordinator = ReminderCoordinator::new(
        app_state.store.clone(),
        app_state.lifecycle.clone(),
        app_state.clock.clone(),
        app_state.user_id.clone(),
        app_state.poll_interval,
    );
    let coordinator_handle = coordinator.spawn();

    let prometheus = prometheus_metrics();
    let http_server_port = app_state.http_server_port;
    let app_data = web::Data::new(app_state);
    let http_server = HttpServer::new(move || {
        App::new()
            .wrap(prometheus.clone())
            .app_data(app_data.clone())
            .route(
                "/health",
                web::get()
                    .to(|| Box::pin(async { HttpResponse::Ok().body("Reminder Service Is Up!") })),
            )
            .route("/reminder", web::post().to(create_reminder))
            .route("/reminder/{id}/cancel", web::post().to(cancel_reminder))
            .route(
                "/reminder/{id}/reschedule",
                web::post().to(reschedule_reminder),
            )
            .route("/reminder/{id}", web::delete().to(delete_reminder))
    })
    .bind((Ipv4Addr::UNSPECIFIED, http_server_port))?
    .shutdown_timeout(60)
    .run();

    tokio::select! {
        res = http_server => {
            error!("[HTTP_SERVER_ENDED] : {:?}", res);
            coordinator_handle.stop().await;
            Err(anyhow!("[HTTP_SERVER] : {:?}", res))
        }
        _ = signal_rx => {
            info!("[Graceful Shutting Down] => stopping coordinator");
            coordinator_handle.stop().await;
            Ok(())
        }
    }
}
