/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Deserialize, Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub log_to_file: bool,
}

const SERVICE_NAME: &str = "reminder-service";

/// Installs the global bunyan-formatted tracing subscriber. The returned
/// guard must be held for the lifetime of the process when file logging is
/// enabled, otherwise buffered log lines are lost on shutdown.
pub fn setup_tracing(logger_cfg: LoggerConfig) -> Option<WorkerGuard> {
    let level = match logger_cfg.level {
        LogLevel::TRACE => "trace",
        LogLevel::DEBUG => "debug",
        LogLevel::INFO => "info",
        LogLevel::WARN => "warn",
        LogLevel::ERROR => "error",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    LogTracer::init().expect("Failed to set LogTracer");

    if logger_cfg.log_to_file {
        let file_appender = tracing_appender::rolling::hourly("logs", SERVICE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let subscriber = Registry::default()
            .with(env_filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                SERVICE_NAME.to_string(),
                non_blocking,
            ));
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        Some(guard)
    } else {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                SERVICE_NAME.to_string(),
                std::io::stdout,
            ));
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        None
    }
}
