/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

pub static MEASURE_DURATION: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("measure_duration_seconds", "Measure Duration").into(),
            &["function"]
        )
        .expect("Failed to register measure duration metrics")
    });

pub static DUE_REMINDERS: once_cell::sync::Lazy<IntCounter> = once_cell::sync::Lazy::new(|| {
    register_int_counter!("due_reminders", "Reminders Detected As Due")
        .expect("Failed to register due reminders metrics")
});

pub static RETIRED_REMINDERS: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("retired_reminders", "Reminders Retired After Dispatch")
            .expect("Failed to register retired reminders metrics")
    });

pub static DUPLICATE_CLAIMS: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!(
            "duplicate_reminder_claims",
            "Claims Dropped Because The Reminder Was Already In Flight"
        )
        .expect("Failed to register duplicate claims metrics")
    });

pub static DISPATCHED_CHANNELS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            opts!("dispatched_channels", "Per Channel Dispatch Outcomes"),
            &["channel", "outcome"]
        )
        .expect("Failed to register dispatched channels metrics")
    });

pub static DELIVERY_LAG: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!(
            "reminder_delivery_lag_seconds",
            "Seconds Between Scheduled Time And Dispatch Attempt"
        )
        .into(),
        &["priority"]
    )
    .expect("Failed to register delivery lag metrics")
});

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "Call external API requests").into(),
            &["method", "host", "service", "status"]
        )
        .expect("Failed to register call external API metrics")
    });

#[macro_export]
macro_rules! measure_latency_duration {
    ($function:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        MEASURE_DURATION
            .with_label_values(&[$function])
            .observe(duration);
    };
}

#[macro_export]
macro_rules! delivery_lag {
    ($priority:expr, $scheduled_at:expr, $now:expr) => {
        let lag = abs_diff_utc_as_sec($scheduled_at, $now);
        DELIVERY_LAG
            .with_label_values(&[$priority.to_string().as_str()])
            .observe(lag as f64);
    };
}

#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $path:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $path, $status])
            .observe(duration);
    };
}

/// Initializes and returns a `PrometheusMetrics` instance configured for the
/// application, exposing `/metrics` for scraping.
///
/// # Panics
///
/// * If there's a failure initializing metrics or registering metrics to the
///   Prometheus registry.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .buckets(&[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0,
            6.5, 7.0, 7.5, 8.0, 8.5, 9.0, 9.5, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0,
            90.0, 100.0, 200.0, 300.0, 400.0,
        ])
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(MEASURE_DURATION.to_owned()))
        .expect("Failed to register measure duration");

    prometheus
        .registry
        .register(Box::new(DUE_REMINDERS.to_owned()))
        .expect("Failed to register due reminders metrics");

    prometheus
        .registry
        .register(Box::new(RETIRED_REMINDERS.to_owned()))
        .expect("Failed to register retired reminders metrics");

    prometheus
        .registry
        .register(Box::new(DUPLICATE_CLAIMS.to_owned()))
        .expect("Failed to register duplicate claims metrics");

    prometheus
        .registry
        .register(Box::new(DISPATCHED_CHANNELS.to_owned()))
        .expect("Failed to register dispatched channels metrics");

    prometheus
        .registry
        .register(Box::new(DELIVERY_LAG.to_owned()))
        .expect("Failed to register delivery lag metrics");

    prometheus
        .registry
        .register(Box::new(CALL_EXTERNAL_API.to_owned()))
        .expect("Failed to register call external API metrics");

    prometheus
}
