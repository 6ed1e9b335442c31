//! Metrics definitions for the harbor gateway.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "harbor.requests",
    metric_type: MetricType::Counter,
    description: "Number of gateway requests. Tagged with endpoint and status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "harbor.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to answer a gateway request in seconds. Tagged with endpoint.",
};

pub const LOG_FETCHES: MetricDef = MetricDef {
    name: "harbor.log_fetch",
    metric_type: MetricType::Counter,
    description: "Number of per-container log fetches. Tagged with source and outcome.",
};

pub const LOG_FETCH_DURATION: MetricDef = MetricDef {
    name: "harbor.log_fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch the logs of one container in seconds. Tagged with source.",
};

pub const LOG_FANOUT_SIZE: MetricDef = MetricDef {
    name: "harbor.log_fanout.size",
    metric_type: MetricType::Histogram,
    description: "Number of containers fetched concurrently for one request",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    LOG_FETCHES,
    LOG_FETCH_DURATION,
    LOG_FANOUT_SIZE,
];
