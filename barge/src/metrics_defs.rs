//! Metrics definitions for barge endpoint resolution.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DISCOVERY_CACHE_HIT: MetricDef = MetricDef {
    name: "discovery_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of resolutions answered from the discovery cache",
};

pub const DISCOVERY_CACHE_MISS: MetricDef = MetricDef {
    name: "discovery_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that had to call discovery",
};

pub const DISCOVERY_DURATION: MetricDef = MetricDef {
    name: "discovery.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a discovery call in seconds. Tagged with outcome.",
};

pub const STATIC_ENDPOINT_HIT: MetricDef = MetricDef {
    name: "static_endpoint.hit",
    metric_type: MetricType::Counter,
    description: "Number of resolutions answered from static configuration",
};

pub const DISCOVERY_CACHE_SIZE: MetricDef = MetricDef {
    name: "discovery_cache.size",
    metric_type: MetricType::Gauge,
    description: "Entries held by the discovery cache after each sweep, expired or not",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DISCOVERY_CACHE_HIT,
    DISCOVERY_CACHE_MISS,
    DISCOVERY_CACHE_SIZE,
    DISCOVERY_DURATION,
    STATIC_ENDPOINT_HIT,
];
