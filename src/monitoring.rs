//! On-demand monitoring snapshot served by `GET /api/monitoring`.
//!
//! Each call builds a brand new snapshot; nothing is cached between requests.
//! The metric and region lists always come out in the same order.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::metrics::round_to;

pub const GLOBAL_UPTIME: f64 = 99.97;

/// Lowest uptime a region can report after jitter.
pub const UPTIME_FLOOR: f64 = 99.9;

/// Metric names in the order they appear in every snapshot.
pub const METRIC_NAMES: [&str; 6] = [
    "Global CPU Usage",
    "Memory Utilization",
    "Network Throughput",
    "API Response Time",
    "Error Rate",
    "Database Connections",
];

/// A region's fixed profile: name, latency range (ms), base uptime, base instance count.
pub struct RegionProfile {
    pub name: &'static str,
    pub latency_min: u32,
    pub latency_max: u32,
    pub base_uptime: f64,
    pub base_instances: u32,
}

/// Regions in the order they appear in every snapshot.
pub const REGIONS: [RegionProfile; 5] = [
    RegionProfile { name: "US-East (Virginia)", latency_min: 10, latency_max: 20, base_uptime: 99.99, base_instances: 1247 },
    RegionProfile { name: "US-West (Oregon)", latency_min: 15, latency_max: 25, base_uptime: 99.98, base_instances: 892 },
    RegionProfile { name: "EU-West (Ireland)", latency_min: 20, latency_max: 30, base_uptime: 99.97, base_instances: 654 },
    RegionProfile { name: "APAC-Southeast (Singapore)", latency_min: 25, latency_max: 35, base_uptime: 99.96, base_instances: 423 },
    RegionProfile { name: "APAC-Northeast (Tokyo)", latency_min: 25, latency_max: 35, base_uptime: 99.95, base_instances: 389 },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub status: String,
    pub trend: String,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRecord {
    pub region: String,
    pub status: String,
    pub latency: u32,
    pub uptime: f64,
    pub active_instances: u32,
    pub incidents: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSnapshot {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<MetricRecord>,
    pub regions: Vec<RegionRecord>,
    pub auto_remediations: u32,
    pub global_uptime: f64,
}

fn metric(name: &str, value: f64, unit: &str, trend: &str, change: f64) -> MetricRecord {
    MetricRecord {
        name: name.to_string(),
        value,
        unit: unit.to_string(),
        status: "healthy".to_string(),
        trend: trend.to_string(),
        change,
    }
}

fn region<R: Rng>(rng: &mut R, profile: &RegionProfile) -> RegionRecord {
    let spread = profile.base_instances / 20;
    let uptime = round_to(profile.base_uptime - rng.gen_range(0.0..=0.02), 2);
    RegionRecord {
        region: profile.name.to_string(),
        status: "operational".to_string(),
        latency: rng.gen_range(profile.latency_min..profile.latency_max),
        uptime: uptime.max(UPTIME_FLOOR),
        active_instances: rng.gen_range(
            profile.base_instances - spread..=profile.base_instances + spread,
        ),
        incidents: 0,
    }
}

/// Build a snapshot stamped with the current time.
pub fn snapshot<R: Rng>(rng: &mut R) -> MonitoringSnapshot {
    snapshot_at(rng, Utc::now())
}

/// Build a snapshot with an explicit timestamp.
pub fn snapshot_at<R: Rng>(rng: &mut R, timestamp: DateTime<Utc>) -> MonitoringSnapshot {
    let metrics = vec![
        metric(
            METRIC_NAMES[0],
            round_to(rng.gen_range(30.0..60.0), 1),
            "%",
            "stable",
            round_to(rng.gen_range(-2.5..2.5), 1),
        ),
        metric(
            METRIC_NAMES[1],
            round_to(rng.gen_range(50.0..80.0), 1),
            "%",
            "stable",
            round_to(rng.gen_range(-1.5..1.5), 1),
        ),
        metric(
            METRIC_NAMES[2],
            round_to(rng.gen_range(10.0..20.0), 1),
            "Gbps",
            "up",
            round_to(rng.gen_range(0.0..2.0), 1),
        ),
        metric(
            METRIC_NAMES[3],
            f64::from(rng.gen_range(100u32..150)),
            "ms",
            "down",
            -round_to(rng.gen_range(0.0..10.0), 1),
        ),
        metric(
            METRIC_NAMES[4],
            round_to(rng.gen_range(0.0..0.1), 2),
            "%",
            "stable",
            0.0,
        ),
        metric(
            METRIC_NAMES[5],
            f64::from(rng.gen_range(1100u32..1300)),
            "active",
            "up",
            f64::from(rng.gen_range(0u32..30)),
        ),
    ];

    let regions = REGIONS.iter().map(|p| region(rng, p)).collect();

    MonitoringSnapshot {
        success: true,
        timestamp,
        metrics,
        regions,
        auto_remediations: rng.gen_range(100..150),
        global_uptime: GLOBAL_UPTIME,
    }
}
