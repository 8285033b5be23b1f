//! Synthetic operational metrics pushed to dashboard clients.
//!
//! Every sample is drawn fresh from the supplied random source; nothing is
//! aggregated or retained between calls. Tests seed a `StdRng` to make the
//! output reproducible.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Insight reported when the 30% branch does not fire.
pub const DEFAULT_INSIGHT: &str = "System stable. No anomalies detected.";

/// Insights picked uniformly when the 30% branch fires.
pub const OTHER_INSIGHTS: &[&str] = &[
    "Traffic spike detected in US-East region. Auto-scaling triggered.",
    "Database latency optimizing. Query cache refreshed.",
    "Security scan complete. zero vulnerabilities found.",
    "New container deployment successful.",
    "Memory usage elevated in Pod-42. Garbage collection initiated.",
];

/// Probability that a sample carries a non-zero error rate.
pub const ERROR_RATE_PROBABILITY: f64 = 0.1;

/// Probability that a sample carries one of [`OTHER_INSIGHTS`].
pub const INSIGHT_PROBABILITY: f64 = 0.3;

/// One tick's worth of simulated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSample {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    /// Percent, `[20, 80)`.
    pub cpu_load: u32,
    /// Percent, `[30, 70)`.
    pub memory_usage: u32,
    /// `[1000, 6000)`.
    pub active_users: u32,
    /// Milliseconds, `[20, 120]`.
    pub response_time: u32,
    /// `0` or a two-decimal value in `[0, 5]`.
    pub error_rate: f64,
    pub insight: String,
}

/// Generate a sample stamped with the current time.
pub fn generate<R: Rng>(rng: &mut R) -> MetricsSample {
    generate_at(rng, Utc::now())
}

/// Generate a sample with an explicit timestamp.
pub fn generate_at<R: Rng>(rng: &mut R, timestamp: DateTime<Utc>) -> MetricsSample {
    let error_rate = if rng.gen_bool(ERROR_RATE_PROBABILITY) {
        round_to(rng.gen_range(0.0..=5.0), 2)
    } else {
        0.0
    };
    let response_time = rng.gen_range(20..=120);
    let insight = if rng.gen_bool(INSIGHT_PROBABILITY) {
        OTHER_INSIGHTS[rng.gen_range(0..OTHER_INSIGHTS.len())]
    } else {
        DEFAULT_INSIGHT
    };

    MetricsSample {
        timestamp,
        status: "UP".to_string(),
        cpu_load: rng.gen_range(20..80),
        memory_usage: rng.gen_range(30..70),
        active_users: rng.gen_range(1000..6000),
        response_time,
        error_rate,
        insight: insight.to_string(),
    }
}

/// Round `value` to `digits` fraction digits.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// True when `insight` is one of the six strings a sample can carry.
pub fn is_known_insight(insight: &str) -> bool {
    insight == DEFAULT_INSIGHT || OTHER_INSIGHTS.contains(&insight)
}
