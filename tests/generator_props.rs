//! Property tests: generated samples and snapshots stay inside their ranges
//! for any seed.

use chrono::Utc;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use smartops_core::metrics::{self, is_known_insight, DEFAULT_INSIGHT};
use smartops_core::monitoring::{self, METRIC_NAMES, REGIONS};
use smartops_core::responder::{respond, COST_REPLY, FALLBACK_REPLY};

proptest! {
    #[test]
    fn prop_sample_fields_in_range(seed in any::<u64>()) {
        let s = metrics::generate(&mut StdRng::seed_from_u64(seed));
        prop_assert!((20..80).contains(&s.cpu_load));
        prop_assert!((30..70).contains(&s.memory_usage));
        prop_assert!((1000..6000).contains(&s.active_users));
        prop_assert!((20..=120).contains(&s.response_time));
        prop_assert!(is_known_insight(&s.insight));
        prop_assert_eq!(s.status.as_str(), "UP");
    }

    #[test]
    fn prop_error_rate_zero_or_two_decimals(seed in any::<u64>()) {
        let s = metrics::generate(&mut StdRng::seed_from_u64(seed));
        prop_assert!((0.0..=5.0).contains(&s.error_rate));
        let scaled = s.error_rate * 100.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    #[test]
    fn prop_same_seed_same_sample(seed in any::<u64>()) {
        let ts = Utc::now();
        let a = metrics::generate_at(&mut StdRng::seed_from_u64(seed), ts);
        let b = metrics::generate_at(&mut StdRng::seed_from_u64(seed), ts);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_snapshot_shape_is_fixed(seed in any::<u64>()) {
        let snap = monitoring::snapshot(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(snap.metrics.len(), 6);
        prop_assert_eq!(snap.regions.len(), 5);
        for (m, name) in snap.metrics.iter().zip(METRIC_NAMES) {
            prop_assert_eq!(m.name.as_str(), name);
        }
        for (r, p) in snap.regions.iter().zip(REGIONS.iter()) {
            prop_assert_eq!(r.region.as_str(), p.name);
        }
        prop_assert!((100..150).contains(&snap.auto_remediations));
    }

    #[test]
    fn prop_respond_never_panics(query in ".*") {
        let reply = respond(&query);
        prop_assert!(!reply.is_empty());
    }

    #[test]
    fn prop_cost_keyword_always_wins(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
        let query = format!("{prefix} cost {suffix} health status");
        prop_assert_eq!(respond(&query), COST_REPLY);
    }

    #[test]
    fn prop_digits_only_fall_back(query in "[0-9 ]{0,30}") {
        prop_assert_eq!(respond(&query), FALLBACK_REPLY);
    }
}

#[test]
fn test_default_insight_dominates() {
    let mut rng = StdRng::seed_from_u64(11);
    let default = (0..2_000)
        .filter(|_| metrics::generate(&mut rng).insight == DEFAULT_INSIGHT)
        .count();
    // Expect ~70%.
    assert!((1_200..1_600).contains(&default), "default insights: {default}");
}
