mod common;

use common::{base_config, toy_dataset, toy_network};
use proptest::prelude::*;
use spikecheck_engine::config::VerifyConfig;
use spikecheck_engine::pipeline::run_verification;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn robust_count_is_monotone_in_delta(a in 0u32..5, b in 0u32..5, seed in 0u64..1000) {
        let config = VerifyConfig {
            deltas: vec![a, b],
            num_samples: 4,
            num_steps: 3,
            seed,
            ..base_config()
        };
        let report = run_verification(&config, &toy_network(), &toy_dataset()).unwrap();
        let (lo, hi) = (a.min(b), a.max(b));
        let robust_lo = report.summary(lo).unwrap().robust;
        let robust_hi = report.summary(hi).unwrap().robust;
        prop_assert!(robust_hi <= robust_lo, "delta {lo}: {robust_lo}, delta {hi}: {robust_hi}");
    }
}
