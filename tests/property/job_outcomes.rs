// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Job Outcomes and Purge Classification

use cdn_invalidator::cdn::is_success_status;
use cdn_invalidator::jobs::JobOutcome;
use cdn_invalidator::pipeline::InvalidationPipeline;
use proptest::prelude::*;

use crate::fixtures::*;

fn mode() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("tag"), Just("code"), Just("urls"), Just("bogus")]
}

fn paths() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("/content/[a-z]{1,4}(/[a-z]{1,4}){0,3}", 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A disabled consumer cancels every job
    #[test]
    fn prop_disabled_always_cancels(mode in mode(), paths in paths(), accepted in any::<bool>()) {
        let consumer = consumer_with(MockCdnService::answering(accepted), InvalidationPipeline::default());
        let mut config = consumer_config(mode, &["/content/([a-z]+).*=tag-$1"]);
        config.enabled = false;
        consumer.activate(&config).unwrap();

        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        let outcome = tokio_test::block_on(consumer.process(&job_fixture(&paths)));
        prop_assert_eq!(outcome, JobOutcome::Cancel);
    }

    /// An empty batch cancels in every mode
    #[test]
    fn prop_empty_batch_always_cancels(mode in mode(), accepted in any::<bool>()) {
        let cdn = MockCdnService::answering(accepted);
        let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
        consumer.activate(&consumer_config(mode, &["/content/([a-z]+).*=tag-$1"])).unwrap();

        let outcome = tokio_test::block_on(consumer.process(&job_fixture(&[])));
        prop_assert_eq!(outcome, JobOutcome::Cancel);
        prop_assert!(cdn.calls().is_empty());
    }

    /// Success is exactly the 2xx range
    #[test]
    fn prop_success_iff_2xx(status in any::<u16>()) {
        prop_assert_eq!(is_success_status(status), (200..300).contains(&status));
    }
}
