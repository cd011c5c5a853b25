// Copyright (c) 2025 - Cowboy AI, Inc.
//! Job Consumer Integration Tests
//!
//! Drives complete jobs through the consumer against an in-memory purge
//! client and checks the terminal outcome plus what reached the CDN.

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdn_invalidator::cdn::PurgeKind;
use cdn_invalidator::jobs::{InvalidationJobConsumer, JobOutcome, JobRouter};
use cdn_invalidator::links::{
    DomainExternalizer, PathResolver, PrefixPathResolver, ResolverFactory,
};
use cdn_invalidator::pipeline::InvalidationPipeline;
use cdn_invalidator::InvalidatorResult;

const SITE_RULE: &str = "/content/site/(..)(/.*)*=tag-dev-$1";

#[tokio::test]
async fn test_tag_mode_purges_derived_tags() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    let outcome = consumer
        .process(&job_fixture(&["/content/site/ca/en/home.html"]))
        .await;

    assert_eq!(outcome, JobOutcome::Ok);
    assert_eq!(cdn.calls(), vec![(PurgeKind::Tag, path_set(&["tag-dev-ca"]))]);
}

#[tokio::test]
async fn test_code_mode_uses_code_purge() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer
        .activate(&consumer_config("code", &["/content/(site|dam)/.*=cp-$1"]))
        .unwrap();

    let outcome = consumer
        .process(&job_fixture(&["/content/site/en", "/content/dam/img.png", "/var/x"]))
        .await;

    assert_eq!(outcome, JobOutcome::Ok);
    assert_eq!(
        cdn.calls(),
        vec![(PurgeKind::Code, path_set(&["cp-dam", "cp-site"]))]
    );
}

#[tokio::test]
async fn test_rejected_purge_fails_job() {
    let cdn = MockCdnService::answering(false);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    let outcome = consumer.process(&job_fixture(&["/content/site/ca/en"])).await;
    assert_eq!(outcome, JobOutcome::Failed);
}

#[tokio::test]
async fn test_urls_mode_outcome_follows_purge_result() {
    for (accepted, expected) in [(true, JobOutcome::Ok), (false, JobOutcome::Failed)] {
        let cdn = MockCdnService::answering(accepted);
        let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
        consumer.activate(&consumer_config("urls", &[])).unwrap();

        let outcome = consumer.process(&job_fixture(&["/content/site/en/home"])).await;

        assert_eq!(outcome, expected);
        assert_eq!(
            cdn.calls(),
            vec![(
                PurgeKind::Url,
                path_set(&["https://www.example.com/en/home.html"])
            )]
        );
    }
}

#[tokio::test]
async fn test_urls_mode_skips_value_hooks() {
    let touched = Arc::new(AtomicBool::new(false));
    let before = touched.clone();
    let after = touched.clone();
    let pipeline = InvalidationPipeline::new()
        .with_before_invalidation(move |values| {
            before.store(true, Ordering::SeqCst);
            values
        })
        .with_after_invalidation(move |_, _| {
            after.store(true, Ordering::SeqCst);
            false
        });

    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn, pipeline);
    consumer.activate(&consumer_config("urls", &[])).unwrap();

    assert_eq!(
        consumer.process(&job_fixture(&["/content/site/en"])).await,
        JobOutcome::Ok
    );
    assert!(!touched.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_empty_url_batch_is_sent_and_fails() {
    let cdn = MockCdnService::answering(false);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    let mut config = consumer_config("urls", &[]);
    config.external_link_domain = "author".to_string();
    consumer.activate(&config).unwrap();

    let outcome = consumer.process(&job_fixture(&["/content/site/en"])).await;

    assert_eq!(outcome, JobOutcome::Failed);
    assert_eq!(cdn.calls(), vec![(PurgeKind::Url, path_set(&[]))]);
}

#[tokio::test]
async fn test_no_matching_rule_cancels_without_purge() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    let outcome = consumer.process(&job_fixture(&["/var/audit/x"])).await;

    assert_eq!(outcome, JobOutcome::Cancel);
    assert!(cdn.calls().is_empty());
}

#[tokio::test]
async fn test_empty_paths_cancel() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    assert_eq!(consumer.process(&job_fixture(&[])).await, JobOutcome::Cancel);
    assert!(cdn.calls().is_empty());
}

#[tokio::test]
async fn test_disabled_consumer_cancels_before_lookup() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    let mut config = consumer_config("tag", &[SITE_RULE]);
    config.enabled = false;
    consumer.activate(&config).unwrap();

    assert_eq!(
        consumer.process(&job_fixture(&["/content/site/ca/en"])).await,
        JobOutcome::Cancel
    );
    assert!(cdn.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_mode_fails_without_purge() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), InvalidationPipeline::default());
    consumer.activate(&consumer_config("everything", &[SITE_RULE])).unwrap();

    assert_eq!(
        consumer.process(&job_fixture(&["/content/site/ca/en"])).await,
        JobOutcome::Failed
    );
    assert!(cdn.calls().is_empty());
}

#[tokio::test]
async fn test_missing_cdn_service_fails() {
    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn, InvalidationPipeline::default());
    let mut config = consumer_config("tag", &[SITE_RULE]);
    config.cdn_configuration_id = "fastly".to_string();
    consumer.activate(&config).unwrap();

    assert_eq!(
        consumer.process(&job_fixture(&["/content/site/ca/en"])).await,
        JobOutcome::Failed
    );
}

#[tokio::test]
async fn test_hooks_shape_values_and_result() {
    let pipeline = InvalidationPipeline::new()
        .with_preprocess_values(|paths| {
            paths
                .into_iter()
                .filter(|p| !p.contains("/fr"))
                .collect()
        })
        .with_postprocess_values(|mut values| {
            values.insert("tag-global".to_string());
            values
        })
        .with_before_invalidation(|mut values| {
            values.remove("tag-dev-de");
            values
        })
        .with_after_invalidation(|result, _job| !result);

    let cdn = MockCdnService::answering(false);
    let consumer = consumer_with(cdn.clone(), pipeline);
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    let outcome = consumer
        .process(&job_fixture(&[
            "/content/site/ca/en",
            "/content/site/de/de",
            "/content/site/fr/fr",
        ]))
        .await;

    assert_eq!(outcome, JobOutcome::Ok);
    assert_eq!(
        cdn.calls(),
        vec![(PurgeKind::Tag, path_set(&["tag-dev-ca", "tag-global"]))]
    );
}

#[tokio::test]
async fn test_panicking_hook_fails_job() {
    let pipeline = InvalidationPipeline::new().with_postprocess_values(|_| panic!("hook bug"));

    let cdn = MockCdnService::answering(true);
    let consumer = consumer_with(cdn.clone(), pipeline);
    consumer.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    assert_eq!(
        consumer.process(&job_fixture(&["/content/site/ca/en"])).await,
        JobOutcome::Failed
    );
    assert!(cdn.calls().is_empty());
}

/// Resolver that takes `delay` per path, like a repository under load
struct SlowResolverFactory {
    delay: Duration,
}

struct SlowResolver {
    delay: Duration,
    inner: PrefixPathResolver,
}

impl PathResolver for SlowResolver {
    fn map(&self, path: &str) -> InvalidatorResult<String> {
        std::thread::sleep(self.delay);
        self.inner.map(path)
    }
}

impl ResolverFactory for SlowResolverFactory {
    fn resolver(&self) -> InvalidatorResult<Box<dyn PathResolver>> {
        Ok(Box::new(SlowResolver {
            delay: self.delay,
            inner: PrefixPathResolver::new(vec![("/content/site".to_string(), String::new())]),
        }))
    }
}

#[tokio::test]
async fn test_slow_url_resolution_does_not_stall_runtime() {
    let cdn = MockCdnService::answering(true);
    let consumer = InvalidationJobConsumer::new(
        registry_with(cdn.clone()),
        Arc::new(SlowResolverFactory {
            delay: Duration::from_millis(300),
        }),
        Arc::new(DomainExternalizer::default().with_domain("publish", "www.example.com")),
    );
    consumer.activate(&consumer_config("urls", &[])).unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(10));
        loop {
            interval.tick().await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    tokio::task::yield_now().await;

    let before = ticks.load(Ordering::SeqCst);
    let outcome = consumer.process(&job_fixture(&["/content/site/en/home"])).await;
    let during = ticks.load(Ordering::SeqCst) - before;
    ticker.abort();

    assert_eq!(outcome, JobOutcome::Ok);
    assert_eq!(
        cdn.calls(),
        vec![(PurgeKind::Url, path_set(&["https://www.example.com/en/home.html"]))]
    );
    assert!(during >= 5, "runtime ticked only {} times during the job", during);
}

#[tokio::test]
async fn test_router_sends_each_topic_to_its_consumer() {
    let cdn = MockCdnService::answering(true);
    let assets = consumer_with(cdn.clone(), InvalidationPipeline::default());
    assets.activate(&consumer_config("tag", &[SITE_RULE])).unwrap();

    let pages = consumer_with(cdn.clone(), InvalidationPipeline::default());
    let mut pages_config = consumer_config("urls", &[]);
    pages_config.job_topics = vec!["custom/pages".to_string()];
    pages.activate(&pages_config).unwrap();

    let router = JobRouter::new(vec![Arc::new(assets), Arc::new(pages)]);

    let asset_job = job_fixture(&["/content/site/ca/en"]);
    let mut page_job = job_fixture(&["/content/site/en/home"]);
    page_job.topic = "custom/pages".to_string();
    let mut orphan_job = job_fixture(&["/content/site/en/home"]);
    orphan_job.topic = "unknown/topic".to_string();

    assert_eq!(router.process(&asset_job).await, JobOutcome::Ok);
    assert_eq!(router.process(&page_job).await, JobOutcome::Ok);
    assert_eq!(router.process(&orphan_job).await, JobOutcome::Cancel);
    assert_eq!(
        cdn.calls(),
        vec![
            (PurgeKind::Tag, path_set(&["tag-dev-ca"])),
            (PurgeKind::Url, path_set(&["https://www.example.com/en/home.html"])),
        ]
    );
}
