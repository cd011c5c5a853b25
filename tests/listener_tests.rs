// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Source Integration Tests
//!
//! Both listeners feed a recording job manager; the queued jobs must carry
//! the filtered, collapsed paths on the configured topic.

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use cdn_invalidator::config::{ListenerConfig, ResourceChangeListenerConfig};
use cdn_invalidator::listeners::{
    ChangeType, JobOffloader, ReplicationAction, ReplicationActionType, ReplicationEventListener,
    ResourceChange, ResourceChangeListener,
};
use cdn_invalidator::MessageHandler;

fn listener_config(filter_regex: &str) -> ListenerConfig {
    ListenerConfig {
        enabled: true,
        root_paths: vec!["/content/site".to_string()],
        job_topic: JOB_TOPIC.to_string(),
        filter_regex: filter_regex.to_string(),
        subject: "repository.events".to_string(),
    }
}

fn resource_listener(jobs: Arc<RecordingJobManager>, filter_regex: &str) -> ResourceChangeListener {
    let listener = ResourceChangeListener::new(JobOffloader::new(jobs));
    listener
        .activate(&ResourceChangeListenerConfig {
            listener: listener_config(filter_regex),
            change_types: vec![ChangeType::Changed, ChangeType::Added],
        })
        .unwrap();
    listener
}

fn replication_listener(jobs: Arc<RecordingJobManager>) -> ReplicationEventListener {
    let listener = ReplicationEventListener::new(JobOffloader::new(jobs));
    listener.activate(&listener_config("")).unwrap();
    listener
}

fn activation(path: &str) -> ReplicationAction {
    ReplicationAction {
        action_type: ReplicationActionType::Activate,
        path: path.to_string(),
        user_id: Some("admin".to_string()),
        time: fixed_timestamp(),
    }
}

#[tokio::test]
async fn test_resource_changes_queue_one_job() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = resource_listener(jobs.clone(), "/content/site/.*");

    let queued = listener
        .on_change(&[
            ResourceChange::new("/content/site/en/home/jcr:content/par", ChangeType::Changed),
            ResourceChange::new("/content/site/en/home/jcr:content", ChangeType::Changed),
            ResourceChange::new("/content/site/fr/home", ChangeType::Added),
            ResourceChange::new("/content/site/de/home", ChangeType::Removed),
            ResourceChange::new("/content/elsewhere/page", ChangeType::Changed),
        ])
        .await;

    assert!(queued);
    let jobs = jobs.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].topic, JOB_TOPIC);
    assert_eq!(
        jobs[0].paths,
        path_set(&["/content/site/en/home", "/content/site/fr/home"])
    );
}

#[tokio::test]
async fn test_resource_changes_filtered_out_queue_nothing() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = resource_listener(jobs.clone(), "/content/site/en/.*");

    let queued = listener
        .on_change(&[ResourceChange::new("/content/site/fr/home", ChangeType::Changed)])
        .await;

    assert!(!queued);
    assert!(jobs.jobs().is_empty());
}

#[tokio::test]
async fn test_resource_changes_via_message_handler() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = resource_listener(jobs.clone(), "");
    assert_eq!(listener.subject(), "repository.events");

    let batch: Vec<ResourceChange> = serde_json::from_str(
        r#"[{"path":"/content/site/en","type":"CHANGED","external":true}]"#,
    )
    .unwrap();
    listener.handle(batch).await.unwrap();

    assert_eq!(jobs.jobs().len(), 1);
}

#[tokio::test]
async fn test_replication_under_root_is_queued() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = replication_listener(jobs.clone());

    assert!(listener.handle_event(&activation("/content/site/en/home")).await);
    assert_eq!(jobs.jobs()[0].paths, path_set(&["/content/site/en/home"]));
}

#[tokio::test]
async fn test_replication_outside_root_is_skipped() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = replication_listener(jobs.clone());

    assert!(!listener.handle_event(&activation("/content/dam/asset.png")).await);
    assert!(jobs.jobs().is_empty());
}

#[tokio::test]
async fn test_replication_disabled_is_ignored() {
    let jobs = Arc::new(RecordingJobManager::default());
    let listener = ReplicationEventListener::new(JobOffloader::new(jobs.clone()));
    listener
        .activate(&ListenerConfig {
            enabled: false,
            ..listener_config("")
        })
        .unwrap();

    assert!(!listener.handle_event(&activation("/content/site/en")).await);
    assert!(jobs.jobs().is_empty());
}

#[tokio::test]
async fn test_unavailable_job_manager_reports_false() {
    let jobs = Arc::new(RecordingJobManager::unavailable());
    let listener = replication_listener(jobs);

    assert!(!listener.process_path("/content/site/en").await);
}
