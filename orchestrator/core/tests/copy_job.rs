// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `CopyJobHandler` against two real `Local` mounts: a full cross-mount
//! copy run, and cancellation honoured before any item is touched.

mod common;

use cloudpaste_core::application::cache_bus::CacheBus;
use cloudpaste_core::application::job_handlers::CopyJobHandler;
use cloudpaste_core::application::job_engine::JobHandler;
use cloudpaste_core::domain::job::{Task, TaskStatus, TaskType, TriggerType};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn task(payload: serde_json::Value) -> Task {
    Task::new(TaskType::Copy, payload, "admin", TriggerType::Manual, None)
}

#[tokio::test]
async fn copies_every_item_across_two_mounts() {
    let fixture = common::local_fixture("/src").await;
    let (_dst_dir, dst_mount) = common::second_local_mount(&fixture, "/dst").await;

    for i in 0..5 {
        std::fs::write(fixture.path(&format!("file-{i}.txt")), format!("payload-{i}")).unwrap();
    }
    let _ = &dst_mount;

    let handler = CopyJobHandler::new(fixture.mounts.clone(), Arc::new(CacheBus::new()));
    let items: Vec<_> = (0..5)
        .map(|i| json!({ "sourcePath": format!("/src/file-{i}.txt"), "targetPath": format!("/dst/file-{i}.txt") }))
        .collect();
    let mut t = task(json!({ "items": items }));

    handler.run(&mut t, CancellationToken::new()).await.unwrap();

    assert_eq!(t.stats.processed, 5);
    assert_eq!(t.stats.failed, 0);
    assert_eq!(t.progress.current, 5);

    for i in 0..5 {
        let contents = std::fs::read_to_string(fixture.dir.path().join(format!("file-{i}.txt"))).unwrap();
        assert_eq!(contents, format!("payload-{i}"));
    }
}

#[tokio::test]
async fn a_cancellation_already_requested_stops_the_job_before_any_item_runs() {
    let fixture = common::local_fixture("/src").await;
    let (_dst_dir, _dst_mount) = common::second_local_mount(&fixture, "/dst").await;

    for i in 0..100 {
        std::fs::write(fixture.path(&format!("file-{i}.txt")), b"x").unwrap();
    }

    let handler = CopyJobHandler::new(fixture.mounts.clone(), Arc::new(CacheBus::new()));
    let items: Vec<_> = (0..100)
        .map(|i| json!({ "sourcePath": format!("/src/file-{i}.txt"), "targetPath": format!("/dst/file-{i}.txt") }))
        .collect();
    let mut t = task(json!({ "items": items }));

    let cancellation = CancellationToken::new();
    cancellation.cancel();
    handler.run(&mut t, cancellation).await.unwrap();

    assert_eq!(t.status, TaskStatus::Cancelled);
    assert_eq!(t.stats.processed, 0);
    assert_eq!(t.stats.failed, 0);
}
