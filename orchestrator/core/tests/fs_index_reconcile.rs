// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rebuilding a mount's index against a real `Local` driver, then draining
//! a dirty-delete entry and confirming it disappears from both the row
//! count and `SearchIndexService::search`.

mod common;

use cloudpaste_core::application::cache_bus::CacheBus;
use cloudpaste_core::application::job_engine::JobHandler;
use cloudpaste_core::application::job_handlers::{FsIndexApplyDirtyHandler, FsIndexRebuildHandler};
use cloudpaste_core::application::search_index::{SearchIndexService, SearchQuery, SearchScope};
use cloudpaste_core::domain::fs_index::{DirtyOp, FsIndexDirty, FsIndexStatus};
use cloudpaste_core::domain::job::{Task, TaskType, TriggerType};
use cloudpaste_core::domain::repository::FsIndexRepository;
use cloudpaste_core::infrastructure::repositories::InMemoryFsIndexRepository;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn rebuild_indexes_the_tree_then_apply_dirty_retires_a_deleted_entry() {
    let fixture = common::local_fixture("/m").await;
    std::fs::write(fixture.path("report.pdf"), b"pdf bytes").unwrap();
    std::fs::write(fixture.path("notes.txt"), b"notes").unwrap();
    std::fs::create_dir(fixture.path("sub")).unwrap();
    std::fs::write(fixture.path("sub/report-archive.pdf"), b"archived").unwrap();

    let fs_index = Arc::new(InMemoryFsIndexRepository::default());
    let rebuild = FsIndexRebuildHandler::new(fixture.mounts.clone(), fixture.mount_repo.clone(), fs_index.clone());
    let mut rebuild_task = Task::new(TaskType::FsIndexRebuild, json!({ "mountIds": [fixture.mount.id] }), "admin", TriggerType::Manual, None);
    rebuild.run(&mut rebuild_task, CancellationToken::new()).await.unwrap();

    // report.pdf, notes.txt, sub/ at the top level, plus sub/report-archive.pdf nested.
    assert_eq!(rebuild_task.stats.processed, 4);
    assert_eq!(fs_index.count_for_mount(&fixture.mount.id).await.unwrap(), 4);
    let state = fs_index.get_state(&fixture.mount.id).await.unwrap().unwrap();
    assert_eq!(state.status, FsIndexStatus::Ready);

    let cache = Arc::new(CacheBus::new());
    let search = SearchIndexService::new(fs_index.clone(), fixture.mount_repo.clone(), cache);
    let page = search
        .search(SearchQuery { query: "report".into(), scope: SearchScope::Global, mount_id: None, path_prefix: None, limit: 50, cursor: None })
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 2);
    let report_entry = page.entries.iter().find(|e| e.name == "report.pdf").expect("report.pdf indexed");
    let report_fs_path = report_entry.fs_path.clone();

    fs_index
        .enqueue_dirty(&FsIndexDirty { mount_id: fixture.mount.id.clone(), fs_path: report_fs_path.clone(), op: DirtyOp::Delete, created_at_ms: 0 })
        .await
        .unwrap();
    std::fs::remove_file(fixture.path("report.pdf")).unwrap();

    let apply_dirty = FsIndexApplyDirtyHandler::new(fixture.mounts.clone(), fixture.mount_repo.clone(), fs_index.clone());
    let mut dirty_task = Task::new(TaskType::FsIndexApplyDirty, json!({}), "admin", TriggerType::Manual, None);
    apply_dirty.run(&mut dirty_task, CancellationToken::new()).await.unwrap();

    assert_eq!(dirty_task.stats.processed, 1);
    assert_eq!(fs_index.count_dirty(&fixture.mount.id).await.unwrap(), 0);
    assert_eq!(fs_index.count_for_mount(&fixture.mount.id).await.unwrap(), 3);

    let search = SearchIndexService::new(fs_index.clone(), fixture.mount_repo.clone(), Arc::new(CacheBus::new()));
    let page = search
        .search(SearchQuery { query: "report".into(), scope: SearchScope::Global, mount_id: None, path_prefix: None, limit: 50, cursor: None })
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].name, "report-archive.pdf");
}
