// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Content-addressed search index records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsIndexEntry {
    pub mount_id: String,
    pub fs_path: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified_ms: i64,
    pub mimetype: Option<String>,
    /// Tags entries written by a given rebuild run so a subsequent rebuild
    /// can delete stale rows (`index_run_id != run_id OR NULL`).
    pub index_run_id: String,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsIndexStatus {
    NotReady,
    Indexing,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsIndexState {
    pub mount_id: String,
    pub status: FsIndexStatus,
    pub last_indexed_ms: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyOp {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsIndexDirty {
    pub mount_id: String,
    pub fs_path: String,
    pub op: DirtyOp,
    pub created_at_ms: i64,
}

impl FsIndexDirty {
    pub fn dedupe_key(mount_id: &str, fs_path: &str) -> String {
        format!("{mount_id}:{fs_path}")
    }
}

/// The admin-UI recommendation logic. Not executed
/// automatically; surfaced through the admin status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRecommendation {
    Rebuild,
    ApplyDirty,
    Wait,
    None,
}

pub fn recommend(state: &FsIndexState, dirty_count: u64) -> IndexRecommendation {
    if dirty_count >= 5000 {
        return IndexRecommendation::Rebuild;
    }
    if state.status == FsIndexStatus::Indexing {
        return IndexRecommendation::Wait;
    }
    if state.status != FsIndexStatus::Ready {
        return IndexRecommendation::Rebuild;
    }
    if dirty_count > 0 {
        return IndexRecommendation::ApplyDirty;
    }
    IndexRecommendation::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommends_rebuild_over_apply_dirty_at_high_volume() {
        let state = FsIndexState {
            mount_id: "m1".into(),
            status: FsIndexStatus::Ready,
            last_indexed_ms: Some(0),
            last_error: None,
        };
        assert_eq!(recommend(&state, 5000), IndexRecommendation::Rebuild);
        assert_eq!(recommend(&state, 10), IndexRecommendation::ApplyDirty);
        assert_eq!(recommend(&state, 0), IndexRecommendation::None);
    }

    #[test]
    fn recommends_wait_while_indexing() {
        let state = FsIndexState {
            mount_id: "m1".into(),
            status: FsIndexStatus::Indexing,
            last_indexed_ms: None,
            last_error: None,
        };
        assert_eq!(recommend(&state, 0), IndexRecommendation::Wait);
    }
}
