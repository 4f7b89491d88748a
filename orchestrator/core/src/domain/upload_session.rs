// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `UploadSession`/`UploadPart` — the multipart orchestrator's persisted
//! state.

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::storage_config::StorageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    PerPartUrl,
    SingleSession,
}

/// For `per_part_url` drivers: how the set of uploaded parts is
/// reconstructed when the gateway never saw the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartVerificationPolicy {
    /// Ask the back-end (e.g. S3 `ListParts`) before completing.
    ServerCanList,
    /// Trust the client-reported ledger.
    ClientKeeps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSessionStatus {
    Initiated,
    Uploading,
    Completed,
    Aborted,
    Error,
    Expired,
}

impl UploadSessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadSessionStatus::Completed
                | UploadSessionStatus::Aborted
                | UploadSessionStatus::Error
                | UploadSessionStatus::Expired
        )
    }

    /// Enumerates the statuses `self` may legally transition to. Terminal
    /// statuses transition to nothing — session monotonicity.
    fn allowed_next(self) -> &'static [UploadSessionStatus] {
        use UploadSessionStatus::*;
        match self {
            Initiated => &[Uploading, Aborted, Error, Expired, Completed],
            Uploading => &[Completed, Aborted, Error, Expired],
            Completed | Aborted | Error | Expired => &[],
        }
    }

    pub fn can_transition_to(self, next: UploadSessionStatus) -> bool {
        self.allowed_next().contains(&next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: String,
    pub principal_id: String,
    pub storage_type: StorageType,
    pub storage_config_id: String,
    pub mount_id: String,
    pub fs_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub part_size: Option<u64>,
    pub total_parts: Option<u32>,
    pub bytes_uploaded: u64,
    pub uploaded_parts: u32,
    pub next_expected_range: Option<u64>,
    pub strategy: UploadStrategy,
    pub verification_policy: PartVerificationPolicy,
    pub provider_upload_id: Option<String>,
    pub provider_upload_url: Option<String>,
    pub provider_meta: Option<Value>,
    pub status: UploadSessionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        principal_id: impl Into<String>,
        storage_type: StorageType,
        storage_config_id: impl Into<String>,
        mount_id: impl Into<String>,
        fs_path: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        strategy: UploadStrategy,
        verification_policy: PartVerificationPolicy,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        UploadSession {
            id: Uuid::new_v4().to_string(),
            principal_id: principal_id.into(),
            storage_type,
            storage_config_id: storage_config_id.into(),
            mount_id: mount_id.into(),
            fs_path: fs_path.into(),
            file_name: file_name.into(),
            file_size,
            part_size: None,
            total_parts: None,
            bytes_uploaded: 0,
            uploaded_parts: 0,
            next_expected_range: Some(0),
            strategy,
            verification_policy,
            provider_upload_id: None,
            provider_upload_url: None,
            provider_meta: None,
            status: UploadSessionStatus::Initiated,
            expires_at: Some(now + ttl),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fingerprint identifying "the same logical upload" across retries, per
    /// 
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.principal_id, self.storage_config_id, self.fs_path, self.file_name, self.file_size
        )
    }

    pub fn transition(&mut self, next: UploadSessionStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "cannot transition upload session from {:?} to {next:?}",
                self.status
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn ensure_owner(&self, principal_id: &str) -> CoreResult<()> {
        if self.principal_id != principal_id {
            return Err(CoreError::Forbidden("upload session owned by another principal".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPartStatus {
    Uploading,
    Uploaded,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPart {
    pub upload_id: String,
    pub part_no: u32,
    pub size: u64,
    pub provider_part_id: Option<String>,
    pub provider_meta: Option<Value>,
    pub byte_start: u64,
    pub byte_end: u64,
    pub status: UploadPartStatus,
}

impl UploadPart {
    /// Whether `parts`, sorted by `part_no`, covers `[0, file_size)`
    /// without gaps or overlap — the part-coverage invariant for
    /// `per_part_url` sessions.
    pub fn covers_contiguous(parts: &[UploadPart], file_size: u64) -> bool {
        let mut sorted: Vec<&UploadPart> = parts.iter().filter(|p| p.status == UploadPartStatus::Uploaded).collect();
        sorted.sort_by_key(|p| p.part_no);
        let mut expected_start = 0u64;
        for part in sorted {
            if part.byte_start != expected_start || part.byte_end < part.byte_start {
                return false;
            }
            expected_start = part.byte_end + 1;
        }
        expected_start == file_size
    }

    /// Whether the sum of uploaded part sizes equals `file_size` — the
    /// `single_session` half of the same invariant.
    pub fn sum_matches(parts: &[UploadPart], file_size: u64) -> bool {
        parts
            .iter()
            .filter(|p| p.status == UploadPartStatus::Uploaded)
            .map(|p| p.size)
            .sum::<u64>()
            == file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(no: u32, start: u64, end: u64) -> UploadPart {
        UploadPart {
            upload_id: "u1".into(),
            part_no: no,
            size: end - start + 1,
            provider_part_id: None,
            provider_meta: None,
            byte_start: start,
            byte_end: end,
            status: UploadPartStatus::Uploaded,
        }
    }

    #[test]
    fn session_cannot_leave_terminal_state() {
        let mut session = UploadSession::new(
            "p1",
            StorageType::S3,
            "sc1",
            "m1",
            "/a",
            "f.bin",
            1024,
            UploadStrategy::PerPartUrl,
            PartVerificationPolicy::ServerCanList,
            chrono::Duration::hours(1),
        );
        session.transition(UploadSessionStatus::Uploading).unwrap();
        session.transition(UploadSessionStatus::Completed).unwrap();
        assert!(session.transition(UploadSessionStatus::Uploading).is_err());
    }

    #[test]
    fn covers_contiguous_detects_gaps_and_overlaps() {
        let parts = vec![part(1, 0, 4194303), part(2, 4194304, 8388607)];
        assert!(UploadPart::covers_contiguous(&parts, 8388608));
        assert!(!UploadPart::covers_contiguous(&parts, 9000000));

        let overlapping = vec![part(1, 0, 100), part(2, 50, 200)];
        assert!(!UploadPart::covers_contiguous(&overlapping, 201));
    }
}
