// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Signed proxy access: serves mount content through the
//! gateway rather than a back-end redirect, verifying an HMAC-bound
//! `(fsPath, expireTs)` signature and auditing every request.

mod hls;

use crate::application::streaming_service::{ConditionalRequest, StreamOutcome, StreamingService};
use crate::domain::driver::{DriverCtx, StorageDriver};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::events::{GatewayEvent, ProxyAuditRecord, ProxyDecision};
use crate::domain::mount::Mount;
use crate::domain::proxy_signature;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use uuid::Uuid;

pub struct ProxyService {
    signing_secret: Vec<u8>,
    ttl_secs: i64,
    events: EventBus,
}

impl ProxyService {
    pub fn new(signing_secret: Vec<u8>, ttl_secs: i64, events: EventBus) -> Self {
        Self { signing_secret, ttl_secs, events }
    }

    /// Mints a fresh `(sig, expireTs)` pair for `fs_path`, valid for this
    /// service's configured TTL from `now_ms`.
    pub fn sign(&self, fs_path: &str, now_ms: i64) -> (String, i64) {
        let expire_ts = now_ms + self.ttl_secs * 1000;
        let token = proxy_signature::sign(&self.signing_secret, fs_path, expire_ts);
        let (sig, _) = token.rsplit_once(':').expect("sign() always emits sig:expireTs");
        (sig.to_string(), expire_ts)
    }

    /// Verifies `(sign, ts)` against `fs_path` when `mount.require_signature`
    /// is set, emits the audit record regardless of outcome,
    /// and — on success — streams the content, rewriting `.m3u8` playlists
    /// in flight so every child reference carries its own signature.
    #[allow(clippy::too_many_arguments)]
    pub async fn serve(
        &self,
        mount: &Mount,
        fs_path: &str,
        driver: &dyn StorageDriver,
        sign_param: Option<&str>,
        ts_param: Option<i64>,
        conditional: &ConditionalRequest,
        ctx: &DriverCtx,
        now_ms: i64,
    ) -> CoreResult<StreamOutcome> {
        let req_id = ctx.req_id.clone();
        let signature_required = mount.require_signature;
        let signature_provided = sign_param.is_some() && ts_param.is_some();

        if signature_required {
            let (Some(sig), Some(ts)) = (sign_param, ts_param) else {
                self.audit(&req_id, fs_path, ProxyDecision::Deny, "signature required but not provided", signature_required, signature_provided, Some(&mount.id));
                return Err(CoreError::Forbidden("signature required".into()));
            };
            let token = format!("{sig}:{ts}");
            if let Err(err) = proxy_signature::verify(&self.signing_secret, fs_path, &token, now_ms) {
                self.audit(&req_id, fs_path, ProxyDecision::Deny, &err.to_string(), signature_required, signature_provided, Some(&mount.id));
                return Err(CoreError::Forbidden(format!("invalid proxy signature: {err}")));
            }
        }

        self.audit(&req_id, fs_path, ProxyDecision::Allow, "ok", signature_required, signature_provided, Some(&mount.id));

        if is_hls_playlist(fs_path) && conditional.range.is_none() {
            return self.serve_playlist(fs_path, driver, ctx, now_ms).await;
        }

        StreamingService::stream(driver, fs_path, conditional, ctx).await
    }

    /// Rewriting is skipped for range requests and downloads — callers
    /// route those straight through [`StreamingService`] instead of here;
    /// this path only ever serves the rewritten playlist body whole.
    async fn serve_playlist(&self, fs_path: &str, driver: &dyn StorageDriver, ctx: &DriverCtx, now_ms: i64) -> CoreResult<StreamOutcome> {
        use futures::StreamExt;

        let mut body = driver.download_file(fs_path, None, ctx).await?;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let text = String::from_utf8(buf).map_err(|_| CoreError::Internal("playlist body was not valid UTF-8".into()))?;

        let base_dir = fs_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let mut sign_for = |path: &str| self.sign(path, now_ms);
        let rewritten = hls::rewrite_playlist(&text, base_dir, &mut sign_for);

        let stream: crate::domain::driver::ByteStream = Box::pin(futures::stream::once(async move { Ok(bytes::Bytes::from(rewritten.into_bytes())) }));
        Ok(StreamOutcome::Body {
            size: None,
            content_type: Some("application/vnd.apple.mpegurl".to_string()),
            etag: None,
            range: None,
            total_size: None,
            stream,
        })
    }

    fn audit(&self, req_id: &str, path: &str, decision: ProxyDecision, reason: &str, signature_required: bool, signature_provided: bool, mount_id: Option<&str>) {
        self.events.publish(GatewayEvent::ProxyAudit(ProxyAuditRecord {
            req_id: req_id.to_string(),
            path: path.to_string(),
            decision,
            reason: reason.to_string(),
            signature_required,
            signature_provided,
            mount_id: mount_id.map(str::to_string),
            ts: Utc::now(),
        }));
    }

    pub fn new_req_id() -> String {
        Uuid::new_v4().to_string()
    }
}

fn is_hls_playlist(fs_path: &str) -> bool {
    fs_path.ends_with(".m3u8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    fn service() -> ProxyService {
        ProxyService::new(b"test-secret".to_vec(), 3600, EventBus::with_default_capacity())
    }

    fn mount(require_signature: bool) -> Mount {
        let mut m = Mount::new("m", "/m", "sc1", crate::domain::storage_config::StorageType::Local, "admin");
        m.require_signature = require_signature;
        m
    }

    #[tokio::test]
    async fn denies_when_signature_required_but_missing() {
        let svc = service();
        let m = mount(true);
        let ctx = DriverCtx {
            mount: m.clone(),
            principal: crate::domain::principal::Principal::admin("t"),
            req_id: "r1".into(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        };
        struct NoopDriver;
        #[async_trait::async_trait]
        impl StorageDriver for NoopDriver {
            fn capabilities(&self) -> crate::domain::driver::Capability {
                crate::domain::driver::Capability::empty()
            }
            async fn list_directory(&self, _: &str, _: crate::domain::driver::ListOptions, _: &DriverCtx) -> CoreResult<crate::domain::driver::DirectoryListing> {
                unimplemented!()
            }
            async fn get_file_info(&self, _: &str, _: &DriverCtx) -> CoreResult<crate::domain::driver::FileInfo> {
                unimplemented!()
            }
            async fn stat(&self, _: &str, _: &DriverCtx) -> CoreResult<crate::domain::driver::StreamDescriptor> {
                unimplemented!()
            }
            async fn exists(&self, _: &str, _: &DriverCtx) -> CoreResult<bool> {
                unimplemented!()
            }
            async fn download_file(&self, _: &str, _: Option<(u64, Option<u64>)>, _: &DriverCtx) -> CoreResult<crate::domain::driver::ByteStream> {
                unimplemented!()
            }
            async fn upload_file(&self, _: &str, _: crate::domain::driver::ByteStream, _: &DriverCtx) -> CoreResult<crate::domain::driver::UploadOutcome> {
                unimplemented!()
            }
            async fn create_directory(&self, _: &str, _: &DriverCtx) -> CoreResult<()> {
                unimplemented!()
            }
            async fn remove(&self, _: &str, _: &DriverCtx) -> CoreResult<()> {
                unimplemented!()
            }
            async fn rename_item(&self, _: &str, _: &str, _: &DriverCtx) -> CoreResult<()> {
                unimplemented!()
            }
            async fn copy_item(&self, _: &str, _: &str, _: bool, _: &DriverCtx) -> CoreResult<crate::domain::driver::CopyOutcome> {
                unimplemented!()
            }
        }
        let err = svc.serve(&m, "/a.txt", &NoopDriver, None, None, &crate::application::streaming_service::ConditionalRequest::default(), &ctx, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn sign_round_trips_with_verify() {
        let svc = service();
        let (sig, ts) = svc.sign("/a/b.mp4", 1_000);
        let token = format!("{sig}:{ts}");
        proxy_signature::verify(b"test-secret", "/a/b.mp4", &token, 1_500).unwrap();
    }
}
