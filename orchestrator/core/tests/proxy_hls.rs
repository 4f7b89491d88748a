// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The signed proxy over a real `.m3u8` playlist: every child URI in the
//! rewritten body must carry its own valid signature, and a request
//! without one must be denied and audited.

mod common;

use cloudpaste_core::application::proxy_service::ProxyService;
use cloudpaste_core::application::streaming_service::{ConditionalRequest, StreamOutcome};
use cloudpaste_core::domain::errors::ErrorKind;
use cloudpaste_core::domain::events::{GatewayEvent, ProxyDecision};
use cloudpaste_core::infrastructure::event_bus::EventBus;
use futures::StreamExt;

const SECRET: &[u8] = b"proxy-test-secret";

async fn drain(outcome: StreamOutcome) -> Vec<u8> {
    match outcome {
        StreamOutcome::Body { mut stream, .. } => {
            let mut buf = Vec::new();
            while let Some(chunk) = stream.next().await {
                buf.extend_from_slice(&chunk.unwrap());
            }
            buf
        }
        _ => panic!("expected a body"),
    }
}

#[tokio::test]
async fn rewrites_every_child_uri_with_its_own_valid_signature() {
    let fixture = common::local_fixture("/m").await;
    std::fs::create_dir(fixture.path("show")).unwrap();
    std::fs::write(
        fixture.path("show/index.m3u8"),
        "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x1\n#EXTINF:10,\nseg0.ts\n",
    )
    .unwrap();

    let mut mount = fixture.mount.clone();
    mount.require_signature = true;

    let events = EventBus::with_default_capacity();
    let svc = ProxyService::new(SECRET.to_vec(), 3600, events.clone());
    let (sig, ts) = svc.sign("/show/index.m3u8", 0);

    let driver = fixture.driver().await;
    let ctx = fixture.ctx();
    let outcome = svc
        .serve(&mount, "/show/index.m3u8", driver.as_ref(), Some(&sig), Some(ts), &ConditionalRequest::default(), &ctx, 0)
        .await
        .unwrap();
    let body = String::from_utf8(drain(outcome).await).unwrap();

    let (seg_sig, seg_ts) = svc.sign("/show/seg0.ts", 0);
    let (key_sig, key_ts) = svc.sign("/show/key.bin", 0);
    assert!(body.contains(&format!("seg0.ts?sign={seg_sig}&ts={seg_ts}")));
    assert!(body.contains(&format!("key.bin?sign={key_sig}&ts={key_ts}")));
    assert!(body.contains("IV=0x1"));
}

#[tokio::test]
async fn a_missing_signature_is_denied_and_audited() {
    let fixture = common::local_fixture("/m").await;
    std::fs::write(fixture.path("secret.bin"), b"shh").unwrap();

    let mut mount = fixture.mount.clone();
    mount.require_signature = true;

    let events = EventBus::with_default_capacity();
    let mut audit_rx = events.subscribe();
    let svc = ProxyService::new(SECRET.to_vec(), 3600, events);

    let driver = fixture.driver().await;
    let ctx = fixture.ctx();
    let err = svc
        .serve(&mount, "/secret.bin", driver.as_ref(), None, None, &ConditionalRequest::default(), &ctx, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let GatewayEvent::ProxyAudit(record) = audit_rx.recv().await.unwrap() else {
        panic!("expected a proxy audit event");
    };
    assert_eq!(record.decision, ProxyDecision::Deny);
    assert!(!record.signature_provided);
    assert!(record.signature_required);
}
