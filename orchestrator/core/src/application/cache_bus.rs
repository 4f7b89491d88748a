// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory-listing, signed-URL, and search-index-state caches with
//! synchronous invalidation: a `dashmap`-backed concurrent map for the
//! entries, kept fresh by subscribing to `EventBus` broadcasts.

use crate::domain::events::{CacheInvalidation, CacheScope, GatewayEvent};
use crate::infrastructure::event_bus::EventBus;
use dashmap::DashMap;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over raw bytes, used for the directory listing's weak ETag.
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Fnv1a(FNV_OFFSET_BASIS)
    }
}

impl Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }
}

/// One summarised directory entry contributing to the weak ETag, per
/// `{path,isDir,size,modified,etag}` tuple.
pub struct EtagEntry<'a> {
    pub path: &'a str,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub modified_ms: Option<i64>,
    pub etag: Option<&'a str>,
}

/// Computes the weak directory ETag `W/"{mountId}:{dirPath}:{itemCount}:{fnv-hash}"`.
pub fn directory_etag(mount_id: &str, dir_path: &str, entries: &[EtagEntry<'_>]) -> String {
    let mut hasher = Fnv1a::new();
    for e in entries {
        hasher.write(e.path.as_bytes());
        hasher.write(&[e.is_dir as u8]);
        hasher.write(&e.size.unwrap_or(0).to_le_bytes());
        hasher.write(&e.modified_ms.unwrap_or(0).to_le_bytes());
        hasher.write(e.etag.unwrap_or("").as_bytes());
    }
    format!("W/\"{mount_id}:{dir_path}:{}:{:016x}\"", entries.len(), hasher.finish())
}

#[derive(Clone)]
struct Entry<V: Clone> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl<V: Clone> Entry<V> {
    fn expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// A small TTL'd cache keyed by an opaque string, scoped to one
/// [`CacheScope`]. Invalidation drops every key whose recorded `mount_id`/
/// `storage_config_id` matches the invalidation message, or every key when
/// both are `None` (a full-scope flush).
struct ScopedCache<V: Clone> {
    entries: DashMap<String, (Entry<V>, Option<String>, Option<String>)>,
}

impl<V: Clone> ScopedCache<V> {
    fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn get(&self, key: &str) -> Option<V> {
        let hit = self.entries.get(key)?;
        if hit.0.expired() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.0.value.clone())
    }

    fn put(&self, key: String, value: V, mount_id: Option<String>, storage_config_id: Option<String>, ttl: Option<Duration>) {
        self.entries.insert(key, (Entry { value, inserted_at: Instant::now(), ttl }, mount_id, storage_config_id));
    }

    fn invalidate(&self, inv: &CacheInvalidation) {
        if inv.mount_id.is_none() && inv.storage_config_id.is_none() {
            self.entries.clear();
            return;
        }
        self.entries.retain(|_, (_, mount_id, storage_config_id)| {
            let mount_match = inv.mount_id.as_ref().map(|m| mount_id.as_deref() == Some(m.as_str())).unwrap_or(false);
            let config_match = inv
                .storage_config_id
                .as_ref()
                .map(|c| storage_config_id.as_deref() == Some(c.as_str()))
                .unwrap_or(false);
            !(mount_match || config_match)
        });
    }
}

/// Cached directory listing payload plus its weak ETag, as returned to
/// `GET /api/fs/list`.
#[derive(Clone)]
pub struct CachedListing {
    pub etag: String,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct CachedSignedUrl {
    pub url: String,
    pub expires_at_ms: i64,
}

pub struct CacheBus {
    directories: ScopedCache<CachedListing>,
    signed_urls: ScopedCache<CachedSignedUrl>,
    search_state: ScopedCache<Vec<u8>>,
}

impl CacheBus {
    pub fn new() -> Self {
        Self { directories: ScopedCache::new(), signed_urls: ScopedCache::new(), search_state: ScopedCache::new() }
    }

    pub fn get_listing(&self, mount_id: &str, sub_path: &str, principal_scope: &str) -> Option<CachedListing> {
        self.directories.get(&listing_key(mount_id, sub_path, principal_scope))
    }

    pub fn put_listing(&self, mount_id: &str, sub_path: &str, principal_scope: &str, listing: CachedListing) {
        self.directories.put(listing_key(mount_id, sub_path, principal_scope), listing, Some(mount_id.to_string()), None, None);
    }

    pub fn get_signed_url(&self, mount_id: &str, sub_path: &str, principal_scope: &str, force_download: bool) -> Option<CachedSignedUrl> {
        self.signed_urls.get(&signed_url_key(mount_id, sub_path, principal_scope, force_download))
    }

    pub fn put_signed_url(&self, mount_id: &str, sub_path: &str, principal_scope: &str, force_download: bool, value: CachedSignedUrl, ttl: Duration) {
        self.signed_urls.put(
            signed_url_key(mount_id, sub_path, principal_scope, force_download),
            value,
            Some(mount_id.to_string()),
            None,
            Some(ttl),
        );
    }

    pub fn get_search_state(&self, mount_id: &str) -> Option<Vec<u8>> {
        self.search_state.get(mount_id)
    }

    pub fn put_search_state(&self, mount_id: &str, state: Vec<u8>) {
        self.search_state.put(mount_id.to_string(), state, Some(mount_id.to_string()), None, None);
    }

    /// Drops every cache entry matching `inv`'s scope. Called both
    /// synchronously after a local write (so the writer's own next read is
    /// never stale) and from [`Self::run`] for invalidations published by
    /// other workers.
    pub fn apply(&self, inv: &CacheInvalidation) {
        match inv.scope {
            CacheScope::Directory => self.directories.invalidate(inv),
            CacheScope::SignedUrl => self.signed_urls.invalidate(inv),
            CacheScope::SearchIndex => self.search_state.invalidate(inv),
        }
    }

    /// Subscribes to `bus` and applies every [`GatewayEvent::Cache`]
    /// invalidation until the bus closes. Spawned once at startup.
    pub async fn run(self: Arc<Self>, bus: EventBus) {
        let mut rx = bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(GatewayEvent::Cache(inv)) => {
                    debug!(?inv.scope, mount_id = ?inv.mount_id, "cache invalidation");
                    self.apply(&inv);
                }
                Ok(_) => {}
                Err(crate::infrastructure::event_bus::EventBusError::Closed) => break,
                Err(_) => continue,
            }
        }
    }
}

impl Default for CacheBus {
    fn default() -> Self {
        Self::new()
    }
}

fn listing_key(mount_id: &str, sub_path: &str, principal_scope: &str) -> String {
    format!("{mount_id}:{sub_path}:{principal_scope}")
}

fn signed_url_key(mount_id: &str, sub_path: &str, principal_scope: &str, force_download: bool) -> String {
    format!("{mount_id}:{sub_path}:{principal_scope}:{force_download}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_stable_for_the_same_listing() {
        let entries = vec![EtagEntry { path: "a.txt", is_dir: false, size: Some(10), modified_ms: Some(1), etag: None }];
        assert_eq!(directory_etag("m1", "/docs", &entries), directory_etag("m1", "/docs", &entries));
    }

    #[test]
    fn etag_changes_when_an_entry_changes() {
        let a = vec![EtagEntry { path: "a.txt", is_dir: false, size: Some(10), modified_ms: Some(1), etag: None }];
        let b = vec![EtagEntry { path: "a.txt", is_dir: false, size: Some(11), modified_ms: Some(1), etag: None }];
        assert_ne!(directory_etag("m1", "/docs", &a), directory_etag("m1", "/docs", &b));
    }

    #[test]
    fn invalidation_drops_matching_mount_only() {
        let bus = CacheBus::new();
        bus.put_listing("m1", "/a", "anon", CachedListing { etag: "e1".into(), body: vec![] });
        bus.put_listing("m2", "/a", "anon", CachedListing { etag: "e2".into(), body: vec![] });
        bus.apply(&CacheInvalidation { scope: CacheScope::Directory, mount_id: Some("m1".into()), storage_config_id: None });
        assert!(bus.get_listing("m1", "/a", "anon").is_none());
        assert!(bus.get_listing("m2", "/a", "anon").is_some());
    }

    #[test]
    fn wildcard_invalidation_clears_everything() {
        let bus = CacheBus::new();
        bus.put_listing("m1", "/a", "anon", CachedListing { etag: "e1".into(), body: vec![] });
        bus.apply(&CacheInvalidation { scope: CacheScope::Directory, mount_id: None, storage_config_id: None });
        assert!(bus.get_listing("m1", "/a", "anon").is_none());
    }

    #[test]
    fn signed_url_cache_respects_force_download_variant() {
        let bus = CacheBus::new();
        bus.put_signed_url("m1", "/a", "anon", false, CachedSignedUrl { url: "u1".into(), expires_at_ms: 0 }, Duration::from_secs(60));
        assert!(bus.get_signed_url("m1", "/a", "anon", true).is_none());
        assert!(bus.get_signed_url("m1", "/a", "anon", false).is_some());
    }
}
