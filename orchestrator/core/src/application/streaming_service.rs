// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Uniform range/conditional-request handling for downloads and proxy reads
//! (component 4). One code path serves both `/api/fs/download`
//! and the signed proxy (`application::proxy_service`), since both read
//! through the same `StorageDriver::stat`/`download_file` pair and must
//! honour the same `If-None-Match`/`Range` semantics.

use crate::domain::driver::{ByteStream, DriverCtx, StorageDriver};
use crate::domain::errors::{CoreError, CoreResult};

/// A single byte range, inclusive on both ends, already validated against
/// the resource's total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

pub enum StreamOutcome {
    /// `If-None-Match`/`If-Modified-Since` matched the current state; the
    /// caller should respond `304 Not Modified` with no body.
    NotModified { etag: Option<String> },
    /// The requested `Range` could not be satisfied against the resource's
    /// actual size; the caller should respond `416 Range Not Satisfiable`
    /// with `Content-Range: bytes */{total}`.
    RangeNotSatisfiable { total_size: u64 },
    /// A body is being returned, either the full resource (`range: None`,
    /// `200 OK`) or a byte range (`range: Some`, `206 Partial Content`).
    Body { size: Option<u64>, content_type: Option<String>, etag: Option<String>, range: Option<ByteRange>, total_size: Option<u64>, stream: ByteStream },
}

/// Conditional/range request headers as lifted from HTTP by the
/// presentation layer; this service knows nothing about `axum` or header
/// names.
#[derive(Debug, Clone, Default)]
pub struct ConditionalRequest {
    pub if_none_match: Option<String>,
    pub range: Option<String>,
}

/// Parses an HTTP `Range: bytes=start-end` header. Only the single-range
/// form is supported; multi-range (`bytes=0-10,20-30`) is rejected as
/// unsatisfiable rather than partially honoured, since splitting a
/// multi-range response across driver calls would require a `multipart/
/// byteranges` body this gateway does not produce.
fn parse_range(header: &str, total_size: u64) -> CoreResult<ByteRange> {
    let spec = header.strip_prefix("bytes=").ok_or_else(|| CoreError::Validation("unsupported Range unit".into()))?;
    if spec.contains(',') {
        return Err(CoreError::Validation("multi-range requests are not supported".into()));
    }
    let (start_str, end_str) = spec.split_once('-').ok_or_else(|| CoreError::Validation("malformed Range header".into()))?;

    let (start, end) = if start_str.is_empty() {
        // Suffix range: "bytes=-500" means the last 500 bytes.
        let suffix_len: u64 = end_str.parse().map_err(|_| CoreError::Validation("malformed Range header".into()))?;
        if suffix_len == 0 || total_size == 0 {
            return Err(CoreError::Validation("empty suffix range".into()));
        }
        let start = total_size.saturating_sub(suffix_len);
        (start, total_size - 1)
    } else {
        let start: u64 = start_str.parse().map_err(|_| CoreError::Validation("malformed Range header".into()))?;
        let end = if end_str.is_empty() { total_size.saturating_sub(1) } else { end_str.parse().map_err(|_| CoreError::Validation("malformed Range header".into()))? };
        (start, end)
    };

    if start > end || (total_size > 0 && start >= total_size) {
        return Err(CoreError::Validation("range out of bounds".into()));
    }
    Ok(ByteRange { start, end: end.min(total_size.saturating_sub(1)) })
}

pub struct StreamingService;

impl StreamingService {
    /// Resolves a read against `driver`'s `stat`/`download_file` pair,
    /// honouring `If-None-Match` (exact, strong-or-weak ETag match) ahead of
    /// `Range`, matching the precedence streaming layer and
    /// RFC 9110 §13.2.2 both require: a conditional GET that is satisfied
    /// short-circuits before any range parsing.
    pub async fn stream(driver: &dyn StorageDriver, sub_path: &str, conditional: &ConditionalRequest, ctx: &DriverCtx) -> CoreResult<StreamOutcome> {
        let descriptor = driver.stat(sub_path, ctx).await?;

        if let (Some(requested), Some(current)) = (&conditional.if_none_match, &descriptor.etag) {
            if etag_matches(requested, current) {
                return Ok(StreamOutcome::NotModified { etag: descriptor.etag.clone() });
            }
        }

        match &conditional.range {
            Some(raw) if descriptor.supports_range => {
                let total = descriptor.size.ok_or_else(|| CoreError::Validation("driver reports no size for a range request".into()))?;
                let range = match parse_range(raw, total) {
                    Ok(r) => r,
                    Err(_) => return Ok(StreamOutcome::RangeNotSatisfiable { total_size: total }),
                };
                let stream = driver.download_file(sub_path, Some((range.start, Some(range.end))), ctx).await?;
                Ok(StreamOutcome::Body {
                    size: Some(range.len()),
                    content_type: descriptor.content_type.clone(),
                    etag: descriptor.etag.clone(),
                    range: Some(range),
                    total_size: Some(total),
                    stream,
                })
            }
            _ => {
                let stream = driver.download_file(sub_path, None, ctx).await?;
                Ok(StreamOutcome::Body {
                    size: descriptor.size,
                    content_type: descriptor.content_type.clone(),
                    etag: descriptor.etag.clone(),
                    range: None,
                    total_size: descriptor.size,
                    stream,
                })
            }
        }
    }
}

/// RFC 9110 weak comparison: matches `W/"x"` against `"x"` and against
/// itself, and additionally accepts the literal `*`.
fn etag_matches(requested: &str, current: &str) -> bool {
    if requested.trim() == "*" {
        return true;
    }
    requested.trim_start_matches("W/").trim_matches('"') == current.trim_start_matches("W/").trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_range() {
        let r = parse_range("bytes=0-499", 1000).unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 499 });
    }

    #[test]
    fn parses_an_open_ended_range() {
        let r = parse_range("bytes=900-", 1000).unwrap();
        assert_eq!(r, ByteRange { start: 900, end: 999 });
    }

    #[test]
    fn parses_a_suffix_range() {
        let r = parse_range("bytes=-100", 1000).unwrap();
        assert_eq!(r, ByteRange { start: 900, end: 999 });
    }

    #[test]
    fn rejects_multi_range() {
        assert!(parse_range("bytes=0-10,20-30", 1000).is_err());
    }

    #[test]
    fn weak_etag_matches_strong_form() {
        assert!(etag_matches("W/\"abc\"", "\"abc\""));
        assert!(etag_matches("*", "anything"));
        assert!(!etag_matches("\"abc\"", "\"xyz\""));
    }
}
