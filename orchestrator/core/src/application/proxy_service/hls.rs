// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HLS (`.m3u8`) playlist rewriting for the signed proxy (,
//! REDESIGN FLAGS). A small line-oriented parser — the corpus carries no
//! HLS crate, and a full spec-compliant parser is unneeded here since the
//! only operation is resolving and re-signing the handful of tag forms that
//! reference another URI.

/// Resolves `uri` relative to `base_dir` (a normalised virtual directory
/// path, no trailing slash except root). Absolute URIs (scheme-prefixed)
/// are left untouched — they point outside this gateway's virtual
/// filesystem and cannot be re-signed.
fn resolve_uri(base_dir: &str, uri: &str) -> Option<String> {
    if uri.contains("://") {
        return None;
    }
    if uri.starts_with('/') {
        return Some(uri.to_string());
    }
    let mut segments: Vec<&str> = if base_dir.is_empty() || base_dir == "/" { Vec::new() } else { base_dir.trim_matches('/').split('/').collect() };
    for part in uri.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Appends `?sign=<sig>&ts=<ts>` (or `&sign=...` if the URI already has a
/// query string), unless the URI already carries a `sign=` parameter.
fn append_signature(uri: &str, sig: &str, ts: i64) -> String {
    if uri.contains("sign=") {
        return uri.to_string();
    }
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{sep}sign={sig}&ts={ts}")
}

/// Rewrites every child reference in an `.m3u8` playlist: `#EXT-X-KEY` and
/// `#EXT-X-MAP` `URI="..."` attributes, and every plain (non-comment,
/// non-blank) line, which is either a media segment or — following
/// `#EXT-X-STREAM-INF` — a variant sub-playlist. `sign_for` is called with
/// the resolved absolute fs path and returns `(sig, expire_ts)`.
pub fn rewrite_playlist(text: &str, base_dir: &str, sign_for: &mut dyn FnMut(&str) -> (String, i64)) -> String {
    let mut out = String::with_capacity(text.len() + 256);
    for line in text.lines() {
        if let Some(rewritten) = rewrite_attribute_uri(line, base_dir, sign_for) {
            out.push_str(&rewritten);
        } else if !line.is_empty() && !line.starts_with('#') {
            out.push_str(&rewrite_plain_uri(line, base_dir, sign_for));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

fn rewrite_plain_uri(line: &str, base_dir: &str, sign_for: &mut dyn FnMut(&str) -> (String, i64)) -> String {
    match resolve_uri(base_dir, line) {
        Some(fs_path) => {
            let (sig, ts) = sign_for(&fs_path);
            append_signature(line, &sig, ts)
        }
        None => line.to_string(),
    }
}

fn rewrite_attribute_uri(line: &str, base_dir: &str, sign_for: &mut dyn FnMut(&str) -> (String, i64)) -> Option<String> {
    if !(line.starts_with("#EXT-X-KEY") || line.starts_with("#EXT-X-MAP")) {
        return None;
    }
    let marker = "URI=\"";
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    let uri = &rest[..end];

    let fs_path = resolve_uri(base_dir, uri)?;
    let (sig, ts) = sign_for(&fs_path);
    let rewritten_uri = append_signature(uri, &sig, ts);

    Some(format!("{}{}{}", &line[..start], rewritten_uri, &line[start + end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_plain_segment_lines() {
        let playlist = "#EXTM3U\n#EXTINF:10,\nseg0.ts\n";
        let out = rewrite_playlist(playlist, "/videos/show", &mut |path| (format!("sig-for-{path}"), 999));
        assert!(out.contains("seg0.ts?sign=sig-for-/videos/show/seg0.ts&ts=999"));
    }

    #[test]
    fn rewrites_ext_x_key_uri_attribute() {
        let line = r#"#EXT-X-KEY:METHOD=AES-128,URI="key.bin",IV=0x1"#;
        let out = rewrite_playlist(line, "/videos/show", &mut |path| (format!("k-{path}"), 1));
        assert!(out.contains("URI=\"key.bin?sign=k-/videos/show/key.bin&ts=1\""));
        assert!(out.contains("IV=0x1"));
    }

    #[test]
    fn skips_uris_already_signed() {
        let playlist = "segA.ts?sign=abc&ts=5\n";
        let out = rewrite_playlist(playlist, "/x", &mut |_| panic!("should not be called"));
        assert_eq!(out.trim(), "segA.ts?sign=abc&ts=5");
    }

    #[test]
    fn leaves_absolute_uris_untouched() {
        let playlist = "https://cdn.example.com/seg.ts\n";
        let out = rewrite_playlist(playlist, "/x", &mut |_| panic!("should not be called"));
        assert_eq!(out.trim(), "https://cdn.example.com/seg.ts");
    }

    #[test]
    fn resolves_dotdot_segments_against_base_dir() {
        assert_eq!(resolve_uri("/a/b", "../c.ts").as_deref(), Some("/a/c.ts"));
    }
}
