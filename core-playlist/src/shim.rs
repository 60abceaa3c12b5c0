//! URL shimming.
//!
//! A shimmed URL has [`SHIM_SCHEME_PREFIX`] prepended to its scheme, so
//! `https://cdn.example.com/a.mp4` becomes
//! `playlist-shim-https://cdn.example.com/a.mp4`. The player's network stack
//! does not recognize the tagged scheme and hands requests for it to a
//! loader session instead.
//!
//! Schemes are parsed per RFC 3986 on the raw string. Parsing libraries
//! normalize or refuse scheme rewrites on special schemes, which would break
//! the exact round trip.

use chrono::{DateTime, Utc};

/// Marker prepended to the scheme of shimmed URLs.
pub const SHIM_SCHEME_PREFIX: &str = "playlist-shim-";

/// Scheme of the local URL bound to a cached item.
pub const LOCAL_MEDIA_SCHEME: &str = "playlist-media";

/// Split `url` into `(scheme, rest)` where `rest` starts after the `:`.
fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let colon = url.find(':')?;
    let scheme = &url[..colon];

    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }

    Some((scheme, &url[colon + 1..]))
}

/// Tag `url` so it routes to a loader session. URLs without a scheme are
/// returned unchanged.
pub fn shim(url: &str) -> String {
    match split_scheme(url) {
        Some((scheme, rest)) => format!("{}{}:{}", SHIM_SCHEME_PREFIX, scheme, rest),
        None => url.to_string(),
    }
}

/// Strip one shim marker from `url`. URLs that are not shimmed are returned
/// unchanged.
pub fn unshim(url: &str) -> String {
    match shimmed_parts(url) {
        Some((scheme, rest)) => format!("{}:{}", scheme, rest),
        None => url.to_string(),
    }
}

/// Whether `url` carries the shim marker.
pub fn is_shimmed(url: &str) -> bool {
    shimmed_parts(url).is_some()
}

fn shimmed_parts(url: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = split_scheme(url)?;
    let prefix_len = SHIM_SCHEME_PREFIX.len();
    if scheme.len() <= prefix_len {
        return None;
    }
    if !scheme[..prefix_len].eq_ignore_ascii_case(SHIM_SCHEME_PREFIX) {
        return None;
    }
    let original = &scheme[prefix_len..];
    // The remainder must itself be a valid scheme
    if !original.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((original, rest))
}

/// Local URL for a cached item. The timestamp keeps players from reusing a
/// stale asset for a new session.
pub fn local_media_url(now: DateTime<Utc>) -> String {
    format!(
        "{}://local-media-resource?time={}",
        LOCAL_MEDIA_SCHEME,
        now.timestamp_millis()
    )
}
