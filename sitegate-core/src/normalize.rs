//! URL canonicalization.
//!
//! [`normalize_url`] is the single notion of URL equality used by discovery and
//! validation: two URLs are the same page iff they normalize to the same string.

use url::Url;

/// Query parameters that never change page content
pub const TRACKING_PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign", "ref", "source"];

/// Canonicalize `url` for deduplication.
///
/// Relative URLs are resolved against `base_url`. The fragment, trailing
/// slashes on non-root paths and [`TRACKING_PARAMS`] are removed. Input that
/// cannot be parsed is returned unchanged.
pub fn normalize_url(url: &str, base_url: &str) -> String {
    let Some(mut parsed) = parse_with_base(url, base_url) else {
        return url.to_string();
    };

    parsed.set_fragment(None);

    if !parsed.cannot_be_a_base() {
        let path = parsed.path();
        if path != "/" && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
            parsed.set_path(&trimmed);
        }
    }

    // Rebuilt even when nothing is dropped so every query shares one
    // encoding (`%20` becomes `+`, a bare `key` becomes `key=`).
    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    parsed.to_string()
}

/// Same-origin check against the run's base URL
pub fn is_internal_url(url: &str, base_url: &str) -> bool {
    let Ok(base) = Url::parse(base_url) else {
        return false;
    };
    match parse_with_base(url, base_url) {
        Some(parsed) => parsed.origin() == base.origin(),
        None => false,
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn parse_with_base(url: &str, base_url: &str) -> Option<Url> {
    match Url::parse(url) {
        Ok(parsed) => Some(parsed),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(base_url).ok().and_then(|base| base.join(url).ok())
        }
        Err(_) => None,
    }
}
