//! Route-pattern classification used to cap sampling of parameterized routes.

use url::Url;

pub const ID_PLACEHOLDER: &str = ":id";
pub const SLUG_PLACEHOLDER: &str = ":slug";

/// Collapse ID- and slug-like path segments of `url` into placeholders.
///
/// `https://x.com/item/42/reviews` becomes `item/:id/reviews`. The pattern is
/// only a sampling key; it is never used for exclusion or equality.
pub fn pattern_of(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    parsed
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(classify_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// True if the pattern contains at least one placeholder segment
pub fn is_dynamic_pattern(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|segment| segment == ID_PLACEHOLDER || segment == SLUG_PLACEHOLDER)
}

fn classify_segment(segment: &str) -> &str {
    if is_id_like(segment) {
        ID_PLACEHOLDER
    } else if is_slug_like(segment) {
        SLUG_PLACEHOLDER
    } else {
        segment
    }
}

/// All digits, or a 20+ character hex/UUID token
fn is_id_like(segment: &str) -> bool {
    let all_digits = segment.bytes().all(|b| b.is_ascii_digit());
    let hex_token = segment.len() >= 20 && segment.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-');
    !segment.is_empty() && (all_digits || hex_token)
}

/// ALLCAPS, or camelCase (lowercase run followed by an uppercase letter)
fn is_slug_like(segment: &str) -> bool {
    let all_caps = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_uppercase());

    let lower_run = segment.bytes().take_while(u8::is_ascii_lowercase).count();
    let camel = lower_run > 0
        && segment
            .as_bytes()
            .get(lower_run)
            .is_some_and(u8::is_ascii_uppercase);

    all_caps || camel
}
