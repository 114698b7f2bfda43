// Safety rules: URLs never crawled and elements never clicked

/// Lowercased button text fragments that mark a destructive action
pub const DANGER_PATTERNS: &[&str] = &[
    "logout",
    "log out",
    "sign out",
    "delete",
    "remove",
    "withdraw",
    "transfer",
    "confirm payment",
    "place order",
    "buy now",
    "sell now",
];

/// Routes that must never be visited or clicked
pub const DANGER_ROUTES: &[&str] = &[
    "/logout",
    "/signout",
    "/delete",
    "/settings/delete-account",
    "/wallet/withdraw",
    "/trade/execute",
];

/// Out-of-scope path prefixes: admin, API and build/static assets
pub const OUT_OF_SCOPE_PATHS: &[&str] = &["/admin", "/api/", "/_next/", "/static/", "/assets/"];

/// Every substring that excludes a URL from crawling
pub fn crawl_exclusions() -> impl Iterator<Item = &'static str> {
    DANGER_ROUTES.iter().chain(OUT_OF_SCOPE_PATHS.iter()).copied()
}

/// True if `url` must never be queued, visited or reported by discovery
pub fn should_exclude_from_crawl(url: &str) -> bool {
    crawl_exclusions().any(|pattern| url.contains(pattern))
}

/// True if clicking an element with this text (and optional href) could log
/// the user out, destroy data or move money.
pub fn is_dangerous_button(text: &str, href: Option<&str>) -> bool {
    let lower_text = text.to_lowercase();

    if DANGER_PATTERNS
        .iter()
        .any(|pattern| lower_text.contains(pattern))
    {
        return true;
    }

    match href {
        Some(href) => DANGER_ROUTES.iter().any(|route| href.contains(route)),
        None => false,
    }
}
