use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// State of one pass over the listing pages. Dropped and rebuilt for every run.
#[derive(Debug, Default)]
pub struct RunState {
    pub run_number: u64,

    /// Normalized detail URLs already handled in this run
    seen_urls: HashSet<String>,
}

impl RunState {
    pub fn new(run_number: u64) -> Self {
        Self {
            run_number,
            seen_urls: HashSet::new(),
        }
    }

    pub fn has_seen(&self, url: &str) -> bool {
        self.seen_urls.contains(&normalize_url(url))
    }

    pub fn mark_seen(&mut self, url: &str) {
        self.seen_urls.insert(normalize_url(url));
    }

    /// Mark `url` as seen; true only the first time within this run
    pub fn first_sighting(&mut self, url: &str) -> bool {
        if self.has_seen(url) {
            debug!(run = self.run_number, "Skipping already seen URL: {}", url);
            return false;
        }
        self.mark_seen(url);
        true
    }

    /// Get the current count of seen URLs
    pub fn seen_count(&self) -> usize {
        self.seen_urls.len()
    }
}

/// Canonical form of a detail URL, used both for dedup and as the stored
/// document identity
pub fn normalize_url(url: &str) -> String {
    let mut normalized = match Url::parse(url.trim()) {
        Ok(url) => url,
        Err(_) => return url.trim().to_string(), // Can't normalize, return as is
    };

    // `Url` already lowercases the host and drops default ports on parse.
    // Remove fragments (anchors)
    normalized.set_fragment(None);

    // Sort query parameters if present
    if let Some(query) = normalized.query() {
        if query.is_empty() {
            normalized.set_query(None);
        } else {
            let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            params.sort_by_key(|pair| pair.split('=').next().unwrap_or(""));
            let sorted = params.join("&");
            normalized.set_query(Some(&sorted));
        }
    }

    let mut text = normalized.to_string();

    // Remove trailing slash
    if text.ends_with('/') && normalized.query().is_none() {
        text.pop();
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_sighting_is_skipped() {
        let mut state = RunState::new(1);

        assert!(state.first_sighting("https://ksa.yallamotor.com/new-cars/kia/k5/2025"));
        assert!(!state.first_sighting("https://ksa.yallamotor.com/new-cars/kia/k5/2025"));
        // same resource, different spelling
        assert!(!state.first_sighting("https://KSA.yallamotor.com:443/new-cars/kia/k5/2025#gallery"));
        assert!(state.first_sighting("https://ksa.yallamotor.com/new-cars/kia/k8/2025"));

        assert_eq!(state.seen_count(), 2);
    }

    #[test]
    fn test_mark_and_query_are_idempotent() {
        let mut state = RunState::new(4);
        assert!(!state.has_seen("https://example.com/a"));

        state.mark_seen("https://example.com/a");
        state.mark_seen("https://example.com/a");

        assert!(state.has_seen("https://example.com/a/"));
        assert_eq!(state.seen_count(), 1);
    }

    #[test]
    fn test_new_run_starts_empty() {
        let mut first = RunState::new(1);
        first.mark_seen("https://example.com/a");

        let second = RunState::new(2);
        assert!(!second.has_seen("https://example.com/a"));
    }

    #[test]
    fn test_normalize_url() {
        // Test case insensitivity in host
        assert_eq!(normalize_url("https://EXAMPLE.com/path"), "https://example.com/path");

        // Test removal of default ports
        assert_eq!(normalize_url("https://example.com:443/path"), "https://example.com/path");

        // Test removal of trailing slash
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("https://example.com/new-cars/"), "https://example.com/new-cars");

        // Test query parameter sorting
        assert_eq!(
            normalize_url("https://example.com/search?b=2&a=1"),
            "https://example.com/search?a=1&b=2"
        );

        // Test fragment removal
        assert_eq!(normalize_url("https://example.com/page#section"), "https://example.com/page");

        assert_eq!(normalize_url(" not a url "), "not a url");
    }
}
