use thiserror::Error;

/// Typed failures the run scheduler and startup code react to.
///
/// Everything else travels as `anyhow::Error` and is handled at the
/// per-item boundary.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The listing page never showed a result link before the readiness
    /// timeout. Ambiguous between "past the last page" and "layout changed",
    /// so the scheduler ends the run instead of retrying.
    #[error("no listing results found on {url} after {waited_secs}s (end of pagination or layout changed?)")]
    NoResults { url: String, waited_secs: u64 },

    /// A setting required for startup is absent.
    #[error("{key} is required (set it in the config file or the environment)")]
    MissingConfig { key: &'static str },
}
