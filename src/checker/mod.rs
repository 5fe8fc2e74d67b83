// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - probe: decides Alive/Dead for one URL (HEAD, then GET)
// - scheduler: runs probes over many bookmarks in paced batches
//
// This file (mod.rs) is the module root - it re-exports the public API so
// callers can write `checker::HttpProbe` instead of `checker::probe::HttpProbe`.
// =============================================================================

mod probe;
mod scheduler;

pub use probe::{HttpProbe, Probe, ProbeResult};
pub use scheduler::{BatchObserver, BatchProgress, BatchScheduler, RunOutcome, Stats, StopSignal};

#[cfg(test)]
pub(crate) use probe::MockProbe;

use url::Url;

/// Whether a bookmark URL is something we know how to probe.
///
/// Bookmarklets (`javascript:`), local files and browser-internal pages
/// would always look dead, so they are left out of a run entirely.
pub fn is_checkable_url(url: &str, schemes: &[String]) -> bool {
    match Url::parse(url) {
        Ok(parsed) => schemes.iter().any(|scheme| scheme.eq_ignore_ascii_case(parsed.scheme())),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> Vec<String> {
        vec!["http".to_string(), "https".to_string()]
    }

    #[test]
    fn test_http_and_https_are_checkable() {
        assert!(is_checkable_url("https://www.rust-lang.org", &web()));
        assert!(is_checkable_url("http://example.com/page", &web()));
    }

    #[test]
    fn test_skip_special_schemes() {
        assert!(!is_checkable_url("javascript:alert(1)", &web()));
        assert!(!is_checkable_url("file:///home/me/notes.html", &web()));
        assert!(!is_checkable_url("chrome://settings", &web()));
        assert!(!is_checkable_url("not a url", &web()));
    }
}
