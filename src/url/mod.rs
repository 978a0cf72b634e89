//! URL handling module for Pantopod
//!
//! This module provides host and authority extraction plus the
//! component-wise href resolution used by the crawl policy.

mod domain;
mod resolve;

// Re-export main functions
pub use domain::{authority, extract_domain};
pub use resolve::resolve_href;

/// Returns true if two URLs share the same authority (host and explicit port)
pub fn is_same_authority(a: &url::Url, b: &url::Url) -> bool {
    authority(a) == authority(b)
}

/// Returns true if two URLs address the same page (same authority and path)
///
/// Query and fragment are ignored, so `/a?x=1` and `/a#top` are the same page.
pub fn is_same_page(a: &url::Url, b: &url::Url) -> bool {
    is_same_authority(a, b) && a.path() == b.path()
}
